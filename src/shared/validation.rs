//! Validation Utilities

use validator::ValidationErrors;

/// Flatten validation errors into a single client-facing message
pub fn validation_message(errors: &ValidationErrors) -> String {
    let mut fields: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                let message = e
                    .message
                    .clone()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string());
                format!("{}: {}", field, message)
            })
        })
        .collect();
    fields.sort();

    fields
        .into_iter()
        .next()
        .unwrap_or_else(|| "Validation failed".into())
}
