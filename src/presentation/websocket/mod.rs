//! WebSocket Gateway
//!
//! Real-time chat over WebSocket connections.

pub mod broker;
pub mod gateway;
pub mod handler;
pub mod housekeeping;
pub mod messages;
pub mod session;

pub use broker::{BrokerError, ChatBroker, PayloadLimits};
pub use gateway::Gateway;
pub use handler::ws_handler;
pub use housekeeping::{BackgroundTasks, EvictionReport, Housekeeper, MemoryReport};
pub use messages::{ClientEvent, Outbound, ServerEvent};
pub use session::{ConnectedSession, SessionActivity};
