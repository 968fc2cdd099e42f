mod broker_tests;
