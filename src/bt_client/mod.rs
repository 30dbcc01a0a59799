pub mod btclient;
pub mod btclient_error;
pub mod error_message;
