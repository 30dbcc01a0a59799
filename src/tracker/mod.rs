pub mod client;
pub mod http;
pub mod tracker_response;
