pub mod bt_peer;
pub mod handshake;
pub mod message;
pub mod peer_session;
pub mod session_status;
