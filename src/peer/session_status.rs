use crate::peer::message::Bitfield;

/// State machine driving a single peer connection.
///
/// `Connecting -> Handshaking -> BitfieldWait -> Ready -> Error -> Disconnected`.
/// `Error` always transitions to `Disconnected`; it exists as a distinct phase
/// only so the session can log the cause before tearing down.
#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Connecting,
    Handshaking,
    BitfieldWait,
    Ready,
    Error(String),
    Disconnected,
}

/// Choke/interest state kept for both directions of the connection, plus the
/// peer's announced piece bitfield.
#[derive(Debug, Clone)]
pub struct SessionStatus {
    pub phase: Phase,
    pub am_choking: bool,
    pub am_interested: bool,
    pub peer_choking: bool,
    pub peer_interested: bool,
    pub peer_bitfield: Option<Bitfield>,
}

impl SessionStatus {
    pub fn new() -> Self {
        Self {
            phase: Phase::Connecting,
            am_choking: true,
            am_interested: false,
            peer_choking: true,
            peer_interested: false,
            peer_bitfield: None,
        }
    }

    pub fn can_request(&self) -> bool {
        self.phase == Phase::Ready && self.am_interested && !self.peer_choking
    }
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_status_cannot_request() {
        let status = SessionStatus::new();
        assert!(!status.can_request());
    }

    #[test]
    fn test_can_request_once_ready_interested_and_unchoked() {
        let mut status = SessionStatus::new();
        status.phase = Phase::Ready;
        status.am_interested = true;
        status.peer_choking = false;

        assert!(status.can_request());
    }

    #[test]
    fn test_cannot_request_while_peer_choking() {
        let mut status = SessionStatus::new();
        status.phase = Phase::Ready;
        status.am_interested = true;
        status.peer_choking = true;

        assert!(!status.can_request());
    }
}
