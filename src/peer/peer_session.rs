use std::collections::HashSet;
use std::fmt;
use std::io;
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use crate::config::cfg::Cfg;
use crate::logger::logger_sender::LoggerSender;
use crate::scheduler::piece_scheduler::{Block, DeliverError, PieceScheduler};

use super::bt_peer::BtPeer;
use super::handshake::{Handshake, HandshakeError};
use super::message::{
    have_payload, parse_have_payload, Bitfield, Message, MessageId, PieceBlock, Request,
    UnknownMessageId,
};
use super::session_status::{Phase, SessionStatus};

#[derive(Debug)]
pub enum PeerSessionError {
    Connect(io::Error),
    Handshake(HandshakeError),
    Io(io::Error),
    UnknownMessage(UnknownMessageId),
    BadFrame,
    Deliver(DeliverError),
    /// The scheduler hit an unrecoverable error (e.g. a disk write failure) in
    /// another session; this one has nothing left to do but stop too.
    Fatal(String),
}

impl fmt::Display for PeerSessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerSessionError::Connect(err) => write!(f, "could not connect to peer: {err}"),
            PeerSessionError::Handshake(err) => write!(f, "handshake failed: {err}"),
            PeerSessionError::Io(err) => write!(f, "connection error: {err}"),
            PeerSessionError::UnknownMessage(err) => write!(f, "{err}"),
            PeerSessionError::BadFrame => write!(f, "peer sent a malformed message frame"),
            PeerSessionError::Deliver(err) => write!(f, "could not deliver block: {err}"),
            PeerSessionError::Fatal(reason) => write!(f, "download aborted: {reason}"),
        }
    }
}

impl std::error::Error for PeerSessionError {}

impl From<io::Error> for PeerSessionError {
    fn from(err: io::Error) -> Self {
        PeerSessionError::Io(err)
    }
}

/// Drives a single peer connection: handshake, then a steady-state read loop
/// that requests and delivers blocks through the shared scheduler.
pub struct PeerSession {
    peer: BtPeer,
    info_hash: [u8; 20],
    own_peer_id: [u8; 20],
    scheduler: Arc<PieceScheduler>,
    config: Cfg,
    logger_sender: LoggerSender,
    status: SessionStatus,
    pending_blocks: HashSet<Block>,
}

impl PeerSession {
    pub fn new(
        peer: BtPeer,
        info_hash: [u8; 20],
        own_peer_id: [u8; 20],
        scheduler: Arc<PieceScheduler>,
        config: Cfg,
        logger_sender: LoggerSender,
    ) -> Self {
        Self {
            peer,
            info_hash,
            own_peer_id,
            scheduler,
            config,
            logger_sender,
            status: SessionStatus::new(),
            pending_blocks: HashSet::new(),
        }
    }

    /// Connects to the peer and drives the session until it ends, in error or
    /// because every piece is finished. Always returns any blocks it was
    /// holding to the scheduler before returning.
    pub fn run(&mut self) {
        let result = self.run_inner();
        for block in self.pending_blocks.drain() {
            self.scheduler.return_block(block);
        }

        match result {
            Ok(()) => {
                let _ = self
                    .logger_sender
                    .info(&format!("Session with {} ended", self.peer));
            }
            Err(err) => {
                self.status.phase = Phase::Error(err.to_string());
                let _ = self
                    .logger_sender
                    .warn(&format!("Session with {} failed: {err}", self.peer));
            }
        }
        self.status.phase = Phase::Disconnected;
    }

    fn run_inner(&mut self) -> Result<(), PeerSessionError> {
        self.status.phase = Phase::Connecting;
        let mut stream =
            TcpStream::connect(self.peer.socket_addr()).map_err(PeerSessionError::Connect)?;
        stream.set_read_timeout(Some(Duration::from_secs(
            self.config.read_write_seconds_timeout,
        )))?;
        stream.set_write_timeout(Some(Duration::from_secs(
            self.config.read_write_seconds_timeout,
        )))?;

        self.status.phase = Phase::Handshaking;
        self.do_handshake(&mut stream)?;
        let _ = self.logger_sender.info("Handshake successful");

        self.status.phase = Phase::BitfieldWait;
        self.steady_state_loop(&mut stream)
    }

    fn do_handshake(&mut self, stream: &mut TcpStream) -> Result<(), PeerSessionError> {
        use std::io::{Read, Write};

        let handshake = Handshake::new(self.info_hash, self.own_peer_id);
        stream.write_all(&handshake.to_bytes())?;

        let mut buffer = [0u8; 68];
        stream.read_exact(&mut buffer)?;
        let received = Handshake::parse(&buffer).map_err(PeerSessionError::Handshake)?;
        received
            .verify(self.info_hash)
            .map_err(PeerSessionError::Handshake)?;
        Ok(())
    }

    fn steady_state_loop(&mut self, stream: &mut TcpStream) -> Result<(), PeerSessionError> {
        loop {
            if self.scheduler.is_complete() {
                return Ok(());
            }
            if self.scheduler.is_fatal() {
                let reason = self
                    .scheduler
                    .fatal_error()
                    .unwrap_or_else(|| "unknown scheduler error".to_string());
                return Err(PeerSessionError::Fatal(reason));
            }

            let message = match Message::read_from(stream) {
                Ok(Some(message)) => message,
                Ok(None) => continue, // keep-alive
                Err(err) => return Err(PeerSessionError::Io(err)),
            };

            self.dispatch(message, stream)?;
        }
    }

    fn dispatch(&mut self, message: Message, stream: &mut TcpStream) -> Result<(), PeerSessionError> {
        self.validate_payload_len(&message)?;

        match message.id {
            MessageId::Choke => {
                self.status.peer_choking = true;
            }
            MessageId::Unchoke => {
                self.status.peer_choking = false;
                if self.status.phase == Phase::BitfieldWait {
                    self.enter_ready(stream)?;
                }
                if self.status.phase == Phase::Ready {
                    self.try_request_block(stream)?;
                }
            }
            MessageId::Interested => {
                self.status.peer_interested = true;
            }
            MessageId::NotInterested => {
                self.status.peer_interested = false;
            }
            MessageId::Have => {
                if let Some(index) = parse_have_payload(&message.payload) {
                    if index >= self.scheduler.num_pieces() {
                        return Err(PeerSessionError::BadFrame);
                    }
                    self.ensure_bitfield();
                    if let Some(bitfield) = self.status.peer_bitfield.as_mut() {
                        bitfield.set_piece(index);
                    }
                    if self.status.phase == Phase::BitfieldWait {
                        self.enter_ready(stream)?;
                    }
                }
            }
            MessageId::Bitfield => {
                self.status.peer_bitfield = Some(Bitfield::new(message.payload));
                if self.status.phase == Phase::BitfieldWait {
                    self.enter_ready(stream)?;
                }
            }
            MessageId::Request => {
                let _ = self
                    .logger_sender
                    .debug("Ignoring request message; this client does not serve pieces");
            }
            MessageId::Piece => {
                self.handle_piece(&message.payload, stream)?;
            }
            MessageId::Cancel | MessageId::Port => {}
        }
        Ok(())
    }

    /// Rejects a frame whose payload length doesn't match what its id requires,
    /// per the wire protocol's fixed-shape messages.
    fn validate_payload_len(&self, message: &Message) -> Result<(), PeerSessionError> {
        let len = message.payload.len();
        let ok = match message.id {
            MessageId::Choke
            | MessageId::Unchoke
            | MessageId::Interested
            | MessageId::NotInterested => len == 0,
            MessageId::Have => len == 4,
            MessageId::Bitfield => len == self.scheduler.num_pieces().div_ceil(8) as usize,
            MessageId::Request | MessageId::Cancel => len == 12,
            MessageId::Piece => len >= 8,
            MessageId::Port => len == 2,
        };
        if ok {
            Ok(())
        } else {
            Err(PeerSessionError::BadFrame)
        }
    }

    fn ensure_bitfield(&mut self) {
        if self.status.peer_bitfield.is_none() {
            self.status.peer_bitfield = Some(Bitfield::empty(self.scheduler.num_pieces()));
        }
    }

    fn enter_ready(&mut self, stream: &mut TcpStream) -> Result<(), PeerSessionError> {
        self.ensure_bitfield();
        self.status.phase = Phase::Ready;
        self.send_interested(stream)?;
        Ok(())
    }

    fn send_interested(&mut self, stream: &mut TcpStream) -> Result<(), PeerSessionError> {
        let message = Message::new(MessageId::Interested, vec![]);
        message.write_to(stream)?;
        self.status.am_interested = true;
        Ok(())
    }

    fn handle_piece(
        &mut self,
        payload: &[u8],
        stream: &mut TcpStream,
    ) -> Result<(), PeerSessionError> {
        let block = match PieceBlock::from_bytes(payload) {
            Some(block) => block,
            None => return Err(PeerSessionError::BadFrame),
        };

        self.pending_blocks.retain(|b| {
            !(b.piece_index == block.index && b.offset == block.begin)
        });

        match self
            .scheduler
            .deliver_block(block.index, block.begin, &block.block)
        {
            Ok(()) => {
                let _ = self.logger_sender.debug(&format!(
                    "Delivered piece {} offset {}",
                    block.index, block.begin
                ));
                if self.scheduler.is_complete() {
                    let _ = self.logger_sender.info("Download complete");
                    return Ok(());
                }
            }
            Err(DeliverError::HashMismatch) => {
                let _ = self
                    .logger_sender
                    .warn(&format!("Piece {} failed hash check; retrying", block.index));
            }
            Err(err @ DeliverError::OutOfBounds) => {
                let _ = self
                    .logger_sender
                    .error(&format!("Could not deliver piece {}: {err}", block.index));
                return Err(PeerSessionError::Deliver(err));
            }
            Err(err @ DeliverError::Io(_)) => {
                let _ = self
                    .logger_sender
                    .error(&format!("Could not deliver piece {}: {err}", block.index));
                return Err(PeerSessionError::Deliver(err));
            }
        }

        self.fill_request_window(stream)
    }

    fn try_request_block(&mut self, stream: &mut TcpStream) -> Result<(), PeerSessionError> {
        if !self.status.can_request() {
            return Ok(());
        }
        let bitfield = match &self.status.peer_bitfield {
            Some(bitfield) => bitfield,
            None => return Ok(()),
        };

        if let Some(block) = self.scheduler.request_block(bitfield) {
            self.pending_blocks.insert(block);
            let request = Request::new(block.piece_index, block.offset, block.length);
            let message = Message::new(MessageId::Request, request.to_bytes());
            message.write_to(stream)?;
        }
        Ok(())
    }

    /// Keeps up to `config.pipelining_size` requests outstanding at once.
    fn fill_request_window(&mut self, stream: &mut TcpStream) -> Result<(), PeerSessionError> {
        let window = self.config.pipelining_size.max(1) as usize;
        while self.status.can_request() && self.pending_blocks.len() < window {
            let before = self.pending_blocks.len();
            self.try_request_block(stream)?;
            if self.pending_blocks.len() == before {
                break;
            }
        }
        Ok(())
    }
}

/// Builds the payload for a `have` message announcing a newly finished piece.
/// Kept here, alongside the session that would emit it, even though this
/// download-only client never seeds: a future seeding path would call it from
/// the scheduler's completion hook.
pub fn announce_have(index: u32) -> Message {
    Message::new(MessageId::Have, have_payload(index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_announce_have_builds_have_message() {
        let message = announce_have(7);
        assert_eq!(message.id, MessageId::Have);
        assert_eq!(parse_have_payload(&message.payload), Some(7));
    }
}
