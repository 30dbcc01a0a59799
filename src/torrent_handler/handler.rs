use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::config::cfg::Cfg;
use crate::logger::logger_sender::LoggerSender;
use crate::peer::bt_peer::BtPeer;
use crate::peer::peer_session::PeerSession;
use crate::progress_tracker::ProgressTracker;
use crate::scheduler::piece_scheduler::PieceScheduler;
use crate::torrent_parser::torrent::Torrent;
use crate::tracker::client::{TrackerClient, TrackerClientError};

/// Owns the piece scheduler and a pool of per-peer session threads for a
/// single torrent download, from tracker announce through completion.
pub struct TorrentHandler {
    torrent: Torrent,
    config: Cfg,
    logger_sender: LoggerSender,
    scheduler: Arc<PieceScheduler>,
}

#[derive(Debug)]
pub enum TorrentHandlerError {
    Tracker(TrackerClientError),
    /// A peer session's scheduler hit an unrecoverable error (e.g. a disk
    /// write failure); the download cannot finish.
    Fatal(String),
}

impl fmt::Display for TorrentHandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TorrentHandlerError::Tracker(err) => write!(f, "tracker announce failed: {err}"),
            TorrentHandlerError::Fatal(reason) => write!(f, "download aborted: {reason}"),
        }
    }
}

impl std::error::Error for TorrentHandlerError {}

impl From<TrackerClientError> for TorrentHandlerError {
    fn from(err: TrackerClientError) -> Self {
        TorrentHandlerError::Tracker(err)
    }
}

/// Message a peer session thread sends back on exit: it has freed one slot
/// towards `max_peers_per_torrent`.
struct SlotFreed;

impl TorrentHandler {
    pub fn new(torrent: Torrent, config: Cfg, logger_sender: LoggerSender) -> Self {
        let scheduler = PieceScheduler::new(torrent.clone(), config.clone());
        Self {
            torrent,
            config,
            logger_sender,
            scheduler,
        }
    }

    /// Returns a handle to the scheduler, for callers that want to observe
    /// progress independently (e.g. tests).
    pub fn scheduler(&self) -> Arc<PieceScheduler> {
        self.scheduler.clone()
    }

    /// Announces to the tracker, spawns one session thread per peer (subject
    /// to the `max_peers_per_torrent` cap), and blocks until every piece is
    /// verified and written to disk.
    pub fn handle(&mut self) -> Result<(), TorrentHandlerError> {
        let tracker_client = TrackerClient::new();
        let _ = self.logger_sender.info("Announcing to tracker...");

        let progress = ProgressTracker::spawn(
            self.scheduler.clone(),
            self.logger_sender.clone(),
            self.torrent.info.name.clone(),
        );

        let (slot_tx, slot_rx): (Sender<SlotFreed>, Receiver<SlotFreed>) = mpsc::channel();
        let mut handles: Vec<JoinHandle<()>> = Vec::new();
        let mut current_peers: usize = 0;
        let max_peers = self.config.max_peers_per_torrent as usize;

        while !self.scheduler.is_complete() && !self.scheduler.is_fatal() {
            let response = tracker_client.announce(
                &self.torrent.announce_url,
                self.torrent.info_hash,
                self.config.tcp_port,
                self.torrent.info.length,
            )?;
            let _ = self.logger_sender.info(&format!(
                "Tracker returned {} peers, re-announce interval {}s",
                response.peers.len(),
                response.interval
            ));

            for peer in response.peers {
                if self.scheduler.is_complete() || self.scheduler.is_fatal() {
                    break;
                }
                if current_peers >= max_peers {
                    current_peers -= self.wait_for_freed_slot(&slot_rx);
                }
                if self.scheduler.is_complete() || self.scheduler.is_fatal() {
                    break;
                }
                handles.push(self.spawn_session(
                    peer,
                    tracker_client.peer_id(),
                    slot_tx.clone(),
                ));
                current_peers += 1;
            }

            if self.scheduler.is_complete() || self.scheduler.is_fatal() {
                break;
            }
            thread::sleep(Duration::from_secs(response.interval.max(0) as u64));
        }

        for handle in handles {
            let _ = handle.join();
        }
        progress.stop();

        if let Some(reason) = self.scheduler.fatal_error() {
            return Err(TorrentHandlerError::Fatal(reason));
        }

        let _ = self.logger_sender.info("Torrent download finished.");
        Ok(())
    }

    /// Blocks until at least one peer slot has been freed, draining any
    /// further already-queued notifications without blocking again. Returns
    /// the number of slots freed.
    fn wait_for_freed_slot(&self, slot_rx: &Receiver<SlotFreed>) -> usize {
        let mut freed = 0;
        if slot_rx.recv().is_ok() {
            freed += 1;
        }
        while slot_rx.try_recv().is_ok() {
            freed += 1;
        }
        freed
    }

    fn spawn_session(
        &self,
        peer: BtPeer,
        own_peer_id: [u8; 20],
        slot_tx: Sender<SlotFreed>,
    ) -> JoinHandle<()> {
        let info_hash = self.torrent.info_hash;
        let scheduler = self.scheduler.clone();
        let config = self.config.clone();
        let logger_sender = self.logger_sender.clone();
        let torrent_name = self.torrent.info.name.clone();

        let builder =
            thread::Builder::new().name(format!("Torrent: {torrent_name} / Peer: {peer}"));
        builder
            .spawn(move || {
                let mut session = PeerSession::new(
                    peer,
                    info_hash,
                    own_peer_id,
                    scheduler,
                    config,
                    logger_sender,
                );
                session.run();
                let _ = slot_tx.send(SlotFreed);
            })
            .expect("failed to spawn peer session thread")
    }
}
