use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Condvar, Mutex};

use sha1::{Digest, Sha1};

use crate::config::cfg::Cfg;
use crate::peer::message::Bitfield;
use crate::storage_manager::manager;
use crate::torrent_parser::torrent::Torrent;

/// The wire-level transfer unit: the last block of a piece may be shorter.
pub const BLOCK_LEN: u32 = 16384;

/// A single block of a piece, addressed by piece index and byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Block {
    pub piece_index: u32,
    pub offset: u32,
    pub length: u32,
}

#[derive(Debug)]
pub enum DeliverError {
    OutOfBounds,
    HashMismatch,
    Io(std::io::Error),
}

impl fmt::Display for DeliverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliverError::OutOfBounds => write!(f, "delivered block falls outside its piece"),
            DeliverError::HashMismatch => write!(f, "piece hash does not match the torrent metadata"),
            DeliverError::Io(err) => write!(f, "could not write finished piece to disk: {err}"),
        }
    }
}

impl std::error::Error for DeliverError {}

/// A piece whose blocks are still arriving.
struct PendingPiece {
    data: Vec<u8>,
    blocks_received: u32,
    total_blocks: u32,
}

struct SchedulerState {
    have_bitfield: Bitfield,
    next_offset: Vec<u32>,
    in_flight: HashSet<Block>,
    pending_pieces: HashMap<u32, PendingPiece>,
    pieces_finished: u32,
}

/// The single source of truth for download progress, shared behind one lock
/// across every peer session thread.
pub struct PieceScheduler {
    torrent: Torrent,
    config: Cfg,
    num_pieces: u32,
    state: Mutex<SchedulerState>,
    completion: Condvar,
    /// Set once, by whichever session's `deliver_block` first hits a disk
    /// write failure. A fatal error means no further progress is possible;
    /// every session and the orchestrator must stop rather than wait for
    /// `pieces_finished == num_pieces`, which would otherwise never happen.
    fatal_error: Mutex<Option<String>>,
}

impl PieceScheduler {
    pub fn new(torrent: Torrent, config: Cfg) -> Arc<PieceScheduler> {
        let num_pieces = torrent.info.total_pieces();
        let state = SchedulerState {
            have_bitfield: Bitfield::empty(num_pieces),
            next_offset: vec![0; num_pieces as usize],
            in_flight: HashSet::new(),
            pending_pieces: HashMap::new(),
            pieces_finished: 0,
        };

        Arc::new(PieceScheduler {
            torrent,
            config,
            num_pieces,
            state: Mutex::new(state),
            completion: Condvar::new(),
            fatal_error: Mutex::new(None),
        })
    }

    pub fn num_pieces(&self) -> u32 {
        self.num_pieces
    }

    pub fn pieces_finished(&self) -> u32 {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).pieces_finished
    }

    pub fn is_complete(&self) -> bool {
        self.pieces_finished() == self.num_pieces
    }

    /// Records a fatal, unrecoverable error (currently: a failed piece write)
    /// and wakes anyone waiting on completion so they can observe it instead
    /// of blocking forever. Keeps the first reason if called more than once.
    pub fn mark_fatal(&self, reason: String) {
        let mut guard = self.fatal_error.lock().unwrap_or_else(|e| e.into_inner());
        if guard.is_none() {
            *guard = Some(reason);
        }
        drop(guard);
        self.completion.notify_all();
    }

    pub fn is_fatal(&self) -> bool {
        self.fatal_error.lock().unwrap_or_else(|e| e.into_inner()).is_some()
    }

    pub fn fatal_error(&self) -> Option<String> {
        self.fatal_error.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Blocks the calling thread until every piece is finished or a fatal
    /// error has been recorded.
    pub fn wait_until_complete(&self) {
        let guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let _guard = self
            .completion
            .wait_while(guard, |state| {
                state.pieces_finished < self.num_pieces && !self.is_fatal()
            })
            .unwrap_or_else(|e| e.into_inner());
    }

    fn piece_length_for(&self, index: u32) -> u32 {
        self.torrent.info.piece_length_for(index) as u32
    }

    fn block_count_for(&self, index: u32) -> u32 {
        self.piece_length_for(index).div_ceil(BLOCK_LEN)
    }

    /// Picks the next unclaimed block belonging to a piece the peer has and we
    /// don't, scanning `peer_bitfield` MSB-first.
    pub fn request_block(&self, peer_bitfield: &Bitfield) -> Option<Block> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        for piece_index in 0..self.num_pieces {
            if !peer_bitfield.has_piece(piece_index) || state.have_bitfield.has_piece(piece_index) {
                continue;
            }
            if let Some(block) = self.next_block_for_piece(&mut state, piece_index) {
                return Some(block);
            }
        }
        None
    }

    fn next_block_for_piece(&self, state: &mut SchedulerState, piece_index: u32) -> Option<Block> {
        let piece_length = self.piece_length_for(piece_index);
        let total_blocks = self.block_count_for(piece_index);

        let mut block_num = state.next_offset[piece_index as usize] / BLOCK_LEN;
        while block_num < total_blocks {
            let offset = block_num * BLOCK_LEN;
            let length = std::cmp::min(BLOCK_LEN, piece_length - offset);
            let candidate = Block {
                piece_index,
                offset,
                length,
            };
            if !state.in_flight.contains(&candidate) {
                state.in_flight.insert(candidate);
                state.next_offset[piece_index as usize] = offset + length;
                return Some(candidate);
            }
            block_num += 1;
        }
        None
    }

    /// Delivers a block's payload. Duplicate deliveries to an already-finished
    /// piece are accepted silently.
    pub fn deliver_block(
        &self,
        piece_index: u32,
        offset: u32,
        data: &[u8],
    ) -> Result<(), DeliverError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        if state.have_bitfield.has_piece(piece_index) {
            return Ok(());
        }

        let piece_length = self.piece_length_for(piece_index) as usize;
        if offset as usize + data.len() > piece_length {
            return Err(DeliverError::OutOfBounds);
        }

        let total_blocks = self.block_count_for(piece_index);
        let piece = state
            .pending_pieces
            .entry(piece_index)
            .or_insert_with(|| PendingPiece {
                data: vec![0u8; piece_length],
                blocks_received: 0,
                total_blocks,
            });
        piece.data[offset as usize..offset as usize + data.len()].copy_from_slice(data);
        piece.blocks_received += 1;

        state.in_flight.remove(&Block {
            piece_index,
            offset,
            length: data.len() as u32,
        });

        let piece = state.pending_pieces.get(&piece_index).unwrap();
        if piece.blocks_received < piece.total_blocks {
            return Ok(());
        }

        let piece_data = state.pending_pieces.remove(&piece_index).unwrap().data;
        let expected_hash = self.torrent.info.piece_hashes[piece_index as usize];
        let mut hasher = Sha1::new();
        hasher.update(&piece_data);
        let actual_hash: [u8; 20] = hasher.finalize().into();

        if actual_hash != expected_hash {
            state.next_offset[piece_index as usize] = 0;
            return Err(DeliverError::HashMismatch);
        }

        // Release the lock for the blocking file write, then briefly reacquire it
        // to flip the finished bit, so no thread observes the piece finished
        // before its bytes are actually on disk.
        drop(state);
        let write_offset = piece_index as u64 * self.torrent.info.piece_length;
        if let Err(err) =
            manager::save_piece(&self.torrent.info.name, &piece_data, write_offset, &self.config)
        {
            self.mark_fatal(format!("could not write piece {piece_index} to disk: {err}"));
            return Err(DeliverError::Io(err));
        }

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.have_bitfield.set_piece(piece_index);
        state.pieces_finished += 1;
        if state.pieces_finished == self.num_pieces {
            self.completion.notify_all();
        }

        Ok(())
    }

    /// Returns an in-flight block to the pool, for a peer session that failed
    /// before finishing the transfer. No-op if the block isn't in flight
    /// (already delivered or already returned).
    pub fn return_block(&self, block: Block) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.in_flight.remove(&block) {
            let slot = &mut state.next_offset[block.piece_index as usize];
            *slot = std::cmp::min(*slot, block.offset);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::torrent_parser::info::Info;
    use std::fs;

    fn single_piece_torrent(piece_length: u64, file_length: u64, hash: [u8; 20], name: &str) -> Torrent {
        Torrent {
            announce_url: "http://tracker.example/announce".to_string(),
            info: Info {
                piece_length,
                length: file_length,
                name: name.to_string(),
                piece_hashes: vec![hash],
            },
            info_hash: [0u8; 20],
        }
    }

    fn test_config(download_directory: &str) -> Cfg {
        Cfg {
            tcp_port: 6881,
            log_directory: "./logs".to_string(),
            download_directory: download_directory.to_string(),
            read_write_seconds_timeout: 120,
            max_peers_per_torrent: 30,
            pipelining_size: 5,
        }
    }

    fn full_bitfield(num_pieces: u32) -> Bitfield {
        let mut bitfield = Bitfield::empty(num_pieces);
        for i in 0..num_pieces {
            bitfield.set_piece(i);
        }
        bitfield
    }

    #[test]
    fn test_s1_single_piece_happy_path() {
        let dir = "./test_scheduler_s1";
        let name = "out.bin";
        let data = vec![b'A'; 16384];
        let mut hasher = Sha1::new();
        hasher.update(&data);
        let hash: [u8; 20] = hasher.finalize().into();

        let torrent = single_piece_torrent(16384, 16384, hash, name);
        let scheduler = PieceScheduler::new(torrent, test_config(dir));

        let bitfield = full_bitfield(1);
        let block = scheduler.request_block(&bitfield).unwrap();
        assert_eq!(
            block,
            Block {
                piece_index: 0,
                offset: 0,
                length: 16384
            }
        );

        scheduler
            .deliver_block(block.piece_index, block.offset, &data)
            .unwrap();

        assert!(scheduler.is_complete());
        let on_disk = fs::read(format!("{dir}/{name}")).unwrap();
        assert_eq!(on_disk, data);

        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_s2_hash_mismatch_retry() {
        let dir = "./test_scheduler_s2";
        let name = "out.bin";
        let correct = vec![b'A'; 16384];
        let mut hasher = Sha1::new();
        hasher.update(&correct);
        let hash: [u8; 20] = hasher.finalize().into();

        let torrent = single_piece_torrent(16384, 16384, hash, name);
        let scheduler = PieceScheduler::new(torrent, test_config(dir));
        let bitfield = full_bitfield(1);

        let block = scheduler.request_block(&bitfield).unwrap();
        let wrong = vec![b'B'; 16384];
        let err = scheduler
            .deliver_block(block.piece_index, block.offset, &wrong)
            .unwrap_err();
        assert!(matches!(err, DeliverError::HashMismatch));
        assert!(!scheduler.is_complete());

        let retried = scheduler.request_block(&bitfield).unwrap();
        assert_eq!(retried, block);

        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_s3_block_return_on_peer_failure() {
        let dir = "./test_scheduler_s3";
        let name = "out.bin";
        let data = vec![b'A'; 65536];
        let mut hasher = Sha1::new();
        hasher.update(&data);
        let hash: [u8; 20] = hasher.finalize().into();

        let torrent = single_piece_torrent(65536, 65536, hash, name);
        let scheduler = PieceScheduler::new(torrent, test_config(dir));
        let bitfield = full_bitfield(1);

        let p1_block = scheduler.request_block(&bitfield).unwrap();
        assert_eq!(p1_block.offset, 0);

        let p2_block = scheduler.request_block(&bitfield).unwrap();
        assert_eq!(p2_block.offset, 16384);

        scheduler.return_block(p1_block);
        let p2_retry = scheduler.request_block(&bitfield).unwrap();
        assert_eq!(p2_retry, p1_block);

        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_request_block_returns_none_when_peer_has_nothing_we_need() {
        let dir = "./test_scheduler_none";
        let torrent = single_piece_torrent(16384, 16384, [0u8; 20], "out.bin");
        let scheduler = PieceScheduler::new(torrent, test_config(dir));

        let empty_bitfield = Bitfield::empty(1);
        assert!(scheduler.request_block(&empty_bitfield).is_none());

        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_deliver_block_marks_fatal_on_disk_write_failure() {
        // Pointing the download directory at an existing plain file (rather
        // than a directory) makes the write fail with a real I/O error
        // without needing to fake the filesystem.
        let blocking_file = "./test_scheduler_fatal_blocker";
        fs::write(blocking_file, b"not a directory").unwrap();

        let data = vec![b'A'; 16384];
        let mut hasher = Sha1::new();
        hasher.update(&data);
        let hash: [u8; 20] = hasher.finalize().into();

        let torrent = single_piece_torrent(16384, 16384, hash, "out.bin");
        let scheduler = PieceScheduler::new(torrent, test_config(blocking_file));
        let bitfield = full_bitfield(1);

        let block = scheduler.request_block(&bitfield).unwrap();
        let err = scheduler
            .deliver_block(block.piece_index, block.offset, &data)
            .unwrap_err();

        assert!(matches!(err, DeliverError::Io(_)));
        assert!(scheduler.is_fatal());
        assert!(scheduler.fatal_error().is_some());
        assert!(!scheduler.is_complete());

        fs::remove_file(blocking_file).ok();
    }
}
