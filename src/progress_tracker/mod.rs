use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::logger::logger_sender::LoggerSender;
use crate::scheduler::piece_scheduler::PieceScheduler;

const POLL_INTERVAL: Duration = Duration::from_secs(5);
const STOP_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// Polls the scheduler's finished-piece counters on a fixed interval and logs
/// a one-line progress indicator, until the download completes or it is told
/// to stop.
///
/// Holds only a cloned scheduler handle; it never keeps the scheduler's lock
/// for longer than the single read inside `pieces_finished()`.
pub struct ProgressTracker {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl ProgressTracker {
    /// Spawns the polling thread. `name` is used only to label the progress line.
    pub fn spawn(scheduler: Arc<PieceScheduler>, logger_sender: LoggerSender, name: String) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();

        let handle = thread::Builder::new()
            .name("progress-tracker".to_string())
            .spawn(move || Self::run(scheduler, logger_sender, name, thread_stop))
            .expect("failed to spawn progress tracker thread");

        Self { stop, handle }
    }

    fn run(
        scheduler: Arc<PieceScheduler>,
        logger_sender: LoggerSender,
        name: String,
        stop: Arc<AtomicBool>,
    ) {
        let started_at = Instant::now();
        while !stop.load(Ordering::Relaxed) && !scheduler.is_complete() {
            if Self::sleep_until_stopped_or(POLL_INTERVAL, &stop) {
                break;
            }
            Self::log_progress(&scheduler, &logger_sender, &name, started_at);
        }
        if scheduler.is_complete() {
            Self::log_progress(&scheduler, &logger_sender, &name, started_at);
        }
    }

    /// Sleeps in short increments so `stop()` doesn't have to wait out a full
    /// poll interval. Returns true if woken by a stop request.
    fn sleep_until_stopped_or(duration: Duration, stop: &AtomicBool) -> bool {
        let deadline = Instant::now() + duration;
        while Instant::now() < deadline {
            if stop.load(Ordering::Relaxed) {
                return true;
            }
            thread::sleep(STOP_CHECK_INTERVAL.min(deadline - Instant::now()));
        }
        false
    }

    fn log_progress(
        scheduler: &PieceScheduler,
        logger_sender: &LoggerSender,
        name: &str,
        started_at: Instant,
    ) {
        let finished = scheduler.pieces_finished();
        let total = scheduler.num_pieces().max(1);
        let percent = (finished as f64 / total as f64) * 100.0;
        let elapsed = started_at.elapsed().as_secs();
        let _ = logger_sender.info(&format!(
            "{name}: {finished}/{total} pieces ({percent:.1}%), {elapsed}s elapsed"
        ));
    }

    /// Signals the tracker thread to stop at its next wakeup and waits for it to exit.
    pub fn stop(self) {
        self.stop.store(true, Ordering::Relaxed);
        let _ = self.handle.join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::cfg::Cfg;
    use crate::logger::logger_receiver::Logger;
    use crate::torrent_parser::info::Info;
    use crate::torrent_parser::torrent::Torrent;
    use std::fs;

    fn test_torrent(name: &str) -> Torrent {
        Torrent {
            announce_url: "http://tracker.example/announce".to_string(),
            info: Info {
                piece_length: 16384,
                length: 16384,
                name: name.to_string(),
                piece_hashes: vec![[0u8; 20]],
            },
            info_hash: [0u8; 20],
        }
    }

    fn test_config(dir: &str) -> Cfg {
        Cfg {
            tcp_port: 6881,
            log_directory: dir.to_string(),
            download_directory: dir.to_string(),
            read_write_seconds_timeout: 120,
            max_peers_per_torrent: 30,
            pipelining_size: 5,
        }
    }

    #[test]
    fn test_stop_joins_cleanly_without_waiting_a_full_poll_interval() {
        let dir = "./test_progress_tracker_stop";
        fs::create_dir_all(dir).unwrap();
        let config = test_config(dir);
        let logger = Logger::new(dir, false).unwrap();

        let torrent = test_torrent("out.bin");
        let scheduler = PieceScheduler::new(torrent, config);

        let tracker = ProgressTracker::spawn(scheduler, logger.new_sender(), "test".to_string());
        tracker.stop();

        fs::remove_dir_all(dir).ok();
    }
}
