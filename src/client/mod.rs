pub mod error;

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use rand::Rng;

use crate::config::Config;
use crate::logger::LoggerSender;
use crate::peer::queue::PeerQueue;
use crate::peer::session::{PeerSession, SessionError};
use crate::peer::PeerEndpoint;
use crate::piece::manager::{PieceManager, SchedulerError};
use crate::piece::progress;
use crate::torrent::TorrentMeta;
use crate::tracker::query::QueryParams;
use crate::tracker::TrackerClient;

pub use error::ClientError;

const CLIENT_ID: &str = "-BP0001-";
const MIN_ANNOUNCE_INTERVAL: i64 = 60;

/// Shared slot a worker drops a fatal scheduler error into; the supervisor
/// polls it to abort the run instead of hanging once a piece can never be
/// written to disk.
type FatalSlot = Arc<Mutex<Option<SchedulerError>>>;

/// Top-level supervisor: owns the scheduler, the tracker client, and the
/// fixed pool of worker threads that pull peer endpoints off a shared queue
/// and run sessions against them.
pub struct Client {
    meta: TorrentMeta,
    config: Config,
    logger: LoggerSender,
    my_peer_id: [u8; 20],
    manager: Arc<PieceManager>,
    tracker: TrackerClient,
}

impl Client {
    pub fn new(meta: TorrentMeta, config: Config, logger: LoggerSender) -> Result<Self, ClientError> {
        let manager = Arc::new(PieceManager::new(
            &meta,
            &config.output_dir,
            config.thread_num as usize,
        )?);
        let tracker = TrackerClient::new(&meta.announce)?;

        Ok(Self {
            my_peer_id: generate_peer_id(),
            meta,
            config,
            logger,
            manager,
            tracker,
        })
    }

    /// Runs the full download: spawns workers, repeatedly announces to the
    /// tracker and feeds discovered peers to them, until every piece is on
    /// disk.
    pub fn run(&self) -> Result<(), ClientError> {
        let queue = Arc::new(PeerQueue::new());
        let fatal: FatalSlot = Arc::new(Mutex::new(None));
        let progress_handle = progress::spawn(Arc::clone(&self.manager));
        let workers = self.spawn_workers(Arc::clone(&queue), Arc::clone(&fatal));

        let uploaded = 0u64;
        while !self.manager.is_complete() && fatal.lock().unwrap().is_none() {
            let left = self.meta.length().saturating_sub(self.manager.bytes_downloaded());
            let params = QueryParams {
                info_hash: self.meta.info_hash,
                peer_id: self.my_peer_id,
                port: 6881,
                uploaded,
                downloaded: self.manager.bytes_downloaded(),
                left,
            };

            match self.tracker.announce(&params) {
                Ok(response) => {
                    self.logger
                        .info(&format!("tracker returned {} peers", response.peers.len()));
                    queue.clear();
                    queue.extend(response.peers);
                    let wait = response.interval.max(MIN_ANNOUNCE_INTERVAL) as u64;
                    sleep_in_ticks(wait, &self.manager, &queue, &fatal);
                }
                Err(err) => {
                    self.logger.warn(&format!("tracker announce failed: {err:?}"));
                    sleep_in_ticks(MIN_ANNOUNCE_INTERVAL as u64, &self.manager, &queue, &fatal);
                }
            }
        }

        for _ in 0..workers.len() {
            queue.push_back(PeerEndpoint::sentinel());
        }
        for worker in workers {
            let _ = worker.join();
        }
        let _ = progress_handle.join();

        if let Some(err) = fatal.lock().unwrap().take() {
            self.logger
                .warn(&format!("aborting run: fatal scheduler error: {err:?}"));
            return Err(ClientError::Scheduler(err));
        }

        self.logger.info("download complete");
        println!(
            "Downloaded {} into {}",
            self.meta.name(),
            self.config.output_dir
        );
        Ok(())
    }

    fn spawn_workers(&self, queue: Arc<PeerQueue>, fatal: FatalSlot) -> Vec<thread::JoinHandle<()>> {
        (0..self.config.thread_num)
            .map(|index| {
                let queue = Arc::clone(&queue);
                let manager = Arc::clone(&self.manager);
                let logger = self.logger.clone();
                let info_hash = self.meta.info_hash;
                let my_peer_id = self.my_peer_id;
                let fatal = Arc::clone(&fatal);

                thread::Builder::new()
                    .name(format!("peer-worker-{index}"))
                    .spawn(move || worker_loop(queue, manager, info_hash, my_peer_id, logger, fatal))
                    .expect("failed to spawn peer worker thread")
            })
            .collect()
    }
}

fn worker_loop(
    queue: Arc<PeerQueue>,
    manager: Arc<PieceManager>,
    info_hash: [u8; 20],
    my_peer_id: [u8; 20],
    logger: LoggerSender,
    fatal: FatalSlot,
) {
    loop {
        let endpoint = queue.pop_front();
        if endpoint.is_sentinel() {
            return;
        }
        if manager.is_complete() || fatal.lock().unwrap().is_some() {
            return;
        }

        let mut session = PeerSession::new(
            endpoint,
            info_hash,
            my_peer_id,
            Arc::clone(&manager),
            logger.clone(),
        );
        if let Err(err) = session.run() {
            match err {
                SessionError::Scheduler(SchedulerError::FileIo(io_err)) => {
                    logger.warn(&format!("fatal disk error, aborting run: {io_err}"));
                    *fatal.lock().unwrap() = Some(SchedulerError::FileIo(io_err));
                    return;
                }
                other => {
                    logger.warn(&format!(
                        "session with {}:{} ended: {:?}",
                        endpoint.ip, endpoint.port, other
                    ));
                }
            }
        }
    }
}

/// Sleeps up to `total_seconds`, waking early if the download completes, the
/// peer queue runs dry, or a worker has reported a fatal error.
fn sleep_in_ticks(total_seconds: u64, manager: &PieceManager, queue: &PeerQueue, fatal: &FatalSlot) {
    let mut remaining = total_seconds;
    while remaining > 0 && !manager.is_complete() && !queue.is_empty() && fatal.lock().unwrap().is_none() {
        let tick = remaining.min(1);
        thread::sleep(Duration::from_secs(tick));
        remaining -= tick;
    }
}

/// Generates a 20-byte Azureus-style peer id: an 8-byte client tag followed
/// by 12 random ASCII digits.
fn generate_peer_id() -> [u8; 20] {
    let mut id = [0u8; 20];
    id[0..8].copy_from_slice(CLIENT_ID.as_bytes());
    let mut rng = rand::thread_rng();
    for byte in &mut id[8..20] {
        *byte = rng.gen_range(b'0'..=b'9');
    }
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_peer_id_has_client_tag_prefix_and_digit_suffix() {
        let id = generate_peer_id();
        assert_eq!(&id[0..8], CLIENT_ID.as_bytes());
        assert!(id[8..20].iter().all(u8::is_ascii_digit));
    }
}
