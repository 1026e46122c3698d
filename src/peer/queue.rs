use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

use super::PeerEndpoint;

/// Thread-safe FIFO of peer endpoints: one mutex-guarded deque plus a
/// condvar so `pop_front` can block until an item (or a shutdown sentinel)
/// arrives.
#[derive(Default)]
pub struct PeerQueue {
    queue: Mutex<VecDeque<PeerEndpoint>>,
    not_empty: Condvar,
}

impl PeerQueue {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            not_empty: Condvar::new(),
        }
    }

    pub fn push_back(&self, endpoint: PeerEndpoint) {
        let mut queue = self.queue.lock().unwrap();
        queue.push_back(endpoint);
        self.not_empty.notify_one();
    }

    pub fn extend(&self, endpoints: impl IntoIterator<Item = PeerEndpoint>) {
        let mut queue = self.queue.lock().unwrap();
        queue.extend(endpoints);
        self.not_empty.notify_all();
    }

    /// Blocks until an endpoint is available, then returns it.
    pub fn pop_front(&self) -> PeerEndpoint {
        let mut queue = self.queue.lock().unwrap();
        loop {
            if let Some(endpoint) = queue.pop_front() {
                return endpoint;
            }
            queue = self.not_empty.wait(queue).unwrap();
        }
    }

    pub fn clear(&self) {
        let mut queue = self.queue.lock().unwrap();
        queue.clear();
        self.not_empty.notify_one();
    }

    pub fn size(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn pop_front_blocks_until_an_item_is_pushed() {
        let queue = Arc::new(PeerQueue::new());
        let reader = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.pop_front())
        };

        thread::sleep(Duration::from_millis(20));
        queue.push_back(PeerEndpoint::new([127, 0, 0, 1].into(), 6881));

        let endpoint = reader.join().unwrap();
        assert_eq!(endpoint.port, 6881);
    }

    #[test]
    fn clear_empties_the_queue() {
        let queue = PeerQueue::new();
        queue.push_back(PeerEndpoint::new([127, 0, 0, 1].into(), 1));
        queue.push_back(PeerEndpoint::new([127, 0, 0, 1].into(), 2));
        queue.clear();
        assert!(queue.is_empty());
    }

    #[test]
    fn size_tracks_pending_items() {
        let queue = PeerQueue::new();
        assert_eq!(queue.size(), 0);
        queue.push_back(PeerEndpoint::new([127, 0, 0, 1].into(), 1));
        assert_eq!(queue.size(), 1);
        queue.pop_front();
        assert_eq!(queue.size(), 0);
    }
}
