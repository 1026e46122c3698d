use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::peer::wire::Bitfield;
use crate::storage::FileSink;
use crate::torrent::TorrentMeta;

use super::Piece;

const EXPIRY: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub enum SchedulerError {
    BitfieldLengthMismatch,
    PeerNotRegistered,
    ProtocolViolation,
    FileIo(std::io::Error),
}

struct SchedulerState {
    missing: Vec<Piece>,
    ongoing: Vec<Piece>,
    have: u32,
    pending: Vec<PendingRequest>,
    peers: HashMap<[u8; 20], Bitfield>,
    pieces_in_interval: u32,
}

struct PendingRequest {
    piece_index: u32,
    offset: u32,
    length: u32,
    issued_at: Instant,
}

/// Global download scheduler: piece/block state, peer bitfields, request
/// dispatch, timeout reissue, hash verification, and disk commit. A single
/// mutex guards every field that `state` touches; file writes happen while
/// it's held, serializing disk offsets by construction.
pub struct PieceManager {
    total_pieces: u32,
    piece_length: u32,
    max_connections: usize,
    state: Mutex<SchedulerState>,
    sink: Mutex<FileSink>,
    started_at: Instant,
}

impl PieceManager {
    pub fn new(
        meta: &TorrentMeta,
        output_dir: &str,
        max_connections: usize,
    ) -> Result<Self, SchedulerError> {
        let total_pieces = meta.total_pieces();
        let mut missing = Vec::with_capacity(total_pieces as usize);
        for index in 0..total_pieces {
            let hash: [u8; 20] = meta.info.piece_hash(index).try_into().unwrap();
            missing.push(Piece::new(index, hash, meta.info.piece_size(index)));
        }

        let sink = FileSink::create(output_dir, meta.name(), meta.length())
            .map_err(SchedulerError::FileIo)?;

        Ok(Self {
            total_pieces,
            piece_length: meta.piece_length(),
            max_connections,
            state: Mutex::new(SchedulerState {
                missing,
                ongoing: Vec::new(),
                have: 0,
                pending: Vec::new(),
                peers: HashMap::new(),
                pieces_in_interval: 0,
            }),
            sink: Mutex::new(sink),
            started_at: Instant::now(),
        })
    }

    pub fn is_complete(&self) -> bool {
        self.state.lock().unwrap().have == self.total_pieces
    }

    pub fn add_peer(&self, peer_id: [u8; 20], bitfield: Bitfield) -> Result<(), SchedulerError> {
        if bitfield.as_bytes().len() != Bitfield::expected_len(self.total_pieces) {
            return Err(SchedulerError::BitfieldLengthMismatch);
        }
        self.state.lock().unwrap().peers.insert(peer_id, bitfield);
        Ok(())
    }

    pub fn update_peer(&self, peer_id: [u8; 20], index: u32) -> Result<(), SchedulerError> {
        let mut state = self.state.lock().unwrap();
        match state.peers.get_mut(&peer_id) {
            Some(bitfield) => {
                bitfield.set_piece(index);
                Ok(())
            }
            None => Err(SchedulerError::PeerNotRegistered),
        }
    }

    pub fn remove_peer(&self, peer_id: [u8; 20]) {
        if self.is_complete() {
            return;
        }
        self.state.lock().unwrap().peers.remove(&peer_id);
    }

    pub fn peer_count(&self) -> usize {
        self.state.lock().unwrap().peers.len()
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    pub fn total_pieces(&self) -> u32 {
        self.total_pieces
    }

    pub fn have_pieces(&self) -> u32 {
        self.state.lock().unwrap().have
    }

    pub fn bytes_downloaded(&self) -> u64 {
        self.state.lock().unwrap().have as u64 * self.piece_length as u64
    }

    pub fn piece_length(&self) -> u32 {
        self.piece_length
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Drains and returns the number of pieces committed since the last call.
    pub fn take_pieces_in_interval(&self) -> u32 {
        let mut state = self.state.lock().unwrap();
        std::mem::take(&mut state.pieces_in_interval)
    }

    /// Selects the next block to request from `peer_id`, following:
    /// expired-request reissue, then continuation of an ongoing piece, then
    /// rarest-first selection of a new piece.
    pub fn next_request(&self, peer_id: [u8; 20]) -> Option<(u32, u32, u32)> {
        let mut state = self.state.lock().unwrap();

        if state.missing.is_empty() && !Self::has_dispatchable_ongoing(&state, peer_id) {
            return None;
        }
        if !state.peers.contains_key(&peer_id) {
            return None;
        }

        if let Some(block) = Self::expired_request(&mut state, peer_id) {
            return Some(block);
        }
        if let Some(block) = Self::next_ongoing(&mut state, peer_id) {
            return Some(block);
        }
        Self::start_new_piece(&mut state, peer_id)
    }

    fn has_dispatchable_ongoing(state: &SchedulerState, peer_id: [u8; 20]) -> bool {
        let Some(bitfield) = state.peers.get(&peer_id) else {
            return false;
        };
        state.ongoing.iter().any(|piece| {
            bitfield.has_piece(piece.index)
                && piece
                    .blocks
                    .iter()
                    .any(|b| b.status == super::BlockStatus::Missing)
        })
    }

    fn expired_request(state: &mut SchedulerState, peer_id: [u8; 20]) -> Option<(u32, u32, u32)> {
        let bitfield = state.peers.get(&peer_id)?.clone();
        let now = Instant::now();
        for pending in state.pending.iter_mut() {
            if bitfield.has_piece(pending.piece_index) && now.duration_since(pending.issued_at) >= EXPIRY {
                pending.issued_at = now;
                return Some((pending.piece_index, pending.offset, pending.length));
            }
        }
        None
    }

    fn next_ongoing(state: &mut SchedulerState, peer_id: [u8; 20]) -> Option<(u32, u32, u32)> {
        let bitfield = state.peers.get(&peer_id)?.clone();
        for piece in state.ongoing.iter_mut() {
            if !bitfield.has_piece(piece.index) {
                continue;
            }
            if let Some((offset, length)) = piece.next_request() {
                state.pending.push(PendingRequest {
                    piece_index: piece.index,
                    offset,
                    length,
                    issued_at: Instant::now(),
                });
                return Some((piece.index, offset, length));
            }
        }
        None
    }

    fn start_new_piece(state: &mut SchedulerState, peer_id: [u8; 20]) -> Option<(u32, u32, u32)> {
        let bitfield = state.peers.get(&peer_id)?.clone();

        let mut rarity: HashMap<u32, usize> = HashMap::new();
        for piece in &state.missing {
            if !bitfield.has_piece(piece.index) {
                continue;
            }
            let count = state
                .peers
                .values()
                .filter(|b| b.has_piece(piece.index))
                .count();
            rarity.insert(piece.index, count);
        }

        let rarest_index = rarity
            .iter()
            .min_by(|a, b| a.1.cmp(b.1).then(a.0.cmp(b.0)))
            .map(|(index, _)| *index)?;

        let position = state
            .missing
            .iter()
            .position(|piece| piece.index == rarest_index)?;
        let mut piece = state.missing.remove(position);
        let (offset, length) = piece.next_request()?;
        let piece_index = piece.index;
        state.ongoing.push(piece);
        state.pending.push(PendingRequest {
            piece_index,
            offset,
            length,
            issued_at: Instant::now(),
        });
        Some((piece_index, offset, length))
    }

    /// Records a received block, verifying and committing the piece once
    /// every block has arrived.
    pub fn block_received(
        &self,
        index: u32,
        offset: u32,
        data: Vec<u8>,
    ) -> Result<(), SchedulerError> {
        let mut state = self.state.lock().unwrap();

        state
            .pending
            .retain(|p| !(p.piece_index == index && p.offset == offset));

        let position = state
            .ongoing
            .iter()
            .position(|piece| piece.index == index)
            .ok_or(SchedulerError::ProtocolViolation)?;

        state.ongoing[position].block_received(offset, data);

        if !state.ongoing[position].is_complete() {
            return Ok(());
        }

        if state.ongoing[position].hash_matches() {
            let piece = state.ongoing.remove(position);
            let piece_offset = piece.index as u64 * self.piece_length as u64;
            let bytes = piece.data();
            self.sink
                .lock()
                .unwrap()
                .write_at(piece_offset, &bytes)
                .map_err(SchedulerError::FileIo)?;
            state.have += 1;
            state.pieces_in_interval += 1;
        } else {
            state.ongoing[position].reset();
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::torrent::Info;
    use sha1::{Digest, Sha1};
    use std::fs;

    fn temp_dir(name: &str) -> String {
        format!("{}/bitpull-pm-test-{}", std::env::temp_dir().display(), name)
    }

    fn meta_with_one_piece(data: &[u8]) -> TorrentMeta {
        let hash: [u8; 20] = Sha1::digest(data).into();
        TorrentMeta {
            announce: "http://tracker/announce".to_string(),
            info: Info {
                name: "a.bin".to_string(),
                length: data.len() as u64,
                piece_length: data.len() as u32,
                pieces: hash.to_vec(),
            },
            info_hash: [0u8; 20],
        }
    }

    #[test]
    fn single_peer_single_piece_scenario_completes_and_writes_file() {
        let dir = temp_dir("single");
        let data = vec![7u8; 20];
        let meta = meta_with_one_piece(&data);

        let manager = PieceManager::new(&meta, &dir, 1).unwrap();
        let peer = [1u8; 20];
        manager.add_peer(peer, Bitfield::new(vec![0b1000_0000])).unwrap();

        let (index, offset, length) = manager.next_request(peer).unwrap();
        assert_eq!((index, offset), (0, 0));
        assert_eq!(length as usize, data.len());

        manager.block_received(index, offset, data.clone()).unwrap();
        assert!(manager.is_complete());

        let written = fs::read(format!("{}/a.bin", dir)).unwrap();
        assert_eq!(written, data);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn rarest_first_prefers_piece_held_by_fewest_peers() {
        let dir = temp_dir("rarest");
        let hashes = vec![0u8; 60];
        let meta = TorrentMeta {
            announce: "http://tracker/announce".to_string(),
            info: Info {
                name: "a.bin".to_string(),
                length: 30,
                piece_length: 10,
                pieces: hashes,
            },
            info_hash: [0u8; 20],
        };
        let manager = PieceManager::new(&meta, &dir, 3).unwrap();

        let p1 = [1u8; 20];
        let p2 = [2u8; 20];
        let p3 = [3u8; 20];
        // bitfields: p1 -> 110, p2 -> 100, p3 -> 111 (piece 2 is rarest: count 1)
        manager.add_peer(p1, Bitfield::new(vec![0b1100_0000])).unwrap();
        manager.add_peer(p2, Bitfield::new(vec![0b1000_0000])).unwrap();
        manager.add_peer(p3, Bitfield::new(vec![0b1110_0000])).unwrap();

        let (index, _, _) = manager.next_request(p3).unwrap();
        assert_eq!(index, 2);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn hash_mismatch_resets_piece_and_it_can_be_redownloaded() {
        let dir = temp_dir("mismatch");
        let data = vec![7u8; 20];
        let meta = meta_with_one_piece(&data);
        let manager = PieceManager::new(&meta, &dir, 1).unwrap();
        let peer = [9u8; 20];
        manager.add_peer(peer, Bitfield::new(vec![0b1000_0000])).unwrap();

        let (index, offset, _) = manager.next_request(peer).unwrap();
        manager.block_received(index, offset, vec![0u8; 20]).unwrap();
        assert!(!manager.is_complete());

        let (index, offset, _) = manager.next_request(peer).unwrap();
        manager.block_received(index, offset, data).unwrap();
        assert!(manager.is_complete());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn duplicate_late_block_after_completion_does_not_error() {
        let dir = temp_dir("duplicate");
        let data = vec![7u8; 20];
        let meta = meta_with_one_piece(&data);
        let manager = PieceManager::new(&meta, &dir, 1).unwrap();
        let peer = [3u8; 20];
        manager.add_peer(peer, Bitfield::new(vec![0b1000_0000])).unwrap();

        let (index, offset, _) = manager.next_request(peer).unwrap();
        manager.block_received(index, offset, data).unwrap();
        assert!(manager.is_complete());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn add_peer_rejects_bitfield_length_mismatch() {
        let dir = temp_dir("badlen");
        let data = vec![7u8; 20];
        let meta = meta_with_one_piece(&data);
        let manager = PieceManager::new(&meta, &dir, 1).unwrap();
        let result = manager.add_peer([1u8; 20], Bitfield::new(vec![0, 0]));
        assert!(matches!(result, Err(SchedulerError::BitfieldLengthMismatch)));
        fs::remove_dir_all(&dir).unwrap();
    }
}
