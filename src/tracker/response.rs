use std::net::Ipv4Addr;

use crate::bencode::{Bencode, BencodeError};
use crate::peer::PeerEndpoint;

#[derive(Debug)]
pub struct TrackerResponse {
    pub interval: i64,
    pub peers: Vec<PeerEndpoint>,
}

#[derive(Debug)]
pub enum TrackerResponseError {
    Bencode(BencodeError),
    NotADict,
    InvalidInterval,
    InvalidPeers,
    CompactLengthNotMultipleOf6,
}

impl TrackerResponse {
    /// Parses a bencoded tracker response body. `peers` may be a compact
    /// byte string (6 bytes per peer) or a list of per-peer dicts with `ip`
    /// and `port` keys.
    pub fn parse(body: &[u8]) -> Result<Self, TrackerResponseError> {
        let decoded = Bencode::decode(body).map_err(TrackerResponseError::Bencode)?;
        let Bencode::Dict(dict) = decoded else {
            return Err(TrackerResponseError::NotADict);
        };

        let interval = match dict.get(b"interval".as_slice()) {
            Some(Bencode::Int(n)) => *n,
            Some(_) => return Err(TrackerResponseError::InvalidInterval),
            None => 0,
        };

        let peers = match dict.get(b"peers".as_slice()) {
            Some(Bencode::Str(bytes)) => Self::parse_compact_peers(bytes)?,
            Some(Bencode::List(list)) => Self::parse_dict_peers(list)?,
            Some(_) => return Err(TrackerResponseError::InvalidPeers),
            None => Vec::new(),
        };

        Ok(Self { interval, peers })
    }

    fn parse_compact_peers(bytes: &[u8]) -> Result<Vec<PeerEndpoint>, TrackerResponseError> {
        if bytes.len() % 6 != 0 {
            return Err(TrackerResponseError::CompactLengthNotMultipleOf6);
        }
        Ok(bytes
            .chunks(6)
            .map(|chunk| {
                let ip = Ipv4Addr::new(chunk[0], chunk[1], chunk[2], chunk[3]);
                let port = u16::from_be_bytes([chunk[4], chunk[5]]);
                PeerEndpoint::new(ip, port)
            })
            .collect())
    }

    fn parse_dict_peers(list: &[Bencode]) -> Result<Vec<PeerEndpoint>, TrackerResponseError> {
        let mut peers = Vec::with_capacity(list.len());
        for entry in list {
            let Bencode::Dict(peer_dict) = entry else {
                return Err(TrackerResponseError::InvalidPeers);
            };
            let ip = match peer_dict.get(b"ip".as_slice()) {
                Some(Bencode::Str(bytes)) => {
                    std::str::from_utf8(bytes)
                        .ok()
                        .and_then(|s| s.parse::<Ipv4Addr>().ok())
                        .ok_or(TrackerResponseError::InvalidPeers)?
                }
                _ => return Err(TrackerResponseError::InvalidPeers),
            };
            let port = match peer_dict.get(b"port".as_slice()) {
                Some(Bencode::Int(n)) if *n >= 0 && *n <= u16::MAX as i64 => *n as u16,
                _ => return Err(TrackerResponseError::InvalidPeers),
            };
            peers.push(PeerEndpoint::new(ip, port));
        }
        Ok(peers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bencode::DictBuilder;

    #[test]
    fn parses_compact_peer_string() {
        let mut body = b"d8:intervali900e5:peers12:".to_vec();
        body.extend([127, 0, 0, 1, 0x1a, 0xe1]);
        body.extend([10, 0, 0, 2, 0x1a, 0xe2]);
        body.push(b'e');

        let response = TrackerResponse::parse(&body).unwrap();
        assert_eq!(response.interval, 900);
        assert_eq!(response.peers.len(), 2);
        assert_eq!(response.peers[0].port, 0x1ae1);
    }

    #[test]
    fn rejects_compact_peers_with_bad_length() {
        let mut body = b"d5:peers1:".to_vec();
        body.push(b'X');
        body.push(b'e');
        assert!(matches!(
            TrackerResponse::parse(&body),
            Err(TrackerResponseError::CompactLengthNotMultipleOf6)
        ));
    }

    #[test]
    fn parses_list_of_peer_dicts() {
        let peer = DictBuilder::new()
            .insert(b"ip", "127.0.0.1")
            .insert(b"port", 6881i64)
            .build();
        let body = Bencode::Dict(
            [
                (b"interval".to_vec(), Bencode::Int(300)),
                (b"peers".to_vec(), Bencode::List(vec![peer])),
            ]
            .into_iter()
            .collect(),
        )
        .encode();

        let response = TrackerResponse::parse(&body).unwrap();
        assert_eq!(response.peers.len(), 1);
        assert_eq!(response.peers[0].port, 6881);
    }
}
