use sha1::{Digest, Sha1};

use crate::bencode::Bencode;

use super::{Info, MalformedMeta, TorrentMeta, PIECE_HASH_LEN};

/// Parses the raw bytes of a `.torrent` file into a [`TorrentMeta`].
pub struct TorrentParser;

impl TorrentParser {
    pub fn parse(data: &[u8]) -> Result<TorrentMeta, MalformedMeta> {
        let root = Bencode::decode(data).map_err(MalformedMeta::Bencode)?;
        let root = as_dict(&root)?;

        let announce = match root.get(b"announce".as_slice()) {
            Some(Bencode::Str(bytes)) => String::from_utf8_lossy(bytes).into_owned(),
            _ => return Err(MalformedMeta::MissingAnnounce),
        };

        let info_value = root
            .get(b"info".as_slice())
            .ok_or(MalformedMeta::MissingInfo)?;
        let info_hash = Self::compute_info_hash(info_value);
        let info = Self::parse_info(info_value)?;

        Ok(TorrentMeta {
            announce,
            info,
            info_hash,
        })
    }

    fn compute_info_hash(info_value: &Bencode) -> [u8; 20] {
        let bytes = info_value.encode();
        let digest = Sha1::digest(bytes);
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&digest);
        hash
    }

    fn parse_info(info_value: &Bencode) -> Result<Info, MalformedMeta> {
        let dict = as_dict(info_value)?;

        let name = match dict.get(b"name".as_slice()) {
            Some(Bencode::Str(bytes)) => String::from_utf8_lossy(bytes).into_owned(),
            _ => return Err(MalformedMeta::MissingName),
        };

        let length = match dict.get(b"length".as_slice()) {
            Some(Bencode::Int(n)) if *n >= 0 => *n as u64,
            _ => return Err(MalformedMeta::MissingLength),
        };

        let piece_length = match dict.get(b"piece length".as_slice()) {
            Some(Bencode::Int(n)) if *n > 0 => *n as u32,
            _ => return Err(MalformedMeta::MissingPieceLength),
        };

        let pieces = match dict.get(b"pieces".as_slice()) {
            Some(Bencode::Str(bytes)) => bytes.clone(),
            _ => return Err(MalformedMeta::MissingPieces),
        };
        if pieces.len() % PIECE_HASH_LEN != 0 {
            return Err(MalformedMeta::PiecesLengthNotMultipleOf20);
        }

        Ok(Info {
            name,
            length,
            piece_length,
            pieces,
        })
    }
}

fn as_dict(value: &Bencode) -> Result<&std::collections::BTreeMap<Vec<u8>, Bencode>, MalformedMeta> {
    match value {
        Bencode::Dict(dict) => Ok(dict),
        _ => Err(MalformedMeta::NotADict),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bencode::DictBuilder;

    fn sample_torrent_bytes(piece_hash: &[u8]) -> Vec<u8> {
        let info = DictBuilder::new()
            .insert(b"name", "a.bin")
            .insert(b"length", 20i64)
            .insert(b"piece length", 262_144i64)
            .insert(b"pieces", Bencode::Str(piece_hash.to_vec()))
            .build();
        DictBuilder::new()
            .insert(b"announce", "http://tracker/announce")
            .insert(b"info", info)
            .build()
            .encode()
    }

    #[test]
    fn parses_a_well_formed_single_file_torrent() {
        let piece_hash = [7u8; 20];
        let bytes = sample_torrent_bytes(&piece_hash);

        let meta = TorrentParser::parse(&bytes).unwrap();

        assert_eq!(meta.announce, "http://tracker/announce");
        assert_eq!(meta.name(), "a.bin");
        assert_eq!(meta.length(), 20);
        assert_eq!(meta.piece_length(), 262_144);
        assert_eq!(meta.total_pieces(), 1);
        assert_eq!(meta.info.piece_hash(0), piece_hash);
    }

    #[test]
    fn info_hash_is_sha1_of_the_info_subdict_bytes() {
        let piece_hash = [1u8; 20];
        let bytes = sample_torrent_bytes(&piece_hash);
        let root = Bencode::decode(&bytes).unwrap();
        let info_value = match &root {
            Bencode::Dict(d) => d.get(b"info".as_slice()).unwrap(),
            _ => unreachable!(),
        };
        let expected = Sha1::digest(info_value.encode());

        let meta = TorrentParser::parse(&bytes).unwrap();
        assert_eq!(meta.info_hash.as_slice(), expected.as_slice());
    }

    #[test]
    fn rejects_missing_announce() {
        let info = DictBuilder::new()
            .insert(b"name", "a.bin")
            .insert(b"length", 20i64)
            .insert(b"piece length", 262_144i64)
            .insert(b"pieces", Bencode::Str(vec![0u8; 20]))
            .build();
        let bytes = DictBuilder::new().insert(b"info", info).build().encode();

        assert_eq!(
            TorrentParser::parse(&bytes).unwrap_err(),
            MalformedMeta::MissingAnnounce
        );
    }

    #[test]
    fn rejects_pieces_length_not_multiple_of_20() {
        let info = DictBuilder::new()
            .insert(b"name", "a.bin")
            .insert(b"length", 20i64)
            .insert(b"piece length", 262_144i64)
            .insert(b"pieces", Bencode::Str(vec![0u8; 19]))
            .build();
        let bytes = DictBuilder::new()
            .insert(b"announce", "http://tracker/announce")
            .insert(b"info", info)
            .build()
            .encode();

        assert_eq!(
            TorrentParser::parse(&bytes).unwrap_err(),
            MalformedMeta::PiecesLengthNotMultipleOf20
        );
    }

    #[test]
    fn last_piece_size_is_the_remainder() {
        let pieces = vec![0u8; 40];
        let info = Info {
            name: "a.bin".to_string(),
            length: 300_000,
            piece_length: 262_144,
            pieces,
        };
        assert_eq!(info.total_pieces(), 2);
        assert_eq!(info.piece_size(0), 262_144);
        assert_eq!(info.piece_size(1), 300_000 - 262_144);
    }

    #[test]
    fn last_piece_exact_multiple_is_full_length() {
        let info = Info {
            name: "a.bin".to_string(),
            length: 524_288,
            piece_length: 262_144,
            pieces: vec![0u8; 40],
        };
        assert_eq!(info.piece_size(1), 262_144);
    }
}
