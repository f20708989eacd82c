//! Key layout and value encoding for the namespace keyspace.
//!
//! Keys: file entries are `F: + parent_id(BE) + filename`, segment entries
//! are `S: + file_id(BE) + offset(BE)`. Big-endian id and offset components
//! keep the byte order of keys aligned with their numeric order, so one
//! prefix scan lists a directory or a file's segments in order.
//!
//! Values: a one-byte version envelope followed by the prost encoding of
//! the descriptor.

use common::nameserver::{FileInfo as ProtoFileInfo, PageFileSegment as ProtoSegment};
use common::{FileInfo, InodeId, PageFileSegment};
use prost::Message;

use crate::storage::{StoreError, StoreResult};

pub const FILE_PREFIX: &[u8] = b"F:";
pub const SEGMENT_PREFIX: &[u8] = b"S:";

const ENCODING_VERSION: u8 = 1;

/// Key of the file entry `(parent_id, filename)`.
pub fn file_key(parent_id: InodeId, filename: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(FILE_PREFIX.len() + 8 + filename.len());
    key.extend_from_slice(FILE_PREFIX);
    key.extend_from_slice(&parent_id.to_be_bytes());
    key.extend_from_slice(filename.as_bytes());
    key
}

/// Common prefix of every child entry of a directory.
pub fn file_prefix(parent_id: InodeId) -> Vec<u8> {
    let mut key = Vec::with_capacity(FILE_PREFIX.len() + 8);
    key.extend_from_slice(FILE_PREFIX);
    key.extend_from_slice(&parent_id.to_be_bytes());
    key
}

/// Key of the segment entry `(file_id, start_offset)`.
pub fn segment_key(file_id: InodeId, offset: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(SEGMENT_PREFIX.len() + 16);
    key.extend_from_slice(SEGMENT_PREFIX);
    key.extend_from_slice(&file_id.to_be_bytes());
    key.extend_from_slice(&offset.to_be_bytes());
    key
}

/// Common prefix of every segment entry of a file.
pub fn segment_prefix(file_id: InodeId) -> Vec<u8> {
    let mut key = Vec::with_capacity(SEGMENT_PREFIX.len() + 8);
    key.extend_from_slice(SEGMENT_PREFIX);
    key.extend_from_slice(&file_id.to_be_bytes());
    key
}

pub fn encode_file(info: &FileInfo) -> Vec<u8> {
    let proto: ProtoFileInfo = info.clone().into();
    let mut buf = Vec::with_capacity(1 + proto.encoded_len());
    buf.push(ENCODING_VERSION);
    buf.extend_from_slice(&proto.encode_to_vec());
    buf
}

pub fn decode_file(bytes: &[u8]) -> StoreResult<FileInfo> {
    let payload = check_version(bytes)?;
    let proto = ProtoFileInfo::decode(payload)
        .map_err(|e| StoreError::Internal(format!("failed to decode FileInfo: {}", e)))?;
    FileInfo::try_from(proto).map_err(StoreError::Internal)
}

pub fn encode_segment(segment: &PageFileSegment) -> Vec<u8> {
    let proto: ProtoSegment = segment.clone().into();
    let mut buf = Vec::with_capacity(1 + proto.encoded_len());
    buf.push(ENCODING_VERSION);
    buf.extend_from_slice(&proto.encode_to_vec());
    buf
}

pub fn decode_segment(bytes: &[u8]) -> StoreResult<PageFileSegment> {
    let payload = check_version(bytes)?;
    let proto = ProtoSegment::decode(payload)
        .map_err(|e| StoreError::Internal(format!("failed to decode PageFileSegment: {}", e)))?;
    Ok(proto.into())
}

fn check_version(bytes: &[u8]) -> StoreResult<&[u8]> {
    match bytes.split_first() {
        Some((&ENCODING_VERSION, payload)) => Ok(payload),
        Some((version, _)) => Err(StoreError::Internal(format!(
            "unknown encoding version {}",
            version
        ))),
        None => Err(StoreError::Internal("empty stored value".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::ROOT_INODE_ID;

    #[test]
    fn test_file_keys_group_by_parent() {
        // Every key of parent 1 sorts before every key of parent 2.
        assert!(file_key(1, "zzz") < file_key(2, "aaa"));
        assert!(file_key(ROOT_INODE_ID, "b") < file_key(1, "a"));
        // Within one parent, keys sort by name.
        assert!(file_key(1, "a") < file_key(1, "b"));
        assert!(file_key(1, "a").starts_with(&file_prefix(1)));
        assert!(!file_key(2, "a").starts_with(&file_prefix(1)));
    }

    #[test]
    fn test_segment_keys_sort_by_offset() {
        let gib = 1u64 << 30;
        assert!(segment_key(7, 0) < segment_key(7, gib));
        assert!(segment_key(7, gib) < segment_key(7, 2 * gib));
        assert!(segment_key(7, 9 * gib).starts_with(&segment_prefix(7)));
        assert!(!segment_key(8, 0).starts_with(&segment_prefix(7)));
    }

    #[test]
    fn test_file_roundtrip() {
        let info = FileInfo::new_page_file(
            5,
            ROOT_INODE_ID,
            "vol".to_string(),
            "/vol".to_string(),
            10 << 30,
            1 << 30,
            16 << 20,
        );
        let decoded = decode_file(&encode_file(&info)).unwrap();
        assert_eq!(decoded.id, info.id);
        assert_eq!(decoded.full_path, info.full_path);
        assert_eq!(decoded.length, info.length);
        assert_eq!(decoded.seq_num, 1);
    }

    #[test]
    fn test_decode_rejects_unknown_version() {
        let info = FileInfo::new_directory(3, ROOT_INODE_ID, "d".to_string(), "/d".to_string());
        let mut bytes = encode_file(&info);
        bytes[0] = 9;
        assert!(matches!(
            decode_file(&bytes),
            Err(StoreError::Internal(_))
        ));
        assert!(matches!(decode_file(&[]), Err(StoreError::Internal(_))));
    }
}
