use std::collections::HashMap;
use std::path::Path;

use zerocopy::byteorder::little_endian::{U32, U64};
use zerocopy::{AsBytes, FromBytes, FromZeroes};

use crate::address::LogicalAddress;
use crate::error::{Error, Result};
use crate::name::SessionId;

#[repr(C)]
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
struct IndexInfoHeader {
    final_logical_address: U64,
    num_segment_offsets: U64,
    /// crc32 of the preceding fields of this header. Must stay last.
    checksum: U32,
    _pad: U32,
}

fn crc32_of(bytes: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(bytes);
    hasher.finalize()
}

/// Metadata describing a fuzzy snapshot of the in-memory hash index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexCheckpointInfo {
    /// Log cut-point at which the index snapshot began; recovery's log
    /// replay starts here.
    pub final_logical_address: LogicalAddress,
    /// Per-segment byte offsets of the companion object log, copied verbatim
    /// into the live log's offset table by `IndexRestorer`.
    pub object_log_segment_offsets: Vec<u64>,
}

impl IndexCheckpointInfo {
    pub fn encode(&self) -> Vec<u8> {
        let mut header = IndexInfoHeader {
            final_logical_address: self.final_logical_address.into(),
            num_segment_offsets: (self.object_log_segment_offsets.len() as u64).into(),
            checksum: 0u32.into(),
            _pad: 0u32.into(),
        };
        let checksum_off = memoffset::offset_of!(IndexInfoHeader, checksum);
        header.checksum = crc32_of(&header.as_bytes()[..checksum_off]).into();

        let mut buf = header.as_bytes().to_vec();
        for offset in &self.object_log_segment_offsets {
            buf.extend_from_slice(&offset.to_le_bytes());
        }
        buf
    }

    pub fn decode(bytes: &[u8], path: &Path) -> Result<Self> {
        let header_len = std::mem::size_of::<IndexInfoHeader>();
        if bytes.len() < header_len {
            return Err(Error::CorruptMetadata {
                path: path.to_path_buf(),
                reason: "info.dat shorter than fixed header".into(),
            });
        }
        let header = IndexInfoHeader::ref_from_prefix(bytes).ok_or_else(|| Error::CorruptMetadata {
            path: path.to_path_buf(),
            reason: "failed to parse fixed header".into(),
        })?;
        let checksum_off = memoffset::offset_of!(IndexInfoHeader, checksum);
        let expected = crc32_of(&bytes[..checksum_off]);
        if expected != header.checksum.get() {
            return Err(Error::CorruptMetadata {
                path: path.to_path_buf(),
                reason: "checksum mismatch".into(),
            });
        }

        let num_offsets = header.num_segment_offsets.get() as usize;
        let mut object_log_segment_offsets = Vec::with_capacity(num_offsets);
        let mut pos = header_len;
        for _ in 0..num_offsets {
            let chunk = bytes.get(pos..pos + 8).ok_or_else(|| Error::CorruptMetadata {
                path: path.to_path_buf(),
                reason: "truncated segment offset table".into(),
            })?;
            object_log_segment_offsets.push(u64::from_le_bytes(chunk.try_into().unwrap()));
            pos += 8;
        }

        Ok(Self {
            final_logical_address: header.final_logical_address.get(),
            object_log_segment_offsets,
        })
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
struct LogInfoHeader {
    version: U32,
    flushed_logical_address: U64,
    final_logical_address: U64,
    start_logical_address: U64,
    num_continue_tokens: U64,
    checksum: U32,
}

/// Metadata describing a checkpoint of the hybrid log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HybridLogCheckpointInfo {
    /// The store's logical epoch at checkpoint time; recovery accepts
    /// records with `version <= version` and rewinds the rest.
    pub version: u16,
    /// Everything below this address is durable on the main log device.
    pub flushed_logical_address: LogicalAddress,
    /// The log's tail at checkpoint time; replay stops here.
    pub final_logical_address: LogicalAddress,
    /// Lower bound of the fuzzy region the index snapshot may still be
    /// missing writes from; replay starts here.
    pub start_logical_address: LogicalAddress,
    /// Per-session resume points, rehydrated by `RecoveryDriver` into a
    /// thread-safe map after replay completes.
    pub continue_tokens: HashMap<SessionId, LogicalAddress>,
}

impl HybridLogCheckpointInfo {
    pub fn encode(&self) -> Vec<u8> {
        let mut header = LogInfoHeader {
            version: (self.version as u32).into(),
            flushed_logical_address: self.flushed_logical_address.into(),
            final_logical_address: self.final_logical_address.into(),
            start_logical_address: self.start_logical_address.into(),
            num_continue_tokens: (self.continue_tokens.len() as u64).into(),
            checksum: 0u32.into(),
        };
        let checksum_off = memoffset::offset_of!(LogInfoHeader, checksum);
        header.checksum = crc32_of(&header.as_bytes()[..checksum_off]).into();

        let mut buf = header.as_bytes().to_vec();
        for (session, addr) in &self.continue_tokens {
            let key = session.as_slice();
            buf.extend_from_slice(&(key.len() as u32).to_le_bytes());
            buf.extend_from_slice(key);
            buf.extend_from_slice(&addr.to_le_bytes());
        }
        buf
    }

    pub fn decode(bytes: &[u8], path: &Path) -> Result<Self> {
        let header_len = std::mem::size_of::<LogInfoHeader>();
        if bytes.len() < header_len {
            return Err(Error::CorruptMetadata {
                path: path.to_path_buf(),
                reason: "info.dat shorter than fixed header".into(),
            });
        }
        let header = LogInfoHeader::ref_from_prefix(bytes).ok_or_else(|| Error::CorruptMetadata {
            path: path.to_path_buf(),
            reason: "failed to parse fixed header".into(),
        })?;
        let checksum_off = memoffset::offset_of!(LogInfoHeader, checksum);
        let expected = crc32_of(&bytes[..checksum_off]);
        if expected != header.checksum.get() {
            return Err(Error::CorruptMetadata {
                path: path.to_path_buf(),
                reason: "checksum mismatch".into(),
            });
        }

        let mut continue_tokens = HashMap::new();
        let mut pos = header_len;
        for _ in 0..header.num_continue_tokens.get() {
            let len_bytes = bytes.get(pos..pos + 4).ok_or_else(|| Error::CorruptMetadata {
                path: path.to_path_buf(),
                reason: "truncated continue-token table".into(),
            })?;
            let key_len = u32::from_le_bytes(len_bytes.try_into().unwrap()) as usize;
            pos += 4;
            let key_bytes = bytes.get(pos..pos + key_len).ok_or_else(|| Error::CorruptMetadata {
                path: path.to_path_buf(),
                reason: "truncated continue-token key".into(),
            })?;
            let session = SessionId::from_string(String::from_utf8_lossy(key_bytes).into_owned());
            pos += key_len;
            let addr_bytes = bytes.get(pos..pos + 8).ok_or_else(|| Error::CorruptMetadata {
                path: path.to_path_buf(),
                reason: "truncated continue-token address".into(),
            })?;
            continue_tokens.insert(session, u64::from_le_bytes(addr_bytes.try_into().unwrap()));
            pos += 8;
        }

        Ok(Self {
            version: header.version.get() as u16,
            flushed_logical_address: header.flushed_logical_address.get(),
            final_logical_address: header.final_logical_address.get(),
            start_logical_address: header.start_logical_address.get(),
            continue_tokens,
        })
    }
}
