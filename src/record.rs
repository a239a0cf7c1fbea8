use zerocopy::byteorder::little_endian::U64;
use zerocopy::AsBytes;

use crate::address::LogicalAddress;

/// Fixed 8-byte header preceding every record in the log.
///
/// Bit layout, high to low: `[invalid:1][tombstone:1][version:14][previous_address:48]`.
/// An all-zero word is a [`RecordInfo::is_null`] padding gap, not a record.
#[repr(C)]
#[derive(Debug, Clone, Copy, zerocopy::AsBytes, zerocopy::FromBytes, zerocopy::FromZeroes)]
pub struct RecordInfo(U64);

const INVALID_BIT: u64 = 1 << 63;
const TOMBSTONE_BIT: u64 = 1 << 62;
const VERSION_SHIFT: u32 = 48;
const VERSION_MASK: u64 = (1 << 14) - 1;
const ADDRESS_MASK: u64 = (1 << 48) - 1;

impl RecordInfo {
    pub fn new(version: u16, previous_address: LogicalAddress, tombstone: bool) -> Self {
        assert!((version as u64) <= VERSION_MASK, "version does not fit in 14 bits");
        assert!(previous_address <= ADDRESS_MASK, "address does not fit in 48 bits");
        let mut word = (version as u64 & VERSION_MASK) << VERSION_SHIFT;
        word |= previous_address & ADDRESS_MASK;
        if tombstone {
            word |= TOMBSTONE_BIT;
        }
        Self(word.into())
    }

    pub fn null() -> Self {
        Self(0u64.into())
    }

    pub fn is_null(&self) -> bool {
        self.0.get() == 0
    }

    pub fn is_invalid(&self) -> bool {
        self.0.get() & INVALID_BIT != 0
    }

    pub fn set_invalid(&mut self, invalid: bool) {
        let mut word = self.0.get();
        if invalid {
            word |= INVALID_BIT;
        } else {
            word &= !INVALID_BIT;
        }
        self.0 = word.into();
    }

    pub fn is_tombstone(&self) -> bool {
        self.0.get() & TOMBSTONE_BIT != 0
    }

    pub fn version(&self) -> u16 {
        ((self.0.get() >> VERSION_SHIFT) & VERSION_MASK) as u16
    }

    pub fn previous_address(&self) -> LogicalAddress {
        self.0.get() & ADDRESS_MASK
    }
}

/// `RecordInfo || key_len: u32 || value_len: u32 || key bytes || value bytes`,
/// padded to an 8-byte boundary. A page never splits a record.
pub const RECORD_HEADER_LEN: usize = 16;

#[inline]
fn align_up(n: usize, to: usize) -> usize {
    (n + to - 1) & !(to - 1)
}

/// Computes the on-disk size (header + key + value, 8-byte aligned) of the
/// record whose `RecordInfo` starts at `bytes[0..]`. Panics if `bytes` is
/// shorter than a header; callers are expected to have already validated the
/// page window.
pub fn record_size(bytes: &[u8]) -> usize {
    let key_len = u32::from_le_bytes(bytes[8..12].try_into().unwrap()) as usize;
    let value_len = u32::from_le_bytes(bytes[12..16].try_into().unwrap()) as usize;
    align_up(RECORD_HEADER_LEN + key_len + value_len, 8)
}

pub fn read_info(bytes: &[u8]) -> RecordInfo {
    let word = u64::from_le_bytes(bytes[0..8].try_into().unwrap());
    RecordInfo(word.into())
}

pub fn write_info(bytes: &mut [u8], info: &RecordInfo) {
    bytes[0..8].copy_from_slice(info.as_bytes());
}

pub fn read_key(bytes: &[u8]) -> &[u8] {
    let key_len = u32::from_le_bytes(bytes[8..12].try_into().unwrap()) as usize;
    &bytes[RECORD_HEADER_LEN..RECORD_HEADER_LEN + key_len]
}

/// Encodes a full record (header + key + value) into a freshly allocated,
/// 8-byte-aligned buffer.
pub fn encode(info: &RecordInfo, key: &[u8], value: &[u8]) -> Vec<u8> {
    let size = align_up(RECORD_HEADER_LEN + key.len() + value.len(), 8);
    let mut buf = vec![0u8; size];
    write_info(&mut buf, info);
    buf[8..12].copy_from_slice(&(key.len() as u32).to_le_bytes());
    buf[12..16].copy_from_slice(&(value.len() as u32).to_le_bytes());
    buf[RECORD_HEADER_LEN..RECORD_HEADER_LEN + key.len()].copy_from_slice(key);
    buf[RECORD_HEADER_LEN + key.len()..RECORD_HEADER_LEN + key.len() + value.len()]
        .copy_from_slice(value);
    buf
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn pack_unpack_record_info() {
        let info = RecordInfo::new(7, 0xdead_beef, false);
        assert_eq!(info.version(), 7);
        assert_eq!(info.previous_address(), 0xdead_beef);
        assert!(!info.is_invalid());
        assert!(!info.is_null());

        let mut info = info;
        info.set_invalid(true);
        assert!(info.is_invalid());
        assert_eq!(info.version(), 7, "invalidating must not disturb other fields");
    }

    #[test]
    fn null_record_is_all_zero() {
        let info = RecordInfo::null();
        assert!(info.is_null());
        assert_eq!(info.as_bytes(), &[0u8; 8]);
    }

    #[test]
    fn encode_roundtrip() {
        let info = RecordInfo::new(3, 42, false);
        let buf = encode(&info, b"hello", b"world!");
        assert_eq!(buf.len() % 8, 0);
        assert_eq!(read_info(&buf).version(), 3);
        assert_eq!(read_key(&buf), b"hello");
        assert_eq!(record_size(&buf), buf.len());
    }
}
