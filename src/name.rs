use std::fmt;

use bytes::Bytes;

/// Identifies a client session across a checkpoint/recover cycle.
///
/// A [`HybridLogCheckpointInfo`](crate::checkpoint::HybridLogCheckpointInfo)'s
/// `continue_tokens` map is keyed by this type: on recovery a session can look
/// up the logical address it had reached before the crash and resume from
/// there instead of replaying its own writes.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(Bytes);

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl From<&'static str> for SessionId {
    fn from(value: &'static str) -> Self {
        Self(Bytes::from_static(value.as_bytes()))
    }
}

impl SessionId {
    pub fn from_string(s: String) -> Self {
        Self(Bytes::from(s))
    }

    pub fn as_str(&self) -> &str {
        // Safety: constructors only ever hand us valid UTF8.
        unsafe { std::str::from_utf8_unchecked(&self.0) }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}
