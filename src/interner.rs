//! String interning over byte buffers.
//!
//! Candidates are `BufView`s into caller buffers, so probing never copies.
//! Only a newly minted string copies its range into a private `StrBuf`.

use crate::address::{Address, Interned};
use crate::buf::BufView;
use crate::error::Result;
use crate::hash::hash_bytes;
use crate::master_set::{KeyStrategy, MasterSet, Prepare};
use core::fmt;
use serde::{Serialize, Serializer};
use std::cell::OnceCell;

/// Owned copy of an interned byte range, decoded to text on demand.
pub struct StrBuf {
    bytes: Box<[u8]>,
    text: OnceCell<String>,
}

impl StrBuf {
    pub fn new(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.into(),
            text: OnceCell::new(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Decoded text (lossy UTF-8), computed once.
    pub fn as_str(&self) -> &str {
        self.text
            .get_or_init(|| String::from_utf8_lossy(&self.bytes).into_owned())
    }

    pub fn is_decoded(&self) -> bool {
        self.text.get().is_some()
    }

    pub fn view(&self) -> BufView<'_> {
        BufView::whole(&self.bytes)
    }
}

impl fmt::Display for StrBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for StrBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

// Text only when the bytes are valid UTF-8; a lossy decode could make two
// different strings render the same.
impl Serialize for StrBuf {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        match core::str::from_utf8(&self.bytes) {
            Ok(text) => serializer.serialize_str(text),
            Err(_) => serializer.serialize_bytes(&self.bytes),
        }
    }
}

/// Interned string handle.
pub type Str = Interned<StrBuf>;

/// Byte-range hashing, equality and construction.
#[derive(Copy, Clone, Debug, Default)]
pub struct StrStrategy;

impl KeyStrategy for StrStrategy {
    type Candidate<'a> = BufView<'a>;
    type Stored = Str;

    fn hash(&self, candidate: &BufView<'_>) -> u32 {
        hash_bytes(candidate.as_bytes())
    }

    fn equal(&self, prev: &Str, candidate: &BufView<'_>) -> bool {
        prev.view().eq_range(candidate)
    }

    fn merge(&self, addr: Address, prev: Option<&Str>, candidate: Option<&BufView<'_>>) -> Str {
        match (prev, candidate) {
            (Some(prev), _) => prev.clone(),
            (None, Some(c)) => Interned::new(addr, StrBuf::new(c.as_bytes())),
            (None, None) => Interned::new(addr, StrBuf::new(&[])),
        }
    }
}

impl Prepare<str> for StrStrategy {
    fn prepare<'a>(&self, raw: &'a str) -> BufView<'a> {
        BufView::from(raw)
    }
}

impl Prepare<[u8]> for StrStrategy {
    fn prepare<'a>(&self, raw: &'a [u8]) -> BufView<'a> {
        BufView::whole(raw)
    }
}

impl<'b> Prepare<BufView<'b>> for StrStrategy {
    fn prepare<'a>(&self, raw: &'a BufView<'b>) -> BufView<'a> {
        *raw
    }
}

/// A deduplicating string table.
pub type Interner = MasterSet<StrStrategy>;

impl MasterSet<StrStrategy> {
    pub fn strings() -> Self {
        Self::new(StrStrategy)
    }

    pub fn intern(&self, s: &str) -> Result<Str> {
        self.put_raw(s)
    }

    /// Intern `src[off..lim]` without copying unless it is new.
    pub fn intern_range(&self, src: &[u8], off: usize, lim: usize) -> Result<Str> {
        self.put_create(&BufView::new(src, off, lim))
    }
}
