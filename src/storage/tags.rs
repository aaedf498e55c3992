//! Tag table encoding and lazy decoding
//!
//! Block layout:
//! ```text
//! count: u32
//! count × { key_len: u16, key: utf8, value_len: u16, value: utf8 }
//! ```
//!
//! A block is consistent when exactly `count` entries fill exactly the
//! block. A zero-length block stands for "no tags".
//!
//! Decoding never materializes the whole table: `Tags::iter` walks the
//! block entry by entry, so `get`/`has` stop at the first match.

use crate::storage::bytes::{u16_at, u32_at};
use crate::storage::error::{StoreError, StoreResult};

const COUNT_SIZE: usize = 4;
const LEN_SIZE: usize = 2;

/// One key/value pair, borrowed from the mapped block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TagEntry<'a> {
    pub key: &'a str,
    pub value: &'a str,
}

impl std::fmt::Display for TagEntry<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} = {}", self.key, self.value)
    }
}

/// Handle to an encoded tag block
///
/// Cheap to copy; every call to [`Tags::iter`] starts a fresh pass.
#[derive(Debug, Clone, Copy)]
pub struct Tags<'a> {
    block: &'a [u8],
    count: u32,
}

impl<'a> Tags<'a> {
    /// Wrap an encoded block, checking only that the count header is readable
    pub fn new(block: &'a [u8]) -> StoreResult<Self> {
        if block.is_empty() {
            return Ok(Self { block, count: 0 });
        }
        let count = u32_at(block, 0).ok_or_else(|| {
            StoreError::CorruptTagBlock(format!(
                "block of {} bytes is too short for its entry count",
                block.len()
            ))
        })?;
        Ok(Self { block, count })
    }

    /// Declared number of entries
    pub fn len(&self) -> usize {
        self.count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn iter(&self) -> TagIter<'a> {
        TagIter {
            block: self.block,
            pos: if self.block.is_empty() { 0 } else { COUNT_SIZE },
            index: 0,
            count: self.count,
            done: false,
        }
    }

    /// First value stored under `key`
    pub fn get(&self, key: &str) -> StoreResult<Option<&'a str>> {
        for entry in self.iter() {
            let entry = entry?;
            if entry.key == key {
                return Ok(Some(entry.value));
            }
        }
        Ok(None)
    }

    pub fn has(&self, key: &str) -> StoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Decode every entry, failing on the first inconsistency
    pub fn to_vec(&self) -> StoreResult<Vec<TagEntry<'a>>> {
        self.iter().collect()
    }
}

impl<'a> IntoIterator for Tags<'a> {
    type Item = StoreResult<TagEntry<'a>>;
    type IntoIter = TagIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a> IntoIterator for &Tags<'a> {
    type Item = StoreResult<TagEntry<'a>>;
    type IntoIter = TagIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazy pass over a tag block
///
/// Yields at most one error, then ends.
#[derive(Debug, Clone)]
pub struct TagIter<'a> {
    block: &'a [u8],
    pos: usize,
    index: u32,
    count: u32,
    done: bool,
}

impl<'a> TagIter<'a> {
    fn fail(&mut self, msg: String) -> Option<StoreResult<TagEntry<'a>>> {
        self.done = true;
        Some(Err(StoreError::CorruptTagBlock(msg)))
    }

    fn read_str(&mut self, what: &str) -> Result<&'a str, String> {
        let len = u16_at(self.block, self.pos).ok_or_else(|| {
            format!(
                "entry {} {} length at byte {} runs past block end ({} bytes)",
                self.index,
                what,
                self.pos,
                self.block.len()
            )
        })? as usize;
        let start = self.pos + LEN_SIZE;
        let bytes = self.block.get(start..start + len).ok_or_else(|| {
            format!(
                "entry {} {} of {} bytes runs past block end ({} bytes)",
                self.index,
                what,
                len,
                self.block.len()
            )
        })?;
        let s = std::str::from_utf8(bytes)
            .map_err(|e| format!("entry {} {} is not valid UTF-8: {}", self.index, what, e))?;
        self.pos = start + len;
        Ok(s)
    }
}

impl<'a> Iterator for TagIter<'a> {
    type Item = StoreResult<TagEntry<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if self.index == self.count {
            self.done = true;
            if self.pos != self.block.len() {
                let trailing = self.block.len() - self.pos;
                return self.fail(format!(
                    "{} trailing bytes after {} declared entries",
                    trailing, self.count
                ));
            }
            return None;
        }

        let key = match self.read_str("key") {
            Ok(key) => key,
            Err(msg) => return self.fail(msg),
        };
        let value = match self.read_str("value") {
            Ok(value) => value,
            Err(msg) => return self.fail(msg),
        };

        self.index += 1;
        Some(Ok(TagEntry { key, value }))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            return (0, Some(0));
        }
        // +1 for a possible trailing-bytes error
        let left = (self.count - self.index) as usize;
        (0, Some(left + 1))
    }
}

impl std::iter::FusedIterator for TagIter<'_> {}

/// Builds a tag block in insertion order
#[derive(Debug, Default)]
pub struct TagBlockEncoder {
    buf: Vec<u8>,
    count: u32,
}

impl TagBlockEncoder {
    pub fn new() -> Self {
        Self {
            buf: vec![0u8; COUNT_SIZE],
            count: 0,
        }
    }

    /// Append one pair; duplicates are kept
    pub fn push(&mut self, key: &str, value: &str) -> StoreResult<()> {
        for (what, s) in [("key", key), ("value", value)] {
            if s.len() > u16::MAX as usize {
                return Err(StoreError::Serialization(format!(
                    "tag {} of {} bytes exceeds {} bytes",
                    what,
                    s.len(),
                    u16::MAX
                )));
            }
        }
        self.count = self.count.checked_add(1).ok_or_else(|| {
            StoreError::Serialization("tag block holds more than u32::MAX entries".into())
        })?;

        self.buf.extend_from_slice(&(key.len() as u16).to_le_bytes());
        self.buf.extend_from_slice(key.as_bytes());
        self.buf.extend_from_slice(&(value.len() as u16).to_le_bytes());
        self.buf.extend_from_slice(value.as_bytes());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.buf[..COUNT_SIZE].copy_from_slice(&self.count.to_le_bytes());
        self.buf
    }
}

/// Encode a sequence of pairs into a tag block
pub fn encode_tags<'t, I>(tags: I) -> StoreResult<Vec<u8>>
where
    I: IntoIterator<Item = (&'t str, &'t str)>,
{
    let mut encoder = TagBlockEncoder::new();
    for (key, value) in tags {
        encoder.push(key, value)?;
    }
    Ok(encoder.finish())
}
