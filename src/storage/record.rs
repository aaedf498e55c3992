//! Feature record codec
//!
//! Record layout inside a container region:
//! ```text
//! type_tag:  u8        0 node, 1 way, 2 relation
//! flags:     u8        reserved, must be 0
//! id:        u64
//! geom_len:  u32
//! geometry:  [u8; geom_len]   opaque to this crate
//! tags_len:  u32
//! tag_block: [u8; tags_len]   see `storage::tags`
//! ```
//!
//! Decoding is a pure function of the input bytes, so records can be
//! decoded from any number of threads over the same mapping.

use crate::storage::bytes::{u32_at, u64_at};
use crate::storage::error::{StoreError, StoreResult};
use crate::storage::types::{ByteRange, FeatureKey, FeatureRecord, FeatureType};

/// Bytes of a record that precede the geometry payload
const FIXED_HEAD: usize = 1 + 1 + 8 + 4;

/// Smallest possible record: empty geometry and an empty tag block
pub const MIN_RECORD_SIZE: usize = FIXED_HEAD + 4;

/// Decode the record starting at absolute position `offset`
///
/// IDs are unsigned, so every decoded ID is well formed; the type tag and
/// the reserved flags byte are checked, and both length fields must stay
/// inside `bytes`.
pub fn decode_at(bytes: &[u8], offset: u64) -> StoreResult<FeatureRecord> {
    let corrupt = |reason: String| StoreError::corrupt_record(offset, reason);

    let pos = usize::try_from(offset)
        .map_err(|_| corrupt("offset does not fit in the address space".into()))?;
    if pos.checked_add(MIN_RECORD_SIZE).map_or(true, |end| end > bytes.len()) {
        return Err(corrupt(format!(
            "record header runs past end of data ({} bytes)",
            bytes.len()
        )));
    }

    let feature_type = FeatureType::try_from(bytes[pos])
        .map_err(|tag| corrupt(format!("unknown type tag {}", tag)))?;

    let flags = bytes[pos + 1];
    if flags != 0 {
        return Err(corrupt(format!("reserved flags set: {:#04x}", flags)));
    }

    // Bounds were checked against MIN_RECORD_SIZE above
    let id = u64_at(bytes, pos + 2).ok_or_else(|| corrupt("truncated id".into()))?;
    let geom_len = u32_at(bytes, pos + 10).ok_or_else(|| corrupt("truncated geometry length".into()))?
        as usize;

    let geom_start = pos + FIXED_HEAD;
    let geom_end = geom_start
        .checked_add(geom_len)
        .filter(|&end| end <= bytes.len())
        .ok_or_else(|| corrupt(format!("geometry of {} bytes runs past end of data", geom_len)))?;

    let tags_len = u32_at(bytes, geom_end)
        .ok_or_else(|| corrupt("tag block length runs past end of data".into()))?
        as usize;
    let tags_start = geom_end + 4;
    let tags_end = tags_start
        .checked_add(tags_len)
        .filter(|&end| end <= bytes.len())
        .ok_or_else(|| corrupt(format!("tag block of {} bytes runs past end of data", tags_len)))?;

    Ok(FeatureRecord {
        key: FeatureKey::new(feature_type, id),
        offset,
        encoded_len: tags_end - pos,
        tags: ByteRange::new(tags_start, tags_end),
        geometry: ByteRange::new(geom_start, geom_end),
    })
}

/// Decode at `offset` and compare against `expected`
///
/// A well-formed record with a different key is a non-match (`Ok(None)`),
/// not an error.
pub fn decode_matching(
    bytes: &[u8],
    offset: u64,
    expected: FeatureKey,
) -> StoreResult<Option<FeatureRecord>> {
    let record = decode_at(bytes, offset)?;
    Ok((record.key == expected).then_some(record))
}

/// Append the encoding of one record to `out`, returning its size
pub fn encode(
    key: FeatureKey,
    geometry: &[u8],
    tag_block: &[u8],
    out: &mut Vec<u8>,
) -> StoreResult<usize> {
    let geom_len = u32::try_from(geometry.len()).map_err(|_| {
        StoreError::Serialization(format!("geometry of {} exceeds u32::MAX bytes", key))
    })?;
    let tags_len = u32::try_from(tag_block.len()).map_err(|_| {
        StoreError::Serialization(format!("tag block of {} exceeds u32::MAX bytes", key))
    })?;

    let start = out.len();
    out.reserve(MIN_RECORD_SIZE + geometry.len() + tag_block.len());
    out.push(key.feature_type as u8);
    out.push(0);
    out.extend_from_slice(&key.id.to_le_bytes());
    out.extend_from_slice(&geom_len.to_le_bytes());
    out.extend_from_slice(geometry);
    out.extend_from_slice(&tags_len.to_le_bytes());
    out.extend_from_slice(tag_block);

    Ok(out.len() - start)
}
