//! Record parser: one category byte, a two-byte big-endian length (inclusive
//! of these three header bytes), then an implicit FSPEC gating the
//! category's item catalogue — the same wire construct a nested `compound`
//! item uses, shared via [`crate::compiled::read_fspec`].

use indexmap::IndexMap;

use crate::bits;
use crate::compiled::{read_fspec, Item, Parent};
use crate::errors::DecodeError;
use crate::schema::RecordShape;
use crate::value::Value;

/// Parses exactly one record starting at `byte_index`. Returns the total
/// bytes consumed (header included) and the decoded record body.
///
/// `categories` selects the item catalogue by the record's own category
/// byte; a category with no configured catalogue is `DecodeError::UnknownCategory`.
pub fn parse_record(
    data: &[u8],
    byte_index: usize,
    shape: &RecordShape,
    categories: &std::collections::HashMap<u8, Vec<Item>>,
    debug: bool,
) -> Result<(usize, Value), DecodeError> {
    let category = bits::read_bytes(data, byte_index, 1)
        .map_err(|source| DecodeError::Read { item: shape.category_name.clone(), source })?[0];
    let length = bits::read_uint(data, byte_index + 1, 0, 16)
        .map_err(|source| DecodeError::Read { item: shape.length_name.clone(), source })? as usize;

    let items = categories
        .get(&category)
        .ok_or(DecodeError::UnknownCategory { category })?;

    let mut ctx = IndexMap::new();
    ctx.insert(shape.category_name.clone(), Value::UInt(category as u64));
    ctx.insert(shape.length_name.clone(), Value::UInt(length as u64));

    let (fspec_len, bitmap) = read_fspec(data, byte_index + 3, false)
        .map_err(|source| DecodeError::Read { item: "fspec".to_string(), source })?;

    let mut content_consumed = fspec_len;
    for (k, item) in items.iter().enumerate() {
        if bitmap.get(k).copied().unwrap_or(false) {
            content_consumed += item.parse_into(
                data,
                byte_index + 3 + content_consumed,
                content_consumed,
                &mut ctx,
                &Parent::Root,
                debug,
            )?;
        }
    }

    let consumed = 3 + content_consumed;
    if consumed != length {
        return Err(DecodeError::LengthMismatch {
            declared: length,
            consumed,
        });
    }

    if debug {
        tracing::debug!(category, length, "decoded record");
    }

    Ok((consumed, Value::Map(ctx)))
}
