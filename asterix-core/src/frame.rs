//! Frame parser (spec.md §4.4): walks either an outer framing structure or,
//! absent one, records back-to-back from byte 0 to the end of input. Shares
//! one loop between "scope" (structural-only) and "decode" (full) modes, per
//! SPEC_FULL.md's note that a framing-less input is just a single implicit
//! frame spanning the whole buffer.

use indexmap::IndexMap;

use crate::bits;
use crate::compiled::{lookup, Parent};
use crate::record;
use crate::schema::Schema;
use crate::value::Value;

/// Outcome of one walk over the input: how many frames/records were seen,
/// how many records were skipped in resilient recovery, and (when
/// `materialize` was requested) the decoded document itself.
pub struct WalkResult {
    pub frames: u64,
    pub records: u64,
    pub skipped: u64,
    pub document: Value,
}

/// Walks `data` under `schema`. When `materialize` is false this is the
/// "scope frames" structural pass (spec.md §4.6): every record is still
/// parsed — there is no cheaper way to know an item's length than to decode
/// it (see DESIGN.md) — but decoded values are discarded rather than
/// accumulated, so `document` is an empty array.
pub fn walk(data: &[u8], schema: &Schema, materialize: bool, debug: bool) -> WalkResult {
    match &schema.framing {
        None => walk_unframed(data, schema, materialize, debug),
        Some(framing) => walk_framed(data, schema, framing, materialize, debug),
    }
}

fn walk_unframed(data: &[u8], schema: &Schema, materialize: bool, debug: bool) -> WalkResult {
    let mut byte_index = 0usize;
    let mut records = 0u64;
    let mut skipped = 0u64;
    let mut out = Vec::new();

    while byte_index < data.len() {
        match record::parse_record(data, byte_index, &schema.record_shape, &schema.categories, debug) {
            Ok((consumed, value)) => {
                records += 1;
                byte_index += consumed;
                if materialize {
                    out.push(value);
                }
            }
            Err(err) => {
                tracing::warn!(%err, byte_index, "skipping malformed record");
                skipped += 1;
                match recover(data, byte_index) {
                    Some(next) if next > byte_index => byte_index = next,
                    _ => break,
                }
            }
        }
    }

    WalkResult {
        frames: 1,
        records,
        skipped,
        document: Value::Array(out),
    }
}

fn walk_framed(
    data: &[u8],
    schema: &Schema,
    framing: &crate::schema::Framing,
    materialize: bool,
    debug: bool,
) -> WalkResult {
    let mut byte_index = 0usize;
    let mut frames = 0u64;
    let mut records = 0u64;
    let mut skipped = 0u64;
    let mut out = Vec::new();

    'frames: while byte_index < data.len() {
        let frame_start = byte_index;
        let mut ctx = IndexMap::new();
        let mut hdr_consumed = 0usize;

        for item in &framing.header_items {
            match item.parse_into(data, byte_index + hdr_consumed, hdr_consumed, &mut ctx, &Parent::Root, debug) {
                Ok(n) => hdr_consumed += n,
                Err(err) => {
                    tracing::warn!(%err, byte_index, "skipping malformed frame header");
                    skipped += 1;
                    break 'frames;
                }
            }
        }

        frames += 1;
        byte_index += hdr_consumed;

        let frame_end = match &framing.length_variable_name {
            Some(path) => match lookup(&ctx, path).and_then(Value::as_u64) {
                Some(len) => (frame_start + len as usize).min(data.len()),
                None => {
                    tracing::warn!(path, "frame length variable did not resolve; consuming to end of input");
                    data.len()
                }
            },
            None => data.len(),
        };

        let record_limit = framing
            .count_variable_name
            .as_ref()
            .and_then(|path| lookup(&ctx, path))
            .and_then(Value::as_u64);

        let mut frame_records = Vec::new();
        let mut n_parsed = 0u64;
        while byte_index < frame_end && record_limit.map_or(true, |limit| n_parsed < limit) {
            match record::parse_record(data, byte_index, &schema.record_shape, &schema.categories, debug) {
                Ok((consumed, value)) => {
                    records += 1;
                    n_parsed += 1;
                    byte_index += consumed;
                    if materialize {
                        frame_records.push(value);
                    }
                }
                Err(err) => {
                    tracing::warn!(%err, byte_index, "skipping malformed record");
                    skipped += 1;
                    match recover(data, byte_index) {
                        Some(next) if next > byte_index && next <= frame_end => byte_index = next,
                        _ => break,
                    }
                }
            }
        }

        if frame_end > byte_index {
            byte_index = frame_end;
        }

        if materialize {
            ctx.insert("records".to_string(), Value::Array(frame_records));
            out.push(Value::Map(ctx));
        }
    }

    WalkResult {
        frames,
        records,
        skipped,
        document: Value::Array(out),
    }
}

/// Resilient-mode recovery (spec.md §7): re-reads the failed record's own
/// length field (the one piece of header information independent of the
/// body decode that just failed) and skips exactly that span. Falls back to
/// advancing one byte when even the length field can't be trusted, so the
/// walk always makes forward progress instead of looping.
fn recover(data: &[u8], byte_index: usize) -> Option<usize> {
    if let Ok(length) = bits::read_uint(data, byte_index + 1, 0, 16) {
        let length = length as usize;
        if length >= 3 && byte_index + length <= data.len() {
            return Some(byte_index + length);
        }
    }
    if byte_index + 1 <= data.len() {
        Some(byte_index + 1)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{FixedBytesDef, ItemDef, ItemKind};
    use crate::schema_def::DataTypeDef;
    use crate::schema::RecordShape;
    use std::collections::HashMap;

    fn sac_item() -> crate::compiled::Item {
        let def = ItemDef {
            name: "SAC".to_string(),
            kind: ItemKind::FixedBytes(FixedBytesDef {
                length: 1,
                data_type: DataTypeDef::Uint.into(),
                reverse_bits: false,
                reverse_bytes: false,
            }),
        };
        crate::compiled::Item::compile(&def, None).unwrap()
    }

    fn schema_with(categories: HashMap<u8, Vec<crate::compiled::Item>>) -> Schema {
        Schema {
            framing: None,
            record_shape: RecordShape {
                category_name: "category".to_string(),
                length_name: "length".to_string(),
            },
            categories,
        }
    }

    #[test]
    fn unframed_walk_parses_records_back_to_back() {
        let mut categories = HashMap::new();
        categories.insert(48u8, vec![sac_item()]);
        let schema = schema_with(categories);

        let data = [0x30u8, 0x00, 0x05, 0x80, 0x40, 0x30, 0x00, 0x05, 0x80, 0x41];
        let result = walk(&data, &schema, true, false);
        assert_eq!(result.frames, 1);
        assert_eq!(result.records, 2);
        assert_eq!(result.skipped, 0);
        assert_eq!(result.document.as_array().unwrap().len(), 2);
    }

    #[test]
    fn resilient_mode_skips_malformed_record_and_continues() {
        let mut categories = HashMap::new();
        categories.insert(48u8, vec![sac_item()]);
        let schema = schema_with(categories);

        // first record declares length 4 but its FSPEC wants 1 more byte -> LengthMismatch
        let data = [0x30u8, 0x00, 0x04, 0x80, 0x40, 0x30, 0x00, 0x05, 0x80, 0x41];
        let result = walk(&data, &schema, true, false);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.records, 1);
    }

    #[test]
    fn scope_mode_agrees_with_decode_mode_on_counts() {
        let mut categories = HashMap::new();
        categories.insert(48u8, vec![sac_item()]);
        let schema = schema_with(categories);

        let data = [0x30u8, 0x00, 0x05, 0x80, 0x40, 0x30, 0x00, 0x05, 0x80, 0x41];
        let scoped = walk(&data, &schema, false, false);
        let decoded = walk(&data, &schema, true, false);
        assert_eq!(scoped.records, decoded.records);
        assert_eq!(scoped.frames, decoded.frames);
        assert!(scoped.document.as_array().unwrap().is_empty());
    }
}
