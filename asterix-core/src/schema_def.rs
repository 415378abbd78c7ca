//! JSON-deserializable schema description: framing, record header, category
//! index, and per-category item catalogues, as authored in a definitions
//! directory.
//!
//! These types describe the *shape* of a schema file as authored by a human;
//! almost everything is optional here because JSON can omit attributes that
//! a particular item `type` doesn't need. [`crate::item::ItemDef`] is where
//! "does this item actually have everything its type requires" is checked.

use serde::{Deserialize, Serialize};

/// Numeric/text interpretation used by `fixed_bytes`, `fixed_bits`, and
/// `dynamic_bytes`.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DataTypeDef {
    Uint,
    Int,
    Bin,
    Ascii,
}

/// One item definition, as it appears in a category/record/framing JSON file.
///
/// `type` selects which of the other fields are meaningful; unused fields
/// are simply absent from a given item's JSON object.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ItemDefJson {
    pub name: String,
    #[serde(rename = "type")]
    pub item_type: String,

    // fixed_bytes
    #[serde(default)]
    pub length: Option<usize>,
    #[serde(default)]
    pub data_type: Option<DataTypeDef>,
    #[serde(default)]
    pub reverse_bits: Option<bool>,
    #[serde(default)]
    pub reverse_bytes: Option<bool>,

    // fixed_bits
    #[serde(default)]
    pub start: Option<usize>,
    #[serde(default)]
    pub lsb: Option<f64>,

    // fixed_bitfield / extendable / compound
    #[serde(default)]
    pub items: Option<Vec<ItemDefJson>>,
    #[serde(default)]
    pub optional: Option<bool>,
    #[serde(default)]
    pub optional_variable_name: Option<String>,
    #[serde(default)]
    pub optional_variable_value: Option<i64>,

    // compound
    #[serde(default)]
    pub field_specification: Option<Box<ItemDefJson>>,

    // repetitive
    #[serde(default)]
    pub repetition_item: Option<Box<ItemDefJson>>,
    #[serde(default)]
    pub item: Option<Box<ItemDefJson>>,

    // dynamic_bytes
    #[serde(default)]
    pub length_variable_name: Option<String>,
}

/// `{"items": [...]}` — a per-category item catalogue file.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CategoryDefJson {
    pub items: Vec<ItemDefJson>,
}

/// `{"categories": [{"number": 48, "file": "cat048.json"}, ...]}`.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CategoryIndexJson {
    pub categories: Vec<CategoryEntryJson>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CategoryEntryJson {
    pub number: u32,
    pub file: String,
}

/// Record-level header shape: category byte, length field, then category
/// dispatch. The byte layout is fixed by the wire format; this captures
/// only what a record definition file is allowed to customize, namely the
/// names used for the header fields in the output document.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct RecordDefJson {
    #[serde(default = "default_category_name")]
    pub category_name: String,
    #[serde(default = "default_length_name")]
    pub length_name: String,
}

fn default_category_name() -> String {
    "category".to_string()
}

fn default_length_name() -> String {
    "length".to_string()
}

/// Outer framing definition. Absent entirely (no framing file configured)
/// means records are parsed back-to-back from byte 0 to end of input.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FramingDefJson {
    pub header_items: Vec<ItemDefJson>,
    /// Name of a header item (by dotted path) holding the count of records
    /// that follow this header, or `None` if the frame spans to a
    /// length-prefixed boundary given by `length_variable_name`.
    #[serde(default)]
    pub count_variable_name: Option<String>,
    #[serde(default)]
    pub length_variable_name: Option<String>,
}
