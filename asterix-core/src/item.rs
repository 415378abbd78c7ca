//! The schema tree: a strict, in-memory description of one item definition.
//! Built from [`crate::schema_def::ItemDefJson`] by checking that every
//! attribute a given `type` requires is present; this is the first of two
//! validation passes (the second, structural pass — bitfield length, bit
//! ranges, `compound`'s `field_specification` type — happens in
//! [`crate::compiled`]).

use std::path::{Path, PathBuf};

use crate::errors::SchemaError;
use crate::schema_def::{DataTypeDef, ItemDefJson};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Uint,
    Int,
    Bin,
    Ascii,
}

impl From<DataTypeDef> for DataType {
    fn from(v: DataTypeDef) -> Self {
        match v {
            DataTypeDef::Uint => DataType::Uint,
            DataTypeDef::Int => DataType::Int,
            DataTypeDef::Bin => DataType::Bin,
            DataTypeDef::Ascii => DataType::Ascii,
        }
    }
}

/// The JSON spelling of a `DataTypeDef`, for error messages.
fn data_type_name(v: DataTypeDef) -> &'static str {
    match v {
        DataTypeDef::Uint => "uint",
        DataTypeDef::Int => "int",
        DataTypeDef::Bin => "bin",
        DataTypeDef::Ascii => "ascii",
    }
}

#[derive(Debug, Clone)]
pub struct FixedBytesDef {
    pub length: usize,
    pub data_type: DataType,
    pub reverse_bits: bool,
    pub reverse_bytes: bool,
}

#[derive(Debug, Clone)]
pub struct FixedBitsDef {
    pub start: usize,
    pub length: usize,
    pub data_type: DataType,
    pub lsb: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct FixedBitfieldDef {
    pub length: usize,
    pub items: Vec<ItemDef>,
    pub optional: bool,
    pub optional_variable_name: Option<String>,
    pub optional_variable_value: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct ExtendableDef {
    pub items: Vec<ItemDef>,
    pub reverse_bits: bool,
}

#[derive(Debug, Clone)]
pub struct CompoundDef {
    pub field_specification: Box<ItemDef>,
    pub items: Vec<ItemDef>,
}

#[derive(Debug, Clone)]
pub struct RepetitiveDef {
    pub repetition_item: Box<ItemDef>,
    pub item: Box<ItemDef>,
}

#[derive(Debug, Clone)]
pub struct SkipBytesDef {
    pub length: usize,
}

#[derive(Debug, Clone)]
pub struct DynamicBytesDef {
    pub length_variable_name: String,
    pub data_type: DataType,
}

#[derive(Debug, Clone)]
pub enum ItemKind {
    FixedBytes(FixedBytesDef),
    FixedBits(FixedBitsDef),
    FixedBitfield(FixedBitfieldDef),
    Extendable(ExtendableDef),
    Compound(CompoundDef),
    Repetitive(RepetitiveDef),
    SkipBytes(SkipBytesDef),
    DynamicBytes(DynamicBytesDef),
}

#[derive(Debug, Clone)]
pub struct ItemDef {
    pub name: String,
    pub kind: ItemKind,
}

impl ItemDef {
    /// Converts a deserialized JSON item into a strict [`ItemDef`], checking
    /// that every attribute its `type` requires is present and well-typed.
    /// `file` is threaded through purely for error reporting.
    pub fn from_json(json: &ItemDefJson, file: Option<&Path>) -> Result<Self, SchemaError> {
        let name = json.name.clone();
        let missing = |attribute: &'static str| SchemaError::MissingAttribute {
            name: name.clone(),
            file: file.map(PathBuf::from),
            attribute,
        };

        let kind = match json.item_type.as_str() {
            "fixed_bytes" => ItemKind::FixedBytes(FixedBytesDef {
                length: json.length.ok_or_else(|| missing("length"))?,
                data_type: json
                    .data_type
                    .ok_or_else(|| missing("data_type"))?
                    .into(),
                reverse_bits: json.reverse_bits.unwrap_or(false),
                reverse_bytes: json.reverse_bytes.unwrap_or(false),
            }),
            "fixed_bits" => {
                let data_type = json.data_type.ok_or_else(|| missing("data_type"))?;
                if !matches!(data_type, DataTypeDef::Uint | DataTypeDef::Int) {
                    return Err(SchemaError::BadDataType {
                        name,
                        file: file.map(PathBuf::from),
                        data_type: data_type_name(data_type).to_string(),
                    });
                }
                ItemKind::FixedBits(FixedBitsDef {
                    start: json.start.ok_or_else(|| missing("start"))?,
                    length: json.length.ok_or_else(|| missing("length"))?,
                    data_type: data_type.into(),
                    lsb: json.lsb,
                })
            }
            "fixed_bitfield" => {
                let length = json.length.ok_or_else(|| missing("length"))?;
                let raw_items = json.items.as_ref().ok_or_else(|| missing("items"))?;
                let items = raw_items
                    .iter()
                    .map(|i| ItemDef::from_json(i, file))
                    .collect::<Result<Vec<_>, _>>()?;

                let optional = json.optional.unwrap_or(false);
                let (optional_variable_name, optional_variable_value) = if optional {
                    (
                        Some(
                            json.optional_variable_name
                                .clone()
                                .ok_or_else(|| missing("optional_variable_name"))?,
                        ),
                        Some(
                            json.optional_variable_value
                                .ok_or_else(|| missing("optional_variable_value"))?,
                        ),
                    )
                } else {
                    (None, None)
                };

                ItemKind::FixedBitfield(FixedBitfieldDef {
                    length,
                    items,
                    optional,
                    optional_variable_name,
                    optional_variable_value,
                })
            }
            "extendable" => {
                let raw_items = json.items.as_ref().ok_or_else(|| missing("items"))?;
                let items = raw_items
                    .iter()
                    .map(|i| ItemDef::from_json(i, file))
                    .collect::<Result<Vec<_>, _>>()?;
                ItemKind::Extendable(ExtendableDef {
                    items,
                    reverse_bits: json.reverse_bits.unwrap_or(false),
                })
            }
            "compound" => {
                let fspec_json = json
                    .field_specification
                    .as_ref()
                    .ok_or_else(|| missing("field_specification"))?;
                let field_specification = Box::new(ItemDef::from_json(fspec_json, file)?);

                let raw_items = json.items.as_ref().ok_or_else(|| missing("items"))?;
                let items = raw_items
                    .iter()
                    .map(|i| ItemDef::from_json(i, file))
                    .collect::<Result<Vec<_>, _>>()?;

                ItemKind::Compound(CompoundDef {
                    field_specification,
                    items,
                })
            }
            "repetitive" => {
                let repetition_item_json = json
                    .repetition_item
                    .as_ref()
                    .ok_or_else(|| missing("repetition_item"))?;
                let item_json = json.item.as_ref().ok_or_else(|| missing("item"))?;

                ItemKind::Repetitive(RepetitiveDef {
                    repetition_item: Box::new(ItemDef::from_json(repetition_item_json, file)?),
                    item: Box::new(ItemDef::from_json(item_json, file)?),
                })
            }
            "skip_bytes" => ItemKind::SkipBytes(SkipBytesDef {
                length: json.length.ok_or_else(|| missing("length"))?,
            }),
            "dynamic_bytes" => ItemKind::DynamicBytes(DynamicBytesDef {
                length_variable_name: json
                    .length_variable_name
                    .clone()
                    .ok_or_else(|| missing("length_variable_name"))?,
                data_type: json
                    .data_type
                    .ok_or_else(|| missing("data_type"))?
                    .into(),
            }),
            other => {
                return Err(SchemaError::BadDataType {
                    name,
                    file: file.map(PathBuf::from),
                    data_type: other.to_string(),
                })
            }
        };

        Ok(ItemDef { name, kind })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema_def::ItemDefJson;

    fn json(item_type: &str) -> ItemDefJson {
        ItemDefJson {
            name: "x".to_string(),
            item_type: item_type.to_string(),
            length: None,
            data_type: None,
            reverse_bits: None,
            reverse_bytes: None,
            start: None,
            lsb: None,
            items: None,
            optional: None,
            optional_variable_name: None,
            optional_variable_value: None,
            field_specification: None,
            repetition_item: None,
            item: None,
            length_variable_name: None,
        }
    }

    #[test]
    fn fixed_bytes_requires_length_and_data_type() {
        let j = json("fixed_bytes");
        let err = ItemDef::from_json(&j, None).unwrap_err();
        assert!(matches!(err, SchemaError::MissingAttribute { attribute: "length", .. }));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let j = json("not_a_type");
        let err = ItemDef::from_json(&j, None).unwrap_err();
        assert!(matches!(err, SchemaError::BadDataType { .. }));
    }

    #[test]
    fn fixed_bits_rejects_non_numeric_data_type() {
        let mut j = json("fixed_bits");
        j.start = Some(0);
        j.length = Some(4);
        j.data_type = Some(DataTypeDef::Ascii);
        let err = ItemDef::from_json(&j, None).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::BadDataType { data_type, .. } if data_type == "ascii"
        ));
    }

    #[test]
    fn fixed_bits_accepts_int_data_type() {
        let mut j = json("fixed_bits");
        j.start = Some(0);
        j.length = Some(4);
        j.data_type = Some(DataTypeDef::Int);
        assert!(ItemDef::from_json(&j, None).is_ok());
    }

    #[test]
    fn fixed_bitfield_optional_requires_variable_fields() {
        let mut j = json("fixed_bitfield");
        j.length = Some(1);
        j.items = Some(vec![]);
        j.optional = Some(true);
        let err = ItemDef::from_json(&j, None).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::MissingAttribute {
                attribute: "optional_variable_name",
                ..
            }
        ));
    }
}
