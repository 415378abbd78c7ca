//! Schema loader: reads a framing definition, a record definition, a
//! category index, and each category's item catalogue from a definitions
//! directory, then compiles every item tree and validates its structural
//! shape before any record byte is consumed.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::compiled::Item;
use crate::errors::LoadError;
use crate::item::ItemDef;
use crate::schema_def::{CategoryDefJson, CategoryIndexJson, FramingDefJson, RecordDefJson};

/// The framing header, compiled. `None` categories/sequencing means the
/// framing has no count of its own and simply wraps records up to its
/// length-prefixed boundary.
pub struct Framing {
    pub header_items: Vec<Item>,
    pub count_variable_name: Option<String>,
    pub length_variable_name: Option<String>,
}

/// Record-level header field names (spec.md §4.3). The byte layout itself
/// (1-byte category, 2-byte length) is fixed by the wire format; only the
/// names used for these two fields in the output document are configurable.
#[derive(Clone)]
pub struct RecordShape {
    pub category_name: String,
    pub length_name: String,
}

/// A fully loaded and compiled schema: optional outer framing, the record
/// header shape, and a per-category item catalogue. Immutable once built and
/// shareable across any number of concurrent decode sessions (spec.md §5).
pub struct Schema {
    pub framing: Option<Framing>,
    pub record_shape: RecordShape,
    pub categories: HashMap<u8, Vec<Item>>,
}

impl Schema {
    /// Loads and compiles a schema from `dir`.
    ///
    /// - `dir/record.json` — record header shape (optional; falls back to
    ///   the defaults `category`/`length` if the file is absent).
    /// - `dir/categories.json` — the category index (required).
    /// - `dir/<file>` for each indexed category (required, path as given in
    ///   the index).
    /// - `dir/<framing>.json` — the named outer framing definition, only
    ///   loaded when `framing` is `Some`.
    pub fn load(dir: &Path, framing: Option<&str>) -> Result<Self, LoadError> {
        let record_shape = match read_json::<RecordDefJson>(&dir.join("record.json")) {
            Ok(def) => RecordShape {
                category_name: def.category_name,
                length_name: def.length_name,
            },
            Err(LoadError::Io { .. }) => RecordShape {
                category_name: "category".to_string(),
                length_name: "length".to_string(),
            },
            Err(other) => return Err(other),
        };

        let index_path = dir.join("categories.json");
        let index: CategoryIndexJson = read_json(&index_path)?;

        let mut categories = HashMap::with_capacity(index.categories.len());
        for entry in &index.categories {
            let number: u8 = entry
                .number
                .try_into()
                .map_err(|_| LoadError::UnknownCategoryFile { number: entry.number })?;
            let cat_path = dir.join(&entry.file);
            let cat_def: CategoryDefJson = read_json(&cat_path)?;
            let items = compile_items(&cat_def.items, Some(&cat_path))?;
            categories.insert(number, items);
        }

        let framing = match framing {
            None => None,
            Some(name) => {
                let framing_path = dir.join(format!("{name}.json"));
                let def: FramingDefJson = read_json(&framing_path)?;
                let header_items = compile_items(&def.header_items, Some(&framing_path))?;
                Some(Framing {
                    header_items,
                    count_variable_name: def.count_variable_name,
                    length_variable_name: def.length_variable_name,
                })
            }
        };

        Ok(Schema {
            framing,
            record_shape,
            categories,
        })
    }
}

fn compile_items(defs: &[crate::schema_def::ItemDefJson], file: Option<&Path>) -> Result<Vec<Item>, LoadError> {
    defs.iter()
        .map(|json| {
            let def = ItemDef::from_json(json, file)?;
            Item::compile(&def, file).map_err(LoadError::from)
        })
        .collect()
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    let text = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| LoadError::Json {
        path: path.to_path_buf(),
        source,
    })
}
