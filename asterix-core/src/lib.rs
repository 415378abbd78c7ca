//! # asterix-core
//!
//! A schema-driven decoder for variable-length, bit-packed surveillance
//! records (the ASTERIX family): declare framing, record layout, and each
//! item's byte/bit structure in JSON, and decode a memory-mapped input file
//! into a structured document. No record layout is hard-coded in this crate.
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use asterix_core::orchestrator::Orchestrator;
//!
//! let mut session = Orchestrator::open(
//!     Path::new("recording.ast"),
//!     Path::new("definitions/"),
//!     None,
//!     false,
//! ).unwrap();
//! let records = session.decode_records().unwrap();
//! println!("decoded {records} records ({} skipped)", session.skipped_records());
//! ```

pub mod bits;
pub mod compiled;
pub mod errors;
pub mod frame;
pub mod item;
pub mod orchestrator;
pub mod record;
pub mod schema;
pub mod schema_def;
pub mod value;

pub use errors::Error;
pub use orchestrator::Orchestrator;
pub use schema::Schema;
pub use value::Value;
