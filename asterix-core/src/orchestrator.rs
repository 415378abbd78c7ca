//! Orchestrator: owns the memory-mapped input file and the loaded schema,
//! and exposes the two top-level operations downstream code actually calls —
//! `scope_frames` and `decode_records` — plus a human-readable `print()`.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use crate::errors::Error;
use crate::frame;
use crate::schema::Schema;
use crate::value::Value;

/// One decode session: a memory-mapped input file plus the schema it was
/// opened against. Both resources are released together when `Orchestrator`
/// is dropped.
pub struct Orchestrator {
    schema: Schema,
    mmap: Mmap,
    debug: bool,
    decoded: Value,
    records: u64,
    skipped: u64,
}

impl Orchestrator {
    /// Opens `path` as a read-only memory map and loads+validates the schema
    /// set from `definitions_dir` before any record byte is parsed.
    pub fn open(path: &Path, definitions_dir: &Path, framing: Option<&str>, debug: bool) -> Result<Self, Error> {
        let schema = Schema::load(definitions_dir, framing)?;

        let file = File::open(path)?;
        // SAFETY: the mapped file is treated as read-only input for the
        // lifetime of this session; nothing else in this process writes to
        // it concurrently, which is the usual caveat for mmap's unsafety
        // (the file could in principle be modified by another process).
        let mmap = unsafe { Mmap::map(&file)? };

        tracing::info!(
            path = %path.display(),
            categories = schema.categories.len(),
            framed = schema.framing.is_some(),
            "opened decode session"
        );

        Ok(Orchestrator {
            schema,
            mmap,
            debug,
            decoded: Value::Array(Vec::new()),
            records: 0,
            skipped: 0,
        })
    }

    /// Structural-only pass: parses framing boundaries and records without
    /// retaining decoded item content. Returns the frame count.
    pub fn scope_frames(&mut self) -> Result<u64, Error> {
        let result = frame::walk(&self.mmap, &self.schema, false, self.debug);
        self.records = result.records;
        self.skipped = result.skipped;
        self.decoded = result.document;
        Ok(result.frames)
    }

    /// Full decode: populates the accumulated document. Returns the record
    /// count.
    pub fn decode_records(&mut self) -> Result<u64, Error> {
        let result = frame::walk(&self.mmap, &self.schema, true, self.debug);
        self.records = result.records;
        self.skipped = result.skipped;
        self.decoded = result.document;
        tracing::info!(records = self.records, skipped = self.skipped, "decode session complete");
        Ok(self.records)
    }

    /// The count of records skipped by resilient recovery during the most
    /// recent `scope_frames`/`decode_records` call.
    pub fn skipped_records(&self) -> u64 {
        self.skipped
    }

    /// The count of successfully parsed records from the most recent
    /// `scope_frames`/`decode_records` call. Exposed separately from the two
    /// entry points' own return values so scope and decode passes can be
    /// compared after the fact.
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Borrows the accumulated document.
    pub fn decoded(&self) -> &Value {
        &self.decoded
    }

    /// Consumes the session, returning the accumulated document.
    pub fn into_decoded(self) -> Value {
        self.decoded
    }

    /// Serializes the accumulated document to pretty-printed JSON, the
    /// natural human-readable form for a document whose native shape is
    /// already JSON-like.
    pub fn print(&self) -> String {
        serde_json::to_string_pretty(&self.decoded).unwrap_or_else(|err| format!("<unprintable document: {err}>"))
    }
}
