//! JSONL command trace.
//!
//! One JSON object per processed command, appended to a file so a
//! session can be replayed or diffed after the fact. Responses keep
//! their internal newlines; JSON escaping keeps each record on one
//! line.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use serde::Serialize;

#[derive(Debug, Serialize)]
struct TraceRecord<'a> {
    seq: u64,
    command: &'a str,
    response: &'a str,
}

/// Append-only JSONL trace writer.
pub struct TraceWriter {
    out: BufWriter<File>,
    seq: u64,
}

impl TraceWriter {
    /// Opens `path` for appending, creating it if needed.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            out: BufWriter::new(file),
            seq: 0,
        })
    }

    /// Appends one command/response record.
    pub fn record(&mut self, command: &str, response: &str) -> io::Result<()> {
        self.seq += 1;
        let record = TraceRecord {
            seq: self.seq,
            command,
            response,
        };
        let line = serde_json::to_string(&record).map_err(io::Error::other)?;
        writeln!(self.out, "{line}")?;
        self.out.flush()
    }
}
