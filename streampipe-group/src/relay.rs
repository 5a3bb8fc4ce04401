use std::io::Write;

use streampipe_types::Record;

/// Separator written after every payload.
pub const RECORD_SEPARATOR: &[u8] = b"\n";

#[derive(Debug)]
/// Writes record payloads to a sink, one per line. Metadata is never written.
pub struct Relay<W: Write> {
    sink: W,
    line: Vec<u8>,
    relayed: u64,
}

impl<W: Write> Relay<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            line: Vec::new(),
            relayed: 0,
        }
    }

    /// Write the payload and the separator as one buffer, then flush. The record only counts
    /// as relayed if both succeed.
    pub fn relay(&mut self, record: &Record) -> std::io::Result<()> {
        self.line.clear();
        self.line.extend_from_slice(record.payload());
        self.line.extend_from_slice(RECORD_SEPARATOR);
        self.sink.write_all(&self.line)?;
        self.sink.flush()?;
        self.relayed += 1;
        Ok(())
    }

    /// Number of records relayed so far.
    pub fn relayed(&self) -> u64 {
        self.relayed
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}
