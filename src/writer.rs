//! Serialization sink for completed stats records.
//!
//! [`MetricsWriter`] normalizes each [`StatsRecord`] and writes it as one
//! JSON line to an underlying writer. `run()` wires it up as the drain task
//! on the collector's output channel; anything downstream (shipping, storage)
//! is someone else's concern.

use std::io::Write;

use tokio::sync::mpsc;

use crate::error::ResultOkLogExt;
use crate::stats::{StatsRecord, normalize};

/// Writes one JSON line per stats record to an underlying sink.
pub struct MetricsWriter<W> {
    sink: W,
}

impl<W: Write> MetricsWriter<W> {
    pub fn new(sink: W) -> Self {
        Self { sink }
    }

    /// Normalizes the record and writes it as one JSON line.
    pub fn write_record(&mut self, record: &StatsRecord) -> std::io::Result<()> {
        let metrics = normalize(record);
        serde_json::to_writer(&mut self.sink, &metrics)?;
        self.sink.write_all(b"\n")?;
        self.sink.flush()
    }

    /// Drains the records channel until every sender is gone.
    ///
    /// Write failures are logged per record; the drain keeps going.
    pub async fn drain(&mut self, mut records: mpsc::Receiver<StatsRecord>) {
        while let Some(record) = records.recv().await {
            self.write_record(&record)
                .ok_log("failed to write metrics record");
        }
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}
