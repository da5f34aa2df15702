//! Event sinks: where emitted events go.
//!
//! The pipeline pushes each completed Event exactly once, in emission
//! order. Sinks decide the storage format; the core makes no assumption
//! about it.

use crate::{error::GenResult, event::Event};
use std::io::Write;

pub trait EventSink {
    fn push(&mut self, event: &Event) -> GenResult<()>;

    /// Flush buffered output. Called once after the last push.
    fn finish(&mut self) -> GenResult<()> {
        Ok(())
    }
}

/// Keeps every event in memory. Used by tests and short runs.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub events: Vec<Event>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventSink for MemorySink {
    fn push(&mut self, event: &Event) -> GenResult<()> {
        self.events.push(event.clone());
        Ok(())
    }
}

/// Writes one JSON object per line.
pub struct JsonLinesSink<W: Write> {
    writer:  W,
    written: u64,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> EventSink for JsonLinesSink<W> {
    fn push(&mut self, event: &Event) -> GenResult<()> {
        serde_json::to_writer(&mut self.writer, event)?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> GenResult<()> {
        self.writer.flush()?;
        log::info!("wrote {} events as JSON lines", self.written);
        Ok(())
    }
}
