//! Line-oriented JSON event writer for the host process.

use std::io::Write;
use std::sync::Mutex;

use mirrorface_core::events::{Event, EventSink};

/// Writes one JSON object per line, flushing after every event so the
/// host sees transitions as they happen, not when a buffer fills.
pub struct LineSink<W: Write> {
    writer: Mutex<W>,
}

impl LineSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> LineSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

impl<W: Write + Send> EventSink for LineSink<W> {
    fn emit(&self, event: &Event) {
        let mut writer = match self.writer.lock() {
            Ok(w) => w,
            Err(poisoned) => poisoned.into_inner(),
        };
        // A broken pipe means the host is gone; nothing useful left to do
        // with the error on this channel.
        if writeln!(writer, "{}", event.to_json_line()).is_err() {
            tracing::warn!("failed to write event to host channel");
            return;
        }
        let _ = writer.flush();
    }
}
