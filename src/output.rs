use std::cell::Cell;
use std::io::{self, Write};

use serde::Serialize;

use crate::app::{ProgressEvent, ProgressSink};
use crate::transport::TransferProgress;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Human,
    Json,
}

/// Prints transfer progress on a single self-overwriting line and other
/// events as plain lines on stdout.
#[derive(Debug, Default)]
pub struct ConsoleProgress {
    mid_line: Cell<bool>,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressSink for ConsoleProgress {
    fn event(&self, event: ProgressEvent) {
        let mut stdout = io::stdout();
        if let Some(progress) = event.transfer {
            let _ = write!(stdout, "\r{}", render_transfer(&progress));
            let _ = stdout.flush();
            self.mid_line.set(true);
            return;
        }
        if self.mid_line.replace(false) {
            let _ = writeln!(stdout);
        }
        let line = match event.elapsed {
            Some(elapsed) => format!("{} ({:.1}s)", event.message, elapsed.as_secs_f64()),
            None => event.message,
        };
        let _ = writeln!(stdout, "{line}");
    }
}

pub fn render_transfer(progress: &TransferProgress) -> String {
    match progress.fraction() {
        Some(fraction) => format!("- Progress: {:.1}%", fraction * 100.0),
        None => format!("- Received: {} bytes", progress.received),
    }
}

pub struct SilentProgress;

impl ProgressSink for SilentProgress {
    fn event(&self, _event: ProgressEvent) {}
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_percentage() {
        let progress = TransferProgress {
            received: 512,
            total: Some(2048),
        };
        assert_eq!(render_transfer(&progress), "- Progress: 25.0%");
    }

    #[test]
    fn renders_unknown_size() {
        let progress = TransferProgress {
            received: 10,
            total: None,
        };
        assert_eq!(render_transfer(&progress), "- Received: 10 bytes");
    }
}
