//! In-memory ring of recent log lines served by the `logs` action
//!
//! [`LogBuffer::make_writer`] plugs into a `tracing_subscriber::fmt` layer;
//! every formatted event lands here in addition to the console and file.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriter;

const DEFAULT_MAX_LOG_LINES: usize = 1000;

#[derive(Clone)]
pub struct LogBuffer {
    inner: Arc<Mutex<VecDeque<String>>>,
    max_lines: usize,
}

impl LogBuffer {
    pub fn new(max_lines: usize) -> Self {
        let max_lines = if max_lines == 0 {
            DEFAULT_MAX_LOG_LINES
        } else {
            max_lines
        };
        Self {
            inner: Arc::new(Mutex::new(VecDeque::with_capacity(max_lines))),
            max_lines,
        }
    }

    fn append_bytes(&self, bytes: &[u8]) {
        let text = String::from_utf8_lossy(bytes);
        for line in text.split('\n') {
            let line = line.trim_end_matches('\r').trim();
            if !line.is_empty() {
                self.push_line(line.to_string());
            }
        }
    }

    pub fn push_line(&self, line: String) {
        let mut guard = self.inner.lock();
        while guard.len() >= self.max_lines {
            guard.pop_front();
        }
        guard.push_back(line);
    }

    /// Up to `limit` most recent lines at or above `min_level`, oldest first
    ///
    /// Lines without a recognisable level are always kept.
    pub fn recent_lines(&self, limit: usize, min_level: Option<Level>) -> Vec<String> {
        let guard = self.inner.lock();
        let mut lines: Vec<String> = guard
            .iter()
            .rev()
            .filter(|line| match (min_level, line_level(line)) {
                (Some(min), Some(level)) => level <= min,
                _ => true,
            })
            .take(limit)
            .cloned()
            .collect();
        lines.reverse();
        lines
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writer factory for a `fmt` layer (use with ANSI disabled)
    pub fn make_writer(&self) -> LogBufferWriter {
        LogBufferWriter {
            logs: self.clone(),
        }
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LOG_LINES)
    }
}

/// Level token of a formatted line (first match wins)
fn line_level(line: &str) -> Option<Level> {
    line.split_whitespace().take(4).find_map(|token| match token {
        "ERROR" => Some(Level::ERROR),
        "WARN" => Some(Level::WARN),
        "INFO" => Some(Level::INFO),
        "DEBUG" => Some(Level::DEBUG),
        "TRACE" => Some(Level::TRACE),
        _ => None,
    })
}

#[derive(Clone)]
pub struct LogBufferWriter {
    logs: LogBuffer,
}

impl<'a> MakeWriter<'a> for LogBufferWriter {
    type Writer = LogBufferWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

impl io::Write for LogBufferWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.logs.append_bytes(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
