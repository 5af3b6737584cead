//! Bounded in-memory log sink.
//!
//! While a full-screen UI owns the terminal, log output written to stderr
//! would land on the alternate screen. Installing a global [`LogBuffer`]
//! redirects the tracing subscriber into memory instead, where the UI can
//! show the tail.

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

pub const DEFAULT_CAPACITY: usize = 2000;

static GLOBAL: OnceLock<LogBuffer> = OnceLock::new();

/// Install `buffer` as the process-wide sink. Only the first call wins.
pub fn install_global(buffer: LogBuffer) -> bool {
    GLOBAL.set(buffer).is_ok()
}

pub fn global() -> Option<LogBuffer> {
    GLOBAL.get().cloned()
}

#[derive(Debug)]
struct Lines {
    lines: VecDeque<String>,
    capacity: usize,
}

#[derive(Clone, Debug)]
pub struct LogBuffer {
    inner: Arc<Mutex<Lines>>,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl LogBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Lines {
                lines: VecDeque::new(),
                capacity: capacity.max(1),
            })),
        }
    }

    pub fn push(&self, line: impl Into<String>) {
        let mut inner = self.inner.lock();
        inner.lines.push_back(line.into());
        while inner.lines.len() > inner.capacity {
            inner.lines.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The newest `count` lines, oldest first.
    pub fn tail(&self, count: usize) -> Vec<String> {
        let inner = self.inner.lock();
        let skip = inner.lines.len().saturating_sub(count);
        inner.lines.iter().skip(skip).cloned().collect()
    }

    pub fn writer(&self) -> LogWriter {
        LogWriter {
            buffer: self.clone(),
            partial: Vec::new(),
        }
    }
}

/// `io::Write` adapter that turns byte writes into whole lines.
#[derive(Debug)]
pub struct LogWriter {
    buffer: LogBuffer,
    partial: Vec<u8>,
}

impl LogWriter {
    fn emit_complete_lines(&mut self) {
        let Some(last_newline) = self.partial.iter().rposition(|b| *b == b'\n') else {
            return;
        };
        let complete: Vec<u8> = self.partial.drain(..=last_newline).collect();
        String::from_utf8_lossy(&complete)
            .lines()
            .filter(|line| !line.is_empty())
            .for_each(|line| self.buffer.push(line));
    }
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.partial.extend_from_slice(buf);
        self.emit_complete_lines();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.emit_complete_lines();
        if !self.partial.is_empty() {
            let rest = std::mem::take(&mut self.partial);
            self.buffer.push(String::from_utf8_lossy(&rest).into_owned());
        }
        Ok(())
    }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_splits_lines_and_buffer_is_bounded() {
        let buffer = LogBuffer::with_capacity(2);
        {
            let mut writer = buffer.writer();
            write!(writer, "one\ntw").unwrap();
            assert_eq!(buffer.tail(10), vec!["one".to_string()]);
            write!(writer, "o\nthree").unwrap();
        }
        assert_eq!(buffer.tail(10), vec!["two".to_string(), "three".to_string()]);
        assert_eq!(buffer.tail(1), vec!["three".to_string()]);
    }
}
