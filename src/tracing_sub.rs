use std::io::{self, Write};

use tracing::Level;

use crate::log_buffer::{self, LogWriter};

/// Writes into the global log buffer when one is installed, else stderr.
pub enum SinkWriter {
    Buffer(LogWriter),
    Stderr(io::Stderr),
}

impl SinkWriter {
    fn current() -> Self {
        match log_buffer::global() {
            Some(buffer) => SinkWriter::Buffer(buffer.writer()),
            None => SinkWriter::Stderr(io::stderr()),
        }
    }
}

impl Write for SinkWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            SinkWriter::Buffer(w) => w.write(buf),
            SinkWriter::Stderr(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            SinkWriter::Buffer(w) => w.flush(),
            SinkWriter::Stderr(s) => s.flush(),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SinkMakeWriter;

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SinkMakeWriter {
    type Writer = SinkWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SinkWriter::current()
    }
}

/// Install the global subscriber at DEBUG. Later calls are no-ops.
pub fn init_default() {
    init_with_level(Level::DEBUG);
}

pub fn init_with_level(level: Level) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(SinkMakeWriter)
        .with_target(false)
        .with_thread_names(true)
        .try_init();
}
