//! Byte sources feeding the ingest loop.
//!
//! A [`ByteSource`] delivers raw bytes with a bounded wait; [`LineReader`] frames
//! them into text lines. The serial implementation lives in [`serial`].

pub mod line;
pub mod serial;

use std::io;
use std::time::Duration;

pub use line::{LineRead, LineReader};
pub use serial::SerialSource;

/// Outcome of one bounded-wait read attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkRead {
    /// This many bytes were written to the start of the buffer.
    Data(usize),
    /// Nothing arrived before the timeout.
    Timeout,
    /// The source reached end of stream and will never produce data again.
    Closed,
}

/// A readable stream of bytes with per-call timeouts.
pub trait ByteSource: Send {
    /// Waits at most `timeout` for data and reads whatever is available.
    ///
    /// # Errors
    /// - Any I/O failure other than a timeout. `ErrorKind::Interrupted` is
    ///   retried by callers.
    fn read_chunk(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<ChunkRead>;
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn read_chunk(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<ChunkRead> {
        (**self).read_chunk(buf, timeout)
    }
}
