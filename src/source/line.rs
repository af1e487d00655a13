//! Line framing on top of a [`ByteSource`].

use super::{ByteSource, ChunkRead};
use std::io;
use std::time::{Duration, Instant};

/// Longest line kept; extra bytes up to the next terminator are dropped.
pub const MAX_LINE_LEN: usize = 256;

/// Outcome of [`LineReader::read_line`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineRead {
    /// A complete line without its terminator (may be empty).
    Line(String),
    /// No complete line arrived before the timeout. Partial input is kept.
    Timeout,
    /// The source is exhausted.
    Closed,
}

/// Splits a byte stream on `\n` or `\r`.
pub struct LineReader<S> {
    source: S,
    chunk: [u8; MAX_LINE_LEN],
    filled: usize,
    pos: usize,
    pending: Vec<u8>,
    overflowed: bool,
    closed: bool,
    truncated_lines: u64,
}

impl<S: ByteSource> LineReader<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            chunk: [0; MAX_LINE_LEN],
            filled: 0,
            pos: 0,
            pending: Vec::with_capacity(MAX_LINE_LEN),
            overflowed: false,
            closed: false,
            truncated_lines: 0,
        }
    }

    /// Number of lines that were cut at [`MAX_LINE_LEN`] so far.
    pub fn truncated_lines(&self) -> u64 {
        self.truncated_lines
    }

    /// Reads one line, waiting at most `timeout` in total.
    ///
    /// A final unterminated line is returned once the source closes.
    ///
    /// # Errors
    /// - Any non-interrupt I/O error reported by the source
    pub fn read_line(&mut self, timeout: Duration) -> io::Result<LineRead> {
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(line) = self.take_buffered_line() {
                return Ok(LineRead::Line(line));
            }

            if self.closed {
                return Ok(if self.pending.is_empty() {
                    LineRead::Closed
                } else {
                    LineRead::Line(self.finish_line())
                });
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(LineRead::Timeout);
            }

            match self.source.read_chunk(&mut self.chunk, remaining) {
                Ok(ChunkRead::Data(0)) | Ok(ChunkRead::Closed) => self.closed = true,
                Ok(ChunkRead::Data(n)) => {
                    self.filled = n.min(self.chunk.len());
                    self.pos = 0;
                }
                Ok(ChunkRead::Timeout) => return Ok(LineRead::Timeout),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn take_buffered_line(&mut self) -> Option<String> {
        while self.pos < self.filled {
            let byte = self.chunk[self.pos];
            self.pos += 1;

            match byte {
                b'\n' | b'\r' => return Some(self.finish_line()),
                _ if self.pending.len() < MAX_LINE_LEN => self.pending.push(byte),
                _ => self.overflowed = true,
            }
        }
        None
    }

    fn finish_line(&mut self) -> String {
        if self.overflowed {
            self.truncated_lines += 1;
            self.overflowed = false;
        }
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Replays scripted read results.
    struct ScriptedSource {
        script: VecDeque<io::Result<Vec<u8>>>,
    }

    impl ScriptedSource {
        fn new(chunks: Vec<io::Result<Vec<u8>>>) -> Self {
            Self {
                script: chunks.into(),
            }
        }
    }

    impl ByteSource for ScriptedSource {
        fn read_chunk(&mut self, buf: &mut [u8], _timeout: Duration) -> io::Result<ChunkRead> {
            match self.script.pop_front() {
                None => Ok(ChunkRead::Closed),
                Some(Err(e)) => Err(e),
                Some(Ok(bytes)) if bytes.is_empty() => Ok(ChunkRead::Timeout),
                Some(Ok(bytes)) => {
                    let n = bytes.len().min(buf.len());
                    buf[..n].copy_from_slice(&bytes[..n]);
                    if n < bytes.len() {
                        self.script.push_front(Ok(bytes[n..].to_vec()));
                    }
                    Ok(ChunkRead::Data(n))
                }
            }
        }
    }

    fn read_all(reader: &mut LineReader<ScriptedSource>) -> Vec<LineRead> {
        let mut out = Vec::new();
        loop {
            let read = reader.read_line(Duration::from_millis(10)).unwrap();
            let done = read == LineRead::Closed;
            out.push(read);
            if done {
                return out;
            }
        }
    }

    fn line(s: &str) -> LineRead {
        LineRead::Line(s.to_string())
    }

    #[test]
    fn test_splits_on_newline_and_carriage_return() {
        let source = ScriptedSource::new(vec![Ok(b"1,2\n3,4\r5,6\r\n".to_vec())]);
        let mut reader = LineReader::new(source);

        assert_eq!(
            read_all(&mut reader),
            vec![
                line("1,2"),
                line("3,4"),
                line("5,6"),
                line(""),
                LineRead::Closed
            ]
        );
    }

    #[test]
    fn test_partial_line_survives_timeout() {
        let source = ScriptedSource::new(vec![
            Ok(b"1.5,".to_vec()),
            Ok(Vec::new()),
            Ok(b"2.5\n".to_vec()),
        ]);
        let mut reader = LineReader::new(source);

        assert_eq!(
            reader.read_line(Duration::from_millis(10)).unwrap(),
            LineRead::Timeout
        );
        assert_eq!(
            reader.read_line(Duration::from_millis(10)).unwrap(),
            line("1.5,2.5")
        );
    }

    #[test]
    fn test_long_line_is_truncated() {
        let mut bytes = vec![b'7'; MAX_LINE_LEN + 100];
        bytes.extend_from_slice(b"\n1,1\n");
        let mut reader = LineReader::new(ScriptedSource::new(vec![Ok(bytes)]));

        let first = reader.read_line(Duration::from_millis(10)).unwrap();
        assert_eq!(first, LineRead::Line("7".repeat(MAX_LINE_LEN)));
        assert_eq!(
            reader.read_line(Duration::from_millis(10)).unwrap(),
            line("1,1")
        );
        assert_eq!(reader.truncated_lines(), 1);
    }

    #[test]
    fn test_unterminated_tail_is_returned_on_close() {
        let source = ScriptedSource::new(vec![Ok(b"9,8\n7,6".to_vec())]);
        let mut reader = LineReader::new(source);

        assert_eq!(
            read_all(&mut reader),
            vec![line("9,8"), line("7,6"), LineRead::Closed]
        );
    }

    #[test]
    fn test_interrupted_read_is_retried() {
        let source = ScriptedSource::new(vec![
            Err(io::Error::from(io::ErrorKind::Interrupted)),
            Ok(b"1,2\n".to_vec()),
        ]);
        let mut reader = LineReader::new(source);

        assert_eq!(
            reader.read_line(Duration::from_millis(10)).unwrap(),
            line("1,2")
        );
    }

    #[test]
    fn test_fatal_error_is_returned() {
        let source = ScriptedSource::new(vec![Err(io::Error::other("device unplugged"))]);
        let mut reader = LineReader::new(source);

        let err = reader.read_line(Duration::from_millis(10)).unwrap_err();
        assert_eq!(err.to_string(), "device unplugged");
    }
}
