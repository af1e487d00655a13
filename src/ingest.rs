//! Serial ingest loop.
//!
//! Reads lines from a byte source, parses them as `x,y` samples and appends
//! them to the shared store. The loop runs on a blocking worker thread and stops
//! cooperatively: the stop flag is checked after every bounded-wait read, so a
//! stop request is honoured within one read timeout.

use crate::source::{ByteSource, LineRead, LineReader};
use crate::store::{Sample, SampleStore};
use std::fmt;
use std::num::ParseFloatError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Log a rolling-buffer notice every this many evictions.
const EVICTION_LOG_INTERVAL: u64 = 100;

/// Why a line could not be turned into a sample.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// The line was empty or only whitespace.
    Empty,
    /// The line did not have exactly two comma-separated fields.
    FieldCount(usize),
    /// A field was not a floating-point number.
    InvalidNumber {
        field: String,
        source: ParseFloatError,
    },
    /// A field parsed to NaN or infinity, which cannot be plotted.
    NotFinite(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty line"),
            Self::FieldCount(n) => write!(f, "expected 2 comma-separated values, found {n}"),
            Self::InvalidNumber { field, source } => {
                write!(f, "'{field}' is not a number: {source}")
            }
            Self::NotFinite(field) => write!(f, "'{field}' is not a finite number"),
        }
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidNumber { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Parses a line of the form `<float>,<float>`.
///
/// Whitespace around each field is ignored.
pub fn parse_sample(line: &str) -> Result<Sample, ParseError> {
    if line.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    let [x, y] = fields[..] else {
        return Err(ParseError::FieldCount(fields.len()));
    };

    let number = |field: &str| match field.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        Ok(_) => Err(ParseError::NotFinite(field.to_string())),
        Err(source) => Err(ParseError::InvalidNumber {
            field: field.to_string(),
            source,
        }),
    };

    Ok(Sample::new(number(x)?, number(y)?))
}

/// Why the ingest loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestExit {
    /// A stop was requested.
    Stopped,
    /// The source reached end of stream.
    SourceClosed,
    /// The source failed; the message is the I/O error.
    SourceFailed(String),
}

/// Line counters kept by the ingest loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub accepted: u64,
    pub rejected: u64,
    pub truncated: u64,
}

/// The producer side: owns the line reader and appends into the store.
pub struct IngestLoop<S> {
    reader: LineReader<S>,
    store: Arc<SampleStore>,
    stop: Arc<AtomicBool>,
    read_timeout: Duration,
    stats: IngestStats,
}

impl<S: ByteSource> IngestLoop<S> {
    pub fn new(
        source: S,
        store: Arc<SampleStore>,
        stop: Arc<AtomicBool>,
        read_timeout: Duration,
    ) -> Self {
        Self {
            reader: LineReader::new(source),
            store,
            stop,
            read_timeout,
            stats: IngestStats::default(),
        }
    }

    /// Runs until a stop is requested or the source closes or fails.
    pub fn run(&mut self) -> IngestExit {
        tracing::debug!("Ingest loop started (read timeout {:?})", self.read_timeout);

        let exit = loop {
            if self.stop.load(Ordering::Acquire) {
                break IngestExit::Stopped;
            }

            match self.reader.read_line(self.read_timeout) {
                Ok(LineRead::Line(line)) => self.handle_line(&line),
                Ok(LineRead::Timeout) => continue,
                Ok(LineRead::Closed) => {
                    tracing::info!("Serial source closed");
                    break IngestExit::SourceClosed;
                }
                Err(e) => {
                    tracing::error!("Serial read failed: {}", e);
                    break IngestExit::SourceFailed(e.to_string());
                }
            }
        };

        self.stats.truncated = self.reader.truncated_lines();
        tracing::info!(
            "Ingest loop finished ({:?}): {} accepted, {} rejected, {} truncated",
            exit,
            self.stats.accepted,
            self.stats.rejected,
            self.stats.truncated
        );
        exit
    }

    #[cfg(test)]
    pub fn stats(&self) -> IngestStats {
        self.stats
    }

    fn handle_line(&mut self, line: &str) {
        if line.trim().is_empty() {
            return;
        }

        match parse_sample(line) {
            Ok(sample) => {
                let outcome = self.store.append(sample);
                self.stats.accepted += 1;
                if outcome.evicted && outcome.evictions % EVICTION_LOG_INTERVAL == 0 {
                    tracing::debug!(
                        "Rolling buffer: evicted oldest samples (total: {}, buffer full)",
                        outcome.evictions
                    );
                }
            }
            Err(e) => {
                self.stats.rejected += 1;
                tracing::warn!("Invalid csv line {:?}: {}", line, e);
            }
        }
    }
}

/// Handle to an ingest loop running on a blocking worker.
pub struct IngestHandle {
    stop: Arc<AtomicBool>,
    task: JoinHandle<IngestExit>,
}

impl IngestHandle {
    /// Starts `source` on a blocking worker thread.
    pub fn spawn<S>(source: S, store: Arc<SampleStore>, read_timeout: Duration) -> Self
    where
        S: ByteSource + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let mut ingest = IngestLoop::new(source, store, Arc::clone(&stop), read_timeout);
        let task = tokio::task::spawn_blocking(move || ingest.run());
        Self { stop, task }
    }

    /// Whether the loop has already ended on its own.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Requests a stop and waits for the worker to finish.
    ///
    /// The source is dropped on the worker before this returns.
    pub async fn shutdown(self) -> IngestExit {
        self.stop.store(true, Ordering::Release);
        match self.task.await {
            Ok(exit) => exit,
            Err(e) => {
                tracing::error!("Ingest task failed: {}", e);
                IngestExit::SourceFailed(format!("ingest task failed: {e}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ChunkRead;
    use std::collections::VecDeque;
    use std::io;
    use std::time::Instant;

    /// Feeds scripted chunks; an empty chunk is a timeout.
    struct ScriptedSource {
        chunks: VecDeque<Vec<u8>>,
        then: ChunkRead,
    }

    impl ScriptedSource {
        fn lines(text: &str, then: ChunkRead) -> Self {
            Self {
                chunks: VecDeque::from(vec![text.as_bytes().to_vec()]),
                then,
            }
        }
    }

    impl ByteSource for ScriptedSource {
        fn read_chunk(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<ChunkRead> {
            let Some(chunk) = self.chunks.pop_front() else {
                if self.then == ChunkRead::Timeout {
                    std::thread::sleep(timeout);
                }
                return Ok(self.then);
            };
            if chunk.is_empty() {
                return Ok(ChunkRead::Timeout);
            }
            let n = chunk.len().min(buf.len());
            buf[..n].copy_from_slice(&chunk[..n]);
            if n < chunk.len() {
                self.chunks.push_front(chunk[n..].to_vec());
            }
            Ok(ChunkRead::Data(n))
        }
    }

    /// Never produces data; each read waits out the full timeout.
    struct SilentSource;

    impl ByteSource for SilentSource {
        fn read_chunk(&mut self, _buf: &mut [u8], timeout: Duration) -> io::Result<ChunkRead> {
            std::thread::sleep(timeout);
            Ok(ChunkRead::Timeout)
        }
    }

    struct FailingSource;

    impl ByteSource for FailingSource {
        fn read_chunk(&mut self, _buf: &mut [u8], _timeout: Duration) -> io::Result<ChunkRead> {
            Err(io::Error::other("device unplugged"))
        }
    }

    fn new_loop<S: ByteSource>(source: S, store: &Arc<SampleStore>) -> IngestLoop<S> {
        IngestLoop::new(
            source,
            Arc::clone(store),
            Arc::new(AtomicBool::new(false)),
            Duration::from_millis(20),
        )
    }

    #[test]
    fn test_parse_valid_line() {
        assert_eq!(parse_sample("1.5,2.5"), Ok(Sample::new(1.5, 2.5)));
        assert_eq!(parse_sample(" -3 , 4e2 "), Ok(Sample::new(-3.0, 400.0)));
    }

    #[test]
    fn test_parse_rejects_malformed_lines() {
        assert_eq!(parse_sample(""), Err(ParseError::Empty));
        assert_eq!(parse_sample("1.5"), Err(ParseError::FieldCount(1)));
        assert_eq!(parse_sample("1,2,3"), Err(ParseError::FieldCount(3)));
        assert!(matches!(
            parse_sample("abc"),
            Err(ParseError::FieldCount(1))
        ));
        assert!(matches!(
            parse_sample("abc,1"),
            Err(ParseError::InvalidNumber { ref field, .. }) if field == "abc"
        ));
        assert!(matches!(
            parse_sample("1,"),
            Err(ParseError::InvalidNumber { .. })
        ));
        assert_eq!(
            parse_sample("nan,1"),
            Err(ParseError::NotFinite("nan".to_string()))
        );
    }

    #[test]
    fn test_bad_lines_do_not_stop_ingestion() {
        let store = Arc::new(SampleStore::unbounded());
        let source = ScriptedSource::lines(
            "1.5,2.5\nabc\n\n1.5\n3,4\r\n",
            ChunkRead::Closed,
        );
        let mut ingest = new_loop(source, &store);

        assert_eq!(ingest.run(), IngestExit::SourceClosed);
        assert_eq!(
            store.snapshot(),
            vec![Sample::new(1.5, 2.5), Sample::new(3.0, 4.0)]
        );
        assert_eq!(
            ingest.stats(),
            IngestStats {
                accepted: 2,
                rejected: 2,
                truncated: 0,
            }
        );
    }

    #[test]
    fn test_rolling_store_keeps_latest_samples() {
        let store = Arc::new(SampleStore::rolling(10));
        let text: String = (0..25).map(|i| format!("{i},{}\n", i * i)).collect();
        let mut ingest = new_loop(ScriptedSource::lines(&text, ChunkRead::Closed), &store);

        ingest.run();

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 10);
        assert_eq!(snapshot[0], Sample::new(15.0, 225.0));
        assert_eq!(snapshot[9], Sample::new(24.0, 576.0));
        assert_eq!(store.eviction_count(), 15);
    }

    #[test]
    fn test_read_error_ends_loop_and_keeps_data() {
        let store = Arc::new(SampleStore::unbounded());
        store.append(Sample::new(1.0, 1.0));
        let mut ingest = new_loop(FailingSource, &store);

        assert_eq!(
            ingest.run(),
            IngestExit::SourceFailed("device unplugged".to_string())
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_stop_flag_is_checked_before_reading() {
        let store = Arc::new(SampleStore::unbounded());
        let stop = Arc::new(AtomicBool::new(true));
        let mut ingest = IngestLoop::new(
            ScriptedSource::lines("1,1\n", ChunkRead::Closed),
            Arc::clone(&store),
            stop,
            Duration::from_millis(20),
        );

        assert_eq!(ingest.run(), IngestExit::Stopped);
        assert!(store.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shutdown_within_one_timeout() {
        let timeout = Duration::from_millis(200);
        let store = Arc::new(SampleStore::rolling(100));
        let handle = IngestHandle::spawn(SilentSource, Arc::clone(&store), timeout);

        tokio::time::sleep(Duration::from_millis(50)).await;
        let started = Instant::now();
        let exit = handle.shutdown().await;

        assert_eq!(exit, IngestExit::Stopped);
        assert!(
            started.elapsed() < timeout + Duration::from_millis(150),
            "shutdown took {:?}",
            started.elapsed()
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shutdown_while_appending() {
        let store = Arc::new(SampleStore::rolling(50));
        let text: String = (0..5_000).map(|i| format!("{i},{i}\n")).collect();
        let handle = IngestHandle::spawn(
            ScriptedSource::lines(&text, ChunkRead::Timeout),
            Arc::clone(&store),
            Duration::from_millis(20),
        );

        let snapshot = store.snapshot();
        assert!(snapshot.iter().all(|s| s.x == s.y));

        handle.shutdown().await;
        let snapshot = store.snapshot();
        assert!(snapshot.len() <= 50);
        assert!(snapshot.iter().all(|s| s.x == s.y));
    }
}
