//! Serial port byte source.
//!
//! Opens a serial device (or any readable path such as a FIFO, `-` for stdin)
//! and waits for data with `poll(2)`. TTYs are switched to raw 8N1 mode at the
//! requested baud rate; the original terminal settings are restored on drop.

use super::{ByteSource, ChunkRead};
use crate::config::BaudRate;
use anyhow::{anyhow, Result};
use std::fs::File;
use std::io;
use std::time::Duration;

#[cfg(unix)]
use std::io::Read;
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
#[cfg(unix)]
use std::os::unix::io::{AsFd, AsRawFd};

/// Path that selects standard input instead of a device.
pub const STDIN_PORT: &str = "-";

/// A serial device or other readable file descriptor.
pub struct SerialSource {
    file: File,
    name: String,
    #[cfg(unix)]
    saved_termios: Option<libc::termios>,
}

#[cfg(unix)]
impl SerialSource {
    /// Opens `port` and configures it for raw reads at `baud`.
    ///
    /// Non-TTY paths are read as-is and `baud` is ignored for them. The open
    /// never waits for carrier detect or for a FIFO writer; the descriptor stays
    /// non-blocking and reads are gated by `poll(2)`.
    ///
    /// # Errors
    /// - If the path cannot be opened for reading
    /// - If the terminal attributes cannot be read or applied
    pub fn open(port: &str, baud: BaudRate) -> Result<Self> {
        let file = if port == STDIN_PORT {
            let fd = io::stdin()
                .as_fd()
                .try_clone_to_owned()
                .map_err(|e| anyhow!("Failed to duplicate stdin: {e}"))?;
            File::from(fd)
        } else {
            std::fs::OpenOptions::new()
                .read(true)
                .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
                .open(port)
                .map_err(|e| anyhow!("Failed to open serial port {port}: {e}"))?
        };

        let mut source = Self {
            file,
            name: port.to_string(),
            saved_termios: None,
        };

        if unsafe { libc::isatty(source.file.as_raw_fd()) } == 1 {
            source.configure_tty(baud)?;
            tracing::debug!("Configured {} as raw TTY at {} baud", port, baud);
        } else {
            tracing::debug!("{} is not a TTY, reading without line settings", port);
        }

        Ok(source)
    }

    /// Applies raw 8N1 settings without flow control.
    fn configure_tty(&mut self, baud: BaudRate) -> Result<()> {
        let fd = self.file.as_raw_fd();
        let mut options: libc::termios = unsafe { std::mem::zeroed() };

        if unsafe { libc::tcgetattr(fd, &mut options) } == -1 {
            return Err(anyhow!("tcgetattr failed: {}", io::Error::last_os_error()));
        }
        let saved = options;

        let speed = speed_constant(baud);
        if unsafe { libc::cfsetispeed(&mut options, speed) } == -1
            || unsafe { libc::cfsetospeed(&mut options, speed) } == -1
        {
            return Err(anyhow!(
                "Failed to set baud rate {baud}: {}",
                io::Error::last_os_error()
            ));
        }

        options.c_cflag &= !(libc::CSIZE | libc::PARENB | libc::CSTOPB);
        options.c_cflag |= libc::CS8 | libc::CLOCAL | libc::CREAD;
        #[cfg(any(target_os = "linux", target_os = "macos"))]
        {
            options.c_cflag &= !libc::CRTSCTS;
        }
        options.c_lflag &= !(libc::ICANON | libc::ECHO | libc::ECHOE | libc::ISIG | libc::IEXTEN);
        options.c_oflag &= !libc::OPOST;
        // Reads are gated by poll(), so read() itself never waits.
        options.c_cc[libc::VMIN] = 0;
        options.c_cc[libc::VTIME] = 0;

        if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &options) } == -1 {
            return Err(anyhow!("tcsetattr failed: {}", io::Error::last_os_error()));
        }

        self.saved_termios = Some(saved);
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(unix)]
impl ByteSource for SerialSource {
    fn read_chunk(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<ChunkRead> {
        let mut pollfd = libc::pollfd {
            fd: self.file.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        let timeout_ms = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;

        let ready = unsafe { libc::poll(&mut pollfd, 1, timeout_ms) };
        if ready == -1 {
            return Err(io::Error::last_os_error());
        }
        if ready == 0 {
            return Ok(ChunkRead::Timeout);
        }
        if pollfd.revents & (libc::POLLERR | libc::POLLNVAL) != 0 {
            return Err(io::Error::other(format!("poll reported an error on {}", self.name)));
        }

        let read = match self.file.read(buf) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(ChunkRead::Timeout),
            Err(e) => return Err(e),
        };

        match read {
            0 if pollfd.revents & libc::POLLHUP != 0 => Ok(ChunkRead::Closed),
            // A TTY with VMIN=0 may wake up with nothing to read.
            0 if self.saved_termios.is_some() => Ok(ChunkRead::Timeout),
            0 => Ok(ChunkRead::Closed),
            n => Ok(ChunkRead::Data(n)),
        }
    }
}

#[cfg(unix)]
impl Drop for SerialSource {
    fn drop(&mut self) {
        if let Some(saved) = self.saved_termios.take() {
            let fd = self.file.as_raw_fd();
            if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &saved) } == -1 {
                tracing::debug!(
                    "Failed to restore terminal settings on {}: {}",
                    self.name,
                    io::Error::last_os_error()
                );
            }
        }
        tracing::debug!("Closed serial source {}", self.name);
    }
}

#[cfg(unix)]
fn speed_constant(baud: BaudRate) -> libc::speed_t {
    match baud {
        BaudRate::B9600 => libc::B9600,
        BaudRate::B19200 => libc::B19200,
        BaudRate::B38400 => libc::B38400,
        BaudRate::B57600 => libc::B57600,
        BaudRate::B115200 => libc::B115200,
    }
}

#[cfg(not(unix))]
impl SerialSource {
    pub fn open(port: &str, _baud: BaudRate) -> Result<Self> {
        Err(anyhow!("Serial port {port} is not supported on this platform"))
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(not(unix))]
impl ByteSource for SerialSource {
    fn read_chunk(&mut self, _buf: &mut [u8], _timeout: Duration) -> io::Result<ChunkRead> {
        Ok(ChunkRead::Closed)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::source::{LineRead, LineReader};
    use std::io::Write;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("serplot_{}_{}", std::process::id(), name))
    }

    #[test]
    fn test_regular_file_is_read_to_end() {
        let path = temp_path("serial_file.csv");
        {
            let mut file = File::create(&path).unwrap();
            file.write_all(b"1,2\n3,4\n").unwrap();
        }

        let source = SerialSource::open(path.to_str().unwrap(), BaudRate::B9600).unwrap();
        let mut reader = LineReader::new(source);
        let timeout = Duration::from_millis(100);

        assert_eq!(reader.read_line(timeout).unwrap(), LineRead::Line("1,2".into()));
        assert_eq!(reader.read_line(timeout).unwrap(), LineRead::Line("3,4".into()));
        assert_eq!(reader.read_line(timeout).unwrap(), LineRead::Closed);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_fifo_without_writer_opens_promptly() {
        let path = temp_path("serial_fifo");
        std::fs::remove_file(&path).ok();
        let c_path = std::ffi::CString::new(path.to_str().unwrap()).unwrap();
        assert_eq!(unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) }, 0);

        let (tx, rx) = std::sync::mpsc::channel();
        let port = path.to_str().unwrap().to_string();
        std::thread::spawn(move || {
            tx.send(SerialSource::open(&port, BaudRate::B9600)).ok();
        });
        let source = rx
            .recv_timeout(Duration::from_millis(1500))
            .expect("open blocked on a FIFO without a writer")
            .unwrap();

        let mut writer = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        writer.write_all(b"5,6\n").unwrap();
        drop(writer);

        let mut reader = LineReader::new(source);
        let timeout = Duration::from_millis(500);
        assert_eq!(reader.read_line(timeout).unwrap(), LineRead::Line("5,6".into()));
        assert_eq!(reader.read_line(timeout).unwrap(), LineRead::Closed);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_port_fails_to_open() {
        let path = temp_path("does_not_exist");
        let err = SerialSource::open(path.to_str().unwrap(), BaudRate::B115200)
            .err()
            .unwrap();
        assert!(err.to_string().contains("Failed to open serial port"));
    }
}
