use crate::common::config::SensorConfig;
use crate::common::{VoterError, Result};
use serialport::SerialPort;
use std::io::{BufRead, BufReader, ErrorKind, Read, Write};

/// Line-oriented channel to the sensor.
pub trait SensorLink: Send {
    /// Writes one command followed by a newline.
    fn send_line(&mut self, line: &str) -> Result<()>;

    /// Reads the next complete line, without its terminator.
    /// Returns `Ok(None)` when the per-line read timeout elapsed first.
    fn read_line(&mut self) -> Result<Option<String>>;
}

/// Newline-framed reader/writer over any byte port whose reads time out.
pub struct LineLink<P> {
    port_name: String,
    reader: BufReader<P>,
    pending: Vec<u8>,
}

pub type SerialLink = LineLink<Box<dyn SerialPort>>;

impl LineLink<Box<dyn SerialPort>> {
    pub fn open(config: &SensorConfig) -> Result<Self> {
        tracing::info!("Opening serial port {} at {} baud", config.port, config.baud_rate);

        let port = serialport::new(&config.port, config.baud_rate)
            .timeout(config.read_timeout())
            .open()?;

        Ok(Self::new(config.port.clone(), port))
    }
}

impl<P: Read + Write> LineLink<P> {
    pub fn new(port_name: impl Into<String>, port: P) -> Self {
        Self {
            port_name: port_name.into(),
            reader: BufReader::new(port),
            pending: Vec::new(),
        }
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

impl<P: Read + Write + Send> SensorLink for LineLink<P> {
    fn send_line(&mut self, line: &str) -> Result<()> {
        let port = self.reader.get_mut();
        port.write_all(format!("{}\n", line).as_bytes())?;
        port.flush()?;
        Ok(())
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        // Partial lines stay in `pending` across timeouts
        match self.reader.read_until(b'\n', &mut self.pending) {
            Ok(0) => Ok(None),
            Ok(_) if self.pending.last() == Some(&b'\n') => {
                let bytes = std::mem::take(&mut self.pending);
                let line = String::from_utf8_lossy(&bytes).trim().to_string();
                Ok(Some(line))
            }
            Ok(_) => Ok(None),
            Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(VoterError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io;

    /// Hands out one queued chunk per read; a `Err` kind stands in for a read timeout.
    #[derive(Default)]
    struct ChunkedPort {
        chunks: VecDeque<std::result::Result<Vec<u8>, ErrorKind>>,
        written: Vec<u8>,
    }

    impl ChunkedPort {
        fn with(chunks: Vec<std::result::Result<&str, ErrorKind>>) -> Self {
            Self {
                chunks: chunks.into_iter().map(|c| c.map(|s| s.as_bytes().to_vec())).collect(),
                written: Vec::new(),
            }
        }
    }

    impl Read for ChunkedPort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.chunks.pop_front() {
                Some(Ok(chunk)) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    if n < chunk.len() {
                        self.chunks.push_front(Ok(chunk[n..].to_vec()));
                    }
                    Ok(n)
                }
                Some(Err(kind)) => Err(io::Error::new(kind, "no data")),
                None => Err(io::Error::new(ErrorKind::TimedOut, "no data")),
            }
        }
    }

    impl Write for ChunkedPort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn partial_line_survives_read_timeout() {
        let port = ChunkedPort::with(vec![
            Ok(r#"{"status":"succ"#),
            Err(ErrorKind::TimedOut),
            Ok("ess\"}\n"),
        ]);
        let mut link = LineLink::new("test", port);

        assert_eq!(link.read_line().unwrap(), None);
        assert_eq!(link.read_line().unwrap().as_deref(), Some(r#"{"status":"success"}"#));
        assert_eq!(link.read_line().unwrap(), None);
    }

    #[test]
    fn splits_lines_arriving_in_one_chunk() {
        let port = ChunkedPort::with(vec![Ok("{\"status\":\"ready\"}\r\n{\"status\":\"waiting\"}\n")]);
        let mut link = LineLink::new("test", port);

        assert_eq!(link.read_line().unwrap().as_deref(), Some(r#"{"status":"ready"}"#));
        assert_eq!(link.read_line().unwrap().as_deref(), Some(r#"{"status":"waiting"}"#));
    }

    #[test]
    fn would_block_reads_as_no_line() {
        let port = ChunkedPort::with(vec![Err(ErrorKind::WouldBlock), Ok("done\n")]);
        let mut link = LineLink::new("test", port);

        assert_eq!(link.read_line().unwrap(), None);
        assert_eq!(link.read_line().unwrap().as_deref(), Some("done"));
    }

    #[test]
    fn other_read_errors_propagate() {
        let port = ChunkedPort::with(vec![Err(ErrorKind::BrokenPipe)]);
        let mut link = LineLink::new("test", port);

        assert!(matches!(link.read_line(), Err(VoterError::Io(_))));
    }

    #[test]
    fn send_appends_newline() {
        let mut link = LineLink::new("test", ChunkedPort::default());
        link.send_line("DELETE:4").unwrap();
        link.send_line("VERIFY").unwrap();

        assert_eq!(link.reader.get_ref().written, b"DELETE:4\nVERIFY\n");
        assert_eq!(link.port_name(), "test");
    }
}
