//! TCP Client
//!
//! Blocking client for the kvwatch wire protocol. Values are marshaled
//! into envelopes before they leave the process.

use std::io::{BufReader, BufWriter};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Instant;

use crate::error::{KvError, Result};
use crate::protocol::{decode_event, read_response, write_command, Command, Response, Status};
use crate::value::{marshal, unmarshal, unmarshal_typed, Envelope, FromValue, Value};
use crate::watch::{Update, WatchOp};

/// A connection to a kvwatch server
pub struct Client {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl Client {
    /// Connect to a server
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        let read_stream = stream.try_clone()?;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
        })
    }

    /// Health check
    pub fn ping(&mut self) -> Result<()> {
        let payload = self.call(&Command::Ping, "")?;
        match payload.as_deref() {
            Some(b"PONG") => Ok(()),
            other => Err(KvError::Protocol(format!(
                "unexpected PING reply: {:?}",
                other
            ))),
        }
    }

    /// Fetch the value stored at `key`
    pub fn get(&mut self, key: &str) -> Result<Value> {
        unmarshal(&self.get_envelope(key)?)
    }

    /// Fetch the value at `key` as a concrete Rust type
    pub fn get_typed<T: FromValue>(&mut self, key: &str) -> Result<T> {
        unmarshal_typed(&self.get_envelope(key)?)
    }

    /// Store a value at `key`
    pub fn put(&mut self, key: &str, value: impl Into<Value>) -> Result<()> {
        let envelope = marshal(&value.into())?;
        self.call(
            &Command::Put {
                key: key.to_string(),
                value: envelope,
            },
            key,
        )?;
        Ok(())
    }

    /// Remove `key`
    pub fn delete(&mut self, key: &str) -> Result<()> {
        self.call(
            &Command::Delete {
                key: key.to_string(),
            },
            key,
        )?;
        Ok(())
    }

    /// Subscribe to `key`, turning this connection into an event stream
    pub fn watch(mut self, key: &str, op: WatchOp) -> Result<WatchEvents> {
        self.call(
            &Command::Watch {
                key: key.to_string(),
                op,
            },
            key,
        )?;

        Ok(WatchEvents {
            reader: self.reader,
            writer: self.writer,
            deadline: None,
            done: false,
        })
    }

    fn get_envelope(&mut self, key: &str) -> Result<Envelope> {
        let payload = self.call(
            &Command::Get {
                key: key.to_string(),
            },
            key,
        )?;
        match payload {
            Some(bytes) => Envelope::decode(&bytes),
            None => Err(KvError::Protocol("GET reply without a value".to_string())),
        }
    }

    /// Send one command and unpack its reply
    fn call(&mut self, command: &Command, key: &str) -> Result<Option<Vec<u8>>> {
        write_command(&mut self.writer, command)?;
        let response = read_response(&mut self.reader)?;
        expect_ok(response, key)
    }
}

fn expect_ok(response: Response, key: &str) -> Result<Option<Vec<u8>>> {
    match response.status {
        Status::Ok => Ok(response.payload),
        Status::NotFound => Err(KvError::NotFound(key.to_string())),
        Status::Error => Err(KvError::Remote(
            response
                .payload
                .map(|p| String::from_utf8_lossy(&p).into_owned())
                .unwrap_or_default(),
        )),
        Status::Event => Err(KvError::Protocol(
            "unexpected EVENT outside a watch".to_string(),
        )),
    }
}

/// Events streamed by the server after a WATCH
///
/// Iteration ends when the server closes the stream or the deadline
/// passes. Dropping the value closes the connection, which cancels the
/// subscription on the server.
pub struct WatchEvents {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
    deadline: Option<Instant>,
    done: bool,
}

impl WatchEvents {
    /// Stop yielding events once `deadline` passes
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Hang up, cancelling the subscription on the server
    pub fn close(self) -> Result<()> {
        match self.writer.get_ref().shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn next_update(&mut self) -> Result<Option<Update>> {
        if let Some(deadline) = self.deadline {
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            self.reader
                .get_ref()
                .set_read_timeout(Some(deadline - now))?;
        }

        let response = match read_response(&mut self.reader) {
            Ok(response) => response,
            Err(KvError::Io(e))
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::UnexpectedEof
                        | std::io::ErrorKind::WouldBlock
                        | std::io::ErrorKind::TimedOut
                        | std::io::ErrorKind::ConnectionReset
                ) =>
            {
                return Ok(None)
            }
            Err(e) => return Err(e),
        };

        match (response.status, response.payload) {
            (Status::Event, Some(payload)) => decode_event(&payload).map(Some),
            (status, _) => Err(KvError::Protocol(format!(
                "expected EVENT, got {:?}",
                status
            ))),
        }
    }
}

impl Iterator for WatchEvents {
    type Item = Result<Update>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_update() {
            Ok(Some(update)) => Some(Ok(update)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
