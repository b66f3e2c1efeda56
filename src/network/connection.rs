//! Connection Handler
//!
//! Handles individual client connections.

use std::io::{BufReader, BufWriter, Read};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{bounded, select, Receiver};

use crate::engine::Engine;
use crate::error::{KvError, Result};
use crate::protocol::{read_command, write_response, Command, Response};
use crate::store::KvStore;
use crate::watch::{CancelHandle, WatchOp, WatchStream};

/// Handles a single client connection
pub struct Connection {
    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    /// Reference to the storage engine
    engine: Arc<Engine>,

    /// Peer address for logging
    peer_addr: String,
}

impl Connection {
    /// Create a new connection handler
    ///
    /// Sets up buffered I/O and configures timeouts
    pub fn new(stream: TcpStream, engine: Arc<Engine>) -> Result<Self> {
        // Get peer address for logging before we split the stream
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;

        // Clone stream for separate read/write handles
        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(write_stream),
            engine,
            peer_addr,
        })
    }

    /// Configure connection timeouts (0 = none)
    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64) -> Result<()> {
        let read_stream = self.reader.get_ref();
        let write_stream = self.writer.get_ref();

        if read_ms > 0 {
            read_stream.set_read_timeout(Some(Duration::from_millis(read_ms)))?;
        }
        if write_ms > 0 {
            write_stream.set_write_timeout(Some(Duration::from_millis(write_ms)))?;
        }

        Ok(())
    }

    /// Handle the connection (blocking until closed)
    ///
    /// Reads commands in a loop and sends responses. A successful WATCH
    /// turns the connection into an event stream until the client hangs up.
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!("Connection established from {}", self.peer_addr);

        loop {
            // Read next command
            let command = match read_command(&mut self.reader) {
                Ok(cmd) => cmd,
                Err(ref e) if is_disconnect(e) => {
                    tracing::debug!("Client {} disconnected: {}", self.peer_addr, e);
                    return Ok(());
                }
                Err(ref e) if is_timeout(e) => {
                    tracing::debug!("Read timeout for client {}", self.peer_addr);
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!("Error reading from {}: {}", self.peer_addr, e);
                    // Send error response if possible
                    let _ = self.send_response(Response::error(&e.to_string()));
                    return Err(e);
                }
            };

            tracing::trace!("Received command from {}: {:?}", self.peer_addr, command);

            if let Command::Watch { key, op } = command {
                match self.engine.add_watch(&key, op) {
                    Ok((events, cancel)) => return self.stream_watch(&key, op, events, cancel),
                    Err(e) => {
                        self.reply(Response::from_error(&e))?;
                        continue;
                    }
                }
            }

            // Execute command
            let response = self.execute_command(command);
            self.reply(response)?;
        }
    }

    /// Execute a command and return a response
    fn execute_command(&self, command: Command) -> Response {
        match self.engine.execute(command) {
            Ok(payload) => Response::ok(payload.map(|p| p.to_vec())),
            Err(e) => Response::from_error(&e),
        }
    }

    /// Send a response, treating a vanished client as a normal close
    fn reply(&mut self, response: Response) -> Result<()> {
        match self.send_response(response) {
            Ok(()) => Ok(()),
            Err(ref e) if is_disconnect(e) => {
                // The client went away before we could answer; not a server error.
                tracing::debug!(
                    "Client {} disconnected before response could be sent: {}",
                    self.peer_addr,
                    e
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Error writing to {}: {}", self.peer_addr, e);
                Err(e)
            }
        }
    }

    /// Acknowledge a WATCH and forward its events until either side ends it
    fn stream_watch(
        &mut self,
        key: &str,
        op: WatchOp,
        events: WatchStream,
        cancel: CancelHandle,
    ) -> Result<()> {
        self.send_response(Response::ok(None))?;
        tracing::debug!("Client {} watching {} ({})", self.peer_addr, key, op);

        // Input already buffered behind the WATCH frame ends the watch too
        if !self.reader.buffer().is_empty() {
            cancel.cancel();
            tracing::debug!("Client {} stopped watching {}", self.peer_addr, key);
            let _ = self.writer.get_ref().shutdown(Shutdown::Both);
            return Ok(());
        }

        let hangup = HangupMonitor::spawn(self.reader.get_ref().try_clone()?);

        loop {
            let update = select! {
                recv(events.receiver()) -> msg => msg.ok(),
                recv(hangup.signal) -> _ => None,
            };
            let Some(update) = update else {
                break;
            };

            let response = match Response::event(&update) {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!("Cannot encode event for {}: {}", self.peer_addr, e);
                    break;
                }
            };
            if let Err(e) = self.send_response(response) {
                tracing::debug!("Watch stream to {} ended: {}", self.peer_addr, e);
                break;
            }
        }

        cancel.cancel();
        tracing::debug!("Client {} stopped watching {}", self.peer_addr, key);

        // Unblocks the monitor's read
        let _ = self.writer.get_ref().shutdown(Shutdown::Both);
        hangup.join();
        Ok(())
    }

    /// Send a response to the client
    fn send_response(&mut self, response: Response) -> Result<()> {
        write_response(&mut self.writer, &response)?;
        Ok(())
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}

/// Watches the socket while the connection streams events
///
/// Any input from the client, EOF or a read error ends the watch.
struct HangupMonitor {
    signal: Receiver<()>,
    thread: JoinHandle<()>,
}

impl HangupMonitor {
    fn spawn(mut probe: TcpStream) -> Self {
        let (tx, signal) = bounded(1);

        let thread = thread::spawn(move || {
            let mut buf = [0u8; 64];
            loop {
                match probe.read(&mut buf) {
                    Err(e)
                        if matches!(
                            e.kind(),
                            std::io::ErrorKind::WouldBlock
                                | std::io::ErrorKind::TimedOut
                                | std::io::ErrorKind::Interrupted
                        ) =>
                    {
                        continue
                    }
                    _ => break,
                }
            }
            let _ = tx.send(());
        });

        Self { signal, thread }
    }

    fn join(self) {
        if self.thread.join().is_err() {
            tracing::warn!("hangup monitor thread panicked");
        }
    }
}

fn is_disconnect(err: &KvError) -> bool {
    match err {
        KvError::Io(e) => matches!(
            e.kind(),
            std::io::ErrorKind::UnexpectedEof
                | std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::BrokenPipe
        ),
        _ => false,
    }
}

// Windows reports TimedOut where Unix reports WouldBlock
fn is_timeout(err: &KvError) -> bool {
    match err {
        KvError::Io(e) => matches!(
            e.kind(),
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
        ),
        _ => false,
    }
}
