//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//!
//! ### Request (Command) Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Cmd (1)  │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Payload by Command Type
//! - GET:    key_len (4 bytes) + key
//! - PUT:    key_len (4 bytes) + key + envelope
//! - DELETE: key_len (4 bytes) + key
//! - PING:   empty
//! - WATCH:  key_len (4 bytes) + key + op (1 byte)
//!
//! ### Response Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │Status(1) │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Event Payload (status EVENT)
//! kind (1) + revision (8) + key_len (4) + key + envelope (puts only)

use std::io::{Read, Write};

use crate::error::{KvError, Result};
use crate::value::{unmarshal, Envelope};
use crate::watch::{EventKind, Update, WatchOp};

use super::{Command, Response, Status};

/// Header size: 1 byte command/status + 4 bytes length
pub const HEADER_SIZE: usize = 5;

/// Maximum payload size (16 MB)
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

// =============================================================================
// Command Encoding/Decoding
// =============================================================================

/// Encode a command to bytes
///
/// Format: cmd_type (1) + payload_len (4) + payload
pub fn encode_command(command: &Command) -> Vec<u8> {
    let cmd_type = command.command_type() as u8;

    // Build payload based on command type
    let payload = match command {
        Command::Get { key } | Command::Delete { key } => encode_key(key, 0),
        Command::Put { key, value } => {
            let mut payload = encode_key(key, value.encoded_len());
            payload.extend_from_slice(&value.encode());
            payload
        }
        Command::Watch { key, op } => {
            let mut payload = encode_key(key, 1);
            payload.push(op.code());
            payload
        }
        Command::Ping => Vec::new(),
    };

    frame(cmd_type, &payload)
}

/// Decode a command from bytes
pub fn decode_command(bytes: &[u8]) -> Result<Command> {
    let (cmd_type, payload) = split_frame(bytes, "command")?;

    // Parse command based on type
    match cmd_type {
        0x01 => {
            let key = decode_key_only(payload, "GET")?;
            Ok(Command::Get { key })
        }
        0x02 => {
            let (key, rest) = decode_key(payload, "PUT")?;
            let value = Envelope::decode(rest)?;
            Ok(Command::Put { key, value })
        }
        0x03 => {
            let key = decode_key_only(payload, "DELETE")?;
            Ok(Command::Delete { key })
        }
        0x04 => {
            if !payload.is_empty() {
                return Err(KvError::Protocol(format!(
                    "PING command: unexpected payload of {} bytes",
                    payload.len()
                )));
            }
            Ok(Command::Ping)
        }
        0x05 => {
            let (key, rest) = decode_key(payload, "WATCH")?;
            let op = match rest {
                [code] => WatchOp::try_from(*code)?,
                _ => {
                    return Err(KvError::Protocol(format!(
                        "WATCH command: expected 1 op byte, got {}",
                        rest.len()
                    )))
                }
            };
            Ok(Command::Watch { key, op })
        }
        _ => Err(KvError::Protocol(format!(
            "Unknown command type: 0x{:02x}",
            cmd_type
        ))),
    }
}

// =============================================================================
// Response Encoding/Decoding
// =============================================================================

/// Encode a response to bytes
///
/// Format: status (1) + payload_len (4) + payload
pub fn encode_response(response: &Response) -> Vec<u8> {
    let payload = response.payload.as_deref().unwrap_or(&[]);
    frame(response.status as u8, payload)
}

/// Decode a response from bytes
pub fn decode_response(bytes: &[u8]) -> Result<Response> {
    let (status_byte, payload) = split_frame(bytes, "response")?;

    // Parse status
    let status = match status_byte {
        0x00 => Status::Ok,
        0x01 => Status::NotFound,
        0x02 => Status::Error,
        0x03 => Status::Event,
        _ => {
            return Err(KvError::Protocol(format!(
                "Unknown response status: 0x{:02x}",
                status_byte
            )))
        }
    };

    // Extract payload
    let payload = if payload.is_empty() {
        None
    } else {
        Some(payload.to_vec())
    };

    Ok(Response { status, payload })
}

// =============================================================================
// Watch Events
// =============================================================================

/// Encode an update as an EVENT payload
pub fn encode_event(update: &Update, value: Option<&Envelope>) -> Vec<u8> {
    let value_len = value.map(Envelope::encoded_len).unwrap_or(0);
    let mut payload = Vec::with_capacity(1 + 8 + 4 + update.key.len() + value_len);
    payload.push(update.kind.code());
    payload.extend_from_slice(&update.revision.to_be_bytes());
    payload.extend_from_slice(&(update.key.len() as u32).to_be_bytes());
    payload.extend_from_slice(update.key.as_bytes());
    if let Some(envelope) = value {
        payload.extend_from_slice(&envelope.encode());
    }
    payload
}

/// Decode an EVENT payload back into an update
pub fn decode_event(payload: &[u8]) -> Result<Update> {
    if payload.len() < 9 {
        return Err(KvError::Protocol(format!(
            "EVENT: expected at least 9 header bytes, got {}",
            payload.len()
        )));
    }

    let kind = EventKind::try_from(payload[0])?;
    let mut revision = [0u8; 8];
    revision.copy_from_slice(&payload[1..9]);
    let revision = u64::from_be_bytes(revision);

    let (key, rest) = decode_key(&payload[9..], "EVENT")?;

    match kind {
        EventKind::Put => {
            let value = unmarshal(&Envelope::decode(rest)?)?;
            Ok(Update::put(key, value, revision))
        }
        EventKind::Delete if rest.is_empty() => Ok(Update::delete(key, revision)),
        EventKind::Delete => Err(KvError::Protocol(format!(
            "EVENT: delete carries {} unexpected bytes",
            rest.len()
        ))),
    }
}

// =============================================================================
// Framing helpers
// =============================================================================

fn frame(code: u8, payload: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(HEADER_SIZE + payload.len());
    message.push(code);
    message.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    message.extend_from_slice(payload);
    message
}

/// Validate the header and return (code, payload)
fn split_frame<'a>(bytes: &'a [u8], what: &str) -> Result<(u8, &'a [u8])> {
    if bytes.len() < HEADER_SIZE {
        return Err(KvError::Protocol(format!(
            "Incomplete {} header: expected {} bytes, got {}",
            what,
            HEADER_SIZE,
            bytes.len()
        )));
    }

    let code = bytes[0];
    let payload_len = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);

    // Validate payload length
    if payload_len > MAX_PAYLOAD_SIZE {
        return Err(KvError::Protocol(format!(
            "{} payload too large: {} bytes (max {})",
            what, payload_len, MAX_PAYLOAD_SIZE
        )));
    }

    let total_len = HEADER_SIZE + payload_len as usize;
    if bytes.len() < total_len {
        return Err(KvError::Protocol(format!(
            "Incomplete {} payload: expected {} bytes, got {}",
            what,
            total_len,
            bytes.len()
        )));
    }

    Ok((code, &bytes[HEADER_SIZE..total_len]))
}

fn encode_key(key: &str, extra: usize) -> Vec<u8> {
    let mut payload = Vec::with_capacity(4 + key.len() + extra);
    payload.extend_from_slice(&(key.len() as u32).to_be_bytes());
    payload.extend_from_slice(key.as_bytes());
    payload
}

/// Split `key_len (4) + key` off the front of a payload
fn decode_key<'a>(payload: &'a [u8], name: &str) -> Result<(String, &'a [u8])> {
    if payload.len() < 4 {
        return Err(KvError::Protocol(format!(
            "{} command: missing key length",
            name
        )));
    }

    let key_len = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]) as usize;

    if payload.len() - 4 < key_len {
        return Err(KvError::Protocol(format!(
            "{} command: incomplete key (expected {}, got {})",
            name,
            key_len,
            payload.len() - 4
        )));
    }

    let key = std::str::from_utf8(&payload[4..4 + key_len])
        .map_err(|e| KvError::Protocol(format!("{} command: key is not UTF-8: {}", name, e)))?;

    Ok((key.to_string(), &payload[4 + key_len..]))
}

fn decode_key_only(payload: &[u8], name: &str) -> Result<String> {
    let (key, rest) = decode_key(payload, name)?;
    if !rest.is_empty() {
        return Err(KvError::Protocol(format!(
            "{} command: {} trailing bytes after key",
            name,
            rest.len()
        )));
    }
    Ok(key)
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read one complete frame (header + payload)
///
/// Blocks until the frame is received or an error occurs
fn read_frame<R: Read>(reader: &mut R, what: &str) -> Result<Vec<u8>> {
    // Read header first
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;

    // Parse payload length
    let payload_len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]);

    // Validate payload length
    if payload_len > MAX_PAYLOAD_SIZE {
        return Err(KvError::Protocol(format!(
            "{} payload too large: {} bytes (max {})",
            what, payload_len, MAX_PAYLOAD_SIZE
        )));
    }

    // Read payload after the header
    let mut message = vec![0u8; HEADER_SIZE + payload_len as usize];
    message[..HEADER_SIZE].copy_from_slice(&header);
    reader.read_exact(&mut message[HEADER_SIZE..])?;

    Ok(message)
}

/// Read a complete command from a stream
pub fn read_command<R: Read>(reader: &mut R) -> Result<Command> {
    let message = read_frame(reader, "command")?;
    decode_command(&message)
}

/// Write a command to a stream
pub fn write_command<W: Write>(writer: &mut W, command: &Command) -> Result<()> {
    let bytes = encode_command(command);
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Read a complete response from a stream
pub fn read_response<R: Read>(reader: &mut R) -> Result<Response> {
    let message = read_frame(reader, "response")?;
    decode_response(&message)
}

/// Write a response to a stream
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    let bytes = encode_response(response);
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}
