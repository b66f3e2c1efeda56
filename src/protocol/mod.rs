//! Protocol Module
//!
//! Defines the wire protocol for client-server communication. Values never
//! cross the wire natively; they travel as codec envelopes.
//!
//! ## Protocol Format (V1 - Simple Binary)
//!
//! ### Request Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Cmd (1)  │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Commands
//! - 0x01: GET    - Payload: key_len (4) + key
//! - 0x02: PUT    - Payload: key_len (4) + key + envelope
//! - 0x03: DEL    - Payload: key_len (4) + key
//! - 0x04: PING   - Payload: empty
//! - 0x05: WATCH  - Payload: key_len (4) + key + op (1: all, 2: put, 3: delete)
//!
//! ### Response Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │Status(1) │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Status Codes
//! - 0x00: OK
//! - 0x01: NOT_FOUND
//! - 0x02: ERROR
//! - 0x03: EVENT (streamed after a WATCH is acknowledged)

mod command;
mod response;
mod codec;

pub use command::{Command, CommandType};
pub use response::{Response, Status};
pub use codec::{
    decode_command, decode_event, decode_response, encode_command, encode_event,
    encode_response, read_command, read_response, write_command, write_response, HEADER_SIZE,
    MAX_PAYLOAD_SIZE,
};
