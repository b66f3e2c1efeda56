//! Network Module
//!
//! TCP server and client handling.
//!
//! ## Architecture
//! - Single acceptor thread polling a shutdown flag
//! - One thread per connection, capped by `max_connections`
//! - Commands routed through Engine
//! - A WATCH turns its connection into a one-way event stream

mod client;
mod connection;
mod server;

pub use client::{Client, WatchEvents};
pub use connection::Connection;
pub use server::{Server, ShutdownHandle};
