//! # Transport
//!
//! Serving attachments over an already-connected byte stream. Discovery and listening
//! sockets belong to the host.

pub mod stream;

pub use stream::serve;
