//! # Protocol Layer
//!
//! What happens to an attachment once it has been framed.
//!
//! ## Components
//! - **Message**: modification, ack and error report entities
//! - **Version**: client version compatibility checks
//! - **Capability**: typed mutation entry points per object type
//! - **Dispatcher**: applies modifications on the owning thread
//! - **Correlation**: matches responses to requests out of order

pub mod capability;
pub mod correlation;
pub mod dispatcher;
pub mod message;
pub mod version;

#[cfg(test)]
mod tests;
