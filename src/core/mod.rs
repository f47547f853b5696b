//! # Core Protocol Components
//!
//! Wire-level building blocks: typed values, the attachment envelope, stream framing
//! and allow-list payload decoding.
//!
//! ## Components
//! - **Value**: closed set of attribute types and their fixed byte layouts
//! - **Packet**: the attachment envelope with correlation and version metadata
//! - **Codec**: Tokio codec for framing attachments over byte streams
//! - **Serialization**: payload decoding restricted to declared shapes
//!
//! ## Wire Format
//! ```text
//! [Magic(4)] [FrameVersion(1)] [Kind(1)] [CorrelationId(8)]
//! [VersionLen(2)] [ClientVersion(N)] [PayloadLen(4)] [Payload(M)]
//! ```
//!
//! ## Security
//! - Maximum payload size: 16MB (prevents memory exhaustion)
//! - Magic bytes prevent accidental misinterpretation
//! - Length validation before allocation
//! - Unknown tags and kinds fail closed

pub mod codec;
pub mod packet;
pub mod serialization;
pub mod value;
