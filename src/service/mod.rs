//! # Services
//!
//! - **Inspector**: target side; answers modifications and hierarchy requests
//! - **Client**: inspector side; sends requests and matches their responses

pub mod client;
pub mod inspector;

pub use client::InspectorClient;
pub use inspector::InspectorService;
