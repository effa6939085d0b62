//! Index Server Client Module
//!
//! Minimal HTTP access to a single index-server instance. The server is an
//! opaque service with a fixed protocol; this module only knows how to push
//! bodies at it and how to tell a refused body from an unreachable server.
//!
//! ## Submodules
//! - **`protocol`**: endpoints, content types and XML update bodies.
//! - **`solr`**: `IndexServiceClient`, one instance per target node.

pub mod protocol;
pub mod solr;

pub use solr::IndexServiceClient;

#[cfg(test)]
mod tests;
