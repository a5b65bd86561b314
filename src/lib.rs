//! upnp-http - HTTP transport and virtual path bridging for UPnP media serving
//!
//! This crate provides the blocking HTTP/1.0 and HTTP/1.1 client and server
//! used underneath UPnP control and content serving, and the resolver that
//! maps `virtualpath://` browse identifiers onto local share roots.

pub mod http;
pub mod upnp;
