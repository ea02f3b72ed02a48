//! Outbound half of the forwarder: header rewriting and the deadline-bound
//! upstream call. Nothing here knows about caching.

pub mod error;
pub mod forwarder;
pub mod headers;

pub use error::ForwardError;
pub use forwarder::{Forwarder, OutboundRequest, UpstreamResponse};
pub use headers::{client_headers, outbound_headers};
