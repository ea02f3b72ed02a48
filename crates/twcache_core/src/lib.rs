//! Request pipeline and HTTP listener of the caching forwarder.
//!
//! [`pipeline::handle`] turns one inbound request into one response:
//! authenticate, validate the `twc_*` controls, consult the store, forward
//! on a miss and persist what came back. [`Master`] accepts connections and
//! drives the pipeline for each request.

pub mod error;
pub mod master;
pub mod params;
pub mod pipeline;
pub mod responses;
pub mod state;

pub use error::{ErrorClass, PipelineError};
pub use master::Master;
pub use params::{
    CACHE_EXPIRY_PARAM, ForwardParams, SKIP_CACHE_PARAM, TARGET_URL_PARAM, TIMEOUT_PARAM,
    parse_params,
};
pub use pipeline::{CacheStatus, handle};
pub use responses::TwcResponse;
pub use state::{AUTH_HEADER, AppContext, CACHE_HIT_HEADER};
