//! Document submission through the rate limiter.

mod submitter;
mod transport;

pub use submitter::DocumentSubmitter;
pub use transport::{Connection, HttpConnection, HttpTransport, Transport, JSON_CONTENT_TYPE};
