//! CRPT API - rate-limited document registration client
//!
//! This crate submits registration documents to the CRPT API while keeping
//! the outbound request rate under a configured limit per time window. The
//! limit is enforced by a local fixed-window admission gate shared by all
//! callers of one submitter.

pub mod config;
pub mod document;
pub mod error;
pub mod ratelimit;
pub mod submit;

pub use document::{Document, Product};
pub use error::{CrptError, Result};
pub use ratelimit::{AdmissionPolicy, RateLimiter, TimeWindow};
pub use submit::DocumentSubmitter;
