//! Rate limiting logic and state management.

mod counter;
mod limiter;

pub use counter::{TimeWindow, WindowCounter};
pub use limiter::{AdmissionPolicy, RateLimiter};
