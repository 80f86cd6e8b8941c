//! Per-client rate limiting and state management.

mod bucket;
mod clock;
mod identity;
mod limiter;

pub use bucket::ClientBucket;
pub use clock::{Clock, ManualClock, SystemClock};
pub use identity::ClientIdentity;
pub use limiter::{LimiterSettings, RateLimiterRegistry};
