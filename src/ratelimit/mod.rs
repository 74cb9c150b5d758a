//! Rate limiting logic and state management.

mod dynamic;
mod limiter;
mod registry;
mod window;

pub use dynamic::DynamicRateLimiter;
pub use limiter::{Limiter, LimiterKind, Policy, RateLimiter};
pub use registry::{LimiterRegistry, LimiterStats, RegistryStats};
pub use window::WindowStore;
