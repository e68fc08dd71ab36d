mod auth;
mod error_handler;
mod rate_limit;

pub use auth::{GateDecision, RouteClass, RoutePolicy, auth_middleware};
pub use error_handler::log_errors;
pub use rate_limit::{
    RateLimitDecision, RateLimitScope, RateLimiter, RollingRateLimiter, ScopedRateLimiter, Sweep,
    rate_limit, rate_limit_identifier, rate_limited_response, spawn_sweeper, with_rate_limit,
};
