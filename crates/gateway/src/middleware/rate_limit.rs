//! Rate limiting middleware using token bucket algorithm

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use concierge_common::errors::AppError;
use governor::{
    clock::QuantaClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter using governor crate
pub type GlobalRateLimiter = RateLimiter<NotKeyed, InMemoryState, QuantaClock>;

/// Limiter handle plus the configured rate, for error messages
#[derive(Clone)]
pub struct RateLimitState {
    pub limiter: Arc<GlobalRateLimiter>,
    pub requests_per_second: u32,
}

/// Create a new rate limiter
pub fn create_rate_limiter(requests_per_second: u32, burst: u32) -> RateLimitState {
    let per_second = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
    let burst = NonZeroU32::new(burst).unwrap_or(per_second);
    let quota = Quota::per_second(per_second).allow_burst(burst);

    RateLimitState {
        limiter: Arc::new(RateLimiter::direct(quota)),
        requests_per_second: per_second.get(),
    }
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    match state.limiter.check() {
        Ok(_) => Ok(next.run(request).await),
        Err(_) => {
            tracing::warn!(path = %request.uri().path(), "Rate limit exceeded");
            Err(AppError::RateLimited {
                limit: state.requests_per_second,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_creation() {
        let state = create_rate_limiter(100, 200);
        assert!(state.limiter.check().is_ok());
        assert_eq!(state.requests_per_second, 100);
    }

    #[test]
    fn test_burst_exhaustion() {
        let state = create_rate_limiter(1, 2);
        assert!(state.limiter.check().is_ok());
        assert!(state.limiter.check().is_ok());
        assert!(state.limiter.check().is_err());
    }

    #[test]
    fn test_zero_rate_is_clamped() {
        let state = create_rate_limiter(0, 0);
        assert_eq!(state.requests_per_second, 1);
        assert!(state.limiter.check().is_ok());
    }
}
