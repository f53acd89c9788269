//! Per-user rate limiting
//!
//! Token-bucket limiting keyed by the authenticated user id, applied ahead
//! of the handlers. Requests without an identity header pass through here
//! and are rejected by the handler's own identity check instead.

use crate::config::RateLimitConfig;
use crate::error::AppError;
use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures_util::future::LocalBoxFuture;
use governor::{DefaultKeyedRateLimiter, Quota};
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

#[derive(Clone)]
pub struct RateLimitMiddleware {
    limiter: Arc<DefaultKeyedRateLimiter<Uuid>>,
}

impl RateLimitMiddleware {
    pub fn new(config: &RateLimitConfig) -> Self {
        let per_minute = NonZeroU32::new(config.requests_per_minute.max(1))
            .unwrap_or(NonZeroU32::new(1).unwrap());
        let burst = NonZeroU32::new(config.burst_size.max(1)).unwrap_or(per_minute);
        let quota = Quota::per_minute(per_minute).allow_burst(burst);

        Self {
            limiter: Arc::new(DefaultKeyedRateLimiter::keyed(quota)),
        }
    }

    /// Drop idle per-user buckets. Called by the background sweeper.
    pub fn purge_idle(&self) {
        self.limiter.retain_recent();
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimitMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RateLimitService<S>;
    type Future = LocalBoxFuture<'static, Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        let limiter = Arc::clone(&self.limiter);
        Box::pin(async move { Ok(RateLimitService { service, limiter }) })
    }
}

pub struct RateLimitService<S> {
    service: S,
    limiter: Arc<DefaultKeyedRateLimiter<Uuid>>,
}

impl<S, B> Service<ServiceRequest> for RateLimitService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let user_id = req
            .headers()
            .get("X-User-Id")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v).ok());

        if let Some(user_id) = user_id {
            if self.limiter.check_key(&user_id).is_err() {
                warn!(user_id = %user_id, "rate limit exceeded");
                return Box::pin(async move { Err(AppError::RateLimited.into()) });
            }
        }

        let fut = self.service.call(req);
        Box::pin(fut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_then_limited_per_user() {
        let middleware = RateLimitMiddleware::new(&RateLimitConfig {
            requests_per_minute: 60,
            burst_size: 2,
        });
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        assert!(middleware.limiter.check_key(&alice).is_ok());
        assert!(middleware.limiter.check_key(&alice).is_ok());
        assert!(middleware.limiter.check_key(&alice).is_err());
        // Buckets are independent per user.
        assert!(middleware.limiter.check_key(&bob).is_ok());
    }
}
