//! Rate-limited cloud facade for the converge engine.
//!
//! This crate owns everything that touches the wire:
//!
//! - **Admission control**: the [`RateLimiter`] trait and its combinators
//!   (adapter, ticker, minimum-duration, per-service composite, per-project
//!   fan-out). Every cloud call is accepted before dispatch and observed
//!   after.
//! - **Cancellation**: [`CallContext`] threads one cancellation signal
//!   through every limiter wait and wire call.
//! - **The facade**: [`Cloud`] pairs a [`Transport`] with a limiter and
//!   exposes typed, scope-checked collection accessors alongside the
//!   untyped operations the planner and actions use.
//! - **Schemas**: the compute payload types the engine manages.
//! - **A fake**: [`FakeTransport`] backs every engine test.

pub mod compute;
pub mod context;
pub mod error;
pub mod facade;
pub mod fake;
pub mod key;
pub mod ratelimit;

pub use compute::{
    Backend, BackendService, HealthCheck, HealthCheckLogConfig, HttpHealthCheck,
    NetworkEndpointGroup, SecuritySettings, TcpHealthCheck,
};
pub use context::CallContext;
pub use error::{CloudError, Result};
pub use facade::{Cloud, ResourceClient, Transport};
pub use fake::{FakeTransport, RecordedCall};
pub use key::CallKey;
pub use ratelimit::{
    shared_factory, AcceptRateLimiter, Acceptor, CompositeRateLimiter, MinimumRateLimiter,
    NopRateLimiter, PerProjectRateLimiter, RateLimiter, RateLimiterFactory, TickerRateLimiter,
};
