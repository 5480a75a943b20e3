//! Model access: the completion gateway trait, call policy, and retry.
//!
//! - [`gateway`]: [`CompletionGateway`] trait, its [`OpenRouterClient`](crate::OpenRouterClient)
//!   implementation, the closure-backed [`FnGateway`], and [`CallPolicy`]
//!   (bounded timeout + retry around one logical call).
//! - [`retry`]: transient error detection (429, 5xx, network, timeouts) with
//!   configurable exponential backoff and jitter.

pub mod gateway;
pub mod retry;

pub use gateway::{CallPolicy, CompletionGateway, FnGateway};
pub use retry::RetryConfig;
