//! Completion backend adapters.

pub mod http;
pub mod mock;
pub mod retry;

pub use http::{HttpBackendConfig, HttpCompletionBackend};
pub use mock::{MockBackend, MockReply};
pub use retry::RetryPolicy;
