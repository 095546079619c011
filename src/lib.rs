pub mod api;
pub mod config;
pub mod connectivity;
pub mod device;
pub mod services;

// Re-exports from services for convenience
pub use services::dispatcher::{DispatchRequest, DispatchResponse, Dispatcher};
pub use services::lifecycle::{LifecycleController, TickOutcome};
pub use services::state_cache::RequestedState;
