pub mod endpoint;
pub mod error;
pub mod handlers;
pub mod router;
pub mod sanitize;
pub mod types;

pub use error::fail;
pub use router::dispatch;
pub use types::{AppState, Request};
