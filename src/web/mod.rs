// HTTP surface: form endpoints for listing and downloading, plus health

pub mod error;
pub mod handlers;
pub mod server;

pub use error::ApiError;
pub use server::{router, run_server, AppState};
