mod error;
pub use error::ApiError;

mod handler;
pub use handler::ApiHandler;

mod adapter;
pub use adapter::BuildServiceAdapter;

#[cfg(feature = "http")]
mod http;

#[cfg(feature = "http")]
pub use http::{DEFAULT_BODY_LIMIT, HttpApi};

#[cfg(feature = "http")]
pub use axum;
