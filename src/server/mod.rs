//! HTTP gateway
//!
//! Exposes the narration pipeline over HTTP: health, engine status and
//! multipart narration requests.

pub mod http;
pub mod state;

pub use http::create_router;
pub use state::AppState;
