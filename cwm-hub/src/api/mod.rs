//! HTTP API handlers for cwm-hub

pub mod buildinfo;
pub mod frames;
pub mod health;
pub mod sessions;
pub mod sse;

pub use buildinfo::get_build_info;
pub use frames::{frame_routes, submit_frame};
pub use health::health_routes;
pub use sessions::session_routes;
pub use sse::event_stream;
