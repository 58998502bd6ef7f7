pub mod api;
pub mod pipeline;
pub mod sse;
pub mod types;
pub mod window;
