// Application modules - explicitly public for external access
pub mod dto;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod monitoring;

pub use error::ApiError;
pub use handlers::{AppState, build_router};
