//! HTTP surface for accountd

pub mod config;
pub mod handlers;
pub mod server;

pub use config::{LogFormat, ServerConfig};
pub use handlers::{handle_request, status_for, ResponseBody};
pub use server::AccountServer;
