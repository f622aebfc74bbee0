pub mod allocator;
pub mod config;
pub mod config_validator;
pub mod counter;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod quota;
pub mod resolver;
pub mod response;
pub mod server;
pub mod shortener;
pub mod store;
pub mod validation;

pub use config::Config;
pub use error::{Result, ShortenerError};
pub use response::ShortenResponse;
pub use server::create_app;
