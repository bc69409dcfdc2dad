pub mod commands;
pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod server;

pub use error::ApiError;
pub use server::{router, serve};
