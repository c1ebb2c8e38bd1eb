//! HTTP transport: routes and server.

mod routes;
mod server;

pub use routes::routes;
pub use server::{ServerConfig, serve, serve_listener};
