//! JSON HTTP API over the movie catalogue.

mod errors;
mod handlers;
mod middleware;
mod server;

pub use server::{build_router, AppState, HttpServer};
