mod handlers;
pub mod models;
mod state;

pub use handlers::run_server;
