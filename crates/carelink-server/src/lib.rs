//! Carelink HTTP server: state, routes, handlers and the session extractor.

pub mod extract;
pub mod handlers;
pub mod observability;
pub mod routes;
pub mod state;

pub use routes::router;
pub use state::AppState;
