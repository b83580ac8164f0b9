pub mod handlers;
pub mod middleware;
pub mod plugins;
pub mod routes;
pub mod search;

pub use routes::create_router;
