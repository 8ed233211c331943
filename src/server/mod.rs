pub mod server;
pub mod session_routes;
