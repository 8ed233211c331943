pub mod common;

mod config_loading;
mod session_routes;
