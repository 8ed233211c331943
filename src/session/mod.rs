pub mod cookies;
pub mod logout;
pub mod resolver;
