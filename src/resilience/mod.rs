pub mod coordinator;
pub mod retry;
