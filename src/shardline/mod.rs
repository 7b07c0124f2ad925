pub mod config;
pub mod error;
pub mod kafka;
pub mod observability;
pub mod queue;
pub mod server;
pub mod store;
pub mod worker;
