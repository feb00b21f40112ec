pub mod aggregate;
pub mod auth;
pub mod cache;
pub mod fetch;
pub mod git_ops;
pub mod monitor;
pub mod probe;
pub mod status;
