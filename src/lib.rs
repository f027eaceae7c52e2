pub mod api;
pub mod blockchain;
pub mod config;
pub mod error;
pub mod hashing;
pub mod node;
pub mod transaction;
pub mod wallet;
