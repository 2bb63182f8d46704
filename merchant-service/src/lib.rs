pub mod config;
pub mod handlers;
pub mod listener;
pub mod migration;
pub mod registry;
pub mod store;
