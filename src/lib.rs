pub mod cli;
pub mod config;
pub mod context;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;

#[cfg(test)]
pub mod testing;

pub use context::{RequestContext, DEFAULT_TENANT};
pub use database::{ConnectionPoolRegistry, RegistryError, RoutingResolver};
