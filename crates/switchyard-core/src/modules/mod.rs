//! Configuration, logging, and persistent store modules.

pub mod config;
pub mod gateway_pg;
pub(crate) mod gateway_pg_helpers;
pub mod logger;
pub mod memory_store;
pub mod repository;
