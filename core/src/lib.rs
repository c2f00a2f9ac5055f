//! Models, SQLite storage and schema migration for wgze.

pub mod db;
pub mod error;
pub mod models;
pub mod store;
