mod buffers;
pub mod config;
pub mod datastore;
mod db;
mod functions;
mod geometry;
mod hierarchy;
mod identity;
mod indicators;
pub mod migration;
mod normatives;
mod scenarios;
pub mod schema_manifest;
mod services;
pub mod store;
mod territories;

pub use idu_urban_core::*;
pub use config::{DatabaseConfig, LimitsConfig, PoolConfig, StoreConfig};
pub use datastore::{
    config_path, database_file, default_sqlite_path, load_or_init_config, open_store,
};
pub use schema_manifest::load_schema_manifest;
pub use store::UrbanStore;
