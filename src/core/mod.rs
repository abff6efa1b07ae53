// src/core/mod.rs

pub mod arg_parser;
pub mod builtins;
pub mod cache;
pub mod config_loader;
pub mod conflict;
pub mod file_cache;
pub mod index_manager;
pub mod inspector;
pub mod introspector;
pub mod loader;
pub mod manager;
pub mod namespace;
pub mod paths;
pub mod pipe;
pub mod script;
