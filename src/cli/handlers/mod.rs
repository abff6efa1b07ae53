// src/cli/handlers/mod.rs

// One module per system action.

pub mod commands;
pub mod index;
pub mod libraries;
pub mod load;
pub mod reload;
pub mod run;
pub mod usage;
