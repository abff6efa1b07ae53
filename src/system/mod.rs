//! # System Interaction Layer
//!
//! The boundary between the command registry and the outside world.
//!
//! ## Modules
//!
//! - **`executor`**: Runs a resolved command. Native commands call their handler,
//!   script commands spawn their lines through the platform shell and capture
//!   the output as the command's result.
//! - **`render`**: Turns the final result of an invocation into terminal output.

pub mod executor;
pub mod render;
