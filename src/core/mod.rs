//! Core types and constants for the TDOA positioning system

pub mod types;
pub mod constants;

pub use types::*;
pub use constants::*;
