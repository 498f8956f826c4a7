//! Core types and utilities for the dinosim ecosystem simulation.

pub mod config;
pub mod error;
pub mod stats;
pub mod types;
pub mod vector;

pub use config::*;
pub use error::{Error, Result};
pub use stats::*;
pub use types::*;
pub use vector::Vector2D;
