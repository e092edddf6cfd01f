//! Common test utilities and fixtures
//!
//! This module provides shared test infrastructure including:
//! - A scriptable in-process TSA client
//! - Sample XAdES signatures
//! - Coordinator setup over SQLite stores
//! - Custom assertions for sealed records

#![allow(dead_code)]

pub mod assertions;
pub mod fixtures;

// Re-export commonly used items
pub use assertions::*;
pub use fixtures::*;
