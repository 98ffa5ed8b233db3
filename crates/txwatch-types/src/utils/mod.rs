//! Utility functions for string formatting used throughout txwatch.

pub mod formatting;

pub use formatting::truncate_id;
