//! Integration tests for the processor module
//!
//! Tests the complete conversion pipeline using generated MAT-files.

pub mod inspect_mode;
