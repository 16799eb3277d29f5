//! Integration tests for checkprobe
//!
//! These tests verify that multiple components work together correctly.

#[path = "../common/mod.rs"]
pub mod common;

pub mod expect_flow;
#[cfg(unix)]
pub mod gdb_adapter;
pub mod gdb_fixtures;
