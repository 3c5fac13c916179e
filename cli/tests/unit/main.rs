//! Unit tests for the TDX guest image builder
//!
//! These tests use mocked dependencies and run fast without external tools
//! or network access.

mod mocks;
mod property_tests;
