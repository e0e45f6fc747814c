//! Shared test utilities for reconciler and live table tests.
//!
//! This module provides:
//! - A typed `ThingRow` and event builders
//! - A snapshot source whose result the test releases explicitly
//! - Helpers for draining a `ChannelSink`

#![allow(dead_code)]

pub mod mock_source;
pub mod rows;

pub use mock_source::*;
pub use rows::*;
