//! Integration test common infrastructure.
//!
//! Provides test modules, a ready-made topology, and helpers for waiting on
//! bubbled events.

pub mod modules;
pub mod network;

#[allow(unused_imports)]
pub use modules::{FLAKY, FlakyState, NAV};
#[allow(unused_imports)]
pub use network::{EventTap, TestNetwork};
