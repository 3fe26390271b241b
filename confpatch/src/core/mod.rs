//! Deterministic, pure logic of the patch engine.
//!
//! Core modules are free of I/O. They operate on in-memory configuration trees
//! and return deterministic outputs suitable for tests.

pub mod apply;
pub mod codec;
pub mod differ;
pub mod invariants;
pub mod path;
pub mod types;
