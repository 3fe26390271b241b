//! Hierarchical configuration diff, patch and apply engine.
//!
//! A configuration unit is a nested tree of scalars, lists and maps. The
//! engine computes the structural difference between a desired and a live
//! unit, serializes it to an append-only patch file together with a snapshot
//! of the live values it touches, and later applies that patch to a live store
//! only where the live state still matches the snapshot.
//!
//! - **[`core`]**: Pure, deterministic logic (diff, codec, apply checks).
//!   No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting collaborators (patch files, live store,
//!   module baselines, installer, ledger). Behind traits so tests can swap
//!   them.
//!
//! Orchestration modules ([`apply`], [`generate`], [`global_actions`])
//! coordinate core logic with I/O to implement CLI commands.

pub mod apply;
pub mod core;
pub mod error;
pub mod exit_codes;
pub mod generate;
pub mod global_actions;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod tree;
