//! Stable exit codes for `confpatch` commands.

/// Command succeeded; for `apply`, every unit applied or was already current.
pub const OK: i32 = 0;
/// Command failed: invalid names or config, missing or malformed patch file,
/// or any other error.
pub const INVALID: i32 = 1;
/// `confpatch apply` finished but reported warnings.
pub const WARNINGS: i32 = 2;
