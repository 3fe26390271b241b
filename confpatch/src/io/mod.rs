//! I/O helpers: site layout, patch files, live and baseline configuration,
//! module installation and the progress ledger.

pub mod baseline;
pub mod config;
pub mod config_store;
pub mod files;
pub mod installer;
pub mod layout;
pub mod ledger;
pub mod patch_store;
