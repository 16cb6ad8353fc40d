//! Curate module - Selecting snapshots and managing the frame workspace.
//!
//! - `window`: time-window selection over a directory or subtree
//! - `materialize`: hardlinking a selection as a dense frame sequence
//! - `workspace`: the scratch directory guard
//! - `purge`: retention sweep
//! - `migrate`: legacy filename upgrade

mod materialize;
mod migrate;
mod purge;
mod window;
mod workspace;

pub use materialize::*;
pub use migrate::*;
pub use purge::*;
pub use window::*;
pub use workspace::*;
