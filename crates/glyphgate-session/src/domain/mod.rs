//! Session domain: the UI state components the dispatcher routes into.

pub mod heuristics;
pub mod keys;
pub mod menu;
pub mod multi_select;
pub mod pending;
pub mod state;
pub mod tile_cache;
