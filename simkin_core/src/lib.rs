// simkin_core/src/lib.rs

// Pure kinematic-state and topology types; no engine state lives here.
pub mod compat;
pub mod convert;
pub mod element;
pub mod error;
pub mod graph;
pub mod pose_state;
pub mod prelude;
pub mod scene;
pub mod state;
pub mod types;
pub mod utils;
