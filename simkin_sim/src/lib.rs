// simkin_sim/src/lib.rs

//! The engine side of simkin: the physics engine adapter that owns the
//! multibody system, scenario configuration and the command-line front end.

// This prelude is for convenience for other files WITHIN the simkin_sim crate.
pub mod prelude;

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod prng;
