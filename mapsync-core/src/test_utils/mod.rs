//! Test utilities and helpers for mapsync
//!
//! Recording doubles for the engine's seams, seeded randomness, and
//! assertions shared by unit tests, integration tests and the CLI
//! simulation.

pub mod assertions;
pub mod deterministic_rng;
pub mod fixtures;
pub mod simulation;

pub use assertions::*;
pub use deterministic_rng::*;
pub use fixtures::*;
pub use simulation::{SimulatedPeer, SimulatedRoom};
