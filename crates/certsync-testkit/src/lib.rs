//! # CertSync Testkit
//!
//! Shared test tooling for the certsync crates: proptest generators for
//! symbols and set pairs with known difference splits, deterministic seeded
//! fixtures for the standard reconciliation scenarios, and golden wire
//! vectors that pin the cell codec's byte layout.
//!
//! This crate is a dev-dependency of the others and never ships in a
//! production build.

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{hash256_pair, random_superset_pair, superset_pair};
pub use generators::{element, element_set, set_pair, symbol, SetPair};
pub use vectors::{wire_vectors, WireVector};
