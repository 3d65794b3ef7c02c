// Shared test infrastructure.
//
// Tests run against the in-memory document store. `FaultyStore` wraps it to
// inject version conflicts and outages so the retry and fallback paths can be
// driven deterministically.

#![allow(dead_code)]

pub mod test_data;

pub use faulty_store::*;
pub use test_data::*;
