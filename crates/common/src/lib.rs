//! Ambient helpers shared by the mirror binary and its tests.

pub mod utils;
