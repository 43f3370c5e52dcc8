//! Test doubles shared by the unit and integration tests of the dependent crates.

pub mod constant_model;
