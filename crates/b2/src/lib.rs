//! bz-b2: B2 native API adapter for the bz client
//!
//! This crate implements the `Gateway` trait from bz-core with reqwest. It
//! is the only crate that speaks HTTP.

pub mod body;
pub mod client;

pub use client::{Authorization, B2Client};
