//! Shared models for aliver.
//!
//! Everything here is pure data and deterministic transforms: target parsing
//! and enumeration, local network detection, discovery records and the sweep
//! configuration. No sockets are opened from this crate.

pub mod config;
pub mod network;
pub mod record;
