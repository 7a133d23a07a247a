//! The aliver discovery engine.
//!
//! [`sweep::SweepEngine`] fans ICMP echo requests out over a [`socket::ProbeSocket`]
//! and gathers the replies into a [`collector::ResultCollector`]. The
//! [`neighbor`] and [`report`] modules cover the passive half of a discovery
//! run and its text report.

pub mod collector;
pub mod error;
pub mod neighbor;
pub mod report;
pub mod socket;
pub mod sweep;
