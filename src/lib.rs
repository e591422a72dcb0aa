pub mod batsim;
pub mod config;
pub mod error;
pub mod experiment;
pub mod metrics;
pub mod test_util;
pub mod trace;
