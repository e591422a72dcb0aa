//! Inputs handed to the simulator: workloads, platforms and their generators.

pub mod generator;
pub mod platform;
pub mod workload;
