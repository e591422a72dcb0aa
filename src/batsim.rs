//! Everything that talks to the external simulator: launching it and reading what it leaves behind.

pub mod backfill;
pub mod output;
pub mod runner;
