//! Statistics over trial results: collection, distribution comparison, reports.

pub mod analysis;
pub mod collector;
pub mod comparison;
pub mod density;
pub mod printer;
