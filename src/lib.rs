pub mod analysis;
pub mod average;
pub mod config;
pub mod error;
pub mod expand;
pub mod indicators;
pub mod inputs;
pub mod interpolate;
pub mod model;
pub mod perils;
pub mod response;
pub mod scenario;
pub mod shock;
pub mod table;
pub mod types;
pub mod welfare;
