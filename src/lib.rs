//! NIKKE arena tournament collector.
//!
//! Drives the game client through its tournament screens, reads lineups and
//! battle results with template matching, and writes them out as JSON + PNG.

pub mod capture;
pub mod collector;
pub mod config;
pub mod error;
pub mod input;
pub mod logging;
pub mod paths;
pub mod recording;
pub mod vision;

#[cfg(test)]
mod testing;

pub use error::{CollectorError, Result};
