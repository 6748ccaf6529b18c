//! pivotfx Common Types
//!
//! Shared types used across the pivotfx crates: currency codes, the calendar
//! clock used for date resolution, and timing constants.

pub mod currency;
pub mod time;

pub use currency::*;
pub use time::*;
