//! Synchronized lyrics handling
//!
//! This module provides:
//! - LRC line grammar and rendering
//! - Time alignment of a translation track onto a primary track

pub mod merge;
pub mod parser;

pub use merge::merge;
