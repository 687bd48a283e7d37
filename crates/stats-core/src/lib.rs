//! Core types for playback statistics.
//!
//! Holds the raw and normalized record models, the grouped-view and
//! derived-metric result types, field coercion, the derived-metric
//! calculations, timezone helpers, number formatting and CLI settings.

pub mod calculations;
pub mod data_processors;
pub mod error;
pub mod formatting;
pub mod models;
pub mod settings;
pub mod time_utils;

pub use error::{Result, StatsError};
