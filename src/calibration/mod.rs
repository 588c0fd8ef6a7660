// Calibration module - offset correction and settings persistence
//
// This module provides two components:
// 1. Calibrator: the static offset applied to every raw tilt sample
// 2. SettingsStore: where the offset (and the cosmetic theme) survive restarts

pub mod calibrator;
pub mod settings;

pub use calibrator::Calibrator;
pub use settings::{JsonFileSettings, MemorySettings, SettingsStore, ThemePreference};
