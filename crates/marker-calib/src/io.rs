//! JSON configuration for the calibration pipeline.

use crate::board::{BoardConfig, BoardError, BoardGeometry};
use crate::calibrate::HybridCalibrationParams;
use crate::interpolate::InterpolatorParams;
use crate::pose::PoseReporterParams;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Board(#[from] BoardError),
}

/// Everything the pipeline needs besides collaborators and observations.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    #[serde(default)]
    pub board: BoardConfig,
    #[serde(default)]
    pub pose: PoseReporterParams,
    #[serde(default)]
    pub hybrid: HybridCalibrationParams,
    #[serde(default)]
    pub interpolator: InterpolatorParams,
}

impl CalibrationConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Build the validated board geometry from the config.
    pub fn build_board(&self) -> Result<BoardGeometry, ConfigError> {
        Ok(self.board.build()?)
    }
}
