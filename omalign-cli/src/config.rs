//! Configuration handling for the omalign CLI
//!
//! Settings come from an optional omalign.toml; command-line options
//! override individual fields.

use anyhow::{Context, Result};
use omalign_core::{AlignmentParams, OutputMode, Position};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "omalign.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub seeding: SeedingConfig,
    pub refinement: RefinementConfig,
    pub pairing: PairingConfig,
    pub scoring: ScoringConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Worker threads
    #[serde(default = "default_cpus")]
    pub cpus: usize,

    #[serde(default)]
    pub disable_progress_bar: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedingConfig {
    /// Base pairs per element of the seeding vectors
    #[serde(default = "default_primary_resolution")]
    pub primary_resolution: u32,

    #[serde(default = "default_blur")]
    pub primary_blur: u32,

    /// Seeds kept per orientation
    #[serde(default = "default_peaks_count")]
    pub peaks_count: usize,

    /// Minimum distance between seeds in bp
    #[serde(default = "default_min_peak_distance")]
    pub min_peak_distance: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinementConfig {
    #[serde(default = "default_secondary_resolution")]
    pub secondary_resolution: u32,

    #[serde(default = "default_blur")]
    pub secondary_blur: u32,

    /// Reference margin around each seed in bp
    #[serde(default = "default_secondary_margin")]
    pub secondary_margin: Position,

    #[serde(default = "default_peak_height_threshold")]
    pub peak_height_threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairingConfig {
    /// Maximum distance between paired labels in bp
    #[serde(default = "default_max_pair_distance")]
    pub max_pair_distance: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_perfect_match_score")]
    pub perfect_match_score: f64,

    #[serde(default = "default_distance_penalty_multiplier")]
    pub distance_penalty_multiplier: f64,

    #[serde(default = "default_unmatched_penalty")]
    pub unmatched_penalty: f64,

    /// Minimum score of an extracted segment
    #[serde(default = "default_min_score")]
    pub min_score: f64,

    #[serde(default = "default_break_segment_threshold")]
    pub break_segment_threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub mode: OutputMode,

    /// Largest reference gap bridged when joining passes, in bp
    #[serde(default = "default_max_difference")]
    pub max_difference: Position,
}

// Default value functions
fn default_cpus() -> usize { num_cpus::get() }
fn default_primary_resolution() -> u32 { 1400 }
fn default_blur() -> u32 { 2 }
fn default_peaks_count() -> usize { 5 }
fn default_min_peak_distance() -> Position { 20_000 }
fn default_secondary_resolution() -> u32 { 200 }
fn default_secondary_margin() -> Position { 16_000 }
fn default_peak_height_threshold() -> f64 { 15.0 }
fn default_max_pair_distance() -> Position { 1_000 }
fn default_perfect_match_score() -> f64 { 800.0 }
fn default_distance_penalty_multiplier() -> f64 { 1.0 }
fn default_unmatched_penalty() -> f64 { -100.0 }
fn default_min_score() -> f64 { 1_000.0 }
fn default_break_segment_threshold() -> f64 { 1_200.0 }
fn default_max_difference() -> Position { 100_000 }

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cpus: default_cpus(),
            disable_progress_bar: false,
        }
    }
}

impl Default for SeedingConfig {
    fn default() -> Self {
        Self {
            primary_resolution: default_primary_resolution(),
            primary_blur: default_blur(),
            peaks_count: default_peaks_count(),
            min_peak_distance: default_min_peak_distance(),
        }
    }
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            secondary_resolution: default_secondary_resolution(),
            secondary_blur: default_blur(),
            secondary_margin: default_secondary_margin(),
            peak_height_threshold: default_peak_height_threshold(),
        }
    }
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            max_pair_distance: default_max_pair_distance(),
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            perfect_match_score: default_perfect_match_score(),
            distance_penalty_multiplier: default_distance_penalty_multiplier(),
            unmatched_penalty: default_unmatched_penalty(),
            min_score: default_min_score(),
            break_segment_threshold: default_break_segment_threshold(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            mode: OutputMode::default(),
            max_difference: default_max_difference(),
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => {
                log::info!("Loading configuration from: {}", path.display());
                Self::load_from_file(path)?
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    log::info!("Loading configuration from: {}", DEFAULT_CONFIG_FILE);
                    Self::load_from_file(&default_path)?
                } else {
                    log::debug!("Using default configuration");
                    Self::default()
                }
            }
        };

        Ok(config)
    }

    /// Load configuration from a specific TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse configuration file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_toml()?)
            .with_context(|| format!("Failed to write configuration file: {}", path.display()))?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }

    /// Pipeline parameters described by this configuration. Not validated.
    pub fn alignment_params(&self) -> AlignmentParams {
        AlignmentParams {
            primary_resolution: self.seeding.primary_resolution,
            primary_blur: self.seeding.primary_blur,
            peaks_count: self.seeding.peaks_count,
            min_peak_distance: self.seeding.min_peak_distance,
            secondary_resolution: self.refinement.secondary_resolution,
            secondary_blur: self.refinement.secondary_blur,
            secondary_margin: self.refinement.secondary_margin,
            peak_height_threshold: self.refinement.peak_height_threshold,
            max_pair_distance: self.pairing.max_pair_distance,
            perfect_match_score: self.scoring.perfect_match_score,
            distance_penalty_multiplier: self.scoring.distance_penalty_multiplier,
            unmatched_penalty: self.scoring.unmatched_penalty,
            min_score: self.scoring.min_score,
            break_segment_threshold: self.scoring.break_segment_threshold,
            max_difference: self.output.max_difference,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_matches_pipeline_defaults() {
        let config = Config::default();
        assert_eq!(config.alignment_params(), AlignmentParams::default());
        assert_eq!(config.output.mode, OutputMode::Best);
    }

    #[test]
    fn test_config_roundtrip() -> Result<()> {
        let mut config = Config::default();
        config.output.mode = OutputMode::Joined;
        config.pairing.max_pair_distance = 750;

        let temp_file = NamedTempFile::new()?;
        config.save_to_file(temp_file.path())?;
        let loaded = Config::load_from_file(temp_file.path())?;

        assert_eq!(loaded, config);
        Ok(())
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str("[scoring]\nmin_score = 500.0\n\n[output]\nmode = \"all\"\n").unwrap();
        assert_eq!(config.scoring.min_score, 500.0);
        assert_eq!(config.scoring.perfect_match_score, 800.0);
        assert_eq!(config.output.mode, OutputMode::All);
        assert_eq!(config.seeding.primary_resolution, 1400);
    }

    #[test]
    fn test_toml_sections() {
        let text = Config::default().to_toml().unwrap();
        assert!(text.contains("[seeding]"));
        assert!(text.contains("[scoring]"));
        assert!(text.contains("mode = \"best\""));
    }
}
