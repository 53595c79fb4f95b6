//! Configuration for the seal pipeline
//!
//! Everything is optional in the TOML file; missing sections and fields fall
//! back to the values the detector and renderer were tuned with.

use anyhow::Context;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Density below which a region counts as free space
pub const DEFAULT_DENSITY_THRESHOLD: f64 = 0.3;
/// Candidates closer than this are treated as the same place
pub const DEFAULT_MERGE_DISTANCE: f64 = 50.0;
/// Distance of the straddle seal from the right page edge
pub const DEFAULT_STRADDLE_MARGIN: f64 = 5.0;

/// Top-level configuration loaded from TOML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SealConfig {
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub renderer: RendererConfig,
    #[serde(default)]
    pub annotation: AnnotationConfig,
}

impl SealConfig {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the TOML is malformed
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string
    ///
    /// # Example
    ///
    /// ```
    /// use seal_core::config::SealConfig;
    ///
    /// # fn example() -> anyhow::Result<()> {
    /// let config = SealConfig::from_str(r#"
    ///     [renderer]
    ///     seal_size_mm = 42.0
    /// "#)?;
    /// assert_eq!(config.renderer.seal_size_mm, 42.0);
    /// # Ok(())
    /// # }
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> anyhow::Result<Self> {
        toml::from_str(s).context("Failed to parse TOML configuration")
    }
}

/// Keyword and layout heuristics used by the position detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Patterns that mark the seal line itself ("盖章")
    pub priority_keywords: Vec<String>,
    /// Patterns for signature, party and date lines
    pub secondary_keywords: Vec<String>,
    pub priority_score: f64,
    pub secondary_score: f64,
    /// Region name to weight; unlisted regions weigh 1.0. A TOML table
    /// overrides individual entries of the built-in weights.
    #[serde(deserialize_with = "merge_region_weights")]
    pub region_weights: BTreeMap<String, f64>,
    pub density_threshold: f64,
    pub merge_distance: f64,
    /// Side length of a suggested seal box
    pub candidate_size: f64,
    /// Horizontal gap between a keyword span and its candidate
    pub keyword_offset_x: f64,
    /// How far above the keyword span the candidate starts
    pub keyword_offset_y: f64,
    /// Gap used when the candidate is mirrored to the left of the span
    pub mirror_offset: f64,
    /// Default candidate, as fractions of the page size
    pub default_x_ratio: f64,
    pub default_y_ratio: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        let secondary_keywords = [
            "签字",
            "签名",
            "签署",
            "印章",
            "甲方",
            "乙方",
            "丙方",
            "签约方",
            "法定代表人",
            "授权代表",
            "代表人",
            "日期",
            "年.*月.*日",
            "单位.*章",
            "公司.*章",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let region_weights = [
            ("bottom_right", 3.0),
            ("bottom_left", 2.5),
            ("middle_right", 2.0),
            ("middle_left", 1.5),
            ("top_right", 1.0),
            ("top_left", 0.5),
        ]
        .iter()
        .map(|(name, weight)| (name.to_string(), *weight))
        .collect();

        Self {
            priority_keywords: vec!["盖章".to_string(), "(?i)affix(ed)? (the )?seal".to_string()],
            secondary_keywords,
            priority_score: 10.0,
            secondary_score: 2.0,
            region_weights,
            density_threshold: DEFAULT_DENSITY_THRESHOLD,
            merge_distance: DEFAULT_MERGE_DISTANCE,
            candidate_size: 80.0,
            keyword_offset_x: 20.0,
            keyword_offset_y: 10.0,
            mirror_offset: 100.0,
            default_x_ratio: 0.7,
            default_y_ratio: 0.8,
        }
    }
}

fn merge_region_weights<'de, D>(deserializer: D) -> Result<BTreeMap<String, f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let overrides = BTreeMap::<String, f64>::deserialize(deserializer)?;
    let mut weights = DetectorConfig::default().region_weights;
    weights.extend(overrides);
    Ok(weights)
}

/// Physical seal size and straddle seal placement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    pub seal_size_mm: f64,
    pub dpi: f64,
    pub straddle_margin: f64,
    pub straddle_enabled: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            seal_size_mm: 40.0,
            dpi: 72.0,
            straddle_margin: DEFAULT_STRADDLE_MARGIN,
            straddle_enabled: true,
        }
    }
}

impl RendererConfig {
    /// Seal side length in pixels (page units at 72 DPI), truncated
    pub fn seal_size_px(&self) -> u32 {
        (self.seal_size_mm / 25.4 * self.dpi).max(0.0) as u32
    }
}

/// Contract number and date written onto the first page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationConfig {
    pub enabled: bool,
    /// chrono format string for the annotation date
    pub date_format: String,
    pub font_size: f64,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            date_format: "%Y年%m月%d日".to_string(),
            font_size: 10.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = SealConfig::from_str("").unwrap();
        assert_eq!(config, SealConfig::default());
    }

    #[test]
    fn test_default_seal_is_113_px() {
        assert_eq!(RendererConfig::default().seal_size_px(), 113);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config = SealConfig::from_str(
            r#"
            [detector]
            merge_distance = 30.0

            [detector.region_weights]
            bottom_middle = 2.8

            [annotation]
            enabled = true
            "#,
        )
        .unwrap();

        assert_eq!(config.detector.merge_distance, 30.0);
        assert_eq!(config.detector.density_threshold, 0.3);
        assert_eq!(config.detector.priority_keywords[0], "盖章");
        let weights = &config.detector.region_weights;
        assert_eq!(weights.get("bottom_middle"), Some(&2.8));
        assert_eq!(weights.get("bottom_right"), Some(&3.0));
        assert_eq!(weights.get("bottom_left"), Some(&2.5));
        assert_eq!(weights.len(), 7);
        assert!(config.annotation.enabled);
        assert_eq!(config.renderer, RendererConfig::default());
    }

    #[test]
    fn test_region_weight_override_replaces_only_that_entry() {
        let config = SealConfig::from_str("[detector.region_weights]\nbottom_right = 0.5\n").unwrap();
        let mut expected = DetectorConfig::default().region_weights;
        expected.insert("bottom_right".to_string(), 0.5);
        assert_eq!(config.detector.region_weights, expected);
    }

    #[test]
    fn test_malformed_toml_is_rejected() {
        assert!(SealConfig::from_str("[renderer\nseal_size_mm = ").is_err());
        assert!(SealConfig::from_str("[renderer]\nseal_size_mm = \"big\"").is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seal.toml");
        fs::write(&path, "[renderer]\nstraddle_enabled = false\n").unwrap();

        let config = SealConfig::from_file(&path).unwrap();
        assert!(!config.renderer.straddle_enabled);
        assert!(SealConfig::from_file(dir.path().join("missing.toml")).is_err());
    }
}
