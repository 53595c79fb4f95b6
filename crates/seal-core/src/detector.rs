//! Heuristic seal position detection
//!
//! Candidates come from two signals. Spans whose text matches a seal,
//! signature, party or date keyword suggest a box beside the span. Regions
//! of the 3×3 page grid with little text suggest a box at their centre,
//! weighted towards the bottom right where seals usually go. Nearby
//! candidates are folded together and the best one across all pages wins.

use crate::config::DetectorConfig;
use crate::error::SealError;
use crate::geometry::{distance, divide_into_regions, overlap_area, Region};
use regex::Regex;
use shared_types::{CandidatePosition, PageLayout, TextSpan};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::debug;

/// Characters of span text quoted in a candidate's reason
const REASON_PREVIEW_CHARS: usize = 20;

static DEFAULT_DETECTOR: LazyLock<PositionDetector> = LazyLock::new(PositionDetector::default);

/// Position detector with compiled keyword patterns.
///
/// Immutable once built; share it freely between threads.
#[derive(Debug, Clone)]
pub struct PositionDetector {
    config: DetectorConfig,
    priority: Vec<Regex>,
    secondary: Vec<Regex>,
}

impl PositionDetector {
    /// Compile the keyword patterns of `config`
    pub fn new(config: DetectorConfig) -> Result<Self, SealError> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| SealError::Config(format!("bad keyword pattern {:?}: {}", pattern, e)))
        };
        let priority = config
            .priority_keywords
            .iter()
            .map(|p| compile(p))
            .collect::<Result<Vec<_>, _>>()?;
        let secondary = config
            .secondary_keywords
            .iter()
            .map(|p| compile(p))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            config,
            priority,
            secondary,
        })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Best candidate across all pages, `None` only for an empty layout
    pub fn detect(&self, layouts: &[PageLayout]) -> Option<CandidatePosition> {
        self.rank(layouts).into_iter().next()
    }

    /// All surviving candidates across all pages, best first.
    ///
    /// The sort is stable, so among equal scores earlier pages and earlier
    /// candidates come first.
    pub fn rank(&self, layouts: &[PageLayout]) -> Vec<CandidatePosition> {
        let mut all: Vec<CandidatePosition> = layouts
            .iter()
            .flat_map(|layout| self.page_candidates(layout))
            .collect();
        all.sort_by(|a, b| b.score.total_cmp(&a.score));
        all
    }

    /// Merged candidates for one page; never empty
    pub fn page_candidates(&self, layout: &PageLayout) -> Vec<CandidatePosition> {
        let mut candidates = self.keyword_candidates(layout);
        candidates.extend(self.layout_candidates(layout));

        let mut merged = self.merge_candidates(candidates);
        if merged.is_empty() {
            merged.push(self.default_candidate(layout));
        }

        debug!(
            page = layout.page_index,
            candidates = merged.len(),
            "page analysed"
        );
        merged
    }

    /// One candidate per span matching a keyword
    pub fn keyword_candidates(&self, layout: &PageLayout) -> Vec<CandidatePosition> {
        layout
            .spans
            .iter()
            .filter_map(|span| {
                let text = span.text.trim();
                let (score, label) = if self.priority.iter().any(|re| re.is_match(text)) {
                    (self.config.priority_score, "keyword priority match")
                } else if self.secondary.iter().any(|re| re.is_match(text)) {
                    (self.config.secondary_score, "keyword match")
                } else {
                    return None;
                };
                let preview: String = text.chars().take(REASON_PREVIEW_CHARS).collect();
                Some(self.beside_span(span, layout, score, format!("{}: {}...", label, preview)))
            })
            .collect()
    }

    fn beside_span(
        &self,
        span: &TextSpan,
        layout: &PageLayout,
        score: f64,
        reason: String,
    ) -> CandidatePosition {
        let c = &self.config;
        let mut x = span.bbox.x1 + c.keyword_offset_x;
        let mut y = span.bbox.y0 - c.keyword_offset_y;
        if x + c.candidate_size > layout.width {
            x = span.bbox.x0 - c.mirror_offset;
        }
        if y < 0.0 {
            y = span.bbox.y1 + c.keyword_offset_y;
        }

        CandidatePosition {
            x: x.max(0.0),
            y: y.max(0.0),
            width: c.candidate_size,
            height: c.candidate_size,
            score,
            reason,
            page: layout.page_index,
        }
    }

    /// Text coverage of each grid cell, as a fraction of the cell's area
    pub fn region_densities(&self, layout: &PageLayout) -> BTreeMap<&'static str, f64> {
        divide_into_regions(layout.width, layout.height)
            .iter()
            .map(|(region, rect)| {
                let area = rect.area();
                let covered: f64 = layout
                    .spans
                    .iter()
                    .map(|span| overlap_area(&span.bbox, rect))
                    .sum();
                let density = if area > 0.0 { covered / area } else { 0.0 };
                (region.name(), density)
            })
            .collect()
    }

    /// Candidates centred in sparse grid cells.
    ///
    /// A page without any text says nothing about its layout and yields none.
    pub fn layout_candidates(&self, layout: &PageLayout) -> Vec<CandidatePosition> {
        if layout.is_blank() {
            return Vec::new();
        }
        let c = &self.config;
        let half = c.candidate_size / 2.0;
        let densities = self.region_densities(layout);

        divide_into_regions(layout.width, layout.height)
            .iter()
            .filter_map(|(region, rect)| {
                let density = densities.get(region.name()).copied().unwrap_or(0.0);
                if density >= c.density_threshold {
                    return None;
                }
                let (cx, cy) = rect.center();
                let (x, y) = fit_to_page(cx - half, cy - half, c.candidate_size, layout);
                Some(CandidatePosition {
                    x,
                    y,
                    width: c.candidate_size,
                    height: c.candidate_size,
                    score: self.region_weight(*region) * (1.0 - density),
                    reason: format!("layout analysis: {} region", region),
                    page: layout.page_index,
                })
            })
            .collect()
    }

    pub fn region_weight(&self, region: Region) -> f64 {
        self.config
            .region_weights
            .get(region.name())
            .copied()
            .unwrap_or(1.0)
    }

    /// Greedy de-duplication in input order.
    ///
    /// A candidate within the merge distance of an earlier survivor replaces
    /// it only when its score is strictly higher; otherwise it is dropped.
    pub fn merge_candidates(&self, candidates: Vec<CandidatePosition>) -> Vec<CandidatePosition> {
        let mut merged: Vec<CandidatePosition> = Vec::new();

        for candidate in candidates {
            let near = merged.iter_mut().find(|existing| {
                distance(existing.center(), candidate.center()) < self.config.merge_distance
            });
            match near {
                Some(existing) => {
                    if candidate.score > existing.score {
                        *existing = candidate;
                    }
                }
                None => merged.push(candidate),
            }
        }

        merged
    }

    pub fn default_candidate(&self, layout: &PageLayout) -> CandidatePosition {
        let c = &self.config;
        let (x, y) = fit_to_page(
            layout.width * c.default_x_ratio,
            layout.height * c.default_y_ratio,
            c.candidate_size,
            layout,
        );
        CandidatePosition {
            x,
            y,
            width: c.candidate_size,
            height: c.candidate_size,
            score: 1.0,
            reason: "default bottom-right".to_string(),
            page: layout.page_index,
        }
    }
}

/// Keep a `size` square inside the page where it fits, never left of or
/// above the origin
fn fit_to_page(x: f64, y: f64, size: f64, layout: &PageLayout) -> (f64, f64) {
    (
        x.min(layout.width - size).max(0.0),
        y.min(layout.height - size).max(0.0),
    )
}

impl Default for PositionDetector {
    fn default() -> Self {
        let config = DetectorConfig::default();
        // The built-in patterns all compile
        let compile_all = |patterns: &[String]| -> Vec<Regex> {
            patterns.iter().filter_map(|p| Regex::new(p).ok()).collect()
        };
        Self {
            priority: compile_all(&config.priority_keywords),
            secondary: compile_all(&config.secondary_keywords),
            config,
        }
    }
}

/// Suggest a seal position using the default heuristics
pub fn detect_stamp_position(layouts: &[PageLayout]) -> Option<CandidatePosition> {
    DEFAULT_DETECTOR.detect(layouts)
}

/// Every suggestion of the default heuristics, best first
pub fn rank_candidates(layouts: &[PageLayout]) -> Vec<CandidatePosition> {
    DEFAULT_DETECTOR.rank(layouts)
}
