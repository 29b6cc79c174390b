use regex::{Regex, RegexBuilder};

use crate::workspace::{Block, BlockType};

/// Boilerplate markers tuned for public-domain book scans.
const DEFAULT_BOILERPLATE: &[&str] = &[
    "project gutenberg",
    "copyright",
    "license",
    "www.gutenberg.org",
    "ebook",
];

/// Classification tuning knobs. Defaults are tuned for one genre of source
/// material (public-domain book scans).
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Lowercase literal patterns marking publisher/licensing boilerplate.
    pub boilerplate_patterns: Vec<String>,
    /// Blocks shorter than this containing a boilerplate pattern are skipped;
    /// longer passages are legitimate body text.
    pub boilerplate_max_chars: u32,
    /// Blocks with fewer trimmed characters than this are skipped outright.
    pub min_chars: u32,
    pub h1_percentile: f64,
    pub h2_percentile: f64,
    pub h3_percentile: f64,
    /// Large-font lines at or past this length stay body text (pull-quotes).
    pub h3_max_chars: u32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            boilerplate_patterns: DEFAULT_BOILERPLATE.iter().map(|s| s.to_string()).collect(),
            boilerplate_max_chars: 600,
            min_chars: 3,
            h1_percentile: 95.0,
            h2_percentile: 90.0,
            h3_percentile: 75.0,
            h3_max_chars: 100,
        }
    }
}

/// Font-size cutoffs over the document-wide distribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub p75: f32,
    pub p90: f32,
    pub p95: f32,
}

impl Thresholds {
    /// Compute cutoffs from the document-wide font-size multiset.
    /// Returns None when the distribution is empty.
    pub fn from_sizes(sizes: &[f32], config: &ClassifierConfig) -> Option<Self> {
        if sizes.is_empty() {
            return None;
        }
        let mut sorted = sizes.to_vec();
        sorted.sort_by(f32::total_cmp);
        Some(Self {
            p75: percentile(&sorted, config.h3_percentile),
            p90: percentile(&sorted, config.h2_percentile),
            p95: percentile(&sorted, config.h1_percentile),
        })
    }
}

/// Linear-interpolation percentile over a sorted slice (numpy's default).
pub fn percentile(sorted: &[f32], p: f64) -> f32 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let rank = p / 100.0 * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    (sorted[lo] as f64 + (sorted[hi] as f64 - sorted[lo] as f64) * frac) as f32
}

/// Per-document block classifier: thresholds computed once, then applied to
/// every block.
pub struct Classifier {
    boilerplate: Option<Regex>,
    thresholds: Option<Thresholds>,
    min_chars: u32,
    boilerplate_max_chars: u32,
    h3_max_chars: u32,
}

impl Classifier {
    pub fn new(config: &ClassifierConfig, font_sizes: &[f32]) -> Self {
        let boilerplate = if config.boilerplate_patterns.is_empty() {
            None
        } else {
            let pattern = config
                .boilerplate_patterns
                .iter()
                .map(|p| regex::escape(p))
                .collect::<Vec<_>>()
                .join("|");
            Some(
                RegexBuilder::new(&pattern)
                    .case_insensitive(true)
                    .build()
                    .expect("escaped literal alternation"),
            )
        };

        Self {
            boilerplate,
            thresholds: Thresholds::from_sizes(font_sizes, config),
            min_chars: config.min_chars,
            boilerplate_max_chars: config.boilerplate_max_chars,
            h3_max_chars: config.h3_max_chars,
        }
    }

    pub fn thresholds(&self) -> Option<Thresholds> {
        self.thresholds
    }

    /// Assign a structural type; rules evaluated in order, first match wins.
    pub fn classify(&self, block: &Block) -> BlockType {
        let chars = block.text.trim().chars().count() as u32;

        if chars < self.min_chars {
            return BlockType::Skip;
        }

        if chars < self.boilerplate_max_chars {
            if let Some(re) = &self.boilerplate {
                if re.is_match(&block.text) {
                    return BlockType::Skip;
                }
            }
        }

        if let Some(t) = &self.thresholds {
            if block.font_size >= t.p95 {
                return BlockType::H1;
            }
            if block.font_size >= t.p90 {
                return BlockType::H2;
            }
            if block.font_size >= t.p75 && chars < self.h3_max_chars {
                return BlockType::H3;
            }
        }

        BlockType::Body
    }
}

// ── Tests ──
