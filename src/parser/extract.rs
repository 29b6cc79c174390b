use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::workspace::{BBox, Block, BlockType};

/// Raw block type discriminator: only text blocks are processed.
pub const TEXT_BLOCK: i64 = 0;
const DEFAULT_FONT_SIZE: f32 = 10.0;
const DEFAULT_FONT_NAME: &str = "Unknown";
const BOLD_MARKER: &str = "Bold";

/// Page geometry dump produced by the external page-geometry provider.
#[derive(Debug, Deserialize)]
pub struct RawDocument {
    #[serde(default)]
    pub pages: Vec<RawPage>,
}

#[derive(Debug, Deserialize)]
pub struct RawPage {
    #[serde(default)]
    pub blocks: Vec<RawBlock>,
}

#[derive(Debug, Deserialize)]
pub struct RawBlock {
    #[serde(rename = "type")]
    pub kind: i64,
    pub bbox: BBox,
    #[serde(default)]
    pub lines: Vec<RawLine>,
}

#[derive(Debug, Deserialize)]
pub struct RawLine {
    #[serde(default)]
    pub spans: Vec<RawSpan>,
}

#[derive(Debug, Deserialize)]
pub struct RawSpan {
    pub text: String,
    #[serde(default = "default_font_size")]
    pub size: f32,
    #[serde(default = "default_font_name")]
    pub font: String,
    #[serde(default)]
    pub flags: u32,
}

fn default_font_size() -> f32 {
    DEFAULT_FONT_SIZE
}

fn default_font_name() -> String {
    DEFAULT_FONT_NAME.to_string()
}

impl RawDocument {
    /// Load a geometry dump from disk.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::NotFound {
                path: path.to_path_buf(),
            });
        }
        let file = File::open(path)?;
        let raw = serde_json::from_reader(BufReader::new(file))?;
        Ok(raw)
    }
}

/// Extract block drafts from one page, preserving source order.
///
/// Span texts concatenate per line, lines join with a newline. The first
/// span encountered provides the block's representative font metrics.
/// Non-text blocks and blocks with no spans are dropped.
pub fn extract_page(page: &RawPage, page_num: u32) -> Vec<Block> {
    let mut blocks = Vec::new();

    for raw in &page.blocks {
        if raw.kind != TEXT_BLOCK {
            continue;
        }

        let mut text = String::new();
        let mut first_span: Option<&RawSpan> = None;

        for line in &raw.lines {
            for span in &line.spans {
                if first_span.is_none() {
                    first_span = Some(span);
                }
                text.push_str(&span.text);
            }
            text.push('\n');
        }

        let Some(span) = first_span else {
            continue;
        };

        let text = text.trim().to_string();
        let char_count = text.chars().count() as u32;

        blocks.push(Block {
            // block_idx and kind are provisional until the later passes run
            block_idx: 0,
            page_num,
            bbox: raw.bbox,
            text,
            font_size: span.size,
            font_name: span.font.clone(),
            is_bold: span.font.contains(BOLD_MARKER),
            char_count,
            kind: BlockType::Body,
            section_path: None,
            embedding: None,
        });
    }

    blocks
}

// ── Tests ──
