use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Bounding box as (x0, y0, x1, y1) in page coordinates.
pub type BBox = [f32; 4];

/// Structural role assigned to a block by the classifier.
///
/// The classifier emits only the first five; `Table` and `Image` are reserved
/// tags for non-text geometry so the typed search filters are expressible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    H1,
    H2,
    H3,
    Body,
    Skip,
    Table,
    Image,
}

impl BlockType {
    pub fn is_heading(self) -> bool {
        matches!(self, BlockType::H1 | BlockType::H2 | BlockType::H3)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BlockType::H1 => "h1",
            BlockType::H2 => "h2",
            BlockType::H3 => "h3",
            BlockType::Body => "body",
            BlockType::Skip => "skip",
            BlockType::Table => "table",
            BlockType::Image => "image",
        }
    }
}

/// A contiguous unit of page text with representative font metrics.
///
/// Created by the extractor, then stamped in place by the classifier
/// (`kind`), the hierarchy builder (`section_path`), and the embedding pass
/// (`embedding`). Immutable once the workspace is assembled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub block_idx: u64,
    pub page_num: u32,
    pub bbox: BBox,
    pub text: String,
    pub font_size: f32,
    pub font_name: String,
    pub is_bold: bool,
    pub char_count: u32,
    #[serde(rename = "type")]
    pub kind: BlockType,
    pub section_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// Block metadata stored alongside the vector index, embedding stripped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedBlock {
    pub block_idx: u64,
    pub page_num: u32,
    pub bbox: BBox,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: BlockType,
    pub section_path: Option<String>,
}

impl From<&Block> for IndexedBlock {
    fn from(block: &Block) -> Self {
        Self {
            block_idx: block.block_idx,
            page_num: block.page_num,
            bbox: block.bbox,
            text: block.text.clone(),
            kind: block.kind,
            section_path: block.section_path.clone(),
        }
    }
}

/// All blocks of one processed document, in page order then discovery order.
///
/// `block_idx` is a gapless 0-based ordering over `blocks`, assigned after
/// classification and hierarchy stamping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub doc_id: String,
    pub num_pages: u32,
    #[serde(default)]
    pub created_at: String,
    pub blocks: Vec<Block>,
}

impl Workspace {
    /// Write the workspace as JSON, embeddings included where present.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer(BufWriter::new(file), self)?;
        Ok(())
    }

    /// Load a workspace JSON file written by `save`.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::NotFound {
                path: path.to_path_buf(),
            });
        }
        let file = File::open(path)?;
        let workspace = serde_json::from_reader(BufReader::new(file))?;
        Ok(workspace)
    }

    pub fn stats(&self) -> WorkspaceStats {
        let mut stats = WorkspaceStats {
            doc_id: self.doc_id.clone(),
            num_pages: self.num_pages,
            total: self.blocks.len(),
            ..WorkspaceStats::default()
        };
        for block in &self.blocks {
            match block.kind {
                BlockType::H1 => stats.h1 += 1,
                BlockType::H2 => stats.h2 += 1,
                BlockType::H3 => stats.h3 += 1,
                BlockType::Body => stats.body += 1,
                BlockType::Skip => stats.skip += 1,
                BlockType::Table => stats.table += 1,
                BlockType::Image => stats.image += 1,
            }
            if block.embedding.is_some() {
                stats.embedded += 1;
            }
        }
        stats
    }
}

/// Per-type block counts for the stats command.
#[derive(Debug, Default)]
pub struct WorkspaceStats {
    pub doc_id: String,
    pub num_pages: u32,
    pub total: usize,
    pub h1: usize,
    pub h2: usize,
    pub h3: usize,
    pub body: usize,
    pub skip: usize,
    pub table: usize,
    pub image: usize,
    pub embedded: usize,
}

// ── Tests ──
