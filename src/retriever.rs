use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::embed::Embedder;
use crate::error::{Error, Result};
use crate::index::{normalize, FlatIndex};
use crate::workspace::{BBox, BlockType, IndexedBlock, Workspace};

/// Candidate multiplier when a type filter is set. A fixed heuristic: when
/// matches are sparse beyond the 3k window, fewer than k results return.
const OVERFETCH_FACTOR: usize = 3;

pub const DEFAULT_K: usize = 10;

/// One ranked retrieval hit. Ephemeral, produced per query.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub unit_id: String,
    pub content: String,
    pub page: u32,
    pub section_path: String,
    pub bbox: BBox,
    #[serde(rename = "type")]
    pub kind: BlockType,
    pub similarity: f32,
}

/// Semantic search over an immutable flat index and its parallel block list.
///
/// Constructed either in memory from a just-built index or from persisted
/// files; both produce the same search surface. Searches never mutate shared
/// state, so one retriever serves concurrent callers.
#[derive(Debug)]
pub struct Retriever<E: Embedder> {
    index: FlatIndex,
    blocks: Vec<IndexedBlock>,
    embedder: E,
}

impl<E: Embedder> Retriever<E> {
    /// In-memory constructor over an already-built index.
    pub fn from_parts(index: FlatIndex, blocks: Vec<IndexedBlock>, embedder: E) -> Result<Self> {
        if index.len() != blocks.len() {
            return Err(Error::Parse {
                message: format!(
                    "index holds {} vectors but {} blocks were supplied",
                    index.len(),
                    blocks.len()
                ),
            });
        }
        Ok(Self {
            index,
            blocks,
            embedder,
        })
    }

    /// File-based constructor: flat index file plus workspace JSON.
    ///
    /// Blocks lacking an embedding are excluded from the parallel list
    /// exactly as at build time, keeping vector i aligned with block i.
    pub fn from_files(index_path: &Path, workspace_path: &Path, embedder: E) -> Result<Self> {
        let index = FlatIndex::load(index_path)?;
        let workspace = Workspace::load(workspace_path)?;
        let blocks: Vec<IndexedBlock> = workspace
            .blocks
            .iter()
            .filter(|b| b.embedding.is_some())
            .map(IndexedBlock::from)
            .collect();
        info!(
            vectors = index.len(),
            blocks = blocks.len(),
            model = embedder.model_id(),
            "loaded flat index and workspace"
        );
        Self::from_parts(index, blocks, embedder)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    async fn encode_query(&self, query: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embedder.encode(&[query.to_string()]).await?;
        let mut vector = vectors.pop().ok_or_else(|| Error::Embedding {
            message: "embedder returned no vector for the query".to_string(),
        })?;
        if vector.len() != self.index.dimension() {
            return Err(Error::DimensionMismatch {
                expected: self.index.dimension(),
                found: vector.len(),
            });
        }
        normalize(&mut vector)?;
        Ok(vector)
    }

    /// k-NN scan with optional post-hoc type filtering.
    ///
    /// Results come back in similarity-descending order (the candidate scan
    /// is distance-ascending), at most k of them.
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        type_filter: Option<BlockType>,
    ) -> Result<Vec<SearchResult>> {
        let vector = self.encode_query(query).await?;
        let fetch_k = if type_filter.is_some() {
            k.saturating_mul(OVERFETCH_FACTOR)
        } else {
            k
        };
        let candidates = self.index.search(&vector, fetch_k)?;

        let mut results = Vec::new();
        for (idx, distance) in candidates {
            let block = &self.blocks[idx];
            if let Some(filter) = type_filter {
                if block.kind != filter {
                    continue;
                }
            }

            // unit vectors put L2 distance in [0, 2]
            let similarity = (1.0 - distance / 2.0).max(0.0);
            results.push(SearchResult {
                unit_id: format!("block_{}_{}", block.page_num, block.block_idx),
                content: block.text.clone(),
                page: block.page_num,
                section_path: block.section_path.clone().unwrap_or_default(),
                bbox: block.bbox,
                kind: block.kind,
                similarity,
            });
            if results.len() >= k {
                break;
            }
        }
        Ok(results)
    }

    /// Full-text search with no type filter.
    pub async fn search_text(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        self.search(query, k, None).await
    }

    /// Table blocks only.
    pub async fn search_tables(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        self.search(query, k, Some(BlockType::Table)).await
    }

    /// Image/figure blocks only.
    pub async fn search_images(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        self.search(query, k, Some(BlockType::Image)).await
    }

    /// Everything, regardless of type.
    pub async fn search_all(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        self.search(query, k, None).await
    }
}

// ── Tests ──
