use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::workspace::{IndexedBlock, Workspace};

const MAGIC: &[u8; 8] = b"FLATIDX1";
const NORM_EPSILON: f32 = 1e-12;

/// Scale a vector to unit L2 norm in place.
pub fn normalize(vector: &mut [f32]) -> Result<()> {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm <= NORM_EPSILON {
        return Err(Error::DegenerateVector);
    }
    for x in vector.iter_mut() {
        *x /= norm;
    }
    Ok(())
}

/// Flat brute-force L2 index over unit-normalized vectors.
///
/// Immutable once built; `search` takes `&self` and is safe for concurrent
/// readers.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dimension: usize,
    vectors: Vec<f32>,
}

impl FlatIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: Vec::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.vectors.len() / self.dimension
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn add(&mut self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                found: vector.len(),
            });
        }
        self.vectors.extend_from_slice(vector);
        Ok(())
    }

    /// Brute-force k-NN: `(index, L2 distance)` pairs in ascending-distance
    /// order, ties broken by insertion index.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if query.len() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                found: query.len(),
            });
        }

        let mut hits: Vec<(usize, f32)> = self
            .vectors
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(i, row)| {
                let squared: f32 = row
                    .iter()
                    .zip(query)
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum();
                (i, squared.sqrt())
            })
            .collect();

        hits.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        hits.truncate(k);
        Ok(hits)
    }

    /// Write the index: magic, dimension, count, little-endian f32 payload.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(MAGIC)?;
        writer.write_all(&(self.dimension as u32).to_le_bytes())?;
        writer.write_all(&(self.len() as u32).to_le_bytes())?;
        for value in &self.vectors {
            writer.write_all(&value.to_le_bytes())?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Read an index file written by `save`, bit-for-bit.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::NotFound {
                path: path.to_path_buf(),
            });
        }
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 8];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(Error::Parse {
                message: "not a flat index file".to_string(),
            });
        }

        let mut word = [0u8; 4];
        reader.read_exact(&mut word)?;
        let dimension = u32::from_le_bytes(word) as usize;
        reader.read_exact(&mut word)?;
        let count = u32::from_le_bytes(word) as usize;

        let mut payload = vec![0u8; dimension * count * 4];
        reader.read_exact(&mut payload)?;
        let mut trailing = Vec::new();
        reader.read_to_end(&mut trailing)?;
        if !trailing.is_empty() {
            return Err(Error::Parse {
                message: format!("{} trailing bytes after index payload", trailing.len()),
            });
        }

        let vectors = payload
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        Ok(Self { dimension, vectors })
    }
}

/// Build a flat index plus the parallel stripped-block list from workspace
/// embeddings. Blocks without an embedding are retained in the workspace but
/// excluded here; vector `i` corresponds to the `i`th returned block.
pub fn build_index(workspace: &Workspace) -> Result<(FlatIndex, Vec<IndexedBlock>)> {
    let mut index: Option<FlatIndex> = None;
    let mut blocks = Vec::new();

    for block in &workspace.blocks {
        let Some(embedding) = &block.embedding else {
            continue;
        };
        let mut vector = embedding.clone();
        normalize(&mut vector)?;
        let index = index.get_or_insert_with(|| FlatIndex::new(vector.len()));
        index.add(&vector)?;
        blocks.push(IndexedBlock::from(block));
    }

    let index = index.ok_or(Error::NoEmbeddings)?;
    Ok((index, blocks))
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::{Block, BlockType};

    fn embedded_block(idx: u64, text: &str, embedding: Vec<f32>) -> Block {
        Block {
            block_idx: idx,
            page_num: 0,
            bbox: [0.0; 4],
            text: text.to_string(),
            font_size: 10.0,
            font_name: "TestFont".to_string(),
            is_bold: false,
            char_count: text.chars().count() as u32,
            kind: BlockType::Body,
            section_path: None,
            embedding: Some(embedding),
        }
    }

    fn workspace(blocks: Vec<Block>) -> Workspace {
        Workspace {
            doc_id: "doc".into(),
            num_pages: 1,
            created_at: String::new(),
            blocks,
        }
    }

    #[test]
    fn normalize_gives_unit_norm_and_is_idempotent() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v).unwrap();
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        let once = v.clone();
        normalize(&mut v).unwrap();
        assert!(v.iter().zip(&once).all(|(a, b)| (a - b).abs() < 1e-6));
    }

    #[test]
    fn normalize_rejects_zero_vector() {
        let mut v = vec![0.0; 4];
        assert!(matches!(normalize(&mut v), Err(Error::DegenerateVector)));
    }

    #[test]
    fn add_rejects_wrong_dimension() {
        let mut index = FlatIndex::new(3);
        let err = index.add(&[1.0, 0.0]).unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch { expected: 3, found: 2 }
        ));
    }

    #[test]
    fn search_rejects_wrong_dimension() {
        let mut index = FlatIndex::new(2);
        index.add(&[1.0, 0.0]).unwrap();
        let err = index.search(&[1.0, 0.0, 0.0], 1).unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch { expected: 2, found: 3 }
        ));
    }

    #[test]
    fn search_orders_by_distance_ascending() {
        let mut index = FlatIndex::new(2);
        index.add(&[0.0, 1.0]).unwrap();
        index.add(&[1.0, 0.0]).unwrap();
        index.add(&[0.6, 0.8]).unwrap();

        let hits = index.search(&[1.0, 0.0], 3).unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].0, 1);
        assert!((hits[0].1).abs() < 1e-6);
        assert_eq!(hits[1].0, 2);
        assert_eq!(hits[2].0, 0);
        assert!(hits[1].1 <= hits[2].1);
    }

    #[test]
    fn equal_distances_break_ties_by_insertion_order() {
        let mut index = FlatIndex::new(2);
        index.add(&[0.0, 1.0]).unwrap();
        index.add(&[0.0, 1.0]).unwrap();
        index.add(&[0.0, 1.0]).unwrap();
        let hits = index.search(&[1.0, 0.0], 3).unwrap();
        let order: Vec<usize> = hits.iter().map(|h| h.0).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn search_truncates_to_k() {
        let mut index = FlatIndex::new(2);
        for _ in 0..5 {
            index.add(&[1.0, 0.0]).unwrap();
        }
        assert_eq!(index.search(&[1.0, 0.0], 2).unwrap().len(), 2);
    }

    #[test]
    fn save_load_roundtrip_is_exact() {
        let mut index = FlatIndex::new(3);
        index.add(&[0.1, 0.2, 0.3]).unwrap();
        index.add(&[-1.5, 2.5, f32::MIN_POSITIVE]).unwrap();

        let path = std::env::temp_dir().join(format!("flatidx_roundtrip_{}.bin", std::process::id()));
        index.save(&path).unwrap();
        let loaded = FlatIndex::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded, index);
    }

    #[test]
    fn load_missing_file_is_not_found() {
        let err = FlatIndex::load(Path::new("/nonexistent/blocks.index")).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn build_index_normalizes_and_strips() {
        let ws = workspace(vec![
            embedded_block(0, "first", vec![3.0, 4.0]),
            {
                let mut b = embedded_block(1, "no vector", vec![]);
                b.embedding = None;
                b
            },
            embedded_block(2, "second", vec![0.0, 2.0]),
        ]);

        let (index, blocks) = build_index(&ws).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].block_idx, 0);
        assert_eq!(blocks[1].block_idx, 2);

        // stored vectors are unit-norm
        let hits = index.search(&[0.6, 0.8], 1).unwrap();
        assert_eq!(hits[0].0, 0);
        assert!(hits[0].1 < 1e-6);
    }

    #[test]
    fn build_index_with_no_embeddings_fails() {
        let mut b = embedded_block(0, "bare", vec![]);
        b.embedding = None;
        let err = build_index(&workspace(vec![b])).unwrap_err();
        assert!(matches!(err, Error::NoEmbeddings));
    }

    #[test]
    fn build_index_surfaces_zero_norm_embedding() {
        let ws = workspace(vec![embedded_block(0, "zero", vec![0.0, 0.0])]);
        assert!(matches!(
            build_index(&ws),
            Err(Error::DegenerateVector)
        ));
    }
}
