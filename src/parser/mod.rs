pub mod classify;
pub mod extract;
pub mod hierarchy;

use rayon::prelude::*;

use crate::workspace::{Block, Workspace};
use classify::{Classifier, ClassifierConfig};
use extract::RawDocument;

/// Four-pass pipeline: geometry → block drafts → classified → section-stamped
/// → re-indexed workspace.
///
/// Page extraction is parallel (pages are independent); classification uses
/// document-wide thresholds and hierarchy stamping is order-dependent, so both
/// run after the full extraction pass completes.
pub fn process_document(raw: &RawDocument, doc_id: &str, config: &ClassifierConfig) -> Workspace {
    let per_page: Vec<Vec<Block>> = raw
        .pages
        .par_iter()
        .enumerate()
        .map(|(page_num, page)| extract::extract_page(page, page_num as u32))
        .collect();
    let mut blocks: Vec<Block> = per_page.into_iter().flatten().collect();

    let font_sizes: Vec<f32> = blocks.iter().map(|b| b.font_size).collect();
    let classifier = Classifier::new(config, &font_sizes);
    for block in &mut blocks {
        block.kind = classifier.classify(block);
    }

    hierarchy::stamp_sections(&mut blocks);

    for (idx, block) in blocks.iter_mut().enumerate() {
        block.block_idx = idx as u64;
    }

    Workspace {
        doc_id: doc_id.to_string(),
        num_pages: raw.pages.len() as u32,
        created_at: chrono::Utc::now().to_rfc3339(),
        blocks,
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::BlockType;

    fn geometry(json: &str) -> RawDocument {
        serde_json::from_str(json).unwrap()
    }

    fn span_block(text: &str, size: f32) -> String {
        format!(
            r#"{{"type":0,"bbox":[0,0,100,20],"lines":[{{"spans":[{{"text":"{text}","size":{size},"font":"Serif"}}]}}]}}"#
        )
    }

    #[test]
    fn block_ids_are_contiguous_across_pages() {
        let raw = geometry(&format!(
            r#"{{"pages":[{{"blocks":[{},{}]}},{{"blocks":[{}]}}]}}"#,
            span_block("Page one first", 10.0),
            span_block("Page one second", 10.0),
            span_block("Page two", 10.0),
        ));
        let ws = process_document(&raw, "doc", &ClassifierConfig::default());
        assert_eq!(ws.num_pages, 2);
        let ids: Vec<u64> = ws.blocks.iter().map(|b| b.block_idx).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(ws.blocks[2].page_num, 1);
    }

    #[test]
    fn intro_scenario_classifies_and_stamps() {
        // font sizes [20, 10, 10]: p95 = 19, so the first block is h1
        let raw = geometry(&format!(
            r#"{{"pages":[{{"blocks":[{},{},{}]}}]}}"#,
            span_block("INTRODUCTION", 20.0),
            span_block("Body para one.", 10.0),
            span_block("Body para two.", 10.0),
        ));
        let ws = process_document(&raw, "intro", &ClassifierConfig::default());
        let kinds: Vec<BlockType> = ws.blocks.iter().map(|b| b.kind).collect();
        assert_eq!(kinds, vec![BlockType::H1, BlockType::Body, BlockType::Body]);
        assert_eq!(ws.blocks[1].section_path.as_deref(), Some("INTRODUCTION"));
        assert_eq!(ws.blocks[2].section_path.as_deref(), Some("INTRODUCTION"));
    }

    #[test]
    fn empty_document_yields_empty_workspace() {
        let raw = geometry(r#"{"pages":[]}"#);
        let ws = process_document(&raw, "empty", &ClassifierConfig::default());
        assert_eq!(ws.num_pages, 0);
        assert!(ws.blocks.is_empty());
    }
}
