use crate::workspace::{Block, BlockType};

const SEPARATOR: &str = " > ";

#[derive(Debug, Clone, PartialEq, Eq)]
struct HeadingEntry {
    level: u8,
    title: String,
}

/// Stack of currently-open headings, at most one entry per level.
/// Scoped to a single document pass.
#[derive(Debug, Default)]
pub struct HeadingStack {
    entries: Vec<HeadingEntry>,
}

impl HeadingStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the stack for one classified block.
    ///
    /// A heading closes every open heading at its own level or deeper before
    /// opening itself; an h1 therefore resets the whole stack. Non-heading
    /// blocks leave the stack untouched.
    pub fn observe(&mut self, kind: BlockType, title: &str) {
        let level = match kind {
            BlockType::H1 => 1,
            BlockType::H2 => 2,
            BlockType::H3 => 3,
            _ => return,
        };
        self.entries.retain(|e| e.level < level);
        self.entries.push(HeadingEntry {
            level,
            title: title.to_string(),
        });
    }

    /// Breadcrumb of open heading titles, most general first, or None when
    /// no heading has been seen yet.
    pub fn path(&self) -> Option<String> {
        if self.entries.is_empty() {
            None
        } else {
            Some(
                self.entries
                    .iter()
                    .map(|e| e.title.as_str())
                    .collect::<Vec<_>>()
                    .join(SEPARATOR),
            )
        }
    }
}

/// Stamp section paths onto classified blocks in strict document order.
/// Headings receive a path that includes themselves.
pub fn stamp_sections(blocks: &mut [Block]) {
    let mut stack = HeadingStack::new();
    for block in blocks.iter_mut() {
        stack.observe(block.kind, &block.text);
        block.section_path = stack.path();
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn block(text: &str, kind: BlockType) -> Block {
        Block {
            block_idx: 0,
            page_num: 0,
            bbox: [0.0; 4],
            text: text.to_string(),
            font_size: 10.0,
            font_name: "TestFont".to_string(),
            is_bold: false,
            char_count: text.chars().count() as u32,
            kind,
            section_path: None,
            embedding: None,
        }
    }

    fn paths(blocks: &[Block]) -> Vec<Option<&str>> {
        blocks.iter().map(|b| b.section_path.as_deref()).collect()
    }

    #[test]
    fn body_inherits_enclosing_headings() {
        let mut blocks = vec![
            block("Openings", BlockType::H1),
            block("The Italian Game", BlockType::H2),
            block("Develop knights before bishops.", BlockType::Body),
        ];
        stamp_sections(&mut blocks);
        assert_eq!(
            paths(&blocks),
            vec![
                Some("Openings"),
                Some("Openings > The Italian Game"),
                Some("Openings > The Italian Game"),
            ]
        );
    }

    #[test]
    fn h1_resets_the_whole_stack() {
        let mut blocks = vec![
            block("Openings", BlockType::H1),
            block("Gambits", BlockType::H2),
            block("Endgames", BlockType::H1),
            block("King activity matters.", BlockType::Body),
        ];
        stamp_sections(&mut blocks);
        assert_eq!(blocks[2].section_path.as_deref(), Some("Endgames"));
        assert!(!blocks[3].section_path.as_deref().unwrap().contains("Openings"));
        assert!(!blocks[3].section_path.as_deref().unwrap().contains("Gambits"));
    }

    #[test]
    fn h2_closes_h2_and_h3_keeps_h1() {
        let mut blocks = vec![
            block("Middlegame", BlockType::H1),
            block("Pawn Structure", BlockType::H2),
            block("Isolated Pawns", BlockType::H3),
            block("Piece Play", BlockType::H2),
        ];
        stamp_sections(&mut blocks);
        assert_eq!(
            blocks[3].section_path.as_deref(),
            Some("Middlegame > Piece Play")
        );
    }

    #[test]
    fn h3_never_removes_h1_or_h2() {
        let mut blocks = vec![
            block("Middlegame", BlockType::H1),
            block("Pawn Structure", BlockType::H2),
            block("Isolated Pawns", BlockType::H3),
            block("Doubled Pawns", BlockType::H3),
        ];
        stamp_sections(&mut blocks);
        assert_eq!(
            blocks[3].section_path.as_deref(),
            Some("Middlegame > Pawn Structure > Doubled Pawns")
        );
    }

    #[test]
    fn h3_before_any_h1_stands_alone() {
        let mut blocks = vec![
            block("A small heading", BlockType::H3),
            block("Text under it.", BlockType::Body),
        ];
        stamp_sections(&mut blocks);
        assert_eq!(blocks[1].section_path.as_deref(), Some("A small heading"));
    }

    #[test]
    fn skip_and_body_leave_stack_unchanged() {
        let mut stack = HeadingStack::new();
        stack.observe(BlockType::H1, "Chapter");
        stack.observe(BlockType::Body, "paragraph");
        stack.observe(BlockType::Skip, "x");
        assert_eq!(stack.path().as_deref(), Some("Chapter"));
    }

    #[test]
    fn empty_stack_has_no_path() {
        let mut blocks = vec![block("Plain text before any heading.", BlockType::Body)];
        stamp_sections(&mut blocks);
        assert_eq!(blocks[0].section_path, None);
    }
}
