//! FileParser: a tree-sitter tree kept in sync with a ropey::Rope.

use ropey::Rope;
use tracing::error;
use tree_sitter::{InputEdit, Parser, Point, Tree};

/// Parsing state of one open PHP document.
pub struct FileParser {
    parser: Parser,
    tree: Option<Tree>,
    rope: Rope,
}

impl FileParser {
    pub fn new() -> Self {
        let mut parser = Parser::new();
        if let Err(err) = parser.set_language(&tree_sitter_php::LANGUAGE_PHP.into()) {
            // Without a language every parse yields no tree.
            error!("tree-sitter-php language rejected: {}", err);
        }

        FileParser {
            parser,
            tree: None,
            rope: Rope::new(),
        }
    }

    /// Replace the whole document and parse it from scratch.
    pub fn parse_full(&mut self, source: &str) {
        self.rope = Rope::from_str(source);
        self.tree = self.parser.parse(source.as_bytes(), None);
    }

    /// Replace the text between two (line, character) positions and reparse
    /// incrementally. Positions are 0-based; characters count bytes in the line.
    pub fn apply_edit(
        &mut self,
        start_line: u32,
        start_char: u32,
        end_line: u32,
        end_char: u32,
        new_text: &str,
    ) {
        let start_byte = self.offset_at(start_line, start_char);
        let old_end_byte = self.offset_at(end_line, end_char).max(start_byte);
        let start_position = self.point_at(start_byte);
        let old_end_position = self.point_at(old_end_byte);

        let start_idx = self.rope.byte_to_char(start_byte);
        let end_idx = self.rope.byte_to_char(old_end_byte);
        self.rope.remove(start_idx..end_idx);
        self.rope.insert(start_idx, new_text);

        let new_end_byte = start_byte + new_text.len();
        let new_end_position = self.point_at(new_end_byte);

        if let Some(tree) = &mut self.tree {
            tree.edit(&InputEdit {
                start_byte,
                old_end_byte,
                new_end_byte,
                start_position,
                old_end_position,
                new_end_position,
            });
        }

        let source = self.rope.to_string();
        self.tree = self.parser.parse(source.as_bytes(), self.tree.as_ref());
    }

    pub fn tree(&self) -> Option<&Tree> {
        self.tree.as_ref()
    }

    pub fn source(&self) -> String {
        self.rope.to_string()
    }

    pub fn rope(&self) -> &Rope {
        &self.rope
    }

    /// Byte offset of a (line, character) position, clamped to the line's
    /// content (before its line break) and to a character boundary.
    pub fn offset_at(&self, line: u32, character: u32) -> usize {
        let line = line as usize;
        if line >= self.rope.len_lines() {
            return self.rope.len_bytes();
        }
        let line_start = self.rope.line_to_byte(line);
        let mut line_end = if line + 1 < self.rope.len_lines() {
            self.rope.line_to_byte(line + 1)
        } else {
            self.rope.len_bytes()
        };
        if line_end > line_start && self.rope.byte(line_end - 1) == b'\n' {
            line_end -= 1;
        }
        if line_end > line_start && self.rope.byte(line_end - 1) == b'\r' {
            line_end -= 1;
        }
        let offset = (line_start + character as usize).min(line_end);
        // Snap back onto a character boundary.
        self.rope.char_to_byte(self.rope.byte_to_char(offset))
    }

    fn point_at(&self, byte: usize) -> Point {
        let byte = byte.min(self.rope.len_bytes());
        let row = self.rope.byte_to_line(byte);
        Point::new(row, byte - self.rope.line_to_byte(row))
    }
}

impl Default for FileParser {
    fn default() -> Self {
        Self::new()
    }
}
