use unicode_width::UnicodeWidthChar;

/// One visual line: a byte range of the source text. Ranges never include
/// the newline separating logical lines, and concatenating all ranges plus
/// the newlines reproduces the source, so segment offsets from the compiled
/// rendering map straight onto visual positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutLine {
    pub start: usize,
    pub end: usize,
}

/// Width-aware wrapping of a document for the reader viewport.
///
/// This is deliberately not `textwrap`: wrapping must keep exact byte
/// offsets into the source so highlights, selections, and hit testing all
/// address the same text the compiler saw.
#[derive(Debug, Clone, Default)]
pub struct Layout {
    lines: Vec<LayoutLine>,
    width: u16,
}

impl Layout {
    pub fn compute(text: &str, width: u16) -> Self {
        let width = width.max(1);
        let mut lines = Vec::new();
        let mut logical_start = 0usize;

        for logical in text.split('\n') {
            wrap_logical_line(logical, logical_start, width as usize, &mut lines);
            logical_start += logical.len() + 1;
        }

        Self { lines, width }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn lines(&self) -> &[LayoutLine] {
        &self.lines
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn line_text<'a>(&self, text: &'a str, line: usize) -> Option<&'a str> {
        let range = self.lines.get(line)?;
        text.get(range.start..range.end)
    }

    /// Byte offset of the character at a display column of a visual line.
    /// Columns past the end clamp to the line's end offset.
    pub fn byte_at(&self, text: &str, line: usize, column: usize) -> Option<usize> {
        let range = self.lines.get(line)?;
        let slice = text.get(range.start..range.end)?;
        let mut col = 0usize;
        for (byte_idx, c) in slice.char_indices() {
            let char_width = c.width().unwrap_or(0);
            if column < col + char_width.max(1) {
                return Some(range.start + byte_idx);
            }
            col += char_width;
        }
        Some(range.end)
    }

    /// Visual (line, column) of a byte offset of the source text.
    pub fn position_of(&self, text: &str, offset: usize) -> Option<(usize, usize)> {
        let line = self.line_of_offset(offset)?;
        let range = self.lines[line];
        let slice = text.get(range.start..offset.min(range.end))?;
        let column = slice.chars().map(|c| c.width().unwrap_or(0)).sum();
        Some((line, column))
    }

    /// Visual line containing a byte offset.
    pub fn line_of_offset(&self, offset: usize) -> Option<usize> {
        if self.lines.is_empty() {
            return None;
        }
        match self
            .lines
            .binary_search_by(|line| line.start.cmp(&offset))
        {
            Ok(idx) => Some(idx),
            Err(0) => Some(0),
            Err(idx) => {
                let prev = idx - 1;
                if offset <= self.lines[prev].end {
                    Some(prev)
                } else {
                    // Offset falls on a newline between logical lines.
                    Some(idx.min(self.lines.len() - 1))
                }
            }
        }
    }
}

fn wrap_logical_line(logical: &str, base: usize, width: usize, out: &mut Vec<LayoutLine>) {
    if logical.is_empty() {
        out.push(LayoutLine {
            start: base,
            end: base,
        });
        return;
    }

    let mut line_start = 0usize; // byte offset within `logical`
    let mut col = 0usize;
    let mut break_after_space: Option<usize> = None; // byte offset just past a space

    for (byte_idx, c) in logical.char_indices() {
        let char_width = c.width().unwrap_or(0);
        if col + char_width > width && byte_idx > line_start {
            let break_at = match break_after_space {
                Some(after_space) if after_space > line_start => after_space,
                _ => byte_idx,
            };
            out.push(LayoutLine {
                start: base + line_start,
                end: base + break_at,
            });
            line_start = break_at;
            break_after_space = None;
            col = logical[line_start..byte_idx]
                .chars()
                .map(|c| c.width().unwrap_or(0))
                .sum();
        }
        if c == ' ' {
            break_after_space = Some(byte_idx + 1);
        }
        col += char_width;
    }

    out.push(LayoutLine {
        start: base + line_start,
        end: base + logical.len(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reassemble(text: &str, layout: &Layout) -> String {
        // Visual lines of one logical line are contiguous byte ranges;
        // logical lines are separated by the newlines the layout skipped.
        let mut rebuilt = String::new();
        let mut last_end = 0usize;
        for line in layout.lines() {
            if line.start > last_end {
                rebuilt.push_str(&text[last_end..line.start]);
            }
            rebuilt.push_str(&text[line.start..line.end]);
            last_end = line.end;
        }
        rebuilt.push_str(&text[last_end..]);
        rebuilt
    }

    #[test]
    fn wrapping_preserves_every_byte() {
        let text = "The quick brown fox jumps over the lazy dog.\n\nSecond paragraph here.";
        let layout = Layout::compute(text, 12);
        assert_eq!(reassemble(text, &layout), text);
    }

    #[test]
    fn breaks_at_spaces_when_possible() {
        let text = "alpha beta gamma";
        let layout = Layout::compute(text, 11);
        let lines: Vec<_> = layout
            .lines()
            .iter()
            .map(|l| &text[l.start..l.end])
            .collect();
        assert_eq!(lines, vec!["alpha beta ", "gamma"]);
    }

    #[test]
    fn hard_breaks_unbroken_words() {
        let text = "abcdefghij";
        let layout = Layout::compute(text, 4);
        let lines: Vec<_> = layout
            .lines()
            .iter()
            .map(|l| &text[l.start..l.end])
            .collect();
        assert_eq!(lines, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn empty_logical_lines_stay_visible() {
        let text = "a\n\nb";
        let layout = Layout::compute(text, 10);
        assert_eq!(layout.line_count(), 3);
        assert_eq!(layout.line_text(text, 1), Some(""));
    }

    #[test]
    fn byte_at_and_position_of_are_inverse() {
        let text = "one two three four five six seven";
        let layout = Layout::compute(text, 10);
        let offset = text.find("three").unwrap();
        let (line, column) = layout.position_of(text, offset).unwrap();
        assert_eq!(layout.byte_at(text, line, column), Some(offset));
    }

    #[test]
    fn byte_at_clamps_past_line_end() {
        let text = "short";
        let layout = Layout::compute(text, 40);
        assert_eq!(layout.byte_at(text, 0, 99), Some(5));
        assert_eq!(layout.byte_at(text, 3, 0), None);
    }

    #[test]
    fn wide_characters_count_their_display_width() {
        let text = "漢字 latin";
        let layout = Layout::compute(text, 40);
        // Each CJK char is two columns wide.
        let offset = text.find("latin").unwrap();
        let (_, column) = layout.position_of(text, offset).unwrap();
        assert_eq!(column, 5);
    }

    #[test]
    fn line_of_offset_handles_newline_positions() {
        let text = "ab\ncd";
        let layout = Layout::compute(text, 10);
        assert_eq!(layout.line_of_offset(0), Some(0));
        assert_eq!(layout.line_of_offset(2), Some(0)); // at the newline
        assert_eq!(layout.line_of_offset(3), Some(1));
        assert_eq!(layout.line_of_offset(4), Some(1));
    }
}
