use crate::layout::Layout;
use ratatui::layout::Rect;

/// A position in the wrapped text: visual line index + display column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SelectionPoint {
    pub line: usize,
    pub column: usize,
}

impl SelectionPoint {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Mouse-driven text selection over the wrapped document.
#[derive(Debug, Clone, Default)]
pub struct TextSelection {
    pub start: Option<SelectionPoint>,
    pub end: Option<SelectionPoint>,
    pub is_selecting: bool,
}

impl TextSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_selection(&mut self, line: usize, column: usize) {
        self.start = Some(SelectionPoint::new(line, column));
        self.end = Some(SelectionPoint::new(line, column));
        self.is_selecting = true;
    }

    pub fn update_selection(&mut self, line: usize, column: usize) {
        if self.is_selecting {
            self.end = Some(SelectionPoint::new(line, column));
        }
    }

    pub fn end_selection(&mut self) {
        self.is_selecting = false;
    }

    pub fn clear(&mut self) {
        self.start = None;
        self.end = None;
        self.is_selecting = false;
    }

    pub fn has_selection(&self) -> bool {
        matches!((self.start, self.end), (Some(a), Some(b)) if a != b)
    }

    /// Selection endpoints in document order.
    pub fn normalized(&self) -> Option<(SelectionPoint, SelectionPoint)> {
        let (a, b) = (self.start?, self.end?);
        if a <= b { Some((a, b)) } else { Some((b, a)) }
    }

    /// Byte range of the selection in the source text. The end column is
    /// inclusive of the character under it, matching how terminal selections
    /// feel.
    pub fn byte_range(&self, text: &str, layout: &Layout) -> Option<(usize, usize)> {
        if !self.has_selection() {
            return None;
        }
        let (from, to) = self.normalized()?;
        let start = layout.byte_at(text, from.line, from.column)?;
        let end_start = layout.byte_at(text, to.line, to.column)?;
        let end = text[end_start..]
            .chars()
            .next()
            .map(|c| end_start + c.len_utf8())
            .unwrap_or(end_start);
        (start < end).then_some((start, end.min(text.len())))
    }
}

/// A finished capture: the candidate term, its surrounding context, and the
/// cell rectangle anchoring the translation-entry popup.
#[derive(Debug, Clone, PartialEq)]
pub struct Capture {
    pub text: String,
    pub context: String,
    pub anchor: Rect,
}

/// Turn a finalized selection into a capture. Whitespace-only selections are
/// "no capture", not an error. The context is the logical line containing
/// the selection start — a local snippet, not the whole document.
pub fn capture_selection(
    selection: &TextSelection,
    text: &str,
    layout: &Layout,
    content_area: Rect,
    scroll_offset: usize,
) -> Option<Capture> {
    let (start, end) = selection.byte_range(text, layout)?;
    let selected = text[start..end].trim();
    if selected.is_empty() {
        return None;
    }

    let context_start = text[..start].rfind('\n').map(|idx| idx + 1).unwrap_or(0);
    let context_end = text[start..]
        .find('\n')
        .map(|idx| start + idx)
        .unwrap_or(text.len());
    let context = text[context_start..context_end].trim().to_string();

    let (from, _) = selection.normalized()?;
    let anchor = anchor_rect(from, content_area, scroll_offset);

    Some(Capture {
        text: selected.to_string(),
        context,
        anchor,
    })
}

fn anchor_rect(start: SelectionPoint, content_area: Rect, scroll_offset: usize) -> Rect {
    let visible_row = start.line.saturating_sub(scroll_offset);
    let y = content_area
        .y
        .saturating_add(visible_row.min(u16::MAX as usize) as u16)
        .min(content_area.y.saturating_add(content_area.height.saturating_sub(1)));
    let x = content_area
        .x
        .saturating_add(start.column.min(u16::MAX as usize) as u16)
        .min(content_area.x.saturating_add(content_area.width.saturating_sub(1)));
    Rect::new(x, y, 1, 1)
}

/// Center a context snippet on the word it was saved for, trimming to word
/// boundaries and marking elisions. Carried over from the web client's
/// detail card.
pub fn smart_truncate_context(context: &str, word: &str, max_len: usize) -> String {
    if context.chars().count() <= max_len {
        return context.to_string();
    }
    let chars: Vec<char> = context.chars().collect();

    let lower_context = context.to_lowercase();
    let lower_word = word.to_lowercase();
    let Some(byte_idx) = lower_context.find(&lower_word) else {
        let head: String = chars.iter().take(max_len).collect();
        return format!("{head}...");
    };
    let word_idx = lower_context[..byte_idx].chars().count();
    let word_len = lower_word.chars().count();

    let half = max_len.saturating_sub(word_len) / 2;
    let mut start = word_idx.saturating_sub(half);
    let mut end = (word_idx + word_len + half).min(chars.len());

    // Nudge the cut points to the nearest space so words are not split.
    if start > 0 {
        if let Some(space) = (start.saturating_sub(10)..start).rev().find(|&i| chars[i] == ' ') {
            start = space + 1;
        }
    }
    if end < chars.len() {
        if let Some(space) = (end..(end + 10).min(chars.len())).find(|&i| chars[i] == ' ') {
            end = space;
        }
    }

    let mut result: String = chars[start..end].iter().collect();
    if start > 0 {
        result = format!("...{result}");
    }
    if end < chars.len() {
        result = format!("{result}...");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (&'static str, Layout) {
        let text = "First paragraph with several words in it.\nSecond paragraph here.";
        let layout = Layout::compute(text, 80);
        (text, layout)
    }

    #[test]
    fn drag_produces_trimmed_capture_with_context() {
        let (text, layout) = fixture();
        let mut selection = TextSelection::new();
        // "several words" on line 0: columns 21..33 inclusive.
        selection.start_selection(0, 21);
        selection.update_selection(0, 33);
        selection.end_selection();

        let area = Rect::new(2, 1, 80, 20);
        let capture = capture_selection(&selection, text, &layout, area, 0).unwrap();
        assert_eq!(capture.text, "several words");
        assert_eq!(capture.context, "First paragraph with several words in it.");
        assert_eq!(capture.anchor, Rect::new(23, 1, 1, 1));
    }

    #[test]
    fn context_is_the_local_line_not_the_document() {
        let (text, layout) = fixture();
        let mut selection = TextSelection::new();
        let line = layout.line_of_offset(text.find("Second").unwrap()).unwrap();
        selection.start_selection(line, 0);
        selection.update_selection(line, 5);
        selection.end_selection();

        let capture =
            capture_selection(&selection, text, &layout, Rect::new(0, 0, 80, 20), 0).unwrap();
        assert_eq!(capture.text, "Second");
        assert_eq!(capture.context, "Second paragraph here.");
    }

    #[test]
    fn collapsed_selection_is_no_capture() {
        let (text, layout) = fixture();
        let mut selection = TextSelection::new();
        selection.start_selection(0, 5);
        selection.update_selection(0, 5);
        selection.end_selection();
        assert!(!selection.has_selection());
        assert!(capture_selection(&selection, text, &layout, Rect::default(), 0).is_none());
    }

    #[test]
    fn whitespace_only_selection_is_no_capture() {
        let text = "gap  here";
        let layout = Layout::compute(text, 80);
        let mut selection = TextSelection::new();
        // Just the two spaces between the words.
        selection.start_selection(0, 3);
        selection.update_selection(0, 4);
        selection.end_selection();
        assert!(capture_selection(&selection, text, &layout, Rect::default(), 0).is_none());
    }

    #[test]
    fn backwards_drag_normalizes() {
        let (text, layout) = fixture();
        let mut selection = TextSelection::new();
        selection.start_selection(0, 33);
        selection.update_selection(0, 21);
        selection.end_selection();

        let capture =
            capture_selection(&selection, text, &layout, Rect::new(0, 0, 80, 20), 0).unwrap();
        assert_eq!(capture.text, "several words");
    }

    #[test]
    fn anchor_stays_inside_content_area() {
        let (text, layout) = fixture();
        let mut selection = TextSelection::new();
        selection.start_selection(1, 0);
        selection.update_selection(1, 5);
        selection.end_selection();

        let area = Rect::new(0, 0, 10, 1);
        let capture = capture_selection(&selection, text, &layout, area, 0).unwrap();
        assert!(capture.anchor.y < area.y + area.height);
    }

    #[test]
    fn smart_truncate_centers_on_word() {
        let context = "one two three four five six seven eight nine ten eleven twelve";
        let truncated = smart_truncate_context(context, "seven", 30);
        assert!(truncated.contains("seven"));
        assert!(truncated.starts_with("..."));
        assert!(truncated.ends_with("..."));
        assert!(truncated.chars().count() <= 30 + 6 + 12);
    }

    #[test]
    fn smart_truncate_leaves_short_context_alone() {
        assert_eq!(smart_truncate_context("short", "short", 120), "short");
    }

    #[test]
    fn smart_truncate_without_word_takes_head() {
        let context = "a".repeat(200);
        let truncated = smart_truncate_context(&context, "zzz", 50);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.chars().count(), 53);
    }
}
