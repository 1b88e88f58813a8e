use crate::capture::{Capture, TextSelection, capture_selection, smart_truncate_context};
use crate::document_store::DocumentMeta;
use crate::highlight::{Rendering, Segment, compile};
use crate::interaction::{
    Gesture, GestureTracker, HitRegion, Point, Resolution, resolve_drag, resolve_tap,
};
use crate::jump::{PendingJump, TransientMark, locate};
use crate::layout::Layout;
use crate::theme::Base16Palette;
use crate::vocab_store::{TermSet, VocabDraft, VocabRecord};
use crossterm::event::{KeyCode, KeyEvent, MouseEvent, MouseEventKind};
use log::debug;
use ratatui::{
    Frame,
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

const CONTEXT_SNIPPET_LEN: usize = 120;
const CAPTURE_PREVIEW_LEN: usize = 30;

/// Translation-entry popup state for a fresh capture.
#[derive(Debug, Clone)]
pub struct CaptureInput {
    pub capture: Capture,
    pub translation: String,
}

/// What the reader wants the application shell to do after an event.
#[derive(Debug, Clone, PartialEq)]
pub enum ReaderAction {
    None,
    /// Persist a new vocabulary record, then refresh the term set.
    Save(VocabDraft),
    /// Leave the reader and return to the library.
    Close,
}

/// The reading view. Owns one document at a time: its text, the wrapped
/// layout, the compiled rendering, and all transient interaction state.
pub struct ReaderView {
    document: Option<DocumentMeta>,
    text: String,
    layout: Layout,
    rendering: Rendering,
    term_set: TermSet,
    scroll_offset: usize,
    selection: TextSelection,
    gesture: GestureTracker,
    transient: Option<TransientMark>,
    pending_jump: Option<PendingJump>,
    detail: Option<VocabRecord>,
    capture_input: Option<CaptureInput>,
    hit_root: HitRegion,
    last_content_area: Option<Rect>,
    /// (terms generation, width) the current rendering was compiled for.
    compiled_for: Option<(u64, u16)>,
}

impl Default for ReaderView {
    fn default() -> Self {
        Self::new()
    }
}

impl ReaderView {
    pub fn new() -> Self {
        Self {
            document: None,
            text: String::new(),
            layout: Layout::default(),
            rendering: Rendering::default(),
            term_set: TermSet::default(),
            scroll_offset: 0,
            selection: TextSelection::new(),
            gesture: GestureTracker::new(),
            transient: None,
            pending_jump: None,
            detail: None,
            capture_input: None,
            hit_root: HitRegion::default(),
            last_content_area: None,
            compiled_for: None,
        }
    }

    pub fn document(&self) -> Option<&DocumentMeta> {
        self.document.as_ref()
    }

    pub fn has_document(&self) -> bool {
        self.document.is_some()
    }

    /// Open a document, optionally deep-linking to the first occurrence of
    /// a term (the jump originates in the vocabulary panel).
    pub fn open(&mut self, meta: DocumentMeta, text: String, jump_term: Option<String>) {
        debug!("opening document {} ({})", meta.id, meta.title);
        self.document = Some(meta);
        self.text = text;
        self.layout = Layout::default();
        self.rendering = Rendering::default();
        self.term_set = TermSet::default();
        self.scroll_offset = 0;
        self.selection.clear();
        self.transient = None;
        self.pending_jump = jump_term.map(PendingJump::new);
        self.detail = None;
        self.capture_input = None;
        self.compiled_for = None;
    }

    pub fn close(&mut self) {
        self.document = None;
        self.text.clear();
        self.compiled_for = None;
    }

    /// Replace the term set wholesale (one atomic fetch-then-recompile unit;
    /// the adapter already discarded stale responses). Triggers a recompile
    /// and, if a deep-link is still pending, its one allowed retry.
    pub fn set_terms(&mut self, term_set: TermSet) {
        self.term_set = term_set;
        self.compiled_for = None;
    }

    pub fn term_set(&self) -> &TermSet {
        &self.term_set
    }

    pub fn rendering(&self) -> &Rendering {
        &self.rendering
    }

    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    pub fn detail(&self) -> Option<&VocabRecord> {
        self.detail.as_ref()
    }

    pub fn capture_input(&self) -> Option<&CaptureInput> {
        self.capture_input.as_ref()
    }

    pub fn transient_mark(&self) -> Option<&TransientMark> {
        self.transient.as_ref()
    }

    /// Drop the transient mark once its window elapsed. Called on every
    /// tick; expiry does not depend on further interaction.
    pub fn tick(&mut self) -> bool {
        if self.transient.as_ref().is_some_and(|m| m.is_expired()) {
            self.transient = None;
            return true;
        }
        false
    }

    /// Recompile layout + rendering when the document, term set, or width
    /// changed. Identical inputs are never recompiled.
    pub fn ensure_compiled(&mut self, width: u16, viewport_height: usize) {
        let key = (self.term_set.generation(), width);
        if self.compiled_for == Some(key) {
            return;
        }
        self.layout = Layout::compute(&self.text, width);
        let jump_term = self.pending_jump.as_ref().map(|j| j.term.clone());
        self.rendering = compile(&self.text, &self.term_set, jump_term.as_deref());
        self.compiled_for = Some(key);
        self.attempt_pending_jump(viewport_height);
    }

    fn attempt_pending_jump(&mut self, viewport_height: usize) {
        let Some(jump) = self.pending_jump.as_mut() else {
            return;
        };
        match locate(&self.rendering, &jump.term) {
            Some(segment_index) => {
                debug!("jump to {:?} landed on segment {segment_index}", jump.term);
                self.transient = Some(TransientMark::new(segment_index));
                self.pending_jump = None;
                self.center_segment(segment_index, viewport_height);
            }
            None => {
                // One retry after the next vocabulary load, then give up.
                if !jump.note_miss() {
                    debug!("jump target {:?} not found after retry", jump.term);
                    self.pending_jump = None;
                }
            }
        }
    }

    fn center_segment(&mut self, segment_index: usize, viewport_height: usize) {
        let Some((start, _)) = self.rendering.segment_range(segment_index) else {
            return;
        };
        let Some(line) = self.layout.line_of_offset(start) else {
            return;
        };
        self.scroll_offset = line.saturating_sub(viewport_height / 2);
        self.clamp_scroll(viewport_height);
    }

    fn clamp_scroll(&mut self, viewport_height: usize) {
        let max = self
            .layout
            .line_count()
            .saturating_sub(viewport_height.max(1));
        self.scroll_offset = self.scroll_offset.min(max);
    }

    pub fn scroll_by(&mut self, delta: isize, viewport_height: usize) {
        self.scroll_offset = self.scroll_offset.saturating_add_signed(delta);
        self.clamp_scroll(viewport_height);
    }

    fn screen_to_text_coords(&self, x: u16, y: u16) -> Option<(usize, usize)> {
        let area = self.last_content_area?;
        if y < area.y || y >= area.y + area.height || x < area.x || x >= area.x + area.width {
            return None;
        }
        let line = self.scroll_offset + (y - area.y) as usize;
        if line >= self.layout.line_count() {
            return None;
        }
        Some((line, (x - area.x) as usize))
    }

    pub fn handle_mouse(&mut self, event: MouseEvent) -> ReaderAction {
        let viewport = self
            .last_content_area
            .map(|a| a.height as usize)
            .unwrap_or(1);
        match event.kind {
            MouseEventKind::ScrollDown => {
                self.scroll_by(3, viewport);
                return ReaderAction::None;
            }
            MouseEventKind::ScrollUp => {
                self.scroll_by(-3, viewport);
                return ReaderAction::None;
            }
            _ => {}
        }

        match self.gesture.on_mouse(event) {
            Gesture::Tap(point) => self.handle_tap(point),
            Gesture::DragStart(point) | Gesture::RightDragStart(point) => {
                if let Some((line, column)) = self.screen_to_text_coords(point.x, point.y) {
                    self.selection.start_selection(line, column);
                }
                ReaderAction::None
            }
            Gesture::DragMove(point) | Gesture::RightDragMove(point) => {
                if let Some((line, column)) = self.screen_to_text_coords(point.x, point.y) {
                    self.selection.update_selection(line, column);
                }
                ReaderAction::None
            }
            Gesture::DragEnd(point) | Gesture::RightDragEnd(point) => {
                if let Some((line, column)) = self.screen_to_text_coords(point.x, point.y) {
                    self.selection.update_selection(line, column);
                }
                self.selection.end_selection();
                self.finish_selection()
            }
            Gesture::None => ReaderAction::None,
        }
    }

    /// A tap either opens record detail (when it lands on a highlight) or
    /// dismisses whatever popup is up. Resolution is synchronous against the
    /// hit map built during the last render; no fetch happens here.
    fn handle_tap(&mut self, point: Point) -> ReaderAction {
        self.selection.clear();
        match resolve_tap(&self.hit_root, point) {
            Resolution::VocabHit { record_id } => {
                match self.term_set.get(record_id) {
                    Some(record) => {
                        self.detail = Some(record.clone());
                    }
                    None => {
                        // The record vanished between compile and tap
                        // (deleted elsewhere). No detail, no panic.
                        debug!("tapped stale vocabulary record {record_id}");
                        self.detail = None;
                    }
                }
                self.capture_input = None;
            }
            _ => {
                self.detail = None;
                self.capture_input = None;
            }
        }
        ReaderAction::None
    }

    fn finish_selection(&mut self) -> ReaderAction {
        let area = self.last_content_area.unwrap_or_default();
        match resolve_drag(self.selection.has_selection()) {
            Resolution::Selection => {
                if let Some(capture) = capture_selection(
                    &self.selection,
                    &self.text,
                    &self.layout,
                    area,
                    self.scroll_offset,
                ) {
                    self.detail = None;
                    self.capture_input = Some(CaptureInput {
                        capture,
                        translation: String::new(),
                    });
                }
            }
            _ => {
                self.selection.clear();
            }
        }
        ReaderAction::None
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> ReaderAction {
        let viewport = self
            .last_content_area
            .map(|a| a.height as usize)
            .unwrap_or(1);

        if self.capture_input.is_some() {
            return self.handle_capture_key(key);
        }
        if self.detail.is_some() {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('q') | KeyCode::Enter) {
                self.detail = None;
            }
            return ReaderAction::None;
        }

        match key.code {
            KeyCode::Char('j') | KeyCode::Down => self.scroll_by(1, viewport),
            KeyCode::Char('k') | KeyCode::Up => self.scroll_by(-1, viewport),
            KeyCode::Char('d') | KeyCode::PageDown => {
                self.scroll_by(viewport as isize / 2, viewport)
            }
            KeyCode::Char('u') | KeyCode::PageUp => {
                self.scroll_by(-(viewport as isize) / 2, viewport)
            }
            KeyCode::Char('g') | KeyCode::Home => self.scroll_offset = 0,
            KeyCode::Char('G') | KeyCode::End => {
                self.scroll_offset = usize::MAX;
                self.clamp_scroll(viewport);
            }
            KeyCode::Esc => {
                if self.selection.has_selection() {
                    self.selection.clear();
                } else {
                    return ReaderAction::Close;
                }
            }
            _ => {}
        }
        ReaderAction::None
    }

    fn handle_capture_key(&mut self, key: KeyEvent) -> ReaderAction {
        let Some(input) = self.capture_input.as_mut() else {
            return ReaderAction::None;
        };
        match key.code {
            KeyCode::Esc => {
                self.capture_input = None;
                self.selection.clear();
            }
            KeyCode::Enter => {
                if input.translation.trim().is_empty() {
                    return ReaderAction::None;
                }
                let Some(document) = &self.document else {
                    return ReaderAction::None;
                };
                let draft = VocabDraft {
                    original: input.capture.text.clone(),
                    translation: input.translation.trim().to_string(),
                    context: input.capture.context.clone(),
                    document_id: document.id,
                };
                self.capture_input = None;
                self.selection.clear();
                return ReaderAction::Save(draft);
            }
            KeyCode::Backspace => {
                input.translation.pop();
            }
            KeyCode::Char(c) => {
                input.translation.push(c);
            }
            _ => {}
        }
        ReaderAction::None
    }

    pub fn render(&mut self, frame: &mut Frame, area: Rect, palette: &Base16Palette) {
        let title = self
            .document
            .as_ref()
            .map(|d| format!(" {} ", d.title))
            .unwrap_or_else(|| " Reader ".to_string());
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(palette.focused_border())
            .title(title);
        let content_area = block.inner(area);
        frame.render_widget(block, area);

        self.last_content_area = Some(content_area);
        self.ensure_compiled(content_area.width, content_area.height as usize);
        self.clamp_scroll(content_area.height as usize);

        let lines = self.visible_lines(content_area, palette);
        frame.render_widget(Paragraph::new(lines), content_area);

        self.hit_root = self.build_hit_map(content_area);

        if let Some(input) = self.capture_input.clone() {
            self.render_capture_popup(frame, area, &input, palette);
        }
        if let Some(record) = self.detail.clone() {
            self.render_detail_popup(frame, area, &record, palette);
        }
    }

    /// Styled visual lines for the current viewport. Works per character:
    /// each cell's style comes from the segment covering its byte, then the
    /// selection and the transient jump mark override; consecutive cells
    /// with one style are folded into a span.
    fn visible_lines(&self, content_area: Rect, palette: &Base16Palette) -> Vec<Line<'static>> {
        let selection_range = self.selection.byte_range(&self.text, &self.layout);
        let mut out = Vec::with_capacity(content_area.height as usize);

        let first = self.scroll_offset;
        let last = (first + content_area.height as usize).min(self.layout.line_count());
        for line_idx in first..last {
            let Some(line_text) = self.layout.line_text(&self.text, line_idx) else {
                continue;
            };
            let range = self.layout.lines()[line_idx];

            let mut spans: Vec<Span<'static>> = Vec::new();
            let mut run = String::new();
            let mut run_style = None;
            for (byte_idx, c) in line_text.char_indices() {
                let byte = range.start + byte_idx;
                let mut style = match self.rendering.segment_at(byte) {
                    Some((seg_idx, Segment::Highlight { .. })) => {
                        if self.transient.as_ref().is_some_and(|m| m.applies_to(seg_idx)) {
                            palette.jump_mark()
                        } else {
                            palette.vocab_highlight()
                        }
                    }
                    _ => palette.text(),
                };
                if selection_range.is_some_and(|(s, e)| byte >= s && byte < e) {
                    style = palette.selection();
                }
                if run_style != Some(style) {
                    if !run.is_empty() {
                        spans.push(Span::styled(
                            std::mem::take(&mut run),
                            run_style.unwrap_or_default(),
                        ));
                    }
                    run_style = Some(style);
                }
                run.push(c);
            }
            if !run.is_empty() {
                spans.push(Span::styled(run, run_style.unwrap_or_default()));
            }
            out.push(Line::from(spans));
        }
        out
    }

    /// Region tree for tap resolution: content area, one region per visible
    /// line, marker leaves for each highlight slice on that line.
    fn build_hit_map(&self, content_area: Rect) -> HitRegion {
        let mut root = HitRegion::new(content_area);

        let first = self.scroll_offset;
        let last = (first + content_area.height as usize).min(self.layout.line_count());
        for line_idx in first..last {
            let range = self.layout.lines()[line_idx];
            let y = content_area.y + (line_idx - first) as u16;
            let mut line_region = HitRegion::new(Rect::new(
                content_area.x,
                y,
                content_area.width,
                1,
            ));

            for (seg_idx, segment) in self.rendering.highlights_in_range(range.start, range.end) {
                let Some(record_id) = segment.record_id() else {
                    continue;
                };
                let Some((seg_start, seg_end)) = self.rendering.segment_range(seg_idx) else {
                    continue;
                };
                // Clip segments spanning a wrap point to this visual line.
                let clipped_start = seg_start.max(range.start);
                let clipped_end = seg_end.min(range.end);
                let Some((_, start_col)) = self.layout.position_of(&self.text, clipped_start)
                else {
                    continue;
                };
                let Some((_, end_col)) = self.layout.position_of(&self.text, clipped_end) else {
                    continue;
                };
                let width = end_col.saturating_sub(start_col).max(1) as u16;
                let x = content_area.x + start_col.min(u16::MAX as usize) as u16;
                line_region
                    .children
                    .push(HitRegion::with_marker(Rect::new(x, y, width, 1), record_id));
            }
            root.children.push(line_region);
        }
        root
    }

    fn render_capture_popup(
        &self,
        frame: &mut Frame,
        area: Rect,
        input: &CaptureInput,
        palette: &Base16Palette,
    ) {
        let preview: String = if input.capture.text.chars().count() > CAPTURE_PREVIEW_LEN {
            let head: String = input.capture.text.chars().take(CAPTURE_PREVIEW_LEN).collect();
            format!("\"{head}...\"")
        } else {
            format!("\"{}\"", input.capture.text)
        };

        let width = (area.width.saturating_sub(4)).min(44).max(20);
        let popup = anchored_popup(area, input.capture.anchor, width, 5);

        let lines = vec![
            Line::from(Span::styled(preview, palette.chrome())),
            Line::from(vec![
                Span::styled("> ", palette.accent()),
                Span::styled(input.translation.clone(), palette.text()),
                Span::styled("_", palette.accent()),
            ]),
            Line::from(Span::styled("Enter: save   Esc: cancel", palette.chrome())),
        ];
        frame.render_widget(Clear, popup);
        frame.render_widget(
            Paragraph::new(lines)
                .wrap(Wrap { trim: false })
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .border_style(palette.focused_border())
                        .title(" New word "),
                ),
            popup,
        );
    }

    fn render_detail_popup(
        &self,
        frame: &mut Frame,
        area: Rect,
        record: &VocabRecord,
        palette: &Base16Palette,
    ) {
        let width = (area.width.saturating_sub(6)).min(56).max(24);
        let height = 9;
        let popup = centered_popup(area, width, height);

        let mut lines = vec![
            Line::from(Span::styled(record.original.clone(), palette.popup_title())),
            Line::from(""),
            Line::from(Span::styled(record.translation.clone(), palette.accent())),
        ];
        if !record.context.is_empty() {
            let snippet =
                smart_truncate_context(&record.context, &record.original, CONTEXT_SNIPPET_LEN);
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                format!("\"{snippet}\""),
                palette.chrome(),
            )));
        }
        let mut footer = Vec::new();
        if let Some(title) = &record.book_title {
            footer.push(format!("from {title}"));
        }
        if let Some(date) = record.created_date() {
            footer.push(date.format("%Y-%m-%d").to_string());
        }
        if !footer.is_empty() {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                footer.join("  ·  "),
                palette.chrome(),
            )));
        }

        frame.render_widget(Clear, popup);
        frame.render_widget(
            Paragraph::new(lines)
                .wrap(Wrap { trim: true })
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .border_style(palette.focused_border())
                        .title(" Saved word "),
                ),
            popup,
        );
    }
}

/// Popup placed near an anchor cell, clamped to stay inside the area.
fn anchored_popup(area: Rect, anchor: Rect, width: u16, height: u16) -> Rect {
    let x = anchor
        .x
        .min(area.x + area.width.saturating_sub(width + 1))
        .max(area.x);
    // Prefer above the anchor, fall back to below.
    let y = if anchor.y >= area.y + height {
        anchor.y - height
    } else {
        (anchor.y + 1).min(area.y + area.height.saturating_sub(height))
    };
    Rect::new(x, y, width.min(area.width), height.min(area.height))
}

fn centered_popup(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}
