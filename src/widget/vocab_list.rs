use crate::capture::smart_truncate_context;
use crate::theme::Base16Palette;
use crate::vocab_store::{DocumentId, VocabId, VocabRecord};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    Frame,
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState},
};

const CONTEXT_DISPLAY_LEN: usize = 80;

#[derive(Debug, Clone, PartialEq)]
pub enum VocabListAction {
    None,
    /// Open the document and land on the first occurrence of the term.
    JumpTo {
        document_id: DocumentId,
        term: String,
    },
    Delete(VocabId),
}

/// The saved-words panel: every record across all documents, newest first.
pub struct VocabListPanel {
    records: Vec<VocabRecord>,
    list_state: ListState,
}

impl Default for VocabListPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl VocabListPanel {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            list_state: ListState::default(),
        }
    }

    pub fn set_records(&mut self, mut records: Vec<VocabRecord>) {
        records.sort_by(|a, b| b.id.cmp(&a.id));
        self.records = records;
        let selected = self
            .list_state
            .selected()
            .filter(|&idx| idx < self.records.len());
        self.list_state
            .select(selected.or_else(|| (!self.records.is_empty()).then_some(0)));
    }

    pub fn records(&self) -> &[VocabRecord] {
        &self.records
    }

    pub fn selected(&self) -> Option<&VocabRecord> {
        self.records.get(self.list_state.selected()?)
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> VocabListAction {
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => self.move_selection(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_selection(-1),
            KeyCode::Char('g') | KeyCode::Home => {
                if !self.records.is_empty() {
                    self.list_state.select(Some(0));
                }
            }
            KeyCode::Char('G') | KeyCode::End => {
                if !self.records.is_empty() {
                    self.list_state.select(Some(self.records.len() - 1));
                }
            }
            KeyCode::Enter => {
                if let Some(record) = self.selected() {
                    return VocabListAction::JumpTo {
                        document_id: record.document_id,
                        term: record.original.clone(),
                    };
                }
            }
            KeyCode::Char('d') | KeyCode::Delete => {
                if let Some(record) = self.selected() {
                    return VocabListAction::Delete(record.id);
                }
            }
            _ => {}
        }
        VocabListAction::None
    }

    fn move_selection(&mut self, delta: isize) {
        if self.records.is_empty() {
            return;
        }
        let current = self.list_state.selected().unwrap_or(0);
        let next = current
            .saturating_add_signed(delta)
            .min(self.records.len() - 1);
        self.list_state.select(Some(next));
    }

    pub fn render(
        &mut self,
        frame: &mut Frame,
        area: Rect,
        is_focused: bool,
        palette: &Base16Palette,
    ) {
        let border_style = if is_focused {
            palette.focused_border()
        } else {
            palette.chrome()
        };
        let wrap_width = area.width.saturating_sub(4).max(10) as usize;

        let items: Vec<ListItem> = self
            .records
            .iter()
            .map(|record| {
                let mut lines = vec![Line::from(vec![
                    Span::styled(record.original.clone(), palette.popup_title()),
                    Span::styled(" — ", palette.chrome()),
                    Span::styled(record.translation.clone(), palette.accent()),
                ])];
                if !record.context.is_empty() {
                    let snippet = smart_truncate_context(
                        &record.context,
                        &record.original,
                        CONTEXT_DISPLAY_LEN,
                    );
                    for wrapped in textwrap::wrap(&snippet, wrap_width) {
                        lines.push(Line::from(Span::styled(
                            format!("  {wrapped}"),
                            palette.chrome(),
                        )));
                    }
                }
                let mut footer = Vec::new();
                if let Some(title) = &record.book_title {
                    footer.push(title.clone());
                }
                if let Some(date) = record.created_date() {
                    footer.push(date.format("%Y-%m-%d").to_string());
                }
                if !footer.is_empty() {
                    lines.push(Line::from(Span::styled(
                        format!("  {}", footer.join("  ")),
                        palette.chrome(),
                    )));
                }
                ListItem::new(lines)
            })
            .collect();

        let title = format!(" Words ({}) ", self.records.len());
        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(border_style)
                    .title(title),
            )
            .highlight_style(palette.selection());

        frame.render_stateful_widget(list, area, &mut self.list_state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocab_store::test_support::record;
    use crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::empty())
    }

    #[test]
    fn records_are_ordered_newest_first() {
        let mut panel = VocabListPanel::new();
        panel.set_records(vec![record(1, "old", 1), record(3, "new", 2)]);
        assert_eq!(panel.records()[0].original, "new");
        assert_eq!(panel.selected().unwrap().id, 3);
    }

    #[test]
    fn enter_requests_a_jump_into_the_record_document() {
        let mut panel = VocabListPanel::new();
        panel.set_records(vec![record(1, "elephant", 7)]);

        let action = panel.handle_key(key(KeyCode::Enter));
        assert_eq!(
            action,
            VocabListAction::JumpTo {
                document_id: 7,
                term: "elephant".to_string(),
            }
        );
    }

    #[test]
    fn delete_targets_the_selected_record() {
        let mut panel = VocabListPanel::new();
        panel.set_records(vec![record(1, "one", 1), record(2, "two", 1)]);
        panel.handle_key(key(KeyCode::Char('j')));

        // Newest first, so the second row is id 1.
        assert_eq!(
            panel.handle_key(key(KeyCode::Char('d'))),
            VocabListAction::Delete(1)
        );
    }

    #[test]
    fn empty_panel_produces_no_actions() {
        let mut panel = VocabListPanel::new();
        panel.set_records(Vec::new());
        assert_eq!(panel.handle_key(key(KeyCode::Enter)), VocabListAction::None);
        assert_eq!(
            panel.handle_key(key(KeyCode::Char('d'))),
            VocabListAction::None
        );
    }
}
