use crate::document_store::DocumentMeta;
use crate::theme::Base16Palette;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    Frame,
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState},
};

#[derive(Debug, Clone, PartialEq)]
pub enum LibraryAction {
    None,
    Open(DocumentMeta),
}

/// The document list panel.
pub struct LibraryPanel {
    documents: Vec<DocumentMeta>,
    list_state: ListState,
}

impl Default for LibraryPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl LibraryPanel {
    pub fn new() -> Self {
        Self {
            documents: Vec::new(),
            list_state: ListState::default(),
        }
    }

    pub fn set_documents(&mut self, documents: Vec<DocumentMeta>) {
        self.documents = documents;
        let selected = self
            .list_state
            .selected()
            .filter(|&idx| idx < self.documents.len());
        self.list_state
            .select(selected.or_else(|| (!self.documents.is_empty()).then_some(0)));
    }

    pub fn documents(&self) -> &[DocumentMeta] {
        &self.documents
    }

    pub fn selected(&self) -> Option<&DocumentMeta> {
        self.documents.get(self.list_state.selected()?)
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> LibraryAction {
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => self.move_selection(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_selection(-1),
            KeyCode::Char('g') | KeyCode::Home => {
                if !self.documents.is_empty() {
                    self.list_state.select(Some(0));
                }
            }
            KeyCode::Char('G') | KeyCode::End => {
                if !self.documents.is_empty() {
                    self.list_state.select(Some(self.documents.len() - 1));
                }
            }
            KeyCode::Enter => {
                if let Some(meta) = self.selected() {
                    return LibraryAction::Open(meta.clone());
                }
            }
            _ => {}
        }
        LibraryAction::None
    }

    fn move_selection(&mut self, delta: isize) {
        if self.documents.is_empty() {
            return;
        }
        let current = self.list_state.selected().unwrap_or(0);
        let next = current
            .saturating_add_signed(delta)
            .min(self.documents.len() - 1);
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

        let items: Vec<ListItem> = self
            .documents
            .iter()
            .map(|doc| ListItem::new(Line::from(Span::styled(doc.title.clone(), palette.text()))))
            .collect();

        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(border_style)
                    .title(" Library "),
            )
            .highlight_style(palette.selection());

        frame.render_stateful_widget(list, area, &mut self.list_state);
    }
}
