use crate::document_store::{DocumentMeta, DocumentStore};
use crate::event_source::EventSource;
use crate::notification::{NotificationLevel, NotificationManager};
use crate::theme;
use crate::vocab_store::{DocumentId, VocabStore, load_terms};
use crate::widget::library::{LibraryAction, LibraryPanel};
use crate::widget::reader::{ReaderAction, ReaderView};
use crate::widget::vocab_list::{VocabListAction, VocabListPanel};
use anyhow::Result;
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind};
use log::{info, warn};
use ratatui::{
    Frame, Terminal,
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::Paragraph,
};
use std::time::{Duration, Instant};

const TICK_RATE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Library,
    VocabList,
}

pub struct App {
    vocab_store: Box<dyn VocabStore>,
    document_store: Box<dyn DocumentStore>,
    seen_generation: u64,
    library: LibraryPanel,
    vocab_list: VocabListPanel,
    reader: ReaderView,
    focus: Focus,
    notifications: NotificationManager,
    should_quit: bool,
}

impl App {
    pub fn new(vocab_store: Box<dyn VocabStore>, document_store: Box<dyn DocumentStore>) -> Self {
        let seen_generation = vocab_store.change_signal().generation();
        let mut app = Self {
            vocab_store,
            document_store,
            seen_generation,
            library: LibraryPanel::new(),
            vocab_list: VocabListPanel::new(),
            reader: ReaderView::new(),
            focus: Focus::Library,
            notifications: NotificationManager::new(),
            should_quit: false,
        };
        app.refresh_documents();
        app.refresh_vocabulary();
        app
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn reader(&self) -> &ReaderView {
        &self.reader
    }

    pub fn vocab_list(&self) -> &VocabListPanel {
        &self.vocab_list
    }

    pub fn library(&self) -> &LibraryPanel {
        &self.library
    }

    pub fn notifications(&self) -> &NotificationManager {
        &self.notifications
    }

    fn refresh_documents(&mut self) {
        match self.document_store.list() {
            Ok(documents) => self.library.set_documents(documents),
            Err(e) => {
                warn!("document list fetch failed: {e}");
                self.notifications.error(format!("Cannot reach server: {e}"));
            }
        }
    }

    /// Reload the vocabulary panel and, when a document is open, its term
    /// set. A fetch failure leaves the panel as-is and disables highlighting
    /// for the open document; the reader keeps rendering either way.
    fn refresh_vocabulary(&mut self) {
        match self.vocab_store.list() {
            Ok(records) => self.vocab_list.set_records(records),
            Err(e) => warn!("vocabulary fetch failed: {e}"),
        }
        if let Some(document_id) = self.reader.document().map(|d| d.id) {
            let terms = load_terms(self.vocab_store.as_ref(), document_id);
            self.reader.set_terms(terms);
        }
    }

    /// Pick up mutations signalled since the last tick. The generation
    /// counter makes "vocabulary changed" an explicit poll instead of a
    /// callback into rendering code.
    fn poll_changes(&mut self) {
        let generation = self.vocab_store.change_signal().generation();
        if generation != self.seen_generation {
            self.seen_generation = generation;
            self.refresh_vocabulary();
        }
    }

    /// Open a document by id, e.g. from the command line.
    pub fn open_by_id(&mut self, document_id: DocumentId) {
        let meta = self
            .library
            .documents()
            .iter()
            .find(|d| d.id == document_id)
            .cloned();
        match meta {
            Some(meta) => self.open_document(meta, None),
            None => {
                self.notifications
                    .warn(format!("No document with id {document_id}"));
            }
        }
    }

    fn open_document(&mut self, meta: DocumentMeta, jump_term: Option<String>) {
        info!("opening document {} ({})", meta.id, meta.title);
        let document_id = meta.id;
        match self.document_store.content(document_id) {
            Ok(text) => {
                self.reader.open(meta, text, jump_term);
                let terms = load_terms(self.vocab_store.as_ref(), document_id);
                self.reader.set_terms(terms);
            }
            Err(e) => {
                warn!("content fetch for document {document_id} failed: {e}");
                self.notifications
                    .error(format!("Cannot open \"{}\": {e}", meta.title));
            }
        }
    }

    fn jump_to(&mut self, document_id: DocumentId, term: String) {
        if self.reader.document().is_some_and(|d| d.id == document_id) {
            // Already reading this document; just re-target the jump.
            let meta = self.reader.document().cloned();
            if let Some(meta) = meta {
                self.open_document(meta, Some(term));
            }
            return;
        }
        let meta = self
            .library
            .documents()
            .iter()
            .find(|d| d.id == document_id)
            .cloned();
        match meta {
            Some(meta) => self.open_document(meta, Some(term)),
            None => {
                self.notifications.warn("Document is no longer on the shelf");
            }
        }
    }

    fn save_draft(&mut self, draft: crate::vocab_store::VocabDraft) {
        let original = draft.original.clone();
        match self.vocab_store.save(&draft) {
            Ok(_) => {
                self.notifications.info(format!("Saved \"{original}\""));
            }
            Err(e) => {
                warn!("save failed: {e}");
                self.notifications.error(format!("Save failed: {e}"));
            }
        }
    }

    fn delete_record(&mut self, id: i64) {
        match self.vocab_store.delete(id) {
            Ok(()) => self.notifications.info("Word deleted"),
            Err(e) => {
                warn!("delete failed: {e}");
                self.notifications.error(format!("Delete failed: {e}"));
            }
        }
    }

    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => self.handle_key(key),
            Event::Mouse(mouse) => {
                if self.reader.has_document() {
                    match self.reader.handle_mouse(mouse) {
                        ReaderAction::Save(draft) => self.save_draft(draft),
                        ReaderAction::Close => self.reader.close(),
                        ReaderAction::None => {}
                    }
                }
            }
            _ => {}
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if self.reader.has_document() {
            let typing = self.reader.capture_input().is_some();
            match self.reader.handle_key(key) {
                ReaderAction::Save(draft) => self.save_draft(draft),
                ReaderAction::Close => self.reader.close(),
                ReaderAction::None => {
                    if !typing && key.code == KeyCode::Char('q') {
                        self.reader.close();
                    }
                }
            }
            return;
        }

        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Tab => {
                self.focus = match self.focus {
                    Focus::Library => Focus::VocabList,
                    Focus::VocabList => Focus::Library,
                };
            }
            KeyCode::Char('r') => {
                self.refresh_documents();
                self.refresh_vocabulary();
            }
            _ => match self.focus {
                Focus::Library => match self.library.handle_key(key) {
                    LibraryAction::Open(meta) => self.open_document(meta, None),
                    LibraryAction::None => {}
                },
                Focus::VocabList => match self.vocab_list.handle_key(key) {
                    VocabListAction::JumpTo { document_id, term } => {
                        self.jump_to(document_id, term)
                    }
                    VocabListAction::Delete(id) => self.delete_record(id),
                    VocabListAction::None => {}
                },
            },
        }
    }

    pub fn tick(&mut self) {
        self.reader.tick();
        self.notifications.update();
        self.poll_changes();
    }

    pub fn draw(&mut self, frame: &mut Frame) {
        let palette = theme::current_theme();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(3), Constraint::Length(1)])
            .split(frame.area());

        if self.reader.has_document() {
            self.reader.render(frame, chunks[0], palette);
        } else {
            let panels = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
                .split(chunks[0]);
            self.library
                .render(frame, panels[0], self.focus == Focus::Library, palette);
            self.vocab_list
                .render(frame, panels[1], self.focus == Focus::VocabList, palette);
        }

        self.draw_footer(frame, chunks[1], palette);
    }

    fn draw_footer(&self, frame: &mut Frame, area: Rect, palette: &crate::theme::Base16Palette) {
        let line = if let Some(notification) = self.notifications.current() {
            let style = match notification.level {
                NotificationLevel::Info => palette.accent(),
                NotificationLevel::Warning => palette.warning(),
                NotificationLevel::Error => palette.error(),
            };
            Line::from(Span::styled(notification.message.clone(), style))
        } else if self.reader.has_document() {
            Line::from(Span::styled(
                "j/k scroll  drag: capture  tap: detail  Esc: back",
                palette.chrome(),
            ))
        } else {
            Line::from(Span::styled(
                "Tab: switch panel  Enter: open  d: delete  r: refresh  q: quit",
                palette.chrome(),
            ))
        };
        frame.render_widget(Paragraph::new(line), area);
    }
}

/// Event loop, generic over the backend and event source so tests can drive
/// it with simulated events against a test backend.
pub fn run_app_with_event_source<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    event_source: &mut dyn EventSource,
) -> Result<()>
where
    <B as ratatui::backend::Backend>::Error: Send + Sync + 'static,
{
    let mut last_tick = Instant::now();
    loop {
        terminal.draw(|frame| app.draw(frame))?;

        let timeout = TICK_RATE.saturating_sub(last_tick.elapsed());
        if event_source.poll(timeout)? {
            let event = event_source.read()?;
            app.handle_event(event);
        }
        if last_tick.elapsed() >= TICK_RATE {
            app.tick();
            last_tick = Instant::now();
        }
        if app.should_quit() {
            return Ok(());
        }
    }
}
