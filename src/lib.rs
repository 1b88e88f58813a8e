pub mod app;
pub mod capture;
pub mod document_store;
pub mod event_source;
pub mod highlight;
pub mod interaction;
pub mod jump;
pub mod layout;
pub mod notification;
pub mod panic_handler;
pub mod settings;
pub mod theme;
pub mod vocab_store;
pub mod widget;

pub use app::{App, run_app_with_event_source};
