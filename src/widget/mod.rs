pub mod library;
pub mod reader;
pub mod vocab_list;
