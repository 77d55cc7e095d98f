pub mod coordinator;
pub mod http;
pub mod llm;
pub mod metadata;
pub mod papers;
pub mod publishers;
pub mod retry;
pub mod settings;
pub mod stats;
pub mod utils;
