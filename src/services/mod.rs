pub mod analysis;
pub mod chat;
pub mod gemini;
pub mod parser;
pub mod prompts;
pub mod render;
pub mod report;
