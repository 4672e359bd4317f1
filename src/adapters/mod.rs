pub mod cache;
pub mod gemini;
pub mod http_store;
pub mod memory_store;
