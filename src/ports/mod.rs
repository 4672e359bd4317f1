pub mod analyzer;
pub mod cache;
pub mod store;
