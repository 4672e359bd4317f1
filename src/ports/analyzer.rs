use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::transaction::Transaction;
use crate::error::Result;

/// Short written assessment of the ledger, title plus body text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Narrative {
    pub title: String,
    pub content: String,
}

#[async_trait]
pub trait NarrativeAnalyzer: Send + Sync {
    async fn analyze(&self, transactions: &[Transaction]) -> Result<Narrative>;
}
