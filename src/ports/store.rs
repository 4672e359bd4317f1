use async_trait::async_trait;

use crate::domain::transaction::{Transaction, TransactionDraft};
use crate::error::Result;

#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Full ledger snapshot, newest first.
    async fn list(&self) -> Result<Vec<Transaction>>;
    async fn create(&self, draft: TransactionDraft) -> Result<Transaction>;
    async fn update(&self, transaction: Transaction) -> Result<Transaction>;
    async fn delete(&self, id: &str) -> Result<()>;
    /// Wholesale replacement, used by backup restore.
    async fn replace_all(&self, transactions: Vec<Transaction>) -> Result<()>;
}
