use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::transaction::{Transaction, TransactionDraft, sort_newest_first};
use crate::error::{LedgerError, Result};
use crate::ports::store::TransactionStore;

/// Process-local ledger, the default when no remote backend is configured.
/// New records are prepended, so among same-date records the most recently
/// created one lists first.
pub struct MemoryStore {
    records: RwLock<Vec<Transaction>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }

    pub fn with_records(records: Vec<Transaction>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    fn lock_err() -> LedgerError {
        LedgerError::Store {
            reason: "transaction store lock poisoned".into(),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn list(&self) -> Result<Vec<Transaction>> {
        let records = self.records.read().map_err(|_| Self::lock_err())?;
        let mut snapshot = records.clone();
        sort_newest_first(&mut snapshot);
        Ok(snapshot)
    }

    async fn create(&self, draft: TransactionDraft) -> Result<Transaction> {
        let transaction = draft.into_transaction(Uuid::new_v4().to_string());
        let mut records = self.records.write().map_err(|_| Self::lock_err())?;
        records.insert(0, transaction.clone());
        Ok(transaction)
    }

    async fn update(&self, transaction: Transaction) -> Result<Transaction> {
        let mut records = self.records.write().map_err(|_| Self::lock_err())?;
        let slot = records
            .iter_mut()
            .find(|existing| existing.id == transaction.id)
            .ok_or_else(|| LedgerError::TransactionNotFound {
                id: transaction.id.clone(),
            })?;
        *slot = transaction.clone();
        Ok(transaction)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut records = self.records.write().map_err(|_| Self::lock_err())?;
        let before = records.len();
        records.retain(|existing| existing.id != id);
        if records.len() == before {
            return Err(LedgerError::TransactionNotFound { id: id.to_string() });
        }
        Ok(())
    }

    async fn replace_all(&self, transactions: Vec<Transaction>) -> Result<()> {
        let mut records = self.records.write().map_err(|_| Self::lock_err())?;
        *records = transactions;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::transaction::{Category, TransactionKind};
    use crate::test_helpers::{date, make_transaction};

    fn draft(date_str: &str, amount: f64) -> TransactionDraft {
        TransactionDraft {
            date: date(date_str),
            amount,
            description: "Achat produits ménagers".into(),
            category: Category::Supplies,
            kind: TransactionKind::Expense,
            booking: None,
        }
    }

    #[tokio::test]
    async fn create_assigns_distinct_ids() {
        let store = MemoryStore::new();
        let a = store.create(draft("2024-03-01", 10.0)).await.unwrap();
        let b = store.create(draft("2024-03-01", 20.0)).await.unwrap();
        assert_ne!(a.id, b.id);
        assert!(!a.id.is_empty());
    }

    #[tokio::test]
    async fn list_returns_newest_first() {
        let store = MemoryStore::new();
        store.create(draft("2024-01-15", 10.0)).await.unwrap();
        store.create(draft("2024-06-01", 20.0)).await.unwrap();
        store.create(draft("2024-03-20", 30.0)).await.unwrap();

        let listed = store.list().await.unwrap();
        let dates: Vec<String> = listed.iter().map(|t| t.date.to_string()).collect();
        assert_eq!(dates, vec!["2024-06-01", "2024-03-20", "2024-01-15"]);
    }

    #[tokio::test]
    async fn same_date_records_keep_creation_order_newest_first() {
        let store = MemoryStore::new();
        let first = store.create(draft("2024-03-01", 10.0)).await.unwrap();
        let second = store.create(draft("2024-03-01", 20.0)).await.unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);
    }

    #[tokio::test]
    async fn update_replaces_the_matching_record() {
        let store = MemoryStore::new();
        let created = store.create(draft("2024-03-01", 10.0)).await.unwrap();

        let mut changed = created.clone();
        changed.amount = 99.0;
        changed.description = "Achat vaisselle".into();
        store.update(changed).await.unwrap();

        let listed = store.list().await.unwrap();
        assert!((listed[0].amount - 99.0).abs() < 0.01);
        assert_eq!(listed[0].description, "Achat vaisselle");
    }

    #[tokio::test]
    async fn update_unknown_id_errors() {
        let store = MemoryStore::new();
        let ghost = make_transaction("ghost", "2024-03-01", 10.0, Category::Supplies);
        let err = store.update(ghost).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::TransactionNotFound { id } if id == "ghost"
        ));
    }

    #[tokio::test]
    async fn delete_removes_the_record() {
        let store = MemoryStore::new();
        let created = store.create(draft("2024-03-01", 10.0)).await.unwrap();
        store.delete(&created.id).await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_unknown_id_errors() {
        let store = MemoryStore::new();
        let err = store.delete("missing").await.unwrap_err();
        assert!(matches!(err, LedgerError::TransactionNotFound { .. }));
    }

    #[tokio::test]
    async fn replace_all_swaps_the_ledger() {
        let store = MemoryStore::new();
        store.create(draft("2024-03-01", 10.0)).await.unwrap();

        let restored = vec![
            make_transaction("r1", "2023-10-01", 45.0, Category::Maintenance),
            make_transaction("r2", "2023-11-01", 80.0, Category::Utilities),
        ];
        store.replace_all(restored).await.unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, "r2");
    }
}
