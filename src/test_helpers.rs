use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::booking::BookingDetails;
use crate::domain::pricing::StayQuote;
use crate::domain::transaction::{Category, Transaction, TransactionDraft, TransactionKind};
use crate::error::Result;
use crate::ports::analyzer::{Narrative, NarrativeAnalyzer};
use crate::ports::store::TransactionStore;

type ListFn = Box<dyn Fn() -> Result<Vec<Transaction>> + Send + Sync>;
type CreateFn = Box<dyn Fn(&TransactionDraft) -> Result<Transaction> + Send + Sync>;
type UpdateFn = Box<dyn Fn(&Transaction) -> Result<Transaction> + Send + Sync>;
type DeleteFn = Box<dyn Fn(&str) -> Result<()> + Send + Sync>;
type ReplaceFn = Box<dyn Fn(&[Transaction]) -> Result<()> + Send + Sync>;
type AnalyzeFn = Box<dyn Fn(&[Transaction]) -> Result<Narrative> + Send + Sync>;

pub struct MockStore {
    list_fn: Mutex<ListFn>,
    create_fn: Mutex<CreateFn>,
    update_fn: Mutex<UpdateFn>,
    delete_fn: Mutex<DeleteFn>,
    replace_fn: Mutex<ReplaceFn>,
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockStore {
    pub fn new() -> Self {
        Self {
            list_fn: Mutex::new(Box::new(|| Ok(vec![]))),
            create_fn: Mutex::new(Box::new(|draft| {
                Ok(draft.clone().into_transaction("created-1".to_string()))
            })),
            update_fn: Mutex::new(Box::new(|transaction| Ok(transaction.clone()))),
            delete_fn: Mutex::new(Box::new(|_| Ok(()))),
            replace_fn: Mutex::new(Box::new(|_| Ok(()))),
        }
    }

    #[must_use]
    pub fn with_list(
        self,
        f: impl Fn() -> Result<Vec<Transaction>> + Send + Sync + 'static,
    ) -> Self {
        *self.list_fn.lock().unwrap() = Box::new(f);
        self
    }

    #[must_use]
    pub fn with_create(
        self,
        f: impl Fn(&TransactionDraft) -> Result<Transaction> + Send + Sync + 'static,
    ) -> Self {
        *self.create_fn.lock().unwrap() = Box::new(f);
        self
    }

    #[must_use]
    pub fn with_update(
        self,
        f: impl Fn(&Transaction) -> Result<Transaction> + Send + Sync + 'static,
    ) -> Self {
        *self.update_fn.lock().unwrap() = Box::new(f);
        self
    }

    #[must_use]
    pub fn with_delete(self, f: impl Fn(&str) -> Result<()> + Send + Sync + 'static) -> Self {
        *self.delete_fn.lock().unwrap() = Box::new(f);
        self
    }

    #[must_use]
    pub fn with_replace(
        self,
        f: impl Fn(&[Transaction]) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        *self.replace_fn.lock().unwrap() = Box::new(f);
        self
    }
}

#[async_trait]
impl TransactionStore for MockStore {
    async fn list(&self) -> Result<Vec<Transaction>> {
        let f = self.list_fn.lock().unwrap();
        f()
    }

    async fn create(&self, draft: TransactionDraft) -> Result<Transaction> {
        let f = self.create_fn.lock().unwrap();
        f(&draft)
    }

    async fn update(&self, transaction: Transaction) -> Result<Transaction> {
        let f = self.update_fn.lock().unwrap();
        f(&transaction)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let f = self.delete_fn.lock().unwrap();
        f(id)
    }

    async fn replace_all(&self, transactions: Vec<Transaction>) -> Result<()> {
        let f = self.replace_fn.lock().unwrap();
        f(&transactions)
    }
}

pub struct MockAnalyzer {
    analyze_fn: Mutex<AnalyzeFn>,
}

impl Default for MockAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAnalyzer {
    pub fn new() -> Self {
        Self {
            analyze_fn: Mutex::new(Box::new(|_| {
                Ok(Narrative {
                    title: "Analyse de test".into(),
                    content: "Le cash flow est stable.".into(),
                })
            })),
        }
    }

    #[must_use]
    pub fn with_analyze(
        self,
        f: impl Fn(&[Transaction]) -> Result<Narrative> + Send + Sync + 'static,
    ) -> Self {
        *self.analyze_fn.lock().unwrap() = Box::new(f);
        self
    }
}

#[async_trait]
impl NarrativeAnalyzer for MockAnalyzer {
    async fn analyze(&self, transactions: &[Transaction]) -> Result<Narrative> {
        let f = self.analyze_fn.lock().unwrap();
        f(transactions)
    }
}

// --- Factory functions ---

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// Booking defaults matching the stock pricing configuration.
pub fn template() -> BookingDetails {
    BookingDetails {
        adults: 2,
        children: 0,
        nights: 2,
        nightly_gross: 0.0,
        fee_rate_pct: 3.0,
        tax_rate_pct: 17.2,
        water_per_night: 2.0,
        electricity_per_night: 3.5,
    }
}

pub fn make_transaction(id: &str, day: &str, amount: f64, category: Category) -> Transaction {
    Transaction {
        id: id.to_string(),
        date: date(day),
        amount,
        description: "Dépense gîte".to_string(),
        category,
        kind: TransactionKind::Expense,
        booking: None,
    }
}

pub fn make_income_transaction(
    id: &str,
    day: &str,
    amount: f64,
    category: Category,
) -> Transaction {
    Transaction {
        id: id.to_string(),
        date: date(day),
        amount,
        description: "Recette gîte".to_string(),
        category,
        kind: TransactionKind::Income,
        booking: None,
    }
}

/// Rent income with the structured stay attached; the amount is the net
/// computed from the stock rates.
pub fn make_booking_transaction(
    id: &str,
    day: &str,
    nightly_gross: f64,
    nights: u32,
) -> Transaction {
    let details = BookingDetails {
        nights,
        nightly_gross,
        ..template()
    };
    let amount = StayQuote::compute(&details).final_net;
    Transaction {
        id: id.to_string(),
        date: date(day),
        amount,
        description: details.stay_label(),
        category: Category::Rent,
        kind: TransactionKind::Income,
        booking: Some(details),
    }
}

impl Transaction {
    #[must_use]
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }
}
