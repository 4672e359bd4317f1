use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};
use url::Url;
use uuid::Uuid;

use crate::config::types::ApiConfig;
use crate::domain::annotation;
use crate::domain::transaction::{
    Category, Transaction, TransactionDraft, TransactionKind, sort_newest_first,
};
use crate::error::{LedgerError, Result};
use crate::ports::cache::SnapshotCache;
use crate::ports::store::TransactionStore;

const SNAPSHOT_KEY: &str = "transactions";

/// Remote ledger behind the site's serverless functions. Rows travel in the
/// six-column shape the functions store verbatim, so booking parameters are
/// folded into the description as a bracketed annotation on the way out and
/// lifted back into the structured sub-record on the way in.
///
/// Reads are cached for a short TTL. Writes are optimistic: the mutated
/// record is returned immediately and a failed push is only logged, which
/// keeps the server usable when the backend naps.
pub struct HttpStore {
    http: Client,
    base_url: String,
    cache: Arc<dyn SnapshotCache>,
    snapshot_ttl: Duration,
}

impl std::fmt::Debug for HttpStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpStore")
            .field("http", &self.http)
            .field("base_url", &self.base_url)
            .field("snapshot_ttl", &self.snapshot_ttl)
            .finish_non_exhaustive()
    }
}

impl HttpStore {
    pub fn new(config: &ApiConfig, cache: Arc<dyn SnapshotCache>) -> Result<Self> {
        Url::parse(&config.base_url)?;
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            cache,
            snapshot_ttl: Duration::from_secs(config.snapshot_ttl_secs),
        })
    }

    async fn fetch_rows(&self) -> Result<Vec<WireRow>> {
        let url = format!("{}/getTransactions", self.base_url);
        debug!(url = %url, "Fetching ledger snapshot");

        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LedgerError::Store {
                reason: format!("getTransactions returned HTTP {status}"),
            });
        }

        let body = response.text().await?;
        trace!(body_len = body.len(), "Ledger snapshot received");
        serde_json::from_str(&body).map_err(|e| LedgerError::Store {
            reason: format!("getTransactions JSON parse error: {e}"),
        })
    }

    /// Pushes a mutation without failing the caller. The cache is
    /// invalidated by the caller either way, so the next read re-syncs.
    async fn push<B: Serialize + Sync>(&self, method: Method, function: &str, body: &B) {
        let url = format!("{}/{function}", self.base_url);
        debug!(url = %url, "Ledger API mutation");

        match self.http.request(method, &url).json(body).send().await {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => warn!(
                function,
                status = %response.status(),
                "Ledger API rejected the mutation"
            ),
            Err(err) => warn!(
                function,
                error = %err,
                "Ledger API unreachable, change not pushed"
            ),
        }
    }
}

#[async_trait]
impl TransactionStore for HttpStore {
    async fn list(&self) -> Result<Vec<Transaction>> {
        if let Some(cached) = self.cache.get(SNAPSHOT_KEY) {
            debug!("Cache hit for ledger snapshot");
            if let Ok(snapshot) = serde_json::from_str::<Vec<Transaction>>(&cached) {
                return Ok(snapshot);
            }
        }

        let rows = self.fetch_rows().await?;
        let mut transactions = rows
            .into_iter()
            .map(WireRow::into_transaction)
            .collect::<Result<Vec<_>>>()?;
        sort_newest_first(&mut transactions);

        if let Ok(serialized) = serde_json::to_string(&transactions) {
            self.cache.set(SNAPSHOT_KEY, &serialized, self.snapshot_ttl);
        }

        Ok(transactions)
    }

    async fn create(&self, draft: TransactionDraft) -> Result<Transaction> {
        let transaction = draft.into_transaction(Uuid::new_v4().to_string());
        let row = WireRow::from_transaction(&transaction);
        self.push(Method::POST, "addTransaction", &row).await;
        self.cache.invalidate(SNAPSHOT_KEY);
        Ok(transaction)
    }

    async fn update(&self, transaction: Transaction) -> Result<Transaction> {
        let row = WireRow::from_transaction(&transaction);
        self.push(Method::PUT, "updateTransaction", &row).await;
        self.cache.invalidate(SNAPSHOT_KEY);
        Ok(transaction)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.push(
            Method::DELETE,
            "deleteTransaction",
            &serde_json::json!({ "id": id }),
        )
        .await;
        self.cache.invalidate(SNAPSHOT_KEY);
        Ok(())
    }

    async fn replace_all(&self, transactions: Vec<Transaction>) -> Result<()> {
        // No bulk endpoint: clear the remote table row by row, then re-add.
        let existing = self.fetch_rows().await?;
        for row in &existing {
            self.push(
                Method::DELETE,
                "deleteTransaction",
                &serde_json::json!({ "id": row.id }),
            )
            .await;
        }
        for transaction in &transactions {
            let row = WireRow::from_transaction(transaction);
            self.push(Method::POST, "addTransaction", &row).await;
        }
        self.cache.invalidate(SNAPSHOT_KEY);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

/// One row as the serverless functions store it. The backing table keeps
/// dates as SQL dates and amounts as numerics, so both may come back as
/// strings depending on the driver.
#[derive(Debug, Serialize, Deserialize)]
struct WireRow {
    id: String,
    date: String,
    #[serde(deserialize_with = "lenient_amount")]
    amount: f64,
    description: String,
    category: Category,
    #[serde(rename = "type")]
    kind: TransactionKind,
}

impl WireRow {
    fn from_transaction(transaction: &Transaction) -> Self {
        let description = match &transaction.booking {
            Some(details) => {
                let mut encoded = annotation::encode(details);
                // A repeat marker trails the stay label; it survives after
                // the bracket segment.
                if let Some(tail) = transaction.description.strip_prefix(&details.stay_label()) {
                    encoded.push_str(tail);
                }
                encoded
            }
            None => transaction.description.clone(),
        };
        Self {
            id: transaction.id.clone(),
            date: transaction.date.format("%Y-%m-%d").to_string(),
            amount: transaction.amount,
            description,
            category: transaction.category,
            kind: transaction.kind,
        }
    }

    fn into_transaction(self) -> Result<Transaction> {
        let date = parse_wire_date(&self.date)?;
        let is_booking =
            self.category == Category::Rent && self.kind == TransactionKind::Income;

        let (description, booking) = if is_booking && self.description.contains('[') {
            let details = annotation::parse(&self.description);
            (annotation::display_label(&self.description), Some(details))
        } else {
            (self.description, None)
        };

        Ok(Transaction {
            id: self.id,
            date,
            amount: self.amount,
            description,
            category: self.category,
            kind: self.kind,
            booking,
        })
    }
}

/// Accepts both `2024-03-10` and the ISO timestamp a date column round-trips
/// as through JSON serialization.
fn parse_wire_date(raw: &str) -> Result<NaiveDate> {
    let day = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(|e| LedgerError::Store {
        reason: format!("invalid date '{raw}' in ledger row: {e}"),
    })
}

fn lenient_amount<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
