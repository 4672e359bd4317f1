use std::collections::{BTreeSet, HashMap};
use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{Days, NaiveDate};
use tokio::sync::RwLock;

use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolResult, Content, Implementation, ListResourceTemplatesResult, ListResourcesResult,
        PaginatedRequestParams, ProtocolVersion, RawResource, RawResourceTemplate,
        ReadResourceRequestParams, ReadResourceResult, Resource, ResourceContents,
        ResourceTemplate, ServerCapabilities, ServerInfo,
    },
    schemars,
    service::RequestContext,
    tool, tool_handler, tool_router,
};

use crate::config::types::PricingConfig;
use crate::domain::booking::BookingDetails;
use crate::domain::calendar::{self, DayStatus};
use crate::domain::export;
use crate::domain::form::{BookingForm, SaveOutcome};
use crate::domain::pricing::{StayQuote, weekly_gross};
use crate::domain::summary::{CategoryBreakdown, FinancialSummary, MonthlyBreakdown};
use crate::domain::transaction::{
    Category, Transaction, TransactionFilter, TransactionKind,
};
use crate::error::LedgerError;
use crate::ports::analyzer::NarrativeAnalyzer;
use crate::ports::store::TransactionStore;

// ---------- Resource Store ----------

/// Thread-safe store of ledger views exposed as MCP resources.
/// Keys are URIs like `ledger://calendar/2024-03`, values are text content.
#[derive(Clone, Default)]
pub struct ResourceStore {
    entries: Arc<RwLock<HashMap<String, ResourceEntry>>>,
}

#[derive(Clone)]
struct ResourceEntry {
    name: String,
    text: String,
}

impl ResourceStore {
    async fn insert(&self, uri: impl Into<String>, name: impl Into<String>, text: String) {
        self.entries.write().await.insert(
            uri.into(),
            ResourceEntry {
                name: name.into(),
                text,
            },
        );
    }

    async fn get(&self, uri: &str) -> Option<ResourceEntry> {
        self.entries.read().await.get(uri).cloned()
    }

    async fn list(&self) -> Vec<(String, String)> {
        self.entries
            .read()
            .await
            .iter()
            .map(|(uri, entry)| (uri.clone(), entry.name.clone()))
            .collect()
    }
}

impl std::fmt::Debug for ResourceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceStore").finish()
    }
}

// ---------- Tool parameter types ----------

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct RecordBookingParams {
    /// Check-in date (YYYY-MM-DD format).
    pub check_in: String,
    /// Number of nights. Either this or check_out must be given.
    #[schemars(range(min = 1, max = 365))]
    pub nights: Option<u32>,
    /// Check-out date (YYYY-MM-DD format), used instead of nights. The stay
    /// occupies the nights from check-in up to but not including this date.
    pub check_out: Option<String>,
    /// Gross rate per night in euros, before fees, tax, and utilities.
    pub nightly_gross: f64,
    /// Adults in the party, 1-4 (default from the pricing configuration).
    #[schemars(range(min = 1, max = 4))]
    pub adults: Option<u32>,
    /// Children in the party, 0-3; the property sleeps at most 4 guests.
    #[schemars(range(min = 0, max = 3))]
    pub children: Option<u32>,
    /// Platform fee override, percent of the stay's gross.
    pub fee_rate_pct: Option<f64>,
    /// Tax rate override, percent applied to half of the stay's gross.
    pub tax_rate_pct: Option<f64>,
    /// Water charge override, euros per night.
    pub water_per_night: Option<f64>,
    /// Electricity charge override, euros per night.
    pub electricity_per_night: Option<f64>,
    /// Book the same stay on the same day of the following months
    /// (1 = just this stay, max 60).
    #[schemars(range(min = 1, max = 60))]
    pub repeat_months: Option<u32>,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct RecordTransactionParams {
    /// Entry date (YYYY-MM-DD format).
    pub date: String,
    /// Amount in euros. Stored positive; the kind carries the sign.
    pub amount: f64,
    /// Free-text description, e.g. "Réparation volet roulant".
    pub description: String,
    /// Category label: Loyer, Frais de Ménage, Caution, Entretien, Charges,
    /// Taxes, Consommables, Publicité, Investissement, Autre. Unknown labels
    /// land in Autre.
    pub category: String,
    /// "income" or "expense".
    pub kind: String,
    /// Repeat the entry on the same day of the following months
    /// (1 = just this entry, max 60).
    #[schemars(range(min = 1, max = 60))]
    pub repeat_months: Option<u32>,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct UpdateTransactionParams {
    /// Id of the record to update (see ledger_list_transactions).
    pub id: String,
    /// New date (YYYY-MM-DD format). For a booking this is the new check-in.
    pub date: Option<String>,
    /// New amount in euros. Plain entries only: booking amounts are derived
    /// from the stay parameters.
    pub amount: Option<f64>,
    /// New description. Plain entries only: booking labels are generated.
    pub description: Option<String>,
    /// New category label. Plain entries only.
    pub category: Option<String>,
    /// New kind, "income" or "expense". Plain entries only.
    pub kind: Option<String>,
    /// New stay length in nights. Bookings only.
    #[schemars(range(min = 1, max = 365))]
    pub nights: Option<u32>,
    /// New gross rate per night. Bookings only.
    pub nightly_gross: Option<f64>,
    /// Adults in the party, 1-4. Bookings only.
    #[schemars(range(min = 1, max = 4))]
    pub adults: Option<u32>,
    /// Children in the party, 0-3. Bookings only.
    #[schemars(range(min = 0, max = 3))]
    pub children: Option<u32>,
    /// Platform fee, percent of gross. Bookings only.
    pub fee_rate_pct: Option<f64>,
    /// Tax rate, percent of half the gross. Bookings only.
    pub tax_rate_pct: Option<f64>,
    /// Water charge, euros per night. Bookings only.
    pub water_per_night: Option<f64>,
    /// Electricity charge, euros per night. Bookings only.
    pub electricity_per_night: Option<f64>,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct DeleteTransactionParams {
    /// Id of the record to delete (see ledger_list_transactions).
    pub id: String,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct DuplicateTransactionParams {
    /// Id of the record to copy (see ledger_list_transactions).
    pub id: String,
    /// Date of the copy (YYYY-MM-DD format); defaults to the original's
    /// date. For a booking this is the copy's check-in.
    pub date: Option<String>,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct ListTransactionsParams {
    /// Restrict to one year, e.g. 2024.
    pub year: Option<i32>,
    /// Restrict to one month (1-12). Usually combined with year.
    #[schemars(range(min = 1, max = 12))]
    pub month: Option<u32>,
    /// Restrict to one category label, e.g. "Entretien".
    pub category: Option<String>,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct AvailabilityParams {
    /// Calendar year, e.g. 2024.
    pub year: i32,
    /// Calendar month (1-12).
    #[schemars(range(min = 1, max = 12))]
    pub month: u32,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct CheckRangeParams {
    /// Candidate check-in date (YYYY-MM-DD format).
    pub check_in: String,
    /// Length of the candidate stay in nights.
    #[schemars(range(min = 1, max = 365))]
    pub nights: u32,
    /// Booking id whose own nights should not count as taken. Pass this
    /// when testing a new date for an existing stay.
    pub exclude_id: Option<String>,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct StayQuoteParams {
    /// Gross rate per night in euros.
    pub nightly_gross: f64,
    /// Length of the stay in nights.
    #[schemars(range(min = 1, max = 365))]
    pub nights: u32,
    /// Adults in the party, 1-4.
    #[schemars(range(min = 1, max = 4))]
    pub adults: Option<u32>,
    /// Children in the party, 0-3.
    #[schemars(range(min = 0, max = 3))]
    pub children: Option<u32>,
    /// Platform fee override, percent of the stay's gross.
    pub fee_rate_pct: Option<f64>,
    /// Tax rate override, percent applied to half of the stay's gross.
    pub tax_rate_pct: Option<f64>,
    /// Water charge override, euros per night.
    pub water_per_night: Option<f64>,
    /// Electricity charge override, euros per night.
    pub electricity_per_night: Option<f64>,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct SummaryParams {
    /// Restrict to one year, e.g. 2024.
    pub year: Option<i32>,
    /// Restrict to one month (1-12). Usually combined with year.
    #[schemars(range(min = 1, max = 12))]
    pub month: Option<u32>,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct ExportCsvParams {
    /// Restrict to one year, e.g. 2024.
    pub year: Option<i32>,
    /// Restrict to one month (1-12). Usually combined with year.
    #[schemars(range(min = 1, max = 12))]
    pub month: Option<u32>,
    /// Restrict to one category label, e.g. "Charges".
    pub category: Option<String>,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct RestoreJsonParams {
    /// The JSON array produced by ledger_backup_json. Replaces the whole
    /// ledger.
    pub json: String,
}

// ---------- Helpers ----------

fn parse_date_arg(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| format!("Invalid date '{raw}': expected YYYY-MM-DD."))
}

fn parse_kind_arg(raw: &str) -> Option<TransactionKind> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "income" | "recette" => Some(TransactionKind::Income),
        "expense" | "dépense" | "depense" => Some(TransactionKind::Expense),
        _ => None,
    }
}

/// One listing line per record: date, signed amount, category, description,
/// and the id the update/delete tools need.
fn format_line(transaction: &Transaction) -> String {
    let sign = match transaction.kind {
        TransactionKind::Income => '+',
        TransactionKind::Expense => '-',
    };
    format!(
        "{}  {sign}{:.2}€  {}  {}  [{}]",
        transaction.date,
        transaction.amount,
        transaction.category,
        transaction.description,
        transaction.id,
    )
}

fn overlap_rejection(conflicts: &[NaiveDate]) -> CallToolResult {
    let nights = conflicts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    CallToolResult::error(vec![Content::text(format!(
        "Booking rejected: night(s) already taken: {nights}. Pick other dates or shorten the stay; ledger_availability shows the free ranges."
    ))])
}

// ---------- Server ----------

#[derive(Clone)]
pub struct LedgerMcpServer {
    store: Arc<dyn TransactionStore>,
    analyzer: Arc<dyn NarrativeAnalyzer>,
    template: BookingDetails,
    tool_router: ToolRouter<Self>,
    resources: ResourceStore,
}

#[tool_router]
impl LedgerMcpServer {
    pub fn new(
        store: Arc<dyn TransactionStore>,
        analyzer: Arc<dyn NarrativeAnalyzer>,
        pricing: &PricingConfig,
    ) -> Self {
        Self {
            store,
            analyzer,
            template: pricing.booking_template(),
            tool_router: Self::tool_router(),
            resources: ResourceStore::default(),
        }
    }

    /// Record a stay: derives the net amount from the stay parameters and
    /// refuses any night that is already booked.
    #[tool(
        name = "ledger_record_booking",
        description = "Record a rental stay. Give check-in plus nights (or check-out) and the gross nightly rate; the net income is derived (platform fee, tax on half the gross, per-night utilities) and persisted. Rejected if any night of the stay is already booked.",
        annotations(read_only_hint = false, open_world_hint = false)
    )]
    #[allow(clippy::too_many_lines)]
    async fn ledger_record_booking(
        &self,
        Parameters(params): Parameters<RecordBookingParams>,
    ) -> Result<CallToolResult, McpError> {
        let check_in = match parse_date_arg(&params.check_in) {
            Ok(date) => date,
            Err(reason) => return Ok(CallToolResult::error(vec![Content::text(reason)])),
        };
        let nights = match (params.nights, params.check_out.as_deref()) {
            (Some(nights), _) => nights.max(1),
            (None, Some(raw)) => {
                let check_out = match parse_date_arg(raw) {
                    Ok(date) => date,
                    Err(reason) => return Ok(CallToolResult::error(vec![Content::text(reason)])),
                };
                let span = (check_out - check_in).num_days();
                if span < 1 {
                    return Ok(CallToolResult::error(vec![Content::text(format!(
                        "Check-out {check_out} must fall after check-in {check_in}."
                    ))]));
                }
                u32::try_from(span).unwrap_or(u32::MAX)
            }
            (None, None) => {
                return Ok(CallToolResult::error(vec![Content::text(
                    "Give either nights or check_out to size the stay.".to_string(),
                )]));
            }
        };

        let mut form = BookingForm::new_reservation(check_in, &self.template);
        form.nights = nights;
        form.amount = params.nightly_gross.to_string();
        if let Some(adults) = params.adults {
            form.set_adults(adults);
        }
        if let Some(children) = params.children {
            form.set_children(children);
        }
        if let Some(rate) = params.fee_rate_pct {
            form.fee_rate = rate.to_string();
        }
        if let Some(rate) = params.tax_rate_pct {
            form.tax_rate = rate.to_string();
        }
        if let Some(charge) = params.water_per_night {
            form.water_per_night = charge.to_string();
        }
        if let Some(charge) = params.electricity_per_night {
            form.electricity_per_night = charge.to_string();
        }
        form.repeat_months = params.repeat_months.unwrap_or(1);

        let existing = match self.store.list().await {
            Ok(transactions) => transactions,
            Err(e) => {
                return Ok(CallToolResult::error(vec![Content::text(format!(
                    "Could not load the ledger to check availability: {e}"
                ))]));
            }
        };

        match form.save(&existing) {
            SaveOutcome::Created(drafts) => {
                // The form gates its own range; repeated months re-use the
                // same nights in later months and are gated here, each
                // draft against the bookings plus the drafts before it.
                let mut booked = form.booked_nights(&existing);
                for draft in &drafts {
                    if let Some(details) = &draft.booking {
                        let conflicts =
                            calendar::conflicting_nights(draft.date, details.nights, &booked);
                        if !conflicts.is_empty() {
                            return Ok(overlap_rejection(&conflicts));
                        }
                        booked.extend(calendar::night_range(draft.date, details.nights));
                    }
                }

                let mut created = Vec::with_capacity(drafts.len());
                for draft in drafts {
                    match self.store.create(draft).await {
                        Ok(transaction) => created.push(transaction),
                        Err(e) => {
                            return Ok(CallToolResult::error(vec![Content::text(format!(
                                "Could not save the booking: {e}"
                            ))]));
                        }
                    }
                }

                let mut text = String::new();
                let _ = writeln!(text, "Booking saved, {} record(s):", created.len());
                for transaction in &created {
                    let _ = writeln!(text, "- {}", format_line(transaction));
                }
                let _ = writeln!(text);
                let _ = write!(text, "{}", form.quote());
                Ok(CallToolResult::success(vec![Content::text(text)]))
            }
            SaveOutcome::RejectedOverlap { conflicts } => Ok(overlap_rejection(&conflicts)),
            SaveOutcome::Updated(_) => unreachable!("a new booking form has no editing id"),
        }
    }

    /// Record a plain ledger entry (anything that is not a stay).
    #[tool(
        name = "ledger_record_transaction",
        description = "Record a plain income or expense entry: maintenance, utilities, taxes, supplies... Amounts are stored positive, the kind carries the sign. Rent income must go through ledger_record_booking instead so the calendar stays consistent.",
        annotations(read_only_hint = false, open_world_hint = false)
    )]
    async fn ledger_record_transaction(
        &self,
        Parameters(params): Parameters<RecordTransactionParams>,
    ) -> Result<CallToolResult, McpError> {
        let date = match parse_date_arg(&params.date) {
            Ok(date) => date,
            Err(reason) => return Ok(CallToolResult::error(vec![Content::text(reason)])),
        };
        let Some(kind) = parse_kind_arg(&params.kind) else {
            return Ok(CallToolResult::error(vec![Content::text(format!(
                "Unknown kind '{}': use \"income\" or \"expense\".",
                params.kind
            ))]));
        };
        let category = Category::from_label(&params.category);
        if category == Category::Rent && kind == TransactionKind::Income {
            return Ok(CallToolResult::error(vec![Content::text(
                "Rent income is a booking: use ledger_record_booking so the stay lands on the calendar and the net is derived from the rates.".to_string(),
            )]));
        }

        let mut form = BookingForm::new(date, &self.template);
        form.amount = params.amount.to_string();
        form.description = params.description;
        form.category = category;
        form.kind = kind;
        form.repeat_months = params.repeat_months.unwrap_or(1);

        match form.save(&[]) {
            SaveOutcome::Created(drafts) => {
                let mut created = Vec::with_capacity(drafts.len());
                for draft in drafts {
                    match self.store.create(draft).await {
                        Ok(transaction) => created.push(transaction),
                        Err(e) => {
                            return Ok(CallToolResult::error(vec![Content::text(format!(
                                "Could not save the entry: {e}"
                            ))]));
                        }
                    }
                }
                let mut text = String::new();
                let _ = writeln!(text, "Recorded {} transaction(s):", created.len());
                for transaction in &created {
                    let _ = writeln!(text, "- {}", format_line(transaction));
                }
                Ok(CallToolResult::success(vec![Content::text(text)]))
            }
            SaveOutcome::RejectedOverlap { .. } | SaveOutcome::Updated(_) => {
                unreachable!("plain entries neither collide nor edit")
            }
        }
    }

    /// Update a record by id. Bookings re-derive their net and re-check the
    /// calendar; plain entries patch fields directly.
    #[tool(
        name = "ledger_update_transaction",
        description = "Update a transaction by id. For bookings, change the stay parameters (check-in, nights, rates, party); the net amount is re-derived and the new dates are re-checked against the calendar, ignoring the booking's own nights. For plain entries, change date, amount, description, category, or kind.",
        annotations(read_only_hint = false, open_world_hint = false)
    )]
    #[allow(clippy::too_many_lines)]
    async fn ledger_update_transaction(
        &self,
        Parameters(params): Parameters<UpdateTransactionParams>,
    ) -> Result<CallToolResult, McpError> {
        let transactions = match self.store.list().await {
            Ok(transactions) => transactions,
            Err(e) => {
                return Ok(CallToolResult::error(vec![Content::text(format!(
                    "Could not load the ledger: {e}"
                ))]));
            }
        };
        let Some(current) = transactions.iter().find(|t| t.id == params.id) else {
            return Ok(CallToolResult::error(vec![Content::text(format!(
                "No transaction with id '{}'. Use ledger_list_transactions to look up ids.",
                params.id
            ))]));
        };

        if current.is_booking() {
            if params.category.is_some() || params.kind.is_some() {
                return Ok(CallToolResult::error(vec![Content::text(
                    "A booking stays a rent income record. Delete it and record a new entry to change its nature.".to_string(),
                )]));
            }
            if params.amount.is_some() {
                return Ok(CallToolResult::error(vec![Content::text(
                    "Booking amounts are derived from the stay: adjust nightly_gross, nights, or the rates instead.".to_string(),
                )]));
            }
            if params.description.is_some() {
                return Ok(CallToolResult::error(vec![Content::text(
                    "Booking descriptions are generated from the stay parameters.".to_string(),
                )]));
            }

            let mut form = BookingForm::edit(current, &self.template);
            if let Some(raw) = &params.date {
                match parse_date_arg(raw) {
                    Ok(date) => form.date = date,
                    Err(reason) => {
                        return Ok(CallToolResult::error(vec![Content::text(reason)]));
                    }
                }
            }
            if let Some(nights) = params.nights {
                form.nights = nights.max(1);
            }
            if let Some(gross) = params.nightly_gross {
                form.amount = gross.to_string();
            }
            if let Some(adults) = params.adults {
                form.set_adults(adults);
            }
            if let Some(children) = params.children {
                form.set_children(children);
            }
            if let Some(rate) = params.fee_rate_pct {
                form.fee_rate = rate.to_string();
            }
            if let Some(rate) = params.tax_rate_pct {
                form.tax_rate = rate.to_string();
            }
            if let Some(charge) = params.water_per_night {
                form.water_per_night = charge.to_string();
            }
            if let Some(charge) = params.electricity_per_night {
                form.electricity_per_night = charge.to_string();
            }

            match form.save(&transactions) {
                SaveOutcome::Updated(updated) => match self.store.update(updated).await {
                    Ok(stored) => {
                        let mut text = String::new();
                        let _ = writeln!(text, "Booking updated:");
                        let _ = writeln!(text, "- {}", format_line(&stored));
                        let _ = writeln!(text);
                        let _ = write!(text, "{}", form.quote());
                        Ok(CallToolResult::success(vec![Content::text(text)]))
                    }
                    Err(e) => Ok(CallToolResult::error(vec![Content::text(format!(
                        "Could not update '{}': {e}",
                        params.id
                    ))])),
                },
                SaveOutcome::RejectedOverlap { conflicts } => Ok(overlap_rejection(&conflicts)),
                SaveOutcome::Created(_) => unreachable!("editing keeps the id"),
            }
        } else {
            if params.nights.is_some()
                || params.nightly_gross.is_some()
                || params.adults.is_some()
                || params.children.is_some()
                || params.fee_rate_pct.is_some()
                || params.tax_rate_pct.is_some()
                || params.water_per_night.is_some()
                || params.electricity_per_night.is_some()
            {
                return Ok(CallToolResult::error(vec![Content::text(format!(
                    "'{}' is not a booking; stay parameters do not apply. Set date, amount, description, category, or kind.",
                    params.id
                ))]));
            }

            let mut updated = current.clone();
            if let Some(raw) = &params.date {
                match parse_date_arg(raw) {
                    Ok(date) => updated.date = date,
                    Err(reason) => {
                        return Ok(CallToolResult::error(vec![Content::text(reason)]));
                    }
                }
            }
            if let Some(amount) = params.amount {
                updated.amount = amount.abs();
            }
            if let Some(description) = params.description {
                updated.description = description;
            }
            if let Some(label) = &params.category {
                updated.category = Category::from_label(label);
            }
            if let Some(raw) = &params.kind {
                match parse_kind_arg(raw) {
                    Some(kind) => updated.kind = kind,
                    None => {
                        return Ok(CallToolResult::error(vec![Content::text(format!(
                            "Unknown kind '{raw}': use \"income\" or \"expense\"."
                        ))]));
                    }
                }
            }
            if updated.is_booking() {
                return Ok(CallToolResult::error(vec![Content::text(
                    "That change would turn the entry into rent income; record the stay with ledger_record_booking instead.".to_string(),
                )]));
            }

            match self.store.update(updated).await {
                Ok(stored) => {
                    let mut text = String::new();
                    let _ = writeln!(text, "Transaction updated:");
                    let _ = write!(text, "- {}", format_line(&stored));
                    Ok(CallToolResult::success(vec![Content::text(text)]))
                }
                Err(e) => Ok(CallToolResult::error(vec![Content::text(format!(
                    "Could not update '{}': {e}",
                    params.id
                ))])),
            }
        }
    }

    /// Delete a record by id.
    #[tool(
        name = "ledger_delete_transaction",
        description = "Delete a transaction by id. Deleting a booking frees its nights on the calendar.",
        annotations(read_only_hint = false, open_world_hint = false)
    )]
    async fn ledger_delete_transaction(
        &self,
        Parameters(params): Parameters<DeleteTransactionParams>,
    ) -> Result<CallToolResult, McpError> {
        match self.store.delete(&params.id).await {
            Ok(()) => Ok(CallToolResult::success(vec![Content::text(format!(
                "Deleted transaction '{}'.",
                params.id
            ))])),
            Err(LedgerError::TransactionNotFound { id }) => {
                Ok(CallToolResult::error(vec![Content::text(format!(
                    "No transaction with id '{id}'. Use ledger_list_transactions to look up ids."
                ))]))
            }
            Err(e) => Ok(CallToolResult::error(vec![Content::text(format!(
                "Could not delete '{}': {e}",
                params.id
            ))])),
        }
    }

    /// Copy a record, optionally onto another date.
    #[tool(
        name = "ledger_duplicate_transaction",
        description = "Copy an existing transaction into a new record, optionally on another date. A booking copy re-derives its net from the stay parameters and is rejected if any of its nights is already taken; the original's own nights count as taken.",
        annotations(read_only_hint = false, open_world_hint = false)
    )]
    async fn ledger_duplicate_transaction(
        &self,
        Parameters(params): Parameters<DuplicateTransactionParams>,
    ) -> Result<CallToolResult, McpError> {
        let transactions = match self.store.list().await {
            Ok(transactions) => transactions,
            Err(e) => {
                return Ok(CallToolResult::error(vec![Content::text(format!(
                    "Could not load the ledger: {e}"
                ))]));
            }
        };
        let Some(original) = transactions.iter().find(|t| t.id == params.id) else {
            return Ok(CallToolResult::error(vec![Content::text(format!(
                "No transaction with id '{}'. Use ledger_list_transactions to look up ids.",
                params.id
            ))]));
        };

        let mut form = BookingForm::duplicate(original, &self.template);
        if let Some(raw) = &params.date {
            match parse_date_arg(raw) {
                Ok(date) => form.date = date,
                Err(reason) => return Ok(CallToolResult::error(vec![Content::text(reason)])),
            }
        }

        match form.save(&transactions) {
            SaveOutcome::Created(drafts) => {
                let mut created = Vec::with_capacity(drafts.len());
                for draft in drafts {
                    match self.store.create(draft).await {
                        Ok(transaction) => created.push(transaction),
                        Err(e) => {
                            return Ok(CallToolResult::error(vec![Content::text(format!(
                                "Could not save the copy: {e}"
                            ))]));
                        }
                    }
                }
                let mut text = String::new();
                let _ = writeln!(text, "Copied '{}':", params.id);
                for transaction in &created {
                    let _ = writeln!(text, "- {}", format_line(transaction));
                }
                if form.is_booking() {
                    let _ = writeln!(text);
                    let _ = write!(text, "{}", form.quote());
                }
                Ok(CallToolResult::success(vec![Content::text(text)]))
            }
            SaveOutcome::RejectedOverlap { conflicts } => Ok(overlap_rejection(&conflicts)),
            SaveOutcome::Updated(_) => unreachable!("a duplicate has no editing id"),
        }
    }

    /// List the ledger, newest first, optionally filtered.
    #[tool(
        name = "ledger_list_transactions",
        description = "List transactions newest first, optionally filtered by year, month, and category label. Each line carries the record id used by the update and delete tools, and the listing ends with the totals of the filtered view.",
        annotations(read_only_hint = true, open_world_hint = false)
    )]
    async fn ledger_list_transactions(
        &self,
        Parameters(params): Parameters<ListTransactionsParams>,
    ) -> Result<CallToolResult, McpError> {
        let transactions = match self.store.list().await {
            Ok(transactions) => transactions,
            Err(e) => {
                return Ok(CallToolResult::error(vec![Content::text(format!(
                    "Could not load the ledger: {e}"
                ))]));
            }
        };
        let filter = TransactionFilter {
            year: params.year,
            month: params.month,
            category: params.category.as_deref().map(Category::from_label),
        };
        let filtered: Vec<Transaction> = transactions
            .into_iter()
            .filter(|t| filter.matches(t))
            .collect();

        let mut text = String::new();
        if filtered.is_empty() {
            text.push_str("No transactions match.");
        } else {
            let _ = writeln!(text, "{} transaction(s):", filtered.len());
            for transaction in &filtered {
                let _ = writeln!(text, "{}", format_line(transaction));
            }
            let _ = writeln!(text);
            let _ = write!(text, "{}", FinancialSummary::compute(&filtered));
        }
        self.resources
            .insert("ledger://transactions", "Ledger transactions", text.clone())
            .await;
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }

    /// Month view of the booking calendar.
    #[tool(
        name = "ledger_availability",
        description = "Show one month of the booking calendar: a Monday-first grid with booked nights marked, the occupancy rate, and the free date ranges.",
        annotations(read_only_hint = true, open_world_hint = false)
    )]
    async fn ledger_availability(
        &self,
        Parameters(params): Parameters<AvailabilityParams>,
    ) -> Result<CallToolResult, McpError> {
        let transactions = match self.store.list().await {
            Ok(transactions) => transactions,
            Err(e) => {
                return Ok(CallToolResult::error(vec![Content::text(format!(
                    "Could not load the ledger: {e}"
                ))]));
            }
        };
        let booked = calendar::booked_nights(&transactions, None);
        let grid = match calendar::month_grid(params.year, params.month, &booked, &BTreeSet::new())
        {
            Ok(grid) => grid,
            Err(e) => {
                return Ok(CallToolResult::error(vec![Content::text(format!(
                    "{e}. The month must be 1-12."
                ))]));
            }
        };
        let occupancy = match calendar::month_occupancy(params.year, params.month, &booked) {
            Ok(occupancy) => occupancy,
            Err(e) => {
                return Ok(CallToolResult::error(vec![Content::text(format!(
                    "{e}. The month must be 1-12."
                ))]));
            }
        };

        // Consecutive free days collapse into ranges; the grid is iterated
        // in date order so a run breaks exactly on a booked night.
        let mut gaps: Vec<(NaiveDate, u32)> = Vec::new();
        for cell in grid.days.iter().flatten() {
            if cell.status == DayStatus::Free {
                match gaps.last_mut() {
                    Some((start, len))
                        if start.checked_add_days(Days::new(u64::from(*len)))
                            == Some(cell.date) =>
                    {
                        *len += 1;
                    }
                    _ => gaps.push((cell.date, 1)),
                }
            }
        }

        let mut text = grid.to_string();
        let _ = write!(
            text,
            "\n\nOccupancy: {}/{} night(s) booked ({:.0}%).",
            occupancy.nights_booked, occupancy.days_in_month, occupancy.occupancy_rate
        );
        if !gaps.is_empty() {
            let _ = write!(text, "\nFree ranges:");
            for (start, len) in &gaps {
                let _ = write!(text, "\n- {start} + {len} night(s)");
            }
        }

        let uri = format!("ledger://calendar/{:04}-{:02}", params.year, params.month);
        let name = format!("Calendar {:04}-{:02}", params.year, params.month);
        self.resources.insert(uri, name, text.clone()).await;
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }

    /// Test a candidate stay against the booked nights.
    #[tool(
        name = "ledger_check_range",
        description = "Check whether a candidate stay (check-in + nights) is free. Names the clashing nights when it is not. Pass exclude_id to ignore an existing booking's own nights when re-scheduling it.",
        annotations(read_only_hint = true, open_world_hint = false)
    )]
    async fn ledger_check_range(
        &self,
        Parameters(params): Parameters<CheckRangeParams>,
    ) -> Result<CallToolResult, McpError> {
        let check_in = match parse_date_arg(&params.check_in) {
            Ok(date) => date,
            Err(reason) => return Ok(CallToolResult::error(vec![Content::text(reason)])),
        };
        let transactions = match self.store.list().await {
            Ok(transactions) => transactions,
            Err(e) => {
                return Ok(CallToolResult::error(vec![Content::text(format!(
                    "Could not load the ledger: {e}"
                ))]));
            }
        };
        let booked = calendar::booked_nights(&transactions, params.exclude_id.as_deref());
        let nights = params.nights.max(1);
        let conflicts = calendar::conflicting_nights(check_in, nights, &booked);

        let text = if conflicts.is_empty() {
            let check_out = check_in
                .checked_add_days(Days::new(u64::from(nights)))
                .unwrap_or(check_in);
            format!("Free: {check_in} + {nights} night(s), check-out {check_out}.")
        } else {
            let nights_taken = conflicts
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "Occupied: {} of {} night(s) clash: {nights_taken}.",
                conflicts.len(),
                nights
            )
        };
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }

    /// Net-revenue preview for a stay. Persists nothing.
    #[tool(
        name = "ledger_stay_quote",
        description = "Compute the net revenue of a stay from the gross nightly rate: platform fee, tax on half the gross, water and electricity per night. Pure preview, nothing is persisted.",
        annotations(read_only_hint = true, open_world_hint = false)
    )]
    async fn ledger_stay_quote(
        &self,
        Parameters(params): Parameters<StayQuoteParams>,
    ) -> Result<CallToolResult, McpError> {
        let mut details = self.template.clone();
        details.nights = params.nights.max(1);
        details.nightly_gross = params.nightly_gross;
        if let Some(adults) = params.adults {
            details.set_adults(adults);
        }
        if let Some(children) = params.children {
            details.set_children(children);
        }
        if let Some(rate) = params.fee_rate_pct {
            details.fee_rate_pct = rate;
        }
        if let Some(rate) = params.tax_rate_pct {
            details.tax_rate_pct = rate;
        }
        if let Some(charge) = params.water_per_night {
            details.water_per_night = charge;
        }
        if let Some(charge) = params.electricity_per_night {
            details.electricity_per_night = charge;
        }

        let quote = StayQuote::compute(&details);
        let mut text = String::new();
        let _ = writeln!(text, "{}", details.stay_label());
        let _ = writeln!(text, "{quote}");
        let _ = write!(
            text,
            "A full week at this rate grosses {:.2}€.",
            weekly_gross(details.nightly_gross)
        );
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }

    /// Totals, monthly table, and category breakdown.
    #[tool(
        name = "ledger_summary",
        description = "Financial summary: income/expense totals and net balance, month-by-month profitability, and the per-category volume breakdown (utility and tax bills grouped by kind). Optionally restricted to a year or month.",
        annotations(read_only_hint = true, open_world_hint = false)
    )]
    async fn ledger_summary(
        &self,
        Parameters(params): Parameters<SummaryParams>,
    ) -> Result<CallToolResult, McpError> {
        let transactions = match self.store.list().await {
            Ok(transactions) => transactions,
            Err(e) => {
                return Ok(CallToolResult::error(vec![Content::text(format!(
                    "Could not load the ledger: {e}"
                ))]));
            }
        };
        let filter = TransactionFilter {
            year: params.year,
            month: params.month,
            category: None,
        };
        let filtered: Vec<Transaction> = transactions
            .into_iter()
            .filter(|t| filter.matches(t))
            .collect();

        let summary = FinancialSummary::compute(&filtered);
        let monthly = MonthlyBreakdown::compute(&filtered);
        let categories = CategoryBreakdown::compute(&filtered);

        let mut text = String::new();
        let _ = writeln!(text, "{summary}");
        let _ = writeln!(text);
        let _ = write!(text, "{monthly}");
        let _ = writeln!(text);
        let _ = write!(text, "{categories}");
        self.resources
            .insert("ledger://summary", "Financial summary", text.clone())
            .await;
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }

    /// Spreadsheet-ready CSV of the ledger.
    #[tool(
        name = "ledger_export_csv",
        description = "Export the ledger as CSV: semicolon separated, decimal comma, income and expense in separate columns, newest first. Optionally filtered by year, month, or category. Opens directly in French spreadsheet locales.",
        annotations(read_only_hint = true, open_world_hint = false)
    )]
    async fn ledger_export_csv(
        &self,
        Parameters(params): Parameters<ExportCsvParams>,
    ) -> Result<CallToolResult, McpError> {
        let transactions = match self.store.list().await {
            Ok(transactions) => transactions,
            Err(e) => {
                return Ok(CallToolResult::error(vec![Content::text(format!(
                    "Could not load the ledger: {e}"
                ))]));
            }
        };
        let filter = TransactionFilter {
            year: params.year,
            month: params.month,
            category: params.category.as_deref().map(Category::from_label),
        };
        let filtered: Vec<Transaction> = transactions
            .into_iter()
            .filter(|t| filter.matches(t))
            .collect();
        let csv = export::to_csv(&filtered);
        self.resources
            .insert("ledger://export/csv", "CSV export", csv.clone())
            .await;
        Ok(CallToolResult::success(vec![Content::text(csv)]))
    }

    /// Full-fidelity JSON backup of the ledger.
    #[tool(
        name = "ledger_backup_json",
        description = "Dump the whole ledger as a JSON array, ids and structured stay parameters included. Feed the document back to ledger_restore_json to restore it.",
        annotations(read_only_hint = true, open_world_hint = false)
    )]
    async fn ledger_backup_json(&self) -> Result<CallToolResult, McpError> {
        let transactions = match self.store.list().await {
            Ok(transactions) => transactions,
            Err(e) => {
                return Ok(CallToolResult::error(vec![Content::text(format!(
                    "Could not load the ledger: {e}"
                ))]));
            }
        };
        match export::to_json_backup(&transactions) {
            Ok(json) => {
                self.resources
                    .insert("ledger://export/json", "JSON backup", json.clone())
                    .await;
                Ok(CallToolResult::success(vec![Content::text(json)]))
            }
            Err(e) => Ok(CallToolResult::error(vec![Content::text(format!(
                "Could not serialize the backup: {e}"
            ))])),
        }
    }

    /// Replace the ledger with a backup document.
    #[tool(
        name = "ledger_restore_json",
        description = "Replace the whole ledger with the records of a JSON backup. Accepts documents from ledger_backup_json as well as older exports whose stay parameters live in the description text.",
        annotations(read_only_hint = false, open_world_hint = false)
    )]
    async fn ledger_restore_json(
        &self,
        Parameters(params): Parameters<RestoreJsonParams>,
    ) -> Result<CallToolResult, McpError> {
        match export::from_json_backup(&params.json) {
            Ok(records) => {
                let count = records.len();
                match self.store.replace_all(records).await {
                    Ok(()) => Ok(CallToolResult::success(vec![Content::text(format!(
                        "Restored {count} transaction(s); the previous contents were replaced."
                    ))])),
                    Err(e) => Ok(CallToolResult::error(vec![Content::text(format!(
                        "Restore failed: {e}. The store may be partially rewritten; run ledger_list_transactions to inspect it."
                    ))])),
                }
            }
            Err(e) => Ok(CallToolResult::error(vec![Content::text(format!(
                "Invalid backup document: {e}. Pass the JSON array produced by ledger_backup_json."
            ))])),
        }
    }

    /// Narrative financial analysis of the ledger.
    #[tool(
        name = "ledger_analyze",
        description = "Produce a short narrative analysis of the ledger (trends, notable costs, advice) via the configured analyzer. Degrades to a built-in notice when no analyzer API key is configured.",
        annotations(read_only_hint = true, open_world_hint = true)
    )]
    async fn ledger_analyze(&self) -> Result<CallToolResult, McpError> {
        let transactions = match self.store.list().await {
            Ok(transactions) => transactions,
            Err(e) => {
                return Ok(CallToolResult::error(vec![Content::text(format!(
                    "Could not load the ledger: {e}"
                ))]));
            }
        };
        match self.analyzer.analyze(&transactions).await {
            Ok(narrative) => {
                let text = format!("{}\n\n{}", narrative.title, narrative.content);
                self.resources
                    .insert("ledger://analysis", "Financial analysis", text.clone())
                    .await;
                Ok(CallToolResult::success(vec![Content::text(text)]))
            }
            Err(e) => Ok(CallToolResult::error(vec![Content::text(format!(
                "Analysis failed: {e}. Check the analyzer configuration (API key env var, base URL)."
            ))])),
        }
    }
}

// ---------- MCP Server Handler ----------

#[tool_handler]
impl ServerHandler for LedgerMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Rental income ledger for a gîte (furnished holiday rental): bookings, expenses, \
                 net-revenue quotes, availability, and exports.\n\
                 \n\
                 ## Recording\n\
                 - ledger_record_booking: check-in + nights (or check-out) + gross nightly rate; the net income is derived (platform fee, tax on half the gross, utilities) and the stay is rejected if any night is already taken\n\
                 - ledger_record_transaction: plain income/expense entries (maintenance, utilities, taxes...), with optional monthly repetition\n\
                 - ledger_update_transaction / ledger_delete_transaction: edit or remove by id; re-scheduling a booking re-checks the calendar, ignoring its own nights\n\
                 - ledger_duplicate_transaction: copy an entry by id, optionally onto another date; a booking copy re-checks the calendar\n\
                 \n\
                 ## Calendar\n\
                 - ledger_availability: month grid with booked nights, occupancy, and free ranges\n\
                 - ledger_check_range: test a candidate stay against the booked nights\n\
                 - ledger_stay_quote: net-revenue preview, nothing persisted\n\
                 \n\
                 ## Reporting\n\
                 - ledger_list_transactions: filter by year/month/category, newest first, with record ids\n\
                 - ledger_summary: totals, monthly profitability, category breakdown\n\
                 - ledger_analyze: short financial narrative from the configured analyzer\n\
                 \n\
                 ## Data\n\
                 - ledger_export_csv: spreadsheet-ready CSV (semicolon separated, decimal comma)\n\
                 - ledger_backup_json / ledger_restore_json: full-fidelity backup and restore\n\
                 \n\
                 ## Resources\n\
                 Tool output is cached under ledger:// URIs (transactions, calendar/{YYYY-MM}, summary, \
                 export/csv, export/json, analysis) for reference without re-running tools.\n\
                 \n\
                 Amounts are euros. Categories use the French labels of the ledger (Loyer, Entretien, \
                 Charges, Taxes...); rent income always goes through ledger_record_booking."
                    .into(),
            ),
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        let entries = self.resources.list().await;
        let resources: Vec<Resource> = entries
            .into_iter()
            .map(|(uri, name)| Resource {
                annotations: None,
                raw: RawResource {
                    uri,
                    name,
                    title: None,
                    description: None,
                    mime_type: Some("text/plain".into()),
                    size: None,
                    icons: None,
                    meta: None,
                },
            })
            .collect();
        Ok(ListResourcesResult {
            resources,
            next_cursor: None,
            meta: None,
        })
    }

    async fn list_resource_templates(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourceTemplatesResult, McpError> {
        let templates = vec![
            ResourceTemplate {
                annotations: None,
                raw: RawResourceTemplate {
                    uri_template: "ledger://transactions".into(),
                    name: "Ledger transactions".into(),
                    title: Some("Transaction listing".into()),
                    description: Some(
                        "Latest transaction listing (produced by ledger_list_transactions)".into(),
                    ),
                    mime_type: Some("text/plain".into()),
                    icons: None,
                },
            },
            ResourceTemplate {
                annotations: None,
                raw: RawResourceTemplate {
                    uri_template: "ledger://calendar/{month}".into(),
                    name: "Booking calendar".into(),
                    title: Some("Month availability grid".into()),
                    description: Some(
                        "Availability grid for one YYYY-MM month (produced by ledger_availability)"
                            .into(),
                    ),
                    mime_type: Some("text/plain".into()),
                    icons: None,
                },
            },
            ResourceTemplate {
                annotations: None,
                raw: RawResourceTemplate {
                    uri_template: "ledger://summary".into(),
                    name: "Financial summary".into(),
                    title: Some("Totals and breakdowns".into()),
                    description: Some(
                        "Totals, monthly table, and category breakdown (produced by ledger_summary)"
                            .into(),
                    ),
                    mime_type: Some("text/plain".into()),
                    icons: None,
                },
            },
            ResourceTemplate {
                annotations: None,
                raw: RawResourceTemplate {
                    uri_template: "ledger://export/csv".into(),
                    name: "CSV export".into(),
                    title: Some("Spreadsheet export".into()),
                    description: Some(
                        "Semicolon-separated CSV document (produced by ledger_export_csv)".into(),
                    ),
                    mime_type: Some("text/plain".into()),
                    icons: None,
                },
            },
            ResourceTemplate {
                annotations: None,
                raw: RawResourceTemplate {
                    uri_template: "ledger://export/json".into(),
                    name: "JSON backup".into(),
                    title: Some("Full-fidelity backup".into()),
                    description: Some(
                        "JSON array of every record (produced by ledger_backup_json)".into(),
                    ),
                    mime_type: Some("text/plain".into()),
                    icons: None,
                },
            },
            ResourceTemplate {
                annotations: None,
                raw: RawResourceTemplate {
                    uri_template: "ledger://analysis".into(),
                    name: "Financial analysis".into(),
                    title: Some("Narrative analysis".into()),
                    description: Some(
                        "Narrative produced by the analyzer (via ledger_analyze)".into(),
                    ),
                    mime_type: Some("text/plain".into()),
                    icons: None,
                },
            },
        ];
        Ok(ListResourceTemplatesResult {
            resource_templates: templates,
            next_cursor: None,
            meta: None,
        })
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        match self.resources.get(&request.uri).await {
            Some(entry) => Ok(ReadResourceResult {
                contents: vec![ResourceContents::text(entry.text, request.uri)],
            }),
            None => Err(McpError::resource_not_found(
                format!("resource not found: {}", request.uri),
                None,
            )),
        }
    }
}

// ---------- Tests ----------
