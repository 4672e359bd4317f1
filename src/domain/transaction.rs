use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::booking::BookingDetails;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Direction of a ledger entry. Amounts are stored positive; the kind carries
/// the sign.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, schemars::JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Income => write!(f, "Recette"),
            Self::Expense => write!(f, "Dépense"),
        }
    }
}

/// Ledger categories. The serialized labels are the French strings the
/// remote store and existing backups carry, so they are part of the wire
/// format, not just display text.
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    schemars::JsonSchema,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
)]
pub enum Category {
    #[serde(rename = "Loyer")]
    Rent,
    #[serde(rename = "Frais de Ménage")]
    CleaningFee,
    #[serde(rename = "Caution")]
    Deposit,
    #[serde(rename = "Entretien")]
    Maintenance,
    #[serde(rename = "Charges")]
    Utilities,
    #[serde(rename = "Taxes")]
    Taxes,
    #[serde(rename = "Consommables")]
    Supplies,
    #[serde(rename = "Publicité")]
    Marketing,
    #[serde(rename = "Investissement")]
    Investment,
    #[serde(other)]
    #[serde(rename = "Autre")]
    Other,
}

impl Category {
    pub const ALL: [Category; 10] = [
        Category::Rent,
        Category::CleaningFee,
        Category::Deposit,
        Category::Maintenance,
        Category::Utilities,
        Category::Taxes,
        Category::Supplies,
        Category::Marketing,
        Category::Investment,
        Category::Other,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Rent => "Loyer",
            Self::CleaningFee => "Frais de Ménage",
            Self::Deposit => "Caution",
            Self::Maintenance => "Entretien",
            Self::Utilities => "Charges",
            Self::Taxes => "Taxes",
            Self::Supplies => "Consommables",
            Self::Marketing => "Publicité",
            Self::Investment => "Investissement",
            Self::Other => "Autre",
        }
    }

    /// Maps a stored label back to a category. Unknown labels land in
    /// `Other` so imports of hand-edited files never fail.
    pub fn from_label(label: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|c| c.label() == label)
            .unwrap_or(Self::Other)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id: String,
    pub date: NaiveDate,
    pub amount: f64,
    pub description: String,
    pub category: Category,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    /// Structured stay parameters, present on booking records. Legacy rows
    /// carry these encoded in the description instead; the store adapters
    /// decode them on the way in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking: Option<BookingDetails>,
}

impl Transaction {
    /// A booking is a rent income row; everything else is a plain ledger
    /// entry.
    pub fn is_booking(&self) -> bool {
        self.category == Category::Rent && self.kind == TransactionKind::Income
    }
}

/// A record the store has not assigned an id to yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionDraft {
    pub date: NaiveDate,
    pub amount: f64,
    pub description: String,
    pub category: Category,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking: Option<BookingDetails>,
}

impl TransactionDraft {
    pub fn into_transaction(self, id: String) -> Transaction {
        Transaction {
            id,
            date: self.date,
            amount: self.amount,
            description: self.description,
            category: self.category,
            kind: self.kind,
            booking: self.booking,
        }
    }

    pub fn is_booking(&self) -> bool {
        self.category == Category::Rent && self.kind == TransactionKind::Income
    }
}

/// Listing filter: every criterion is optional and they compose with AND.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub category: Option<Category>,
}

impl TransactionFilter {
    pub fn matches(&self, transaction: &Transaction) -> bool {
        if let Some(year) = self.year
            && transaction.date.year() != year
        {
            return false;
        }
        if let Some(month) = self.month
            && transaction.date.month() != month
        {
            return false;
        }
        if let Some(category) = self.category
            && transaction.category != category
        {
            return false;
        }
        true
    }
}

/// Newest first, the listing order of the ledger. Stable, so same-day rows
/// keep their store order.
pub fn sort_newest_first(transactions: &mut [Transaction]) {
    transactions.sort_by(|a, b| b.date.cmp(&a.date));
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{make_booking_transaction, make_transaction};

    #[test]
    fn kind_serializes_to_uppercase_wire_labels() {
        let json = serde_json::to_string(&TransactionKind::Income).unwrap();
        assert_eq!(json, "\"INCOME\"");
        let back: TransactionKind = serde_json::from_str("\"EXPENSE\"").unwrap();
        assert_eq!(back, TransactionKind::Expense);
    }

    #[test]
    fn category_serializes_to_french_labels() {
        let json = serde_json::to_string(&Category::CleaningFee).unwrap();
        assert_eq!(json, "\"Frais de Ménage\"");
        let back: Category = serde_json::from_str("\"Publicité\"").unwrap();
        assert_eq!(back, Category::Marketing);
    }

    #[test]
    fn unknown_category_label_falls_back_to_other() {
        let back: Category = serde_json::from_str("\"Piscine\"").unwrap();
        assert_eq!(back, Category::Other);
        assert_eq!(Category::from_label("Piscine"), Category::Other);
        assert_eq!(Category::from_label("Caution"), Category::Deposit);
    }

    #[test]
    fn transaction_wire_format_uses_type_field() {
        let t = make_transaction("t1", "2024-03-01", 45.0, Category::Maintenance);
        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(json["type"], "EXPENSE");
        assert_eq!(json["date"], "2024-03-01");
        assert_eq!(json["category"], "Entretien");
        // No booking key on plain entries
        assert!(json.get("booking").is_none());
    }

    #[test]
    fn rent_income_is_a_booking() {
        let booking = make_booking_transaction("b1", "2024-03-01", 100.0, 3);
        assert!(booking.is_booking());

        let expense = make_transaction("t1", "2024-03-01", 45.0, Category::Maintenance);
        assert!(!expense.is_booking());

        let mut rent_expense = make_transaction("t2", "2024-03-01", 45.0, Category::Rent);
        rent_expense.kind = TransactionKind::Expense;
        assert!(!rent_expense.is_booking());
    }

    #[test]
    fn filter_composes_with_and() {
        let t = make_transaction("t1", "2024-03-15", 80.0, Category::Utilities);

        let all = TransactionFilter::default();
        assert!(all.matches(&t));

        let march = TransactionFilter {
            month: Some(3),
            ..Default::default()
        };
        assert!(march.matches(&t));

        let march_2023 = TransactionFilter {
            year: Some(2023),
            month: Some(3),
            ..Default::default()
        };
        assert!(!march_2023.matches(&t));

        let wrong_category = TransactionFilter {
            category: Some(Category::Taxes),
            ..Default::default()
        };
        assert!(!wrong_category.matches(&t));
    }

    #[test]
    fn sort_is_newest_first_and_stable() {
        let mut txs = vec![
            make_transaction("a", "2024-01-10", 1.0, Category::Other),
            make_transaction("b", "2024-03-05", 2.0, Category::Other),
            make_transaction("c", "2024-03-05", 3.0, Category::Other),
            make_transaction("d", "2023-12-31", 4.0, Category::Other),
        ];
        sort_newest_first(&mut txs);
        let ids: Vec<&str> = txs.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a", "d"]);
    }
}
