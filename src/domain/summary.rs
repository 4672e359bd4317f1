use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use super::transaction::{Category, Transaction, TransactionKind};

// ---------------------------------------------------------------------------
// Totals
// ---------------------------------------------------------------------------

/// Headline figures over a set of records. Amounts are stored positive for
/// both kinds, so the balance is a plain difference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FinancialSummary {
    pub total_income: f64,
    pub total_expense: f64,
    pub balance: f64,
    pub transaction_count: usize,
}

impl FinancialSummary {
    pub fn compute(transactions: &[Transaction]) -> Self {
        let mut total_income = 0.0;
        let mut total_expense = 0.0;
        for transaction in transactions {
            match transaction.kind {
                TransactionKind::Income => total_income += transaction.amount,
                TransactionKind::Expense => total_expense += transaction.amount,
            }
        }
        Self {
            total_income,
            total_expense,
            balance: total_income - total_expense,
            transaction_count: transactions.len(),
        }
    }
}

impl fmt::Display for FinancialSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Recettes: {:.2}€", self.total_income)?;
        writeln!(f, "Dépenses: {:.2}€", self.total_expense)?;
        writeln!(f, "Solde net: {:.2}€", self.balance)?;
        write!(f, "Transactions: {}", self.transaction_count)
    }
}

// ---------------------------------------------------------------------------
// Monthly profitability
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyRow {
    /// `YYYY-MM`, zero padded.
    pub month: String,
    pub income: f64,
    pub expense: f64,
    pub profit: f64,
    /// Income of the month split by category, the series a stacked revenue
    /// chart consumes.
    pub income_by_category: BTreeMap<Category, f64>,
    /// Expense split, same shape.
    pub expense_by_category: BTreeMap<Category, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyBreakdown {
    pub rows: Vec<MonthlyRow>,
}

impl MonthlyBreakdown {
    /// Month-by-month income, expense, and profit, oldest month first, each
    /// direction split by category. Months without any record do not appear.
    pub fn compute(transactions: &[Transaction]) -> Self {
        let mut months: BTreeMap<String, MonthlyRow> = BTreeMap::new();
        for transaction in transactions {
            let key = transaction.date.format("%Y-%m").to_string();
            let row = months.entry(key.clone()).or_insert_with(|| MonthlyRow {
                month: key,
                income: 0.0,
                expense: 0.0,
                profit: 0.0,
                income_by_category: BTreeMap::new(),
                expense_by_category: BTreeMap::new(),
            });
            let (total, split) = match transaction.kind {
                TransactionKind::Income => (&mut row.income, &mut row.income_by_category),
                TransactionKind::Expense => (&mut row.expense, &mut row.expense_by_category),
            };
            *total += transaction.amount;
            *split.entry(transaction.category).or_insert(0.0) += transaction.amount;
        }
        let rows = months
            .into_values()
            .map(|mut row| {
                row.profit = row.income - row.expense;
                row
            })
            .collect();
        Self { rows }
    }
}

impl fmt::Display for MonthlyBreakdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<8} {:>12} {:>12} {:>12}",
            "Mois", "Recettes", "Dépenses", "Profit"
        )?;
        for row in &self.rows {
            writeln!(
                f,
                "{:<8} {:>11.2}€ {:>11.2}€ {:>11.2}€",
                row.month, row.income, row.expense, row.profit
            )?;
            for (category, total) in &row.income_by_category {
                writeln!(f, "  + {category}: {total:.2}€")?;
            }
            for (category, total) in &row.expense_by_category {
                writeln!(f, "  - {category}: {total:.2}€")?;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Category breakdown
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakdownEntry {
    pub label: String,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryBreakdown {
    pub entries: Vec<BreakdownEntry>,
    /// Sum over all entries, the base for share percentages.
    pub total_volume: f64,
}

impl CategoryBreakdown {
    /// Volume per category across both kinds, largest first. Utility and
    /// tax records are split further by well-known description keywords so
    /// recurring bills group under one label regardless of exact wording.
    pub fn compute(transactions: &[Transaction]) -> Self {
        let mut grouped: BTreeMap<String, f64> = BTreeMap::new();
        for transaction in transactions {
            *grouped.entry(breakdown_key(transaction)).or_insert(0.0) += transaction.amount;
        }

        let total_volume = grouped.values().sum();
        let mut entries: Vec<BreakdownEntry> = grouped
            .into_iter()
            .map(|(label, total)| BreakdownEntry { label, total })
            .collect();
        entries.sort_by(|a, b| b.total.total_cmp(&a.total));

        Self {
            entries,
            total_volume,
        }
    }
}

fn breakdown_key(transaction: &Transaction) -> String {
    let label = transaction.category.label();
    if !matches!(
        transaction.category,
        Category::Utilities | Category::Taxes
    ) {
        return label.to_string();
    }

    let description = transaction.description.to_lowercase();
    let sub = match transaction.category {
        Category::Utilities => {
            if description.contains("eau") {
                "Eau"
            } else if description.contains("élect") {
                "Électricité"
            } else if description.contains("gaz") {
                "Gaz"
            } else if description.contains("box") || description.contains("internet") {
                "Box/Internet"
            } else if description.contains("assurance") {
                "Assurance"
            } else {
                &transaction.description
            }
        }
        Category::Taxes => {
            if description.contains("foncier") {
                "Impôt Foncier"
            } else if description.contains("habitation") {
                "Taxe Habitation"
            } else if description.contains("airbnb") {
                "Taxe AirBnB"
            } else {
                &transaction.description
            }
        }
        _ => unreachable!(),
    };
    format!("{label} - {sub}")
}

impl fmt::Display for CategoryBreakdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            let share = if self.total_volume > 0.0 {
                entry.total / self.total_volume * 100.0
            } else {
                0.0
            };
            writeln!(f, "{}: {:.2}€ ({share:.1}%)", entry.label, entry.total)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
