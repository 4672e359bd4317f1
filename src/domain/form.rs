use std::collections::BTreeSet;

use chrono::{Months, NaiveDate};

use super::annotation;
use super::booking::{BookingDetails, MAX_ADULTS, MAX_CHILDREN, MAX_GUESTS, MIN_ADULTS};
use super::calendar::{self, MonthGrid};
use super::pricing::{StayQuote, parse_decimal_input};
use super::selection::{ClickOutcome, Selection};
use super::transaction::{Category, Transaction, TransactionDraft, TransactionKind};
use crate::error::Result;

/// Upper bound on monthly repetition of a new entry.
pub const MAX_REPEAT_MONTHS: u32 = 60;

// ---------------------------------------------------------------------------
// Form session
// ---------------------------------------------------------------------------

/// One editing session over a ledger entry. Numeric fields are kept as the
/// raw text the user typed (comma or dot, possibly empty) and normalized on
/// every read, so the preview always reflects the current keystrokes. The
/// date and night count are the authoritative range; the two-click picker
/// commits into them.
#[derive(Debug, Clone)]
pub struct BookingForm {
    pub editing_id: Option<String>,
    pub date: NaiveDate,
    pub nights: u32,
    pub adults: u32,
    pub children: u32,
    /// Nightly gross for bookings, plain amount otherwise.
    pub amount: String,
    pub description: String,
    pub category: Category,
    pub kind: TransactionKind,
    pub fee_rate: String,
    pub tax_rate: String,
    pub water_per_night: String,
    pub electricity_per_night: String,
    pub repeat_months: u32,
    pub selection: Selection,
}

impl BookingForm {
    /// Fresh expense entry. `template` supplies the configured party,
    /// night, and rate defaults.
    pub fn new(today: NaiveDate, template: &BookingDetails) -> Self {
        Self {
            editing_id: None,
            date: today,
            nights: template.nights,
            adults: template.adults,
            children: template.children,
            amount: String::new(),
            description: String::new(),
            category: Category::Maintenance,
            kind: TransactionKind::Expense,
            fee_rate: template.fee_rate_pct.to_string(),
            tax_rate: template.tax_rate_pct.to_string(),
            water_per_night: template.water_per_night.to_string(),
            electricity_per_night: template.electricity_per_night.to_string(),
            repeat_months: 1,
            selection: Selection::Idle,
        }
    }

    /// Fresh booking entry: rent income with the configured defaults.
    pub fn new_reservation(today: NaiveDate, template: &BookingDetails) -> Self {
        let mut form = Self::new(today, template);
        form.kind = TransactionKind::Income;
        form.category = Category::Rent;
        form
    }

    /// Opens an existing record for editing. Booking parameters come from
    /// the structured sub-record when present, otherwise from the legacy
    /// description annotation; if neither yields a gross rate, the stored
    /// net shows in the amount field.
    pub fn edit(transaction: &Transaction, template: &BookingDetails) -> Self {
        Self::hydrate(transaction, template, Some(transaction.id.clone()))
    }

    /// Like [`Self::edit`] but producing a new record on save.
    pub fn duplicate(transaction: &Transaction, template: &BookingDetails) -> Self {
        Self::hydrate(transaction, template, None)
    }

    fn hydrate(
        transaction: &Transaction,
        template: &BookingDetails,
        editing_id: Option<String>,
    ) -> Self {
        let mut form = Self::new(transaction.date, template);
        form.editing_id = editing_id;
        form.category = transaction.category;
        form.kind = transaction.kind;

        if transaction.is_booking() {
            let details = transaction
                .booking
                .clone()
                .unwrap_or_else(|| annotation::parse(&transaction.description));
            form.adults = details.adults;
            form.children = details.children;
            form.nights = details.nights;
            form.fee_rate = details.fee_rate_pct.to_string();
            form.tax_rate = details.tax_rate_pct.to_string();
            form.water_per_night = details.water_per_night.to_string();
            form.electricity_per_night = details.electricity_per_night.to_string();
            form.amount = if details.nightly_gross > 0.0 {
                details.nightly_gross.to_string()
            } else {
                transaction.amount.abs().to_string()
            };
            form.description = details.stay_label();
        } else {
            form.amount = transaction.amount.to_string();
            form.description = transaction.description.clone();
            form.water_per_night = "0".into();
            form.electricity_per_night = "0".into();
        }
        form
    }

    pub fn is_booking(&self) -> bool {
        self.category == Category::Rent && self.kind == TransactionKind::Income
    }

    // -----------------------------------------------------------------------
    // Field updates
    // -----------------------------------------------------------------------

    pub fn set_adults(&mut self, adults: u32) {
        self.adults = adults.clamp(MIN_ADULTS, MAX_ADULTS);
        if self.adults + self.children > MAX_GUESTS {
            self.children = MAX_GUESTS - self.adults;
        }
    }

    pub fn set_children(&mut self, children: u32) {
        self.children = children
            .min(MAX_CHILDREN)
            .min(MAX_GUESTS.saturating_sub(self.adults));
    }

    // -----------------------------------------------------------------------
    // Live read models
    // -----------------------------------------------------------------------

    /// Current stay parameters, with the text fields normalized. Negative
    /// rate input clamps to zero here, before any computation sees it.
    pub fn details(&self) -> BookingDetails {
        BookingDetails {
            adults: self.adults,
            children: self.children,
            nights: self.nights,
            nightly_gross: parse_decimal_input(&self.amount).max(0.0),
            fee_rate_pct: parse_decimal_input(&self.fee_rate).max(0.0),
            tax_rate_pct: parse_decimal_input(&self.tax_rate).max(0.0),
            water_per_night: parse_decimal_input(&self.water_per_night).max(0.0),
            electricity_per_night: parse_decimal_input(&self.electricity_per_night).max(0.0),
        }
    }

    pub fn quote(&self) -> StayQuote {
        StayQuote::compute(&self.details())
    }

    /// Occupied nights across the record snapshot, excluding the record
    /// under edit.
    pub fn booked_nights(&self, transactions: &[Transaction]) -> BTreeSet<NaiveDate> {
        calendar::booked_nights(transactions, self.editing_id.as_deref())
    }

    /// True while the form's current range would land on occupied nights.
    /// Recomputed from scratch on every call; gates the save action.
    pub fn has_collision(&self, booked: &BTreeSet<NaiveDate>) -> bool {
        self.is_booking() && calendar::overlaps(self.date, self.nights, booked)
    }

    /// Nights highlighted in the calendar: the pending first click while
    /// picking, otherwise the form's current range.
    pub fn selected_nights(&self) -> BTreeSet<NaiveDate> {
        if !self.is_booking() {
            return BTreeSet::new();
        }
        match self.selection {
            Selection::StartPicked(day) => BTreeSet::from([day]),
            Selection::Idle => calendar::night_range(self.date, self.nights)
                .into_iter()
                .collect(),
        }
    }

    pub fn month_grid(
        &self,
        year: i32,
        month: u32,
        booked: &BTreeSet<NaiveDate>,
    ) -> Result<MonthGrid> {
        calendar::month_grid(year, month, booked, &self.selected_nights())
    }

    /// Routes a calendar click through the two-click picker; a committed
    /// range becomes the form's authoritative date and night count.
    pub fn click_day(&mut self, day: NaiveDate, booked: &BTreeSet<NaiveDate>) -> ClickOutcome {
        let outcome = self.selection.click(day, booked);
        if let ClickOutcome::Committed { start, nights } = outcome {
            self.date = start;
            self.nights = nights;
        }
        outcome
    }

    // -----------------------------------------------------------------------
    // Save
    // -----------------------------------------------------------------------

    /// Validates and materializes the session. Bookings persist the
    /// unrounded computed net with the structured details attached;
    /// anything else persists the typed amount verbatim (made positive,
    /// the kind carries the sign). Creation expands the monthly repeat;
    /// editing always yields exactly one updated record.
    pub fn save(&self, transactions: &[Transaction]) -> SaveOutcome {
        if self.is_booking() {
            let booked = self.booked_nights(transactions);
            let conflicts = calendar::conflicting_nights(self.date, self.nights, &booked);
            if !conflicts.is_empty() {
                return SaveOutcome::RejectedOverlap { conflicts };
            }

            let details = self.details();
            let amount = StayQuote::compute(&details).final_net;
            let description = details.stay_label();

            if let Some(id) = &self.editing_id {
                return SaveOutcome::Updated(Transaction {
                    id: id.clone(),
                    date: self.date,
                    amount,
                    description,
                    category: self.category,
                    kind: self.kind,
                    booking: Some(details),
                });
            }
            SaveOutcome::Created(self.expand_repeat(amount, &description, Some(details)))
        } else {
            let amount = parse_decimal_input(&self.amount).abs();

            if let Some(id) = &self.editing_id {
                return SaveOutcome::Updated(Transaction {
                    id: id.clone(),
                    date: self.date,
                    amount,
                    description: self.description.clone(),
                    category: self.category,
                    kind: self.kind,
                    booking: None,
                });
            }
            SaveOutcome::Created(self.expand_repeat(amount, &self.description, None))
        }
    }

    /// One draft per repeated month. Stepping clamps to the target month's
    /// length (Jan 31 repeats as Feb 29 in a leap year), and multi-month
    /// runs get an ` (i/n)` description suffix.
    fn expand_repeat(
        &self,
        amount: f64,
        description: &str,
        booking: Option<BookingDetails>,
    ) -> Vec<TransactionDraft> {
        let count = self.repeat_months.clamp(1, MAX_REPEAT_MONTHS);
        (0..count)
            .map(|i| {
                let date = self
                    .date
                    .checked_add_months(Months::new(i))
                    .unwrap_or(self.date);
                let suffix = if count > 1 {
                    format!(" ({}/{count})", i + 1)
                } else {
                    String::new()
                };
                TransactionDraft {
                    date,
                    amount,
                    description: format!("{description}{suffix}"),
                    category: self.category,
                    kind: self.kind,
                    booking: booking.clone(),
                }
            })
            .collect()
    }
}

/// Result of a save attempt. Overlap rejection is a domain outcome, not an
/// error: the session stays alive and consistent for the caller to adjust.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Created(Vec<TransactionDraft>),
    Updated(Transaction),
    RejectedOverlap { conflicts: Vec<NaiveDate> },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{date, make_booking_transaction, template};

    fn reservation() -> BookingForm {
        BookingForm::new_reservation(date("2024-03-10"), &template())
    }

    #[test]
    fn new_reservation_carries_the_configured_defaults() {
        let form = reservation();
        assert_eq!(form.kind, TransactionKind::Income);
        assert_eq!(form.category, Category::Rent);
        assert_eq!(form.nights, 2);
        assert_eq!((form.adults, form.children), (2, 0));
        assert_eq!(form.fee_rate, "3");
        assert_eq!(form.tax_rate, "17.2");
        assert_eq!(form.water_per_night, "2");
        assert_eq!(form.electricity_per_night, "3.5");
        assert!(form.is_booking());
    }

    #[test]
    fn quote_reads_the_raw_text_fields() {
        let mut form = reservation();
        form.amount = "100".into();
        form.nights = 3;

        let quote = form.quote();
        assert!((quote.final_net - 248.70).abs() < 1e-9);
        assert!((quote.net_per_night - 82.90).abs() < 1e-9);
    }

    #[test]
    fn comma_decimals_and_garbage_are_normalized() {
        let mut form = reservation();
        form.amount = "99,5".into();
        form.fee_rate = "n/a".into();

        let details = form.details();
        assert!((details.nightly_gross - 99.5).abs() < 1e-9);
        assert!(details.fee_rate_pct.abs() < f64::EPSILON);
    }

    #[test]
    fn negative_rates_clamp_to_zero() {
        let mut form = reservation();
        form.tax_rate = "-5".into();
        form.water_per_night = "-2,5".into();

        let details = form.details();
        assert!(details.tax_rate_pct.abs() < f64::EPSILON);
        assert!(details.water_per_night.abs() < f64::EPSILON);
    }

    #[test]
    fn party_clamps_hold_across_updates() {
        let mut form = reservation();
        form.set_adults(4);
        form.set_children(2);
        assert_eq!((form.adults, form.children), (4, 0));

        form.set_adults(1);
        form.set_children(3);
        assert_eq!((form.adults, form.children), (1, 3));

        form.set_adults(3);
        assert_eq!((form.adults, form.children), (3, 1));
    }

    #[test]
    fn save_rejects_while_the_range_collides() {
        let existing = vec![make_booking_transaction("b1", "2024-03-10", 100.0, 3)];
        let mut form = reservation();
        form.amount = "90".into();
        form.date = date("2024-03-11");
        form.nights = 2;

        let booked = form.booked_nights(&existing);
        assert!(form.has_collision(&booked));
        assert_eq!(
            form.save(&existing),
            SaveOutcome::RejectedOverlap {
                conflicts: vec![date("2024-03-11"), date("2024-03-12")]
            }
        );
    }

    #[test]
    fn edit_excludes_its_own_nights_from_the_guard() {
        let existing = vec![make_booking_transaction("b1", "2024-03-10", 100.0, 3)];
        let mut form = BookingForm::edit(&existing[0], &template());

        let booked = form.booked_nights(&existing);
        assert!(!form.has_collision(&booked));

        form.amount = "110".into();
        match form.save(&existing) {
            SaveOutcome::Updated(updated) => {
                assert_eq!(updated.id, "b1");
                assert!((updated.amount - StayQuote::compute(&form.details()).final_net).abs() < 1e-9);
            }
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[test]
    fn edit_hydrates_from_the_structured_sub_record() {
        let stored = make_booking_transaction("b1", "2024-03-10", 85.5, 4);
        let form = BookingForm::edit(&stored, &template());

        assert_eq!(form.editing_id.as_deref(), Some("b1"));
        assert_eq!(form.nights, 4);
        assert_eq!(form.amount, "85.5");
        assert_eq!(form.description, "Séjour - 2 Adulte(s), 0 Enfant(s) (4 nuits)");
    }

    #[test]
    fn edit_falls_back_to_the_description_annotation() {
        let mut stored = make_booking_transaction("b1", "2024-03-10", 0.0, 1);
        stored.booking = None;
        stored.description = "Séjour - 3 Adulte(s), 1 Enfant(s) (2 nuits) \
                              [Brut Nuit: 120€, Total Brut: 240.00€, Frais: 2%, Impôt: 10%]"
            .into();

        let form = BookingForm::edit(&stored, &template());
        assert_eq!((form.adults, form.children, form.nights), (3, 1, 2));
        assert_eq!(form.amount, "120");
        assert_eq!(form.fee_rate, "2");
        assert_eq!(form.tax_rate, "10");
    }

    #[test]
    fn unparseable_booking_shows_the_stored_net() {
        let mut stored = make_booking_transaction("b1", "2024-03-10", 0.0, 1);
        stored.booking = None;
        stored.description = "Loyer - Réservation #442".into();
        stored.amount = 1200.0;

        let form = BookingForm::edit(&stored, &template());
        assert_eq!(form.amount, "1200");
        assert_eq!(form.nights, 1);
        assert_eq!(form.fee_rate, "3");
        assert_eq!(form.water_per_night, "0");
    }

    #[test]
    fn duplicate_drops_the_id_and_creates() {
        let stored = make_booking_transaction("b1", "2024-05-01", 100.0, 2);
        let form = BookingForm::duplicate(&stored, &template());
        assert!(form.editing_id.is_none());

        // No other records: the duplicate's range only collides with the
        // original, which still exists
        match form.save(&[stored]) {
            SaveOutcome::RejectedOverlap { conflicts } => {
                assert_eq!(conflicts.len(), 2);
            }
            other => panic!("expected overlap with the original stay, got {other:?}"),
        }
    }

    #[test]
    fn non_booking_amount_is_stored_verbatim_positive() {
        let mut form = BookingForm::new(date("2024-03-10"), &template());
        form.category = Category::Utilities;
        form.description = "Facture eau".into();
        form.amount = "120,50".into();

        match form.save(&[]) {
            SaveOutcome::Created(drafts) => {
                assert_eq!(drafts.len(), 1);
                assert!((drafts[0].amount - 120.5).abs() < 1e-9);
                assert!(drafts[0].booking.is_none());
            }
            other => panic!("expected creation, got {other:?}"),
        }
    }

    #[test]
    fn non_booking_never_collides() {
        let existing = vec![make_booking_transaction("b1", "2024-03-10", 100.0, 3)];
        let mut form = BookingForm::new(date("2024-03-10"), &template());
        form.category = Category::CleaningFee;
        form.amount = "50".into();

        let booked = form.booked_nights(&existing);
        assert!(!form.has_collision(&booked));
        assert!(matches!(form.save(&existing), SaveOutcome::Created(_)));
    }

    #[test]
    fn repeat_expands_month_by_month_with_suffixes() {
        let mut form = BookingForm::new(date("2024-01-31"), &template());
        form.category = Category::Taxes;
        form.description = "Impôt foncier".into();
        form.amount = "85".into();
        form.repeat_months = 3;

        match form.save(&[]) {
            SaveOutcome::Created(drafts) => {
                assert_eq!(drafts.len(), 3);
                assert_eq!(drafts[0].date, date("2024-01-31"));
                // Day clamps to the shorter month
                assert_eq!(drafts[1].date, date("2024-02-29"));
                assert_eq!(drafts[2].date, date("2024-03-31"));
                assert_eq!(drafts[0].description, "Impôt foncier (1/3)");
                assert_eq!(drafts[2].description, "Impôt foncier (3/3)");
            }
            other => panic!("expected creation, got {other:?}"),
        }
    }

    #[test]
    fn single_repeat_has_no_suffix() {
        let mut form = BookingForm::new(date("2024-03-10"), &template());
        form.description = "Réparation robinet".into();
        form.amount = "45".into();

        match form.save(&[]) {
            SaveOutcome::Created(drafts) => {
                assert_eq!(drafts[0].description, "Réparation robinet");
            }
            other => panic!("expected creation, got {other:?}"),
        }
    }

    #[test]
    fn committed_click_updates_the_authoritative_range() {
        let mut form = reservation();
        let booked = BTreeSet::new();

        form.click_day(date("2024-03-20"), &booked);
        assert_eq!(form.selected_nights(), BTreeSet::from([date("2024-03-20")]));

        form.click_day(date("2024-03-23"), &booked);
        assert_eq!(form.date, date("2024-03-20"));
        assert_eq!(form.nights, 3);
        assert!(form.selection.is_idle());
    }

    #[test]
    fn booking_save_attaches_the_structured_details() {
        let mut form = reservation();
        form.amount = "100".into();
        form.nights = 3;

        match form.save(&[]) {
            SaveOutcome::Created(drafts) => {
                let draft = &drafts[0];
                assert!((draft.amount - 248.70).abs() < 1e-9);
                assert_eq!(draft.description, "Séjour - 2 Adulte(s), 0 Enfant(s) (3 nuits)");
                let details = draft.booking.as_ref().unwrap();
                assert_eq!(details.nights, 3);
                assert!((details.nightly_gross - 100.0).abs() < 1e-9);
            }
            other => panic!("expected creation, got {other:?}"),
        }
    }
}
