use super::annotation;
use super::transaction::{Transaction, TransactionKind, sort_newest_first};
use crate::error::Result;

/// Byte-order mark so spreadsheet imports detect UTF-8.
const BOM: char = '\u{FEFF}';

const CSV_HEADER: &str = "Date;Description;Catégorie;Recettes (+);Dépenses (-)";

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

/// Semicolon-separated export in the French spreadsheet convention: comma
/// decimals, one column per flow direction, newest record first. Amounts
/// are rendered at full precision, not rounded to cents. Descriptions are
/// always quoted, with embedded quotes doubled.
pub fn to_csv(transactions: &[Transaction]) -> String {
    let mut rows = transactions.to_vec();
    sort_newest_first(&mut rows);

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(CSV_HEADER.to_string());
    for transaction in &rows {
        let safe_description = transaction.description.replace('"', "\"\"");
        let amount = csv_amount(transaction.amount);
        let (income, expense) = match transaction.kind {
            TransactionKind::Income => (amount, String::new()),
            TransactionKind::Expense => (String::new(), amount),
        };
        lines.push(format!(
            "{};\"{}\";{};{};{}",
            transaction.date.format("%Y-%m-%d"),
            safe_description,
            transaction.category.label(),
            income,
            expense,
        ));
    }
    format!("{BOM}{}", lines.join("\n"))
}

fn csv_amount(amount: f64) -> String {
    format!("{amount}").replace('.', ",")
}

// ---------------------------------------------------------------------------
// JSON backup
// ---------------------------------------------------------------------------

/// Pretty-printed dump of the full ledger, ids included, suitable for a
/// later [`from_json_backup`] restore.
pub fn to_json_backup(transactions: &[Transaction]) -> Result<String> {
    Ok(serde_json::to_string_pretty(transactions)?)
}

/// Parses a backup back into records. Rows written by older versions carry
/// the stay parameters only as a bracketed description annotation; those
/// are lifted into the structured sub-record here so the rest of the crate
/// never re-parses them.
pub fn from_json_backup(json: &str) -> Result<Vec<Transaction>> {
    let mut transactions: Vec<Transaction> = serde_json::from_str(json)?;
    for transaction in &mut transactions {
        if transaction.is_booking()
            && transaction.booking.is_none()
            && transaction.description.contains('[')
        {
            let details = annotation::parse(&transaction.description);
            transaction.description = annotation::display_label(&transaction.description);
            transaction.booking = Some(details);
        }
    }
    Ok(transactions)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::domain::calendar;
    use crate::domain::transaction::Category;
    use crate::test_helpers::{
        date, make_booking_transaction, make_income_transaction, make_transaction,
    };

    #[test]
    fn csv_renders_the_french_spreadsheet_layout() {
        let transactions = vec![
            make_transaction("a", "2024-03-05", 45.5, Category::Maintenance)
                .with_description("Réparation robinet"),
            make_income_transaction("b", "2024-03-10", 248.7, Category::Rent)
                .with_description("Séjour - 2 Adulte(s), 0 Enfant(s) (3 nuits)"),
        ];

        let csv = to_csv(&transactions);
        assert!(csv.starts_with('\u{FEFF}'));

        let lines: Vec<&str> = csv.trim_start_matches('\u{FEFF}').lines().collect();
        assert_eq!(lines[0], "Date;Description;Catégorie;Recettes (+);Dépenses (-)");
        assert_eq!(
            lines[1],
            "2024-03-10;\"Séjour - 2 Adulte(s), 0 Enfant(s) (3 nuits)\";Loyer;248,7;"
        );
        assert_eq!(lines[2], "2024-03-05;\"Réparation robinet\";Entretien;;45,5");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn csv_orders_newest_first_whatever_the_input_order() {
        let transactions = vec![
            make_transaction("a", "2024-01-02", 10.0, Category::Supplies),
            make_transaction("b", "2024-06-15", 20.0, Category::Supplies),
            make_transaction("c", "2024-03-20", 30.0, Category::Supplies),
        ];

        let csv = to_csv(&transactions);
        let dates: Vec<&str> = csv
            .trim_start_matches('\u{FEFF}')
            .lines()
            .skip(1)
            .map(|line| &line[..10])
            .collect();
        assert_eq!(dates, vec!["2024-06-15", "2024-03-20", "2024-01-02"]);
    }

    #[test]
    fn csv_doubles_embedded_quotes() {
        let transactions = vec![
            make_transaction("a", "2024-03-05", 12.0, Category::Supplies)
                .with_description("Ampoules \"LED\" x4"),
        ];

        let csv = to_csv(&transactions);
        assert!(csv.contains(";\"Ampoules \"\"LED\"\" x4\";"));
    }

    #[test]
    fn csv_amounts_keep_full_precision_with_comma_decimals() {
        assert_eq!(csv_amount(120.5), "120,5");
        assert_eq!(csv_amount(100.0), "100");
        assert_eq!(csv_amount(248.7), "248,7");
        assert_eq!(csv_amount(0.333_333_333_3), "0,3333333333");
    }

    #[test]
    fn empty_ledger_exports_headers_only() {
        let csv = to_csv(&[]);
        assert_eq!(csv, format!("\u{FEFF}{CSV_HEADER}"));
    }

    #[test]
    fn json_backup_round_trips_ids_and_booking_details() {
        let transactions = vec![
            make_booking_transaction("b1", "2024-03-10", 100.0, 3),
            make_transaction("e1", "2024-03-12", 45.0, Category::CleaningFee),
        ];

        let json = to_json_backup(&transactions).unwrap();
        assert!(json.contains("\n  "));

        let restored = from_json_backup(&json).unwrap();
        assert_eq!(restored, transactions);
    }

    #[test]
    fn restore_lifts_legacy_annotations_into_the_sub_record() {
        let json = r#"[
          {
            "id": "legacy-1",
            "date": "2023-11-04",
            "amount": 248.7,
            "description": "Séjour - 2 Adulte(s), 0 Enfant(s) (3 nuits) [Brut Nuit: 100€, Total Brut: 300.00€, Frais: 3%, Impôt: 17.2%, Eau/Nuit: 2€, Elec/Nuit: 3.5€]",
            "category": "Loyer",
            "type": "INCOME"
          }
        ]"#;

        let restored = from_json_backup(json).unwrap();
        assert_eq!(restored.len(), 1);
        let transaction = &restored[0];
        assert_eq!(transaction.id, "legacy-1");
        assert_eq!(
            transaction.description,
            "Séjour - 2 Adulte(s), 0 Enfant(s) (3 nuits)"
        );
        let details = transaction.booking.as_ref().unwrap();
        assert_eq!(details.nights, 3);
        assert!((details.nightly_gross - 100.0).abs() < 0.01);
        assert!((details.water_per_night - 2.0).abs() < 0.01);
    }

    #[test]
    fn restored_stays_without_brackets_still_block_their_nights() {
        let json = r#"[
          {
            "id": "legacy-2",
            "date": "2024-03-10",
            "amount": 360.0,
            "description": "Séjour - Famille Martin (4 nuits)",
            "category": "Loyer",
            "type": "INCOME"
          }
        ]"#;

        let restored = from_json_backup(json).unwrap();
        // No bracket segment, so there is nothing to lift and the free-text
        // description stays as written.
        assert!(restored[0].booking.is_none());
        assert_eq!(restored[0].description, "Séjour - Famille Martin (4 nuits)");

        // The night count named in the description must still reach the
        // calendar, or a second stay could be saved over nights 2 to 4.
        let booked = calendar::booked_nights(&restored, None);
        assert_eq!(booked.len(), 4);
        assert!(booked.contains(&date("2024-03-13")));
        assert!(calendar::overlaps(date("2024-03-11"), 2, &booked));
    }

    #[test]
    fn restore_leaves_plain_booking_descriptions_alone() {
        let json = r#"[
          {
            "id": "plain-1",
            "date": "2023-10-01",
            "amount": 1200.0,
            "description": "Loyer - Réservation #442",
            "category": "Loyer",
            "type": "INCOME"
          }
        ]"#;

        let restored = from_json_backup(json).unwrap();
        assert_eq!(restored[0].description, "Loyer - Réservation #442");
        assert!(restored[0].booking.is_none());
    }

    #[test]
    fn restore_rejects_non_array_payloads() {
        assert!(from_json_backup("{\"oops\": true}").is_err());
        assert!(from_json_backup("not json at all").is_err());
    }
}
