use std::sync::LazyLock;

use regex::Regex;

use super::booking::BookingDetails;
use super::pricing::parse_decimal_input;

// The description grammar of booking rows in the remote store, which has no
// dedicated columns for stay parameters:
//
//   Séjour - 2 Adulte(s), 0 Enfant(s) (3 nuits)
//     [Brut Nuit: 100€, Total Brut: 300.00€, Frais: 3%, Impôt: 17.2%,
//      Eau/Nuit: 2€, Elec/Nuit: 3.5€]
//
// An older variant stored stay totals (`Brut`, `Eau`, `Elec`) instead of
// per-night rates; those are divided by the night count on parse.

static GUEST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Séjour - (\d+) Adulte\(s\), (\d+) Enfant\(s\) \((\d+) nuits\)")
        .expect("hardcoded regex should be valid")
});
static NIGHTS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Séjour - .*\((\d+) nuits\)").expect("hardcoded regex should be valid")
});
static GROSS_NIGHT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Brut Nuit:\s*([0-9.]+)€").expect("hardcoded regex should be valid")
});
static GROSS_TOTAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Brut:\s*([0-9.]+)€").expect("hardcoded regex should be valid"));
static FEE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Frais:\s*([0-9.]+)%").expect("hardcoded regex should be valid"));
static TAX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Impôt:\s*([0-9.]+)%").expect("hardcoded regex should be valid"));
static WATER_NIGHT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Eau/Nuit:\s*([0-9.]+)€").expect("hardcoded regex should be valid")
});
static WATER_TOTAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Eau:\s*([0-9.]+)€").expect("hardcoded regex should be valid"));
static ELEC_NIGHT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Elec/Nuit:\s*([0-9.]+)€").expect("hardcoded regex should be valid")
});
static ELEC_TOTAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Elec:\s*([0-9.]+)€").expect("hardcoded regex should be valid"));
static BRACKET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*\[[^\]]*\]").expect("hardcoded regex should be valid")
});

fn capture_number(re: &Regex, text: &str) -> Option<f64> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| parse_decimal_input(m.as_str()))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Renders the full annotated description for a booking: the stay label
/// followed by the bracketed rate segment. Water and electricity segments
/// are omitted when their rate is zero.
pub fn encode(details: &BookingDetails) -> String {
    let total_gross = details.nightly_gross * f64::from(details.nights);
    let mut out = format!(
        "{} [Brut Nuit: {}€, Total Brut: {:.2}€, Frais: {}%, Impôt: {}%",
        details.stay_label(),
        details.nightly_gross,
        total_gross,
        details.fee_rate_pct,
        details.tax_rate_pct,
    );
    if details.water_per_night > 0.0 {
        out.push_str(&format!(", Eau/Nuit: {}€", details.water_per_night));
    }
    if details.electricity_per_night > 0.0 {
        out.push_str(&format!(", Elec/Nuit: {}€", details.electricity_per_night));
    }
    out.push(']');
    out
}

/// Recovers stay parameters from an annotated description.
///
/// Every segment falls back independently: a missing guest segment defaults
/// to one night for two adults (a plain `(N nuits)` suffix still recovers the
/// night count), a missing bracket segment defaults to the standard rates,
/// and a description carrying only stay totals is converted to per-night
/// values. An unrecoverable gross rate is reported as 0 so callers can fall
/// back to the stored net amount.
pub fn parse(description: &str) -> BookingDetails {
    let mut details = BookingDetails::default();

    if let Some(caps) = GUEST_RE.captures(description) {
        // A digit run too long for u32 fails the parse and keeps the default.
        details.adults = caps[1].parse().unwrap_or(details.adults);
        details.children = caps[2].parse().unwrap_or(details.children);
        details.nights = caps[3].parse().unwrap_or(details.nights);
    } else if let Some(caps) = NIGHTS_RE.captures(description) {
        details.nights = caps[1].parse().unwrap_or(details.nights);
    }

    let nights = details.nights;
    if let Some(gross) = capture_number(&GROSS_NIGHT_RE, description) {
        details.nightly_gross = gross;
    } else if let Some(total) = capture_number(&GROSS_TOTAL_RE, description) {
        // Legacy rows stored the stay total; the original converter snapped
        // the division to two decimals.
        details.nightly_gross = if nights > 0 {
            round2(total / f64::from(nights))
        } else {
            total
        };
    }

    if let Some(fee) = capture_number(&FEE_RE, description) {
        details.fee_rate_pct = fee;
    }
    if let Some(tax) = capture_number(&TAX_RE, description) {
        details.tax_rate_pct = tax;
    }

    if let Some(water) = capture_number(&WATER_NIGHT_RE, description) {
        details.water_per_night = water;
    } else if let Some(total) = capture_number(&WATER_TOTAL_RE, description) {
        details.water_per_night = if nights > 0 {
            total / f64::from(nights)
        } else {
            total
        };
    }

    if let Some(elec) = capture_number(&ELEC_NIGHT_RE, description) {
        details.electricity_per_night = elec;
    } else if let Some(total) = capture_number(&ELEC_TOTAL_RE, description) {
        details.electricity_per_night = if nights > 0 {
            total / f64::from(nights)
        } else {
            total
        };
    }

    details
}

/// Night count recoverable from a stay description alone, whether or not the
/// guest segment follows the structured form. Rows that predate the bracket
/// annotation carry their night count only here.
pub fn nights_hint(description: &str) -> Option<u32> {
    GUEST_RE
        .captures(description)
        .and_then(|caps| caps.get(3))
        .or_else(|| NIGHTS_RE.captures(description).and_then(|caps| caps.get(1)))
        .and_then(|m| m.as_str().parse().ok())
}

/// Strips the bracketed rate segment, keeping the human-readable label and
/// anything trailing the brackets, such as a repeat marker.
pub fn display_label(description: &str) -> String {
    BRACKET_RE.replace(description, "").into_owned()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
