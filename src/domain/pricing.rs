use serde::{Deserialize, Serialize};

use super::booking::BookingDetails;

/// Tax is levied on half of the stay's gross. Fixed policy, not
/// configurable.
pub const TAX_BASE_SHARE: f64 = 0.5;

/// Parses user-entered decimal text. Comma is accepted as the decimal
/// separator; empty, non-numeric, or non-finite input coerces to 0 rather
/// than erroring.
pub fn parse_decimal_input(raw: &str) -> f64 {
    raw.trim()
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Gross revenue for a full week at the given nightly rate. Shown as a
/// pricing hint next to the nightly rate field.
pub fn weekly_gross(nightly_gross: f64) -> f64 {
    nightly_gross * 7.0
}

// ---------------------------------------------------------------------------
// Stay quote
// ---------------------------------------------------------------------------

/// Full net-revenue derivation for one stay. All intermediate totals are
/// kept unrounded; rounding happens only when rendering. The persisted
/// amount for a booking is the unrounded `final_net`.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema, PartialEq)]
pub struct StayQuote {
    pub nightly_gross: f64,
    pub nights: u32,
    pub total_gross: f64,
    pub total_fees: f64,
    pub tax_base: f64,
    pub total_tax: f64,
    pub total_water: f64,
    pub total_electricity: f64,
    pub total_deductions: f64,
    pub final_net: f64,
    pub net_per_night: f64,
}

impl StayQuote {
    /// Derives every total from the stay parameters, in order: gross for
    /// the stay, platform fees, tax on half of gross, per-night utility
    /// totals, then the net. Pure and total: any finite inputs produce a
    /// quote, never a panic.
    pub fn compute(details: &BookingDetails) -> Self {
        let nights = details.nights;
        let nightly_gross = details.nightly_gross;
        let total_gross = nightly_gross * f64::from(nights);
        let total_fees = total_gross * (details.fee_rate_pct / 100.0);
        let tax_base = total_gross * TAX_BASE_SHARE;
        let total_tax = tax_base * (details.tax_rate_pct / 100.0);
        let total_water = details.water_per_night * f64::from(nights);
        let total_electricity = details.electricity_per_night * f64::from(nights);
        let total_deductions = total_fees + total_tax + total_water + total_electricity;
        let final_net = total_gross - total_deductions;
        let net_per_night = if nights > 0 {
            final_net / f64::from(nights)
        } else {
            0.0
        };

        Self {
            nightly_gross,
            nights,
            total_gross,
            total_fees,
            tax_base,
            total_tax,
            total_water,
            total_electricity,
            total_deductions,
            final_net,
            net_per_night,
        }
    }
}

impl std::fmt::Display for StayQuote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Stay: {} night(s) at {:.2}€/night, gross {:.2}€",
            self.nights, self.nightly_gross, self.total_gross
        )?;
        writeln!(f, "  Fees:        -{:.2}€", self.total_fees)?;
        writeln!(
            f,
            "  Tax (on {:.2}€): -{:.2}€",
            self.tax_base, self.total_tax
        )?;
        if self.total_water > 0.0 {
            writeln!(f, "  Water:       -{:.2}€", self.total_water)?;
        }
        if self.total_electricity > 0.0 {
            writeln!(f, "  Electricity: -{:.2}€", self.total_electricity)?;
        }
        write!(
            f,
            "  Net: {:.2}€ ({:.2}€/night)",
            self.final_net, self.net_per_night
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
