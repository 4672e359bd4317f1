use serde::{Deserialize, Serialize};

// Party-size policy of the property: up to four guests, at least one adult.
pub const MIN_ADULTS: u32 = 1;
pub const MAX_ADULTS: u32 = 4;
pub const MAX_CHILDREN: u32 = 3;
pub const MAX_GUESTS: u32 = 4;

/// Structured stay parameters attached to a booking record.
///
/// Older data encodes these in the free-text description instead; the
/// annotation codec converts between the two shapes at the store boundary.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema, PartialEq)]
pub struct BookingDetails {
    pub adults: u32,
    pub children: u32,
    pub nights: u32,
    /// Gross rate per night, before any deduction.
    pub nightly_gross: f64,
    /// Platform fee, percent of the stay's gross.
    pub fee_rate_pct: f64,
    /// Tax rate, percent applied to half of the stay's gross.
    pub tax_rate_pct: f64,
    pub water_per_night: f64,
    pub electricity_per_night: f64,
}

impl Default for BookingDetails {
    /// The fallback values used when a legacy description cannot be parsed:
    /// one night for two adults, standard rates, no utility charges.
    fn default() -> Self {
        Self {
            adults: 2,
            children: 0,
            nights: 1,
            nightly_gross: 0.0,
            fee_rate_pct: 3.0,
            tax_rate_pct: 17.2,
            water_per_night: 0.0,
            electricity_per_night: 0.0,
        }
    }
}

impl BookingDetails {
    /// Sets the adult count, clamped to 1..=4. Children give way when the
    /// new party would exceed four guests.
    pub fn set_adults(&mut self, adults: u32) {
        self.adults = adults.clamp(MIN_ADULTS, MAX_ADULTS);
        if self.adults + self.children > MAX_GUESTS {
            self.children = MAX_GUESTS - self.adults;
        }
    }

    /// Sets the child count, clamped to 0..=3 and to the seats the adults
    /// leave free.
    pub fn set_children(&mut self, children: u32) {
        self.children = children
            .min(MAX_CHILDREN)
            .min(MAX_GUESTS.saturating_sub(self.adults));
    }

    pub fn total_guests(&self) -> u32 {
        self.adults + self.children
    }

    /// Human-readable stay label, e.g.
    /// `Séjour - 2 Adulte(s), 1 Enfant(s) (3 nuits)`.
    pub fn stay_label(&self) -> String {
        format!(
            "Séjour - {} Adulte(s), {} Enfant(s) ({} nuits)",
            self.adults, self.children, self.nights
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
