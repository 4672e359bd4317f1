use std::collections::BTreeSet;

use chrono::NaiveDate;

use super::calendar;

/// Two-click range picker over the availability calendar. The first click
/// proposes a check-in day, the second closes the range; order does not
/// matter. Every transition lands back in a well-defined state, so a
/// rejected click never leaves a half-built range behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    Idle,
    StartPicked(NaiveDate),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// First click accepted; waiting for the closing click.
    Started(NaiveDate),
    /// Second click accepted; the range is final.
    Committed { start: NaiveDate, nights: u32 },
    /// First click landed on an occupied night.
    RejectedBookedStart(NaiveDate),
    /// The closed range would overlap existing bookings. The picker has
    /// reset; the next click starts a fresh selection.
    RejectedOverlap { start: NaiveDate, nights: u32 },
}

impl Selection {
    pub fn is_idle(self) -> bool {
        self == Self::Idle
    }

    /// Processes one calendar click against the current booked-night set.
    pub fn click(&mut self, day: NaiveDate, booked: &BTreeSet<NaiveDate>) -> ClickOutcome {
        match *self {
            Self::Idle => {
                if booked.contains(&day) {
                    // Cannot start a stay on a night someone already sleeps
                    return ClickOutcome::RejectedBookedStart(day);
                }
                *self = Self::StartPicked(day);
                ClickOutcome::Started(day)
            }
            Self::StartPicked(picked) => {
                let (start, end) = if day < picked {
                    (day, picked)
                } else {
                    (picked, day)
                };
                let raw_nights = u32::try_from((end - start).num_days()).unwrap_or(0);
                let nights = raw_nights.max(1);

                *self = Self::Idle;
                if calendar::overlaps(start, nights, booked) {
                    ClickOutcome::RejectedOverlap { start, nights }
                } else {
                    ClickOutcome::Committed { start, nights }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
