use std::collections::BTreeSet;

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

use super::annotation;
use super::transaction::Transaction;
use crate::error::{LedgerError, Result};

// ---------------------------------------------------------------------------
// Booked nights
// ---------------------------------------------------------------------------

/// The nights occupied by a stay: the half-open day range
/// `[start, start + nights)`. The check-out day itself is not a night and
/// is free for the next arrival.
pub fn night_range(start: NaiveDate, nights: u32) -> Vec<NaiveDate> {
    (0..u64::from(nights))
        .filter_map(|offset| start.checked_add_days(Days::new(offset)))
        .collect()
}

/// Collects every occupied night across the booking records. A booking
/// blocks the nights of its stay; one without structured details falls back
/// to the night count named in its description, then to a single night.
/// `exclude_id` drops the record currently being edited so it never collides
/// with itself.
pub fn booked_nights(transactions: &[Transaction], exclude_id: Option<&str>) -> BTreeSet<NaiveDate> {
    let mut booked = BTreeSet::new();
    for t in transactions {
        if let Some(id) = exclude_id
            && t.id == id
        {
            continue;
        }
        if !t.is_booking() {
            continue;
        }
        let nights = t
            .booking
            .as_ref()
            .map(|b| b.nights)
            .or_else(|| annotation::nights_hint(&t.description))
            .unwrap_or(1);
        booked.extend(night_range(t.date, nights));
    }
    booked
}

/// True iff any night of the candidate range is already occupied.
pub fn overlaps(start: NaiveDate, nights: u32, booked: &BTreeSet<NaiveDate>) -> bool {
    night_range(start, nights)
        .iter()
        .any(|night| booked.contains(night))
}

/// The occupied nights a candidate range would collide with, in order.
pub fn conflicting_nights(
    start: NaiveDate,
    nights: u32,
    booked: &BTreeSet<NaiveDate>,
) -> Vec<NaiveDate> {
    night_range(start, nights)
        .into_iter()
        .filter(|night| booked.contains(night))
        .collect()
}

// ---------------------------------------------------------------------------
// Month grid
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, schemars::JsonSchema, PartialEq, Eq)]
pub enum DayStatus {
    Free,
    Booked,
    /// Night of the range currently being composed in the form.
    Selected,
    /// Selected and already booked; the save gate is active.
    Conflict,
}

impl std::fmt::Display for DayStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Free => write!(f, "Free"),
            Self::Booked => write!(f, "Booked"),
            Self::Selected => write!(f, "Selected"),
            Self::Conflict => write!(f, "Conflict"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema, PartialEq)]
pub struct GridDay {
    pub date: NaiveDate,
    pub day: u32,
    pub status: DayStatus,
}

/// One month of the availability calendar, Monday-first. Leading `None`
/// cells pad the first week so day cells fall under the right weekday
/// column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonthGrid {
    pub year: i32,
    pub month: u32,
    pub days: Vec<Option<GridDay>>,
}

pub fn days_in_month(year: i32, month: u32) -> Result<u32> {
    let first = first_of_month(year, month)?;
    let next = if month == 12 {
        first_of_month(year + 1, 1)?
    } else {
        first_of_month(year, month + 1)?
    };
    Ok(u32::try_from((next - first).num_days()).unwrap_or(0))
}

fn first_of_month(year: i32, month: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| LedgerError::InvalidParams {
        reason: format!("invalid month: {year:04}-{month:02}"),
    })
}

/// Builds the month grid, marking booked nights and the caller's current
/// selection. A day that is both selected and booked renders as a conflict.
pub fn month_grid(
    year: i32,
    month: u32,
    booked: &BTreeSet<NaiveDate>,
    selected: &BTreeSet<NaiveDate>,
) -> Result<MonthGrid> {
    let first = first_of_month(year, month)?;
    let day_count = days_in_month(year, month)?;

    let offset = first.weekday().num_days_from_monday() as usize;
    let mut days: Vec<Option<GridDay>> = vec![None; offset];

    for day in 1..=day_count {
        let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
            LedgerError::InvalidParams {
                reason: format!("invalid day: {year:04}-{month:02}-{day:02}"),
            }
        })?;
        let status = match (selected.contains(&date), booked.contains(&date)) {
            (true, true) => DayStatus::Conflict,
            (false, true) => DayStatus::Booked,
            (true, false) => DayStatus::Selected,
            (false, false) => DayStatus::Free,
        };
        days.push(Some(GridDay { date, day, status }));
    }

    Ok(MonthGrid { year, month, days })
}

impl std::fmt::Display for MonthGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{:04}-{:02}", self.year, self.month)?;
        writeln!(f, " Mo  Tu  We  Th  Fr  Sa  Su")?;
        for (i, cell) in self.days.iter().enumerate() {
            match cell {
                Some(grid_day) => {
                    let marker = match grid_day.status {
                        DayStatus::Free => ' ',
                        DayStatus::Booked => '*',
                        DayStatus::Selected => '+',
                        DayStatus::Conflict => '!',
                    };
                    write!(f, "{:>3}{marker}", grid_day.day)?;
                }
                None => write!(f, "    ")?,
            }
            if (i + 1) % 7 == 0 {
                writeln!(f)?;
            }
        }
        if self.days.len() % 7 != 0 {
            writeln!(f)?;
        }
        write!(f, "(* booked, + selected, ! conflict)")
    }
}

// ---------------------------------------------------------------------------
// Occupancy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema, PartialEq)]
pub struct MonthOccupancy {
    pub year: i32,
    pub month: u32,
    pub days_in_month: u32,
    pub nights_booked: u32,
    pub nights_free: u32,
    pub occupancy_rate: f64,
}

/// Share of the month's nights that are booked.
pub fn month_occupancy(
    year: i32,
    month: u32,
    booked: &BTreeSet<NaiveDate>,
) -> Result<MonthOccupancy> {
    let day_count = days_in_month(year, month)?;
    let nights_booked = booked
        .iter()
        .filter(|d| d.year() == year && d.month() == month)
        .count();
    let nights_booked = u32::try_from(nights_booked).unwrap_or(u32::MAX);
    Ok(MonthOccupancy {
        year,
        month,
        days_in_month: day_count,
        nights_booked,
        nights_free: day_count.saturating_sub(nights_booked),
        occupancy_rate: if day_count > 0 {
            f64::from(nights_booked) / f64::from(day_count) * 100.0
        } else {
            0.0
        },
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
