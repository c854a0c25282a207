//! Month ranges and per-day grouping for calendar views.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, Weekday};

use crate::models::{SexEvent, Symptom};

fn first_of_next_month(year: i32, month: u32) -> Option<NaiveDate> {
    if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
}

/// Every date of the given month, in order. `None` for an invalid month.
pub fn month_days(year: i32, month: u32) -> Option<Vec<NaiveDate>> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = first_of_next_month(year, month)?;
    Some(first.iter_days().take_while(|d| *d < next).collect())
}

/// Month laid out in whole weeks starting on `week_start`, with `None`
/// padding before the first and after the last day.
pub fn month_grid(year: i32, month: u32, week_start: Weekday) -> Option<Vec<Option<NaiveDate>>> {
    let days = month_days(year, month)?;
    let first = *days.first()?;

    let leading = (first.weekday().num_days_from_monday() + 7
        - week_start.num_days_from_monday())
        % 7;

    let mut grid: Vec<Option<NaiveDate>> = vec![None; leading as usize];
    grid.extend(days.into_iter().map(Some));
    while grid.len() % 7 != 0 {
        grid.push(None);
    }
    Some(grid)
}

pub fn symptoms_by_day(symptoms: &[Symptom]) -> BTreeMap<NaiveDate, Vec<&Symptom>> {
    let mut by_day: BTreeMap<NaiveDate, Vec<&Symptom>> = BTreeMap::new();
    for symptom in symptoms {
        by_day.entry(symptom.date).or_default().push(symptom);
    }
    by_day
}

/// More than one event per day is kept.
pub fn sex_events_by_day(events: &[SexEvent]) -> BTreeMap<NaiveDate, Vec<&SexEvent>> {
    let mut by_day: BTreeMap<NaiveDate, Vec<&SexEvent>> = BTreeMap::new();
    for event in events {
        by_day.entry(event.date).or_default().push(event);
    }
    by_day
}
