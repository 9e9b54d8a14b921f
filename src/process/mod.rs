// src/process/mod.rs
//
// Turns tokenized export rows into the typed, sorted working set the query
// engine runs over.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use tracing::{debug, info};

use crate::csv;
use crate::schema::{Field, HeaderIndex};

/// Activity kind of a movement between two places. Compared exactly.
pub const KIND_TRIP: &str = "Trip";
/// Activity kind of an overnight stay. Compared exactly.
pub const KIND_NIGHT: &str = "Notte";

/// One normalized activity. Immutable once built; the whole set is rebuilt
/// on every load.
#[derive(Debug, Clone)]
pub struct TripRecord {
    pub index_label: String,
    pub days: String,
    pub date_text: String,
    pub kind: String,
    pub from: String,
    pub to: String,
    pub place: String,
    pub lodging: String,
    pub status: String,
    pub km_text: String,
    pub cost_text: String,
    pub notes: String,
    pub address: String,
    pub link: String,

    /// Calendar date parsed from `date_text`; rows that fail to parse never
    /// become records at all.
    pub date: NaiveDate,
    pub km: f64,
    pub cost: f64,
    /// First non-empty of place / to / from.
    pub city: String,
    /// First non-empty of address / place / to / from.
    pub full_address: String,
}

impl TripRecord {
    /// ISO-8601 rendering of the record's date.
    pub fn date_iso(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    /// Every field value, raw and derived, for free-text matching.
    pub fn haystack(&self) -> String {
        [
            self.index_label.as_str(),
            self.days.as_str(),
            self.date_text.as_str(),
            &self.date_iso(),
            self.kind.as_str(),
            self.from.as_str(),
            self.to.as_str(),
            self.place.as_str(),
            self.lodging.as_str(),
            self.status.as_str(),
            self.km_text.as_str(),
            self.cost_text.as_str(),
            self.notes.as_str(),
            self.address.as_str(),
            self.link.as_str(),
            self.city.as_str(),
            self.full_address.as_str(),
        ]
        .join(" ")
    }
}

/// Strict parse of `"D/M/YYYY"` (one- or two-digit day and month, four-digit
/// year, `/` separators). Anything else is rejected.
pub fn parse_day_month_year(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let mut parts = s.split('/');
    let day = parts.next()?;
    let month = parts.next()?;
    let year = parts.next()?;
    if parts.next().is_some() || year.len() != 4 {
        return None;
    }
    if day.is_empty() || day.len() > 2 || month.is_empty() || month.len() > 2 {
        return None;
    }
    let day: u32 = day.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    let year: i32 = year.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Lenient numeric parse for km/cost cells: keep digits, commas, periods and
/// a leading minus, treat a comma as the decimal point, and fall back to 0.0
/// for anything that still fails to parse to a finite number.
pub fn parse_metric(raw: &str) -> f64 {
    let mut cleaned = String::with_capacity(raw.len());
    for ch in raw.trim().chars() {
        match ch {
            '0'..='9' | '.' | ',' => cleaned.push(ch),
            '-' if cleaned.is_empty() => cleaned.push('-'),
            _ => {}
        }
    }
    let cleaned = cleaned.replace(',', ".");
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

fn first_non_empty(candidates: &[&str]) -> String {
    candidates
        .iter()
        .map(|s| s.trim())
        .find(|s| !s.is_empty())
        .unwrap_or("")
        .to_string()
}

/// Normalize one raw row. Returns `None` when the row has no parsable date,
/// which silently drops it from the working set.
pub fn normalize_row(row: &[String], index: &HeaderIndex) -> Option<TripRecord> {
    let date_text = index.cell(row, Field::Date).to_string();
    let date = parse_day_month_year(&date_text)?;

    let from = index.cell(row, Field::From).to_string();
    let to = index.cell(row, Field::To).to_string();
    let place = index.cell(row, Field::Place).to_string();
    let address = index.cell(row, Field::Address).to_string();
    let km_text = index.cell(row, Field::Km).to_string();
    let cost_text = index.cell(row, Field::Cost).to_string();

    let city = first_non_empty(&[&place, &to, &from]);
    let full_address = first_non_empty(&[&address, &place, &to, &from]);
    let km = parse_metric(&km_text);
    let cost = parse_metric(&cost_text);

    Some(TripRecord {
        index_label: index.cell(row, Field::Index).to_string(),
        days: index.cell(row, Field::Days).to_string(),
        date_text,
        kind: index.cell(row, Field::Kind).to_string(),
        from,
        to,
        place,
        lodging: index.cell(row, Field::Lodging).to_string(),
        status: index.cell(row, Field::Status).to_string(),
        km_text,
        cost_text,
        notes: index.cell(row, Field::Notes).to_string(),
        address,
        link: index.cell(row, Field::Link).to_string(),
        date,
        km,
        cost,
        city,
        full_address,
    })
}

/// Build the full working set from raw export text: tokenize, resolve the
/// header from the first row, normalize the rest, then sort ascending by
/// date with "Trip" records ahead of other kinds on the same day.
pub fn build_records(text: &str) -> Result<Vec<TripRecord>> {
    let rows = csv::parse(text);
    if rows.is_empty() {
        bail!("export contains no rows");
    }

    let index = HeaderIndex::resolve(&rows[0]).context("resolving export header")?;

    let mut records: Vec<TripRecord> = Vec::with_capacity(rows.len().saturating_sub(1));
    let mut rejected = 0usize;
    for row in &rows[1..] {
        match normalize_row(row, &index) {
            Some(rec) => records.push(rec),
            None => rejected += 1,
        }
    }
    if rejected > 0 {
        debug!(rejected, "rows dropped for unparsable dates");
    }

    // Stable sort: equal keys keep their input order.
    records.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| (a.kind.trim() != KIND_TRIP).cmp(&(b.kind.trim() != KIND_TRIP)))
    });

    info!(records = records.len(), "working set built");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = "\
N.,Data,Tipo,Da,A,Luogo,Km,Costo,Stato,Note
1,5/3/2024,Trip,Milano,Roma,,580,\"45,50\",ok,partenza mattina
2,5/3/2024,Notte,,,Roma,,120 eur,ok,
3,2024-03-06,Trip,Roma,Napoli,,220,30,ok,data rotta
4,7/3/2024,Notte,,,Napoli,abc,0,ok,
";

    #[test]
    fn date_parses_day_month_year_only() {
        assert_eq!(
            parse_day_month_year("5/3/2024"),
            NaiveDate::from_ymd_opt(2024, 3, 5)
        );
        assert_eq!(
            parse_day_month_year(" 15/12/2023 "),
            NaiveDate::from_ymd_opt(2023, 12, 15)
        );
        assert_eq!(parse_day_month_year("2024-03-05"), None);
        assert_eq!(parse_day_month_year("5/3/24"), None);
        assert_eq!(parse_day_month_year("5/3/2024/1"), None);
        assert_eq!(parse_day_month_year("31/2/2024"), None);
        assert_eq!(parse_day_month_year(""), None);
    }

    #[test]
    fn metrics_parse_leniently_and_default_to_zero() {
        assert_eq!(parse_metric("120 km"), 120.0);
        assert_eq!(parse_metric("abc"), 0.0);
        assert_eq!(parse_metric("1,5"), 1.5);
        assert_eq!(parse_metric("€ 45.50"), 45.5);
        assert_eq!(parse_metric("-12"), -12.0);
        assert_eq!(parse_metric(""), 0.0);
    }

    #[test]
    fn rows_with_bad_dates_are_silently_dropped() {
        let records = build_records(EXPORT).unwrap();
        // row 3 carries an ISO-shaped date and must not survive
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.index_label != "3"));
    }

    #[test]
    fn derived_city_and_address_follow_the_fallback_chain() {
        let records = build_records(EXPORT).unwrap();
        let trip = records.iter().find(|r| r.index_label == "1").unwrap();
        // no place, so city falls back to the destination
        assert_eq!(trip.city, "Roma");
        assert_eq!(trip.full_address, "Roma");

        let night = records.iter().find(|r| r.index_label == "2").unwrap();
        assert_eq!(night.city, "Roma");
    }

    #[test]
    fn working_set_sorts_by_date_with_trips_first_on_ties() {
        let records = build_records(EXPORT).unwrap();
        assert_eq!(records[0].kind, "Trip");
        assert_eq!(records[1].kind, "Notte");
        assert_eq!(records[0].date_iso(), "2024-03-05");
        assert_eq!(records[2].date_iso(), "2024-03-07");
    }

    #[test]
    fn derived_numbers_are_always_finite() {
        let records = build_records(EXPORT).unwrap();
        let night = records.iter().find(|r| r.index_label == "4").unwrap();
        assert_eq!(night.km, 0.0); // "abc"
        let trip = records.iter().find(|r| r.index_label == "1").unwrap();
        assert_eq!(trip.cost, 45.5); // "45,50"
    }

    #[test]
    fn missing_date_column_fails_the_load() {
        assert!(build_records("Da,A\nMilano,Roma\n").is_err());
    }

    #[test]
    fn empty_input_fails_the_load() {
        assert!(build_records("").is_err());
        assert!(build_records("\n\n").is_err());
    }
}
