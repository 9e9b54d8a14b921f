// src/query/mod.rs
//
// Filtering and aggregation over the normalized working set. Everything here
// is recomputed per query; nothing is persisted.

use std::collections::{BTreeSet, HashMap};

use crate::process::{TripRecord, KIND_NIGHT, KIND_TRIP};

/// Optional, ANDed record predicates.
#[derive(Debug, Clone, Default)]
pub struct FilterCriteria {
    /// Case-insensitive substring matched against every field value,
    /// derived ones included.
    pub text: Option<String>,
    /// Exact activity kind (trimmed comparison).
    pub kind: Option<String>,
    /// Exact derived city (trimmed comparison).
    pub city: Option<String>,
    /// Exact status (trimmed comparison).
    pub status: Option<String>,
}

impl FilterCriteria {
    fn matches(&self, record: &TripRecord) -> bool {
        if let Some(kind) = &self.kind {
            if record.kind.trim() != kind.trim() {
                return false;
            }
        }
        if let Some(city) = &self.city {
            if record.city.trim() != city.trim() {
                return false;
            }
        }
        if let Some(status) = &self.status {
            if record.status.trim() != status.trim() {
                return false;
            }
        }
        if let Some(text) = &self.text {
            let needle = text.to_lowercase();
            if !needle.is_empty() && !record.haystack().to_lowercase().contains(&needle) {
                return false;
            }
        }
        true
    }
}

/// Filter the working set, preserving its order.
pub fn filter<'a>(records: &'a [TripRecord], criteria: &FilterCriteria) -> Vec<&'a TripRecord> {
    records.iter().filter(|r| criteria.matches(r)).collect()
}

/// Summary figures over a filtered subset.
///
/// `km` and `cost` deliberately sum over every record in the subset
/// regardless of activity kind; see the ledger note and the pinning test.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Totals {
    /// Count of distinct calendar dates present.
    pub days: usize,
    pub trips: usize,
    pub nights: usize,
    pub km: f64,
    pub cost: f64,
}

pub fn totals(subset: &[&TripRecord]) -> Totals {
    let mut dates = BTreeSet::new();
    let mut out = Totals::default();
    for rec in subset {
        dates.insert(rec.date);
        match rec.kind.trim() {
            KIND_TRIP => out.trips += 1,
            KIND_NIGHT => out.nights += 1,
            _ => {}
        }
        out.km += rec.km;
        out.cost += rec.cost;
    }
    out.days = dates.len();
    out
}

/// Per-city rollup over a filtered subset, grouped by derived city.
#[derive(Debug, Clone, PartialEq)]
pub struct CityAggregate {
    pub city: String,
    /// Records of kind "Notte" in the group.
    pub nights: usize,
    /// "Trip" records leaving the group's city.
    pub departures: usize,
    /// "Trip" records arriving at the group's city.
    pub arrivals: usize,
    /// Km of "Trip" records only.
    pub km: f64,
    /// Cost of every record in the group.
    pub cost: f64,
}

/// Group the subset by derived city (records with no city are excluded) and
/// compute each group's rollup. Ordered by night count descending, then city
/// name ascending, compared case-insensitively.
pub fn city_rollup(subset: &[&TripRecord]) -> Vec<CityAggregate> {
    let mut groups: HashMap<&str, CityAggregate> = HashMap::new();

    for rec in subset {
        let city = rec.city.trim();
        if city.is_empty() {
            continue;
        }
        let agg = groups.entry(city).or_insert_with(|| CityAggregate {
            city: city.to_string(),
            nights: 0,
            departures: 0,
            arrivals: 0,
            km: 0.0,
            cost: 0.0,
        });

        match rec.kind.trim() {
            KIND_NIGHT => agg.nights += 1,
            KIND_TRIP => {
                if rec.from.trim() == city {
                    agg.departures += 1;
                }
                if rec.to.trim() == city {
                    agg.arrivals += 1;
                }
                agg.km += rec.km;
            }
            _ => {}
        }
        agg.cost += rec.cost;
    }

    let mut out: Vec<CityAggregate> = groups.into_values().collect();
    out.sort_by(|a, b| {
        b.nights
            .cmp(&a.nights)
            .then_with(|| a.city.to_lowercase().cmp(&b.city.to_lowercase()))
    });
    out
}
