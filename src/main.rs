use anyhow::{bail, Result};
use reqwest::Client;
use std::env;
use std::fs;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};
use triplog::{fetch, query, Geocoder, Session};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env_filter).init();

    // ─── 2) args: export source (URL or file), optional cache path ───
    let mut args = env::args().skip(1);
    let source = match args.next() {
        Some(s) => s,
        None => bail!("usage: triplog <export-url-or-file> [geocache-path]"),
    };
    let cache_path = args.next().unwrap_or_else(|| "geocache.json".to_string());

    // ─── 3) load the export ──────────────────────────────────────────
    let text = if source.starts_with("http://") || source.starts_with("https://") {
        let client = Client::new();
        fetch::fetch_export(&client, &source).await?
    } else {
        fs::read_to_string(&source)?
    };

    let mut session = Session::new();
    let count = session.load(&text)?;
    info!(records = count, source = %source, "export loaded");

    // ─── 4) totals + per-city rollup ─────────────────────────────────
    let subset = query::filter(session.records(), &query::FilterCriteria::default());
    let totals = query::totals(&subset);
    println!(
        "{} days, {} trips, {} nights, {:.1} km, {:.2} spent",
        totals.days, totals.trips, totals.nights, totals.km, totals.cost
    );

    let rollup = query::city_rollup(&subset);
    for agg in &rollup {
        println!(
            "{:<24} nights {:>3}  out {:>3}  in {:>3}  km {:>8.1}  cost {:>9.2}",
            agg.city, agg.nights, agg.departures, agg.arrivals, agg.km, agg.cost
        );
    }

    // ─── 5) geocode the rollup cities through the shared limiter ─────
    let geocoder = Geocoder::new(&cache_path);
    for agg in &rollup {
        match geocoder.resolve(&agg.city).await {
            Some(point) => {
                info!(city = %agg.city, lat = point.lat, lon = point.lon, label = %point.label, "resolved")
            }
            None => warn!(city = %agg.city, "no match"),
        }
    }
    info!(cached = geocoder.cached_len(), cache = %cache_path, "geocoding done");

    Ok(())
}
