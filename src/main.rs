//! Skycast - fetch and watch city weather from the command line
//!
//! Wires the acquisition core together: disk cache, process-wide rate
//! limiter, fetch orchestrator and (for `watch`) the refresh scheduler.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use futures::future::join_all;
use futures::FutureExt;
use serde_json::Value;

use log::warn;
use skycast::cache::{CacheManager, DiskStore};
use skycast::cli::{Cli, Command};
use skycast::clock::{Clock, SystemClock};
use skycast::config::Config;
use skycast::error::AcquireError;
use skycast::fetch::{FetchResult, OpenWeatherClient, Orchestrator};
use skycast::limiter::{RateLimiter, WINDOW_LENGTH_MS};
use skycast::scheduler::{RefreshCallback, Scheduler, VisibilityGate};

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        // The generic Display hides transport causes; keep them in the log
        if let Some(acquire) = e.downcast_ref::<AcquireError>() {
            warn!("acquire failed: {}", acquire.detail());
        }
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Command::Configure { api_key } = &cli.command {
        let mut config = Config::load()?;
        config.api_key = Some(api_key.clone());
        config.save()?;
        println!("API key saved.");
        return Ok(());
    }

    let config = Config::load()?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = DiskStore::new().ok_or("could not determine a cache directory")?;
    let cache = CacheManager::new(Arc::new(store), clock.clone())
        .with_ttl_millis(config.cache_ttl_ms);
    let limiter = Arc::new(RateLimiter::with_limits(
        clock,
        config.max_calls_per_window,
        WINDOW_LENGTH_MS,
    ));

    // Cache maintenance commands work without an API key
    match &cli.command {
        Command::Stats => {
            let stats = cache.stats();
            println!(
                "cache entries: {} total, {} fresh, {} stale",
                stats.total, stats.fresh, stats.stale
            );
            return Ok(());
        }
        Command::Clear => {
            cache.invalidate_all();
            println!("Cache cleared.");
            return Ok(());
        }
        _ => {}
    }

    let api_key = config.resolved_api_key().ok_or(
        "no API key configured; run `skycast configure <key>` or set SKYCAST_API_KEY",
    )?;
    let mut client = OpenWeatherClient::new(api_key);
    if let Some(url) = &config.api_base_url {
        client = client.with_api_base_url(url);
    }
    if let Some(url) = &config.geo_base_url {
        client = client.with_geo_base_url(url);
    }

    let orchestrator = Orchestrator::new(Arc::new(client), cache, limiter);
    let force = cli.refresh;

    match cli.command {
        Command::Current { city } => {
            let result = orchestrator.fetch_current(&city, force).await?;
            println!("{}{}", render_current(&result.data), cache_marker(&result));
        }
        Command::Forecast { city } => {
            let result = orchestrator.fetch_forecast(&city, force).await?;
            println!("Forecast for {}{}", city, cache_marker(&result));
            print!("{}", render_forecast(&result.data));
        }
        Command::Search { query } => {
            let matches = orchestrator.search_cities(&query).await?;
            if matches.is_empty() {
                println!("No cities found for \"{}\".", query);
            }
            for city in matches {
                println!("{}  ({}, {})", city.display, city.lat, city.lon);
            }
        }
        Command::Coords { lat, lon } => {
            let result = orchestrator.fetch_by_coords(lat, lon, force).await?;
            println!("{}{}", render_current(&result.data), cache_marker(&result));
        }
        Command::Watch { cities, interval } => {
            let interval_secs = interval.unwrap_or(config.refresh_interval_secs);
            watch(orchestrator, cities, Duration::from_secs(interval_secs)).await?;
        }
        Command::Stats | Command::Clear | Command::Configure { .. } => unreachable!(),
    }

    Ok(())
}

/// Runs the refresh scheduler over a fixed set of cities until Ctrl-C
async fn watch(
    orchestrator: Orchestrator,
    cities: Vec<String>,
    interval: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    // A terminal session is always foregrounded; the gate exists so the
    // same scheduler works for embedders with a real visibility signal.
    let gate = VisibilityGate::new(true);
    let mut scheduler = Scheduler::new(gate);

    let cities = Arc::new(cities);
    let callback: RefreshCallback = Arc::new(move || {
        let orchestrator = orchestrator.clone();
        let cities = cities.clone();
        async move {
            let fetches = cities
                .iter()
                .map(|city| refresh_city(orchestrator.clone(), city.clone()));
            join_all(fetches).await;
        }
        .boxed()
    });

    println!(
        "Watching (refresh every {}s). Press Ctrl-C to stop.",
        interval.as_secs()
    );
    scheduler.arm(callback, interval);
    scheduler.manual_trigger().await;

    tokio::signal::ctrl_c().await?;
    scheduler.disarm();
    println!("\nStopped.");
    Ok(())
}

/// Fetches one city for the watch loop, printing the outcome
///
/// Failures are printed and swallowed so one bad city never stops the
/// others or future ticks.
async fn refresh_city(orchestrator: Orchestrator, city: String) {
    match orchestrator.fetch_current(&city, true).await {
        Ok(result) => println!("{}", render_current(&result.data)),
        Err(e) => {
            warn!("refresh of {} failed: {}", city, e.detail());
            eprintln!("{}: {}", city, e);
        }
    }
}

/// One-line summary of a current-weather payload
fn render_current(data: &Value) -> String {
    let name = data.get("name").and_then(Value::as_str);
    let temp = data.pointer("/main/temp").and_then(Value::as_f64);
    let description = data.pointer("/weather/0/description").and_then(Value::as_str);

    match (name, temp) {
        (Some(name), Some(temp)) => {
            let mut line = format!("{}: {:.1}\u{b0}C", name, temp);
            if let Some(description) = description {
                line.push_str(&format!(", {}", description));
            }
            if let Some(humidity) = data.pointer("/main/humidity").and_then(Value::as_u64) {
                line.push_str(&format!(", humidity {}%", humidity));
            }
            if let Some(wind) = data.pointer("/wind/speed").and_then(Value::as_f64) {
                line.push_str(&format!(", wind {} m/s", wind));
            }
            line
        }
        // Unexpected shape: show the raw payload instead of guessing
        _ => serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string()),
    }
}

/// First day of a forecast payload, one line per 3-hour slot
fn render_forecast(data: &Value) -> String {
    let Some(list) = data.get("list").and_then(Value::as_array) else {
        return serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string());
    };

    let mut out = String::new();
    for slot in list.iter().take(8) {
        let when = slot.get("dt_txt").and_then(Value::as_str).unwrap_or("?");
        let temp = slot.pointer("/main/temp").and_then(Value::as_f64);
        let description = slot
            .pointer("/weather/0/description")
            .and_then(Value::as_str)
            .unwrap_or("");
        match temp {
            Some(temp) => {
                out.push_str(&format!("  {}  {:>6.1}\u{b0}C  {}\n", when, temp, description))
            }
            None => out.push_str(&format!("  {}\n", when)),
        }
    }
    out
}

/// Suffix telling the user a value came from cache and how old it is
fn cache_marker(result: &FetchResult) -> String {
    if result.came_from_cache {
        format!(" (cached, {}s old)", result.age_seconds)
    } else {
        String::new()
    }
}
