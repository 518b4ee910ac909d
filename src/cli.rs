//! Command-line interface parsing for Skycast
//!
//! This module defines the clap command tree. Every data command maps to
//! one orchestrator operation; `--refresh` forces a network fetch subject
//! only to the rate limiter.

use clap::{Parser, Subcommand};

/// Skycast - city weather with caching, rate limiting and auto-refresh
#[derive(Parser, Debug)]
#[command(name = "skycast")]
#[command(about = "Fetch and watch city weather")]
#[command(version)]
pub struct Cli {
    /// Force a network fetch even if a fresh cached value exists
    #[arg(long, global = true)]
    pub refresh: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show current weather for a city
    Current {
        /// City name, e.g. "Paris"
        city: String,
    },

    /// Show the 5-day forecast for a city
    Forecast {
        /// City name, e.g. "Paris"
        city: String,
    },

    /// Search cities by name prefix
    Search {
        /// Free-text query, at least two characters
        query: String,
    },

    /// Show current weather at a latitude/longitude
    Coords {
        /// Latitude in decimal degrees
        lat: f64,
        /// Longitude in decimal degrees
        lon: f64,
    },

    /// Refresh current weather for cities periodically until Ctrl-C
    Watch {
        /// Cities to keep refreshed
        #[arg(required = true)]
        cities: Vec<String>,

        /// Refresh interval in seconds (default from config)
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Show cache statistics
    Stats,

    /// Clear all cached entries
    Clear,

    /// Store the API key in the config file
    Configure {
        /// OpenWeatherMap API key
        api_key: String,
    },
}
