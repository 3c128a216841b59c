//! CLI entry point for the trip pattern tool.
//!
//! Provides subcommands for checking authored route patterns against a GTFS
//! feed, classifying every trip of the feed, printing merged stop sequences
//! and querying the stop order of a single route direction.

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use trip_patterns::feed::Feed;
use trip_patterns::label::{BasicLabelCleaner, LabelCleaner};
use trip_patterns::output::{print_json, write_classified_trips, write_json};
use trip_patterns::pipeline::{classify_feed, summarize_directions};
use trip_patterns::report::RunReport;
use trip_patterns::{DirectionId, PatternConfig, PatternRegistry, RouteId, StopId, compare_order};

#[derive(Parser)]
#[command(name = "trip_patterns")]
#[command(about = "Classify GTFS trips against authored route patterns", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile every route pattern against the feed's stops
    Check {
        /// JSON pattern file
        #[arg(short, long, default_value = "patterns.json")]
        patterns: PathBuf,

        /// Directory holding the GTFS text files
        #[arg(short, long)]
        feed: PathBuf,
    },
    /// Classify every trip of the feed and write one CSV row per trip
    Classify {
        /// JSON pattern file
        #[arg(short, long, default_value = "patterns.json")]
        patterns: PathBuf,

        /// Directory holding the GTFS text files
        #[arg(short, long)]
        feed: PathBuf,

        /// CSV file to write classified trips to
        #[arg(short, long, default_value = "classified_trips.csv")]
        output: PathBuf,

        /// Optional: JSON file to write the run report to
        #[arg(short, long)]
        report: Option<PathBuf>,
    },
    /// Merge the stop sequence of each route direction
    Sequences {
        /// JSON pattern file
        #[arg(short, long, default_value = "patterns.json")]
        patterns: PathBuf,

        /// Directory holding the GTFS text files
        #[arg(short, long)]
        feed: PathBuf,

        /// Only this route
        #[arg(long)]
        route: Option<String>,

        /// Optional: JSON file to write the sequences to
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show which of two stops comes first in one direction of a route
    Compare {
        /// JSON pattern file
        #[arg(short, long, default_value = "patterns.json")]
        patterns: PathBuf,

        #[arg(long)]
        route: String,

        /// GTFS direction_id (0 or 1)
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=1))]
        direction: u8,

        #[arg(long)]
        stop_a: String,

        #[arg(long)]
        stop_b: String,

        /// Feed stop_sequence of the first stop, used when the pattern can't decide
        #[arg(long, default_value_t = 0)]
        seq_a: u32,

        /// Feed stop_sequence of the second stop
        #[arg(long, default_value_t = 0)]
        seq_b: u32,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/trip_patterns.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("trip_patterns.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let labels = BasicLabelCleaner;

    match cli.command {
        Commands::Check { patterns, feed } => {
            let (feed, registry) = load(&patterns, &feed)?;

            for (route, pattern) in registry.iter() {
                let trips = feed.trips_of(route).count();
                info!(
                    route = %route,
                    outbound = %pattern.headsign(DirectionId::Outbound),
                    inbound = %pattern.headsign(DirectionId::Inbound),
                    outbound_stops = pattern.descriptor(DirectionId::Outbound).stops.len(),
                    inbound_stops = pattern.descriptor(DirectionId::Inbound).stops.len(),
                    trips,
                    "Route pattern OK"
                );
                if trips == 0 {
                    warn!(route = %route, "Pattern route has no trips in the feed");
                }
            }

            info!(routes = registry.len(), "All route patterns compiled");
        }
        Commands::Classify {
            patterns,
            feed,
            output,
            report,
        } => {
            let (feed, registry) = load(&patterns, &feed)?;
            let classified = classify_feed(&registry, &feed.trips, &labels)?;

            write_classified_trips(&output, &classified)?;
            info!(path = %output.display(), rows = classified.len(), "Classified trips written");

            let run = RunReport::from_classified(&registry, &classified);
            info!(
                total = run.total_trips,
                outbound = run.outbound,
                inbound = run.inbound,
                tie_break_pct = run.tie_break_pct(),
                "Classification summary"
            );
            match report {
                Some(path) => write_json(&path, &run)?,
                None => print_json(&run)?,
            }
        }
        Commands::Sequences {
            patterns,
            feed,
            route,
            output,
        } => {
            let (feed, registry) = load(&patterns, &feed)?;
            let route = route.map(RouteId::new);
            let trips: Vec<_> = feed
                .trips
                .into_iter()
                .filter(|t| route.as_ref().is_none_or(|r| &t.route_id == r))
                .collect();
            if trips.is_empty() {
                warn!(route = ?route, "No trips to sequence");
            }

            let classified = classify_feed(&registry, &trips, &labels)?;
            let summaries = summarize_directions(&registry, &classified)?;

            for summary in &summaries {
                info!(
                    route = %summary.route_id,
                    direction = %summary.direction_id,
                    headsign = %summary.headsign,
                    trips = summary.trip_ids.len(),
                    stops = summary.stops.len(),
                    "Direction"
                );
                for visit in &summary.stops {
                    let name = feed
                        .stops
                        .get(&visit.stop_id)
                        .map(|s| labels.clean_stop_name(&s.name))
                        .unwrap_or_default();
                    debug!(sequence = visit.sequence, stop = %visit.stop_id, name = %name, "Stop");
                }
            }

            match output {
                Some(path) => write_json(&path, &summaries)?,
                None => print_json(&summaries)?,
            }
        }
        Commands::Compare {
            patterns,
            route,
            direction,
            stop_a,
            stop_b,
            seq_a,
            seq_b,
        } => {
            let config = PatternConfig::load(&patterns)?;
            let registry = PatternRegistry::compile(&config)?;
            let route = RouteId::new(route);
            let pattern = registry
                .get(&route)
                .ok_or_else(|| anyhow!("Route {route} has no pattern in {}", patterns.display()))?;
            let direction = DirectionId::from_gtfs(direction)
                .ok_or_else(|| anyhow!("Unknown direction_id {direction}"))?;

            let (a, b) = (StopId::new(stop_a), StopId::new(stop_b));
            let verdict = compare_order(pattern, direction, &a, &b, seq_a, seq_b);
            info!(
                route = %route,
                direction = %direction,
                stop_a = %a,
                stop_b = %b,
                canonical = pattern.position(direction, &a).is_some()
                    && pattern.position(direction, &b).is_some(),
                ?verdict,
                "Stop order"
            );
        }
    }

    Ok(())
}

/// Loads the feed and compiles the pattern file against its stops.
#[tracing::instrument(skip_all, fields(patterns = %patterns.display(), feed = %feed_dir.display()))]
fn load(patterns: &Path, feed_dir: &Path) -> Result<(Feed, PatternRegistry)> {
    let feed = Feed::load(feed_dir)?;
    let config = PatternConfig::load(patterns)?;
    let registry = PatternRegistry::compile_with_stops(&config, &feed.stops)
        .with_context(|| format!("compiling {}", patterns.display()))?;
    Ok((feed, registry))
}
