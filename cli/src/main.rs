//! pivotfx command line
//!
//! Looks up one exchange rate and prints it.

use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::Parser;
use pivotfx_common::Currency;
use pivotfx_fx::{EngineConfig, ProviderStats, RateEngine, RateQuery, RateRecord};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Exchange rate lookup
#[derive(Parser, Debug)]
#[command(name = "fxrate")]
#[command(about = "Resolve exchange rates from ECB and IMF reference data")]
struct Args {
    /// Currency to convert from
    base: String,

    /// Currency to convert to
    term: String,

    /// Day the rate must be valid for (YYYY-MM-DD); latest if omitted
    #[arg(short, long)]
    date: Option<NaiveDate>,

    /// Restrict to a provider (repeatable)
    #[arg(short, long = "provider")]
    providers: Vec<String>,

    /// Use cached or bundled data only
    #[arg(long)]
    offline: bool,

    /// JSON engine configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// Also look up the rate in the opposite direction
    #[arg(long)]
    reverse: bool,

    /// Include provider and loader statistics
    #[arg(long)]
    stats: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

#[derive(Serialize)]
struct Report {
    rate: RateRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    reversed: Option<RateRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    providers: Option<Vec<ProviderStats>>,
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
    );
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn load_config(args: &Args) -> anyhow::Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?
        }
        None => EngineConfig::default(),
    };
    config.apply_env();
    if args.offline {
        config.loader.offline = true;
    }

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    Ok(config)
}

fn build_query(args: &Args) -> anyhow::Result<RateQuery> {
    let base = Currency::parse(&args.base).context("base currency")?;
    let term = Currency::parse(&args.term).context("term currency")?;

    let mut query = RateQuery::new(base, term).with_providers(args.providers.iter().cloned());
    query.as_of = args.date;
    Ok(query)
}

fn print_text(report: &Report) {
    println!("{}", report.rate);
    for link in report.rate.chain() {
        println!("  via {link}");
    }
    if let Some(reversed) = &report.reversed {
        println!("{reversed}");
    }
    if let Some(providers) = &report.providers {
        for p in providers {
            println!(
                "{:<12} {:<14} days={:<5} latest={} loads={} failures={}",
                p.name,
                p.state.to_string(),
                p.table.days,
                p.table.latest.map(|d| d.to_string()).unwrap_or_else(|| "-".into()),
                p.successful_loads,
                p.failed_loads,
            );
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log_json);

    let config = load_config(&args)?;
    let query = build_query(&args)?;
    debug!(query = %query, offline = config.loader.offline, "Resolving rate");

    let engine = RateEngine::bootstrap(config).await?;

    let result = engine.get_exchange_rate(&query).await;
    let rate = match result {
        Ok(rate) => rate,
        Err(e) => {
            engine.shutdown();
            return Err(e).with_context(|| format!("no rate for {query}"));
        }
    };

    let reversed = if args.reverse {
        Some(engine.get_reversed(&rate).await.context("reverse rate")?)
    } else {
        None
    };

    let report = Report {
        rate,
        reversed,
        providers: args.stats.then(|| engine.provider_stats()),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_text(&report);
    }

    if args.stats {
        let metrics = engine.loader_metrics();
        info!(
            loads = metrics.loads_started,
            remote = metrics.remote_hits,
            cache = metrics.cache_hits,
            backup = metrics.backup_hits,
            rejected = metrics.rejected_payloads,
            "Loader statistics"
        );
    }

    engine.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_args() {
        let args = Args::try_parse_from([
            "fxrate", "usd", "brl", "--date", "2024-01-02", "-p", "ECB", "-p", "ECB-HIST90", "--offline",
        ])
        .unwrap();

        let query = build_query(&args).unwrap();
        assert_eq!(query.base, Currency::usd());
        assert_eq!(query.term, Currency::new("BRL"));
        assert_eq!(query.as_of, NaiveDate::from_ymd_opt(2024, 1, 2));
        assert_eq!(query.providers, vec!["ECB", "ECB-HIST90"]);
        assert!(args.offline);
    }

    #[test]
    fn test_invalid_currency_rejected() {
        let args = Args::try_parse_from(["fxrate", "US", "EUR"]).unwrap();
        assert!(build_query(&args).is_err());
    }

    #[test]
    fn test_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{"providers": ["ECB"], "use_cache": false}"#).unwrap();

        let args = Args::try_parse_from([
            "fxrate", "EUR", "USD", "--offline", "--config", path.to_str().unwrap(),
        ])
        .unwrap();
        let config = load_config(&args).unwrap();
        assert_eq!(config.providers, vec!["ECB"]);
        assert!(!config.use_cache);
        assert!(config.loader.offline);
    }
}
