use anyhow::Context;
use chrono::Utc;
use clap::{Parser, ValueEnum};
use graha_core::cache::ResultCache;
use graha_core::config::{load_engine_config, EngineConfig};
use graha_core::ephemeris::SwissEphemerisProvider;
use graha_core::refresh::RefreshCoordinator;
use graha_core::rules::RuleCatalog;
use graha_core::HoroscopeService;
use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Clone, Debug, ValueEnum)]
enum Mode {
    /// Refresh now, then again at every scheduled trigger until interrupted.
    Serve,
    /// Refresh once, print the snapshots as JSON and exit.
    Once,
    /// Validate the rule catalog and exit.
    Validate,
}

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Engine config file (otherwise `$GRAHA_CONFIG` or `configs/engine.toml`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Rule catalog override.
    #[arg(long)]
    catalog: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Mode::Serve)]
    mode: Mode,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = load_engine_config(args.config.as_deref())?;
    if let Some(path) = args.catalog {
        config.catalog_path = path;
    }

    let catalog = match RuleCatalog::load_from_path(&config.catalog_path, &config.limits) {
        Ok(catalog) => catalog,
        Err(err) => {
            error!("Rule catalog {} rejected: {}", config.catalog_path.display(), err);
            std::process::exit(1);
        }
    };
    if matches!(args.mode, Mode::Validate) {
        println!("{} ({} rules) OK", catalog.version(), catalog.len());
        return Ok(());
    }

    let coordinator = Arc::new(build_coordinator(&config, catalog)?);

    let report = coordinator.refresh_daily().await;
    if matches!(args.mode, Mode::Once) {
        let snapshots = serde_json::to_string_pretty(&coordinator.snapshots())?;
        println!("{}", snapshots);
        if !report.is_complete() {
            std::process::exit(2);
        }
        return Ok(());
    }

    serve(coordinator).await;
    Ok(())
}

fn build_coordinator(
    config: &EngineConfig,
    catalog: RuleCatalog,
) -> anyhow::Result<RefreshCoordinator> {
    let provider = SwissEphemerisProvider::new(&config.ephemeris)
        .context("Failed to initialise the Swiss Ephemeris provider")?;
    info!(
        "Swiss Ephemeris data at {} (sidereal mode {:?})",
        provider.ephemeris_path().display(),
        provider.sidereal_mode()
    );
    let service = HoroscopeService::new(Arc::new(provider), Arc::new(catalog), config.chart.clone())
        .with_retry(config.retry.clone())
        .with_cache(ResultCache::with_capacity(config.cache_capacity))
        .with_score_scale(config.score_scale);
    Ok(RefreshCoordinator::new(Arc::new(service), config.refresh.clone()))
}

async fn serve(coordinator: Arc<RefreshCoordinator>) {
    let schedule = coordinator.schedule().clone();
    loop {
        let now = Utc::now();
        let next = schedule.next_after(now);
        let wait = (next - now).to_std().unwrap_or_default();
        info!("Next daily refresh at {} (in {:?})", next, wait);

        tokio::select! {
            _ = tokio::time::sleep(wait) => {
                let fired = Utc::now();
                if !schedule.within_grace(next, fired) {
                    warn!(
                        "Skipping refresh scheduled for {}: woke at {}, past the misfire grace",
                        next, fired
                    );
                    continue;
                }
                let report = coordinator.refresh_at(next).await;
                if !report.is_complete() {
                    warn!(
                        "Refresh for {} left {} chart(s) on their previous snapshot",
                        report.day,
                        report.failures.len()
                    );
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
        }
    }
}
