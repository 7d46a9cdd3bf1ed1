use std::path::PathBuf;

use clap::Parser;
use dynrole::errors::AppError;
use dynrole::rbac::loader::load_cluster;
use dynrole::rbac::reconcile::Reconciler;
use dynrole::rbac::EngineContext;
use dynrole::settings::Settings;
use miette::Result;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "dynrole",
    version,
    about = "Compute RBAC roles from dynamic role specifications"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Directory of KDL manifests (overrides `policies.dir`)
    #[arg(short, long)]
    policies: Option<PathBuf>,

    /// Print computed roles as single-line JSON
    #[arg(long)]
    compact: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // load settings
    let mut settings = Settings::load(&cli.config)?;
    if let Some(dir) = &cli.policies {
        settings.policies.dir = dir.clone();
    }

    // logging
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.filter));
    fmt().with_writer(std::io::stderr).with_env_filter(env_filter).init();
    tracing::info!(?settings, "Loaded configuration");

    run(&settings, cli.compact)?;
    Ok(())
}

fn run(settings: &Settings, compact: bool) -> Result<(), AppError> {
    let cluster = load_cluster(&settings.policies.dir)?;
    let ctx = EngineContext::new();
    let reconciler = Reconciler::new(&cluster, &ctx, settings.reconcile.managed_by.as_str());

    reconciler.refresh_catalog()?;
    let report = reconciler.reconcile_all()?;

    let output = if compact {
        serde_json::to_string(&report.computed)?
    } else {
        serde_json::to_string_pretty(&report.computed)?
    };
    println!("{output}");

    if !report.is_success() {
        let failed: Vec<&str> = report.failures.iter().map(|(spec, _)| spec.as_str()).collect();
        return Err(AppError::Other(format!(
            "{} specification(s) failed ({} may succeed on retry): {}",
            failed.len(),
            report.transient_failures(),
            failed.join(", ")
        )));
    }
    Ok(())
}
