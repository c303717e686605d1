//! vcdusage - one-shot VDC usage report.
//!
//! Reads session and report settings from the environment, computes usage
//! for an organization's VDCs and prints the report as JSON on stdout.

use vcdusage::{Client, Options, ReportConfig, Vdcs};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Logs go to stderr; stdout carries the report
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vcdusage=info".parse()?),
        )
        .init();

    let options = Options::from_env()?;
    let cfg = ReportConfig::load()?;
    tracing::info!(
        "Reporting {} usage for org {} (storage: {})",
        cfg.basis,
        cfg.org_id,
        cfg.scope
    );

    let client = Client::new(options).await?;

    let vdcs = match &cfg.vdc_id {
        Some(vdc_id) => Vdcs::new(vec![client.vdc(&cfg.org_id, vdc_id).await?]),
        None => client.vdcs(&cfg.org_id).await?,
    };
    let vdcs = vdcs.with_basis(cfg.basis).with_scope(cfg.scope);

    let report = vdcs.report(cfg.query.as_ref()).await;
    for failed in &report.failed {
        tracing::warn!(
            "VDC {} ({}) is incomplete: {}",
            failed.name,
            failed.id,
            failed.reason
        );
    }
    tracing::info!(
        "{} VDCs: {} cores, {} GB memory, {} GB storage, {} VMs",
        report.vdcs.len(),
        report.totals.core_count,
        report.totals.memory.gb(),
        report.totals.storage.gb(),
        report.totals.vm_count
    );

    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
