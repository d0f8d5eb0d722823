use anyhow::Context;
use clap::Parser;

use stream_qos::config::QosConfig;
use stream_qos::domain::qos_setup::roles::InstanceRoleSummary;
use stream_qos::{generate_role_table, logger};

/// Computes the QoS manager and reporter roles of a streaming job.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Job description (JSON).
    #[arg(long)]
    job: String,

    /// QoS settings (JSON). Defaults apply if omitted.
    #[arg(long)]
    config: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init();

    let config = match &args.config {
        Some(path) => QosConfig::from_file(path).with_context(|| format!("Loading QoS config from '{}'", path))?,
        None => QosConfig::default(),
    };

    let context = generate_role_table(&args.job, config).with_context(|| format!("Computing QoS roles for '{}'", args.job))?;

    let summaries: Vec<InstanceRoleSummary> = context.roles().values().map(|role_set| role_set.summary()).collect();
    println!("{}", serde_json::to_string_pretty(&summaries)?);
    Ok(())
}
