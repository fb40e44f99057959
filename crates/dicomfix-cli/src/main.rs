use std::fs;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDateTime};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use dicomfix_core::export::{compare_spots, sample_spots, Sampling};
use dicomfix_core::{apply_edits, inspect, parse_weight_list, EditConfig, EditKind, Plan, HLINE};
use dicomfix_io::{dump, load_plan, save_plan, write_racehorse, write_spot_sample, write_spotlist};

mod args;

use args::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    run(&cli, Local::now().naive_local())
}

fn init_logging(verbosity: u8) {
    let default = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_config(cli: &Cli) -> Result<EditConfig> {
    let base: EditConfig = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path).context("Failed to read edit config")?;
            toml::from_str(&text).context("Failed to parse edit config")?
        }
        None => EditConfig::default(),
    };
    let mut config = cli.edit_config(base);
    if let Some(path) = &cli.weights {
        let text = fs::read_to_string(path).context("Failed to read weight list")?;
        match parse_weight_list(&text) {
            Ok(weights) => config.spot_weights = Some(weights),
            Err(e) => config.rejected.push((EditKind::SpotWeights, e)),
        }
    }
    Ok(config)
}

fn sampling(cli: &Cli) -> Sampling {
    if cli.random || cli.sample_seed.is_some() {
        Sampling::Random {
            seed: cli.sample_seed,
        }
    } else {
        Sampling::Leading
    }
}

fn run(cli: &Cli, now: NaiveDateTime) -> Result<()> {
    let config = load_config(cli)?;
    let (mut obj, mut plan) = load_plan(&cli.input)?;

    if cli.inspect_all {
        print!("{}", dump(&obj));
        return Ok(());
    }
    if cli.inspect {
        print!("{}", inspect::summary(&plan));
        return Ok(());
    }

    let original = plan.clone();
    let report = apply_edits(&mut plan, &config, &now);
    for kind in &report.applied {
        info!("Applied edit: {}", kind);
    }
    if !report.is_success() {
        if cli.strict {
            bail!(
                "{} edit(s) failed, not writing {}",
                report.failed.len(),
                cli.output.display()
            );
        }
        warn!(
            "{} edit(s) failed; writing the plan with the remaining edits",
            report.failed.len()
        );
    }

    save_plan(&mut obj, &plan, &cli.output)?;

    if let Some(n) = cli.print_spots {
        print_spot_comparison(&original, &plan, n, sampling(cli))?;
    }

    let today = now.date();
    if let Some(base) = &cli.export_racehorse {
        write_racehorse(&plan, base, &today)?;
    }
    if let Some(base) = &cli.export_spotlist {
        write_spotlist(&plan, base)?;
    }
    if let Some(path) = &cli.export_sample {
        match sample_spots(&plan, cli.sample_count, sampling(cli)) {
            Ok(records) => write_spot_sample(path, &plan, &records, &today)?,
            Err(e) => error!("Spot sample not exported: {}", e),
        }
    }
    Ok(())
}

fn print_spot_comparison(original: &Plan, edited: &Plan, n: usize, sampling: Sampling) -> Result<()> {
    let rows = compare_spots(original, edited, n, sampling)?;
    println!("{}", HLINE);
    println!(" Field   Spot    Gantry    Energy      Original MU      New MU");
    println!("{}", HLINE);
    for row in rows {
        let r = row.record;
        let energy = r.energy.map(|e| format!("{:8.2}", e)).unwrap_or_else(|| "     N/A".into());
        let before = row
            .original_mu
            .map(|mu| format!("{:14.4}", mu))
            .unwrap_or_else(|| "           N/A".into());
        println!(
            "  {:02}    {:5}  {:8.2}  {}  {}  {:10.4}",
            r.field_number, r.spot_index, r.gantry_angle, energy, before, r.mu
        );
    }
    println!("{}", HLINE);
    Ok(())
}
