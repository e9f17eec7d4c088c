// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

use std::collections::BTreeSet;
use std::env;
use std::io::{self, IsTerminal};

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod app;
mod config;
mod filter;
mod report;
mod slurm;
mod usage;

use app::App;
use config::{ClassifierConfig, Config, SchedulerConfig, DEFAULT_MARKERS, DEFAULT_SACCT, DEFAULT_SINFO};
use filter::Filter;
use report::{render_json, render_table, ReportOptions, TableStyle};
use slurm::{ColumnParser, SlurmCli};

#[derive(Parser, Debug)]
#[command(name = "gtop")]
#[command(about = "GPU/CPU/memory usage per node of a Slurm cluster, split into priority, default and idle")]
#[command(version)]
struct Args {
    /// Only show nodes with GPUs
    #[arg(long)]
    gpu_only: bool,

    /// Show one line per job under each node
    #[arg(long)]
    disp_users: bool,

    /// Only count jobs of these users
    #[arg(long, num_args = 1.., value_name = "USER")]
    users: Vec<String>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Table border style
    #[arg(long, value_enum, default_value_t = TableStyle::Rounded)]
    style: TableStyle,

    /// Disable colors (also off when stdout is not a terminal)
    #[arg(long)]
    no_color: bool,

    /// Partition always counted as priority (repeatable)
    #[arg(long = "priority-partition", value_name = "PARTITION")]
    priority_partitions: Vec<String>,

    /// Partition name fragment marking a default partition (repeatable)
    #[arg(long = "default-marker", value_name = "TEXT", default_values = DEFAULT_MARKERS)]
    default_markers: Vec<String>,

    /// Path to sinfo
    #[arg(long, env = "GTOP_SINFO", default_value = DEFAULT_SINFO)]
    sinfo: String,

    /// Path to sacct
    #[arg(long, env = "GTOP_SACCT", default_value = DEFAULT_SACCT)]
    sacct: String,

    /// Log debug output to stderr (GTOP_LOG overrides)
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn config(&self) -> Config {
        Config {
            scheduler: SchedulerConfig::with_binaries(&self.sinfo, &self.sacct),
            layout: Default::default(),
            classifier: ClassifierConfig {
                priority_partitions: self.priority_partitions.iter().cloned().collect(),
                default_markers: self.default_markers.clone(),
            },
        }
    }

    fn filter(&self) -> Filter {
        Filter {
            gpu_only: self.gpu_only,
            users: (!self.users.is_empty()).then(|| self.users.iter().cloned().collect::<BTreeSet<_>>()),
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = match env::var("GTOP_LOG") {
        Ok(value) => EnvFilter::new(value),
        Err(_) if verbose => EnvFilter::new("debug"),
        Err(_) => EnvFilter::new("warn"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .without_time()
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = args.config();
    let app = App::new(
        SlurmCli::new(config.scheduler),
        ColumnParser::new(config.layout),
        config.classifier,
    );
    let outcome = app.run(&args.filter(), args.disp_users)?;

    if args.json {
        let warnings: Vec<String> = outcome.warnings.iter().map(ToString::to_string).collect();
        let json = render_json(&outcome.report, &warnings).context("Failed to serialize report")?;
        println!("{json}");
    } else {
        let options = ReportOptions {
            show_jobs: args.disp_users,
            style: args.style,
            color: !args.no_color && io::stdout().is_terminal(),
        };
        print!("{}", render_table(&outcome.report, &options));
    }

    Ok(())
}
