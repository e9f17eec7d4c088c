// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Report assembly and rendering (text table or JSON).

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

use clap::ValueEnum;
use colored::{ColoredString, Colorize};
use serde::Serialize;
use tabled::builder::Builder;
use tabled::settings::object::Columns;
use tabled::settings::{Alignment, Style};

use crate::slurm::types::Resource;
use crate::usage::{JobDetail, NodeUsage, PartitionClass, ResourceTally};

/// Border style of the printed table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum TableStyle {
    #[default]
    Rounded,
    Ascii,
    Markdown,
}

#[derive(Debug, Clone, Default)]
pub struct ReportOptions {
    /// Add one nested line per job under each node
    pub show_jobs: bool,
    pub style: TableStyle,
    pub color: bool,
}

/// One node of the report
#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
    pub node: String,
    pub gpu_model: Option<String>,
    pub partitions: BTreeSet<String>,
    pub gpus: u64,
    pub gpu: ResourceTally,
    pub cpu: ResourceTally,
    pub mem_mib: ResourceTally,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jobs: Option<Vec<JobDetail>>,
}

impl ReportRow {
    fn new(node: &NodeUsage, show_jobs: bool) -> Self {
        Self {
            node: node.name.clone(),
            gpu_model: node.gpu_model.clone(),
            partitions: node.partitions.clone(),
            gpus: node.capacity.gpus,
            gpu: node.tally(Resource::Gpu),
            cpu: node.tally(Resource::Cpu),
            mem_mib: node.tally(Resource::Mem),
            jobs: show_jobs.then(|| node.jobs.clone()),
        }
    }
}

/// GPU usage over all listed nodes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClusterSummary {
    pub total_gpus: u64,
    pub used_gpus: u64,
}

impl ClusterSummary {
    fn from_nodes(nodes: &[NodeUsage]) -> Self {
        nodes.iter().fold(Self::default(), |mut acc, n| {
            let gpu = n.tally(Resource::Gpu);
            acc.total_gpus += n.capacity.gpus;
            acc.used_gpus += gpu.used();
            acc
        })
    }

    pub fn percent_used(&self) -> Option<f64> {
        (self.total_gpus > 0).then(|| self.used_gpus as f64 * 100.0 / self.total_gpus as f64)
    }
}

/// What one requested user holds across the cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    pub user: String,
    pub nodes: BTreeSet<String>,
    pub gpus_by_partition: BTreeMap<String, u64>,
}

impl UserSummary {
    pub fn total_gpus(&self) -> u64 {
        self.gpus_by_partition.values().sum()
    }
}

/// Usage of the users passed to `--users`
#[derive(Debug, Clone, Serialize)]
pub struct UsersReport {
    pub requested: Vec<String>,
    /// Users with at least one running job
    pub summaries: Vec<UserSummary>,
    pub total_nodes: usize,
    pub gpus_by_partition: BTreeMap<String, u64>,
}

impl UsersReport {
    fn new(nodes: &[NodeUsage], users: &BTreeSet<String>) -> Self {
        let mut by_user: BTreeMap<&str, UserSummary> = BTreeMap::new();
        for node in nodes {
            for job in node.jobs.iter().filter(|j| users.contains(&j.user)) {
                let summary = by_user.entry(job.user.as_str()).or_insert_with(|| UserSummary {
                    user: job.user.clone(),
                    nodes: BTreeSet::new(),
                    gpus_by_partition: BTreeMap::new(),
                });
                summary.nodes.insert(node.name.clone());
                *summary.gpus_by_partition.entry(job.partition.clone()).or_default() += job.usage.gpus;
            }
        }

        let summaries: Vec<UserSummary> = by_user.into_values().collect();
        let total_nodes = summaries
            .iter()
            .flat_map(|s| s.nodes.iter())
            .collect::<BTreeSet<_>>()
            .len();
        let mut gpus_by_partition = BTreeMap::new();
        for (partition, gpus) in summaries.iter().flat_map(|s| s.gpus_by_partition.iter()) {
            *gpus_by_partition.entry(partition.clone()).or_default() += gpus;
        }

        Self {
            requested: users.iter().cloned().collect(),
            summaries,
            total_nodes,
            gpus_by_partition,
        }
    }

    pub fn total_gpus(&self) -> u64 {
        self.gpus_by_partition.values().sum()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub cluster: ClusterSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users: Option<UsersReport>,
    pub rows: Vec<ReportRow>,
}

impl Report {
    /// `all` is every aggregated node, `shown` the filtered nodes to list.
    pub fn new(
        all: &[NodeUsage],
        shown: &[NodeUsage],
        users: Option<&BTreeSet<String>>,
        show_jobs: bool,
    ) -> Self {
        Self {
            cluster: ClusterSummary::from_nodes(all),
            users: users.map(|u| UsersReport::new(all, u)),
            rows: shown.iter().map(|n| ReportRow::new(n, show_jobs)).collect(),
        }
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    report: &'a Report,
    #[serde(skip_serializing_if = "no_warnings")]
    warnings: &'a [String],
}

fn no_warnings(warnings: &&[String]) -> bool {
    warnings.is_empty()
}

/// Serialize the report together with the warnings met while building it
pub fn render_json(report: &Report, warnings: &[String]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&JsonReport { report, warnings })
}

struct Painter {
    enabled: bool,
}

impl Painter {
    fn paint(&self, text: impl Into<String>, style: impl FnOnce(&str) -> ColoredString) -> String {
        let text = text.into();
        if self.enabled {
            style(&text).to_string()
        } else {
            text
        }
    }
}

fn gb(mib: u64) -> f64 {
    mib as f64 / 1024.0
}

fn format_gpu(t: &ResourceTally) -> String {
    format!("{}/{}/{}", t.priority, t.default, t.idle)
}

fn format_cpu(t: &ResourceTally) -> String {
    format!("{:>3}/{:>3}/{:>3}", t.priority, t.default, t.idle)
}

fn format_mem(t: &ResourceTally) -> String {
    format!("{:5.1}/{:5.1}/{:5.1}", gb(t.priority), gb(t.default), gb(t.idle))
}

fn format_gpus(row: &ReportRow) -> String {
    match (row.gpus, row.gpu_model.as_deref()) {
        (0, _) => "-".to_string(),
        (n, Some(model)) => format!("{n} x {model}"),
        (n, None) => n.to_string(),
    }
}

/// Render the summary lines and the node table
pub fn render_table(report: &Report, options: &ReportOptions) -> String {
    let painter = Painter { enabled: options.color };
    let mut out = String::new();

    let overview = match report.cluster.percent_used() {
        Some(pct) => format!(
            "Cluster GPU overview: {}/{} GPUs used ({:.1}%)",
            report.cluster.used_gpus, report.cluster.total_gpus, pct
        ),
        None => "Cluster GPU overview: no GPUs detected".to_string(),
    };
    let _ = writeln!(out, "{}", painter.paint(overview, |s| s.yellow().bold()));

    if let Some(users) = &report.users {
        render_users(&mut out, users, &painter);
    }

    let mut builder = Builder::default();
    builder.push_record(["Node", "GPUs", "GPU (P/D/I)", "CPU (P/D/I)", "Mem GB (P/D/I)"]);
    for row in &report.rows {
        builder.push_record([
            painter.paint(row.node.as_str(), |s| s.bright_cyan()),
            format_gpus(row),
            format_gpu(&row.gpu),
            format_cpu(&row.cpu),
            format_mem(&row.mem_mib),
        ]);

        for job in row.jobs.iter().flatten() {
            let label = format!("  └ {} {} ({})", job.job_id, job.user, job.partition);
            let requested = report
                .users
                .as_ref()
                .is_some_and(|u| u.requested.contains(&job.user));
            let style = move |s: &str| match (requested, job.class) {
                (true, _) => s.bright_cyan().bold(),
                (false, PartitionClass::Priority) => s.red(),
                (false, PartitionClass::Default) => s.green(),
            };
            builder.push_record([
                painter.paint(label, style),
                String::new(),
                painter.paint(job.usage.gpus.to_string(), style),
                painter.paint(job.usage.cpus.to_string(), style),
                painter.paint(format!("{:.1}", gb(job.usage.mem_mib)), style),
            ]);
        }
    }

    let mut table = builder.build();
    match options.style {
        TableStyle::Rounded => table.with(Style::rounded()),
        TableStyle::Ascii => table.with(Style::ascii()),
        TableStyle::Markdown => table.with(Style::markdown()),
    };
    table.modify(Columns::new(2..), Alignment::center());

    let _ = writeln!(out, "{table}");
    out
}

fn render_users(out: &mut String, users: &UsersReport, painter: &Painter) {
    let rule = "=".repeat(80);
    let _ = writeln!(out);
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "{}", painter.paint("Resources used by requested users", |s| s.bold()));
    let _ = writeln!(out, "{rule}");

    for summary in &users.summaries {
        let user = painter.paint(format!("{:<15}", summary.user), |s| s.cyan());
        let _ = writeln!(
            out,
            "• {} using {} node(s), {} GPU(s):",
            user,
            summary.nodes.len(),
            summary.total_gpus()
        );
        for (partition, gpus) in &summary.gpus_by_partition {
            let _ = writeln!(out, "  - {partition:<20}: {gpus:>3} GPU(s)");
        }
    }

    let _ = writeln!(out, "{}", "-".repeat(45));
    let _ = writeln!(
        out,
        "Total: {} nodes, {} GPUs",
        users.total_nodes,
        users.total_gpus()
    );
    for (partition, gpus) in &users.gpus_by_partition {
        let _ = writeln!(out, "  {partition:<20}: {gpus:>3} GPU(s)");
    }
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(
        out,
        "Note: P/D count only jobs of {}; I is the idle capacity of the whole node.",
        users.requested.join(", ")
    );
}
