// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! The report pipeline: query, parse, aggregate, filter.

use std::fmt;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::config::ClassifierConfig;
use crate::filter::Filter;
use crate::report::Report;
use crate::slurm::parser::{build_inventory, ParseError, Parsed, RecordParser};
use crate::slurm::query::{Query, Scheduler};
use crate::usage::{aggregate, Classifier};

/// A recoverable problem met while building the report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    MalformedLine { query: Query, error: ParseError },
    UnknownUser(String),
    /// A job share on a node the inventory does not list
    UnlistedNode { job_id: String, node: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::MalformedLine { query, error } => write!(f, "skipped {query} {error}"),
            Warning::UnknownUser(user) => write!(f, "user '{user}' has no running jobs"),
            Warning::UnlistedNode { job_id, node } => {
                write!(f, "job {job_id} runs on unlisted node {node}, its share is not counted")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Outcome {
    pub report: Report,
    pub warnings: Vec<Warning>,
}

pub struct App<S, P> {
    scheduler: S,
    parser: P,
    classifier: ClassifierConfig,
}

impl<S: Scheduler, P: RecordParser> App<S, P> {
    pub fn new(scheduler: S, parser: P, classifier: ClassifierConfig) -> Self {
        Self {
            scheduler,
            parser,
            classifier,
        }
    }

    /// Build a report from a fresh scheduler snapshot.
    ///
    /// Fails only if the scheduler cannot be queried. Anything else that goes
    /// wrong ends up in [`Outcome::warnings`] and is logged.
    pub fn run(&self, filter: &Filter, show_jobs: bool) -> Result<Outcome> {
        let snapshot = self
            .scheduler
            .snapshot()
            .context("cannot build report without a scheduler snapshot")?;

        let mut warnings = Vec::new();
        let nodes = collect(Query::Nodes, self.parser.parse_nodes(&snapshot.nodes), &mut warnings);
        let partitions = collect(
            Query::Partitions,
            self.parser.parse_partitions(&snapshot.partitions),
            &mut warnings,
        );
        let jobs = collect(Query::Jobs, self.parser.parse_jobs(&snapshot.jobs), &mut warnings);
        debug!(
            nodes = nodes.len(),
            partitions = partitions.len(),
            jobs = jobs.len(),
            "parsed snapshot"
        );

        let inventory = build_inventory(nodes, &partitions);
        let classifier = Classifier::new(&self.classifier, &partitions);
        let aggregated = aggregate(&inventory, &jobs, &classifier);
        for share in aggregated.unlisted {
            record(
                Warning::UnlistedNode {
                    job_id: share.job_id,
                    node: share.node,
                },
                &mut warnings,
            );
        }
        let all = aggregated.nodes;

        let filtered = filter.apply(&all);
        for user in filtered.unknown_users {
            record(Warning::UnknownUser(user), &mut warnings);
        }

        let report = Report::new(&all, &filtered.nodes, filter.users.as_ref(), show_jobs);
        Ok(Outcome { report, warnings })
    }
}

fn collect<T>(query: Query, parsed: Parsed<T>, warnings: &mut Vec<Warning>) -> Vec<T> {
    for error in parsed.skipped {
        record(Warning::MalformedLine { query, error }, warnings);
    }
    parsed.records
}

fn record(warning: Warning, warnings: &mut Vec<Warning>) {
    warn!("{warning}");
    warnings.push(warning);
}
