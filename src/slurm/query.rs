// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Slurm CLI integration: run the listing commands and capture their output.
//!
//! Queries run sequentially and are never retried. A failing query aborts the
//! run so that no partial snapshot is ever reported.

use std::fmt;
use std::io;
use std::process::{Command, ExitStatus};

use thiserror::Error;
use tracing::debug;

use crate::config::{CommandSpec, SchedulerConfig};

/// The listings a report is built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Query {
    Nodes,
    Partitions,
    Jobs,
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Nodes => write!(f, "node inventory"),
            Query::Partitions => write!(f, "partition listing"),
            Query::Jobs => write!(f, "job listing"),
        }
    }
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("unreachable cluster: failed to run `{command}`: {source}")]
    Unreachable {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("unreachable cluster: `{command}` exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },
}

/// Raw text of one scheduler snapshot
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub nodes: String,
    pub partitions: String,
    pub jobs: String,
}

/// Source of raw listing text
pub trait Scheduler {
    fn query(&self, query: Query) -> Result<String, QueryError>;

    /// Run all listings, stopping at the first failure
    fn snapshot(&self) -> Result<Snapshot, QueryError> {
        Ok(Snapshot {
            nodes: self.query(Query::Nodes)?,
            partitions: self.query(Query::Partitions)?,
            jobs: self.query(Query::Jobs)?,
        })
    }
}

/// Runs the real `sinfo`/`sacct` binaries
#[derive(Debug, Clone)]
pub struct SlurmCli {
    config: SchedulerConfig,
}

impl SlurmCli {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    fn command(&self, query: Query) -> &CommandSpec {
        match query {
            Query::Nodes => &self.config.nodes,
            Query::Partitions => &self.config.partitions,
            Query::Jobs => &self.config.jobs,
        }
    }
}

impl Scheduler for SlurmCli {
    fn query(&self, query: Query) -> Result<String, QueryError> {
        let spec = self.command(query);
        debug!(%query, command = %spec, "querying scheduler");
        run_command(spec)
    }
}

fn run_command(spec: &CommandSpec) -> Result<String, QueryError> {
    let output = Command::new(&spec.program)
        .args(&spec.args)
        .output()
        .map_err(|source| QueryError::Unreachable {
            command: spec.to_string(),
            source,
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(QueryError::Failed {
            command: spec.to_string(),
            status: output.status,
            stderr,
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
