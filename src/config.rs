// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Runtime configuration, built once in `main` and passed down explicitly.
//!
//! The defaults match a stock Slurm installation. Column layouts describe the
//! output of the default query formats; clusters that customize those formats
//! only need to adjust the layout, not the parser.

use std::collections::BTreeSet;
use std::fmt;

/// Default `sinfo` binary
pub const DEFAULT_SINFO: &str = "sinfo";
/// Default `sacct` binary
pub const DEFAULT_SACCT: &str = "sacct";

/// Partition name fragments that mark a partition as open to everybody
pub const DEFAULT_MARKERS: [&str; 2] = ["default", "gpu"];

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub scheduler: SchedulerConfig,
    pub layout: ColumnLayout,
    pub classifier: ClassifierConfig,
}

/// A program and its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// The three listing commands
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Node inventory, one line per node (and partition)
    pub nodes: CommandSpec,
    /// Partition to nodelist mapping
    pub partitions: CommandSpec,
    /// Running jobs with their allocations
    pub jobs: CommandSpec,
}

impl SchedulerConfig {
    pub fn with_binaries(sinfo: &str, sacct: &str) -> Self {
        Self {
            nodes: CommandSpec::new(
                sinfo,
                &[
                    "-a",
                    "-N",
                    "-h",
                    "-O",
                    "NodeHost:100,Gres:100,CPUsState:40,Memory:20",
                ],
            ),
            partitions: CommandSpec::new(sinfo, &["-a", "-h", "-O", "Partition:60,NodeList:1000"]),
            jobs: CommandSpec::new(
                sacct,
                &[
                    "-X",
                    "-a",
                    "-n",
                    "--state=RUNNING",
                    "--units=G",
                    "--format=User%30,Partition%40,NodeList%200,State%20,AllocTRES%200,JobID%30",
                ],
            ),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::with_binaries(DEFAULT_SINFO, DEFAULT_SACCT)
    }
}

/// Zero-based whitespace column indices of each listing
#[derive(Debug, Clone, Default)]
pub struct ColumnLayout {
    pub nodes: NodeColumns,
    pub partitions: PartitionColumns,
    pub jobs: JobColumns,
}

#[derive(Debug, Clone)]
pub struct NodeColumns {
    pub host: usize,
    pub gres: usize,
    pub cpus_state: usize,
    pub memory: usize,
}

impl Default for NodeColumns {
    fn default() -> Self {
        Self { host: 0, gres: 1, cpus_state: 2, memory: 3 }
    }
}

impl NodeColumns {
    pub fn width(&self) -> usize {
        [self.host, self.gres, self.cpus_state, self.memory]
            .into_iter()
            .max()
            .unwrap_or(0)
            + 1
    }
}

#[derive(Debug, Clone)]
pub struct PartitionColumns {
    pub name: usize,
    pub nodelist: usize,
}

impl Default for PartitionColumns {
    fn default() -> Self {
        Self { name: 0, nodelist: 1 }
    }
}

impl PartitionColumns {
    pub fn width(&self) -> usize {
        self.name.max(self.nodelist) + 1
    }
}

#[derive(Debug, Clone)]
pub struct JobColumns {
    pub user: usize,
    pub partition: usize,
    pub nodelist: usize,
    pub state: usize,
    pub alloc_tres: usize,
    pub job_id: usize,
}

impl Default for JobColumns {
    fn default() -> Self {
        Self { user: 0, partition: 1, nodelist: 2, state: 3, alloc_tres: 4, job_id: 5 }
    }
}

impl JobColumns {
    pub fn width(&self) -> usize {
        [
            self.user,
            self.partition,
            self.nodelist,
            self.state,
            self.alloc_tres,
            self.job_id,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
            + 1
    }
}

/// Rules for sorting partitions into the priority and default buckets
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Always priority, whatever the listing says
    pub priority_partitions: BTreeSet<String>,
    /// A partition whose name contains one of these is a default partition
    pub default_markers: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            priority_partitions: BTreeSet::new(),
            default_markers: DEFAULT_MARKERS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_display() {
        let cmd = CommandSpec::new("sinfo", &["-h", "-N"]);
        assert_eq!(cmd.to_string(), "sinfo -h -N");
    }

    #[test]
    fn test_custom_binaries() {
        let config = SchedulerConfig::with_binaries("/opt/slurm/bin/sinfo", "/opt/slurm/bin/sacct");
        assert_eq!(config.nodes.program, "/opt/slurm/bin/sinfo");
        assert_eq!(config.partitions.program, "/opt/slurm/bin/sinfo");
        assert_eq!(config.jobs.program, "/opt/slurm/bin/sacct");
        assert!(config.jobs.args.iter().any(|a| a == "--state=RUNNING"));
    }

    #[test]
    fn test_sinfo_lists_hidden_partitions() {
        // restricted partitions are only listed with --all, yet sacct -a reports their jobs
        let config = SchedulerConfig::default();
        assert_eq!(config.nodes.args.first().map(String::as_str), Some("-a"));
        assert_eq!(config.partitions.args.first().map(String::as_str), Some("-a"));
        assert!(config.jobs.args.iter().any(|a| a == "-a"));
    }

    #[test]
    fn test_layout_widths() {
        let layout = ColumnLayout::default();
        assert_eq!(layout.nodes.width(), 4);
        assert_eq!(layout.partitions.width(), 2);
        assert_eq!(layout.jobs.width(), 6);
    }
}
