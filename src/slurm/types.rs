// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Records parsed from Slurm listings.
//!
//! Everything here is rebuilt from a fresh scheduler snapshot on each run
//! and never mutated once the parser hands it over.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::AddAssign;

use serde::Serialize;

/// Resource types tracked per node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Gpu,
    Cpu,
    Mem,
}

impl Resource {
    pub const ALL: [Resource; 3] = [Resource::Gpu, Resource::Cpu, Resource::Mem];
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Gpu => write!(f, "GPU"),
            Resource::Cpu => write!(f, "CPU"),
            Resource::Mem => write!(f, "Mem"),
        }
    }
}

/// An amount of each resource type: a node's capacity or a job's allocation.
///
/// Memory is kept in MiB so every field stays integral.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Usage {
    pub gpus: u64,
    pub cpus: u64,
    pub mem_mib: u64,
}

impl Usage {
    pub fn new(gpus: u64, cpus: u64, mem_mib: u64) -> Self {
        Self { gpus, cpus, mem_mib }
    }

    pub fn get(&self, resource: Resource) -> u64 {
        match resource {
            Resource::Gpu => self.gpus,
            Resource::Cpu => self.cpus,
            Resource::Mem => self.mem_mib,
        }
    }

    /// Split this amount evenly across `parts` nodes.
    ///
    /// Remainders go to the leading parts, so the shares always sum back
    /// to `self`.
    pub fn split(&self, parts: usize) -> Vec<Usage> {
        if parts == 0 {
            return Vec::new();
        }
        let n = parts as u64;
        let share = |total: u64, i: u64| total / n + u64::from(i < total % n);
        (0..n)
            .map(|i| Usage {
                gpus: share(self.gpus, i),
                cpus: share(self.cpus, i),
                mem_mib: share(self.mem_mib, i),
            })
            .collect()
    }
}

impl AddAssign for Usage {
    fn add_assign(&mut self, rhs: Self) {
        self.gpus += rhs.gpus;
        self.cpus += rhs.cpus;
        self.mem_mib += rhs.mem_mib;
    }
}

/// A compute host from the node inventory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Hostname as reported by Slurm
    pub name: String,
    /// GPU model(s) from the GRES column, e.g. "a100" or "(a100|v100)"
    pub gpu_model: Option<String>,
    /// Total capacity
    pub capacity: Usage,
    /// Partitions this node belongs to
    pub partitions: BTreeSet<String>,
}

/// A partition and the nodes it spans
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub name: String,
    /// Marked with a trailing `*` by sinfo
    pub is_scheduler_default: bool,
    /// Expanded hostnames
    pub nodes: Vec<String>,
}

/// Job state from the accounting listing, as far as tallying cares
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Running,
    /// Still releasing its nodes
    Completing,
    /// Any state without allocated resources
    Other(String),
}

impl From<&str> for JobState {
    fn from(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "RUNNING" | "R" => JobState::Running,
            "COMPLETING" | "CG" => JobState::Completing,
            other => JobState::Other(other.to_string()),
        }
    }
}

impl JobState {
    pub fn holds_resources(&self) -> bool {
        !matches!(self, JobState::Other(_))
    }
}

/// A running job from the accounting listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub job_id: String,
    /// User who submitted the job
    pub user: String,
    pub partition: String,
    pub state: JobState,
    /// Expanded hostnames the job runs on
    pub nodes: Vec<String>,
    /// Resources allocated across all of `nodes`
    pub alloc: Usage,
}

impl Job {
    /// Allocation on each of the job's nodes, in hostlist order
    pub fn per_node(&self) -> impl Iterator<Item = (&str, Usage)> + '_ {
        self.nodes
            .iter()
            .map(String::as_str)
            .zip(self.alloc.split(self.nodes.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_state() {
        assert_eq!(JobState::from("running"), JobState::Running);
        assert_eq!(JobState::from("CG"), JobState::Completing);
        assert_eq!(JobState::from("PENDING"), JobState::Other("PENDING".to_string()));
        assert!(JobState::from("R").holds_resources());
        assert!(JobState::Completing.holds_resources());
        assert!(!JobState::from("COMPLETED").holds_resources());
        assert!(!JobState::from("CANCELLED").holds_resources());
    }

    #[test]
    fn test_usage_split_even() {
        let shares = Usage::new(4, 8, 1024).split(2);
        assert_eq!(shares, vec![Usage::new(2, 4, 512), Usage::new(2, 4, 512)]);
    }

    #[test]
    fn test_usage_split_remainder_goes_first() {
        let shares = Usage::new(3, 7, 10).split(3);
        assert_eq!(shares[0], Usage::new(1, 3, 4));
        assert_eq!(shares[1], Usage::new(1, 2, 3));
        assert_eq!(shares[2], Usage::new(1, 2, 3));

        let mut total = Usage::default();
        for share in shares {
            total += share;
        }
        assert_eq!(total, Usage::new(3, 7, 10));
    }

    #[test]
    fn test_usage_split_zero_parts() {
        assert!(Usage::new(1, 1, 1).split(0).is_empty());
    }

    #[test]
    fn test_job_per_node() {
        let job = Job {
            job_id: "1".to_string(),
            user: "alice".to_string(),
            partition: "lab".to_string(),
            state: JobState::Running,
            nodes: vec!["gpu01".to_string(), "gpu02".to_string()],
            alloc: Usage::new(3, 16, 2048),
        };
        let shares: Vec<_> = job.per_node().collect();
        assert_eq!(shares[0], ("gpu01", Usage::new(2, 8, 1024)));
        assert_eq!(shares[1], ("gpu02", Usage::new(1, 8, 1024)));
    }
}
