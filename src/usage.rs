// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Per-node resource tallies split into priority, default and idle.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;
use tracing::warn;

use crate::config::ClassifierConfig;
use crate::slurm::types::{Job, Node, Partition, Resource, Usage};

/// Which bucket a job's consumption is counted in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionClass {
    Priority,
    Default,
}

/// Decides the bucket of a partition name.
///
/// A partition is priority when it is listed explicitly, or when the scheduler
/// knows it, it is not the scheduler's default, and its name has no default
/// marker. Anything unrecognized lands in the default bucket so priority
/// usage is never overstated.
#[derive(Debug, Clone)]
pub struct Classifier {
    explicit: BTreeSet<String>,
    markers: Vec<String>,
    /// Known partitions, mapped to whether sinfo marks them as default
    known: HashMap<String, bool>,
}

impl Classifier {
    pub fn new(config: &ClassifierConfig, partitions: &[Partition]) -> Self {
        Self {
            explicit: config.priority_partitions.clone(),
            markers: config.default_markers.clone(),
            known: partitions
                .iter()
                .map(|p| (p.name.clone(), p.is_scheduler_default))
                .collect(),
        }
    }

    pub fn classify(&self, partition: &str) -> PartitionClass {
        if self.explicit.contains(partition) {
            return PartitionClass::Priority;
        }
        match self.known.get(partition) {
            Some(false) if !self.markers.iter().any(|m| partition.contains(m.as_str())) => {
                PartitionClass::Priority
            }
            _ => PartitionClass::Default,
        }
    }
}

/// Usage of one resource type on one node.
///
/// Without a user filter the three fields sum to the node's capacity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResourceTally {
    pub priority: u64,
    pub default: u64,
    pub idle: u64,
}

impl ResourceTally {
    pub fn used(&self) -> u64 {
        self.priority + self.default
    }

    pub fn total(&self) -> u64 {
        self.used() + self.idle
    }
}

/// A job's share of one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobDetail {
    pub job_id: String,
    pub user: String,
    pub partition: String,
    pub class: PartitionClass,
    pub usage: Usage,
}

/// Aggregated view of one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeUsage {
    pub name: String,
    pub gpu_model: Option<String>,
    pub partitions: BTreeSet<String>,
    pub capacity: Usage,
    pub priority: Usage,
    pub default: Usage,
    pub idle: Usage,
    /// Jobs on this node, ordered by job id
    pub jobs: Vec<JobDetail>,
}

impl NodeUsage {
    fn new(node: &Node, mut jobs: Vec<JobDetail>) -> Self {
        jobs.sort_by(|a, b| job_order(a).cmp(&job_order(b)));
        let (priority, default) = sum_by_class(&jobs);

        let mut idle = Usage::default();
        for resource in Resource::ALL {
            let capacity = node.capacity.get(resource);
            let used = priority.get(resource) + default.get(resource);
            if used > capacity {
                warn!(
                    node = %node.name,
                    %resource,
                    used,
                    capacity,
                    "allocations exceed capacity, idle clamped to 0"
                );
            }
            let free = capacity.saturating_sub(used);
            match resource {
                Resource::Gpu => idle.gpus = free,
                Resource::Cpu => idle.cpus = free,
                Resource::Mem => idle.mem_mib = free,
            }
        }

        Self {
            name: node.name.clone(),
            gpu_model: node.gpu_model.clone(),
            partitions: node.partitions.clone(),
            capacity: node.capacity,
            priority,
            default,
            idle,
            jobs,
        }
    }

    pub fn tally(&self, resource: Resource) -> ResourceTally {
        ResourceTally {
            priority: self.priority.get(resource),
            default: self.default.get(resource),
            idle: self.idle.get(resource),
        }
    }

    pub fn has_gpus(&self) -> bool {
        self.capacity.gpus > 0
    }

    /// Keep only the jobs of `users` and recount the priority and default
    /// buckets from them. Idle stays the node's real idle capacity.
    pub fn restrict_to_users(&self, users: &BTreeSet<String>) -> NodeUsage {
        let jobs: Vec<JobDetail> = self
            .jobs
            .iter()
            .filter(|j| users.contains(&j.user))
            .cloned()
            .collect();
        let (priority, default) = sum_by_class(&jobs);
        NodeUsage {
            priority,
            default,
            jobs,
            ..self.clone()
        }
    }
}

/// Numeric job ids sort numerically, array and het job ids after them
fn job_order(job: &JobDetail) -> (u64, &str, &str) {
    let numeric = job.job_id.parse::<u64>().unwrap_or(u64::MAX);
    (numeric, job.job_id.as_str(), job.user.as_str())
}

fn sum_by_class(jobs: &[JobDetail]) -> (Usage, Usage) {
    let mut priority = Usage::default();
    let mut default = Usage::default();
    for job in jobs {
        match job.class {
            PartitionClass::Priority => priority += job.usage,
            PartitionClass::Default => default += job.usage,
        }
    }
    (priority, default)
}

/// A job share on a node that is missing from the inventory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlistedShare {
    pub job_id: String,
    pub node: String,
}

#[derive(Debug, Clone, Default)]
pub struct Aggregate {
    /// Every node of the inventory, sorted by name
    pub nodes: Vec<NodeUsage>,
    /// Shares that could not be counted anywhere
    pub unlisted: Vec<UnlistedShare>,
}

/// Tally every node of the inventory.
///
/// Jobs spanning several nodes are split evenly across them. Shares landing
/// on nodes missing from the inventory are not counted and end up in
/// [`Aggregate::unlisted`].
pub fn aggregate(nodes: &BTreeMap<String, Node>, jobs: &[Job], classifier: &Classifier) -> Aggregate {
    let mut per_node: HashMap<&str, Vec<JobDetail>> = HashMap::new();
    let mut unlisted = Vec::new();

    for job in jobs {
        let class = classifier.classify(&job.partition);
        for (host, usage) in job.per_node() {
            if !nodes.contains_key(host) {
                unlisted.push(UnlistedShare {
                    job_id: job.job_id.clone(),
                    node: host.to_string(),
                });
                continue;
            }
            per_node.entry(host).or_default().push(JobDetail {
                job_id: job.job_id.clone(),
                user: job.user.clone(),
                partition: job.partition.clone(),
                class,
                usage,
            });
        }
    }

    let nodes = nodes
        .values()
        .map(|node| NodeUsage::new(node, per_node.remove(node.name.as_str()).unwrap_or_default()))
        .collect();
    Aggregate { nodes, unlisted }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slurm::types::JobState;

    fn node(name: &str, gpus: u64, cpus: u64) -> Node {
        Node {
            name: name.to_string(),
            gpu_model: None,
            capacity: Usage::new(gpus, cpus, 1024),
            partitions: BTreeSet::new(),
        }
    }

    fn job(id: &str, user: &str, partition: &str, nodes: &[&str], alloc: Usage) -> Job {
        Job {
            job_id: id.to_string(),
            user: user.to_string(),
            partition: partition.to_string(),
            state: JobState::Running,
            nodes: nodes.iter().map(|n| n.to_string()).collect(),
            alloc,
        }
    }

    fn partition(name: &str, is_scheduler_default: bool) -> Partition {
        Partition {
            name: name.to_string(),
            is_scheduler_default,
            nodes: Vec::new(),
        }
    }

    fn inventory(nodes: Vec<Node>) -> BTreeMap<String, Node> {
        nodes.into_iter().map(|n| (n.name.clone(), n)).collect()
    }

    fn classifier() -> Classifier {
        Classifier::new(
            &ClassifierConfig::default(),
            &[partition("default", true), partition("lab_prio", false)],
        )
    }

    #[test]
    fn test_classify() {
        let classifier = Classifier::new(
            &ClassifierConfig::default(),
            &[
                partition("main", true),
                partition("lab_prio", false),
                partition("gpu_shared", false),
                partition("default_long", false),
            ],
        );
        assert_eq!(classifier.classify("lab_prio"), PartitionClass::Priority);
        assert_eq!(classifier.classify("main"), PartitionClass::Default);
        assert_eq!(classifier.classify("gpu_shared"), PartitionClass::Default);
        assert_eq!(classifier.classify("default_long"), PartitionClass::Default);
        assert_eq!(classifier.classify("mystery"), PartitionClass::Default);
        assert_eq!(classifier.classify("lab_prio,main"), PartitionClass::Default);
    }

    #[test]
    fn test_classify_explicit_priority() {
        let mut config = ClassifierConfig::default();
        config.priority_partitions.insert("gpu_lab".to_string());
        let classifier = Classifier::new(&config, &[]);
        assert_eq!(classifier.classify("gpu_lab"), PartitionClass::Priority);
    }

    #[test]
    fn test_priority_default_idle_split() {
        let nodes = inventory(vec![node("gpu01", 4, 64)]);
        let jobs = vec![
            job("1", "alice", "lab_prio", &["gpu01"], Usage::new(2, 8, 100)),
            job("2", "bob", "default", &["gpu01"], Usage::new(1, 4, 100)),
        ];

        let usage = aggregate(&nodes, &jobs, &classifier()).nodes;
        let gpu = usage[0].tally(Resource::Gpu);
        assert_eq!(gpu, ResourceTally { priority: 2, default: 1, idle: 1 });
        let cpu = usage[0].tally(Resource::Cpu);
        assert_eq!(cpu, ResourceTally { priority: 8, default: 4, idle: 52 });
    }

    #[test]
    fn test_unrecognized_partition_counts_as_default() {
        let nodes = inventory(vec![node("gpu01", 2, 16)]);
        let jobs = vec![job("1", "alice", "mystery", &["gpu01"], Usage::new(1, 1, 0))];

        let usage = aggregate(&nodes, &jobs, &classifier()).nodes;
        assert_eq!(
            usage[0].tally(Resource::Gpu),
            ResourceTally { priority: 0, default: 1, idle: 1 }
        );
    }

    #[test]
    fn test_tallies_sum_to_capacity() {
        let nodes = inventory(vec![node("a", 8, 64), node("b", 0, 32), node("c", 4, 48)]);
        let jobs = vec![
            job("1", "alice", "lab_prio", &["a", "c"], Usage::new(5, 20, 500)),
            job("2", "bob", "default", &["b", "c"], Usage::new(0, 17, 300)),
            job("3", "carol", "default", &["a"], Usage::new(1, 3, 10)),
        ];

        for n in aggregate(&nodes, &jobs, &classifier()).nodes {
            for resource in Resource::ALL {
                assert_eq!(n.tally(resource).total(), n.capacity.get(resource), "{} {}", n.name, resource);
            }
        }
    }

    #[test]
    fn test_multi_node_job_split() {
        let nodes = inventory(vec![node("a", 4, 64), node("b", 4, 64)]);
        let jobs = vec![job("1", "alice", "default", &["a", "b"], Usage::new(3, 10, 0))];

        let usage = aggregate(&nodes, &jobs, &classifier()).nodes;
        assert_eq!(usage[0].default.gpus, 2);
        assert_eq!(usage[1].default.gpus, 1);
        assert_eq!(usage[0].default.cpus, 5);
        assert_eq!(usage[1].default.cpus, 5);
    }

    #[test]
    fn test_oversubscription_clamps_idle() {
        let nodes = inventory(vec![node("a", 1, 4)]);
        let jobs = vec![job("1", "alice", "default", &["a"], Usage::new(2, 2, 0))];

        let usage = aggregate(&nodes, &jobs, &classifier()).nodes;
        assert_eq!(usage[0].idle.gpus, 0);
        assert_eq!(usage[0].idle.cpus, 2);
    }

    #[test]
    fn test_unknown_node_share_is_reported() {
        let nodes = inventory(vec![node("a", 1, 4)]);
        let jobs = vec![job("1", "alice", "default", &["zz"], Usage::new(1, 1, 0))];

        let result = aggregate(&nodes, &jobs, &classifier());
        assert_eq!(result.nodes.len(), 1);
        assert!(result.nodes[0].jobs.is_empty());
        assert_eq!(result.nodes[0].idle.gpus, 1);
        assert_eq!(
            result.unlisted,
            vec![UnlistedShare {
                job_id: "1".to_string(),
                node: "zz".to_string()
            }]
        );
    }

    #[test]
    fn test_nodes_sorted_and_jobs_ordered() {
        let nodes = inventory(vec![node("b", 4, 4), node("a", 4, 4)]);
        let jobs = vec![
            job("1000", "bob", "default", &["a"], Usage::new(1, 1, 0)),
            job("999", "alice", "default", &["a"], Usage::new(1, 1, 0)),
            job("998_1", "carol", "default", &["a"], Usage::new(1, 1, 0)),
        ];

        let usage = aggregate(&nodes, &jobs, &classifier()).nodes;
        assert_eq!(usage[0].name, "a");
        assert_eq!(usage[1].name, "b");
        let ids: Vec<_> = usage[0].jobs.iter().map(|j| j.job_id.as_str()).collect();
        assert_eq!(ids, vec!["999", "1000", "998_1"]);
    }

    #[test]
    fn test_restrict_to_users_keeps_idle() {
        let nodes = inventory(vec![node("gpu01", 4, 64)]);
        let jobs = vec![
            job("1", "alice", "lab_prio", &["gpu01"], Usage::new(2, 8, 0)),
            job("2", "bob", "default", &["gpu01"], Usage::new(1, 4, 0)),
        ];
        let usage = aggregate(&nodes, &jobs, &classifier()).nodes;

        let users = BTreeSet::from(["bob".to_string()]);
        let restricted = usage[0].restrict_to_users(&users);
        assert_eq!(restricted.jobs.len(), 1);
        assert_eq!(restricted.jobs[0].user, "bob");
        assert_eq!(
            restricted.tally(Resource::Gpu),
            ResourceTally { priority: 0, default: 1, idle: 1 }
        );
        assert_eq!(restricted.idle, usage[0].idle);
    }
}
