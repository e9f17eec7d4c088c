// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Turn raw listing text into node, partition and job records.
//!
//! Each line is parsed on its own. A malformed line becomes a [`ParseError`]
//! next to the records that did parse, so one bad line never hides the rest
//! of the cluster.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::debug;

use super::hostlist::expand_hostlist;
use super::tres::{parse_alloc_tres, parse_cpus_state, parse_gres, parse_mem_mib};
use super::types::{Job, JobState, Node, Partition, Usage};
use crate::config::ColumnLayout;

/// A line that could not be parsed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("line {line_no}: {reason}: '{line}'")]
pub struct ParseError {
    /// 1-based line number within the listing
    pub line_no: usize,
    pub line: String,
    pub reason: String,
}

/// Outcome of parsing one listing
#[derive(Debug, Clone)]
pub struct Parsed<T> {
    pub records: Vec<T>,
    pub skipped: Vec<ParseError>,
}

impl<T> Default for Parsed<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

impl<T> Parsed<T> {
    /// Apply `parse_line` to every non-blank line.
    ///
    /// `Ok(None)` drops a well-formed line that is not of interest.
    fn from_lines<F>(text: &str, mut parse_line: F) -> Self
    where
        F: FnMut(&[&str]) -> Result<Option<T>, String>,
    {
        let mut parsed = Self::default();
        for (i, line) in text.lines().enumerate() {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.is_empty() {
                continue;
            }
            match parse_line(&fields) {
                Ok(Some(record)) => parsed.records.push(record),
                Ok(None) => {}
                Err(reason) => parsed.skipped.push(ParseError {
                    line_no: i + 1,
                    line: line.trim().to_string(),
                    reason,
                }),
            }
        }
        parsed
    }
}

/// One line of the node inventory. A compressed hostname yields one record
/// per host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRecord {
    pub name: String,
    pub gpu_model: Option<String>,
    pub capacity: Usage,
}

/// Source of records for the aggregator.
///
/// Implement this for clusters whose listings cannot be described by a
/// [`ColumnLayout`].
pub trait RecordParser {
    fn parse_nodes(&self, text: &str) -> Parsed<NodeRecord>;
    fn parse_partitions(&self, text: &str) -> Parsed<Partition>;
    fn parse_jobs(&self, text: &str) -> Parsed<Job>;
}

/// Parser for whitespace-separated columns
#[derive(Debug, Clone, Default)]
pub struct ColumnParser {
    layout: ColumnLayout,
}

impl ColumnParser {
    pub fn new(layout: ColumnLayout) -> Self {
        Self { layout }
    }
}

fn check_width(fields: &[&str], width: usize) -> Result<(), String> {
    if fields.len() < width {
        return Err(format!("expected {} columns, got {}", width, fields.len()));
    }
    Ok(())
}

impl RecordParser for ColumnParser {
    fn parse_nodes(&self, text: &str) -> Parsed<NodeRecord> {
        let cols = &self.layout.nodes;
        let parsed = Parsed::<Vec<NodeRecord>>::from_lines(text, |fields| {
            check_width(fields, cols.width())?;

            let hosts = expand_hostlist(fields[cols.host]).map_err(|e| e.to_string())?;
            if hosts.is_empty() {
                return Err("no hostname".to_string());
            }
            let gres = parse_gres(fields[cols.gres]);
            let cpus = parse_cpus_state(fields[cols.cpus_state]).map_err(|e| e.to_string())?;
            let mem_mib = parse_mem_mib(fields[cols.memory], 'M').map_err(|e| e.to_string())?;

            let capacity = Usage::new(gres.count, cpus.total, mem_mib);
            Ok(Some(
                hosts
                    .into_iter()
                    .map(|name| NodeRecord {
                        name,
                        gpu_model: gres.model.clone(),
                        capacity,
                    })
                    .collect(),
            ))
        });

        Parsed {
            records: parsed.records.into_iter().flatten().collect(),
            skipped: parsed.skipped,
        }
    }

    fn parse_partitions(&self, text: &str) -> Parsed<Partition> {
        let cols = &self.layout.partitions;
        Parsed::from_lines(text, |fields| {
            check_width(fields, cols.width())?;

            let raw_name = fields[cols.name];
            let name = raw_name.trim_end_matches('*');
            if name.is_empty() {
                return Err("empty partition name".to_string());
            }
            let nodes = expand_hostlist(fields[cols.nodelist]).map_err(|e| e.to_string())?;

            Ok(Some(Partition {
                name: name.to_string(),
                is_scheduler_default: raw_name.ends_with('*'),
                nodes,
            }))
        })
    }

    fn parse_jobs(&self, text: &str) -> Parsed<Job> {
        let cols = &self.layout.jobs;
        Parsed::from_lines(text, |fields| {
            check_width(fields, cols.width())?;

            let job_id = fields[cols.job_id];
            let state = JobState::from(fields[cols.state]);
            if !state.holds_resources() {
                debug!(job_id, ?state, "ignoring job without allocation");
                return Ok(None);
            }

            let nodes = expand_hostlist(fields[cols.nodelist]).map_err(|e| e.to_string())?;
            if nodes.is_empty() {
                return Err("running job without nodes".to_string());
            }
            let alloc = parse_alloc_tres(fields[cols.alloc_tres]).map_err(|e| e.to_string())?;

            Ok(Some(Job {
                job_id: job_id.to_string(),
                user: fields[cols.user].to_string(),
                partition: fields[cols.partition].to_string(),
                state,
                nodes,
                alloc,
            }))
        })
    }
}

/// Merge node records and partition membership into one node per hostname.
///
/// Duplicate hostnames keep the capacity of the last record seen; partition
/// memberships accumulate.
pub fn build_inventory(records: Vec<NodeRecord>, partitions: &[Partition]) -> BTreeMap<String, Node> {
    let mut nodes: BTreeMap<String, Node> = BTreeMap::new();

    for record in records {
        match nodes.get_mut(&record.name) {
            Some(node) => {
                if node.capacity != record.capacity {
                    debug!(node = %record.name, "duplicate node entry with different capacity, keeping last");
                }
                node.capacity = record.capacity;
                node.gpu_model = record.gpu_model;
            }
            None => {
                nodes.insert(
                    record.name.clone(),
                    Node {
                        name: record.name,
                        gpu_model: record.gpu_model,
                        capacity: record.capacity,
                        partitions: Default::default(),
                    },
                );
            }
        }
    }

    for partition in partitions {
        for host in &partition.nodes {
            if let Some(node) = nodes.get_mut(host) {
                node.partitions.insert(partition.name.clone());
            }
        }
    }

    nodes
}
