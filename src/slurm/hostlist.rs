// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Slurm hostlist expansion, e.g. `gpu[01-03,07],cpu5` into individual hostnames.
//!
//! Expanded locally instead of via `scontrol show hostnames` so that parsing
//! never spawns a process per job line.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HostlistError {
    #[error("unbalanced brackets in '{0}'")]
    Unbalanced(String),
    #[error("invalid range '{0}'")]
    InvalidRange(String),
    #[error("'{0}' expands to more than {max} hosts", max = MAX_HOSTS)]
    TooLarge(String),
}

/// Upper bound on the hosts a single group may expand to
pub const MAX_HOSTS: usize = 1 << 16;

/// Expand a compressed Slurm nodelist to individual hostnames
pub fn expand_hostlist(nodelist: &str) -> Result<Vec<String>, HostlistError> {
    let nodelist = nodelist.trim();
    if nodelist.is_empty() || nodelist == "(null)" || nodelist == "None" {
        return Ok(Vec::new());
    }

    let mut hosts = Vec::new();
    for group in split_top_level(nodelist)? {
        hosts.extend(expand_group(group)?);
    }
    Ok(hosts)
}

/// Split on commas that are not inside brackets
fn split_top_level(nodelist: &str) -> Result<Vec<&str>, HostlistError> {
    let mut groups = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in nodelist.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| HostlistError::Unbalanced(nodelist.to_string()))?;
            }
            ',' if depth == 0 => {
                groups.push(&nodelist[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(HostlistError::Unbalanced(nodelist.to_string()));
    }
    groups.push(&nodelist[start..]);

    Ok(groups.into_iter().filter(|g| !g.is_empty()).collect())
}

/// Expand one group, e.g. `rack[1-2]-n[01-02]`, bracket by bracket from the left
fn expand_group(group: &str) -> Result<Vec<String>, HostlistError> {
    let Some(open) = group.find('[') else {
        return Ok(vec![group.to_string()]);
    };
    let close = group[open..]
        .find(']')
        .map(|i| open + i)
        .ok_or_else(|| HostlistError::Unbalanced(group.to_string()))?;

    let prefix = &group[..open];
    let tails = expand_group(&group[close + 1..])?;
    let mut hosts = Vec::new();
    for range in group[open + 1..close].split(',') {
        for index in expand_range(range)? {
            if hosts.len() + tails.len() > MAX_HOSTS {
                return Err(HostlistError::TooLarge(group.to_string()));
            }
            hosts.extend(tails.iter().map(|tail| format!("{prefix}{index}{tail}")));
        }
    }
    Ok(hosts)
}

/// Expand `07` or `01-12`, keeping the zero padding of the range start
fn expand_range(range: &str) -> Result<Vec<String>, HostlistError> {
    let invalid = || HostlistError::InvalidRange(range.to_string());

    let (start, end) = match range.split_once('-') {
        Some((start, end)) => (start, end),
        None => (range, range),
    };
    if start.is_empty() || !start.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let width = start.len();
    let first: u64 = start.parse().map_err(|_| invalid())?;
    let last: u64 = end.parse().map_err(|_| invalid())?;
    if last < first || last - first >= MAX_HOSTS as u64 {
        return Err(invalid());
    }

    Ok((first..=last).map(|i| format!("{i:0width$}")).collect())
}
