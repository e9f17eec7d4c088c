// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

use std::collections::BTreeSet;

use crate::usage::NodeUsage;

/// Node and user restrictions applied after aggregation
#[derive(Debug, Clone, Default)]
pub struct Filter {
    /// Keep only nodes with at least one GPU
    pub gpu_only: bool,
    /// Keep only jobs of these users, and only nodes where they run
    pub users: Option<BTreeSet<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct Filtered {
    pub nodes: Vec<NodeUsage>,
    /// Requested users without any running job
    pub unknown_users: Vec<String>,
}

impl Filter {
    pub fn apply(&self, nodes: &[NodeUsage]) -> Filtered {
        let unknown_users = match &self.users {
            Some(users) => users
                .iter()
                .filter(|u| !nodes.iter().any(|n| n.jobs.iter().any(|j| &j.user == *u)))
                .cloned()
                .collect(),
            None => Vec::new(),
        };

        let nodes = nodes
            .iter()
            .filter(|n| !self.gpu_only || n.has_gpus())
            .filter_map(|n| match &self.users {
                Some(users) => {
                    let restricted = n.restrict_to_users(users);
                    (!restricted.jobs.is_empty()).then_some(restricted)
                }
                None => Some(n.clone()),
            })
            .collect();

        Filtered { nodes, unknown_users }
    }
}
