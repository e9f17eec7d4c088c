// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Slurm integration: query the listing commands and parse their output.
//!
//! - `query`: runs `sinfo`/`sacct` (or a fake in tests) and returns raw text
//! - `parser`: turns that text into node, partition and job records

pub mod hostlist;
pub mod parser;
pub mod query;
pub mod tres;
pub mod types;

pub use parser::ColumnParser;
pub use query::SlurmCli;
