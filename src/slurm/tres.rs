// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Parsers for Slurm resource fields: GRES, AllocTRES, CPUsState and memory sizes.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use super::types::Usage;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TresError {
    #[error("empty TRES field")]
    Empty,
    #[error("expected key=value, got '{0}'")]
    NotKeyValue(String),
    #[error("invalid quantity '{0}'")]
    InvalidQuantity(String),
    #[error("invalid CPU state '{0}', expected A/I/O/T")]
    InvalidCpuState(String),
}

/// GPUs advertised by a node's GRES column
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GpuGres {
    pub count: u64,
    /// "a100", or "(a100|v100)" when a node carries several models
    pub model: Option<String>,
}

/// Parse a GRES string such as `gpu:a100:4(S:0-1)` or `gpu:4,gpu:v100:2`
pub fn parse_gres(gres: &str) -> GpuGres {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(?:^|,)gpu(?::(?P<model>[^:,(]+))?:(?P<count>\d+)").expect("valid GRES regex")
    });

    let mut result = GpuGres::default();
    let mut models = BTreeSet::new();
    for caps in re.captures_iter(gres) {
        result.count += caps["count"].parse::<u64>().unwrap_or(0);
        if let Some(model) = caps.name("model") {
            models.insert(model.as_str().to_string());
        }
    }

    result.model = match models.len() {
        0 => None,
        1 => models.into_iter().next(),
        _ => Some(format!("({})", models.into_iter().collect::<Vec<_>>().join("|"))),
    };
    result
}

/// CPU counters from sinfo's `CPUsState` column (`allocated/idle/other/total`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuState {
    pub allocated: u64,
    pub idle: u64,
    pub other: u64,
    pub total: u64,
}

pub fn parse_cpus_state(value: &str) -> Result<CpuState, TresError> {
    let invalid = || TresError::InvalidCpuState(value.to_string());
    let fields = value
        .split('/')
        .map(|f| f.parse::<u64>().map_err(|_| invalid()))
        .collect::<Result<Vec<_>, _>>()?;

    match fields[..] {
        [allocated, idle, other, total] => Ok(CpuState { allocated, idle, other, total }),
        _ => Err(invalid()),
    }
}

/// Parse a memory quantity into MiB.
///
/// Bare numbers are taken to be in `default_unit` (sinfo reports MB, sacct with
/// `--units=G` reports GB with a suffix).
pub fn parse_mem_mib(value: &str, default_unit: char) -> Result<u64, TresError> {
    let invalid = || TresError::InvalidQuantity(value.to_string());
    let value = value.trim();

    let (number, unit) = match value.chars().last() {
        Some(c) if c.is_ascii_alphabetic() => (&value[..value.len() - 1], c),
        Some(_) => (value, default_unit),
        None => return Err(invalid()),
    };
    let number: f64 = number.parse().map_err(|_| invalid())?;
    if !number.is_finite() || number < 0.0 {
        return Err(invalid());
    }

    let scale = match unit.to_ascii_uppercase() {
        'K' => 1.0 / 1024.0,
        'M' => 1.0,
        'G' => 1024.0,
        'T' => 1024.0 * 1024.0,
        'P' => 1024.0 * 1024.0 * 1024.0,
        _ => return Err(invalid()),
    };
    Ok((number * scale).round() as u64)
}

/// Parse an `AllocTRES` string, e.g. `billing=8,cpu=8,gres/gpu=2,mem=64G,node=1`.
///
/// Typed GPU entries (`gres/gpu:a100=2`) only count when the untyped total is
/// absent, otherwise they would be counted twice.
pub fn parse_alloc_tres(tres: &str) -> Result<Usage, TresError> {
    let tres = tres.trim();
    if tres.is_empty() {
        return Err(TresError::Empty);
    }

    let mut usage = Usage::default();
    let mut gpus: Option<u64> = None;
    let mut typed_gpus = 0u64;

    for part in tres.split(',').filter(|p| !p.is_empty()) {
        let (key, value) = part
            .split_once('=')
            .ok_or_else(|| TresError::NotKeyValue(part.to_string()))?;
        let count = || {
            value
                .parse::<u64>()
                .map_err(|_| TresError::InvalidQuantity(value.to_string()))
        };
        match key {
            "cpu" => usage.cpus = count()?,
            "mem" => usage.mem_mib = parse_mem_mib(value, 'M')?,
            "gres/gpu" => gpus = Some(count()?),
            k if k.starts_with("gres/gpu:") => typed_gpus += count()?,
            _ => {}
        }
    }

    usage.gpus = gpus.unwrap_or(typed_gpus);
    Ok(usage)
}
