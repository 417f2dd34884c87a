//! CLI-based stats sampling fallback.
//!
//! Degraded-mode path for hosts where the stats API is unusable: shells out
//! to `docker stats --no-stream` with a JSON line format and converts the
//! human-readable display values back into counters. This path shares
//! nothing with the collection engine; it exists so a caller can still get a
//! one-shot usage snapshot when per-container subscriptions are broken.

use std::collections::HashMap;
use std::time::Duration;

use tokio::process::Command;

/// Deadline for one CLI sampling pass.
const SAMPLE_TIMEOUT: Duration = Duration::from_secs(15);

/// Template producing one JSON object per container on stdout.
const STATS_FORMAT: &str = concat!(
    r#"{"container":"{{ .Container }}","id":"{{.ID}}","name":"{{.Name}}","#,
    r#""cpu.percent":"{{.CPUPerc}}","mem.usage":"{{.MemUsage}}","#,
    r#""mem.percent":"{{.MemPerc}}","net.io":"{{.NetIO}}","block.io":"{{.BlockIO}}"}"#,
);

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("stats command timed out")]
    Timeout,
    #[error("failed to execute stats command: {0}")]
    Exec(#[source] std::io::Error),
    #[error("stats command exited with {status}: {stderr}")]
    NonZeroExit {
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("stats command produced no usable output")]
    Empty,
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("invalid stats line: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid percentage value `{0}`")]
    Percent(String),
    #[error("invalid size value `{0}`")]
    Size(String),
    #[error("value `{0}` is not a `used / total` pair")]
    Pair(String),
}

/// One usage snapshot parsed from the CLI stats output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliStat {
    pub id: String,
    pub name: String,
    pub container: String,
    pub cpu_percent: f64,
    pub mem_percent: f64,
    /// Memory in use, in bytes.
    pub mem_usage: u64,
    /// Memory limit, in bytes.
    pub mem_total: u64,
    pub net_input: u64,
    pub net_output: u64,
    pub disk_read: u64,
    pub disk_write: u64,
}

/// Samples every running container once through the CLI.
///
/// Unparsable output lines are logged and skipped.
///
/// # Errors
///
/// Returns an error when the command cannot be executed, exceeds the
/// deadline, exits non-zero, or yields no parsable line at all.
pub async fn sample_all() -> Result<Vec<CliStat>, Error> {
    let output = tokio::time::timeout(
        SAMPLE_TIMEOUT,
        Command::new("docker")
            .args(["stats", "--no-stream", "--format", STATS_FORMAT])
            .output(),
    )
    .await
    .map_err(|_| Error::Timeout)?
    .map_err(Error::Exec)?;

    if !output.status.success() {
        return Err(Error::NonZeroExit {
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut stats = Vec::new();
    for line in stdout.lines().filter(|line| !line.is_empty()) {
        match parse_stat_line(line) {
            Ok(stat) => stats.push(stat),
            Err(err) => log::warn!("skipping unparsable stats line: {}", err),
        }
    }

    if stats.is_empty() {
        return Err(Error::Empty);
    }

    Ok(stats)
}

/// Parses one JSON object of display strings into a [`CliStat`].
pub fn parse_stat_line(line: &str) -> Result<CliStat, ParseError> {
    let fields: HashMap<String, String> = serde_json::from_str(line)?;
    let mut stat = CliStat::default();

    if let Some(id) = fields.get("id") {
        stat.id = id.clone();
    }
    if let Some(name) = fields.get("name") {
        stat.name = name.clone();
    }
    if let Some(container) = fields.get("container") {
        stat.container = container.clone();
    }
    if let Some(value) = fields.get("cpu.percent") {
        stat.cpu_percent = parse_percent(value)?;
    }
    if let Some(value) = fields.get("mem.percent") {
        stat.mem_percent = parse_percent(value)?;
    }
    if let Some(value) = fields.get("mem.usage") {
        (stat.mem_usage, stat.mem_total) = parse_size_pair(value)?;
    }
    if let Some(value) = fields.get("net.io") {
        (stat.net_input, stat.net_output) = parse_size_pair(value)?;
    }
    if let Some(value) = fields.get("block.io") {
        (stat.disk_read, stat.disk_write) = parse_size_pair(value)?;
    }

    Ok(stat)
}

fn parse_percent(value: &str) -> Result<f64, ParseError> {
    value
        .trim_end_matches('%')
        .parse::<f64>()
        .map_err(|_| ParseError::Percent(value.to_owned()))
}

/// Parses a `used / total` display pair like `1.5GiB / 7.8GiB`.
fn parse_size_pair(value: &str) -> Result<(u64, u64), ParseError> {
    let (used, total) = value
        .split_once('/')
        .ok_or_else(|| ParseError::Pair(value.to_owned()))?;
    Ok((to_bytes(used)?, to_bytes(total)?))
}

/// Converts one human-readable size into bytes.
///
/// The CLI prints binary-prefixed values with an `i` infix (`GiB`); the infix
/// is dropped before matching and all prefixes scale by 1024.
fn to_bytes(value: &str) -> Result<u64, ParseError> {
    let cleaned: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && *c != 'i')
        .collect();

    let unit_start = cleaned
        .find(|c: char| c.is_ascii_alphabetic())
        .ok_or_else(|| ParseError::Size(value.to_owned()))?;
    let (number, unit) = cleaned.split_at(unit_start);

    let number = number
        .parse::<f64>()
        .map_err(|_| ParseError::Size(value.to_owned()))?;
    let multiplier: u64 = match unit.to_ascii_uppercase().as_str() {
        "B" => 1,
        "KB" | "K" => 1 << 10,
        "MB" | "M" => 1 << 20,
        "GB" | "G" => 1 << 30,
        "TB" | "T" => 1 << 40,
        "PB" | "P" => 1 << 50,
        _ => return Err(ParseError::Size(value.to_owned())),
    };

    Ok((number * multiplier as f64) as u64)
}
