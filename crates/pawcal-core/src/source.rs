use std::fs;
use std::io::{
  BufRead,
  BufReader
};
use std::path::Path;

use anyhow::Context;
use tracing::{
  debug,
  info,
  warn
};

use crate::schedule::Schedule;

/// Reads schedule records exported by the
/// schedule service, one JSON object per
/// line. A missing file is an empty
/// calendar.
#[tracing::instrument(skip(path))]
pub fn load_schedules(
  path: &Path
) -> anyhow::Result<Vec<Schedule>> {
  if !path.exists() {
    warn!(
      file = %path.display(),
      "schedule file not found; calendar is empty"
    );
    return Ok(vec![]);
  }

  debug!(file = %path.display(), "loading schedules");
  let file = fs::File::open(path)
    .with_context(|| {
      format!(
        "failed to open {}",
        path.display()
      )
    })?;
  let reader = BufReader::new(file);

  let mut out = Vec::new();
  for (idx, line) in
    reader.lines().enumerate()
  {
    let line = line.with_context(|| {
      format!(
        "failed reading {} line {}",
        path.display(),
        idx + 1
      )
    })?;
    let trimmed = line.trim();
    if trimmed.is_empty() {
      continue;
    }

    let schedule: Schedule =
      serde_json::from_str(trimmed)
        .with_context(|| {
          format!(
            "failed parsing {} line {}",
            path.display(),
            idx + 1
          )
        })?;
    out.push(schedule);
  }

  info!(
    file = %path.display(),
    count = out.len(),
    "loaded schedules"
  );
  Ok(out)
}
