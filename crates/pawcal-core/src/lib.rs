pub mod bucket;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod grid;
pub mod pipeline;
pub mod recurrence;
pub mod render;
pub mod schedule;
pub mod selection;
pub mod source;

use std::ffi::OsString;
use std::io::{
  self,
  Write
};

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing::{
  debug,
  info
};

pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let stdout = io::stdout();
  run_with_output(
    raw_args,
    &mut stdout.lock()
  )
}

/// Same as [`run`], with command output
/// written to `out` instead of stdout.
#[tracing::instrument(skip_all)]
pub fn run_with_output<W: Write>(
  raw_args: Vec<OsString>,
  out: &mut W
) -> anyhow::Result<()> {
  let cli =
    cli::GlobalCli::parse_from(raw_args);

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting pawcal"
  );
  debug!(?cli.rc_overrides, "rc overrides");

  let mut cfg = config::Config::load(
    cli.pawcalrc.as_deref()
  )?;
  cfg.apply_overrides(
    cli
      .rc_overrides
      .into_iter()
      .map(|kv| (kv.key, kv.value))
  );

  let schedules_path =
    config::resolve_schedules_path(
      &cfg,
      cli.schedules.as_deref()
    )
    .context(
      "failed to resolve schedule file"
    )?;

  let schedules =
    source::load_schedules(
      &schedules_path
    )
    .with_context(|| {
      format!(
        "failed to load schedules from \
         {}",
        schedules_path.display()
      )
    })?;

  let renderer =
    render::Renderer::new(&cfg)?;

  commands::dispatch(
    &schedules,
    &cfg,
    &renderer,
    cli.command,
    Utc::now(),
    out
  )?;

  info!("done");
  Ok(())
}
