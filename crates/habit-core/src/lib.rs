pub mod calendar;
pub mod cli;
pub mod clock;
pub mod commands;
pub mod completions;
pub mod config;
pub mod datastore;
pub mod dates;
pub mod datetime;
pub mod error;
pub mod habit;
pub mod rate;
pub mod render;
pub mod state;
pub mod stats;
pub mod streak;
pub mod transfer;
pub mod trend;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

pub use crate::clock::{
  Clock,
  FixedClock,
  SystemClock
};
pub use crate::error::HabitError;

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  run_with_clock(
    raw_args,
    &SystemClock
  )
}

/// Full command-line flow with an explicit clock.
#[tracing::instrument(skip_all)]
pub fn run_with_clock(
  raw_args: Vec<OsString>,
  clock: &dyn Clock
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting habit CLI"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.habitrc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let backend =
    datastore::FileStore::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open datastore at \
         {}",
        data_dir.display()
      )
    })?;
  let data =
    datastore::DataStore::new(backend);

  let boundary =
    datetime::resolve_day_boundary(
      &cfg, &data_dir
    );
  let mut renderer =
    render::Renderer::new(&cfg)?;
  let inv = cli::Invocation::parse(
    &cfg, cli.rest
  )?;

  commands::dispatch(
    &data,
    &cfg,
    &mut renderer,
    clock,
    boundary,
    inv
  )?;

  info!("done");
  Ok(())
}
