pub mod api;
pub mod bulk;
pub mod cache;
pub mod cli;
pub mod commands;
pub mod config;
pub mod gate;
pub mod mutation;
pub mod notify;
pub mod outcome;
pub mod render;
pub mod request_status;
pub mod selection;
pub mod service;
pub mod url_sync;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
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
    "starting tickoff CLI"
  );

  let mut cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  cfg.apply_overrides(
    cli
      .rc_overrides
      .into_iter()
      .map(|kv| (kv.key, kv.value))
  );
  debug!(file = ?cfg.loaded_file, "configuration loaded");

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let base_url = api::parse_base_url(
    cfg.api_base_url().as_deref()
  );
  let api = api::TodoApi::new(base_url)
    .context(
      "failed to build api client"
    )?;

  let renderer =
    render::Renderer::new(&cfg)?;
  let session = commands::Session::new(
    service::TaskService::new(api),
    renderer,
    cfg.gate_options()?,
    &data_dir
  );

  let runtime =
    tokio::runtime::Builder::new_current_thread()
      .enable_all()
      .build()
      .context(
        "failed to start async runtime"
      )?;

  runtime.block_on(session.dispatch(
    cli.command.unwrap_or_default()
  ))?;

  info!("done");
  Ok(())
}
