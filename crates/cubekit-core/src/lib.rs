pub mod alerts;
pub mod api;
pub mod bulk_replace;
pub mod changes;
pub mod cli;
pub mod commands;
pub mod commit;
pub mod config;
pub mod drafts;
pub mod editor;
pub mod error;
pub mod render;
pub mod search;
pub mod session;
pub mod sorts;
pub mod tag_colors;
pub mod token;

#[cfg(test)]
mod testing;

use std::ffi::OsString;
use std::io;

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
    "starting cubekit CLI"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.cuberc.as_deref()
  )?;
  cfg.apply_overrides(
    pre
      .rc_overrides
      .into_iter()
      .chain(
        cli
          .rc_overrides
          .into_iter()
          .map(|kv| (kv.key, kv.value))
      )
      .chain(cli.cube.map(|id| {
        ("cube.id".to_string(), id)
      }))
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

  let mut store =
    drafts::DraftStore::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open draft store \
         at {}",
        data_dir.display()
      )
    })?;

  let renderer =
    render::Renderer::new(&cfg)?;
  let api = api::HttpCubeApi::new(
    &cfg.server_url(),
    cfg.http_timeout()?
  )
  .context(
    "failed to build HTTP client"
  )?;
  let inv =
    cli::Invocation::parse(cli.rest)?;

  let mut env = commands::CommandEnv {
    store:    &mut store,
    cfg:      &cfg,
    renderer: &renderer,
    api:      &api
  };
  let mut out = io::stdout().lock();
  commands::dispatch(
    &mut env, &mut out, inv
  )?;

  info!("done");
  Ok(())
}
