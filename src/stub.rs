use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio::sync::Mutex;
use tracing::{error, info};

use simstub_config::validate::validate;
use simstub_config::{load_config, load_file, Config, ConfigError};
use simstub_platform::PlatformPaths;
use simstub_rsp::SessionConfig;
use simstub_server::{Server, ServerOptions};

use crate::cli::Cli;
use crate::{logging, machine};

/// Listener and session settings for the server.
pub(crate) fn server_options(config: &Config) -> ServerOptions {
    ServerOptions {
        bind_address: config.server.bind_address.clone(),
        port: config.server.port,
        session: SessionConfig {
            max_packet_size: config.session.max_packet_size,
            max_retransmits: config.session.max_retransmits,
            max_framing_errors: config.session.max_framing_errors,
            compress_replies: config.session.compress_replies,
            halt_on_attach: config.server.halt_on_attach,
        },
    }
}

/// Pick the configuration source.
///
/// An explicit `--config` file must load. The layered global and project
/// files fall back to defaults; the error is returned for logging once the
/// subscriber is up.
pub(crate) fn load_settings(
    cli: &Cli,
    paths: &dyn PlatformPaths,
    project_dir: Option<&Path>,
) -> Result<(Config, Option<ConfigError>)> {
    if let Some(path) = &cli.config {
        let config = load_file(path).context("cannot use --config")?;
        return Ok((config, None));
    }
    Ok(match load_config(&paths.config_dir(), project_dir) {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    })
}

/// Load configuration, start logging, and serve debuggers until Ctrl-C.
pub(crate) fn run_stub(cli: Cli) -> Result<()> {
    let paths = simstub_platform::resolve_paths(cli.config_dir.as_deref())
        .context("failed to detect platform paths")?;

    // Load configuration first so we can honour log settings.
    let project_dir = std::env::current_dir().ok();
    let (mut config, load_error) = load_settings(&cli, paths.as_ref(), project_dir.as_deref())?;
    cli.apply(&mut config);
    validate(&config).map_err(|errors| {
        let details: Vec<String> = errors.iter().map(ToString::to_string).collect();
        anyhow!("invalid settings: {}", details.join("; "))
    })?;

    logging::init(&config.log, paths.as_ref())?;
    if let Some(e) = load_error {
        error!("config load failed, using defaults: {}", e);
    }
    info!(
        "simstub starting – log level: {}",
        config.log.level.as_filter()
    );

    let target = machine::build(&config.machine)?;
    let options = server_options(&config);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    runtime.block_on(async move {
        let server = Server::bind(options, Arc::new(Mutex::new(target))).await?;
        server
            .serve_until(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!("cannot listen for Ctrl-C: {}", e);
                    std::future::pending::<()>().await;
                }
            })
            .await?;
        info!("simstub exiting");
        Ok::<(), anyhow::Error>(())
    })
}
