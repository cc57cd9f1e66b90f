use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use cli::Args;
use logging::setup_logging;
use miette::IntoDiagnostic;
use pacmirror_config::{config::Config, error::ConfigError, repository::Repository};
use pacmirror_core::repository::RepositoryMirror;
use pacmirror_dl::{
    error::DownloadError,
    http_client::{ClientConfig, DEFAULT_USER_AGENT},
};
use pacmirror_utils::path::resolve_path;
use tracing::{error, info};
use ureq::Proxy;

mod cli;
mod logging;
mod utils;

fn client_config(args: &Args, config: &Config) -> miette::Result<ClientConfig> {
    let proxy = match args.proxy.as_deref() {
        Some(proxy) => Some(Proxy::new(proxy).map_err(DownloadError::from)?),
        None => Proxy::try_from_env(),
    };

    let user_agent = args
        .user_agent
        .clone()
        .or_else(|| config.user_agent.clone())
        .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());

    Ok(ClientConfig {
        user_agent: Some(user_agent),
        proxy,
        timeout: Some(config.timeout()?),
        download_timeout: Some(config.download_timeout()?),
    })
}

fn selected_repositories<'a>(args: &Args, config: &'a Config) -> miette::Result<Vec<&'a Repository>> {
    if args.repos.is_empty() {
        return Ok(config.enabled_repositories().collect());
    }

    args.repos
        .iter()
        .map(|name| {
            config
                .repositories
                .iter()
                .find(|repo| &repo.name == name)
                .ok_or_else(|| miette::miette!("Unknown repository: {name}"))
        })
        .collect()
}

/// Mirrors every selected repository. Returns whether all of them succeeded.
fn handle_cli(args: &Args) -> miette::Result<bool> {
    let config_path = args
        .config
        .as_deref()
        .map(resolve_path)
        .transpose()
        .map_err(ConfigError::from)?;
    let config = Config::load(config_path.as_deref())?;
    let client = client_config(args, &config)?;

    let destdir = PathBuf::from(&args.destdir);
    let destdir = if destdir.is_absolute() {
        destdir
    } else {
        std::env::current_dir().into_diagnostic()?.join(destdir)
    };

    let mut failed = Vec::new();
    for repo in selected_repositories(args, &config)? {
        let result = RepositoryMirror::new(repo, &destdir, &config, &client)
            .and_then(|mirror| mirror.run(args.local));

        if let Err(err) = result {
            error!("{}: mirroring failed", repo.name);
            eprintln!("{:?}", miette::Report::new(err));
            failed.push(repo.name.clone());
        }
    }

    if failed.is_empty() {
        info!("done");
        Ok(true)
    } else {
        error!("failed repositories: {}", failed.join(", "));
        Ok(false)
    }
}

fn main() -> ExitCode {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .build(),
        )
    }))
    .ok();

    let args = Args::parse();
    if args.no_color {
        utils::set_color(false);
    }
    setup_logging(&args);

    match handle_cli(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("{err:?}");
            ExitCode::FAILURE
        }
    }
}
