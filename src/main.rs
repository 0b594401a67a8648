use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use fan_bridge::{
    bridge::Bridge,
    cli::{self, Commands},
    config::Config,
    console,
    locator::DeviceLocator,
    logging, mock,
    serial::session::SerialSession,
    server,
};
use tracing::{debug, error, info};

async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut hangup = signal(SignalKind::hangup())?;

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("Ctrl-C, quitting");
            }
            _ = hangup.recv() => {
                info!("Hangup, quitting");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Ctrl-C, quitting");
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = cli::Cli::parse();

    if let Some(Commands::Examples(example)) = cli.command {
        cli::print_example(example)?;
        return Ok(());
    }

    logging::init(cli.log_level, cli.file_logging()).await;

    let mut config = if let Some(config_path) = &cli.config {
        debug!(?config_path, "Config from path");
        Config::new_from_path(config_path)?
    } else {
        debug!("Default config");
        Config::default()
    };
    cli.apply(&mut config);
    config.validate()?;

    if let Some(Commands::Ports) = cli.command {
        cli::print_ports(&config);
        return Ok(());
    }

    let session = if cli.mock {
        info!("Using a mock controller");
        mock::mock_session(config.serial.baud)
    } else {
        let path = match &config.device.path {
            Some(path) => path.clone(),
            None => DeviceLocator::new(&config.device).locate(),
        };

        SerialSession::open(&path, &config.serial).await?
    };

    let bridge = Bridge::start(session, &config);
    let handle = bridge.handle();

    let outcome = match cli.command {
        Some(Commands::Console { channel }) => {
            tokio::select! {
                result = shutdown_signal() => result,
                result = console::run(handle, channel) => result.map_err(Into::into),
            }
        }
        _ => {
            tokio::select! {
                result = shutdown_signal() => result,
                result = server::run_configured(config, handle) => {
                    error!("Server returned");
                    match result {
                        Ok(()) => Err(eyre!("Server stopped unexpectedly")),
                        Err(e) => Err(e.into()),
                    }
                }
            }
        }
    };

    bridge.shutdown().await;

    outcome
}
