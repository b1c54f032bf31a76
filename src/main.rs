use clap::{CommandFactory, Parser};
use colored::*;
use tracing_subscriber::EnvFilter;

use live_buffer::cli::{Args, Command};
use live_buffer::client;
use live_buffer::config::LiveConfig;
use live_buffer::server;
use live_buffer::sink::{DisplaySink, FileSink, StdoutSink};
use live_buffer::PatchHandler;

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if let Command::Completions { shell } = &args.command {
        let mut cmd = Args::command();
        clap_complete::generate(*shell, &mut cmd, "live-buffer", &mut std::io::stdout());
        return Ok(());
    }

    let mut config = LiveConfig::load(args.config.as_deref())?;
    args.apply_overrides(&mut config);
    config.validate()?;
    init_tracing(&config.log_level);

    match args.command {
        Command::Serve { .. } => {
            server::serve(&config.server).await?;
        }
        Command::Watch { location, .. } => {
            let endpoint = client::endpoint_from_location(&location)?;
            let sink: Box<dyn DisplaySink> = match &config.client.output {
                Some(path) => {
                    eprintln!(
                        "{}",
                        format!("  Rendering {} to {}", endpoint, path.display()).bright_green()
                    );
                    Box::new(FileSink::new(path, config.client.title.clone()))
                }
                None => Box::new(StdoutSink),
            };
            let mut handler = PatchHandler::new(config.client.format.renderer(), sink);
            client::watch(&endpoint, &mut handler).await?;
        }
        Command::Push { location, records } => {
            let endpoint = client::endpoint_from_location(&location)?;
            client::push(&endpoint, &client::join_records(&records)).await?;
        }
        Command::Completions { .. } => {}
    }

    Ok(())
}
