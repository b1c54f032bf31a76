use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

use crate::config::LiveConfig;
use crate::render::RenderFormat;

#[derive(Parser, Debug)]
#[command(name = "live-buffer")]
#[command(version)]
#[command(about = "Live Markdown preview: line-patch relay server and rendering client")]
pub struct Args {
    /// TOML config file
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset (e.g. info, debug, live_buffer=trace)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Run the relay server; prints the bound port on stdout
    Serve {
        /// Interface to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (0 picks a free port)
        #[arg(long, short)]
        port: Option<u16>,

        /// Do not send late joiners a snapshot of the document
        #[arg(long)]
        no_replay: bool,
    },

    /// Follow a live buffer and render every update
    Watch {
        /// Page location the endpoint is derived from (e.g. http://127.0.0.1:4000/markdown)
        location: String,

        /// HTML file rewritten on each update (default: stdout)
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Document title for the HTML output
        #[arg(long)]
        title: Option<String>,

        /// Rendering of the buffer
        #[arg(long, value_enum)]
        format: Option<RenderFormat>,
    },

    /// Send one patch to a live buffer and exit
    Push {
        /// Page location or ws:// endpoint
        location: String,

        /// Patch records, one per argument (e.g. "+Hello" "-World")
        #[arg(required = true, num_args = 1.., allow_hyphen_values = true)]
        records: Vec<String>,
    },

    /// Print a shell completion script
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl Args {
    /// Apply command-line overrides on top of file/default config.
    pub fn apply_overrides(&self, config: &mut LiveConfig) {
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        match &self.command {
            Command::Serve {
                host,
                port,
                no_replay,
            } => {
                if let Some(host) = host {
                    config.server.host = host.clone();
                }
                if let Some(port) = port {
                    config.server.port = *port;
                }
                if *no_replay {
                    config.server.replay_on_join = false;
                }
            }
            Command::Watch {
                output,
                title,
                format,
                ..
            } => {
                if output.is_some() {
                    config.client.output = output.clone();
                }
                if let Some(title) = title {
                    config.client.title = title.clone();
                }
                if let Some(format) = format {
                    config.client.format = *format;
                }
            }
            Command::Push { .. } | Command::Completions { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse_serve_minimal() {
        let args = Args::parse_from(["live-buffer", "serve"]);
        assert_eq!(
            args.command,
            Command::Serve {
                host: None,
                port: None,
                no_replay: false
            }
        );
        assert!(args.config.is_none());
    }

    #[test]
    fn test_args_parse_serve_full() {
        let args = Args::parse_from([
            "live-buffer",
            "--config",
            "live.toml",
            "serve",
            "--host",
            "0.0.0.0",
            "--port",
            "4000",
            "--no-replay",
        ]);
        assert_eq!(args.config, Some(PathBuf::from("live.toml")));
        let mut config = LiveConfig::default();
        args.apply_overrides(&mut config);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 4000);
        assert!(!config.server.replay_on_join);
    }

    #[test]
    fn test_args_parse_watch() {
        let args = Args::parse_from([
            "live-buffer",
            "watch",
            "http://127.0.0.1:4000/markdown",
            "-o",
            "preview.html",
            "--format",
            "raw",
            "--log-level",
            "debug",
        ]);
        let mut config = LiveConfig::default();
        args.apply_overrides(&mut config);
        assert_eq!(config.client.output, Some(PathBuf::from("preview.html")));
        assert_eq!(config.client.format, RenderFormat::Raw);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.client.title, "Live Buffer");
    }

    #[test]
    fn test_watch_without_flags_keeps_file_config() {
        let args = Args::parse_from(["live-buffer", "watch", "http://h/"]);
        let mut config = LiveConfig::default();
        config.client.output = Some(PathBuf::from("from-file.html"));
        args.apply_overrides(&mut config);
        assert_eq!(config.client.output, Some(PathBuf::from("from-file.html")));
    }

    #[test]
    fn test_args_parse_push_accepts_minus_records() {
        let args = Args::parse_from(["live-buffer", "push", "ws://h:1/", "+Hello", "-World"]);
        match args.command {
            Command::Push { location, records } => {
                assert_eq!(location, "ws://h:1/");
                assert_eq!(records, vec!["+Hello", "-World"]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_args_push_requires_records() {
        assert!(Args::try_parse_from(["live-buffer", "push", "ws://h:1/"]).is_err());
    }

    #[test]
    fn test_args_parse_completions() {
        let args = Args::parse_from(["live-buffer", "completions", "bash"]);
        assert_eq!(args.command, Command::Completions { shell: Shell::Bash });
    }

    #[test]
    fn test_args_require_subcommand() {
        assert!(Args::try_parse_from(["live-buffer"]).is_err());
    }
}
