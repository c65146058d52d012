//! weft CLI - binary entry point.
//!
//! Loads `~/.weft/config.toml`, applies environment and command-line
//! overrides, then runs a line-oriented chat loop against the backend:
//!
//! ```text
//! main() -> WeftConfig + Args -> ChatSession -> repl::run()
//! ```
//!
//! Logs go to `~/.weft/logs/weft.log` so they never interleave with the
//! streamed answer on stdout.

mod repl;

use anyhow::{Result, bail};
use std::{
    env,
    fs::{self, OpenOptions},
    path::PathBuf,
    sync::{Arc, Mutex},
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use weft_client::HttpTransport;
use weft_engine::{ChatSession, WeftConfig};

const USAGE: &str = "\
usage: weft [options]

options:
  --url <url>          backend base URL
  --model <id>         model id sent with each request
  --mcp                enable MCP tools
  --mcp-server <name>  MCP server type
  --auto-approve       let the backend run tools without asking
  -h, --help           show this help";

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::try_new("warn").expect("warn filter is valid"));

    let (log_file, init_warnings) = open_weft_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // No log file: stay silent rather than write into the transcript.
    tracing_subscriber::registry().with(env_filter).init();
}

fn open_weft_log_file() -> (Option<(PathBuf, std::fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in weft_log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn weft_log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // ~/.weft/logs/weft.log
    if let Some(config_path) = WeftConfig::path()
        && let Some(config_dir) = config_path.parent()
    {
        candidates.push(config_dir.join("logs").join("weft.log"));
    }

    candidates.push(PathBuf::from(".weft").join("logs").join("weft.log"));

    candidates
}

/// Command-line overrides. They win over the environment and the config file.
#[derive(Debug, Default, PartialEq, Eq)]
struct Args {
    url: Option<String>,
    model: Option<String>,
    mcp: bool,
    mcp_server: Option<String>,
    auto_approve: bool,
    help: bool,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self> {
        let mut parsed = Args::default();
        while let Some(arg) = args.next() {
            let mut value = |flag: &str| match args.next() {
                Some(value) => Ok(value),
                None => bail!("{flag} needs a value"),
            };
            match arg.as_str() {
                "--url" => parsed.url = Some(value("--url")?),
                "--model" => parsed.model = Some(value("--model")?),
                "--mcp-server" => parsed.mcp_server = Some(value("--mcp-server")?),
                "--mcp" => parsed.mcp = true,
                "--auto-approve" => parsed.auto_approve = true,
                "-h" | "--help" => parsed.help = true,
                other => bail!("unknown argument: {other}\n\n{USAGE}"),
            }
        }
        Ok(parsed)
    }

    fn apply(self, config: &mut WeftConfig) {
        if let Some(url) = self.url {
            config.backend.url = url;
        }
        if let Some(model) = self.model {
            config.backend.model = model;
        }
        if let Some(server) = self.mcp_server {
            config.mcp.server = server;
        }
        config.mcp.enabled |= self.mcp;
        config.mcp.auto_approve |= self.auto_approve;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse(env::args().skip(1))?;
    if args.help {
        println!("{USAGE}");
        return Ok(());
    }

    init_tracing();

    let mut config = match WeftConfig::load() {
        Ok(config) => config.unwrap_or_default(),
        Err(e) => {
            eprintln!("Ignoring config: {e}");
            WeftConfig::default()
        }
    };
    config.apply_env_overrides();
    args.apply(&mut config);

    let transport = HttpTransport::new(config.client_settings())?;
    tracing::info!(
        backend = %transport.settings().base_url,
        model = %config.backend.model,
        mcp = config.mcp.enabled,
        "Starting session"
    );
    let mut session = ChatSession::new(config.session_settings(), Arc::new(transport));

    repl::run(&mut session).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args> {
        Args::parse(args.iter().map(ToString::to_string))
    }

    #[test]
    fn flags_and_values() {
        let args = parse(&["--model", "openai/gpt-4o", "--mcp", "--url", "http://b:1"]).unwrap();
        assert_eq!(args.model.as_deref(), Some("openai/gpt-4o"));
        assert_eq!(args.url.as_deref(), Some("http://b:1"));
        assert!(args.mcp);
        assert!(!args.auto_approve);
    }

    #[test]
    fn missing_value_is_an_error() {
        let err = parse(&["--model"]).unwrap_err();
        assert!(err.to_string().contains("--model needs a value"));
    }

    #[test]
    fn unknown_flag_is_an_error() {
        assert!(parse(&["--verbose"]).is_err());
    }

    #[test]
    fn arguments_override_config() {
        let mut config = WeftConfig::default();
        parse(&["--model", "m", "--auto-approve", "--mcp-server", "github"])
            .unwrap()
            .apply(&mut config);
        let session = config.session_settings();
        assert_eq!(session.model_id, "m");
        assert_eq!(session.mcp_server_type, "github");
        assert!(session.mcp_auto_approve);
        assert!(!session.use_mcp);
    }
}
