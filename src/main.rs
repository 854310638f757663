use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use serde_json::{Map, Value};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use webbox_link::domains::procedures;
use webbox_link::error::{Result, WebboxError};
use webbox_link::{Config, WebboxHandle};

#[derive(Parser, Debug)]
#[command(name = "webbox-link")]
#[command(about = "JSON-RPC over UDP client for inverter data loggers")]
struct Cli {
    #[arg(long, env = "WEBBOX_LINK_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, env = "WEBBOX_LINK_BIND")]
    bind: Option<String>,

    #[arg(long, env = "WEBBOX_LINK_PORT")]
    port: Option<u16>,

    #[arg(long, env = "WEBBOX_LINK_PEER_PORT")]
    peer_port: Option<u16>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Send one request and print the result of its reply.
    Call {
        peer: IpAddr,
        procedure: String,

        #[arg(long)]
        params: Option<String>,

        #[arg(long, default_value_t = 5000)]
        timeout_ms: u64,
    },
    /// Poll a procedure and print every reply until interrupted.
    Watch {
        peer: IpAddr,

        #[arg(default_value = procedures::GET_PLANT_OVERVIEW)]
        procedure: String,

        #[arg(long)]
        params: Option<String>,

        #[arg(long, default_value_t = 10_000)]
        interval_ms: u64,
    },
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(bind) = &cli.bind {
        config.bind_host = Some(bind.clone());
    }
    if let Some(port) = cli.port {
        config.local_port = Some(port);
    }
    if let Some(peer_port) = cli.peer_port {
        config.peer_port = Some(peer_port);
    }
    config.validate()?;
    Ok(config)
}

fn parse_params(raw: Option<&str>) -> Result<Option<Map<String, Value>>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(Some(map)),
        Ok(_) => Err(WebboxError::Config(
            "--params must be a JSON object".to_string(),
        )),
        Err(e) => Err(WebboxError::Config(e.to_string())),
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    let text =
        serde_json::to_string_pretty(value).map_err(|e| WebboxError::Serialization(e.to_string()))?;
    println!("{text}");
    Ok(())
}

fn warn_unknown(procedure: &str) {
    if !procedures::is_known(procedure) {
        warn!(procedure, "procedure is not one the data logger is known to support");
    }
}

async fn watch(
    handle: &WebboxHandle,
    peer: IpAddr,
    procedure: &str,
    params: Option<Map<String, Value>>,
    interval: Duration,
) -> Result<()> {
    let mut events = handle.subscribe();
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match handle.send_request(peer, procedure, params.clone()).await {
                    Ok(id) => info!(%peer, %id, procedure, "request issued"),
                    Err(WebboxError::QueueFull(_)) => warn!(%peer, "peer is not answering, request dropped"),
                    Err(err) => return Err(err),
                }
            }
            event = events.recv() => {
                match event {
                    Ok(event) if event.peer == peer => print_json(&event)?,
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => warn!(skipped, "event stream lagged"),
                    Err(RecvError::Closed) => return Ok(()),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                return Ok(());
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,webbox_link=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    let cli = Cli::parse();

    let config = load_config(&cli)?;
    let handle = WebboxHandle::start(&config).await?;
    info!(local_addr = %handle.local_addr(), "link ready");

    let outcome = match cli.command {
        Commands::Call {
            peer,
            procedure,
            params,
            timeout_ms,
        } => {
            warn_unknown(&procedure);
            let params = parse_params(params.as_deref())?;
            let event = handle
                .call(peer, &procedure, params, Duration::from_millis(timeout_ms))
                .await?;
            print_json(&event.result)
        }
        Commands::Watch {
            peer,
            procedure,
            params,
            interval_ms,
        } => {
            warn_unknown(&procedure);
            let params = parse_params(params.as_deref())?;
            watch(
                &handle,
                peer,
                &procedure,
                params,
                Duration::from_millis(interval_ms.max(1)),
            )
            .await
        }
    };

    let _ = handle.shutdown().await;
    outcome
}
