//! Send one command to the broker and print the reply.

use std::path::PathBuf;
use clap::Parser;
use tokio::sync::oneshot;

use presence_monitor::config::{self, BrokerConfig};
use presence_monitor::observability::logging;
use presence_monitor::rpc::channel::complete_call;
use presence_monitor::rpc::{encode, CallChannel, CallOutcome, HttpTransport, RequestFields};

#[derive(Parser)]
#[command(name = "rpc-cli")]
#[command(about = "Issue a single request/reply call to the activity broker", long_about = None)]
struct Cli {
    /// Read broker settings from this monitor config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Gateway host (overrides the config file).
    #[arg(long)]
    broker_host: Option<String>,

    /// Gateway port (overrides the config file).
    #[arg(long)]
    broker_port: Option<u16>,

    #[arg(short, long, default_value = "activitymanager")]
    queue: String,

    #[arg(short, long)]
    activity: Option<String>,

    #[arg(short, long)]
    location: Option<String>,

    #[arg(short, long)]
    device: Option<String>,

    #[arg(long)]
    command: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init_logging("info")?;

    let mut broker: BrokerConfig = match &cli.config {
        Some(path) => config::load_config(path)?.broker,
        None => BrokerConfig::default(),
    };
    if let Some(host) = cli.broker_host {
        broker.host = host;
    }
    if let Some(port) = cli.broker_port {
        broker.port = port;
    }

    let request = encode(RequestFields {
        activity: cli.activity,
        location: cli.location,
        device: cli.device,
        command: cli.command,
    });

    let channel = CallChannel::new(HttpTransport::new(broker));
    let (tx, rx) = oneshot::channel();
    let completion = channel.clone();
    channel.send(
        request,
        &cli.queue,
        Some(Box::new(move |result| {
            let _ = tx.send(complete_call(&completion, result));
        })),
    );

    match rx.await? {
        CallOutcome::Accepted => println!("OK"),
        CallOutcome::Rejected => println!("NOT OK"),
        CallOutcome::Replied(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        CallOutcome::Failed => {
            eprintln!("Command failed: empty or undecodable reply");
            std::process::exit(1);
        }
        CallOutcome::TransportFailed(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    }
    Ok(())
}
