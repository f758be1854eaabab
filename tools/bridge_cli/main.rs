// tools/bridge_cli/main.rs
//
// Command-line front end for the radio bridge.
//
//   bridge_cli ports [--radio-only] [--json]
//   bridge_cli monitor --port1 /dev/ttyUSB0 [--port2 /dev/ttyUSB1] [--rx 1] [--alarms]
//   bridge_cli send --port /dev/ttyUSB0 "PING"

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use radio_bridge_lib::consumers::{
    should_listen, AlarmClassifier, LineSink, PeriodicSender, SenderEvent, TelemetryParser,
    DEFAULT_RATE_HZ,
};
use radio_bridge_lib::io::serial::looks_like_radio;
use radio_bridge_lib::logging::init_file_logging;
use radio_bridge_lib::{
    load_config, BridgeConfig, BridgeEvent, BridgeOptions, BridgeService, ChannelId, NativeDriver,
    OpenStates, PortDriver, SendTarget, SerialBridge,
};

#[derive(Parser)]
#[command(name = "bridge_cli")]
#[command(author, version, about = "Dual-channel serial bridge for telemetry radios", long_about = None)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write a timestamped log file into this directory
    #[arg(long, global = true, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List serial ports
    Ports {
        /// Only show devices that look like USB-serial radio modems
        #[arg(long)]
        radio_only: bool,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Open one or two ports and print bridge events until Ctrl-C
    Monitor {
        /// Port for channel 1
        #[arg(long)]
        port1: Option<String>,

        /// Port for channel 2
        #[arg(long)]
        port2: Option<String>,

        /// Baud rate for both channels (default from config)
        #[arg(short, long)]
        baud: Option<u32>,

        /// Only read lines from this channel
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=2))]
        rx: Option<u8>,

        /// Default transmit channel
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=2))]
        tx: Option<u8>,

        /// Classify lines as error / warning / success
        #[arg(long)]
        alarms: bool,

        /// Parse lines as 14-field CSV telemetry
        #[arg(long)]
        telemetry: bool,

        /// Send this line repeatedly on the TX channel
        #[arg(long, value_name = "TEXT")]
        heartbeat: Option<String>,

        /// Heartbeat rate in Hz
        #[arg(long, default_value_t = DEFAULT_RATE_HZ)]
        rate: u32,

        /// Skip the AT probe after opening
        #[arg(long)]
        no_probe: bool,
    },

    /// Open a port, send one line and exit
    Send {
        #[arg(short, long)]
        port: String,

        #[arg(short, long)]
        baud: Option<u32>,

        /// Line to send; a trailing newline is added
        text: String,
    },
}

fn channel_arg(n: Option<u8>) -> Result<Option<ChannelId>> {
    n.map(ChannelId::try_from).transpose().map_err(anyhow::Error::from)
}

// ============================================================================
// Commands
// ============================================================================

fn cmd_ports(radio_only: bool, json: bool) -> Result<()> {
    let ports: Vec<_> = NativeDriver
        .enumerate()
        .map_err(anyhow::Error::msg)?
        .into_iter()
        .filter(|p| !radio_only || looks_like_radio(p))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&ports)?);
        return Ok(());
    }

    if ports.is_empty() {
        println!("No serial ports found.");
        return Ok(());
    }

    println!("{:<24} {:<10} {:<11} {:<6} DESCRIPTION", "PORT", "KIND", "VID:PID", "RADIO");
    for p in &ports {
        let ids = match (p.vid, p.pid) {
            (Some(vid), Some(pid)) => format!("{:04x}:{:04x}", vid, pid),
            _ => "-".to_string(),
        };
        println!(
            "{:<24} {:<10} {:<11} {:<6} {}",
            p.port_name,
            format!("{:?}", p.kind).to_lowercase(),
            ids,
            if looks_like_radio(p) { "yes" } else { "no" },
            p.description.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

struct MonitorArgs {
    port1: Option<String>,
    port2: Option<String>,
    baud: Option<u32>,
    rx: Option<u8>,
    tx: Option<u8>,
    alarms: bool,
    telemetry: bool,
    heartbeat: Option<String>,
    rate: u32,
    no_probe: bool,
}

async fn cmd_monitor(config: BridgeConfig, args: MonitorArgs) -> Result<()> {
    if args.port1.is_none() && args.port2.is_none() {
        anyhow::bail!("Nothing to monitor: pass --port1 and/or --port2");
    }
    let rx_source = channel_arg(args.rx)?;
    let tx_target = channel_arg(args.tx)?;
    let baud = args.baud.unwrap_or(config.default_baud);

    let mut options = BridgeOptions::from(&config);
    if args.no_probe {
        options.probe_on_connect = false;
    }
    let service = BridgeService::spawn(SerialBridge::native(options), config.poll_interval());
    let handle = service.handle();
    let mut events = handle.subscribe().await?;

    for (channel, port) in [(ChannelId::One, &args.port1), (ChannelId::Two, &args.port2)] {
        if let Some(port) = port {
            handle
                .connect(channel, port, baud)
                .await
                .with_context(|| format!("Failed to open {} on {}", port, channel))?;
        }
    }
    if let Some(channel) = rx_source {
        handle.set_rx_source(channel).await?;
    }
    if let Some(channel) = tx_target {
        handle.set_tx_target(channel).await?;
    }

    let sink: Arc<dyn LineSink> = Arc::new(handle.clone());
    let (mut sender, mut sender_events) = PeriodicSender::new(sink);
    if let Some(text) = &args.heartbeat {
        let channel = tx_target.unwrap_or(if args.port1.is_some() { ChannelId::One } else { ChannelId::Two });
        sender.start_periodic(channel, text, args.rate)?;
    }

    let classifier = AlarmClassifier::new();
    let mut parser = TelemetryParser::new();
    let mut open = OpenStates::default();
    let status = handle.status().await?;
    for ch in &status.channels {
        open.0[ch.channel.index()] = ch.connected;
    }

    println!("Monitoring (Ctrl-C to stop)...");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            Some(event) = sender_events.recv() => {
                match event {
                    SenderEvent::Failed { channel, message } => eprintln!("[{}] heartbeat failed: {}", channel, message),
                    SenderEvent::Stopped { channel, reason } => eprintln!("[{}] heartbeat stopped: {}", channel, reason),
                    SenderEvent::Sent { .. } => {}
                }
            }
            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    BridgeEvent::LineReceived { channel, text } => {
                        println!("[{}] {}", channel.number(), text);
                        if !should_listen(open, channel) {
                            continue;
                        }
                        if args.alarms {
                            if let Some(level) = classifier.classify(&text) {
                                println!("    {}: {}", level, text);
                            }
                        }
                        if args.telemetry {
                            if let Some(sample) = parser.parse(&text) {
                                println!("    {}", serde_json::to_string(&sample)?);
                            }
                        }
                    }
                    BridgeEvent::Connected { channel } => {
                        open.0[channel.index()] = true;
                        eprintln!("{} connected", channel);
                    }
                    BridgeEvent::Disconnected { channel } => {
                        open.0[channel.index()] = false;
                        eprintln!("{} disconnected", channel);
                    }
                    BridgeEvent::NotRadioModem { channel } => {
                        eprintln!("{}: device did not answer like a radio modem", channel);
                    }
                    BridgeEvent::Error { channel: Some(channel), message } => eprintln!("{}: {}", channel, message),
                    BridgeEvent::Error { channel: None, message } => eprintln!("error: {}", message),
                    other => eprintln!("{}", serde_json::to_string(&other)?),
                }
            }
        }
    }

    sender.stop_periodic(ChannelId::One);
    sender.stop_periodic(ChannelId::Two);
    service.shutdown().await;
    Ok(())
}

async fn cmd_send(config: BridgeConfig, port: &str, baud: Option<u32>, text: &str) -> Result<()> {
    let mut options = BridgeOptions::from(&config);
    options.probe_on_connect = false;
    let service = BridgeService::spawn(SerialBridge::native(options), config.poll_interval());
    let handle = service.handle();

    let result = async {
        handle
            .connect(ChannelId::One, port, baud.unwrap_or(config.default_baud))
            .await
            .with_context(|| format!("Failed to open {}", port))?;
        handle.send(SendTarget::Default, text).await?;
        anyhow::Ok(())
    }
    .await;

    service.shutdown().await;
    result?;
    println!("Sent {:?} on {}", text, port);
    Ok(())
}

// ============================================================================
// Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(dir) = cli.log_dir {
        config.log_dir = Some(dir);
    }
    if let Some(dir) = &config.log_dir {
        let path = init_file_logging(dir).map_err(anyhow::Error::msg)?;
        eprintln!("Logging to {}", path.display());
    }

    match cli.command {
        Commands::Ports { radio_only, json } => cmd_ports(radio_only, json),
        Commands::Monitor {
            port1,
            port2,
            baud,
            rx,
            tx,
            alarms,
            telemetry,
            heartbeat,
            rate,
            no_probe,
        } => {
            cmd_monitor(
                config,
                MonitorArgs {
                    port1,
                    port2,
                    baud,
                    rx,
                    tx,
                    alarms,
                    telemetry,
                    heartbeat,
                    rate,
                    no_probe,
                },
            )
            .await
        }
        Commands::Send { port, baud, text } => cmd_send(config, &port, baud, &text).await,
    }
}
