// src/main.rs
//! DGPS Station - differential GPS reference station

use anyhow::{bail, Context};
use clap::Parser;
use dgps_station::{
    config::{parse_reference, StationConfig},
    monitor::list_serial_ports,
    radio::{JsonLineTransmitter, UdpTransmitter},
    IngestMode, Station,
};
use log::{error, info, warn};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "dgps-station", version, about = "Differential GPS reference station")]
struct Args {
    /// Configuration file (defaults to ~/.config/dgps-station/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Serial port of the GPS receiver
    #[arg(short, long)]
    port: Option<String>,

    /// Serial baud rate
    #[arg(short, long)]
    baud: Option<u32>,

    /// Read NMEA from a capture file instead of the serial port
    #[arg(long, conflicts_with = "port")]
    replay: Option<PathBuf>,

    /// How the error engine is fed
    #[arg(long, value_enum)]
    mode: Option<IngestMode>,

    /// Fixed reference position as LAT,LON in decimal degrees, or `known`
    /// for the surveyed station antenna
    #[arg(long, value_parser = parse_reference_arg)]
    reference: Option<dgps_station::DecimalPosition>,

    /// Only average reference positions, never compute errors
    #[arg(long)]
    survey_only: bool,

    /// Send binary error payloads to this UDP address instead of stdout
    #[arg(long)]
    udp: Option<String>,

    /// List serial ports and exit
    #[arg(long)]
    list_ports: bool,

    /// Write the effective configuration back to the config file and exit
    #[arg(long)]
    save_config: bool,
}

fn parse_reference_arg(text: &str) -> Result<dgps_station::DecimalPosition, String> {
    parse_reference(text).map_err(|e| e.to_string())
}

fn load_config(args: &Args) -> anyhow::Result<StationConfig> {
    let mut config = match &args.config {
        Some(path) => StationConfig::load_from(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => StationConfig::load().context("loading default configuration")?,
    };

    if let Some(port) = &args.port {
        config.update_serial(port.clone(), args.baud.unwrap_or(config.serial_baudrate));
    } else if let Some(baud) = args.baud {
        config.serial_baudrate = baud;
    }
    if let Some(mode) = args.mode {
        config.ingest_mode = mode;
    }
    if let Some(reference) = args.reference {
        config.update_reference(reference.latitude, reference.longitude);
    }
    if args.survey_only {
        config.survey_only = true;
    }
    if let Some(udp) = &args.udp {
        config.udp_target = Some(udp.clone());
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if args.list_ports {
        list_serial_ports()?;
        return Ok(());
    }

    let config = load_config(&args)?;
    if args.save_config {
        match &args.config {
            Some(path) => config.save_to(path),
            None => config.save(),
        }
        .context("saving configuration")?;
        info!("Configuration saved");
        return Ok(());
    }

    let station = Station::new(config.clone())?;
    let engine = station.build_engine();

    if let Some(path) = &args.replay {
        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("opening {}", path.display()))?;
        info!("Replaying {}", path.display());

        let stats = match &config.udp_target {
            Some(target) => {
                let mut tx = UdpTransmitter::connect(target.as_str()).await?;
                station.replay(file, engine, &mut tx).await?
            }
            None => {
                let mut tx = JsonLineTransmitter::stdout();
                station.replay(file, engine, &mut tx).await?
            }
        };
        info!(
            "Replay done: {} accepted, {} checksum errors, {} overflows",
            stats.accepted, stats.checksum_errors, stats.overflows
        );
        return Ok(());
    }

    let Some(port) = config.serial_port.clone() else {
        bail!("no serial port configured; use --port or --replay");
    };
    let serial = station.connect_serial(&port, config.serial_baudrate)?;

    let engine_task = {
        let station = station.clone();
        tokio::spawn(async move { station.run_engine(engine).await })
    };
    let transmit_task = {
        let station = station.clone();
        match &config.udp_target {
            Some(target) => {
                let tx = UdpTransmitter::connect(target.as_str()).await?;
                tokio::spawn(async move { station.run_transmitter(tx).await })
            }
            None => {
                let tx = JsonLineTransmitter::stdout();
                tokio::spawn(async move { station.run_transmitter(tx).await })
            }
        }
    };

    tokio::select! {
        result = station.ingest(serial) => {
            match result {
                Ok(_) => warn!("Serial port closed"),
                Err(e) => error!("Ingest stopped: {}", e),
            }
        }
        result = engine_task => {
            error!("Error engine stopped: {:?}", result);
        }
        result = transmit_task => {
            error!("Transmitter stopped: {:?}", result);
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down...");
        }
    }

    Ok(())
}
