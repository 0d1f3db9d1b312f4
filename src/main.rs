//! CLI entry point: parses flags into a session builder, drives
//! authentication, registers a default logging rx-callback, and runs the
//! protocol loop until Ctrl-C or a fatal transport error. This binary is the
//! only place in the crate that reads argv, the environment, or handles
//! process signals.

use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use log::info;

use dmr_homebrew_bridge::config::Config;
use dmr_homebrew_bridge::protocol::{close, Homebrew, Proto};
use dmr_homebrew_bridge::session::Session;
use dmr_homebrew_bridge::transport::Transport;

/// Homebrew-protocol DMR repeater bridge.
#[derive(Parser, Debug)]
#[command(name = "dmr-homebrew-bridge", version, about)]
struct Args {
    /// Master address, host:port.
    #[arg(long)]
    master: String,

    /// Local UDP port to bind. 0 picks an ephemeral port.
    #[arg(long, default_value_t = 0)]
    local_port: u16,

    /// 8-digit repeater id, e.g. 31337001. Required unless `--config` supplies one.
    #[arg(long)]
    repeater_id: Option<String>,

    /// Shared secret used in the challenge/response step.
    #[arg(long)]
    secret: String,

    /// Load the repeater configuration blob fields from a JSON file instead
    /// of the flags below. Flags below are only consulted when this is
    /// absent.
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    #[arg(long, default_value = "N0CALL")]
    call_sign: String,
    #[arg(long, default_value = "")]
    rx_freq_hz: String,
    #[arg(long, default_value = "")]
    tx_freq_hz: String,
    #[arg(long, default_value = "10")]
    tx_power: String,
    #[arg(long, default_value = "01")]
    color_code: String,
    #[arg(long, default_value = "0")]
    latitude: String,
    #[arg(long, default_value = "0")]
    longitude: String,
    #[arg(long, default_value = "0")]
    antenna_height_m: String,
    #[arg(long, default_value = "")]
    location: String,
    #[arg(long, default_value = "")]
    description: String,
    #[arg(long, default_value = "")]
    url: String,
    #[arg(long, default_value = "dmr-homebrew-bridge")]
    software_id: String,
    #[arg(long, default_value = "")]
    package_id: String,
}

fn repeater_id_bytes(s: &str) -> anyhow::Result<[u8; 8]> {
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
        anyhow::bail!("repeater id must be exactly 8 ASCII digits, got {s:?}");
    }
    let mut out = [0u8; 8];
    out.copy_from_slice(s.as_bytes());
    Ok(out)
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let remote: SocketAddr = args
        .master
        .to_socket_addrs()
        .context("resolving master address")?
        .next()
        .context("master address resolved to no addresses")?;
    let local: SocketAddr = format!("0.0.0.0:{}", args.local_port)
        .parse()
        .expect("well-formed local bind address");

    let config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading config file {}", path.display()))?,
        None => Config {
            repeater_id: args
                .repeater_id
                .clone()
                .context("--repeater-id is required without --config")?,
            call_sign: args.call_sign,
            rx_freq_hz: args.rx_freq_hz,
            tx_freq_hz: args.tx_freq_hz,
            tx_power: args.tx_power,
            color_code: args.color_code,
            latitude: args.latitude,
            longitude: args.longitude,
            antenna_height_m: args.antenna_height_m,
            location: args.location,
            description: args.description,
            url: args.url,
            software_id: args.software_id,
            package_id: args.package_id,
        },
    };
    let repeater_id_str = args.repeater_id.clone().unwrap_or_else(|| config.repeater_id.clone());
    let repeater_id = repeater_id_bytes(&repeater_id_str)?;

    let transport = Arc::new(Transport::bind(local, remote).context("binding local socket")?);
    info!(
        "connecting to {remote} as {repeater_id_str} from {}",
        transport.local_addr()?
    );

    let mut session = Session::new(remote, transport.local_addr()?, repeater_id, config);
    session.register_rx(Box::new(|packet| {
        info!(
            "rx {:?} {}->{} ts={:?} stream=0x{:08x}",
            packet.data_type, packet.src_id, packet.dst_id, packet.timeslot, packet.meta.stream_id
        );
    }));

    dmr_homebrew_bridge::auth::authenticate(&mut session, &transport, &args.secret)
        .context("authenticating with master")?;
    info!("authenticated, starting protocol loop");

    let proto = Homebrew::new("homebrew", Arc::new(session), transport);
    dmr_homebrew_bridge::protocol::register(proto.clone());

    let stop_proto = proto.clone();
    ctrlc::set_handler(move || {
        info!("interrupt received, stopping");
        stop_proto.stop();
    })
    .context("installing Ctrl-C handler")?;

    proto.init()?;
    proto.clone().start()?;
    proto.wait();
    close(&proto);
    dmr_homebrew_bridge::protocol::unregister(proto.name());

    Ok(())
}
