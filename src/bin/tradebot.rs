use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use tradebot::catalog::{Catalog, TradeItem};
use tradebot::clock::{Clock, QuantaClock};
use tradebot::config::BotConfig;
use tradebot::link::host::{pump_reports, serve, Arbiter, HidGadgetSink};
use tradebot::link::{Buttons, ControllerCommand, ControllerSink, DPad, LinkClient};
use tradebot::queue::SnapshotStore;
use tradebot::router::Router;
use tradebot::service::build_routers;

#[derive(Parser)]
#[command(name = "tradebot", version, about = "Trade bot tooling")]
struct Cli {
    /// JSON configuration file; defaults apply when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the controller inputs that select an item from the list root
    Route {
        name: String,
        /// Chip code, or part color with --part
        code: String,
        #[arg(long)]
        part: bool,
    },
    /// Load the catalogue and check every item is reachable
    Validate,
    /// Run the device endpoint against a HID gadget device
    Host {
        #[arg(long)]
        listen: Option<String>,
        #[arg(long)]
        device: Option<PathBuf>,
        /// CPU core to pin the process to
        #[arg(long)]
        core_id: Option<usize>,
    },
    /// Send inputs through a live link, e.g. `A L+R Down`
    Press {
        inputs: Vec<String>,
        #[arg(long)]
        connect: Option<String>,
        #[arg(long)]
        hold_ms: Option<u64>,
        /// Ask the endpoint to stop afterwards
        #[arg(long)]
        stop: bool,
    },
    /// Print a persisted queue snapshot
    Queue { path: Option<PathBuf> },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => BotConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => BotConfig::default(),
    };

    match cli.command {
        Commands::Route { name, code, part } => cmd_route(&config, &name, &code, part),
        Commands::Validate => cmd_validate(&config),
        Commands::Host {
            listen,
            device,
            core_id,
        } => cmd_host(&config, listen, device, core_id),
        Commands::Press {
            inputs,
            connect,
            hold_ms,
            stop,
        } => cmd_press(&config, &inputs, connect, hold_ms, stop),
        Commands::Queue { path } => cmd_queue(&config, path),
    }
}

fn load_catalog(config: &BotConfig) -> Result<Catalog> {
    let dir = &config.catalog.data_dir;
    Catalog::load(dir).with_context(|| format!("Failed to load catalogue from {}", dir.display()))
}

fn cmd_route(config: &BotConfig, name: &str, code: &str, part: bool) -> Result<()> {
    let catalog = load_catalog(config)?;
    let (item, router) = if part {
        let part = catalog
            .find_part(name, code)
            .ok_or_else(|| anyhow!("No part named {name} in {code}"))?;
        (TradeItem::Part(part.clone()), Router::for_parts(&catalog)?)
    } else {
        let chip = catalog
            .find_chip(name, code)
            .ok_or_else(|| anyhow!("No tradable chip {name} {code}"))?;
        (TradeItem::Chip(chip.clone()), Router::for_chips(&catalog)?)
    };

    let route = router.route(&item)?;
    println!("{item}: {} inputs", route.len());
    for (input, node) in route {
        match router.graph().node(node) {
            Some(node) => println!("  {input:<5} -> {}", node.item),
            None => println!("  {input}"),
        }
    }
    Ok(())
}

fn cmd_validate(config: &BotConfig) -> Result<()> {
    let catalog = load_catalog(config)?;
    let (chips, parts) = build_routers(&catalog)?;
    println!(
        "{} tradable chips, {} parts, {} common items",
        catalog.tradable_chips().len(),
        catalog.parts().len(),
        catalog.common_items().len()
    );
    println!(
        "chip graph: {} nodes over {} orderings; part graph: {} nodes",
        chips.graph().len(),
        chips.graph().roots().len(),
        parts.graph().len()
    );
    Ok(())
}

fn cmd_host(
    config: &BotConfig,
    listen: Option<String>,
    device: Option<PathBuf>,
    core_id: Option<usize>,
) -> Result<()> {
    if let Some(core_id) = core_id {
        let core_ids = core_affinity::get_core_ids().context("Failed to get core IDs")?;
        if core_id < core_ids.len() {
            info!("Pinning process to core {}", core_id);
            core_affinity::set_for_current(core_ids[core_id]);
        } else {
            bail!("Core ID {} out of range ({} cores available)", core_id, core_ids.len());
        }
    }

    let listen = listen.unwrap_or_else(|| config.link.listen_addr.clone());
    let device = device.unwrap_or_else(|| config.link.device_path.clone());
    let mut sink = HidGadgetSink::open(&device)
        .with_context(|| format!("Failed to open {}", device.display()))?;
    let listener =
        TcpListener::bind(&listen).with_context(|| format!("Failed to listen on {listen}"))?;

    let arbiter = Arc::new(Arbiter::new());
    let interval = config.link.report_interval();
    let pump_arbiter = Arc::clone(&arbiter);
    let pump = thread::Builder::new()
        .name("report-pump".to_string())
        .spawn(move || pump_reports(&pump_arbiter, &mut sink, &QuantaClock::new(), interval))
        .context("Failed to spawn report pump")?;

    let served = serve(listener, Arc::clone(&arbiter));
    arbiter.stop();
    pump.join()
        .map_err(|_| anyhow!("report pump panicked"))?
        .context("Report pump failed")?;
    served?;
    Ok(())
}

fn parse_input(token: &str) -> Result<ControllerCommand> {
    let mut command = ControllerCommand::neutral();
    for part in token.split('+') {
        if let Some(buttons) = Buttons::from_name(part) {
            command = command.press(buttons);
        } else if let Some(dpad) = DPad::from_name(part) {
            command = command.dpad(dpad);
        } else {
            bail!("Unknown input {part:?}");
        }
    }
    Ok(command)
}

fn cmd_press(
    config: &BotConfig,
    inputs: &[String],
    connect: Option<String>,
    hold_ms: Option<u64>,
    stop: bool,
) -> Result<()> {
    let commands = inputs
        .iter()
        .map(|token| parse_input(token))
        .collect::<Result<Vec<_>>>()?;
    let hold = Duration::from_millis(hold_ms.unwrap_or(config.script.hold_ms));
    let addr = connect.unwrap_or_else(|| config.link.connect_addr.clone());
    let mut client =
        LinkClient::connect_tcp(addr.as_str()).with_context(|| format!("Failed to connect to {addr}"))?;

    let clock = QuantaClock::new();
    for command in commands {
        client.send(&command.hold(hold))?;
        client.send(&ControllerCommand::neutral().hold(hold))?;
        clock.sleep(hold * 2);
        info!("sent {}", command.buttons);
    }
    if stop {
        client.stop()?;
    }
    Ok(())
}

fn cmd_queue(config: &BotConfig, path: Option<PathBuf>) -> Result<()> {
    let path = path.unwrap_or_else(|| config.queue.snapshot_path.clone());
    let store = SnapshotStore::new(&path);
    let Some(snapshot) = store.load()? else {
        println!("No queue snapshot at {}", path.display());
        return Ok(());
    };
    println!(
        "{} requests saved at {}",
        snapshot.requests.len(),
        snapshot.saved_at
    );
    for request in &snapshot.requests {
        println!(
            "#{} {} ({}) - {}",
            request.seq,
            request.context.user_name,
            request.context.user,
            request.item
        );
    }
    Ok(())
}
