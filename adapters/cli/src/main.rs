#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs a headless park with scripting enabled,
//! either alone or as a server with loopback clients.

mod map_transfer;

use std::{cell::Cell, fs, path::PathBuf, process::ExitCode, rc::Rc};

use anyhow::{Context, Result};
use clap::Parser;
use parkscript_core::{ActionArgs, ParkMessageType, PluginType};
use parkscript_host::{HostConfig, PluginMain, ScriptContext, ScriptHost, Session};
use parkscript_system_actions::builtin::SMALL_SCENERY_PLACE;
use parkscript_system_dispatcher::loopback;
use parkscript_system_plugins::{PluginMetadata, Registration};
use parkscript_world::DEFAULT_LAND_HEIGHT;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use map_transfer::MapSnapshot;

/// Runs a park for a number of ticks.
#[derive(Debug, Parser)]
#[command(name = "parkscript", version)]
struct Args {
    /// Host settings in TOML.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Group given to joining players, overriding the config file.
    #[arg(long)]
    default_group: Option<u8>,
    /// Plugin storage file, overriding the config file.
    #[arg(long)]
    storage: Option<PathBuf>,
    /// Ticks to simulate.
    #[arg(long, default_value_t = 2_000)]
    ticks: u64,
    /// Loopback clients to connect; zero runs single-player.
    #[arg(long, default_value_t = 0)]
    clients: u8,
    /// Map string to load before the first tick.
    #[arg(long)]
    import_map: Option<PathBuf>,
    /// Print the final map as a single-line string.
    #[arg(long)]
    export_map: bool,
}

fn main() -> ExitCode {
    init_tracing();
    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = ?err, "parkscript failed");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .init();
}

fn run(args: Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => HostConfig::load(path)?,
        None => HostConfig::default(),
    };
    if let Some(group) = args.default_group {
        config.default_group = group;
    }
    if let Some(path) = &args.storage {
        config.storage_path = Some(path.clone());
    }
    let map = args
        .import_map
        .as_ref()
        .map(|path| {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("failed to read map string at {}", path.display()))?;
            MapSnapshot::decode(&contents)
                .with_context(|| format!("invalid map string at {}", path.display()))
        })
        .transpose()?;

    let session = if args.clients == 0 {
        Session::SinglePlayer
    } else {
        Session::Server
    };
    let server = ScriptHost::new(config.clone(), session)?;
    let _ = server.load_plugin(ledger_plugin)?;

    let mut clients = Vec::with_capacity(usize::from(args.clients));
    for index in 0..args.clients {
        let (client_end, server_end) = loopback();
        server.accept(server_end)?;
        let client = ScriptHost::new(
            HostConfig {
                player_name: format!("guest{}", index + 1),
                storage_path: None,
                ..config.clone()
            },
            Session::Client(client_end),
        )?;
        let _ = client.load_plugin(ledger_plugin)?;
        clients.push(client);
    }

    if let Some(map) = &map {
        for host in std::iter::once(&server).chain(&clients) {
            map.restore(&mut host.shared().world.borrow_mut())?;
        }
        info!(width = map.width, height = map.height, "map imported");
    }

    info!(ticks = args.ticks, clients = args.clients, "simulation started");
    for tick in 0..args.ticks {
        let _ = server.tick();
        for (index, client) in clients.iter().enumerate() {
            let _ = client.tick();
            if tick == 1 {
                place_bench(&client.context(), index);
            }
        }
    }

    let expected = MapSnapshot::capture(&server.shared().world.borrow());
    for (index, client) in clients.iter().enumerate() {
        if MapSnapshot::capture(&client.shared().world.borrow()) != expected {
            warn!(client = index + 1, "client map diverged from the server");
        }
    }

    server.save_storage()?;
    if args.export_map {
        let snapshot = MapSnapshot::capture(&server.shared().world.borrow());
        println!("{}", snapshot.encode()?);
    }
    Ok(())
}

/// Plugin that tallies actions per day and reports them in the park news.
fn ledger_plugin(registration: &mut Registration<PluginMain>) -> Result<()> {
    let metadata = PluginMetadata::new("ledger", "1.0", "parkscript", PluginType::Remote);
    registration.register(metadata, Box::new(start_ledger))?;
    Ok(())
}

fn start_ledger(context: &ScriptContext) -> Result<()> {
    let actions = Rc::new(Cell::new(0_u32));

    let counted = actions.clone();
    let _ = context.subscribe("network.action", move |_| {
        counted.set(counted.get() + 1);
        Ok(())
    })?;

    let reporter = context.clone();
    let _ = context.subscribe("interval.day", move |_| {
        let date = reporter.date()?;
        let today = actions.replace(0);
        let storage = reporter.local_storage()?;
        let total = storage.get_or("actions", 0).as_int().unwrap_or(0) + i64::from(today);
        storage.set("actions", total);
        reporter.post_message(
            ParkMessageType::Money,
            format!("Day {}: {today} actions ({total} total)", date.days_elapsed()),
            None,
        )?;
        info!(target: "ledger", day = date.days_elapsed(), today, total, "daily ledger");
        Ok(())
    })?;
    Ok(())
}

fn place_bench(context: &ScriptContext, index: usize) {
    let x = 2 + i32::try_from(index).unwrap_or(i32::MAX - 2);
    let args = ActionArgs::new()
        .with("x", x)
        .with("y", 2)
        .with("z", i32::from(DEFAULT_LAND_HEIGHT))
        .with("object", 1);
    let requested = context.execute_action(SMALL_SCENERY_PLACE, args, move |result| {
        if result.is_success() {
            info!(x, cost = result.cost, "bench placed");
        } else {
            warn!(
                x,
                error = %result.error,
                message = result.error_message.as_deref().unwrap_or_default(),
                "bench refused"
            );
        }
    });
    if let Err(err) = requested {
        warn!(%err, "bench request rejected");
    }
}
