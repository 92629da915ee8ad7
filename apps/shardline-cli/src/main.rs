use anyhow::Context;
use clap::{Parser, Subcommand};
use shardline_common::{Action, EntityKey, ItemId, Point, RegionId};
use shardline_kernel::{CharacterData, Entity, GameState, NpcData, SpawnAreaData, WorldConfig, entity::SLOT_WEAPON};
use shardline_tools::WorldInspector;
use shardline_zone::RegionSpec;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "shardline-cli", about = "CLI tool for shardline world servers")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and crate info
    Info,
    /// Run the demo world and report outbound traffic per tick
    Simulate {
        /// Number of ticks to run
        #[arg(short, long, default_value = "20")]
        ticks: u64,
        /// World configuration (YAML); the built-in demo world otherwise
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Override the configured RNG seed
        #[arg(short, long)]
        seed: Option<u64>,
    },
    /// Summarize the demo world after a few ticks
    Inspect {
        #[arg(short, long, default_value = "5")]
        ticks: u64,
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

fn demo_config() -> WorldConfig {
    WorldConfig {
        regions: vec![
            RegionSpec { id: 1, name: "town".into(), width: 64, height: 64, capacity: 200, active: true },
            RegionSpec { id: 2, name: "caves".into(), width: 64, height: 64, capacity: 200, active: false },
        ],
        items: vec![shardline_kernel::ItemClassSpec { id: 501, sprite: 12 }],
        ..WorldConfig::default()
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<WorldConfig> {
    match path {
        Some(path) => WorldConfig::load(path).with_context(|| format!("loading {}", path.display())),
        None => Ok(demo_config()),
    }
}

struct Demo {
    world: GameState,
    players: Vec<EntityKey>,
}

/// Populates the first active region with a few players, a shopkeeper, a
/// dropped item and a wolf spawner.
fn build_demo(config: WorldConfig) -> anyhow::Result<Demo> {
    let mut world = GameState::in_memory(config)?;
    let home = world
        .regions()
        .find(|r| r.is_active())
        .map(|r| r.id())
        .context("configuration has no active region")?;

    let mut players = Vec::new();
    for (i, name) in ["ada", "bo", "cy"].into_iter().enumerate() {
        let mut data = CharacterData::new(i as u32 + 1, name);
        data.hair_style = i as u8;
        let key = world.create(Entity::character(home, Point::new(200 + 60 * i as i32, 200), data));
        world.insert(key)?;
        players.push(key);
    }
    if let Some(e) = world.entity_mut(players[0]) {
        e.equip(SLOT_WEAPON, Some(ItemId(501)));
        e.set_destination(Point::new(900, 200));
    }

    let npc = world.create(Entity::npc(home, Point::new(260, 260), NpcData { npc_id: 110, name: "keeper".into() }));
    world.insert(npc)?;
    let item = world.create(Entity::item(home, Point::new(230, 230), ItemId(501), 1));
    world.insert(item)?;
    let wolves = SpawnAreaData::new(3, "wolf", (Point::new(300, 300), Point::new(700, 700)), 4, 5);
    let area = world.create(Entity::spawn_area(home, wolves));
    world.insert(area)?;
    Ok(Demo { world, players })
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("shardline-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", shardline_common::crate_info());
            println!("proto: {}", shardline_proto::crate_info());
            println!("zone: {}", shardline_zone::crate_info());
            println!("persist: {}", shardline_persist::crate_info());
            println!("kernel: {}", shardline_kernel::crate_info());
            println!("tools: {}", shardline_tools::crate_info());
        }
        Commands::Simulate { ticks, config, seed } => {
            let mut config = load_config(config.as_ref())?;
            if let Some(seed) = seed {
                config.seed = seed;
            }
            let remote = config.regions.iter().find(|r| !r.active).map(|r| RegionId(r.id));
            let Demo { mut world, players } = build_demo(config)?;
            println!("Simulating {ticks} ticks, seed={}", world.config().seed);

            for tick in 0..ticks {
                match tick {
                    3 => {
                        if let Some(e) = world.entity_mut(players[1]) {
                            e.set_action(Action::Sit);
                        }
                        world.say_around(players[1], "anyone selling arrows?");
                    }
                    8 => {
                        if let Some(region) = remote {
                            world.enqueue_warp(players[2], region, Point::new(100, 100));
                        }
                    }
                    _ => {}
                }
                world.update();
                let sent = world.handler().total();
                world.handler_mut().clear();
                println!("tick {:>4}: {sent:>3} messages, {} pending", world.tick(), world.pending_events());
            }
            println!("{}", WorldInspector::summary(&world));
            println!("redirects: {:?}", world.account().redirects());
        }
        Commands::Inspect { ticks, config, json } => {
            let Demo { mut world, .. } = build_demo(load_config(config.as_ref())?)?;
            for _ in 0..ticks {
                world.update();
            }
            let summary = WorldInspector::summary(&world);
            let regions: Vec<RegionId> = summary.regions.iter().map(|r| r.id).collect();
            if json {
                let entities: Vec<_> = regions.iter().flat_map(|&r| WorldInspector::list_region(&world, r)).collect();
                let out = serde_json::json!({ "summary": summary, "entities": entities });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!("{summary}");
                for region in regions {
                    for info in WorldInspector::list_region(&world, region) {
                        println!("  {info}");
                    }
                }
            }
        }
    }

    Ok(())
}
