use clap::{Parser, Subcommand, ValueEnum};
use pcb_common::db::parser::kicad;
use pcb_common::rules::{DesignRules, ManufacturerProfile, create_net_class_map};
use pcb_common::util::check::{ViolationKind, run_drc};
use pcb_common::util::config::Config;
use pcb_common::util::{generator, logger, visualization};
use pcb_router::{Autorouter, RouterOptions, Strategy};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(author, version, about = "Grid autorouter for KiCad boards", long_about = None)]
struct Args {
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum BoardKind {
    Charlieplex,
    FinePitch,
    Random,
}

#[derive(Subcommand)]
enum Commands {
    /// Route a board. Exits 0 when every net routed, 2 when some did not.
    Route {
        /// Board to route; defaults to `input.board` from the config.
        board: Option<String>,
        #[arg(short, long)]
        output: Option<String>,
        /// basic, negotiated or monte_carlo.
        #[arg(short, long)]
        strategy: Option<String>,
        /// Fab profile used for relaxation tiers.
        #[arg(short, long)]
        manufacturer: Option<String>,
        #[arg(long)]
        grid: Option<f64>,
        #[arg(long)]
        trace_width: Option<f64>,
        #[arg(long)]
        clearance: Option<f64>,
        /// Nets left for planes, comma separated.
        #[arg(long, value_delimiter = ',')]
        skip_nets: Vec<String>,
        #[arg(long)]
        iterations: Option<usize>,
        #[arg(long)]
        trials: Option<usize>,
        /// Wall-clock limit in seconds; the best result so far is kept.
        #[arg(long)]
        timeout: Option<f64>,
        /// Retry unrouted nets over this many relaxation tiers.
        #[arg(long)]
        relax: Option<usize>,
        #[arg(long)]
        high_performance: bool,
        /// Render the routed board to this PNG.
        #[arg(long)]
        png: Option<String>,
    },
    /// Design-rule check. Exits 0 when clean, 1 on violations.
    Check {
        board: String,
        #[arg(long)]
        clearance: Option<f64>,
    },
    /// Write a synthetic test board.
    Generate {
        #[arg(value_enum, default_value_t = BoardKind::Random)]
        kind: BoardKind,
        #[arg(long, default_value_t = 20)]
        nets: usize,
        #[arg(long, default_value_t = 50.0)]
        width: f64,
        #[arg(long, default_value_t = 40.0)]
        height: f64,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        #[arg(long, default_value = "inputs/random.kicad_pcb")]
        output: String,
    },
}

fn load_config(path: &Path) -> anyhow::Result<Config> {
    if path.exists() {
        log::info!("Loading configuration from {:?}", path);
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;
        toml::from_str(&text).map_err(|e| anyhow::anyhow!("Failed to parse config TOML: {}", e))
    } else {
        log::warn!("Configuration file {:?} not found. Using internal defaults.", path);
        Ok(Config::default())
    }
}

fn prepare_output_dir(path_str: &str) -> anyhow::Result<()> {
    if let Some(parent) = Path::new(path_str).parent()
        && !parent.exists()
        && !parent.as_os_str().is_empty()
    {
        log::info!("Creating output directory: {:?}", parent);
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn default_output(board: &str) -> String {
    let path = Path::new(board);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("board");
    path.with_file_name(format!("{}_routed.kicad_pcb", stem))
        .to_string_lossy()
        .into_owned()
}

fn main() -> ExitCode {
    logger::init();
    match run() {
        Ok(code) => code,
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    let mut config = load_config(&args.config)?;

    match args.command {
        Commands::Route {
            board,
            output,
            strategy,
            manufacturer,
            grid,
            trace_width,
            clearance,
            skip_nets,
            iterations,
            trials,
            timeout,
            relax,
            high_performance,
            png,
        } => {
            let board = board.unwrap_or_else(|| config.input.board.clone());
            if board.is_empty() || !Path::new(&board).exists() {
                return Err(anyhow::anyhow!("Input board missing: '{}'", board));
            }
            let output = output
                .or_else(|| (!config.input.output.is_empty()).then(|| config.input.output.clone()))
                .unwrap_or_else(|| default_output(&board));

            if let Some(s) = strategy {
                config.routing.strategy = s;
            }
            if let Some(g) = grid {
                config.rules.grid_resolution = g;
            }
            if let Some(w) = trace_width {
                config.rules.trace_width = w;
            }
            if let Some(c) = clearance {
                config.rules.clearance = c;
            }
            if !skip_nets.is_empty() {
                config.input.skip_nets = skip_nets;
            }
            if let Some(n) = iterations {
                config.negotiated.max_iterations = n;
            }
            if let Some(n) = trials {
                config.monte_carlo.num_trials = n;
            }
            if let Some(t) = timeout {
                config.routing.timeout_secs = t;
            }
            if manufacturer.is_some() {
                config.input.manufacturer = manufacturer;
            }
            if relax.is_some() {
                config.input.relaxation_tiers = relax;
            }
            config.routing.high_performance |= high_performance;

            route_board(&config, &board, &output, png.as_deref())
        }
        Commands::Check { board, clearance } => {
            let db = kicad::load(&board).map_err(|e| anyhow::anyhow!("Invalid board '{}': {}", board, e))?;
            let rules = DesignRules {
                clearance: clearance.unwrap_or(config.rules.clearance),
                ..config.rules.clone()
            };
            let classes = create_net_class_map(
                &config.input.power_nets,
                &config.input.high_speed_nets,
                &config.input.clock_nets,
            );
            let report = run_drc(&db, |net| {
                let data = db.net(net);
                let name = data.map_or("", |n| n.name.as_str());
                classes.resolve(&rules, name, data.and_then(|n| n.class.as_deref())).clearance
            });
            for v in &report.violations {
                log::warn!(
                    "{:?} between {} and {} at ({:.3}, {:.3}): gap {:.3}mm < {:.3}mm",
                    v.kind,
                    db.net_name(v.nets.0),
                    db.net_name(v.nets.1),
                    v.location.x,
                    v.location.y,
                    v.gap,
                    v.required
                );
            }
            log::info!(
                "DRC: {} clearance, {} short, {} board edge, {} missing via",
                report.count(ViolationKind::Clearance),
                report.count(ViolationKind::Short),
                report.count(ViolationKind::BoardEdge),
                report.count(ViolationKind::MissingVia)
            );
            Ok(if report.is_clean() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            })
        }
        Commands::Generate {
            kind,
            nets,
            width,
            height,
            seed,
            output,
        } => {
            prepare_output_dir(&output)?;
            let db = match kind {
                BoardKind::Charlieplex => generator::charlieplex_board(),
                BoardKind::FinePitch => generator::fine_pitch_board(),
                BoardKind::Random => generator::random_board(nets, width, height, seed),
            };
            generator::write_to_file(&db, &output)?;
            log::info!("Generated: {}", output);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn route_board(config: &Config, board: &str, output: &str, png: Option<&str>) -> anyhow::Result<ExitCode> {
    let options = RouterOptions::from_config(config);
    let strategy: Strategy = options.strategy()?;
    let profile = config
        .input
        .manufacturer
        .as_deref()
        .map(ManufacturerProfile::lookup)
        .transpose()?;
    if let Some(p) = &profile
        && (config.rules.clearance < p.min_clearance || config.rules.trace_width < p.min_trace_width)
    {
        log::warn!(
            "Requested rules are finer than {} can build ({}mm trace, {}mm clearance)",
            p.name,
            p.min_trace_width,
            p.min_clearance
        );
    }

    let db = kicad::load(board).map_err(|e| anyhow::anyhow!("Invalid board '{}': {}", board, e))?;
    let mut router = Autorouter::new(db, config.rules.clone(), options)?;
    if let Some(p) = &profile {
        router.route_with_relaxation(&strategy, p, config.input.relaxation_tiers.unwrap_or(3))?;
    } else {
        router.route_with(&strategy)?;
    }
    let stats = router.get_statistics();

    let report = router.check();
    if !report.is_clean() {
        log::warn!(
            "Routed board has {} DRC violations ({} missing vias)",
            report.violations.len(),
            report.count(ViolationKind::MissingVia)
        );
    }

    prepare_output_dir(output)?;
    router.write_output(board, output)?;
    if let Some(file) = png {
        prepare_output_dir(file)?;
        log::info!("Generating routed visualization...");
        visualization::draw_board(&router.routed_board(), file, 2000)?;
    }

    log::info!("{}", stats);
    Ok(if stats.all_routed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}
