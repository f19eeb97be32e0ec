use log::info;
use stablegrid_runner::{PaperConfig, PaperSession};
use stablegrid_strategy::{GridConfig, Scenario, project};

fn print_help() {
    eprintln!(
        r#"grid-sim - Stablegrid scenario projections and paper trading

USAGE:
    grid-sim [COMMAND] [OPTIONS]

COMMANDS:
    project             Print grid projections for the reference scenarios (default)
    paper               Run a paper-trading session against the simulated exchange

PAPER OPTIONS:
    --steps <N>         Price steps to simulate (default: 2000)
    --seed <N>          Seed for the price walk (default: random)
    --help              Print this help message

ENVIRONMENT VARIABLES:
    GRID_LOWER_BOUND, GRID_UPPER_BOUND, GRID_MAX_LEVELS, GRID_USDC_UTILIZATION,
    GRID_MIN_ORDER_SIZE, GRID_REFRESH_SECONDS, GRID_COMPOUND_THRESHOLD,
    GRID_PRICE_DECIMALS, GRID_SIZE_DECIMALS, GRID_ROUND_TRIP_FEE_RATE
    RUST_LOG            Log level filter

EXAMPLES:
    # Projections for a narrower range
    GRID_UPPER_BOUND=1.05 grid-sim project

    # Reproducible paper session
    grid-sim paper --steps 5000 --seed 42
"#
    );
}

fn print_projections(config: &GridConfig) {
    println!(
        "Grid {} - {}, up to {} levels, min order ${}, {}% of USDC deployed",
        config.lower_bound,
        config.upper_bound,
        config.max_levels,
        config.min_order_size,
        config.usdc_utilization * rust_decimal_macros::dec!(100)
    );
    println!();

    for scenario in Scenario::reference_set() {
        println!("{}", scenario.name);
        match project(config, &scenario) {
            Ok(p) => {
                println!("  Deployable capital: ${:.2}", p.deployable);
                println!(
                    "  Levels: {} ({} buys / {} sells)",
                    p.levels, p.buy_levels, p.sell_levels
                );
                println!("  Step spread: {:.4}%", p.step_spread_pct);
                println!("  Order size: {:.2}", p.order_size);
                println!("  Profit per round trip: ${:.4}", p.profit_per_round_trip);
                println!(
                    "  Status: {}",
                    if p.is_ready() { "ready" } else { "too few levels" }
                );
            }
            Err(e) => println!("  Not viable: {}", e),
        }
        println!();
    }
}

fn parse_value<T: std::str::FromStr>(args: &[String], i: usize, flag: &str) -> T {
    match args.get(i).and_then(|raw| raw.parse().ok()) {
        Some(value) => value,
        None => {
            eprintln!("Error: {} requires a numeric argument", flag);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let config = GridConfig::from_env()?;

    let mut command = "project";
    let mut paper = PaperConfig {
        grid: config.clone(),
        ..Default::default()
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "project" => command = "project",
            "paper" => command = "paper",
            "--steps" => {
                i += 1;
                paper.steps = parse_value(&args, i, "--steps");
            }
            "--seed" => {
                i += 1;
                paper.seed = Some(parse_value(&args, i, "--seed"));
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    match command {
        "paper" => {
            info!("Starting paper session ({} steps)", paper.steps);
            let results = PaperSession::new(paper).run().await?;
            println!("Paper session");
            println!("  Steps: {}", results.steps);
            println!("  Fills: {}", results.fills);
            println!("  Round trips: {}", results.status.round_trips);
            println!("  Realized profit: ${:.4}", results.status.total_realized);
            println!("  Compounding events: {}", results.status.compound_count);
            println!("  Final price: {}", results.final_price);
            println!(
                "  Value: ${:.2} -> ${:.2} (hold ${:.2}, edge ${:.2})",
                results.start_value,
                results.end_value,
                results.hold_value,
                results.edge_over_hold()
            );
            if !results.status.stuck_levels.is_empty() {
                println!("  Stuck levels: {:?}", results.status.stuck_levels);
            }
        }
        _ => print_projections(&config),
    }

    Ok(())
}
