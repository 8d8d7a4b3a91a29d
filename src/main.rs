use env_logger::{Builder, Env};
use log::info;
use pskip::{DominanceIndex, Error, Point, SkipList, SkipListConfig};

/// Print a usage message
fn print_usage() {
    println!("pskip - Persistent Skip List");
    println!("Usage:");
    println!("  pskip [OPTIONS] COMMAND [ARGS]");
    println!();
    println!("Options:");
    println!("  --seed N          Seed for tower heights (default: system entropy)");
    println!("  --max-height N    Cap on tower height (default: 32)");
    println!("  --help            Show this help message");
    println!();
    println!("Commands:");
    println!("  demo                        Build two versions and print both");
    println!("  ne X Y [x,y ...]            List points north-east of (X, Y)");
    println!("  version                     Show version information");
    println!();
    println!("Set RUST_LOG=debug to see engine logging.");
}

/// Parse command line arguments
fn parse_args() -> Result<(SkipListConfig, String, Vec<String>), String> {
    let mut args = std::env::args().skip(1).collect::<Vec<_>>();

    if args.is_empty() || args.iter().any(|arg| arg == "--help") {
        print_usage();
        std::process::exit(0);
    }

    let mut config = SkipListConfig::default();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--seed" => {
                if i + 1 < args.len() {
                    let seed = args[i + 1]
                        .parse::<u64>()
                        .map_err(|_| "Invalid seed".to_string())?;
                    config = config.with_seed(seed);
                    args.drain(i..i + 2);
                } else {
                    return Err("Missing value for --seed".to_string());
                }
            }
            "--max-height" => {
                if i + 1 < args.len() {
                    let height = args[i + 1]
                        .parse::<usize>()
                        .map_err(|_| "Invalid max height".to_string())?;
                    config = config.with_max_height(height);
                    args.drain(i..i + 2);
                } else {
                    return Err("Missing value for --max-height".to_string());
                }
            }
            _ => {
                i += 1;
            }
        }
    }

    if args.is_empty() {
        return Err("Missing command".to_string());
    }

    let command = args.remove(0);
    Ok((config, command, args))
}

fn print_version(list: &SkipList<i64>, t: u64) {
    match list.draw(t) {
        Some(drawing) => print!("{}", drawing),
        None => println!("version {} is empty", t),
    }
}

/// Handle demo command
fn handle_demo(config: SkipListConfig, _args: &[String]) -> Result<(), Error> {
    let mut list = SkipList::with_config(config)?;

    for v in [42, 8, 69, 25] {
        let t = list.insert(v)?;
        println!("inserted {} at version {}", v, t);
    }
    list.advance_time();
    for v in [53, 17] {
        let t = list.insert(v)?;
        println!("inserted {} at version {}", v, t);
    }
    println!();

    for t in 0..=list.present() {
        print_version(&list, t);
        let values: Vec<_> = list.iter_at(t).collect();
        println!("  contents: {:?}", values);
        println!();
    }

    match list.insert(42) {
        Err(err) => println!("re-inserting 42: {}", err),
        Ok(t) => println!("re-inserting 42 unexpectedly succeeded at version {}", t),
    }

    let stats = list.stats();
    println!(
        "{} version(s), {} value(s), {} live node(s), {} live cell(s)",
        stats.versions, stats.linked, stats.live_nodes, stats.live_cells
    );
    list.validate()
}

fn parse_point(arg: &str) -> Result<Point<i64>, Error> {
    let invalid = || Error::ConfigError(format!("Invalid point '{}', expected x,y", arg));
    let (x, y) = arg.split_once(',').ok_or_else(invalid)?;
    let x = x.trim().parse::<i64>().map_err(|_| invalid())?;
    let y = y.trim().parse::<i64>().map_err(|_| invalid())?;
    Ok(Point::new(x, y))
}

/// Handle ne command
fn handle_north_east(config: SkipListConfig, args: &[String]) -> Result<(), Error> {
    if args.len() < 2 {
        return Err(Error::ConfigError("Missing query coordinates".to_string()));
    }

    let qx = args[0]
        .parse::<i64>()
        .map_err(|_| Error::ConfigError("Invalid query x".to_string()))?;
    let qy = args[1]
        .parse::<i64>()
        .map_err(|_| Error::ConfigError("Invalid query y".to_string()))?;

    let points = args[2..]
        .iter()
        .map(|arg| parse_point(arg))
        .collect::<Result<Vec<_>, _>>()?;
    info!("indexing {} point(s)", points.len());

    let index = DominanceIndex::build_with_config(points, config)?;
    let found = index.north_east(qx, qy);
    for point in &found {
        println!("({}, {})", point.x, point.y);
    }
    println!("Total: {} of {} points", found.len(), index.len());

    Ok(())
}

/// Handle version command
fn handle_version(_config: SkipListConfig, _args: &[String]) -> Result<(), Error> {
    println!("pskip v{}", env!("CARGO_PKG_VERSION"));
    println!("Persistent Skip List");

    Ok(())
}

fn init_logger() {
    Builder::from_env(Env::default().default_filter_or("warn"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    init_logger();

    let (config, command, args) = match parse_args() {
        Ok(result) => result,
        Err(err) => {
            eprintln!("Error: {}", err);
            print_usage();
            std::process::exit(1);
        }
    };

    if let Err(err) = config.validate() {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }

    let result = match command.as_str() {
        "demo" => handle_demo(config, &args),
        "ne" => handle_north_east(config, &args),
        "version" => handle_version(config, &args),
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            std::process::exit(1);
        }
    };

    if let Err(err) = result {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}
