use clap::{Parser, Subcommand};
use logtime::{BuildOptions, Config};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "logtime")]
#[command(about = "Resolve which archived log files overlap a time interval")]
#[command(version)]
struct Cli {
    /// Path to the source configuration file
    #[arg(short, long, global = true, default_value = "sources.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print configured data source names, sorted
    List,

    /// Print known extractor names and descriptions
    Listx,

    /// Resolve files in one or more sources overlapping an interval
    Query {
        /// Data source names to query
        sources: Vec<String>,

        /// Start of the interval (any extractable token, or "@<epoch>")
        #[arg(long)]
        begin: Option<String>,

        /// End of the interval (any extractable token, or "@<epoch>")
        #[arg(long)]
        end: Option<String>,

        /// Use the persisted index instead of the fuzzy heuristic
        #[arg(long)]
        index: bool,

        /// Print "path\tbegin_epoch\tend_epoch" instead of bare paths
        #[arg(long)]
        times: bool,

        /// Print per-calendar-date aggregate byte totals instead of paths
        #[arg(long)]
        bytes: bool,
    },

    /// Build or extend the index for one or more sources
    Index {
        /// Data source names to index
        sources: Vec<String>,

        /// Start of the window to index (omit for full mode)
        #[arg(long)]
        begin: Option<String>,

        /// End of the window to index (omit for full mode)
        #[arg(long)]
        end: Option<String>,

        /// Worker pool size (default: host CPU count)
        #[arg(long)]
        processes: Option<usize>,

        /// Run IndexStore::clean() before indexing
        #[arg(long)]
        clean: bool,
    },
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::List => cmd_list(&cli.config),
        Commands::Listx => cmd_listx(),
        Commands::Query {
            sources,
            begin,
            end,
            index,
            times,
            bytes,
        } => cmd_query(&cli.config, sources, begin, end, index, times, bytes),
        Commands::Index {
            sources,
            begin,
            end,
            processes,
            clean,
        } => cmd_index(&cli.config, sources, begin, end, processes, clean),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn cmd_list(config_path: &PathBuf) -> logtime::Result<()> {
    let config = Config::load(config_path)?;
    for name in config.names() {
        println!("{name}");
    }
    Ok(())
}

fn cmd_listx() -> logtime::Result<()> {
    for (name, description) in logtime::extractors::descriptions() {
        println!("{name}\t{description}");
    }
    Ok(())
}

fn parse_bound(token: &Option<String>) -> logtime::Result<Option<logtime::Timestamp>> {
    match token {
        None => Ok(None),
        Some(s) => logtime::time_bound(s)
            .ok_or_else(|| logtime::Error::Configuration(format!("could not parse timestamp '{s}'"))),
    }
}

fn cmd_query(
    config_path: &PathBuf,
    source_names: Vec<String>,
    begin: Option<String>,
    end: Option<String>,
    use_index: bool,
    times: bool,
    bytes: bool,
) -> logtime::Result<()> {
    let config = Config::load(config_path)?;
    let begin = parse_bound(&begin)?;
    let end = parse_bound(&end)?;

    let mut intervals = Vec::new();
    for name in &source_names {
        let source = config.source(name).ok_or_else(|| {
            logtime::Error::Configuration(format!("unknown data source '{name}'"))
        })?;
        let found = if use_index {
            source.resolve_indexed(begin, end)?
        } else {
            source.resolve_fuzzy(begin, end)?
        };
        intervals.extend(found);
    }

    if bytes {
        print_bytes_per_date(&intervals, begin, end);
        return Ok(());
    }

    for interval in &intervals {
        if times {
            println!(
                "{}\t{}\t{}",
                interval.path.display(),
                logtime::to_epoch(interval.begin),
                logtime::to_epoch(interval.end)
            );
        } else {
            println!("{}", interval.path.display());
        }
    }

    Ok(())
}

/// Aggregate each interval's on-disk byte size onto the calendar date of
/// its begin timestamp, filling zero for any date in `[begin, end]` with
/// no contribution (spec.md §6 `query --bytes`).
fn print_bytes_per_date(
    intervals: &[logtime::FileInterval],
    begin: Option<logtime::Timestamp>,
    end: Option<logtime::Timestamp>,
) {
    let mut totals: BTreeMap<chrono::NaiveDate, u64> = BTreeMap::new();

    for interval in intervals {
        let size = std::fs::metadata(&interval.path).map(|m| m.len()).unwrap_or(0);
        let date = interval.begin.date_naive();
        *totals.entry(date).or_insert(0) += size;
    }

    if let (Some(begin), Some(end)) = (begin, end) {
        let mut date = begin.date_naive();
        let last = end.date_naive();
        while date <= last {
            totals.entry(date).or_insert(0);
            let Some(next) = date.succ_opt() else { break };
            date = next;
        }
    }

    for (date, bytes) in totals {
        println!("{date}\t{bytes}");
    }
}

fn cmd_index(
    config_path: &PathBuf,
    source_names: Vec<String>,
    begin: Option<String>,
    end: Option<String>,
    processes: Option<usize>,
    clean: bool,
) -> logtime::Result<()> {
    let config = Config::load(config_path)?;
    let begin = parse_bound(&begin)?;
    let end = parse_bound(&end)?;

    let mut options = BuildOptions::default();
    if let Some(workers) = processes {
        options.workers = workers;
    }
    options.clean = clean;

    for name in &source_names {
        let source = config.source(name).ok_or_else(|| {
            logtime::Error::Configuration(format!("unknown data source '{name}'"))
        })?;
        let committed = source.index(begin, end, &options)?;
        println!("{name}: indexed {committed} files");
    }

    Ok(())
}
