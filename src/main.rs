use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use csim::{Cache, CacheConfig, CacheStats, TraceFile};
use log::info;

/// Replays a memory trace against a set-associative LRU cache.
#[derive(Parser, Debug)]
#[command(version)]
struct Options {
    /// Print the outcome of every access.
    #[arg(short = 'v')]
    verbose: bool,

    /// Number of set index bits (2^s sets).
    #[arg(short = 's', value_name = "s", value_parser = clap::value_parser!(u32).range(1..))]
    set_index_bits: u32,

    /// Number of lines per set.
    #[arg(short = 'E', value_name = "E", value_parser = clap::value_parser!(u64).range(1..))]
    lines_per_set: u64,

    /// Number of block offset bits (2^b byte blocks).
    #[arg(short = 'b', value_name = "b", value_parser = clap::value_parser!(u32).range(1..))]
    block_offset_bits: u32,

    /// Trace file to replay.
    #[arg(short = 't', value_name = "tracefile")]
    trace: PathBuf,

    /// Also write "hits misses evictions" to this file.
    #[arg(long, value_name = "PATH")]
    results: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let options = Options::parse();

    let lines_per_set = usize::try_from(options.lines_per_set)
        .context("number of lines per set does not fit in memory")?;
    let config = CacheConfig::new(
        options.set_index_bits,
        lines_per_set,
        options.block_offset_bits,
    )
    .context("Invalid cache geometry")?;
    let trace = TraceFile::load(&options.trace)?;

    let stats = simulate(config, &trace, options.verbose);
    info!(
        "{}: {} accesses, hit rate {:.2}%",
        trace.name,
        trace.entries.len(),
        stats.hit_rate() * 100.0
    );
    println!("{stats}");

    if let Some(path) = &options.results {
        fs::write(
            path,
            format!("{} {} {}\n", stats.hits, stats.misses, stats.evictions),
        )
        .with_context(|| format!("Unable to write results to {}", path.display()))?;
    }
    Ok(())
}

fn simulate(config: CacheConfig, trace: &TraceFile, verbose: bool) -> CacheStats {
    let mut cache = Cache::new(config);
    if verbose {
        cache.replay(&trace.entries, |access, outcome| {
            println!("{access} {outcome}");
        })
    } else {
        cache.run_trace(&trace.entries)
    }
}
