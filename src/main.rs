use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use scaflink::config::{LinkConfig, MultiplicityRange};
use scaflink::pipeline::{self, PipelineInputs};

/// scaflink - Scaffold adjacency graphs from barcoded linked-read alignments
///
/// Reads name-sorted paired alignments whose read names end in `_<barcode>`,
/// finds scaffold ends that consistently share barcodes, and writes the
/// resulting scaffold graph in Graphviz DOT format.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Sequences to scaffold (FASTA or FASTQ, optionally gzip/BGZF compressed)
    #[clap(short = 'f', long = "fasta")]
    fasta: PathBuf,

    /// Alignment files (SAM, BAM or CRAM), sorted by read name
    #[clap(value_name = "ALIGNMENTS", required_unless_present = "fofn")]
    alignments: Vec<PathBuf>,

    /// File listing alignment files, one per line
    #[clap(short = 'a', long = "fofn")]
    fofn: Option<PathBuf>,

    /// Minimum percent sequence identity of each mate
    #[clap(short = 's', long = "seq-id", default_value = "98")]
    seq_id: u32,

    /// Minimum read pairs per barcode before a head/tail call
    #[clap(short = 'c', long = "min-reads", default_value = "5")]
    min_reads: u32,

    /// Minimum number of links to create an edge
    #[clap(short = 'l', long = "min-links", default_value = "0")]
    min_links: u32,

    /// Minimum scaffold length to consider
    #[clap(short = 'z', long = "min-size", default_value = "500")]
    min_size: u64,

    /// Barcode multiplicity range "min-max"; barcodes outside it are ignored
    #[clap(short = 'm', long = "index-multiplicity", default_value = "50-10000")]
    index_multiplicity: MultiplicityRange,

    /// Remove nodes with more edges than this before writing (0 = keep all)
    #[clap(short = 'd', long = "max-degree", default_value = "0")]
    max_degree: usize,

    /// Length of each scaffold end region in bp (0 = half the scaffold)
    #[clap(short = 'e', long = "end-length", default_value = "0")]
    end_length: u64,

    /// Maximum error probability for head/tail calls and edge orientation
    #[clap(short = 'r', long = "error-percent", default_value = "0.05")]
    error_percent: f64,

    /// Output base name; the graph is written to <base>_original.gv
    #[clap(short = 'b', long = "base-name")]
    base_name: Option<String>,

    /// Increase log detail (-v debug, -vv trace)
    #[clap(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (warnings and errors only)
    #[clap(long = "quiet", conflicts_with = "verbose")]
    quiet: bool,

    /// Number of threads for parallel processing (default: all cores)
    #[clap(short = 't', long = "threads")]
    threads: Option<usize>,
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        log::LevelFilter::Warn
    } else {
        match verbose {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    };

    // RUST_LOG, when set, overrides the command-line level
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp_secs()
        .format_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    let threads = args.threads.unwrap_or_else(num_cpus::get).max(1);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()?;
    log::debug!("Using {threads} threads");

    let config = LinkConfig {
        min_identity: args.seq_id,
        min_read_pairs: args.min_reads,
        min_links: args.min_links,
        min_scaffold_length: args.min_size,
        multiplicity: args.index_multiplicity,
        max_degree: args.max_degree,
        end_length: args.end_length,
        max_error: args.error_percent,
    };

    let inputs = PipelineInputs::new(args.fasta, args.alignments, args.fofn.as_deref())?
        .with_base_name(args.base_name);

    let summary = pipeline::run(&inputs, &config)?;
    log::info!(
        "Graph has {} nodes and {} edges ({:.1}s)",
        summary.nodes,
        summary.edges,
        summary.elapsed.as_secs_f64()
    );

    Ok(())
}
