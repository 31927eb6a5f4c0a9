//! End-to-end run: scaffold sizes, alignment linking, pairing, graph building,
//! pruning and DOT output.

use anyhow::{bail, Context, Result};
use chrono::Local;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::config::LinkConfig;
use crate::graph::build_graph;
use crate::graphviz::write_dot_file;
use crate::input::read_file_of_filenames;
use crate::linker::{link_alignment_files, LinkerStats};
use crate::pairing::aggregate_pairs;
use crate::scaffold_sizes::ScaffoldSizeIndex;

/// Files a run reads and writes
#[derive(Debug, Clone)]
pub struct PipelineInputs {
    pub fasta: PathBuf,            // -f/--fasta
    pub alignments: Vec<PathBuf>,  // positional, plus -a/--fofn entries
    pub base_name: Option<String>, // -b/--base-name
}

impl PipelineInputs {
    /// Alignment files named directly, followed by those listed in a file of filenames
    pub fn new(fasta: PathBuf, alignments: Vec<PathBuf>, fofn: Option<&Path>) -> Result<Self> {
        let mut all = alignments;
        if let Some(fofn) = fofn {
            all.extend(read_file_of_filenames(fofn)?);
        }
        Ok(PipelineInputs {
            fasta,
            alignments: all,
            base_name: None,
        })
    }

    pub fn with_base_name(mut self, base_name: Option<String>) -> Self {
        self.base_name = base_name;
        self
    }

    /// Explicit base name, or one derived from the FASTA path and thresholds
    pub fn base_name(&self, config: &LinkConfig) -> String {
        match &self.base_name {
            Some(name) => name.clone(),
            None => default_base_name(&self.fasta, config),
        }
    }

    /// Open every input once so a missing file fails the run before any work
    fn check_readable(&self) -> Result<()> {
        if self.alignments.is_empty() {
            bail!("No alignment files given");
        }
        for path in std::iter::once(&self.fasta).chain(self.alignments.iter()) {
            File::open(path).with_context(|| format!("Could not open {}", path.display()))?;
        }
        Ok(())
    }
}

/// `<fasta>.scaff_s<seq-id>_c<min-reads>_l<min-links>_d<max-degree>_e<end-length>_r<error>`
pub fn default_base_name(fasta: &Path, config: &LinkConfig) -> String {
    format!(
        "{}.scaff_s{}_c{}_l{}_d{}_e{}_r{}",
        fasta.display(),
        config.min_identity,
        config.min_read_pairs,
        config.min_links,
        config.max_degree,
        config.end_length,
        config.max_error
    )
}

pub fn graph_output_path(base_name: &str) -> PathBuf {
    PathBuf::from(format!("{base_name}_original.gv"))
}

/// What a run saw and produced
#[derive(Debug, Clone)]
pub struct PipelineSummary {
    pub scaffolds: usize,
    pub linker: LinkerStats,
    pub barcodes: usize,
    pub scaffold_pairs: usize,
    pub nodes: usize,
    pub edges: usize,
    pub pruned_nodes: usize,
    pub output: PathBuf,
    pub elapsed: Duration,
}

fn stage(message: &str) {
    log::info!("=> {message}... {}", Local::now().format("%a %b %e %H:%M:%S %Y"));
}

fn log_parameters(inputs: &PipelineInputs, config: &LinkConfig, output: &Path) {
    log::info!("Running scaffold linking");
    log::info!("  -f {}", inputs.fasta.display());
    log::info!("  alignment files: {}", inputs.alignments.len());
    for path in &inputs.alignments {
        log::debug!("    {}", path.display());
    }
    log::info!("  -s {}", config.min_identity);
    log::info!("  -c {}", config.min_read_pairs);
    log::info!("  -l {}", config.min_links);
    log::info!("  -z {}", config.min_scaffold_length);
    log::info!("  -m {}", config.multiplicity);
    log::info!("  -d {}", config.max_degree);
    log::info!("  -e {}", config.end_length);
    log::info!("  -r {}", config.max_error);
    log::info!("  output {}", output.display());
}

/// Run every stage and write `<base>_original.gv`
pub fn run(inputs: &PipelineInputs, config: &LinkConfig) -> Result<PipelineSummary> {
    let start = Instant::now();
    config.validate()?;
    inputs.check_readable()?;

    let output = graph_output_path(&inputs.base_name(config));
    log_parameters(inputs, config, &output);

    stage("Getting scaffold sizes");
    let sizes = ScaffoldSizeIndex::from_path(&inputs.fasta)?;

    stage("Reading alignments");
    let (counts, linker) = link_alignment_files(&inputs.alignments, &sizes, config)?;
    log::info!(
        "Linked {} read pairs from {} records ({} barcodes)",
        linker.counted_pairs,
        linker.records,
        counts.index.len()
    );

    stage("Pairing scaffolds");
    let pairs = aggregate_pairs(&counts, config);
    log::info!("Found {} linked scaffold pairs", pairs.len());

    stage("Creating graph");
    let mut graph = build_graph(&pairs, config);
    let pruned_nodes = graph.prune_by_degree(config.max_degree);
    if config.max_degree > 0 {
        log::info!(
            "Removed {} nodes with degree above {}",
            pruned_nodes,
            config.max_degree
        );
    }

    stage("Writing graph");
    write_dot_file(&graph, &output)?;
    log::info!(
        "Wrote {} nodes and {} edges to {}",
        graph.node_count(),
        graph.edge_count(),
        output.display()
    );

    let summary = PipelineSummary {
        scaffolds: sizes.len(),
        linker,
        barcodes: counts.index.len(),
        scaffold_pairs: pairs.len(),
        nodes: graph.node_count(),
        edges: graph.edge_count(),
        pruned_nodes,
        output,
        elapsed: start.elapsed(),
    };
    stage("Done");
    Ok(summary)
}
