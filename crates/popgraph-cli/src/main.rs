use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use popgraph_lib::builder::{load_population, mark_reference_files, read_path_list, FileFormat};
use popgraph_lib::constants::DEFAULT_MAX_READ_LENGTH;
use popgraph_lib::serialization::GraphHeader;
use popgraph_lib::variant::write_variant;
use popgraph_lib::{
    detect_bubbles, traverse_supernodes, GraphBuilder, GraphConfig, Kmer, KmerBits, KmerStore,
};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "popgraph")]
#[command(version = "0.1.0")]
#[command(about = "Multi-colour de Bruijn graphs of DNA populations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum InputFormat {
    Fasta,
    Fastq,
    Binary,
}

impl From<InputFormat> for FileFormat {
    fn from(format: InputFormat) -> Self {
        match format {
            InputFormat::Fasta => FileFormat::Fasta,
            InputFormat::Fastq => FileFormat::Fastq,
            InputFormat::Binary => FileFormat::Binary,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build a graph from a population list
    Build {
        /// Population list: one per-person file list per line
        #[arg(short, long)]
        population: PathBuf,

        /// K-mer length
        #[arg(short, long)]
        k: usize,

        /// Number of colours (defaults to the number of people)
        #[arg(short, long)]
        colours: Option<usize>,

        /// Format of the files named in the person lists
        #[arg(short, long, value_enum, default_value = "fasta")]
        format: InputFormat,

        /// Output graph file
        #[arg(short, long)]
        output: PathBuf,

        /// Longest read accepted
        #[arg(long, default_value_t = DEFAULT_MAX_READ_LENGTH)]
        max_read_length: usize,

        /// Minimum Phred quality for FASTQ bases (0 = off)
        #[arg(short, long, default_value = "0")]
        quality_cutoff: u8,

        /// Break windows after this many copies of the same base
        #[arg(long)]
        homopolymer_cutoff: Option<usize>,

        /// Skip reads whose k-mers were already loaded into the same colour
        #[arg(long, default_value = "false")]
        remove_duplicates: bool,

        /// Also write colour C alone as a single-colour graph to this file
        #[arg(long, requires = "save_colour")]
        colour_output: Option<PathBuf>,

        /// Colour written by --colour-output
        #[arg(long)]
        save_colour: Option<usize>,
    },

    /// Print the supernodes of one colour as FASTA
    Supernodes {
        /// Graph file
        #[arg(short, long)]
        graph: PathBuf,

        /// Colour to walk
        #[arg(short, long, default_value = "0")]
        colour: usize,

        /// Output file (stdout if absent)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write the bubbles of one colour as a full flank file
    Variants {
        /// Graph file
        #[arg(short, long)]
        graph: PathBuf,

        /// Colour to search
        #[arg(short, long, default_value = "0")]
        colour: usize,

        /// Longest branch followed, in nodes
        #[arg(short, long, default_value = "100")]
        max_branch_length: usize,

        /// Output file (stdout if absent)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Count graph nodes found in reference FASTA files
    MarkReference {
        /// Graph file
        #[arg(short, long)]
        graph: PathBuf,

        /// Reference FASTA files, or one list file with --reference-list
        #[arg(short, long, num_args = 1.., required = true)]
        reference: Vec<PathBuf>,

        /// Treat --reference as a file listing reference paths
        #[arg(long, default_value = "false")]
        reference_list: bool,

        /// Longest reference record accepted
        #[arg(long, default_value_t = DEFAULT_MAX_READ_LENGTH)]
        max_read_length: usize,
    },

    /// Print node, coverage and supernode counts per colour
    Stats {
        /// Graph file
        #[arg(short, long)]
        graph: PathBuf,
    },
}

fn main() -> Result<()> {
    // Initialize tracing: use RUST_LOG if set, otherwise default to info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            population,
            k,
            colours,
            format,
            output,
            max_read_length,
            quality_cutoff,
            homopolymer_cutoff,
            remove_duplicates,
            colour_output,
            save_colour,
        } => {
            let num_colours = match colours {
                Some(n) => n,
                None => read_path_list(&population)?.len(),
            };
            let config = GraphConfig {
                k,
                num_colours,
                max_read_length,
                quality_cutoff,
                homopolymer_cutoff,
                remove_duplicates,
                ..GraphConfig::default()
            };
            config.validate()?;
            let single = match (colour_output, save_colour) {
                (Some(path), Some(colour)) => {
                    config.check_colour(colour)?;
                    Some((path, colour))
                }
                _ => None,
            };
            popgraph_lib::dispatch_on_k!(k, K => {
                build_command::<K>(&config, &population, format.into(), &output, single.as_ref())
            })
        }
        Commands::Supernodes {
            graph,
            colour,
            output,
        } => {
            let config = graph_config(&graph)?;
            config.check_colour(colour)?;
            popgraph_lib::dispatch_on_k!(config.k, K => {
                supernodes_command::<K>(&graph, &config, colour, output.as_deref())
            })
        }
        Commands::Variants {
            graph,
            colour,
            max_branch_length,
            output,
        } => {
            let config = graph_config(&graph)?;
            config.check_colour(colour)?;
            popgraph_lib::dispatch_on_k!(config.k, K => {
                variants_command::<K>(&graph, &config, colour, max_branch_length, output.as_deref())
            })
        }
        Commands::MarkReference {
            graph,
            reference,
            reference_list,
            max_read_length,
        } => {
            let config = graph_config(&graph)?;
            let references = if reference_list {
                let mut paths = Vec::new();
                for list in &reference {
                    paths.extend(read_path_list(list)?);
                }
                paths
            } else {
                reference
            };
            popgraph_lib::dispatch_on_k!(config.k, K => {
                mark_reference_command::<K>(&graph, &config, &references, max_read_length)
            })
        }
        Commands::Stats { graph } => {
            let config = graph_config(&graph)?;
            popgraph_lib::dispatch_on_k!(config.k, K => {
                stats_command::<K>(&graph, &config)
            })
        }
    }
}

/// Configuration matching a graph file's header
fn graph_config(path: &Path) -> Result<GraphConfig> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open graph file: {}", path.display()))?;
    let header = GraphHeader::read(&mut BufReader::new(file))
        .with_context(|| format!("Failed to read graph header: {}", path.display()))?;
    let config = GraphConfig::new(header.k as usize, header.num_colours as usize)
        .with_context(|| format!("Unsupported graph file: {}", path.display()))?;
    info!(
        "{}: k={}, {} colours, {} nodes",
        path.display(),
        header.k,
        header.num_colours,
        header.num_nodes
    );
    Ok(config)
}

fn load_graph<const K: usize>(path: &Path, config: &GraphConfig) -> Result<KmerStore<K>>
where
    Kmer<K>: KmerBits,
{
    let mut store = KmerStore::<K>::with_capacity(config.num_colours, config.expected_kmers);
    store
        .load_from_file(path)
        .with_context(|| format!("Failed to load graph file: {}", path.display()))?;
    Ok(store)
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(BufWriter::new(File::create(path).with_context(|| {
            format!("Failed to create output file: {}", path.display())
        })?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    })
}

fn build_command<const K: usize>(
    config: &GraphConfig,
    population: &Path,
    format: FileFormat,
    output: &Path,
    single: Option<&(PathBuf, usize)>,
) -> Result<()>
where
    Kmer<K>: KmerBits,
{
    info!("Building graph from {}", population.display());
    config.print();

    let mut store = KmerStore::<K>::with_capacity(config.num_colours, config.expected_kmers);
    let mut builder = GraphBuilder::new(&mut store, config)?;
    load_population(&mut builder, population, format)?;

    info!("Saving graph to {}", output.display());
    store
        .save_to_file(output)
        .with_context(|| format!("Failed to write graph file: {}", output.display()))?;

    if let Some((path, colour)) = single {
        info!("Saving colour {} to {}", colour, path.display());
        let mut writer = BufWriter::new(
            File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?,
        );
        store
            .save_colour(&mut writer, *colour)
            .with_context(|| format!("Failed to write graph file: {}", path.display()))?;
    }

    println!("nodes: {}", store.len());
    for colour in 0..store.num_colours() {
        println!("colour {}: {} nodes", colour, store.count_in_colour(colour));
    }
    Ok(())
}

fn supernodes_command<const K: usize>(
    graph: &Path,
    config: &GraphConfig,
    colour: usize,
    output: Option<&Path>,
) -> Result<()>
where
    Kmer<K>: KmerBits,
{
    let mut store = load_graph::<K>(graph, config)?;
    let mut out = open_output(output)?;

    let mut id = 0usize;
    let stats = traverse_supernodes(&mut store, colour, |store, supernode| {
        let seq = supernode.sequence(store);
        id += 1;
        writeln!(out, ">supernode_{} length={}", id, seq.len())?;
        writeln!(out, "{}", seq)
    })
    .context("Failed to write supernodes")?;
    out.flush()?;

    info!(
        "Colour {}: {} supernodes, {} nodes, {} cycles, longest {} nodes",
        colour, stats.supernodes, stats.nodes_visited, stats.cycles, stats.longest
    );
    Ok(())
}

fn variants_command<const K: usize>(
    graph: &Path,
    config: &GraphConfig,
    colour: usize,
    max_branch_length: usize,
    output: Option<&Path>,
) -> Result<()>
where
    Kmer<K>: KmerBits,
{
    let mut store = load_graph::<K>(graph, config)?;
    let mut out = open_output(output)?;

    let mut id = 0usize;
    let count = detect_bubbles(&mut store, colour, max_branch_length, |store, variant| {
        id += 1;
        write_variant(&mut out, store, variant, &format!("var_{}", id))
    })
    .context("Failed to write variants")?;
    out.flush()?;

    info!("Colour {}: {} variants", colour, count);
    Ok(())
}

fn mark_reference_command<const K: usize>(
    graph: &Path,
    config: &GraphConfig,
    references: &[PathBuf],
    max_read_length: usize,
) -> Result<()>
where
    Kmer<K>: KmerBits,
{
    let mut store = load_graph::<K>(graph, config)?;
    let stats = mark_reference_files(&mut store, references, max_read_length)?;

    println!("reference bases: {}", stats.bases_read);
    println!("reference k-mers: {}", stats.kmers_seen);
    println!("found in graph: {}", stats.kmers_marked);
    for colour in 0..store.num_colours() {
        let (total, in_reference) = store
            .handles()
            .filter(|&h| store.is_in_colour(h, colour))
            .fold((0usize, 0usize), |(total, hits), h| {
                (total + 1, hits + store.status(h).in_reference() as usize)
            });
        println!(
            "colour {}: {} of {} nodes in reference",
            colour, in_reference, total
        );
    }
    Ok(())
}

fn stats_command<const K: usize>(graph: &Path, config: &GraphConfig) -> Result<()>
where
    Kmer<K>: KmerBits,
{
    let mut store = load_graph::<K>(graph, config)?;

    let total: u64 = store.handles().map(|h| store.total_coverage(h)).sum();
    println!("k: {}", K);
    println!("nodes: {}", store.len());
    println!("coverage: {}", total);
    for colour in 0..store.num_colours() {
        let coverage: u64 = store
            .handles()
            .map(|h| store.coverage(h, colour) as u64)
            .sum();
        let stats = traverse_supernodes(&mut store, colour, |_, _| Ok::<(), io::Error>(()))?;
        store.reset_visited();
        println!(
            "colour {}: {} nodes, coverage {}, {} supernodes (longest {} nodes, {} cycles)",
            colour,
            store.count_in_colour(colour),
            coverage,
            stats.supernodes,
            stats.longest,
            stats.cycles
        );
    }
    Ok(())
}
