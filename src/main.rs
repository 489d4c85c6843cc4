//! # Ecotype CLI
//!
//! Command-line front end for the tree handling, binning and curve
//! estimation parts of the ecotype analysis.
//!
//! ## Usage
//!
//! ```bash
//! # Reroot at the outgroup and write a canonically sorted tree
//! ecotype newick -t bacillus.nwk --outgroup B_halodurans --sort
//!
//! # Clustering curve from p-distances of an alignment
//! ecotype bins -a bacillus.fasta -o bins.tsv
//!
//! # Clustering curve from tree path lengths at custom cutoffs
//! ecotype bins -t bacillus.nwk --thresholds 0.2,0.1,0.05,0.01
//!
//! # Initial parameter guesses
//! ecotype estimate -a bacillus.fasta
//! ecotype estimate -t bacillus.nwk --length 1200
//!
//! # Leaves of the tree without a sequence in the alignment
//! ecotype recombinants -t bacillus.nwk -a bacillus.fasta
//! ```
//!
//! ## Common options
//!
//! - `-o, --output <FILE>`: Output file (default: stdout)
//! - `-q, --quiet`: Suppress progress messages

use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use ecotype::alignment::Alignment;
use ecotype::binning::{BinLevel, Binning, BinningConfig};
use ecotype::demarcation::find_recombinants;
use ecotype::divergence::{DivergenceMatrix, DivergenceSource, PatristicDivergence};
use ecotype::estimate::CurveEstimator;
use ecotype::model::Tree;
use ecotype::newick;
use std::fs::File;
use std::io::{self, BufWriter, Write};

/// Main entry point for the ecotype CLI application.
///
/// Dispatches to the subcommand; results go to `--output` or stdout,
/// progress messages to stderr.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = Command::new("ecotype")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Ecotype demarcation tools for bacterial phylogenies")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("newick")
                .about("Rewrite trees in normalised Newick format")
                .arg(tree_arg().required(true))
                .arg(
                    Arg::new("outgroup")
                        .long("outgroup")
                        .value_name("NAME")
                        .help("Reroot every tree at this leaf"),
                )
                .arg(
                    Arg::new("sort")
                        .long("sort")
                        .action(ArgAction::SetTrue)
                        .help("Sort children, deepest subtree first"),
                )
                .args(common_args()),
        )
        .subcommand(
            Command::new("bins")
                .about("Compute the clustering curve (threshold, number of bins)")
                .arg(tree_arg().required_unless_present("alignment"))
                .arg(alignment_arg().conflicts_with("tree"))
                .arg(thresholds_arg())
                .args(common_args()),
        )
        .subcommand(
            Command::new("estimate")
                .about("Estimate initial npop, omega and sigma from the clustering curve")
                .arg(tree_arg().required_unless_present("alignment"))
                .arg(alignment_arg().conflicts_with("tree"))
                .arg(
                    Arg::new("length")
                        .short('l')
                        .long("length")
                        .value_name("SITES")
                        .value_parser(value_parser!(usize))
                        .required_unless_present("alignment")
                        .help("Sequence length (required with --tree)"),
                )
                .arg(thresholds_arg())
                .args(common_args()),
        )
        .subcommand(
            Command::new("recombinants")
                .about("List tree leaves that have no sequence in the alignment")
                .arg(tree_arg().required(true))
                .arg(alignment_arg().required(true))
                .args(common_args()),
        )
        .get_matches();

    let (name, sub_matches) = matches
        .subcommand()
        .ok_or("No subcommand given")?;

    let mut writer: Box<dyn Write> = if let Some(output_file) = sub_matches.get_one::<String>("output")
    {
        Box::new(BufWriter::new(File::create(output_file)?))
    } else {
        Box::new(BufWriter::new(io::stdout()))
    };
    let quiet = sub_matches.get_flag("quiet");

    match name {
        "newick" => run_newick(sub_matches, &mut writer, quiet)?,
        "bins" => run_bins(sub_matches, &mut writer, quiet)?,
        "estimate" => run_estimate(sub_matches, &mut writer, quiet)?,
        "recombinants" => run_recombinants(sub_matches, &mut writer, quiet)?,
        _ => return Err(format!("Unknown subcommand '{name}'").into()),
    }

    writer.flush()?;
    Ok(())
}

// ============================================================================
// Arguments
// ============================================================================
fn tree_arg() -> Arg {
    Arg::new("tree")
        .short('t')
        .long("tree")
        .value_name("FILE")
        .help("Newick tree file")
}

fn alignment_arg() -> Arg {
    Arg::new("alignment")
        .short('a')
        .long("alignment")
        .value_name("FILE")
        .help("FASTA alignment file")
}

fn thresholds_arg() -> Arg {
    Arg::new("thresholds")
        .long("thresholds")
        .value_name("LIST")
        .value_delimiter(',')
        .value_parser(value_parser!(f64))
        .help("Comma-separated divergence cutoffs (default: 0.5 down to 0)")
}

fn common_args() -> [Arg; 2] {
    [
        Arg::new("output")
            .short('o')
            .long("output")
            .value_name("FILE")
            .help("Output file (default: stdout)"),
        Arg::new("quiet")
            .short('q')
            .long("quiet")
            .action(ArgAction::SetTrue)
            .help("Quiet mode"),
    ]
}

// ============================================================================
// Subcommands
// ============================================================================
fn run_newick(
    matches: &ArgMatches,
    writer: &mut dyn Write,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut trees = read_trees(matches)?;
    for tree in &mut trees {
        if let Some(outgroup) = matches.get_one::<String>("outgroup") {
            tree.reroot(outgroup)?;
        }
        if matches.get_flag("sort") {
            tree.sort_children();
        }
        writeln!(writer, "{}", tree.to_newick())?;
    }

    if !quiet {
        eprintln!("Wrote {} trees.", trees.len());
    }
    Ok(())
}

fn run_bins(
    matches: &ArgMatches,
    writer: &mut dyn Write,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = binning_config(matches);
    let (levels, num_sequences) = if let Some(path) = matches.get_one::<String>("alignment") {
        let alignment = Alignment::from_fasta_file(path)?;
        let matrix = DivergenceMatrix::from_alignment(&alignment.without_gap_columns());
        (bin(&matrix, alignment.identifiers(), config)?, alignment.len())
    } else {
        let tree = first_tree(matches)?;
        let leaves = tree.leaf_names();
        let levels = bin(PatristicDivergence::new(&tree), &leaves, config)?;
        (levels, leaves.len())
    };

    for level in &levels {
        writeln!(writer, "{}\t{}", level.threshold, level.cluster_count)?;
    }

    if !quiet {
        eprintln!(
            "Binned {} sequences at {} thresholds.",
            num_sequences,
            levels.len()
        );
    }
    Ok(())
}

fn run_estimate(
    matches: &ArgMatches,
    writer: &mut dyn Write,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = binning_config(matches);
    let (levels, sequence_length, num_sequences) =
        if let Some(path) = matches.get_one::<String>("alignment") {
            let alignment = Alignment::from_fasta_file(path)?;
            let matrix = DivergenceMatrix::from_alignment(&alignment.without_gap_columns());
            let levels = bin(&matrix, alignment.identifiers(), config)?;
            (levels, alignment.sequence_length(), alignment.len())
        } else {
            let tree = first_tree(matches)?;
            let leaves = tree.leaf_names();
            let length = *matches
                .get_one::<usize>("length")
                .ok_or("--length is required with --tree")?;
            let levels = bin(PatristicDivergence::new(&tree), &leaves, config)?;
            (levels, length, leaves.len())
        };

    let fit = CurveEstimator::new().estimate(&levels, sequence_length, num_sequences)?;
    let estimate = fit.estimate;
    writeln!(writer, "npop\t{}", estimate.npop)?;
    writeln!(writer, "omega\t{}", estimate.omega)?;
    writeln!(writer, "sigma\t{}", estimate.sigma)?;
    writeln!(writer, "sigma_line\t{}\t{}", fit.sigma_line.m, fit.sigma_line.b)?;
    writeln!(writer, "omega_line\t{}\t{}", fit.omega_line.m, fit.omega_line.b)?;

    if !quiet {
        eprintln!(
            "Fitted {} points of {} sequences ({} sites) in {} rounds.",
            fit.points.len(),
            num_sequences,
            sequence_length,
            fit.iterations
        );
    }
    Ok(())
}

fn run_recombinants(
    matches: &ArgMatches,
    writer: &mut dyn Write,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let tree = first_tree(matches)?;
    let path = matches
        .get_one::<String>("alignment")
        .ok_or("No alignment given")?;
    let alignment = Alignment::from_fasta_file(path)?;

    let recombinants = find_recombinants(&tree, alignment.identifiers());
    for name in &recombinants {
        writeln!(writer, "{name}")?;
    }

    if !quiet {
        eprintln!(
            "Found {} of {} leaves without a sequence.",
            recombinants.len(),
            tree.num_leaves()
        );
    }
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================
fn read_trees(matches: &ArgMatches) -> Result<Vec<Tree>, Box<dyn std::error::Error>> {
    let path = matches.get_one::<String>("tree").ok_or("No tree file given")?;
    Ok(newick::parse_file(path)?)
}

/// Only the first tree of a file is analysed.
fn first_tree(matches: &ArgMatches) -> Result<Tree, Box<dyn std::error::Error>> {
    read_trees(matches)?
        .into_iter()
        .next()
        .ok_or_else(|| "Tree file contains no tree".into())
}

fn binning_config(matches: &ArgMatches) -> BinningConfig {
    match matches.get_many::<f64>("thresholds") {
        Some(thresholds) => BinningConfig {
            thresholds: thresholds.copied().collect(),
        },
        None => BinningConfig::default(),
    }
}

fn bin<D: DivergenceSource>(
    source: D,
    leaves: &[String],
    config: BinningConfig,
) -> Result<Vec<BinLevel>, ecotype::EcotypeError> {
    Binning::new(source).with_config(config).compute_bin_levels(leaves)
}
