use clap::*;
use gofm::libs::config::{Config, Normalization};
use gofm::libs::matrix::{DistanceMatrix, Fill};
use gofm::libs::spectral::{fit, Bandwidth, SpectralParams};
use rand::SeedableRng;
use std::io::Write;

pub fn fill_arg() -> Arg {
    Arg::new("fill")
        .long("fill")
        .num_args(1)
        .default_value("max")
        .help("Distance for pairs without a record: `max` or a number")
}

pub fn parse_fill(args: &ArgMatches) -> anyhow::Result<Fill> {
    let fill = args.get_one::<String>("fill").unwrap();
    Ok(match fill.as_str() {
        "max" => Fill::Max,
        v => Fill::Value(
            v.parse()
                .map_err(|_| anyhow::anyhow!("--fill expects `max` or a number, got {}", v))?,
        ),
    })
}

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("cluster")
        .about("Spectral clustering at one (k, sigma)")
        .after_help(
            r###"
Spectral clustering of a gene distance file.

Steps:
* affinity A = exp(-d^2 / (2 sigma^2)), or with `--sk` the self-tuning
  A = exp(-d^2 / (sigma_i sigma_j)), sigma_i = distance to the sk-th neighbour
* L = D^-1/2 A D^-1/2
* embed into k eigenvectors, normalized per column (default) or per row
* k-means, `repeats` times; the run with the best mean silhouette is kept

Output:
    k=<k>,sigma=<sigma>
    gene,label
    <gene>,<label>

Examples:
1. Fixed bandwidth:
   gofm cluster bp.gene.csv -k 120 --sigma 0.4 -o bp.labels.csv

2. Self-tuning with the 7th neighbour and row normalization:
   gofm cluster bp.gene.csv -k 120 --sk 7 --normalization row -o bp.labels.csv

"###,
        )
        .arg(
            Arg::new("infile")
                .required(true)
                .index(1)
                .help("Distances, i,j,distance"),
        )
        .arg(
            Arg::new("k")
                .short('k')
                .required(true)
                .value_parser(value_parser!(usize))
                .help("Number of clusters"),
        )
        .arg(
            Arg::new("sigma")
                .long("sigma")
                .value_parser(value_parser!(f64))
                .help("Kernel bandwidth"),
        )
        .arg(
            Arg::new("sk")
                .long("sk")
                .value_parser(value_parser!(usize))
                .help("Neighbour rank for self-tuning bandwidths"),
        )
        .group(
            ArgGroup::new("bandwidth")
                .args(["sigma", "sk"])
                .required(true),
        )
        .arg(
            Arg::new("repeats")
                .long("repeats")
                .value_parser(value_parser!(usize))
                .help("k-means restarts [default: config or 10]"),
        )
        .arg(
            Arg::new("normalization")
                .long("normalization")
                .value_parser(["column", "row"])
                .help("Embedding normalization [default: config or column]"),
        )
        .arg(fill_arg())
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_parser(value_parser!(u64))
                .default_value("42")
                .help("Random seed"),
        )
        .arg(
            Arg::new("outfile")
                .long("outfile")
                .short('o')
                .num_args(1)
                .default_value("stdout")
                .help("Output filename. [stdout] for screen"),
        )
}

// command implementation
pub fn execute(args: &ArgMatches, config: &Config) -> anyhow::Result<()> {
    //----------------------------
    // Args
    //----------------------------
    let infile = args.get_one::<String>("infile").unwrap();
    let k = *args.get_one::<usize>("k").unwrap();
    let bandwidth = match args.get_one::<usize>("sk") {
        Some(&sk) => Bandwidth::SelfTuning(sk),
        None => Bandwidth::Fixed(*args.get_one::<f64>("sigma").unwrap()),
    };
    let seed = *args.get_one::<u64>("seed").unwrap();
    let outfile = args.get_one::<String>("outfile").unwrap();

    let mut params = SpectralParams::new(k, bandwidth, &config.cluster);
    if let Some(&repeats) = args.get_one::<usize>("repeats") {
        params.repeats = repeats;
    }
    if let Some(n) = args.get_one::<String>("normalization") {
        params.normalization = if n == "row" {
            Normalization::Row
        } else {
            Normalization::Column
        };
    }

    //----------------------------
    // Operating
    //----------------------------
    let matrix = DistanceMatrix::from_file(infile, parse_fill(args)?)?;
    tracing::info!("{} entities", matrix.size());

    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let clustering = fit(&matrix, &params, &mut rng)?;
    if let Some(s) = clustering.silhouette {
        tracing::info!("k={} silhouette {:.4}", k, s);
    }

    //----------------------------
    // Output
    //----------------------------
    let mut writer = gofm::writer(outfile)?;
    clustering.save(&mut writer)?;
    writer.flush()?;

    Ok(())
}
