use clap::*;
use gofm::libs::config::Config;
use gofm::libs::matrix::DistanceMatrix;
use gofm::libs::ontology::Aspect;
use gofm::libs::pool::Pool;
use gofm::libs::search::{default_chunk, run_grid, write_silhouettes, write_sizes, Grid};
use std::io::Write;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("search")
        .about("Grid search over (k, sigma)")
        .after_help(
            r###"
Runs `gofm cluster` for every (k, sigma) of a grid and records the mean
silhouette and the cluster sizes of each combination.

Grid:
* k: 15 values from 20 to 500, or `--ks`, or `search.ks` in the config
* sigma by aspect, or `--sigmas`, or `search.sigmas_{bp,mf,cc}`:
    bp 0.1 .. 1.0, cc 0.05 .. 0.5, mf 0.5 .. 5.0 (10 values each)

Output:
* <prefix>.silhouette.csv - `k,sigma,silhouette`
* <prefix>.sizes.csv      - `k,sigma,size_0,size_1,...`, ragged, no header

Notes:
* Combinations run in chunks of ceil(ln n) on the thread pool.
* Failed combinations (e.g. k larger than the number of genes) are skipped.

Examples:
1. Default grid:
   gofm search bp.gene.csv --aspect bp -p 8 -o bp

2. A small grid:
   gofm search bp.gene.csv --aspect bp --ks 20,40 --sigmas 0.2,0.4 -o test

"###,
        )
        .arg(
            Arg::new("infile")
                .required(true)
                .index(1)
                .help("Distances, i,j,distance"),
        )
        .arg(
            Arg::new("aspect")
                .long("aspect")
                .short('a')
                .required(true)
                .num_args(1)
                .help("Ontology aspect, selects the sigma range"),
        )
        .arg(
            Arg::new("ks")
                .long("ks")
                .value_delimiter(',')
                .value_parser(value_parser!(usize))
                .help("Comma separated k values"),
        )
        .arg(
            Arg::new("sigmas")
                .long("sigmas")
                .value_delimiter(',')
                .value_parser(value_parser!(f64))
                .help("Comma separated sigma values"),
        )
        .arg(
            Arg::new("chunk")
                .long("chunk")
                .value_parser(value_parser!(usize))
                .help("Combinations per chunk [default: ceil(ln n)]"),
        )
        .arg(super::cluster::fill_arg())
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_parser(value_parser!(u64))
                .default_value("42")
                .help("Random seed"),
        )
        .arg(
            Arg::new("parallel")
                .long("parallel")
                .short('p')
                .value_parser(value_parser!(usize))
                .num_args(1)
                .help("Number of threads [default: config or CPUs - 1]"),
        )
        .arg(
            Arg::new("outfile")
                .long("outfile")
                .short('o')
                .required(true)
                .num_args(1)
                .help("Output prefix"),
        )
}

// command implementation
pub fn execute(args: &ArgMatches, config: &Config) -> anyhow::Result<()> {
    //----------------------------
    // Args
    //----------------------------
    let infile = args.get_one::<String>("infile").unwrap();
    let aspect: Aspect = args.get_one::<String>("aspect").unwrap().parse()?;
    let seed = *args.get_one::<u64>("seed").unwrap();
    let threads = args
        .get_one::<usize>("parallel")
        .copied()
        .unwrap_or_else(|| config.threads());
    let prefix = args.get_one::<String>("outfile").unwrap();

    let mut grid = Grid::for_aspect(aspect, &config.search);
    if let Some(ks) = args.get_many::<usize>("ks") {
        grid.ks = ks.copied().collect();
    }
    if let Some(sigmas) = args.get_many::<f64>("sigmas") {
        grid.sigmas = sigmas.copied().collect();
    }

    //----------------------------
    // Operating
    //----------------------------
    let matrix = DistanceMatrix::from_file(infile, super::cluster::parse_fill(args)?)?;
    let chunk = args
        .get_one::<usize>("chunk")
        .copied()
        .or(config.search.chunk)
        .unwrap_or_else(|| default_chunk(matrix.size()));

    let pool = Pool::new(threads, chunk)?;
    let results = run_grid(&matrix, &grid, &config.cluster, &pool, seed)?;

    //----------------------------
    // Output
    //----------------------------
    let mut writer = gofm::writer(&format!("{}.silhouette.csv", prefix))?;
    write_silhouettes(&results, &mut writer)?;
    writer.flush()?;

    let mut writer = gofm::writer(&format!("{}.sizes.csv", prefix))?;
    write_sizes(&results, &mut writer)?;
    writer.flush()?;

    eprintln!(
        "{} of {} combinations clustered",
        results.len(),
        grid.points().len()
    );

    Ok(())
}
