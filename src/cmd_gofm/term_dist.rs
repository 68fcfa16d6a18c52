use clap::*;
use gofm::libs::config::Config;
use gofm::libs::distance::compute_range;
use gofm::libs::pairs::PairRange;
use gofm::libs::pool::Pool;
use gofm::libs::term_dist::TermDistances;
use gofm::libs::term_graph::TermGraph;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("term-dist")
        .about("Shortest-path distances between terms")
        .after_help(
            r###"
Dijkstra distances between the terms of a graph from `gofm graph`.

Pairs:
* Terms are sorted; pair p of n terms is the p-th (i, j), i < j, in row-major order.
* There are n(n-1)/2 pairs. `--first` and `--last` select [first, last).
* Pairs without a path are not written.

Output:
    i,j,distance

Examples:
1. All pairs with 8 threads:
   gofm term-dist bp.graph.bin -p 8 -o bp.term.csv

2. One partition, as written by `gofm jobs`:
   gofm term-dist bp.graph.bin --first 0 --last 500000 -o part.0-500000.csv

"###,
        )
        .arg(
            Arg::new("graph")
                .required(true)
                .index(1)
                .help("Term graph from `gofm graph`"),
        )
        .arg(
            Arg::new("first")
                .long("first")
                .value_parser(value_parser!(usize))
                .default_value("0")
                .help("First pair index, inclusive"),
        )
        .arg(
            Arg::new("last")
                .long("last")
                .value_parser(value_parser!(usize))
                .help("Last pair index, exclusive [default: all pairs]"),
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
    let infile = args.get_one::<String>("graph").unwrap();
    let first = *args.get_one::<usize>("first").unwrap();
    let last = args.get_one::<usize>("last").copied();
    let threads = args
        .get_one::<usize>("parallel")
        .copied()
        .unwrap_or_else(|| config.threads());
    let outfile = args.get_one::<String>("outfile").unwrap();

    //----------------------------
    // Operating
    //----------------------------
    let graph = TermGraph::load(infile)?;
    let engine = TermDistances::new(&graph);
    let range = PairRange::checked(engine.entities().len(), first, last)?;
    tracing::info!(
        "{} terms, pairs {} of {}",
        engine.entities().len(),
        range,
        engine.total_pairs()
    );

    let pool = Pool::new(threads, threads * 4)?;
    let writer = gofm::writer(outfile)?;
    let written = compute_range(
        &pool,
        engine.entities(),
        range,
        config.distance.chunk,
        |r| Ok(engine.compute(r)),
        writer,
    )?;
    tracing::info!("{} of {} pairs have a finite distance", written, range.len());

    Ok(())
}
