use clap::*;
use gofm::libs::annotation::GeneAnnotations;
use gofm::libs::config::Config;
use gofm::libs::distance::compute_range;
use gofm::libs::gene_dist::{GeneDistances, TermDistanceTable};
use gofm::libs::pairs::PairRange;
use gofm::libs::pool::Pool;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("gene-dist")
        .about("Minimum-linkage distances between genes")
        .after_help(
            r###"
Gene distance d(A, B) = min d(ta, tb) over the terms ta of A and tb of B, ta != tb.

Notes:
* Term distances come from `gofm term-dist` (or `gofm assemble`).
* Genes are sorted; `--first` and `--last` select pairs as in `gofm term-dist`.
* Gene pairs without any finite term distance are not written.

Examples:
1. All gene pairs:
   gofm gene-dist bp.gene2go.bin bp.term.csv -o bp.gene.csv

2. One partition:
   gofm gene-dist bp.gene2go.bin bp.term.csv --first 0 --last 100000 -o part.csv

"###,
        )
        .arg(
            Arg::new("mapping")
                .required(true)
                .index(1)
                .help("Mapping from `gofm annot`"),
        )
        .arg(
            Arg::new("terms")
                .required(true)
                .index(2)
                .help("Term distances, i,j,distance"),
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
    let mapping = args.get_one::<String>("mapping").unwrap();
    let terms = args.get_one::<String>("terms").unwrap();
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
    let mapping = GeneAnnotations::load(mapping)?;
    let table = TermDistanceTable::from_file(terms)?;
    tracing::info!("{} term distances loaded", table.len());

    let engine = GeneDistances::new(&mapping, &table);
    let range = PairRange::checked(engine.entities().len(), first, last)?;

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
    tracing::info!("{} of {} gene pairs have a finite distance", written, range.len());

    Ok(())
}
