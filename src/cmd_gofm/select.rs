use clap::*;
use gofm::libs::config::Config;
use gofm::libs::search::{read_results, select};
use std::io::Write;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("select")
        .about("Rank search results")
        .after_help(
            r###"
Ranks the combinations of `gofm search`.

Score:
* fraction = share of genes in clusters with size_min <= size <= size_max
* score = fraction + mean silhouette

Output, tab separated:
    metric  rank  k  sigma  silhouette  fraction  score

`combined` rows list the best `--top` by score; `silhouette` and `fraction`
rows list the best three by each metric alone.

Examples:
1. Default size window 10..300:
   gofm select bp.silhouette.csv bp.sizes.csv

2. Smaller modules:
   gofm select bp.silhouette.csv bp.sizes.csv --size-min 5 --size-max 50 --top 10

"###,
        )
        .arg(
            Arg::new("silhouette")
                .required(true)
                .index(1)
                .help("k,sigma,silhouette file"),
        )
        .arg(
            Arg::new("sizes")
                .required(true)
                .index(2)
                .help("Cluster sizes file"),
        )
        .arg(
            Arg::new("size-min")
                .long("size-min")
                .value_parser(value_parser!(usize))
                .help("Smallest acceptable cluster [default: config or 10]"),
        )
        .arg(
            Arg::new("size-max")
                .long("size-max")
                .value_parser(value_parser!(usize))
                .help("Largest acceptable cluster [default: config or 300]"),
        )
        .arg(
            Arg::new("top")
                .long("top")
                .value_parser(value_parser!(usize))
                .help("Combined ranks to report [default: config or 5]"),
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
    let silhouette = args.get_one::<String>("silhouette").unwrap();
    let sizes = args.get_one::<String>("sizes").unwrap();
    let size_min = args
        .get_one::<usize>("size-min")
        .copied()
        .unwrap_or(config.search.size_min);
    let size_max = args
        .get_one::<usize>("size-max")
        .copied()
        .unwrap_or(config.search.size_max);
    let top = args
        .get_one::<usize>("top")
        .copied()
        .unwrap_or(config.search.top);
    if size_min > size_max {
        return Err(anyhow::anyhow!(
            "--size-min {} exceeds --size-max {}",
            size_min,
            size_max
        ));
    }

    let results = read_results(silhouette, sizes)?;
    let selection = select(&results, size_min, size_max, top);
    if selection.best().is_none() {
        tracing::warn!("no combination with a finite silhouette");
    }

    let mut writer = gofm::writer(args.get_one::<String>("outfile").unwrap())?;
    selection.write(&mut writer)?;
    writer.flush()?;

    Ok(())
}
