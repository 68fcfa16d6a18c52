use clap::*;
use gofm::libs::config::Config;
use gofm::libs::jobs::{assemble, wait_for, Manifest};
use std::time::Duration;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("assemble")
        .about("Concatenate partition files")
        .after_help(
            r###"
Concatenates the partitions listed in a manifest into one `i,j,distance` file.

Notes:
* Partitions are read in range order; output order does not depend on job order.
* A partition counts as finished once its `<path>.done` marker exists;
  the job scripts touch it after the distance command succeeds.
* A missing, unfinished or malformed partition is an error.
* The count of recovered vs expected distances is printed to stderr;
  pairs without a finite distance are not an error.
* `--wait` polls for missing partitions every `--interval` seconds,
  at most `--polls` times.

Examples:
1. Assemble finished jobs:
   gofm assemble bp.term/manifest.tsv -o bp.term.csv

2. Wait up to an hour for the queue:
   gofm assemble bp.term/manifest.tsv --wait --interval 60 --polls 60 -o bp.term.csv

"###,
        )
        .arg(
            Arg::new("manifest")
                .required(true)
                .index(1)
                .help("Manifest from `gofm jobs`"),
        )
        .arg(
            Arg::new("wait")
                .long("wait")
                .action(ArgAction::SetTrue)
                .help("Poll until all partitions exist"),
        )
        .arg(
            Arg::new("interval")
                .long("interval")
                .value_parser(value_parser!(u64))
                .default_value("30")
                .help("Seconds between polls"),
        )
        .arg(
            Arg::new("polls")
                .long("polls")
                .value_parser(value_parser!(usize))
                .default_value("120")
                .help("Maximum number of polls"),
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
pub fn execute(args: &ArgMatches, _config: &Config) -> anyhow::Result<()> {
    let manifest = Manifest::read(args.get_one::<String>("manifest").unwrap())?;
    let outfile = args.get_one::<String>("outfile").unwrap();

    if args.get_flag("wait") {
        let interval = Duration::from_secs(*args.get_one::<u64>("interval").unwrap());
        let polls = *args.get_one::<usize>("polls").unwrap();
        wait_for(&manifest, interval, polls)?;
    }

    let report = assemble(&manifest, gofm::writer(outfile)?)?;
    eprintln!(
        "Recovered {} of {} distances from {} partitions",
        report.recovered, report.expected, report.parts
    );

    Ok(())
}
