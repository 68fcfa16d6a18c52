use clap::*;
use gofm::libs::config::Config;
use gofm::libs::geneset::{read_transcript_map, GeneSets};
use gofm::libs::spectral::Clustering;
use std::io::Write;
use std::path::Path;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("geneset")
        .about("Gene sets from a labels file")
        .after_help(
            r###"
Turns the labels of `gofm cluster` into gene sets.

Output (GMT):
    cluster_<label>  k=<k>,sigma=<sigma>  gene1  gene2 ...

Notes:
* `--transcripts` maps entity IDs through transcript<TAB>gene lines;
  entities without a gene are dropped and counted.
* Sets smaller than `--min-size` are dropped.
* `--dir` also writes one cluster_<label>.txt per set.

Examples:
1. GMT to screen:
   gofm geneset bp.labels.csv

2. Gene-level sets of at least 5 genes, one file each:
   gofm geneset bp.labels.csv --transcripts tx2gene.tsv --min-size 5 --dir sets -o bp.gmt

"###,
        )
        .arg(
            Arg::new("labels")
                .required(true)
                .index(1)
                .help("Labels file from `gofm cluster`"),
        )
        .arg(
            Arg::new("transcripts")
                .long("transcripts")
                .num_args(1)
                .help("transcript<TAB>gene mapping"),
        )
        .arg(
            Arg::new("min-size")
                .long("min-size")
                .value_parser(value_parser!(usize))
                .default_value("1")
                .help("Drop smaller sets"),
        )
        .arg(
            Arg::new("dir")
                .long("dir")
                .num_args(1)
                .help("Also write one file per set into this directory"),
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
    let clustering = Clustering::load(args.get_one::<String>("labels").unwrap())?;
    let transcripts = match args.get_one::<String>("transcripts") {
        Some(file) => Some(read_transcript_map(file)?),
        None => None,
    };
    let min_size = *args.get_one::<usize>("min-size").unwrap();

    let sets = GeneSets::from_clustering(&clustering, transcripts.as_ref(), min_size);
    if sets.unmapped > 0 {
        eprintln!("{} entities without a gene were dropped", sets.unmapped);
    }

    let mut writer = gofm::writer(args.get_one::<String>("outfile").unwrap())?;
    sets.write_gmt(&mut writer)?;
    writer.flush()?;

    if let Some(dir) = args.get_one::<String>("dir") {
        sets.write_dir(Path::new(dir))?;
    }

    Ok(())
}
