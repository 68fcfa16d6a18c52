use clap::*;
use gofm::libs::annotation::GeneAnnotations;
use gofm::libs::config::Config;
use gofm::libs::jobs::{write_scripts, Manifest};
use gofm::libs::term_graph::TermGraph;
use std::path::Path;

fn common_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("parts")
            .long("parts")
            .short('n')
            .value_parser(value_parser!(usize))
            .default_value("100")
            .help("Number of partitions"),
    )
    .arg(
        Arg::new("dir")
            .long("dir")
            .short('d')
            .num_args(1)
            .default_value("jobs")
            .help("Directory for scripts, partitions and the manifest"),
    )
    .arg(
        Arg::new("prelude")
            .long("prelude")
            .num_args(1)
            .help("File whose lines are put at the top of every script"),
    )
    .arg(
        Arg::new("bin")
            .long("bin")
            .num_args(1)
            .default_value("gofm")
            .help("How the scripts invoke gofm"),
    )
}

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("jobs")
        .about("Partition a distance run into batch scripts")
        .after_help(
            r###"
Splits all pairs into contiguous ranges and writes one shell script per range.

Layout of --dir:
* manifest.tsv        - `#entities=<n>\ttotal=<pairs>`, then first<TAB>last<TAB>path
* scripts/job.*.sh    - one per partition
* scripts/submit.list - the script paths, for the queue
* parts/*.csv         - written by the scripts

Run `gofm assemble <dir>/manifest.tsv --wait` once the jobs are submitted.

Examples:
1. Term distances in 200 jobs:
   gofm jobs term bp.graph.bin --parts 200 --dir bp.term

2. Gene distances with a module prelude:
   gofm jobs gene bp.gene2go.bin bp.term.csv --dir bp.gene --prelude env.sh

"###,
        )
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(common_args(
            Command::new("term").about("Term distance jobs").arg(
                Arg::new("graph")
                    .required(true)
                    .index(1)
                    .help("Term graph from `gofm graph`"),
            ),
        ))
        .subcommand(common_args(
            Command::new("gene")
                .about("Gene distance jobs")
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
                        .help("Assembled term distances"),
                ),
        ))
}

// command implementation
pub fn execute(args: &ArgMatches, config: &Config) -> anyhow::Result<()> {
    let (kind, sub) = match args.subcommand() {
        Some(("term", sub)) => ("term", sub),
        Some(("gene", sub)) => ("gene", sub),
        _ => unreachable!(),
    };

    //----------------------------
    // Args
    //----------------------------
    let parts = *sub.get_one::<usize>("parts").unwrap();
    let dir = Path::new(sub.get_one::<String>("dir").unwrap());
    let bin = sub.get_one::<String>("bin").unwrap();
    let prelude = match sub.get_one::<String>("prelude") {
        Some(file) => {
            gofm::libs::io::require_file(file)?;
            Some(std::fs::read_to_string(file)?)
        }
        None => None,
    };

    let mut base = bin.to_string();
    if let Some(cfg) = sub.get_one::<String>("config") {
        base.push_str(&format!(" --config {}", cfg));
    }

    //----------------------------
    // Operating
    //----------------------------
    let (entities, command) = if kind == "term" {
        let graph = sub.get_one::<String>("graph").unwrap();
        let n = TermGraph::load(graph)?.node_count();
        (n, format!("{} term-dist {}", base, graph))
    } else {
        let mapping = sub.get_one::<String>("mapping").unwrap();
        let terms = sub.get_one::<String>("terms").unwrap();
        let n = GeneAnnotations::load(mapping)?.gene2go().len();
        (n, format!("{} gene-dist {} {}", base, mapping, terms))
    };
    let command = format!("{} -p {}", command, config.threads());

    let manifest = Manifest::plan(entities, parts, &dir.join("parts"), kind);
    std::fs::create_dir_all(dir.join("parts"))?;
    write_scripts(&manifest, &dir.join("scripts"), &command, prelude.as_deref())?;

    let manifest_file = dir.join("manifest.tsv");
    manifest.save(&manifest_file.to_string_lossy())?;
    tracing::info!(
        "{} entities, {} pairs in {} partitions",
        manifest.entities,
        manifest.total,
        manifest.parts.len()
    );

    Ok(())
}
