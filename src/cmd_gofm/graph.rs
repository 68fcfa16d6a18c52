use clap::*;
use gofm::libs::annotation::GeneAnnotations;
use gofm::libs::config::Config;
use gofm::libs::ontology::{Aspect, Ontology};
use gofm::libs::term_graph::TermGraph;
use std::io::Write;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("graph")
        .about("Weighted term graph of one aspect")
        .after_help(
            r###"
Connects the GO terms of one aspect in an undirected weighted graph.

Edges:
* is_a pairs: |IC(parent) - IC(child)|, IC(t) = -ln(genes(t) / annotations)
* is_a pairs with an unannotated end: the largest IC weight
* terms sharing genes without an is_a edge: p5 / shared, where p5 is the
  5th percentile of the is_a weights

Notes:
* The graph is written with bincode; `--edges` also dumps term<TAB>term<TAB>weight.
* Fails when no edge can be built.

Examples:
1. Build the graph:
   gofm graph go-basic.obo bp.gene2go.bin --aspect bp -o bp.graph.bin

2. Inspect the edges:
   gofm graph go-basic.obo bp.gene2go.bin --aspect bp -o bp.graph.bin --edges stdout

"###,
        )
        .arg(
            Arg::new("obo")
                .required(true)
                .index(1)
                .help("Ontology in OBO format"),
        )
        .arg(
            Arg::new("mapping")
                .required(true)
                .index(2)
                .help("Mapping from `gofm annot`"),
        )
        .arg(
            Arg::new("aspect")
                .long("aspect")
                .short('a')
                .required(true)
                .num_args(1)
                .help("Ontology aspect"),
        )
        .arg(
            Arg::new("edges")
                .long("edges")
                .num_args(1)
                .help("Also write the edge list here. [stdout] for screen"),
        )
        .arg(
            Arg::new("outfile")
                .long("outfile")
                .short('o')
                .required(true)
                .num_args(1)
                .help("Output graph (bincode)"),
        )
}

// command implementation
pub fn execute(args: &ArgMatches, _config: &Config) -> anyhow::Result<()> {
    let obo = args.get_one::<String>("obo").unwrap();
    let mapping = args.get_one::<String>("mapping").unwrap();
    let aspect: Aspect = args.get_one::<String>("aspect").unwrap().parse()?;
    let outfile = args.get_one::<String>("outfile").unwrap();

    let ontology = Ontology::from_obo(obo)?;
    let mapping = GeneAnnotations::load(mapping)?;

    let graph = TermGraph::build(&ontology, &mapping, aspect)?;
    tracing::info!(
        "{}: {} terms, {} edges",
        aspect,
        graph.node_count(),
        graph.edge_count()
    );
    graph.save(outfile)?;

    if let Some(edges) = args.get_one::<String>("edges") {
        let mut writer = gofm::writer(edges)?;
        graph.write_edges(&mut writer)?;
        writer.flush()?;
    }

    Ok(())
}
