use clap::*;
use gofm::libs::annotation::{read_annotations, EvidencePolicy, GeneAnnotations};
use gofm::libs::cache::{Cache, CacheKey};
use gofm::libs::config::Config;
use gofm::libs::ontology::{Aspect, Ontology};
use std::io::Write;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("annot")
        .about("Gene to GO term mapping for one aspect")
        .after_help(
            r###"
Builds the gene2go / go2gene mapping of one ontology aspect.

Input:
* An OBO ontology; only `is_a` parents are kept, obsolete terms are dropped.
* Annotations: GAF 2.x (`.gaf`, `.gaf.gz`) or `gene<TAB>term[<TAB>evidence]`.

Notes:
* Aspects: biological_process|bp|P, molecular_function|mf|F, cellular_component|cc|C
* Evidence: all, curated (no IEA), experimental, or a list such as IDA,IMP
* `NOT` annotations are skipped.
* The mapping is cached under `cache_dir` keyed by aspect, evidence and inputs.

Examples:
1. Biological process mapping from a GAF file:
   gofm annot go-basic.obo goa_human.gaf.gz --aspect bp -o bp.gene2go.bin

2. Experimental evidence only, listing the pairs:
   gofm annot go-basic.obo genes.tsv --aspect mf --evidence experimental --tsv mf.tsv

"###,
        )
        .arg(
            Arg::new("obo")
                .required(true)
                .index(1)
                .help("Ontology in OBO format"),
        )
        .arg(
            Arg::new("annotations")
                .required(true)
                .index(2)
                .help("Annotation file"),
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
            Arg::new("evidence")
                .long("evidence")
                .num_args(1)
                .help("Evidence policy [default: config or all]"),
        )
        .arg(
            Arg::new("no-cache")
                .long("no-cache")
                .action(ArgAction::SetTrue)
                .help("Always recompute"),
        )
        .arg(
            Arg::new("tsv")
                .long("tsv")
                .num_args(1)
                .help("Also write gene<TAB>term pairs to this file"),
        )
        .arg(
            Arg::new("outfile")
                .long("outfile")
                .short('o')
                .required(true)
                .num_args(1)
                .help("Output mapping (bincode)"),
        )
}

// command implementation
pub fn execute(args: &ArgMatches, config: &Config) -> anyhow::Result<()> {
    //----------------------------
    // Args
    //----------------------------
    let obo = args.get_one::<String>("obo").unwrap();
    let annotations = args.get_one::<String>("annotations").unwrap();
    let aspect: Aspect = args.get_one::<String>("aspect").unwrap().parse()?;
    let policy: EvidencePolicy = args
        .get_one::<String>("evidence")
        .unwrap_or(&config.annotation.evidence)
        .parse()?;
    let outfile = args.get_one::<String>("outfile").unwrap();

    let cache = if args.get_flag("no-cache") {
        Cache::disabled()
    } else {
        Cache::new(&config.cache_dir)
    };

    //----------------------------
    // Operating
    //----------------------------
    let key = CacheKey::new("gene2go")
        .param("aspect", aspect)
        .param("evidence", policy.key())
        .file(obo)?
        .file(annotations)?;

    let mapping = cache.get_or_compute(&key, || {
        let ontology = Ontology::from_obo(obo)?;
        let records = read_annotations(annotations)?;
        Ok(GeneAnnotations::from_annotations(
            &records, &ontology, aspect, &policy,
        ))
    })?;

    if mapping.is_empty() {
        tracing::warn!("no annotations left in {}", aspect);
    }
    tracing::info!(
        "{}: {} genes, {} terms, {} annotations",
        aspect,
        mapping.gene2go().len(),
        mapping.go2gene().len(),
        mapping.annotation_count()
    );

    //----------------------------
    // Output
    //----------------------------
    mapping.save(outfile)?;

    if let Some(tsv) = args.get_one::<String>("tsv") {
        let mut writer = gofm::writer(tsv)?;
        for (gene, terms) in mapping.gene2go() {
            for term in terms {
                writeln!(writer, "{}\t{}", gene, term)?;
            }
        }
        writer.flush()?;
    }

    Ok(())
}
