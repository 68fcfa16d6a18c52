extern crate clap;
use clap::*;
use tracing_subscriber::EnvFilter;

mod cmd_gofm;

fn main() -> anyhow::Result<()> {
    // GOFM_LOG takes a tracing filter, e.g. `info` or `gofm::libs::jobs=debug`
    let log_level = std::env::var("GOFM_LOG").unwrap_or_else(|_| "warn".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&log_level))
        .with_writer(std::io::stderr)
        .init();

    let app = Command::new("gofm")
        .version(crate_version!())
        .author(crate_authors!())
        .about("`gofm` - GO Functional Modules")
        .propagate_version(true)
        .arg_required_else_help(true)
        .color(ColorChoice::Auto)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .num_args(1)
                .help("TOML file with run-wide settings"),
        )
        .subcommand(cmd_gofm::annot::make_subcommand())
        .subcommand(cmd_gofm::graph::make_subcommand())
        .subcommand(cmd_gofm::term_dist::make_subcommand())
        .subcommand(cmd_gofm::gene_dist::make_subcommand())
        .subcommand(cmd_gofm::jobs::make_subcommand())
        .subcommand(cmd_gofm::assemble::make_subcommand())
        .subcommand(cmd_gofm::cluster::make_subcommand())
        .subcommand(cmd_gofm::search::make_subcommand())
        .subcommand(cmd_gofm::select::make_subcommand())
        .subcommand(cmd_gofm::geneset::make_subcommand())
        .after_help(
            r###"Subcommand groups:

* Annotations:
    * annot - Gene to GO term mapping for one aspect
    * graph - Weighted term graph

* Distances:
    * term-dist - Shortest-path distances between terms
    * gene-dist - Minimum-linkage distances between genes
    * jobs      - Partition a distance run into batch scripts
    * assemble  - Concatenate partition files

* Clustering:
    * cluster - Spectral clustering at one (k, sigma)
    * search  - Grid search over (k, sigma)
    * select  - Rank search results
    * geneset - Gene sets from a labels file

Settings:
* `--config file.toml` applies to every subcommand; explicit options win.
* Logging goes to stderr; set GOFM_LOG=info (or debug) for progress.

"###,
        );

    let matches = app.get_matches();
    let Some((name, sub_matches)) = matches.subcommand() else {
        unreachable!()
    };
    let config = gofm::libs::config::Config::load(
        sub_matches.get_one::<String>("config").map(|s| s.as_str()),
    )?;

    match name {
        "annot" => cmd_gofm::annot::execute(sub_matches, &config),
        "graph" => cmd_gofm::graph::execute(sub_matches, &config),
        "term-dist" => cmd_gofm::term_dist::execute(sub_matches, &config),
        "gene-dist" => cmd_gofm::gene_dist::execute(sub_matches, &config),
        "jobs" => cmd_gofm::jobs::execute(sub_matches, &config),
        "assemble" => cmd_gofm::assemble::execute(sub_matches, &config),
        "cluster" => cmd_gofm::cluster::execute(sub_matches, &config),
        "search" => cmd_gofm::search::execute(sub_matches, &config),
        "select" => cmd_gofm::select::execute(sub_matches, &config),
        "geneset" => cmd_gofm::geneset::execute(sub_matches, &config),
        _ => unreachable!(),
    }?;

    Ok(())
}
