use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn command_cluster() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("gofm")?;
    let output = cmd
        .arg("cluster")
        .arg("tests/data/dist10.csv")
        .arg("-k")
        .arg("3")
        .arg("--sigma")
        .arg("0.1")
        .output()?;
    let stdout = String::from_utf8(output.stdout)?;

    assert!(stdout.starts_with("k=3,sigma=0.1\ngene,label\n"));
    assert_eq!(stdout.lines().count(), 2 + 10);
    assert!(stdout.contains("\ng01,"));
    for line in stdout.lines().skip(2) {
        let label: usize = line.split(',').nth(1).unwrap().parse()?;
        assert!(label < 3);
    }

    Ok(())
}

#[test]
fn command_cluster_self_tuning() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("gofm")?;
    let output = cmd
        .arg("cluster")
        .arg("tests/data/dist10.csv")
        .arg("-k")
        .arg("2")
        .arg("--sk")
        .arg("3")
        .arg("--normalization")
        .arg("row")
        .arg("--repeats")
        .arg("3")
        .output()?;
    let stdout = String::from_utf8(output.stdout)?;

    assert!(stdout.starts_with("k=2,sigma=0\ngene,label\n"));
    assert_eq!(stdout.lines().count(), 12);

    Ok(())
}

#[test]
fn command_cluster_args() -> anyhow::Result<()> {
    // neither --sigma nor --sk
    let mut cmd = Command::cargo_bin("gofm")?;
    cmd.arg("cluster")
        .arg("tests/data/dist10.csv")
        .arg("-k")
        .arg("2");
    cmd.assert().failure();

    // more clusters than genes
    let mut cmd = Command::cargo_bin("gofm")?;
    cmd.arg("cluster")
        .arg("tests/data/dist10.csv")
        .arg("-k")
        .arg("11")
        .arg("--sigma")
        .arg("0.5");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("invalid parameter"));

    Ok(())
}

#[test]
fn command_search_select() -> anyhow::Result<()> {
    let tempdir = tempfile::tempdir()?;
    let prefix = tempdir.path().join("toy");

    let mut cmd = Command::cargo_bin("gofm")?;
    cmd.arg("search")
        .arg("tests/data/dist10.csv")
        .arg("--aspect")
        .arg("bp")
        .arg("--config")
        .arg("tests/data/config.toml")
        .arg("-o")
        .arg(&prefix);
    cmd.assert()
        .success()
        .stderr(predicate::str::contains("4 of 4 combinations clustered"));

    let silhouette = tempdir.path().join("toy.silhouette.csv");
    let sizes = tempdir.path().join("toy.sizes.csv");

    let text = std::fs::read_to_string(&silhouette)?;
    assert!(text.starts_with("k,sigma,silhouette\n"));
    assert_eq!(text.lines().count(), 1 + 4);

    let text = std::fs::read_to_string(&sizes)?;
    assert_eq!(text.lines().count(), 4);
    for line in text.lines() {
        let fields: Vec<&str> = line.split(',').collect();
        let k: usize = fields[0].parse()?;
        assert_eq!(fields.len(), 2 + k);
        let total: usize = fields[2..].iter().map(|s| s.parse::<usize>().unwrap()).sum();
        assert_eq!(total, 10);
    }

    let mut cmd = Command::cargo_bin("gofm")?;
    let output = cmd
        .arg("select")
        .arg(&silhouette)
        .arg(&sizes)
        .arg("--config")
        .arg("tests/data/config.toml")
        .output()?;
    let stdout = String::from_utf8(output.stdout)?;

    assert!(stdout.starts_with("metric\trank\tk\tsigma\tsilhouette\tfraction\tscore\n"));
    assert_eq!(stdout.lines().count(), 1 + 4 + 3 + 3);
    assert!(stdout.contains("\ncombined\t1\t"));
    assert!(stdout.contains("\nfraction\t3\t"));

    Ok(())
}

#[test]
fn command_select_bad_window() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("gofm")?;
    cmd.arg("select")
        .arg("a.csv")
        .arg("b.csv")
        .arg("--size-min")
        .arg("50")
        .arg("--size-max")
        .arg("10");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("exceeds"));

    Ok(())
}

#[test]
fn command_geneset() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("gofm")?;
    let output = cmd.arg("geneset").arg("tests/data/labels.csv").output()?;
    let stdout = String::from_utf8(output.stdout)?;

    assert_eq!(stdout.lines().count(), 3);
    assert!(stdout.starts_with("cluster_0\tk=3,sigma=0.1\tt01\tt02\tt03\n"));

    Ok(())
}

#[test]
fn command_geneset_transcripts() -> anyhow::Result<()> {
    let tempdir = tempfile::tempdir()?;
    let sets = tempdir.path().join("sets");

    let mut cmd = Command::cargo_bin("gofm")?;
    let output = cmd
        .arg("geneset")
        .arg("tests/data/labels.csv")
        .arg("--transcripts")
        .arg("tests/data/tx2gene.tsv")
        .arg("--min-size")
        .arg("2")
        .arg("--dir")
        .arg(&sets)
        .output()?;
    let stdout = String::from_utf8(output.stdout)?;
    let stderr = String::from_utf8(output.stderr)?;

    // t08 has no gene; cluster 2 shrinks to G7 alone
    assert!(stderr.contains("1 entities without a gene were dropped"));
    assert_eq!(
        stdout,
        "cluster_0\tk=3,sigma=0.1\tG1\tG2\ncluster_1\tk=3,sigma=0.1\tG4\tG5\tG6\n"
    );
    assert_eq!(std::fs::read_to_string(sets.join("cluster_1.txt"))?, "G4\nG5\nG6\n");
    assert!(!sets.join("cluster_2.txt").exists());

    Ok(())
}

#[test]
fn command_pipeline() -> anyhow::Result<()> {
    let tempdir = tempfile::tempdir()?;
    let dir = tempdir.path();

    let steps: Vec<Vec<String>> = vec![
        vec!["annot", "tests/data/toy.obo", "tests/data/toy.tsv", "--aspect", "bp", "--no-cache", "-o", "bp.bin"],
        vec!["graph", "tests/data/toy.obo", "bp.bin", "--aspect", "bp", "-o", "bp.graph.bin"],
        vec!["term-dist", "bp.graph.bin", "-o", "bp.term.csv"],
        vec!["gene-dist", "bp.bin", "bp.term.csv", "-o", "bp.gene.csv"],
        vec!["cluster", "bp.gene.csv", "-k", "2", "--sigma", "1", "-o", "bp.labels.csv"],
        vec!["geneset", "bp.labels.csv", "-o", "bp.gmt"],
    ]
    .into_iter()
    .map(|step| {
        step.into_iter()
            .map(|a| {
                if a.contains('.') && !a.starts_with("tests/") {
                    dir.join(a).to_string_lossy().to_string()
                } else {
                    a.to_string()
                }
            })
            .collect()
    })
    .collect();

    for step in &steps {
        let mut cmd = Command::cargo_bin("gofm")?;
        cmd.args(step);
        cmd.assert().success();
    }

    let labels = std::fs::read_to_string(dir.join("bp.labels.csv"))?;
    assert!(labels.starts_with("k=2,sigma=1\ngene,label\n"));
    // g9 never gets a distance, so it is not clustered
    assert_eq!(labels.lines().count(), 2 + 7);
    assert!(!labels.contains("g9"));

    let gmt = std::fs::read_to_string(dir.join("bp.gmt"))?;
    let genes: usize = gmt.lines().map(|l| l.split('\t').count() - 2).sum();
    assert_eq!(genes, 7);

    Ok(())
}
