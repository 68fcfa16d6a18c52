use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use std::process::Command;

// mapping and graph of the toy biological_process aspect
fn prepare(dir: &Path) -> anyhow::Result<(PathBuf, PathBuf)> {
    let mapping = dir.join("bp.bin");
    let graph = dir.join("bp.graph.bin");

    let mut cmd = Command::cargo_bin("gofm")?;
    cmd.arg("annot")
        .arg("tests/data/toy.obo")
        .arg("tests/data/toy.tsv")
        .arg("--aspect")
        .arg("bp")
        .arg("--no-cache")
        .arg("-o")
        .arg(&mapping);
    cmd.assert().success();

    let mut cmd = Command::cargo_bin("gofm")?;
    cmd.arg("graph")
        .arg("tests/data/toy.obo")
        .arg(&mapping)
        .arg("--aspect")
        .arg("bp")
        .arg("-o")
        .arg(&graph);
    cmd.assert().success();

    Ok((mapping, graph))
}

#[test]
fn command_term_dist() -> anyhow::Result<()> {
    let tempdir = tempfile::tempdir()?;
    let (_, graph) = prepare(tempdir.path())?;

    let mut cmd = Command::cargo_bin("gofm")?;
    let output = cmd
        .arg("term-dist")
        .arg(&graph)
        .arg("-p")
        .arg("2")
        .output()?;
    let stdout = String::from_utf8(output.stdout)?;

    // 8 nodes, 28 pairs; the isolated GO:0000009 reaches nothing
    assert_eq!(stdout.lines().count(), 1 + 21);
    assert!(stdout.starts_with("i,j,distance\n"));
    assert!(!stdout.contains("GO:0000009"));
    for line in stdout.lines().skip(1) {
        let fields: Vec<&str> = line.split(',').collect();
        assert!(fields[0] < fields[1]);
        assert!(fields[2].parse::<f64>()? >= 0.0);
    }

    Ok(())
}

#[test]
fn command_term_dist_range() -> anyhow::Result<()> {
    let tempdir = tempfile::tempdir()?;
    let (_, graph) = prepare(tempdir.path())?;

    let mut cmd = Command::cargo_bin("gofm")?;
    let output = cmd
        .arg("term-dist")
        .arg(&graph)
        .arg("--first")
        .arg("0")
        .arg("--last")
        .arg("7")
        .output()?;
    let stdout = String::from_utf8(output.stdout)?;

    // pairs 0..7 all start from GO:0000001
    assert!(stdout.lines().count() <= 1 + 7);
    assert!(stdout.lines().skip(1).all(|l| l.starts_with("GO:0000001,")));

    let mut cmd = Command::cargo_bin("gofm")?;
    cmd.arg("term-dist")
        .arg(&graph)
        .arg("--first")
        .arg("10")
        .arg("--last")
        .arg("100");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("pair range"));

    Ok(())
}

#[test]
fn command_gene_dist() -> anyhow::Result<()> {
    let tempdir = tempfile::tempdir()?;
    let (mapping, graph) = prepare(tempdir.path())?;
    let terms = tempdir.path().join("bp.term.csv");

    let mut cmd = Command::cargo_bin("gofm")?;
    cmd.arg("term-dist").arg(&graph).arg("-o").arg(&terms);
    cmd.assert().success();

    let mut cmd = Command::cargo_bin("gofm")?;
    let output = cmd
        .arg("gene-dist")
        .arg(&mapping)
        .arg(&terms)
        .output()?;
    let stdout = String::from_utf8(output.stdout)?;

    // g9's only term has no finite distance: no row, neither 0 nor inf
    assert_eq!(stdout.lines().count(), 1 + 21);
    assert!(!stdout.contains("g9"));
    assert!(!stdout.contains("inf"));
    assert!(stdout.contains("\ng1,g2,"));

    Ok(())
}

#[test]
fn command_jobs_assemble() -> anyhow::Result<()> {
    let tempdir = tempfile::tempdir()?;
    let (_, graph) = prepare(tempdir.path())?;
    let jobs = tempdir.path().join("jobs");

    let mut cmd = Command::cargo_bin("gofm")?;
    cmd.arg("jobs")
        .arg("term")
        .arg(&graph)
        .arg("--parts")
        .arg("3")
        .arg("--dir")
        .arg(&jobs);
    cmd.assert().success();

    let manifest = std::fs::read_to_string(jobs.join("manifest.tsv"))?;
    assert!(manifest.starts_with("#entities=8\ttotal=28\n"));
    assert_eq!(manifest.lines().count(), 4);
    let submit = std::fs::read_to_string(jobs.join("scripts/submit.list"))?;
    assert_eq!(submit.lines().count(), 3);

    // nothing has run yet
    let mut cmd = Command::cargo_bin("gofm")?;
    cmd.arg("assemble").arg(jobs.join("manifest.tsv"));
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("missing"));

    // run each partition the way its script would
    for line in manifest.lines().skip(1) {
        let fields: Vec<&str> = line.split('\t').collect();
        let mut cmd = Command::cargo_bin("gofm")?;
        cmd.arg("term-dist")
            .arg(&graph)
            .arg("--first")
            .arg(fields[0])
            .arg("--last")
            .arg(fields[1])
            .arg("-o")
            .arg(fields[2]);
        cmd.assert().success();

        // a written partition is not assembled until its job marks it done
        let mut cmd = Command::cargo_bin("gofm")?;
        cmd.arg("assemble").arg(jobs.join("manifest.tsv"));
        cmd.assert()
            .failure()
            .stderr(predicate::str::contains("missing"));

        std::fs::write(format!("{}.done", fields[2]), "")?;
    }

    let mut cmd = Command::cargo_bin("gofm")?;
    let output = cmd
        .arg("assemble")
        .arg(jobs.join("manifest.tsv"))
        .arg("--wait")
        .arg("--interval")
        .arg("0")
        .arg("--polls")
        .arg("1")
        .output()?;
    let assembled = String::from_utf8(output.stdout)?;
    let stderr = String::from_utf8(output.stderr)?;
    assert!(stderr.contains("Recovered 21 of 28 distances from 3 partitions"));

    let mut cmd = Command::cargo_bin("gofm")?;
    let output = cmd.arg("term-dist").arg(&graph).output()?;
    let full = String::from_utf8(output.stdout)?;
    assert_eq!(assembled, full);

    Ok(())
}

#[test]
fn command_jobs_needs_kind() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("gofm")?;
    cmd.arg("jobs");
    cmd.assert().failure();

    let mut cmd = Command::cargo_bin("gofm")?;
    cmd.arg("jobs").arg("--parts").arg("3");
    cmd.assert().failure();

    Ok(())
}

#[test]
fn command_assemble_malformed() -> anyhow::Result<()> {
    let tempdir = tempfile::tempdir()?;
    let part = tempdir.path().join("part.csv");
    std::fs::write(&part, "i,j,distance\na,b,-2\n")?;
    std::fs::write(tempdir.path().join("part.csv.done"), "")?;
    let manifest = tempdir.path().join("manifest.tsv");
    std::fs::write(
        &manifest,
        format!("#entities=2\ttotal=1\n0\t1\t{}\n", part.display()),
    )?;

    let mut cmd = Command::cargo_bin("gofm")?;
    cmd.arg("assemble").arg(&manifest);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("malformed partition"));

    Ok(())
}
