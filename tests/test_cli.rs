use assert_cmd::Command;
use std::io::Write;
use tempfile::NamedTempFile;

/// Patristic distances: A-B 0.04, C-D 0.15, AB-CD 0.25, E to all others 0.35
const ULTRAMETRIC_TREE: &str =
    "(((A:0.02,B:0.02):0.105,(C:0.075,D:0.075):0.05):0.05,E:0.175);";

const ALIGNMENT: &str = ">a first\nAAAAAAAAAA\n>b\nAAAAAAAAAC\n>c\nCCAAAAAAAA\n>d\nCCAAAAAAAC\n";

fn temp_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn run(args: &[&str]) -> (bool, String, String) {
    let output = Command::cargo_bin("ecotype").unwrap().args(args).output().unwrap();
    (
        output.status.success(),
        String::from_utf8(output.stdout).unwrap(),
        String::from_utf8(output.stderr).unwrap(),
    )
}

#[test]
fn test_newick_reroot() {
    let tree = temp_file("((A:1,B:2):3,(C:4,D:5):6);");
    let path = tree.path().to_str().unwrap();

    let (ok, stdout, stderr) = run(&["newick", "-t", path, "--outgroup", "C", "-q"]);
    assert!(ok, "{stderr}");
    assert_eq!(stdout, "(C:2,(D:5,(A:1,B:2):9):2);\n");
    assert!(stderr.is_empty());
}

#[test]
fn test_newick_sort_reports_progress() {
    let tree = temp_file("((A:1,B:2):3,(C:4,D:5):6);\n(X:1,Y:1);\n");
    let path = tree.path().to_str().unwrap();

    let (ok, stdout, stderr) = run(&["newick", "-t", path, "--sort"]);
    assert!(ok, "{stderr}");
    assert_eq!(stdout, "((D:5,C:4):6,(B:2,A:1):3);\n(X:1,Y:1);\n");
    assert!(stderr.contains("Wrote 2 trees"));
}

#[test]
fn test_newick_unknown_outgroup_fails() {
    let tree = temp_file("((A:1,B:2):3,(C:4,D:5):6);");
    let (ok, _, stderr) = run(&["newick", "-t", tree.path().to_str().unwrap(), "--outgroup", "Z"]);
    assert!(!ok);
    assert!(stderr.contains("NotFound"));
}

#[test]
fn test_bins_from_tree() {
    let tree = temp_file("((A:0.01,B:0.01):0.2,(C:0.01,D:0.01):0.2);");
    let path = tree.path().to_str().unwrap();

    let (ok, stdout, stderr) = run(&["bins", "-t", path, "--thresholds", "0.0,0.5,0.1", "-q"]);
    assert!(ok, "{stderr}");
    assert_eq!(stdout, "0.5\t1\n0.1\t2\n0\t4\n");
}

#[test]
fn test_bins_from_alignment_to_file() {
    let alignment = temp_file(ALIGNMENT);
    let output = NamedTempFile::new().unwrap();

    let (ok, stdout, stderr) = run(&[
        "bins",
        "-a",
        alignment.path().to_str().unwrap(),
        "--thresholds",
        "0.3,0.15,0.0",
        "-o",
        output.path().to_str().unwrap(),
    ]);
    assert!(ok, "{stderr}");
    assert!(stdout.is_empty());
    assert!(stderr.contains("Binned 4 sequences at 3 thresholds"));

    let written = std::fs::read_to_string(output.path()).unwrap();
    assert_eq!(written, "0.3\t1\n0.15\t2\n0\t4\n");
}

#[test]
fn test_bins_from_alignment_ignores_gap_columns() {
    // b and c differ only in the columns where a has gaps
    let alignment = temp_file(">a\nCCCC--\n>b\nAAAACC\n>c\nAAAAGG\n");
    let path = alignment.path().to_str().unwrap();

    let (ok, stdout, stderr) = run(&["bins", "-a", path, "--thresholds", "0.5,0.0", "-q"]);
    assert!(ok, "{stderr}");
    assert_eq!(stdout, "0.5\t2\n0\t2\n");
}

#[test]
fn test_bins_needs_input() {
    let (ok, _, _) = run(&["bins"]);
    assert!(!ok);
}

#[test]
fn test_estimate_from_tree() {
    let tree = temp_file(ULTRAMETRIC_TREE);
    let (ok, stdout, stderr) = run(&[
        "estimate",
        "-t",
        tree.path().to_str().unwrap(),
        "--length",
        "100",
        "--thresholds",
        "0.4,0.3,0.2,0.1,0.05,0.0",
        "-q",
    ]);
    assert!(ok, "{stderr}");

    let keys: Vec<&str> = stdout
        .lines()
        .map(|line| line.split('\t').next().unwrap())
        .collect();
    assert_eq!(keys, vec!["npop", "omega", "sigma", "sigma_line", "omega_line"]);

    let npop: usize = stdout.lines().next().unwrap()["npop\t".len()..].parse().unwrap();
    assert!(npop >= 1);
}

#[test]
fn test_estimate_requires_length_with_tree() {
    let tree = temp_file(ULTRAMETRIC_TREE);
    let (ok, _, _) = run(&["estimate", "-t", tree.path().to_str().unwrap()]);
    assert!(!ok);
}

#[test]
fn test_estimate_degenerate_curve_fails() {
    let tree = temp_file("(A:0.1,B:0.1);");
    let (ok, stdout, stderr) = run(&["estimate", "-t", tree.path().to_str().unwrap(), "-l", "100"]);
    assert!(!ok);
    assert!(stdout.is_empty());
    assert!(stderr.contains("DegenerateFit"));
}

#[test]
fn test_recombinants() {
    let tree = temp_file("((a:0.1,b:0.1):0.1,(c:0.1,(d:0.1,r:0.1):0.1):0.1);");
    let alignment = temp_file(ALIGNMENT);

    let (ok, stdout, stderr) = run(&[
        "recombinants",
        "-t",
        tree.path().to_str().unwrap(),
        "-a",
        alignment.path().to_str().unwrap(),
    ]);
    assert!(ok, "{stderr}");
    assert_eq!(stdout, "r\n");
    assert!(stderr.contains("Found 1 of 5 leaves"));
}
