use std::{fs, process::Command};

use temp_dir::TempDir;

fn spimi(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_spimi"))
        .args(args)
        .output()
        .expect("Could not run spimi")
}

#[test]
fn test_query_without_index() {
    let dir = TempDir::new().unwrap();
    let output = spimi(&["query", dir.path().to_str().unwrap(), "cat"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("build an index first"), "{}", stderr);
    assert!(!stderr.contains("IndexNotBuilt("), "{}", stderr);
}

#[test]
fn test_index_then_query() {
    let dir = TempDir::new().unwrap();
    let collection = dir.path().join("collection.tsv");
    fs::write(&collection, "d1\tthe cat sat\nd2\ta dog and a cat\n").unwrap();
    let index = dir.path().join("index");

    let output = spimi(&[
        "index",
        collection.to_str().unwrap(),
        index.to_str().unwrap(),
    ]);
    assert!(output.status.success());

    let output = spimi(&["query", index.to_str().unwrap(), "dog"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("1\td2\t"), "{}", stdout);
}
