use std::fs;
use std::path::{Path, PathBuf};

fn manifest_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

/// Dependency names declared under the given `[section]` headers.
fn declared(manifest: &Path, sections: &[&str]) -> Vec<String> {
    let text = fs::read_to_string(manifest).expect("read manifest");
    let mut names = Vec::new();
    let mut active = false;
    for line in text.lines().map(str::trim) {
        if line.starts_with('[') {
            active = sections.contains(&line);
            continue;
        }
        if !active || line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(name) = line.split(['.', '=']).next() {
            names.push(name.trim().to_string());
        }
    }
    names
}

fn rust_sources() -> Vec<PathBuf> {
    let this_file = Path::new(file!()).file_name();
    let mut files = Vec::new();
    let mut stack = vec![manifest_dir().join("src"), manifest_dir().join("tests")];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir).into_iter().flatten().flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.extension().is_some_and(|e| e == "rs") && path.file_name() != this_file {
                files.push(path);
            }
        }
    }
    files
}

#[test]
fn every_crate_dependency_is_used() {
    let sources: Vec<String> = rust_sources()
        .iter()
        .filter_map(|path| fs::read_to_string(path).ok())
        .collect();

    let unused: Vec<String> = declared(
        &manifest_dir().join("Cargo.toml"),
        &["[dependencies]", "[dev-dependencies]"],
    )
    .into_iter()
    .filter(|name| {
        let ident = name.replace('-', "_");
        let needles = [format!("{ident}::"), format!("{ident}!"), format!("#[{ident}")];
        !sources
            .iter()
            .any(|source| needles.iter().any(|needle| source.contains(needle.as_str())))
    })
    .collect();

    assert!(unused.is_empty(), "Declared but never used: {:?}", unused);
}

#[test]
fn workspace_dependencies_have_a_member_user() {
    let member = declared(
        &manifest_dir().join("Cargo.toml"),
        &["[dependencies]", "[dev-dependencies]"],
    );
    let workspace = declared(
        &manifest_dir().join("../../Cargo.toml"),
        &["[workspace.dependencies]"],
    );

    let orphaned: Vec<&String> = workspace.iter().filter(|name| !member.contains(name)).collect();
    assert!(orphaned.is_empty(), "Workspace-only dependencies: {:?}", orphaned);
}
