use std::fs;
use std::path::{Path, PathBuf};

fn collect_rs_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        if let Ok(read_dir) = fs::read_dir(&dir) {
            for entry in read_dir.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                } else if path.extension().map(|e| e == "rs").unwrap_or(false) {
                    files.push(path);
                }
            }
        }
    }
    files
}

fn file_contains(path: &Path, needle: &str) -> bool {
    fs::read_to_string(path)
        .map(|c| c.contains(needle))
        .unwrap_or(false)
}

fn offenders(needles: &[&str], allowed: &[&str]) -> Vec<String> {
    let src = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("src");

    let mut offenders = Vec::new();
    for file in collect_rs_files(&src) {
        let path_str = file.to_string_lossy().replace('\\', "/");
        if allowed.iter().any(|a| path_str.contains(a)) {
            continue;
        }
        if needles.iter().any(|needle| file_contains(&file, needle)) {
            offenders.push(path_str);
        }
    }
    offenders
}

#[test]
fn follow_writes_only_from_counter_service() {
    let offenders = offenders(
        &["link_follow(", "unlink_follow("],
        &["src/repository/", "src/services/counters.rs"],
    );

    if !offenders.is_empty() {
        panic!(
            "Follow links must be written through CounterService only. Offenders: {:?}",
            offenders
        );
    }
}

#[test]
fn counters_move_only_through_services() {
    // Handlers and the fan-out path must never touch denormalized counters.
    let offenders = offenders(
        &["adjust_counter(", "set_counters("],
        &[
            "src/repository/",
            "src/services/counters.rs",
            "src/services/content.rs",
        ],
    );

    if !offenders.is_empty() {
        panic!(
            "Counters may only be adjusted by CounterService or ContentService. Offenders: {:?}",
            offenders
        );
    }
}
