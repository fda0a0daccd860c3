//! Hygiene — source scans for patterns the crate keeps at zero.
//!
//! Each pattern has a budget. Lowering a budget is fine; raising one means
//! fixing an existing hit first.
#![allow(clippy::absurd_extreme_comparisons)]

use std::fs;
use std::path::Path;

struct Budget {
    pattern: &'static str,
    max: usize,
    why: &'static str,
}

const PANICS: &[Budget] = &[
    Budget { pattern: ".unwrap()", max: 0, why: "panics on error" },
    Budget { pattern: ".expect(", max: 0, why: "panics on error" },
    Budget { pattern: "panic!(", max: 0, why: "aborts the task" },
    Budget { pattern: "unreachable!(", max: 0, why: "aborts the task" },
    Budget { pattern: "todo!(", max: 0, why: "unfinished stub" },
    Budget { pattern: "unimplemented!(", max: 0, why: "unfinished stub" },
];

const SILENT_LOSS: &[Budget] = &[
    Budget { pattern: "let _ =", max: 0, why: "discards a result unread" },
    Budget { pattern: ".ok()", max: 0, why: "drops the error value" },
];

const STYLE: &[Budget] = &[Budget { pattern: "#[allow(dead_code)]", max: 0, why: "hides unused code" }];

struct SourceFile {
    path: String,
    content: String,
}

/// Production `.rs` files under `src/`; `*_test.rs` modules are skipped.
fn source_files() -> Vec<SourceFile> {
    let mut files = Vec::new();
    collect(Path::new("src"), &mut files);
    files
}

fn collect(dir: &Path, out: &mut Vec<SourceFile>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect(&path, out);
            continue;
        }
        let path_str = path.to_string_lossy().to_string();
        if !path_str.ends_with(".rs") || path_str.ends_with("_test.rs") {
            continue;
        }
        if let Ok(content) = fs::read_to_string(&path) {
            out.push(SourceFile { path: path_str, content });
        }
    }
}

fn hits(files: &[SourceFile], pattern: &str) -> Vec<(String, usize)> {
    files
        .iter()
        .filter_map(|file| {
            let count = file.content.lines().filter(|line| line.contains(pattern)).count();
            (count > 0).then(|| (file.path.clone(), count))
        })
        .collect()
}

fn check(budgets: &[Budget]) {
    let files = source_files();
    assert!(!files.is_empty(), "no sources found under src/");
    for budget in budgets {
        let found = hits(&files, budget.pattern);
        let count: usize = found.iter().map(|(_, c)| c).sum();
        let listing = found
            .iter()
            .map(|(path, c)| format!("  {path}: {c}"))
            .collect::<Vec<_>>()
            .join("\n");
        assert!(
            count <= budget.max,
            "`{}` budget exceeded ({}): found {count}, max {}.\n{listing}",
            budget.pattern,
            budget.why,
            budget.max,
        );
    }
}

#[test]
fn panic_budgets() {
    check(PANICS);
}

#[test]
fn silent_loss_budgets() {
    check(SILENT_LOSS);
}

#[test]
fn style_budgets() {
    check(STYLE);
}
