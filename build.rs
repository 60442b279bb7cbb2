use std::path::{Path, PathBuf};
use std::process::Command;

const MAX_LINES: usize = 750;

const CHECKED_EXTENSIONS: &[&str] = &["rs", "yaml", "toml"];

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads/main");
    println!("cargo:rerun-if-changed=.git/packed-refs");

    let sha = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .and_then(|output| {
            if output.status.success() {
                String::from_utf8(output.stdout)
                    .ok()
                    .map(|s| s.trim().to_string())
            } else {
                None
            }
        })
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=USAGE_REPORT_GIT_SHA={}", sha);

    let files = collect_source_files();
    for file in &files {
        println!("cargo:rerun-if-changed={}", file.display());
    }

    enforce_line_limits(&files);
    enforce_no_dead_code_allows(&files);
    enforce_serial_for_env_mutations(&files);
}

fn source_root() -> PathBuf {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR must be set");
    PathBuf::from(manifest_dir).join("src")
}

fn collect_source_files() -> Vec<PathBuf> {
    let mut files = Vec::new();
    walk_directory(&source_root(), &mut files);
    files.sort();
    files
}

fn walk_directory(dir: &Path, files: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return,
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            walk_directory(&path, files);
        } else if path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| CHECKED_EXTENSIONS.contains(&ext))
        {
            files.push(path);
        }
    }
}

fn relative(path: &Path) -> PathBuf {
    let root = source_root();
    path.strip_prefix(&root).unwrap_or(path).to_path_buf()
}

fn count_non_empty_lines(content: &str) -> usize {
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .count()
}

fn enforce_line_limits(files: &[PathBuf]) {
    let mut violations = Vec::new();
    for file in files {
        match std::fs::read_to_string(file) {
            Ok(content) => {
                let line_count = count_non_empty_lines(&content);
                if line_count > MAX_LINES {
                    violations.push((relative(file), line_count));
                }
            }
            Err(e) => {
                println!(
                    "cargo:warning=Could not read file {}: {}",
                    relative(file).display(),
                    e
                );
            }
        }
    }

    if !violations.is_empty() {
        eprintln!("\n========================================");
        eprintln!("FILE LINE LIMIT EXCEEDED (max {} lines)", MAX_LINES);
        eprintln!("========================================");
        for (path, lines) in &violations {
            eprintln!(
                "  src/{} - {} lines (exceeds by {})",
                path.display(),
                lines,
                lines - MAX_LINES
            );
        }
        eprintln!("========================================\n");
        panic!(
            "Build failed: {} file(s) exceed the {} line limit",
            violations.len(),
            MAX_LINES
        );
    }
}

fn rust_files(files: &[PathBuf]) -> impl Iterator<Item = &PathBuf> {
    files
        .iter()
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("rs"))
}

fn enforce_no_dead_code_allows(files: &[PathBuf]) {
    let mut violations: Vec<(PathBuf, usize, String)> = Vec::new();

    for file in rust_files(files) {
        if let Ok(content) = std::fs::read_to_string(file) {
            for (line_num, line) in content.lines().enumerate() {
                let trimmed = line.trim();
                if (trimmed.starts_with("#[allow(") || trimmed.starts_with("#![allow("))
                    && trimmed.contains("dead_code")
                {
                    violations.push((relative(file), line_num + 1, trimmed.to_string()));
                }
            }
        }
    }

    if !violations.is_empty() {
        eprintln!("\n========================================");
        eprintln!("#[allow(dead_code)] IS NOT ALLOWED");
        eprintln!("========================================");
        for (path, line_num, line) in &violations {
            eprintln!("  src/{}:{}", path.display(), line_num);
            eprintln!("    {}", line);
        }
        eprintln!("========================================");
        eprintln!("Delete unused code, or gate test helpers with #[cfg(test)].\n");
        panic!(
            "Build failed: {} #[allow(dead_code)] occurrence(s) found. Remove the dead code.",
            violations.len()
        );
    }
}

/// Tests that touch process environment must be `#[serial]`.
fn enforce_serial_for_env_mutations(files: &[PathBuf]) {
    let mut violations: Vec<(PathBuf, usize, String)> = Vec::new();

    for file in rust_files(files) {
        let Ok(content) = std::fs::read_to_string(file) else {
            continue;
        };
        let lines: Vec<&str> = content.lines().collect();

        let mut in_test_fn = false;
        let mut has_serial = false;
        let mut test_fn_start = 0;
        let mut test_fn_name = String::new();
        let mut brace_depth = 0i32;

        for (i, line) in lines.iter().enumerate() {
            let trimmed = line.trim();

            if trimmed == "#[serial]" || trimmed == "#[serial_test::serial]" {
                has_serial = true;
            }

            if trimmed == "#[test]" || trimmed.starts_with("#[tokio::test") {
                for candidate in lines.iter().skip(i + 1).take(4) {
                    if let Some(fn_pos) = candidate.find("fn ") {
                        let after_fn = candidate.get(fn_pos + 3..).unwrap_or_default();
                        test_fn_name = after_fn
                            .split('(')
                            .next()
                            .unwrap_or_default()
                            .trim()
                            .to_string();
                        test_fn_start = i + 1;
                        in_test_fn = true;
                        brace_depth = 0;
                        break;
                    }
                }
            }

            if !in_test_fn {
                continue;
            }

            for c in line.chars() {
                if c == '{' {
                    brace_depth += 1;
                } else if c == '}' {
                    brace_depth -= 1;
                    if brace_depth == 0 {
                        in_test_fn = false;
                        has_serial = false;
                    }
                }
            }

            let mutates_env = !trimmed.starts_with("//")
                && (trimmed.contains("env::set_var") || trimmed.contains("env::remove_var"));
            if mutates_env && !has_serial {
                violations.push((
                    relative(file),
                    test_fn_start,
                    format!("test `{}` mutates env without #[serial]", test_fn_name),
                ));
                in_test_fn = false;
                has_serial = false;
            }
        }
    }

    if !violations.is_empty() {
        eprintln!("\n========================================");
        eprintln!("ENV MUTATIONS REQUIRE #[serial]");
        eprintln!("========================================");
        for (path, line_num, msg) in &violations {
            eprintln!("  src/{}:{}", path.display(), line_num);
            eprintln!("    {}", msg);
        }
        eprintln!("========================================\n");
        panic!(
            "Build failed: {} test(s) mutate env vars without #[serial].",
            violations.len()
        );
    }
}
