use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

const ENV_PREFIX: &str = "NAD_ARCHIVE_";
const ALLOWLIST_FILE: &str = "nad_archive_env_allowlist.rs";

/// Every `.rs` file under `root`, depth first.
fn rust_sources(root: &Path) -> Vec<PathBuf> {
    let mut pending = vec![root.to_path_buf()];
    let mut files = Vec::new();
    while let Some(dir) = pending.pop() {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for path in entries.filter_map(|entry| entry.ok().map(|e| e.path())) {
            if path.is_dir() {
                pending.push(path);
            } else if path.extension().is_some_and(|ext| ext == "rs") {
                files.push(path);
            }
        }
    }
    files
}

/// Keys appear in code as `"NAD_ARCHIVE_..."` literals passed to env lookups.
/// Mentions in docs or identifiers are not reads and are ignored.
fn quoted_env_keys(source: &str) -> Vec<String> {
    let opening = format!("\"{ENV_PREFIX}");
    source
        .match_indices(opening.as_str())
        .filter_map(|(at, _)| {
            let literal = &source[at + 1..];
            let close = literal.find('"')?;
            let key = &literal[..close];
            let suffix = &key[ENV_PREFIX.len()..];
            let well_formed = !suffix.is_empty()
                && suffix
                    .bytes()
                    .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'_');
            well_formed.then(|| key.to_string())
        })
        .collect()
}

fn render_allowlist(keys: &BTreeSet<String>) -> String {
    let mut out = String::from("pub const GENERATED_NAD_ARCHIVE_ENV_ALLOWLIST: &[&str] = &[\n");
    for key in keys {
        out.push_str(&format!("    {key:?},\n"));
    }
    out.push_str("];\n");
    out
}

fn main() {
    let mut keys = BTreeSet::new();
    for file in rust_sources(Path::new("src")) {
        if let Ok(content) = fs::read_to_string(&file) {
            keys.extend(quoted_env_keys(&content));
        }
    }

    let out_dir = PathBuf::from(env::var_os("OUT_DIR").expect("cargo sets OUT_DIR"));
    fs::write(out_dir.join(ALLOWLIST_FILE), render_allowlist(&keys))
        .expect("write env allowlist");

    let built = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock after epoch");
    println!(
        "cargo:rustc-env=BUILD_UUID={:x}-{:x}",
        built.as_secs(),
        built.subsec_nanos()
    );
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=src");
}
