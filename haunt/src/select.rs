//! Turns a user-supplied path into the file set of a run.
//!
//! A single file is accepted if its type is allowed. A folder is walked recursively:
//! allowed files are kept under a flattened name (`sub/dir/app.py` → `sub__dir__app.py`),
//! files whose content duplicates an earlier one are skipped, and VCS/build directories
//! are never entered. Symlinked directories are not followed; symlinked files are read.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use haunt_core::contract::FileDescriptor;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

const SKIPPED_DIRS: &[&str] = &[".git", "target", "node_modules"];

/// Separator replacing `/` in flattened names.
pub const FLAT_SEPARATOR: &str = "__";

const MAX_FLAT_NAME_LEN: usize = 180;

/// True if the file's extension is in `allowed` or it is a dotenv file (`.env`, `.env.*`).
/// Comparison is case-insensitive; extensions may be given with or without the dot.
pub fn is_allowed(path: &Path, allowed: &[String]) -> bool {
    let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_lowercase()) else {
        return false;
    };
    if name == ".env" || name.starts_with(".env.") {
        return true;
    }
    let Some(ext) = path.extension().map(|e| e.to_string_lossy().to_lowercase()) else {
        return false;
    };
    allowed
        .iter()
        .any(|a| a.trim_start_matches('.').eq_ignore_ascii_case(&ext))
}

/// Media type inferred from the file extension.
pub fn media_type_for(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "py" => "text/x-python",
        "js" => "text/javascript",
        "ts" => "application/typescript",
        "json" => "application/json",
        "php" => "application/x-httpd-php",
        "yaml" | "yml" => "application/yaml",
        _ => "text/plain",
    }
}

/// Builds the file set for `path`, which may be a file or a folder.
pub fn select_files(path: &Path, allowed: &[String]) -> Result<Vec<FileDescriptor>> {
    if path.is_file() {
        if !is_allowed(path, allowed) {
            warn!(path = %path.display(), "File type not allowed");
            bail!("file type not allowed: {}", path.display());
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("path has no file name: {}", path.display()))?;
        let size = path
            .metadata()
            .with_context(|| format!("failed to stat {}", path.display()))?
            .len();
        let media_type = media_type_for(&name);
        return Ok(vec![FileDescriptor::from_path(name, size, path, media_type)]);
    }
    if !path.is_dir() {
        bail!("path is neither a file nor a directory: {}", path.display());
    }

    info!(path = %path.display(), "Collecting files from folder");
    let mut selected = Vec::new();
    let mut seen_hashes = HashSet::new();
    visit_dir(path, path, allowed, &mut seen_hashes, &mut selected)?;
    info!(count = selected.len(), "Found files to upload");
    Ok(selected)
}

fn visit_dir(
    dir: &Path,
    root: &Path,
    allowed: &[String],
    seen_hashes: &mut HashSet<[u8; 32]>,
    results: &mut Vec<FileDescriptor>,
) -> Result<()> {
    let mut entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory {}", dir.display()))?
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let file_type = entry
            .file_type()
            .with_context(|| format!("failed to stat {}", path.display()))?;
        if file_type.is_symlink() && path.is_dir() {
            debug!(path = %path.display(), "Skipping symlinked directory");
            continue;
        }
        if file_type.is_dir() {
            let dir_name = entry.file_name().to_string_lossy().into_owned();
            if SKIPPED_DIRS.contains(&dir_name.as_str()) {
                debug!(path = %path.display(), "Skipping directory");
                continue;
            }
            visit_dir(&path, root, allowed, seen_hashes, results)?;
        } else if path.is_file() {
            if !is_allowed(&path, allowed) {
                debug!(path = %path.display(), "Skipping file (not allowed)");
                continue;
            }
            let content = std::fs::read(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let digest: [u8; 32] = Sha256::digest(&content).into();
            if !seen_hashes.insert(digest) {
                info!(path = %path.display(), "Skipping duplicate content");
                continue;
            }
            let rel = path.strip_prefix(root).unwrap_or(&path);
            let name = flatten_name(rel);
            debug!(filename = %name, size = content.len(), "Selected file");
            results.push(FileDescriptor::from_path(
                name.clone(),
                content.len() as u64,
                &path,
                media_type_for(&name),
            ));
        }
    }
    Ok(())
}

/// Joins the components of a relative path with `__`, dropping leading directories while
/// the result is longer than 180 bytes. The basename is always kept.
pub fn flatten_name(rel: &Path) -> String {
    let mut segments: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    let Some(basename) = segments.pop() else {
        return String::new();
    };
    let mut from = 0;
    loop {
        let joined = if from < segments.len() {
            segments[from..].join(FLAT_SEPARATOR) + FLAT_SEPARATOR + &basename
        } else {
            basename.clone()
        };
        if joined.len() <= MAX_FLAT_NAME_LEN || from >= segments.len() {
            return joined;
        }
        from += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> Vec<String> {
        crate::load_config::DEFAULT_ALLOWED_EXTENSIONS
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn allows_configured_extensions_and_dotenv() {
        let allowed = defaults();
        assert!(is_allowed(Path::new("src/app.py"), &allowed));
        assert!(is_allowed(Path::new("INDEX.JS"), &allowed));
        assert!(is_allowed(Path::new(".env"), &allowed));
        assert!(is_allowed(Path::new("conf/.env.production"), &allowed));
        assert!(!is_allowed(Path::new("README.md"), &allowed));
        assert!(!is_allowed(Path::new("Makefile"), &allowed));
    }

    #[test]
    fn extensions_without_dot_are_accepted() {
        assert!(is_allowed(Path::new("main.rs"), &["rs".to_string()]));
    }

    #[test]
    fn flattens_nested_paths() {
        assert_eq!(flatten_name(Path::new("a/b/c.py")), "a__b__c.py");
        assert_eq!(flatten_name(Path::new("c.py")), "c.py");
    }

    #[test]
    fn long_paths_drop_leading_directories() {
        let deep = format!("{}/{}/leaf.js", "x".repeat(120), "y".repeat(50));
        let flat = flatten_name(Path::new(&deep));
        assert_eq!(flat, format!("{}__leaf.js", "y".repeat(50)));
    }

    #[test]
    fn media_types_follow_extension() {
        assert_eq!(media_type_for("a.py"), "text/x-python");
        assert_eq!(media_type_for("b.YML"), "application/yaml");
        assert_eq!(media_type_for(".env"), "text/plain");
    }
}
