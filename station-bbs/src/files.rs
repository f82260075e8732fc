use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Path relative to the `pubfiles/` root, category preserved.
    pub relative_path: String,
    pub size: u64,
}

/// Recursively lists every regular file under `root`, preserving its
/// category (subdirectory) in `relative_path`.
pub fn list_files(root: &Path) -> Vec<FileEntry> {
    let mut out = Vec::new();
    walk(root, root, &mut out);
    out.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    out
}

fn walk(root: &Path, dir: &Path, out: &mut Vec<FileEntry>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            walk(root, &path, out);
        } else if let Ok(metadata) = entry.metadata() {
            if let Ok(relative) = path.strip_prefix(root) {
                out.push(FileEntry {
                    relative_path: relative.to_string_lossy().replace('\\', "/"),
                    size: metadata.len(),
                });
            }
        }
    }
}

/// Resolves `name` against the file listing case-insensitively, returning
/// the file's absolute path on disk.
pub fn resolve(root: &Path, name: &str) -> Option<PathBuf> {
    list_files(root)
        .into_iter()
        .find(|entry| entry.relative_path.eq_ignore_ascii_case(name))
        .map(|entry| root.join(entry.relative_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_files_recursively_with_category() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("manuals")).unwrap();
        fs::write(dir.path().join("manuals/readme.txt"), b"hi").unwrap();
        fs::write(dir.path().join("top.txt"), b"top").unwrap();
        let files = list_files(dir.path());
        let paths: Vec<_> = files.iter().map(|f| f.relative_path.clone()).collect();
        assert!(paths.contains(&"manuals/readme.txt".to_string()));
        assert!(paths.contains(&"top.txt".to_string()));
    }

    #[test]
    fn resolve_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Manual.TXT"), b"hi").unwrap();
        let resolved = resolve(dir.path(), "manual.txt").unwrap();
        assert_eq!(resolved, dir.path().join("Manual.TXT"));
    }
}
