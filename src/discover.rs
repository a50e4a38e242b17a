//! Candidate file discovery.
//!
//! Returns paths in lexicographic order so that repeated scans of an
//! unchanged tree produce identical reports.

use crate::config::DiscoveryConfig;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

pub fn discover_files(root: &Path, config: &DiscoveryConfig) -> Result<Vec<PathBuf>, walkdir::Error> {
    let mut files = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_ignored_dir(entry, config));

    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_file() && has_source_extension(entry.path(), config) {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}

fn is_ignored_dir(entry: &DirEntry, config: &DiscoveryConfig) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| config.ignore_dirs.iter().any(|dir| dir == name))
}

fn has_source_extension(path: &Path, config: &DiscoveryConfig) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| config.extensions.iter().any(|allowed| allowed == ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_discovers_sorted_source_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for file in [
            "src/b.tsx",
            "src/a.ts",
            "src/nested/c.js",
            "src/readme.md",
            "node_modules/pkg/index.js",
            "dist/bundle.js",
        ] {
            let path = root.join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "").unwrap();
        }

        let files = discover_files(root, &DiscoveryConfig::default()).unwrap();
        let relative: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(relative, vec!["src/a.ts", "src/b.tsx", "src/nested/c.js"]);
    }

    #[test]
    fn test_custom_extensions() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.vue"), "").unwrap();
        fs::write(dir.path().join("b.ts"), "").unwrap();

        let config = DiscoveryConfig {
            extensions: vec!["vue".to_string()],
            ..DiscoveryConfig::default()
        };
        let files = discover_files(dir.path(), &config).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("a.vue"));
    }
}
