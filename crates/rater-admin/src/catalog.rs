//! Question catalog discovery.
//!
//! A catalog is either a directory of question images (what the image store
//! holds) or a plain text file with one question file name per line.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};

/// Extensions treated as question images
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

/// List question file names from a directory or a list file.
///
/// Names come back sorted and de-duplicated. List files skip blank lines
/// and `#` comments.
pub fn read_catalog(path: &Path) -> Result<Vec<String>> {
    let names: BTreeSet<String> = if path.is_dir() {
        scan_dir(path)?
    } else {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog {}", path.display()))?;
        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect()
    };

    Ok(names.into_iter().collect())
}

fn scan_dir(dir: &Path) -> Result<BTreeSet<String>> {
    let mut names = BTreeSet::new();
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list catalog directory {}", dir.display()))?;

    for entry in entries {
        let path = entry?.path();
        if !path.is_file() || !is_image(&path) {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            names.insert(name.to_string());
        }
    }

    Ok(names)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}
