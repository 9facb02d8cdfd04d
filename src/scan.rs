use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::ir::Class;

/// Loads classes from a JSON file holding an array of classes, or from every `.json` file under
/// a directory.
pub(crate) fn load_classes(input: &Path) -> Result<Vec<Class>> {
    let mut classes = Vec::new();
    if input.is_dir() {
        scan_dir(input, &mut classes)?;
    } else {
        classes.extend(read_class_file(input)?);
    }
    debug!("loaded {} classes from {}", classes.len(), input.display());
    Ok(classes)
}

/// Loads every classpath entry in the given order.
pub(crate) fn load_classpath(entries: &[PathBuf]) -> Result<Vec<Class>> {
    let mut classes = Vec::new();
    for entry in entries {
        classes.extend(
            load_classes(entry)
                .with_context(|| format!("failed to load classpath entry {}", entry.display()))?,
        );
    }
    Ok(classes)
}

fn scan_dir(path: &Path, classes: &mut Vec<Class>) -> Result<()> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(path)
        .with_context(|| format!("failed to read directory {}", path.display()))?
    {
        let entry =
            entry.with_context(|| format!("failed to read entry under {}", path.display()))?;
        entries.push(entry.path());
    }

    // Keep deterministic ordering regardless of directory listing order.
    entries.sort_by(|a, b| path_key(a).cmp(&path_key(b)));

    for entry in entries {
        if entry.is_dir() {
            scan_dir(&entry, classes)?;
        } else if entry.extension().and_then(|ext| ext.to_str()) == Some("json") {
            classes.extend(read_class_file(&entry)?);
        }
    }
    Ok(())
}

fn read_class_file(path: &Path) -> Result<Vec<Class>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let deserializer = &mut serde_json::Deserializer::from_reader(BufReader::new(file));
    let classes: Vec<Class> = serde_path_to_error::deserialize(deserializer)
        .with_context(|| format!("failed to parse classes in {}", path.display()))?;
    Ok(classes)
}

fn path_key(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_entries_load_in_path_order() {
        let dir = tempfile::tempdir().expect("temp dir");
        let nested = dir.path().join("b");
        fs::create_dir(&nested).expect("nested dir");
        fs::write(nested.join("second.json"), r#"[{"name": "p/Second"}]"#).expect("write");
        fs::write(
            dir.path().join("a.json"),
            r#"[{"name": "p/First"}, {"name": "p/Also"}]"#,
        )
        .expect("write");
        fs::write(dir.path().join("notes.txt"), "ignored").expect("write");

        let classes = load_classes(dir.path()).expect("load");

        let names: Vec<&str> = classes.iter().map(|class| class.name.as_str()).collect();
        assert_eq!(names, vec!["p/First", "p/Also", "p/Second"]);
    }

    #[test]
    fn parse_errors_name_the_offending_path() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("broken.json");
        fs::write(&path, r#"[{"name": "p/A", "fields": [{"name": 3}]}]"#).expect("write");

        let error = load_classes(&path).expect_err("invalid field name");

        let message = format!("{error:#}");
        assert!(message.contains("broken.json"), "{message}");
        assert!(message.contains("fields[0].name"), "{message}");
    }
}
