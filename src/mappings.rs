use std::collections::BTreeMap;
use std::io::{BufRead, Write};

use anyhow::{Context, Result, bail};

use crate::remap::{Remapper, remap_internal_name, remap_signature};

/// One rename directive from a mapping file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum MappingRecord {
    Class {
        old: String,
        new: String,
    },
    Field {
        owner: String,
        descriptor: String,
        old: String,
        new: String,
    },
    Method {
        owner: String,
        descriptor: String,
        old: String,
        new: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct MappingEntry {
    /// 1-based line the record was read from, `0` for records added after parsing.
    pub(crate) line: usize,
    pub(crate) record: MappingRecord,
}

/// Tiny v1 mapping file contents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct MappingSet {
    pub(crate) source_namespace: String,
    pub(crate) target_namespace: String,
    pub(crate) entries: Vec<MappingEntry>,
}

impl MappingSet {
    pub(crate) fn parse_tiny_v1(reader: impl BufRead) -> Result<Self> {
        let mut header = None;
        let mut entries = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let number = index + 1;
            let line = line.with_context(|| format!("failed to read mapping line {number}"))?;
            // `#` starts a comment anywhere on the line
            let content = line.split('#').next().unwrap_or_default();
            let trimmed = content.trim();
            if trimmed.is_empty() {
                continue;
            }
            let columns: Vec<&str> = trimmed.split_whitespace().collect();
            if header.is_none() {
                if columns.len() != 3 || columns[0] != "v1" {
                    bail!("line {number}: expected header `v1 <from> <to>`, found `{trimmed}`");
                }
                header = Some((columns[1].to_string(), columns[2].to_string()));
                continue;
            }
            let record = parse_record(&columns)
                .with_context(|| format!("line {number}: invalid record `{trimmed}`"))?;
            entries.push(MappingEntry {
                line: number,
                record,
            });
        }
        let Some((source_namespace, target_namespace)) = header else {
            bail!("mapping file has no `v1` header");
        };
        Ok(Self {
            source_namespace,
            target_namespace,
            entries,
        })
    }

    /// Mappings in the opposite direction.
    ///
    /// Member owners and descriptors are translated into the target namespace so that the
    /// reversed set can be applied to already renamed classes.
    pub(crate) fn reversed(&self) -> Self {
        let classes: BTreeMap<String, String> = self
            .entries
            .iter()
            .filter_map(|entry| match &entry.record {
                MappingRecord::Class { old, new } => Some((old.clone(), new.clone())),
                _ => None,
            })
            .collect();
        let forward = |name: &str| remap_internal_name(name, &classes).into_owned();
        let forward_descriptor = |descriptor: &str| remap_signature(descriptor, &classes).into_owned();

        let entries = self
            .entries
            .iter()
            .map(|entry| {
                let record = match &entry.record {
                    MappingRecord::Class { old, new } => MappingRecord::Class {
                        old: new.clone(),
                        new: old.clone(),
                    },
                    MappingRecord::Field {
                        owner,
                        descriptor,
                        old,
                        new,
                    } => MappingRecord::Field {
                        owner: forward(owner),
                        descriptor: forward_descriptor(descriptor),
                        old: new.clone(),
                        new: old.clone(),
                    },
                    MappingRecord::Method {
                        owner,
                        descriptor,
                        old,
                        new,
                    } => MappingRecord::Method {
                        owner: forward(owner),
                        descriptor: forward_descriptor(descriptor),
                        old: new.clone(),
                        new: old.clone(),
                    },
                };
                MappingEntry {
                    line: entry.line,
                    record,
                }
            })
            .collect();
        Self {
            source_namespace: self.target_namespace.clone(),
            target_namespace: self.source_namespace.clone(),
            entries,
        }
    }

    /// Appends class renames that were derived rather than read, such as inner classes following
    /// their outer class.
    pub(crate) fn extend_classes<'a>(&mut self, renames: impl IntoIterator<Item = (&'a String, &'a String)>) {
        self.entries.extend(renames.into_iter().map(|(old, new)| MappingEntry {
            line: 0,
            record: MappingRecord::Class {
                old: old.clone(),
                new: new.clone(),
            },
        }));
    }

    /// Class records whose source name is not one of `known`.
    pub(crate) fn unmatched_classes<'s>(&'s self, known: impl Fn(&str) -> bool) -> Vec<&'s str> {
        self.entries
            .iter()
            .filter_map(|entry| match &entry.record {
                MappingRecord::Class { old, .. } if !known(old) => Some(old.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Registers every record with the remapper, stopping at the first conflict.
    pub(crate) fn apply(&self, remapper: &mut Remapper) -> Result<()> {
        for entry in &self.entries {
            match &entry.record {
                MappingRecord::Class { old, new } => remapper.register_class_rename(old, new),
                MappingRecord::Field {
                    owner,
                    descriptor,
                    old,
                    new,
                } => remapper.register_field_rename(owner, descriptor, old, new),
                MappingRecord::Method {
                    owner,
                    descriptor,
                    old,
                    new,
                } => remapper
                    .register_method_rename(owner, descriptor, old, new)
                    .with_context(|| format!("mapping line {}", entry.line))?,
            }
        }
        Ok(())
    }

    pub(crate) fn write_tiny_v1(&self, mut writer: impl Write) -> Result<()> {
        writeln!(writer, "v1\t{}\t{}", self.source_namespace, self.target_namespace)?;
        for entry in &self.entries {
            let columns: Vec<&str> = match &entry.record {
                MappingRecord::Class { old, new } => vec!["CLASS", old.as_str(), new.as_str()],
                MappingRecord::Field {
                    owner,
                    descriptor,
                    old,
                    new,
                } => vec!["FIELD", owner.as_str(), descriptor.as_str(), old.as_str(), new.as_str()],
                MappingRecord::Method {
                    owner,
                    descriptor,
                    old,
                    new,
                } => vec!["METHOD", owner.as_str(), descriptor.as_str(), old.as_str(), new.as_str()],
            };
            writeln!(writer, "{}", columns.join("\t"))?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn parse_record(columns: &[&str]) -> Result<MappingRecord> {
    let kind = columns[0].to_ascii_uppercase();
    let expected = match kind.as_str() {
        "CLASS" => 3,
        "FIELD" | "METHOD" => 5,
        _ => bail!("unknown record kind {}", columns[0]),
    };
    if columns.len() != expected {
        bail!(
            "{kind} records take {expected} columns, found {}",
            columns.len()
        );
    }
    let owned = |index: usize| columns[index].to_string();
    let record = match kind.as_str() {
        "CLASS" => MappingRecord::Class {
            old: owned(1),
            new: owned(2),
        },
        "FIELD" => MappingRecord::Field {
            owner: owned(1),
            descriptor: owned(2),
            old: owned(3),
            new: owned(4),
        },
        _ => MappingRecord::Method {
            owner: owned(1),
            descriptor: owned(2),
            old: owned(3),
            new: owned(4),
        },
    };
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Class;

    const SAMPLE: &str = "\
# obfuscated to named
v1\tofficial\tnamed
CLASS\ta\tcom/example/Widget
field\ta\tLa;\tb\tparent
METHOD\ta\t(La;)V\tc\tattach

";

    #[test]
    fn parses_records_and_skips_comments() {
        let set = MappingSet::parse_tiny_v1(SAMPLE.as_bytes()).expect("parse");

        assert_eq!(set.source_namespace, "official");
        assert_eq!(set.target_namespace, "named");
        assert_eq!(set.entries.len(), 3);
        assert_eq!(set.entries[1].line, 4);
        assert_eq!(
            set.entries[1].record,
            MappingRecord::Field {
                owner: "a".to_string(),
                descriptor: "La;".to_string(),
                old: "b".to_string(),
                new: "parent".to_string(),
            }
        );
    }

    #[test]
    fn trailing_comments_are_ignored() {
        let text = "v1\tofficial\tnamed # header\nCLASS\ta\tcom/example/Widget\t# the widget\n";

        let set = MappingSet::parse_tiny_v1(text.as_bytes()).expect("parse");

        assert_eq!(set.target_namespace, "named");
        assert_eq!(
            set.entries[0].record,
            MappingRecord::Class {
                old: "a".to_string(),
                new: "com/example/Widget".to_string(),
            }
        );
    }

    #[test]
    fn derived_class_renames_are_appended_and_unmatched_classes_reported() {
        let mut set = MappingSet::parse_tiny_v1(SAMPLE.as_bytes()).expect("parse");
        let derived = BTreeMap::from([("a$1".to_string(), "com/example/Widget$1".to_string())]);

        set.extend_classes(&derived);

        let last = set.entries.last().expect("derived entry");
        assert_eq!(last.line, 0);
        assert_eq!(
            last.record,
            MappingRecord::Class {
                old: "a$1".to_string(),
                new: "com/example/Widget$1".to_string(),
            }
        );
        assert_eq!(set.unmatched_classes(|name| name == "a"), vec!["a$1"]);
        assert!(set.unmatched_classes(|_| true).is_empty());
    }

    #[test]
    fn malformed_lines_name_their_line_number() {
        let missing_header = MappingSet::parse_tiny_v1("CLASS a b\n".as_bytes()).expect_err("header");
        assert!(format!("{missing_header:#}").contains("line 1"));

        let short = MappingSet::parse_tiny_v1("v1 a b\nFIELD x I y\n".as_bytes()).expect_err("columns");
        assert!(format!("{short:#}").contains("line 2"));

        let unknown = MappingSet::parse_tiny_v1("v1 a b\n\nPACKAGE x y\n".as_bytes()).expect_err("kind");
        let message = format!("{unknown:#}");
        assert!(message.contains("line 3"), "{message}");
        assert!(message.contains("unknown record kind PACKAGE"), "{message}");

        let empty = MappingSet::parse_tiny_v1("# nothing\n".as_bytes()).expect_err("empty");
        assert!(format!("{empty:#}").contains("no `v1` header"));
    }

    #[test]
    fn reversed_set_translates_owners_into_target_names() {
        let set = MappingSet::parse_tiny_v1(SAMPLE.as_bytes()).expect("parse");

        let reversed = set.reversed();

        assert_eq!(reversed.source_namespace, "named");
        assert_eq!(
            reversed.entries[0].record,
            MappingRecord::Class {
                old: "com/example/Widget".to_string(),
                new: "a".to_string(),
            }
        );
        assert_eq!(
            reversed.entries[2].record,
            MappingRecord::Method {
                owner: "com/example/Widget".to_string(),
                descriptor: "(Lcom/example/Widget;)V".to_string(),
                old: "attach".to_string(),
                new: "c".to_string(),
            }
        );
    }

    #[test]
    fn written_mappings_parse_back_identically() {
        let set = MappingSet::parse_tiny_v1(SAMPLE.as_bytes()).expect("parse");
        let mut buffer = Vec::new();

        set.write_tiny_v1(&mut buffer).expect("write");

        let text = String::from_utf8(buffer).expect("utf8");
        assert!(text.starts_with("v1\tofficial\tnamed\nCLASS\ta\tcom/example/Widget\n"));
        let reparsed = MappingSet::parse_tiny_v1(text.as_bytes()).expect("reparse");
        let records: Vec<_> = reparsed.entries.into_iter().map(|entry| entry.record).collect();
        let expected: Vec<_> = set.entries.into_iter().map(|entry| entry.record).collect();
        assert_eq!(records, expected);
    }

    #[test]
    fn conflicting_method_records_abort_apply() {
        let text = "v1 a b\nMETHOD p/A ()V m x\nMETHOD p/A ()V m y\n";
        let set = MappingSet::parse_tiny_v1(text.as_bytes()).expect("parse");
        let mut remapper = Remapper::new();

        let error = set.apply(&mut remapper).expect_err("conflict");

        let message = format!("{error:#}");
        assert!(message.contains("mapping line 3"), "{message}");
        assert!(message.contains("conflicting mapping"), "{message}");
    }

    #[test]
    fn applied_mappings_rename_registered_classes() {
        let set = MappingSet::parse_tiny_v1(SAMPLE.as_bytes()).expect("parse");
        let mut remapper = Remapper::new();
        remapper
            .add_target(Class {
                version: 61,
                name: "a".to_string(),
                super_name: Some("java/lang/Object".to_string()),
                ..Class::default()
            })
            .expect("target");

        set.apply(&mut remapper).expect("apply");
        remapper.process().expect("process");

        assert!(remapper.targets().contains("com/example/Widget"));
    }
}
