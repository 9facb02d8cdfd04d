use anyhow::{Context, Result};

/// Computational type category of a value (JVMS §2.11.1).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Category {
    One,
    Two,
}

/// Category of a field descriptor; longs and doubles take two words.
pub(crate) fn category(descriptor: &str) -> Category {
    match descriptor.as_bytes().first() {
        Some(b'J' | b'D') => Category::Two,
        _ => Category::One,
    }
}

/// End offset (exclusive) of the field type starting at `start`.
pub(crate) fn field_type_end(descriptor: &str, start: usize) -> Option<usize> {
    let bytes = descriptor.as_bytes();
    let mut index = start;
    while bytes.get(index) == Some(&b'[') {
        index += 1;
    }
    match bytes.get(index)? {
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' => Some(index + 1),
        b'L' => descriptor[index..].find(';').map(|end| index + end + 1),
        _ => None,
    }
}

/// Splits a method descriptor into its parameter types and return type.
pub(crate) fn split_method_descriptor(descriptor: &str) -> Result<(Vec<&str>, &str)> {
    split(descriptor).with_context(|| format!("parse method descriptor {descriptor}"))
}

fn split(descriptor: &str) -> Result<(Vec<&str>, &str)> {
    let close = match descriptor.strip_prefix('(') {
        Some(rest) => rest.find(')').map(|index| index + 1),
        None => anyhow::bail!("missing '('"),
    }
    .context("missing ')'")?;
    let mut parameters = Vec::new();
    let mut index = 1;
    while index < close {
        let end = field_type_end(descriptor, index)
            .filter(|end| *end <= close)
            .with_context(|| format!("bad parameter type at offset {index}"))?;
        parameters.push(&descriptor[index..end]);
        index = end;
    }
    let return_type = &descriptor[close + 1..];
    if return_type != "V" && field_type_end(return_type, 0) != Some(return_type.len()) {
        anyhow::bail!("bad return type {return_type}");
    }
    Ok((parameters, return_type))
}

/// Internal name of the class returned by a method, if it returns a non-array object.
pub(crate) fn returned_class(descriptor: &str) -> Option<&str> {
    let close = descriptor.rfind(')')?;
    internal_name(&descriptor[close + 1..])
}

/// Internal name of an object field descriptor (`Lfoo/Bar;` -> `foo/Bar`).
pub(crate) fn internal_name(descriptor: &str) -> Option<&str> {
    descriptor.strip_prefix('L')?.strip_suffix(';')
}

/// Field descriptor for an internal name or array descriptor.
pub(crate) fn object_descriptor(name: &str) -> String {
    if name.starts_with('[') {
        name.to_string()
    } else {
        format!("L{name};")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_method_descriptor_handles_arrays_and_objects() {
        let (parameters, return_type) =
            split_method_descriptor("(I[JLjava/lang/String;[[Lfoo/Bar;D)V").expect("split");
        assert_eq!(
            parameters,
            vec!["I", "[J", "Ljava/lang/String;", "[[Lfoo/Bar;", "D"]
        );
        assert_eq!(return_type, "V");
    }

    #[test]
    fn split_method_descriptor_rejects_garbage() {
        let error = split_method_descriptor("(Q)V").expect_err("bad descriptor");
        assert!(format!("{error:#}").contains("parse method descriptor (Q)V"));
        assert!(split_method_descriptor("I").is_err());
        assert!(split_method_descriptor("(I)").is_err());
        assert!(split_method_descriptor("(Ljava/lang/String)V").is_err());
    }

    #[test]
    fn returned_class_skips_primitives_and_arrays() {
        assert_eq!(returned_class("()Ljava/util/List;"), Some("java/util/List"));
        assert_eq!(returned_class("()[Ljava/util/List;"), None);
        assert_eq!(returned_class("(Ljava/lang/String;)I"), None);
    }

    #[test]
    fn category_of_wide_types_is_two() {
        assert_eq!(category("J"), Category::Two);
        assert_eq!(category("D"), Category::Two);
        assert_eq!(category("[J"), Category::One);
        assert_eq!(category("Ljava/lang/Long;"), Category::One);
    }
}
