use std::borrow::Cow;
use std::collections::BTreeMap;

use tracing::warn;

/// Rewrites every class name embedded in a descriptor or generic signature.
///
/// Returns the input unchanged (borrowed) when nothing was renamed. Malformed signatures are
/// left as they are, since signatures are not checked by the verifier.
pub(crate) fn remap_signature<'s>(signature: &'s str, classes: &BTreeMap<String, String>) -> Cow<'s, str> {
    if classes.is_empty() {
        return Cow::Borrowed(signature);
    }
    let mut rewriter = Rewriter {
        input: signature,
        position: 0,
        output: String::with_capacity(signature.len()),
        changed: false,
        classes,
    };
    match rewriter.signature() {
        Some(()) if rewriter.changed => Cow::Owned(rewriter.output),
        Some(()) => Cow::Borrowed(signature),
        None => {
            warn!("leaving malformed signature unchanged: {signature}");
            Cow::Borrowed(signature)
        }
    }
}

/// Rewrites an internal name, or an array descriptor standing in for one.
pub(crate) fn remap_internal_name<'s>(name: &'s str, classes: &BTreeMap<String, String>) -> Cow<'s, str> {
    if name.starts_with('[') {
        return remap_signature(name, classes);
    }
    match classes.get(name) {
        Some(new_name) => Cow::Owned(new_name.clone()),
        None => Cow::Borrowed(name),
    }
}

struct Rewriter<'s, 'c> {
    input: &'s str,
    position: usize,
    output: String,
    changed: bool,
    classes: &'c BTreeMap<String, String>,
}

impl Rewriter<'_, '_> {
    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.position).copied()
    }

    fn copy(&mut self, len: usize) {
        self.output
            .push_str(&self.input[self.position..self.position + len]);
        self.position += len;
    }

    fn expect(&mut self, byte: u8) -> Option<()> {
        if self.peek()? != byte {
            return None;
        }
        self.copy(1);
        Some(())
    }

    /// Consumes up to (not including) the first of `stops`.
    fn identifier(&mut self, stops: &[u8]) -> Option<&'_ str> {
        let rest = &self.input.as_bytes()[self.position..];
        let len = rest.iter().position(|byte| stops.contains(byte))?;
        let start = self.position;
        self.position += len;
        Some(&self.input[start..start + len])
    }

    fn signature(&mut self) -> Option<()> {
        if self.peek() == Some(b'<') {
            self.formal_type_parameters()?;
        }
        while let Some(byte) = self.peek() {
            match byte {
                b'(' | b')' | b'^' => self.copy(1),
                _ => self.type_signature()?,
            }
        }
        Some(())
    }

    fn formal_type_parameters(&mut self) -> Option<()> {
        self.expect(b'<')?;
        while self.peek()? != b'>' {
            let name = self.identifier(b":")?.to_string();
            self.output.push_str(&name);
            self.expect(b':')?;
            if matches!(self.peek()?, b'L' | b'T' | b'[') {
                self.type_signature()?;
            }
            while self.peek()? == b':' {
                self.copy(1);
                self.type_signature()?;
            }
        }
        self.expect(b'>')
    }

    fn type_signature(&mut self) -> Option<()> {
        match self.peek()? {
            b'L' => self.class_type(),
            b'T' => {
                let variable = self.identifier(b";")?.to_string();
                self.output.push_str(&variable);
                self.expect(b';')
            }
            b'[' => {
                self.copy(1);
                self.type_signature()
            }
            b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b'V' => {
                self.copy(1);
                Some(())
            }
            _ => None,
        }
    }

    fn class_type(&mut self) -> Option<()> {
        self.expect(b'L')?;
        let old_name = self.identifier(b"<.;")?.to_string();
        let new_name = match self.classes.get(&old_name) {
            Some(new_name) => {
                self.changed = true;
                new_name.clone()
            }
            None => old_name.clone(),
        };
        self.output.push_str(&new_name);
        if self.peek()? == b'<' {
            self.type_arguments()?;
        }

        let mut old_outer = old_name;
        let mut new_outer = new_name;
        while self.peek()? == b'.' {
            self.copy(1);
            let inner = self.identifier(b"<.;")?.to_string();
            let old_binary = format!("{old_outer}${inner}");
            let new_binary = match self.classes.get(&old_binary) {
                Some(renamed) => renamed.clone(),
                None => format!("{new_outer}${inner}"),
            };
            let emitted = new_binary
                .strip_prefix(new_outer.as_str())
                .and_then(|rest| rest.strip_prefix('$'))
                .unwrap_or(&inner);
            if emitted != inner {
                self.changed = true;
            }
            self.output.push_str(emitted);
            if self.peek()? == b'<' {
                self.type_arguments()?;
            }
            old_outer = old_binary;
            new_outer = new_binary;
        }
        self.expect(b';')
    }

    fn type_arguments(&mut self) -> Option<()> {
        self.expect(b'<')?;
        loop {
            match self.peek()? {
                b'>' => break,
                b'*' => self.copy(1),
                b'+' | b'-' => {
                    self.copy(1);
                    self.type_signature()?;
                }
                _ => self.type_signature()?,
            }
        }
        self.expect(b'>')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renames(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(old, new)| (old.to_string(), new.to_string()))
            .collect()
    }

    #[test]
    fn generic_argument_is_renamed() {
        let classes = renames(&[("foo/Bar", "foo/Baz")]);

        let remapped = remap_signature("Ljava/util/List<Lfoo/Bar;>;", &classes);

        assert_eq!(remapped, "Ljava/util/List<Lfoo/Baz;>;");
    }

    #[test]
    fn untouched_signature_is_borrowed() {
        let classes = renames(&[("foo/Bar", "foo/Baz")]);
        let signature = "Ljava/util/Map<Ljava/lang/String;[I>;";

        let remapped = remap_signature(signature, &classes);

        match remapped {
            Cow::Borrowed(borrowed) => assert!(std::ptr::eq(borrowed, signature)),
            Cow::Owned(owned) => panic!("unexpected copy {owned}"),
        }
    }

    #[test]
    fn nested_arguments_and_wildcards_are_balanced() {
        let classes = renames(&[("foo/Bar", "x/Y")]);

        assert_eq!(
            remap_signature(
                "Ljava/util/Map<Lfoo/Bar;Ljava/util/List<[Lfoo/Bar;>;>;",
                &classes
            ),
            "Ljava/util/Map<Lx/Y;Ljava/util/List<[Lx/Y;>;>;"
        );
        assert_eq!(
            remap_signature("Ljava/util/List<+Lfoo/Bar;>;", &classes),
            "Ljava/util/List<+Lx/Y;>;"
        );
        assert_eq!(
            remap_signature("Ljava/util/Map<*-Lfoo/Bar;>;", &classes),
            "Ljava/util/Map<*-Lx/Y;>;"
        );
    }

    #[test]
    fn type_variables_and_formal_parameters_keep_their_names() {
        let classes = renames(&[("T", "Renamed"), ("L", "Other"), ("foo/Ex", "x/E")]);

        assert_eq!(
            remap_signature(
                "<T:Ljava/lang/Object;L::Ljava/lang/Comparable<TL;>;>(TT;LT;)TL;^Lfoo/Ex;^TT;",
                &classes
            ),
            "<T:Ljava/lang/Object;L::Ljava/lang/Comparable<TL;>;>(TT;LRenamed;)TL;^Lx/E;^TT;"
        );
    }

    #[test]
    fn class_signature_renames_super_types() {
        let classes = renames(&[("a/Base", "b/Base"), ("a/Api", "b/Api")]);

        assert_eq!(
            remap_signature("<E:La/Base;>La/Base;La/Api<TE;>;", &classes),
            "<E:Lb/Base;>Lb/Base;Lb/Api<TE;>;"
        );
    }

    #[test]
    fn inner_class_suffix_follows_renamed_binary_name() {
        let classes = renames(&[("foo/Outer", "a/O"), ("foo/Outer$Inner", "a/O$In")]);
        assert_eq!(
            remap_signature("Lfoo/Outer<TT;>.Inner<TT;>;", &classes),
            "La/O<TT;>.In<TT;>;"
        );

        let only_outer = renames(&[("foo/Outer", "a/O")]);
        assert_eq!(
            remap_signature("Lfoo/Outer<TT;>.Inner;", &only_outer),
            "La/O<TT;>.Inner;"
        );
    }

    #[test]
    fn method_descriptors_are_rewritten() {
        let classes = renames(&[("a/A", "b/B")]);

        assert_eq!(
            remap_signature("(I[La/A;J)La/A;", &classes),
            "(I[Lb/B;J)Lb/B;"
        );
    }

    #[test]
    fn malformed_signature_is_left_alone() {
        let classes = renames(&[("foo/Bar", "foo/Baz")]);

        assert_eq!(remap_signature("Lfoo/Bar", &classes), "Lfoo/Bar");
        assert_eq!(remap_signature("Ljava/util/List<Lfoo/Bar;", &classes), "Ljava/util/List<Lfoo/Bar;");
        assert_eq!(remap_signature("Q", &classes), "Q");
    }

    #[test]
    fn internal_names_and_array_descriptors() {
        let classes = renames(&[("a/A", "b/B")]);

        assert_eq!(remap_internal_name("a/A", &classes), "b/B");
        assert_eq!(remap_internal_name("[[La/A;", &classes), "[[Lb/B;");
        assert_eq!(remap_internal_name("a/C", &classes), "a/C");
    }
}
