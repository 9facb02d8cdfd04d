//! Bulk renaming of classes, fields and methods across a registered class set.
//!
//! Renames are collected first and applied in a single [`Remapper::process`] pass. Field renames
//! follow the class hierarchy according to field visibility; method renames apply only to the
//! exact member they were registered for.

mod signature;
mod tables;

use std::borrow::Cow;
use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::classpath::ClassPool;
use crate::descriptor;
use crate::error::Error;
use crate::hierarchy::{descendants, subclass_index};
use crate::ir::{
    Annotation, AnnotationValue, Class, Constant, Field, Frame, FrameValue, Handle, Instruction,
    Method, flags, package_of,
};

pub(crate) use signature::{remap_internal_name, remap_signature};
pub(crate) use tables::MemberTable;

/// Collects rename directives and rewrites the registered classes in place.
#[derive(Debug, Default)]
pub(crate) struct Remapper {
    targets: ClassPool,
    classes: BTreeMap<String, String>,
    fields: MemberTable,
    methods: MemberTable,
    hierarchised_fields: MemberTable,
    hierarchy_stale: bool,
}

impl Remapper {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_target(&mut self, class: Class) -> Result<(), Error> {
        self.targets.insert(class)?;
        self.hierarchy_stale = true;
        Ok(())
    }

    pub(crate) fn add_targets(&mut self, classes: impl IntoIterator<Item = Class>) -> Result<(), Error> {
        for class in classes {
            self.add_target(class)?;
        }
        Ok(())
    }

    pub(crate) fn targets(&self) -> &ClassPool {
        &self.targets
    }

    pub(crate) fn into_targets(self) -> ClassPool {
        self.targets
    }

    pub(crate) fn register_class_rename(&mut self, old: &str, new: &str) {
        self.classes.insert(old.to_string(), new.to_string());
    }

    pub(crate) fn register_field_rename(&mut self, owner: &str, descriptor: &str, old: &str, new: &str) {
        self.fields.insert(owner, descriptor, old, new);
        self.hierarchy_stale = true;
    }

    /// Registers a method rename for exactly this owner and descriptor.
    ///
    /// Overriding declarations are not renamed along with it; register each one explicitly.
    pub(crate) fn register_method_rename(
        &mut self,
        owner: &str,
        descriptor: &str,
        old: &str,
        new: &str,
    ) -> Result<(), Error> {
        self.methods.insert_unique(owner, descriptor, old, new)
    }

    /// Moves inner classes along with their renamed outer class.
    ///
    /// A registered `Outer$Inner` without a rename of its own is renamed to `NewOuter$Inner` when
    /// `Outer` is renamed; this repeats until nested inner classes are covered too. Collisions are
    /// not checked. Returns every rename added.
    pub(crate) fn fix_inner_class_names(&mut self) -> BTreeMap<String, String> {
        let mut outer_to_inner: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for class in self.targets.classes() {
            if let Some(separator) = class.name.rfind('$') {
                outer_to_inner
                    .entry(class.name[..separator].to_string())
                    .or_default()
                    .push(class.name.clone());
            }
        }

        let mut added = BTreeMap::new();
        loop {
            let mut round = BTreeMap::new();
            for (old_outer, new_outer) in &self.classes {
                let Some(inner_classes) = outer_to_inner.remove(old_outer) else {
                    continue;
                };
                for inner in inner_classes {
                    if self.classes.contains_key(&inner) {
                        continue;
                    }
                    if let Some(separator) = inner.rfind('$') {
                        let renamed = format!("{new_outer}{}", &inner[separator..]);
                        round.insert(inner, renamed);
                    }
                }
            }
            if round.is_empty() {
                break;
            }
            for (old, new) in round {
                debug!("inner class {old} follows its outer class to {new}");
                self.classes.insert(old.clone(), new.clone());
                added.insert(old, new);
            }
        }
        added
    }

    /// Rewrites every registered class and consumes all registered renames.
    ///
    /// Fails only if two classes end up sharing a name.
    pub(crate) fn process(&mut self) -> Result<(), Error> {
        self.refresh_field_hierarchy();
        let context = RenameContext {
            classes: &self.classes,
            fields: &self.hierarchised_fields,
            methods: &self.methods,
        };
        for class in self.targets.classes_mut() {
            context.remap_class(class);
        }
        info!(
            "remapped {} classes ({} class, {} field, {} method renames)",
            self.targets.len(),
            self.classes.len(),
            self.fields.len(),
            self.methods.len()
        );

        self.classes.clear();
        self.fields.clear();
        self.methods.clear();
        self.hierarchised_fields.clear();
        self.hierarchy_stale = false;
        self.targets.reindex()
    }

    fn refresh_field_hierarchy(&mut self) {
        if !self.hierarchy_stale {
            return;
        }
        let children = subclass_index(self.targets.classes());
        let mut table = MemberTable::default();
        for class in self.targets.classes() {
            for field in &class.fields {
                let Some(new_name) = self.fields.get(&class.name, &field.descriptor, &field.name) else {
                    continue;
                };
                if field.access & flags::ACC_PRIVATE != 0 {
                    continue;
                }
                let inherited_everywhere = field.access & (flags::ACC_PUBLIC | flags::ACC_PROTECTED) != 0;
                for child in descendants(&children, &class.name) {
                    if inherited_everywhere || package_of(&child) == class.package() {
                        table.insert(&child, &field.descriptor, &field.name, new_name);
                    }
                }
            }
        }
        // explicit renames override inherited ones
        for (owner, descriptor, name, new_name) in self.fields.iter() {
            table.insert(owner, descriptor, name, new_name);
        }
        debug!("rebuilt hierarchised field renames: {} entries", table.len());
        self.hierarchised_fields = table;
        self.hierarchy_stale = false;
    }
}

/// Maintenance and lookups for passes that compose their own rewrites on top of the registered
/// renames.
#[allow(dead_code)]
impl Remapper {
    pub(crate) fn remove_target(&mut self, name: &str) -> Option<Class> {
        let removed = self.targets.remove(name)?;
        self.hierarchy_stale = true;
        Some(removed)
    }

    pub(crate) fn remove_method_rename(&mut self, owner: &str, descriptor: &str, name: &str) -> Option<String> {
        self.methods.remove(owner, descriptor, name)
    }

    pub(crate) fn clear_targets(&mut self) {
        self.targets.clear();
        self.hierarchy_stale = true;
    }

    pub(crate) fn remapped_class_name(&self, name: &str) -> Option<&str> {
        self.classes.get(name).map(String::as_str)
    }

    /// New name of a field as seen through `owner`, including renames inherited from supertypes.
    pub(crate) fn remapped_field_name(&mut self, owner: &str, descriptor: &str, name: &str) -> Option<&str> {
        self.refresh_field_hierarchy();
        self.hierarchised_fields.get(owner, descriptor, name)
    }

    pub(crate) fn remapped_method_name(&self, owner: &str, descriptor: &str, name: &str) -> Option<&str> {
        self.methods.get(owner, descriptor, name)
    }

    pub(crate) fn remapped_field_descriptor<'d>(&self, descriptor: &'d str) -> Cow<'d, str> {
        remap_signature(descriptor, &self.classes)
    }

    pub(crate) fn remapped_method_descriptor<'d>(&self, descriptor: &'d str) -> Cow<'d, str> {
        remap_signature(descriptor, &self.classes)
    }

    pub(crate) fn remapped_signature<'s>(&self, signature: &'s str) -> Cow<'s, str> {
        remap_signature(signature, &self.classes)
    }
}

struct RenameContext<'t> {
    classes: &'t BTreeMap<String, String>,
    fields: &'t MemberTable,
    methods: &'t MemberTable,
}

impl RenameContext<'_> {
    fn remap_class(&self, class: &mut Class) {
        // self references resolve against the old name, so the name itself goes last
        let owner = class.name.clone();

        for field in &mut class.fields {
            self.remap_field(&owner, field);
        }
        let renamed_self = self.classes.get(&owner);
        for inner in &mut class.inner_classes {
            let renamed = self.classes.get(&inner.name);
            if let (Some(renamed), Some(inner_name)) = (renamed, inner.inner_name.as_mut()) {
                // a rename out of the nesting keeps the simple name after the package
                let separator = renamed.rfind('$').or_else(|| renamed.rfind('/'));
                let simple = separator.map_or(renamed.as_str(), |separator| &renamed[separator + 1..]);
                *inner_name = simple.to_string();
            }
            self.rename_class_ref(&mut inner.name);
            if let Some(outer_name) = &mut inner.outer_name {
                self.rename_class_ref(outer_name);
            }
        }
        for interface in &mut class.interfaces {
            self.rename_class_ref(interface);
        }
        self.remap_annotations(&mut class.annotations);
        self.remap_annotations(&mut class.type_annotations);
        for method in &mut class.methods {
            self.remap_method(&owner, method);
        }
        if let Some(module) = &mut class.module {
            if let Some(main_class) = &mut module.main_class {
                self.rename_class_ref(main_class);
            }
            for service in &mut module.uses {
                self.rename_class_ref(service);
            }
            for provide in &mut module.provides {
                self.rename_class_ref(&mut provide.service);
                for provider in &mut provide.providers {
                    self.rename_class_ref(provider);
                }
            }
        }
        if let Some(nest_host) = &mut class.nest_host {
            self.rename_class_ref(nest_host);
        }
        for member in &mut class.nest_members {
            self.rename_class_ref(member);
        }
        if let (Some(outer_class), Some(outer_method), Some(outer_descriptor)) = (
            class.outer_class.as_ref(),
            class.outer_method.as_mut(),
            class.outer_method_descriptor.as_ref(),
        ) {
            if let Some(new_name) = self.methods.get(outer_class, outer_descriptor, outer_method) {
                *outer_method = new_name.to_string();
            }
        }
        if let Some(outer_descriptor) = &mut class.outer_method_descriptor {
            self.rename_in_signature(outer_descriptor);
        }
        if let Some(outer_class) = &mut class.outer_class {
            self.rename_class_ref(outer_class);
        }
        for permitted in &mut class.permitted_subclasses {
            self.rename_class_ref(permitted);
        }
        for component in &mut class.record_components {
            if let Some(new_name) = self.fields.get(&owner, &component.descriptor, &component.name) {
                component.name = new_name.to_string();
            }
            self.rename_in_signature(&mut component.descriptor);
            if let Some(signature) = &mut component.signature {
                self.rename_in_signature(signature);
            }
            self.remap_annotations(&mut component.annotations);
            self.remap_annotations(&mut component.type_annotations);
        }
        if let Some(signature) = &mut class.signature {
            self.rename_in_signature(signature);
        }
        if let Some(super_name) = &mut class.super_name {
            self.rename_class_ref(super_name);
        }
        if let Some(renamed) = renamed_self {
            debug!("renaming class {owner} to {renamed}");
            class.name = renamed.clone();
        }
    }

    fn remap_field(&self, owner: &str, field: &mut Field) {
        if let Some(new_name) = self.fields.get(owner, &field.descriptor, &field.name) {
            field.name = new_name.to_string();
        }
        self.rename_in_signature(&mut field.descriptor);
        if let Some(signature) = &mut field.signature {
            self.rename_in_signature(signature);
        }
        if let Some(value) = &mut field.value {
            self.remap_constant(value);
        }
        self.remap_annotations(&mut field.annotations);
        self.remap_annotations(&mut field.type_annotations);
    }

    fn remap_method(&self, owner: &str, method: &mut Method) {
        if let Some(new_name) = self.methods.get(owner, &method.descriptor, &method.name) {
            method.name = new_name.to_string();
        }
        for exception in &mut method.exceptions {
            self.rename_class_ref(exception);
        }
        for local in &mut method.local_variables {
            self.rename_in_signature(&mut local.descriptor);
            if let Some(signature) = &mut local.signature {
                self.rename_in_signature(signature);
            }
        }
        for block in &mut method.try_catch_blocks {
            if let Some(exception_type) = &mut block.exception_type {
                self.rename_class_ref(exception_type);
            }
        }
        self.remap_annotations(&mut method.annotations);
        self.remap_annotations(&mut method.type_annotations);
        for parameter in &mut method.parameter_annotations {
            self.remap_annotations(parameter);
        }
        if let Some(default) = &mut method.annotation_default {
            self.remap_annotation_value(default);
        }
        for instruction in &mut method.instructions {
            self.remap_instruction(instruction);
        }
        self.rename_in_signature(&mut method.descriptor);
        if let Some(signature) = &mut method.signature {
            self.rename_in_signature(signature);
        }
    }

    fn remap_instruction(&self, instruction: &mut Instruction) {
        match instruction {
            Instruction::Field {
                owner,
                name,
                descriptor,
                ..
            } => {
                if let Some(new_name) = self.fields.get(owner, descriptor, name) {
                    *name = new_name.to_string();
                }
                self.rename_class_ref(owner);
                self.rename_in_signature(descriptor);
            }
            Instruction::Method {
                owner,
                name,
                descriptor,
                ..
            } => {
                // array receivers only carry Object's methods
                if !owner.starts_with('[') {
                    if let Some(new_name) = self.methods.get(owner, descriptor, name) {
                        *name = new_name.to_string();
                    }
                }
                self.rename_class_ref(owner);
                self.rename_in_signature(descriptor);
            }
            Instruction::InvokeDynamic {
                descriptor,
                bootstrap,
                bootstrap_args,
                ..
            } => {
                self.remap_handle(bootstrap);
                for argument in bootstrap_args {
                    self.remap_constant(argument);
                }
                self.rename_in_signature(descriptor);
            }
            Instruction::Ldc { value } => self.remap_constant(value),
            Instruction::Type { descriptor, .. } => self.rename_class_ref(descriptor),
            Instruction::MultiANewArray { descriptor, .. } => self.rename_in_signature(descriptor),
            Instruction::Frame { frame } => self.remap_frame(frame),
            Instruction::Insn { .. }
            | Instruction::Int { .. }
            | Instruction::Var { .. }
            | Instruction::Jump { .. }
            | Instruction::Label { .. }
            | Instruction::Iinc { .. }
            | Instruction::TableSwitch { .. }
            | Instruction::LookupSwitch { .. }
            | Instruction::LineNumber { .. } => {}
        }
    }

    fn remap_frame(&self, frame: &mut Frame) {
        let values: Vec<&mut FrameValue> = match frame {
            Frame::Same | Frame::Chop { .. } => Vec::new(),
            Frame::Same1 { stack } => vec![stack],
            Frame::Append { locals } => locals.iter_mut().collect(),
            Frame::Full { locals, stack } => locals.iter_mut().chain(stack.iter_mut()).collect(),
        };
        for value in values {
            if let FrameValue::Object(name) = value {
                self.rename_class_ref(name);
            }
        }
    }

    fn remap_handle(&self, handle: &mut Handle) {
        let table = if handle.is_field_reference() {
            self.fields
        } else {
            self.methods
        };
        if let Some(new_name) = table.get(&handle.owner, &handle.descriptor, &handle.name) {
            handle.name = new_name.to_string();
        }
        self.rename_class_ref(&mut handle.owner);
        self.rename_in_signature(&mut handle.descriptor);
    }

    fn remap_constant(&self, constant: &mut Constant) {
        match constant {
            Constant::Type(name) => self.rename_class_ref(name),
            Constant::MethodType(descriptor) => self.rename_in_signature(descriptor),
            Constant::Handle(handle) => self.remap_handle(handle),
            Constant::Dynamic(dynamic) => {
                self.remap_handle(&mut dynamic.bootstrap);
                for argument in &mut dynamic.bootstrap_args {
                    self.remap_constant(argument);
                }
                self.rename_in_signature(&mut dynamic.descriptor);
            }
            Constant::Int(_)
            | Constant::Float(_)
            | Constant::Long(_)
            | Constant::Double(_)
            | Constant::String(_) => {}
        }
    }

    fn remap_annotations(&self, annotations: &mut [Annotation]) {
        for annotation in annotations {
            self.remap_annotation(annotation);
        }
    }

    fn remap_annotation(&self, annotation: &mut Annotation) {
        self.rename_in_signature(&mut annotation.descriptor);
        for element in &mut annotation.values {
            self.remap_annotation_value(&mut element.value);
        }
    }

    fn remap_annotation_value(&self, value: &mut AnnotationValue) {
        match value {
            AnnotationValue::Class(descriptor) => self.rename_in_signature(descriptor),
            AnnotationValue::Enum { descriptor, name } => {
                if let Some(owner) = descriptor::internal_name(descriptor) {
                    if let Some(new_name) = self.fields.get(owner, descriptor, name) {
                        *name = new_name.to_string();
                    }
                }
                self.rename_in_signature(descriptor);
            }
            AnnotationValue::Annotation(nested) => self.remap_annotation(nested),
            AnnotationValue::Array(values) => {
                for value in values {
                    self.remap_annotation_value(value);
                }
            }
            AnnotationValue::Boolean(_)
            | AnnotationValue::Byte(_)
            | AnnotationValue::Char(_)
            | AnnotationValue::Short(_)
            | AnnotationValue::Int(_)
            | AnnotationValue::Long(_)
            | AnnotationValue::Float(_)
            | AnnotationValue::Double(_)
            | AnnotationValue::String(_) => {}
        }
    }

    fn rename_class_ref(&self, name: &mut String) {
        let renamed = match remap_internal_name(name, self.classes) {
            Cow::Owned(renamed) => Some(renamed),
            Cow::Borrowed(_) => None,
        };
        if let Some(renamed) = renamed {
            *name = renamed;
        }
    }

    fn rename_in_signature(&self, signature: &mut String) {
        let renamed = match remap_signature(signature, self.classes) {
            Cow::Owned(renamed) => Some(renamed),
            Cow::Borrowed(_) => None,
        };
        if let Some(renamed) = renamed {
            *signature = renamed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{InnerClass, LabelId, ModuleProvide, RecordComponent, TryCatchBlock};
    use crate::opcodes;

    fn class(name: &str, super_name: &str) -> Class {
        Class {
            version: 61,
            access: flags::ACC_PUBLIC,
            name: name.to_string(),
            super_name: Some(super_name.to_string()),
            ..Class::default()
        }
    }

    fn field(access: u16, name: &str, descriptor: &str) -> Field {
        Field {
            access,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            signature: None,
            value: None,
            annotations: Vec::new(),
            type_annotations: Vec::new(),
        }
    }

    fn method(name: &str, descriptor: &str, instructions: Vec<Instruction>) -> Method {
        Method {
            access: flags::ACC_PUBLIC,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            instructions,
            ..Method::default()
        }
    }

    fn hierarchy(access: u16, leaf: &str) -> Remapper {
        let mut base = class("p/Base", "java/lang/Object");
        base.fields.push(field(access, "f", "I"));
        let mut remapper = Remapper::new();
        remapper
            .add_targets([base, class("p/Mid", "p/Base"), class(leaf, "p/Mid")])
            .expect("targets");
        remapper.register_field_rename("p/Base", "I", "f", "renamed");
        remapper
    }

    #[test]
    fn public_field_rename_reaches_every_subclass() {
        let mut remapper = hierarchy(flags::ACC_PUBLIC, "q/Leaf");

        assert_eq!(remapper.remapped_field_name("p/Base", "I", "f"), Some("renamed"));
        assert_eq!(remapper.remapped_field_name("p/Mid", "I", "f"), Some("renamed"));
        assert_eq!(remapper.remapped_field_name("q/Leaf", "I", "f"), Some("renamed"));
    }

    #[test]
    fn package_private_field_rename_stays_in_package() {
        let mut remapper = hierarchy(0, "q/Leaf");

        assert_eq!(remapper.remapped_field_name("p/Mid", "I", "f"), Some("renamed"));
        assert_eq!(remapper.remapped_field_name("q/Leaf", "I", "f"), None);
    }

    #[test]
    fn private_field_rename_is_not_inherited() {
        let mut remapper = hierarchy(flags::ACC_PRIVATE, "p/Leaf");

        assert_eq!(remapper.remapped_field_name("p/Base", "I", "f"), Some("renamed"));
        assert_eq!(remapper.remapped_field_name("p/Mid", "I", "f"), None);
    }

    #[test]
    fn hierarchised_table_is_rebuilt_after_new_registrations() {
        let mut remapper = hierarchy(flags::ACC_PUBLIC, "p/Leaf");
        assert_eq!(remapper.remapped_field_name("p/Leaf", "I", "f"), Some("renamed"));

        remapper.register_field_rename("p/Base", "I", "f", "again");
        assert_eq!(remapper.remapped_field_name("p/Leaf", "I", "f"), Some("again"));

        remapper.remove_target("p/Mid");
        assert_eq!(remapper.remapped_field_name("p/Leaf", "I", "f"), None);
    }

    #[test]
    fn explicit_field_rename_wins_over_inherited_one() {
        let mut remapper = hierarchy(flags::ACC_PUBLIC, "p/Leaf");
        remapper.register_field_rename("p/Mid", "I", "f", "own");

        assert_eq!(remapper.remapped_field_name("p/Mid", "I", "f"), Some("own"));
        assert_eq!(remapper.remapped_field_name("p/Leaf", "I", "f"), Some("renamed"));
    }

    #[test]
    fn conflicting_method_rename_fails_at_registration() {
        let mut remapper = Remapper::new();
        remapper
            .register_method_rename("p/Owner", "()V", "a", "x")
            .expect("first");
        remapper
            .register_method_rename("p/Owner", "()V", "a", "x")
            .expect("same target again");

        let error = remapper
            .register_method_rename("p/Owner", "()V", "a", "y")
            .expect_err("conflict");

        assert!(matches!(error, Error::ConflictingMapping { .. }));
        assert_eq!(remapper.remapped_method_name("p/Owner", "()V", "a"), Some("x"));
        assert_eq!(remapper.remove_method_rename("p/Owner", "()V", "a").as_deref(), Some("x"));
        assert_eq!(remapper.remapped_method_name("p/Owner", "()V", "a"), None);
    }

    #[test]
    fn method_renames_do_not_follow_overrides() {
        let mut base = class("p/Base", "java/lang/Object");
        base.methods.push(method("run", "()V", Vec::new()));
        let mut child = class("p/Child", "p/Base");
        child.methods.push(method("run", "()V", Vec::new()));
        let mut remapper = Remapper::new();
        remapper.add_targets([base, child]).expect("targets");
        remapper
            .register_method_rename("p/Base", "()V", "run", "execute")
            .expect("rename");

        remapper.process().expect("process");

        let targets = remapper.targets();
        assert_eq!(targets.get("p/Base").expect("base").methods[0].name, "execute");
        assert_eq!(targets.get("p/Child").expect("child").methods[0].name, "run");
    }

    #[test]
    fn self_referencing_class_is_fully_renamed() {
        let mut subject = class("a/A", "java/lang/Object");
        subject.signature = Some("Ljava/lang/Object;Ljava/lang/Comparable<La/A;>;".to_string());
        subject.interfaces.push("java/lang/Comparable".to_string());
        subject.fields.push(field(flags::ACC_PRIVATE, "next", "La/A;"));
        subject.inner_classes.push(InnerClass {
            name: "a/A$Node".to_string(),
            outer_name: Some("a/A".to_string()),
            inner_name: Some("Node".to_string()),
            access: flags::ACC_STATIC,
        });
        subject.nest_members.push("a/A$Node".to_string());
        subject.record_components.push(RecordComponent {
            name: "next".to_string(),
            descriptor: "La/A;".to_string(),
            ..RecordComponent::default()
        });
        let mut body = method(
            "copy",
            "(La/A;)La/A;",
            vec![
                Instruction::Type {
                    opcode: opcodes::NEW,
                    descriptor: "a/A".to_string(),
                },
                Instruction::Insn { opcode: opcodes::DUP },
                Instruction::Method {
                    opcode: opcodes::INVOKESPECIAL,
                    owner: "a/A".to_string(),
                    name: "<init>".to_string(),
                    descriptor: "()V".to_string(),
                    is_interface: false,
                },
                Instruction::Var {
                    opcode: opcodes::ALOAD,
                    var: 1,
                },
                Instruction::Field {
                    opcode: opcodes::GETFIELD,
                    owner: "a/A".to_string(),
                    name: "next".to_string(),
                    descriptor: "La/A;".to_string(),
                },
                Instruction::Ldc {
                    value: Constant::Type("[La/A;".to_string()),
                },
                Instruction::Frame {
                    frame: Frame::Full {
                        locals: vec![FrameValue::Object("a/A".to_string())],
                        stack: Vec::new(),
                    },
                },
                Instruction::Insn {
                    opcode: opcodes::ARETURN,
                },
            ],
        );
        body.try_catch_blocks.push(TryCatchBlock {
            start: LabelId(0),
            end: LabelId(1),
            handler: LabelId(2),
            exception_type: Some("a/Failure".to_string()),
        });
        subject.methods.push(body);

        let mut remapper = Remapper::new();
        remapper.add_target(subject).expect("target");
        remapper.register_class_rename("a/A", "b/B");
        remapper.register_class_rename("a/A$Node", "b/B$Entry");
        remapper.register_class_rename("a/Failure", "b/Failure");
        remapper.register_field_rename("a/A", "La/A;", "next", "successor");
        remapper
            .register_method_rename("a/A", "(La/A;)La/A;", "copy", "duplicate")
            .expect("method");

        remapper.process().expect("process");

        let targets = remapper.targets();
        assert!(targets.get("a/A").is_none());
        let renamed = targets.get("b/B").expect("renamed class");
        let json = serde_json::to_string(renamed).expect("serialize");
        assert!(!json.contains("a/A"), "old name left in {json}");
        assert!(!json.contains("a/Failure"));
        assert_eq!(renamed.fields[0].name, "successor");
        assert_eq!(renamed.fields[0].descriptor, "Lb/B;");
        assert_eq!(renamed.record_components[0].name, "successor");
        assert_eq!(renamed.inner_classes[0].inner_name.as_deref(), Some("Entry"));
        assert_eq!(renamed.methods[0].name, "duplicate");
        assert_eq!(renamed.methods[0].descriptor, "(Lb/B;)Lb/B;");
        assert_eq!(
            renamed.signature.as_deref(),
            Some("Ljava/lang/Object;Ljava/lang/Comparable<Lb/B;>;")
        );
        assert!(matches!(
            &renamed.methods[0].instructions[4],
            Instruction::Field { owner, name, .. } if owner == "b/B" && name == "successor"
        ));
    }

    #[test]
    fn process_consumes_every_table() {
        let mut remapper = Remapper::new();
        remapper.add_target(class("a/A", "java/lang/Object")).expect("target");
        remapper.register_class_rename("a/A", "b/B");
        remapper.register_field_rename("a/A", "I", "x", "y");
        remapper
            .register_method_rename("a/A", "()V", "m", "n")
            .expect("method");

        remapper.process().expect("process");

        assert_eq!(remapper.remapped_class_name("a/A"), None);
        assert_eq!(remapper.remapped_field_name("a/A", "I", "x"), None);
        assert_eq!(remapper.remapped_method_name("a/A", "()V", "m"), None);
        assert!(remapper.targets().contains("b/B"));
    }

    #[test]
    fn unregistered_references_pass_through() {
        let mut subject = class("a/A", "lib/Base");
        subject.methods.push(method(
            "call",
            "()V",
            vec![Instruction::Method {
                opcode: opcodes::INVOKESTATIC,
                owner: "lib/Util".to_string(),
                name: "helper".to_string(),
                descriptor: "(Llib/Thing;)V".to_string(),
                is_interface: false,
            }],
        ));
        let before = subject.clone();
        let mut remapper = Remapper::new();
        remapper.add_target(subject).expect("target");
        remapper.register_class_rename("other/Unused", "x/Y");

        remapper.process().expect("process");

        assert_eq!(remapper.targets().get("a/A"), Some(&before));
    }

    #[test]
    fn handles_use_the_table_matching_their_kind() {
        let mut subject = class("a/A", "java/lang/Object");
        subject.methods.push(method(
            "lambdas",
            "()V",
            vec![
                Instruction::InvokeDynamic {
                    name: "get".to_string(),
                    descriptor: "()Ljava/util/function/Supplier;".to_string(),
                    bootstrap: Handle {
                        tag: opcodes::H_INVOKESTATIC,
                        owner: "a/Bootstrap".to_string(),
                        name: "boot".to_string(),
                        descriptor: "()V".to_string(),
                        is_interface: false,
                    },
                    bootstrap_args: vec![Constant::Handle(Handle {
                        tag: opcodes::H_GETFIELD,
                        owner: "a/A".to_string(),
                        name: "value".to_string(),
                        descriptor: "I".to_string(),
                        is_interface: false,
                    })],
                },
            ],
        ));
        let mut remapper = Remapper::new();
        remapper.add_target(subject).expect("target");
        remapper.register_class_rename("a/Bootstrap", "b/Boot");
        remapper.register_field_rename("a/A", "I", "value", "amount");
        remapper
            .register_method_rename("a/Bootstrap", "()V", "boot", "start")
            .expect("method");

        remapper.process().expect("process");

        let Instruction::InvokeDynamic {
            bootstrap,
            bootstrap_args,
            ..
        } = &remapper.targets().get("a/A").expect("class").methods[0].instructions[0]
        else {
            panic!("expected invokedynamic");
        };
        assert_eq!(bootstrap.owner, "b/Boot");
        assert_eq!(bootstrap.name, "start");
        assert!(matches!(
            &bootstrap_args[0],
            Constant::Handle(handle) if handle.name == "amount"
        ));
    }

    #[test]
    fn module_and_annotation_references_are_renamed() {
        let mut subject = class("module-info", "java/lang/Object");
        subject.module = Some(crate::ir::Module {
            name: "app".to_string(),
            main_class: Some("a/Main".to_string()),
            uses: vec!["a/Service".to_string()],
            provides: vec![ModuleProvide {
                service: "a/Service".to_string(),
                providers: vec!["a/Impl".to_string()],
            }],
        });
        subject.annotations.push(Annotation {
            descriptor: "La/Marker;".to_string(),
            visible: true,
            values: vec![crate::ir::AnnotationElement {
                name: "mode".to_string(),
                value: AnnotationValue::Array(vec![AnnotationValue::Enum {
                    descriptor: "La/Mode;".to_string(),
                    name: "FAST".to_string(),
                }]),
            }],
        });
        let mut remapper = Remapper::new();
        remapper.add_target(subject).expect("target");
        for (old, new) in [
            ("a/Main", "b/Main"),
            ("a/Service", "b/Service"),
            ("a/Impl", "b/Impl"),
            ("a/Marker", "b/Marker"),
            ("a/Mode", "b/Mode"),
        ] {
            remapper.register_class_rename(old, new);
        }
        remapper.register_field_rename("a/Mode", "La/Mode;", "FAST", "QUICK");

        remapper.process().expect("process");

        let renamed = remapper.targets().get("module-info").expect("module");
        let module = renamed.module.as_ref().expect("module attribute");
        assert_eq!(module.main_class.as_deref(), Some("b/Main"));
        assert_eq!(module.uses, vec!["b/Service".to_string()]);
        assert_eq!(module.provides[0].providers, vec!["b/Impl".to_string()]);
        assert_eq!(renamed.annotations[0].descriptor, "Lb/Marker;");
        assert_eq!(
            renamed.annotations[0].values[0].value,
            AnnotationValue::Array(vec![AnnotationValue::Enum {
                descriptor: "Lb/Mode;".to_string(),
                name: "QUICK".to_string(),
            }])
        );
    }

    #[test]
    fn inner_classes_follow_renamed_outer_class() {
        let mut remapper = Remapper::new();
        remapper
            .add_targets([
                class("a/Outer", "java/lang/Object"),
                class("a/Outer$Inner", "java/lang/Object"),
                class("a/Outer$Inner$Deep", "java/lang/Object"),
                class("a/Outer$Kept", "java/lang/Object"),
            ])
            .expect("targets");
        remapper.register_class_rename("a/Outer", "b/Root");
        remapper.register_class_rename("a/Outer$Kept", "b/Kept");

        let added = remapper.fix_inner_class_names();

        assert_eq!(added.get("a/Outer$Inner").map(String::as_str), Some("b/Root$Inner"));
        assert_eq!(
            added.get("a/Outer$Inner$Deep").map(String::as_str),
            Some("b/Root$Inner$Deep")
        );
        assert!(!added.contains_key("a/Outer$Kept"));
        assert_eq!(remapper.remapped_class_name("a/Outer$Kept"), Some("b/Kept"));
    }

    #[test]
    fn inner_class_renamed_to_top_level_takes_new_simple_name() {
        let mut outer = class("a/Outer", "java/lang/Object");
        outer.inner_classes.push(InnerClass {
            name: "a/Outer$Inner".to_string(),
            outer_name: Some("a/Outer".to_string()),
            inner_name: Some("Inner".to_string()),
            access: flags::ACC_PUBLIC,
        });
        outer.inner_classes.push(InnerClass {
            name: "a/Outer$Flat".to_string(),
            outer_name: Some("a/Outer".to_string()),
            inner_name: Some("Flat".to_string()),
            access: flags::ACC_PUBLIC,
        });
        let mut remapper = Remapper::new();
        remapper.add_target(outer).expect("target");
        remapper.register_class_rename("a/Outer$Inner", "b/Standalone");
        remapper.register_class_rename("a/Outer$Flat", "Bare");

        remapper.process().expect("process");

        let outer = remapper.targets().get("a/Outer").expect("outer");
        assert_eq!(outer.inner_classes[0].name, "b/Standalone");
        assert_eq!(outer.inner_classes[0].inner_name.as_deref(), Some("Standalone"));
        assert_eq!(outer.inner_classes[1].inner_name.as_deref(), Some("Bare"));
    }

    #[test]
    fn duplicate_names_after_processing_are_reported() {
        let mut remapper = Remapper::new();
        remapper
            .add_targets([
                class("a/A", "java/lang/Object"),
                class("a/B", "java/lang/Object"),
            ])
            .expect("targets");
        remapper.register_class_rename("a/A", "a/B");

        let error = remapper.process().expect_err("collision");

        assert!(matches!(error, Error::DuplicateClass { ref name } if name.contains("a/B")));
    }

    #[test]
    fn lookups_reflect_registered_class_renames() {
        let mut remapper = hierarchy(flags::ACC_PUBLIC, "p/Leaf");
        remapper.register_class_rename("p/Base", "q/Root");

        assert_eq!(remapper.remapped_class_name("p/Base"), Some("q/Root"));
        assert_eq!(remapper.remapped_field_descriptor("[Lp/Base;"), "[Lq/Root;");
        assert_eq!(
            remapper.remapped_method_descriptor("(Lp/Base;I)V"),
            "(Lq/Root;I)V"
        );
        assert_eq!(
            remapper.remapped_signature("Ljava/util/List<Lp/Base;>;"),
            "Ljava/util/List<Lq/Root;>;"
        );
        assert!(matches!(remapper.remapped_signature("Lp/Mid;"), Cow::Borrowed(_)));

        remapper.clear_targets();
        assert!(remapper.targets().is_empty());
        assert_eq!(remapper.remapped_field_name("p/Mid", "I", "f"), None);
        assert_eq!(remapper.remapped_field_name("p/Base", "I", "f"), Some("renamed"));
    }
}
