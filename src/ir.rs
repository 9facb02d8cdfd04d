#![allow(dead_code)]

use serde::{Deserialize, Serialize};

/// JVM access flags (JVMS §4.1, §4.5, §4.6).
pub(crate) mod flags {
    pub(crate) const ACC_PUBLIC: u16 = 0x0001;
    pub(crate) const ACC_PRIVATE: u16 = 0x0002;
    pub(crate) const ACC_PROTECTED: u16 = 0x0004;
    pub(crate) const ACC_STATIC: u16 = 0x0008;
    pub(crate) const ACC_FINAL: u16 = 0x0010;
    pub(crate) const ACC_SUPER: u16 = 0x0020;
    pub(crate) const ACC_SYNCHRONIZED: u16 = 0x0020;
    pub(crate) const ACC_VOLATILE: u16 = 0x0040;
    pub(crate) const ACC_BRIDGE: u16 = 0x0040;
    pub(crate) const ACC_TRANSIENT: u16 = 0x0080;
    pub(crate) const ACC_VARARGS: u16 = 0x0080;
    pub(crate) const ACC_NATIVE: u16 = 0x0100;
    pub(crate) const ACC_INTERFACE: u16 = 0x0200;
    pub(crate) const ACC_ABSTRACT: u16 = 0x0400;
    pub(crate) const ACC_STRICT: u16 = 0x0800;
    pub(crate) const ACC_SYNTHETIC: u16 = 0x1000;
    pub(crate) const ACC_ANNOTATION: u16 = 0x2000;
    pub(crate) const ACC_ENUM: u16 = 0x4000;
    pub(crate) const ACC_MODULE: u16 = 0x8000;
}

/// Major version of Java 5, the last class-file version without stack map frames.
pub(crate) const V1_5: u16 = 49;

/// Structural representation of a parsed JVM class.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Class {
    /// Class-file major version.
    pub(crate) version: u16,
    pub(crate) access: u16,
    pub(crate) name: String,
    pub(crate) super_name: Option<String>,
    pub(crate) interfaces: Vec<String>,
    pub(crate) signature: Option<String>,
    pub(crate) source_file: Option<String>,
    pub(crate) fields: Vec<Field>,
    pub(crate) methods: Vec<Method>,
    pub(crate) inner_classes: Vec<InnerClass>,
    pub(crate) outer_class: Option<String>,
    pub(crate) outer_method: Option<String>,
    pub(crate) outer_method_descriptor: Option<String>,
    pub(crate) nest_host: Option<String>,
    pub(crate) nest_members: Vec<String>,
    pub(crate) permitted_subclasses: Vec<String>,
    pub(crate) record_components: Vec<RecordComponent>,
    pub(crate) module: Option<Module>,
    pub(crate) annotations: Vec<Annotation>,
    pub(crate) type_annotations: Vec<Annotation>,
}

impl Class {
    pub(crate) fn is_interface(&self) -> bool {
        self.access & flags::ACC_INTERFACE != 0
    }

    /// Package part of the internal name, empty for the default package.
    pub(crate) fn package(&self) -> &str {
        package_of(&self.name)
    }

    pub(crate) fn find_method(&self, name: &str, descriptor: Option<&str>) -> Option<&Method> {
        self.methods.iter().find(|method| {
            method.name == name && descriptor.is_none_or(|descriptor| method.descriptor == descriptor)
        })
    }
}

/// Package part of an internal class name.
pub(crate) fn package_of(name: &str) -> &str {
    name.rfind('/').map_or("", |index| &name[..index])
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Field {
    pub(crate) access: u16,
    pub(crate) name: String,
    pub(crate) descriptor: String,
    pub(crate) signature: Option<String>,
    pub(crate) value: Option<Constant>,
    pub(crate) annotations: Vec<Annotation>,
    pub(crate) type_annotations: Vec<Annotation>,
}

/// Method declaration together with its code.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Method {
    pub(crate) access: u16,
    pub(crate) name: String,
    pub(crate) descriptor: String,
    pub(crate) signature: Option<String>,
    pub(crate) exceptions: Vec<String>,
    pub(crate) max_stack: u16,
    pub(crate) max_locals: u16,
    pub(crate) instructions: Vec<Instruction>,
    pub(crate) try_catch_blocks: Vec<TryCatchBlock>,
    pub(crate) local_variables: Vec<LocalVariable>,
    pub(crate) annotations: Vec<Annotation>,
    pub(crate) type_annotations: Vec<Annotation>,
    pub(crate) parameter_annotations: Vec<Vec<Annotation>>,
    pub(crate) annotation_default: Option<AnnotationValue>,
}

impl Method {
    pub(crate) fn is_static(&self) -> bool {
        self.access & flags::ACC_STATIC != 0
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct InnerClass {
    pub(crate) name: String,
    pub(crate) outer_name: Option<String>,
    pub(crate) inner_name: Option<String>,
    pub(crate) access: u16,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct RecordComponent {
    pub(crate) name: String,
    pub(crate) descriptor: String,
    pub(crate) signature: Option<String>,
    pub(crate) annotations: Vec<Annotation>,
    pub(crate) type_annotations: Vec<Annotation>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Module {
    pub(crate) name: String,
    pub(crate) main_class: Option<String>,
    pub(crate) uses: Vec<String>,
    pub(crate) provides: Vec<ModuleProvide>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct ModuleProvide {
    pub(crate) service: String,
    pub(crate) providers: Vec<String>,
}

/// Annotation instance; `descriptor` is the annotation type's field descriptor.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Annotation {
    pub(crate) descriptor: String,
    pub(crate) visible: bool,
    pub(crate) values: Vec<AnnotationElement>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct AnnotationElement {
    pub(crate) name: String,
    pub(crate) value: AnnotationValue,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum AnnotationValue {
    Boolean(bool),
    Byte(i8),
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    /// Class literal, stored as a descriptor (`Ljava/lang/String;`, `I`, `[J`).
    Class(String),
    Enum { descriptor: String, name: String },
    Annotation(Annotation),
    Array(Vec<AnnotationValue>),
}

/// Reference to a method or field, as used by `invokedynamic` and `ldc`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Handle {
    /// Reference kind, one of the `H_*` constants.
    pub(crate) tag: u8,
    pub(crate) owner: String,
    pub(crate) name: String,
    pub(crate) descriptor: String,
    pub(crate) is_interface: bool,
}

impl Handle {
    pub(crate) fn is_field_reference(&self) -> bool {
        (crate::opcodes::H_GETFIELD..=crate::opcodes::H_PUTSTATIC).contains(&self.tag)
    }
}

/// Dynamically-computed constant (`CONSTANT_Dynamic`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct ConstantDynamic {
    pub(crate) name: String,
    pub(crate) descriptor: String,
    pub(crate) bootstrap: Handle,
    #[serde(default)]
    pub(crate) bootstrap_args: Vec<Constant>,
}

/// Loadable constant pool value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Constant {
    Int(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    String(String),
    /// Class literal as an internal name or array descriptor.
    Type(String),
    /// Method type as a method descriptor.
    MethodType(String),
    Handle(Handle),
    Dynamic(Box<ConstantDynamic>),
}

/// Label identity within one method body.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub(crate) struct LabelId(pub(crate) u32);

/// Instruction node; one variant per instruction category.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum Instruction {
    /// Zero-operand instruction.
    Insn { opcode: u8 },
    /// `BIPUSH`, `SIPUSH` or `NEWARRAY`.
    Int { opcode: u8, operand: i32 },
    /// Local variable load or store, or `RET`.
    Var { opcode: u8, var: u16 },
    /// `NEW`, `ANEWARRAY`, `CHECKCAST` or `INSTANCEOF`; `descriptor` is an internal name or array descriptor.
    Type { opcode: u8, descriptor: String },
    Field { opcode: u8, owner: String, name: String, descriptor: String },
    Method {
        opcode: u8,
        owner: String,
        name: String,
        descriptor: String,
        #[serde(default)]
        is_interface: bool,
    },
    InvokeDynamic {
        name: String,
        descriptor: String,
        bootstrap: Handle,
        #[serde(default)]
        bootstrap_args: Vec<Constant>,
    },
    Jump { opcode: u8, label: LabelId },
    Label { id: LabelId },
    Ldc { value: Constant },
    Iinc { var: u16, increment: i16 },
    TableSwitch { min: i32, max: i32, default: LabelId, labels: Vec<LabelId> },
    LookupSwitch { default: LabelId, keys: Vec<i32>, labels: Vec<LabelId> },
    MultiANewArray { descriptor: String, dimensions: u8 },
    Frame { frame: Frame },
    LineNumber { line: u16, start: LabelId },
}

impl Instruction {
    /// Opcode of a real instruction, `None` for labels, frames and line numbers.
    pub(crate) fn opcode(&self) -> Option<u8> {
        use crate::opcodes;
        match self {
            Instruction::Insn { opcode }
            | Instruction::Int { opcode, .. }
            | Instruction::Var { opcode, .. }
            | Instruction::Type { opcode, .. }
            | Instruction::Field { opcode, .. }
            | Instruction::Method { opcode, .. }
            | Instruction::Jump { opcode, .. } => Some(*opcode),
            Instruction::InvokeDynamic { .. } => Some(opcodes::INVOKEDYNAMIC),
            Instruction::Ldc { .. } => Some(opcodes::LDC),
            Instruction::Iinc { .. } => Some(opcodes::IINC),
            Instruction::TableSwitch { .. } => Some(opcodes::TABLESWITCH),
            Instruction::LookupSwitch { .. } => Some(opcodes::LOOKUPSWITCH),
            Instruction::MultiANewArray { .. } => Some(opcodes::MULTIANEWARRAY),
            Instruction::Label { .. } | Instruction::Frame { .. } | Instruction::LineNumber { .. } => {
                None
            }
        }
    }

    /// Short category name used in traces.
    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            Instruction::Insn { .. } => "insn",
            Instruction::Int { .. } => "int",
            Instruction::Var { .. } => "var",
            Instruction::Type { .. } => "type",
            Instruction::Field { .. } => "field",
            Instruction::Method { .. } => "method",
            Instruction::InvokeDynamic { .. } => "invokedynamic",
            Instruction::Jump { .. } => "jump",
            Instruction::Label { .. } => "label",
            Instruction::Ldc { .. } => "ldc",
            Instruction::Iinc { .. } => "iinc",
            Instruction::TableSwitch { .. } => "tableswitch",
            Instruction::LookupSwitch { .. } => "lookupswitch",
            Instruction::MultiANewArray { .. } => "multianewarray",
            Instruction::Frame { .. } => "frame",
            Instruction::LineNumber { .. } => "line",
        }
    }
}

/// Stack map frame in the compressed form found in class files.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum Frame {
    Same,
    Same1 { stack: FrameValue },
    Append { locals: Vec<FrameValue> },
    Chop { count: usize },
    Full { locals: Vec<FrameValue>, stack: Vec<FrameValue> },
}

/// Verification type of a frame entry. `Long` and `Double` occupy one entry but two slots.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum FrameValue {
    Top,
    Integer,
    Float,
    Long,
    Double,
    Null,
    UninitializedThis,
    /// Internal name or array descriptor.
    Object(String),
    /// Object created by the `NEW` following this label, not yet initialised.
    Uninitialized(LabelId),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct TryCatchBlock {
    pub(crate) start: LabelId,
    pub(crate) end: LabelId,
    pub(crate) handler: LabelId,
    #[serde(default)]
    pub(crate) exception_type: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct LocalVariable {
    pub(crate) name: String,
    pub(crate) descriptor: String,
    #[serde(default)]
    pub(crate) signature: Option<String>,
    pub(crate) start: LabelId,
    pub(crate) end: LabelId,
    pub(crate) index: u16,
}
