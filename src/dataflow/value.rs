use std::fmt;
use std::rc::Rc;

use crate::descriptor::{self, Category};
use crate::ir::Constant;

/// Shared handle to a simulated value; duplicated stack entries share one value.
pub(crate) type ValueRef = Rc<StackValue>;

/// Abstract value held in an operand stack or local variable slot.
#[derive(Debug, PartialEq)]
pub(crate) struct StackValue {
    /// Unique within one walk.
    pub(crate) id: u32,
    /// Field descriptor; `None` for null and invalid values.
    pub(crate) descriptor: Option<String>,
    pub(crate) is_valid: bool,
    pub(crate) is_null: bool,
    pub(crate) provenance: Provenance,
}

impl StackValue {
    /// Computational category; `None` for invalid placeholders.
    pub(crate) fn category(&self) -> Option<Category> {
        if self.is_null {
            return Some(Category::One);
        }
        if !self.is_valid {
            return None;
        }
        self.descriptor.as_deref().map(descriptor::category)
    }

    /// Internal name of the value's class when it is a non-array object.
    pub(crate) fn class_name(&self) -> Option<&str> {
        self.descriptor.as_deref().and_then(descriptor::internal_name)
    }
}

impl fmt::Display for StackValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.descriptor, self.is_null, self.is_valid) {
            (_, true, _) => write!(f, "null"),
            (_, _, false) => write!(f, "<invalid>"),
            (Some(descriptor), _, _) => write!(f, "{descriptor}"),
            (None, _, _) => write!(f, "<undefined>"),
        }
    }
}

/// Where a simulated value came from. Instruction positions index the method's instruction list.
#[derive(Debug, PartialEq)]
pub(crate) enum Provenance {
    Constant(Constant),
    Null,
    This,
    /// `index` is the formal parameter position, `slot` its local variable slot.
    Parameter { index: usize, slot: usize },
    FieldRead { instruction: usize },
    MethodReturn { instruction: usize },
    IndyReturn { instruction: usize },
    NewObject { instruction: usize },
    NewArray { instruction: usize, lengths: Vec<ValueRef> },
    ArrayElement { instruction: usize, array: ValueRef, index: ValueRef },
    ArrayLength { instruction: usize, array: ValueRef },
    Cast { instruction: usize, uncast: ValueRef },
    InstanceOf { instruction: usize, checked: ValueRef },
    Arithmetic { instruction: usize, left: ValueRef, right: ValueRef },
    Negation { instruction: usize, operand: ValueRef },
    Conversion { instruction: usize, source: ValueRef },
    Comparison { instruction: usize, left: ValueRef, right: ValueRef },
    /// Declared by a stack map frame.
    Frame { instruction: usize },
    /// Local slot never written before use.
    Undefined,
    /// Second half of a wide value, or a slot a frame declared unusable.
    Invalid,
}

/// Follows checked casts back to the value that was cast.
pub(crate) fn strip_casts(value: &ValueRef) -> &ValueRef {
    let mut current = value;
    while let Provenance::Cast { uncast, .. } = &current.provenance {
        current = uncast;
    }
    current
}
