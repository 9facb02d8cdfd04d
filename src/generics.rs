use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::classpath::ClassPool;
use crate::dataflow::stack_machine::StackMachine;
use crate::dataflow::value::strip_casts;
use crate::dataflow::walker::{StackVisitor, walk};
use crate::descriptor;
use crate::error::Error;
use crate::hierarchy::HierarchyResolver;
use crate::ir::{Instruction, Method};
use crate::opcodes;

const COLLECTION: &str = "java/util/Collection";
const ADD_DESCRIPTOR: &str = "(Ljava/lang/Object;)Z";

#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd, Serialize)]
pub(crate) struct MethodRef {
    pub(crate) owner: String,
    pub(crate) name: String,
    pub(crate) descriptor: String,
}

/// Guesses the element type of collections returned by signature-less static methods.
///
/// Elements passed to `Collection.add` are merged per collection value, and the merged type of
/// every returned collection becomes the method's guess. Guesses that widen to `Object` carry no
/// information and are left out.
pub(crate) fn likely_collection_generics(
    pool: &ClassPool,
    resolver: &HierarchyResolver<'_>,
) -> BTreeMap<MethodRef, String> {
    let mut guesses = BTreeMap::new();
    for class in pool.classes() {
        for method in &class.methods {
            if !method.is_static() || method.signature.is_some() {
                continue;
            }
            if !returns_collection(method, resolver) {
                continue;
            }
            let mut tracker = CollectionTracker::new(resolver);
            let walked = walk(class, method, &mut tracker).and_then(|_| match tracker.error.take() {
                Some(error) => Err(error),
                None => Ok(()),
            });
            if let Err(error) = walked {
                warn!(
                    "skipping {}.{}{}: {error}",
                    class.name, method.name, method.descriptor
                );
                continue;
            }
            if let Some(element) = tracker.returned {
                debug!(
                    "{}.{}{} likely returns a collection of {element}",
                    class.name, method.name, method.descriptor
                );
                guesses.insert(
                    MethodRef {
                        owner: class.name.clone(),
                        name: method.name.clone(),
                        descriptor: method.descriptor.clone(),
                    },
                    element,
                );
            }
        }
    }
    guesses.retain(|_, element| match resolver.resolve(element) {
        Ok(resolved) => resolved.super_name.is_some(),
        Err(_) => false,
    });
    guesses
}

fn returns_collection(method: &Method, resolver: &HierarchyResolver<'_>) -> bool {
    let Some(returned) = descriptor::returned_class(&method.descriptor) else {
        return false;
    };
    match resolver.all_interfaces(returned) {
        Ok(interfaces) => interfaces.contains(COLLECTION),
        Err(error) => {
            debug!("cannot resolve return type of {}: {error}", method.name);
            false
        }
    }
}

struct CollectionTracker<'r, 'p> {
    resolver: &'r HierarchyResolver<'p>,
    /// Merged element type per collection value id.
    element_types: BTreeMap<u32, String>,
    returned: Option<String>,
    error: Option<Error>,
}

impl<'r, 'p> CollectionTracker<'r, 'p> {
    fn new(resolver: &'r HierarchyResolver<'p>) -> Self {
        Self {
            resolver,
            element_types: BTreeMap::new(),
            returned: None,
            error: None,
        }
    }

    fn merge(&self, known: Option<&String>, added: &str) -> Result<String, Error> {
        match known {
            Some(known) => Ok(self.resolver.common_superclass(known, added)?.name.clone()),
            None => Ok(self.resolver.resolve(added)?.name.clone()),
        }
    }

    fn record_add(&mut self, owner: &str, state: &StackMachine) -> Result<(), Error> {
        if !self.resolver.all_interfaces(owner)?.contains(COLLECTION) {
            return Ok(());
        }
        let (Some(element), Some(collection)) = (state.peek(0), state.peek(1)) else {
            return Ok(());
        };
        // arrays and primitives cannot be merged by class
        let Some(element_class) = element.class_name() else {
            return Ok(());
        };
        let key = strip_casts(collection).id;
        let merged = self.merge(self.element_types.get(&key), element_class)?;
        self.element_types.insert(key, merged);
        Ok(())
    }

    fn record_return(&mut self, state: &StackMachine) -> Result<(), Error> {
        let Some(top) = state.peek(0) else {
            return Ok(());
        };
        let Some(element) = self.element_types.get(&strip_casts(top).id) else {
            return Ok(());
        };
        let merged = self.merge(self.returned.as_ref(), element)?;
        self.returned = Some(merged);
        Ok(())
    }
}

impl StackVisitor for CollectionTracker<'_, '_> {
    fn before(&mut self, _index: usize, instruction: &Instruction, state: &StackMachine) {
        if self.error.is_some() {
            return;
        }
        let result = match instruction {
            Instruction::Method {
                owner,
                name,
                descriptor,
                ..
            } if name == "add" && descriptor == ADD_DESCRIPTOR => self.record_add(owner, state),
            Instruction::Insn {
                opcode: opcodes::ARETURN,
            } => self.record_return(state),
            _ => Ok(()),
        };
        if let Err(error) = result {
            self.error = Some(error);
        }
    }
}
