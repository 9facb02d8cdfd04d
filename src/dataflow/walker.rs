use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::{debug, info};

use crate::dataflow::opcode_semantics::{Effect, decode, stack_walk_debug_enabled};
use crate::dataflow::stack_machine::StackMachine;
use crate::dataflow::value::{Provenance, StackValue, ValueRef};
use crate::descriptor::{self, Category};
use crate::error::Error;
use crate::ir::{Class, Constant, Frame, FrameValue, Instruction, LabelId, Method, V1_5};
use crate::opcodes;

/// Callbacks invoked in instruction order while a method is simulated.
pub(crate) trait StackVisitor {
    fn before(&mut self, _index: usize, _instruction: &Instruction, _state: &StackMachine) {}

    fn after(&mut self, _index: usize, _instruction: &Instruction, _state: &StackMachine) {}

    fn end_method(&mut self) {}
}

/// Whether a method was simulated.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum WalkOutcome {
    Walked,
    /// The class predates stack map frames, so merge points cannot be resolved.
    Skipped,
}

/// Replays `method` instruction by instruction, reporting the state around each one.
pub(crate) fn walk<V>(class: &Class, method: &Method, visitor: &mut V) -> Result<WalkOutcome, Error>
where
    V: StackVisitor + ?Sized,
{
    if class.version <= V1_5 {
        debug!(
            "skipping {}.{}{}: class version {} has no stack map frames",
            class.name, method.name, method.descriptor, class.version
        );
        return Ok(WalkOutcome::Skipped);
    }
    let trace = stack_walk_debug_enabled();
    let mut walker = Walker::new(class, method)?;
    for (index, instruction) in method.instructions.iter().enumerate() {
        walker.index = index;
        visitor.before(index, instruction, &walker.machine);
        walker.step(instruction)?;
        visitor.after(index, instruction, &walker.machine);
        if trace {
            info!(
                "stack walk debug: method={}.{}{} index={} kind={} opcode={:?} depth={}",
                class.name,
                method.name,
                method.descriptor,
                index,
                instruction.kind_name(),
                instruction.opcode(),
                walker.machine.stack_len()
            );
        }
    }
    visitor.end_method();
    Ok(WalkOutcome::Walked)
}

struct Walker<'m> {
    owner: &'m str,
    method: &'m Method,
    machine: StackMachine,
    /// Slot widths of the locals declared so far, as append/chop frames see them.
    frame_locals: Vec<usize>,
    labels: BTreeMap<LabelId, usize>,
    next_id: u32,
    index: usize,
}

impl<'m> Walker<'m> {
    fn new(class: &'m Class, method: &'m Method) -> Result<Self, Error> {
        let labels = method
            .instructions
            .iter()
            .enumerate()
            .filter_map(|(index, instruction)| match instruction {
                Instruction::Label { id } => Some((*id, index)),
                _ => None,
            })
            .collect();
        let mut walker = Self {
            owner: &class.name,
            method,
            machine: StackMachine::default(),
            frame_locals: Vec::new(),
            labels,
            next_id: 0,
            index: 0,
        };

        let (parameters, _) = descriptor::split_method_descriptor(&method.descriptor)
            .map_err(|error| walker.malformed(format!("{error:#}")))?;
        let mut locals = Vec::new();
        if !method.is_static() {
            let this = walker.value(descriptor::object_descriptor(&class.name), Provenance::This);
            locals.push(this);
            walker.frame_locals.push(1);
        }
        for (position, parameter) in parameters.into_iter().enumerate() {
            let slot = locals.len();
            let value = walker.value(
                parameter,
                Provenance::Parameter {
                    index: position,
                    slot,
                },
            );
            locals.push(value);
            if descriptor::category(parameter) == Category::Two {
                locals.push(walker.invalid());
                walker.frame_locals.push(2);
            } else {
                walker.frame_locals.push(1);
            }
        }
        while locals.len() < usize::from(method.max_locals) {
            locals.push(walker.undefined());
        }
        walker.machine = StackMachine::new(locals);
        Ok(walker)
    }

    fn method_id(&self) -> String {
        format!("{}.{}{}", self.owner, self.method.name, self.method.descriptor)
    }

    fn malformed(&self, detail: impl Into<String>) -> Error {
        Error::MalformedBytecode {
            method: self.method_id(),
            index: self.index,
            detail: detail.into(),
        }
    }

    fn unsupported(&self, detail: impl Into<String>) -> Error {
        Error::UnsupportedBytecode {
            method: self.method_id(),
            index: self.index,
            detail: detail.into(),
        }
    }

    fn fresh(&mut self, descriptor: Option<String>, valid: bool, null: bool, provenance: Provenance) -> ValueRef {
        self.next_id += 1;
        Rc::new(StackValue {
            id: self.next_id,
            descriptor,
            is_valid: valid,
            is_null: null,
            provenance,
        })
    }

    fn value(&mut self, descriptor: impl Into<String>, provenance: Provenance) -> ValueRef {
        self.fresh(Some(descriptor.into()), true, false, provenance)
    }

    fn invalid(&mut self) -> ValueRef {
        self.fresh(None, false, false, Provenance::Invalid)
    }

    fn undefined(&mut self) -> ValueRef {
        self.fresh(None, false, false, Provenance::Undefined)
    }

    fn pop(&mut self) -> Result<ValueRef, Error> {
        self.machine
            .pop()
            .ok_or_else(|| self.malformed("operand stack underflow"))
    }

    fn pop_n(&mut self, count: usize) -> Result<Vec<ValueRef>, Error> {
        let mut values = (0..count).map(|_| self.pop()).collect::<Result<Vec<_>, _>>()?;
        values.reverse();
        Ok(values)
    }

    fn pop_category_one(&mut self) -> Result<ValueRef, Error> {
        let value = self.pop()?;
        if value.category() != Some(Category::One) {
            return Err(self.malformed(format!("expected a one-word value, found {value}")));
        }
        Ok(value)
    }

    fn step(&mut self, instruction: &Instruction) -> Result<(), Error> {
        let index = self.index;
        match instruction {
            Instruction::Insn { opcode } => self.simple(*opcode),
            Instruction::Int { opcode, operand } => match *opcode {
                opcodes::BIPUSH | opcodes::SIPUSH => {
                    let value = self.value("I", Provenance::Constant(Constant::Int(*operand)));
                    self.machine.push(value);
                    Ok(())
                }
                opcodes::NEWARRAY => {
                    let descriptor = match *operand {
                        opcodes::T_BOOLEAN => "[Z",
                        opcodes::T_CHAR => "[C",
                        opcodes::T_FLOAT => "[F",
                        opcodes::T_DOUBLE => "[D",
                        opcodes::T_BYTE => "[B",
                        opcodes::T_SHORT => "[S",
                        opcodes::T_INT => "[I",
                        opcodes::T_LONG => "[J",
                        other => return Err(self.malformed(format!("unknown newarray type {other}"))),
                    };
                    let length = self.pop()?;
                    let array = self.value(
                        descriptor,
                        Provenance::NewArray {
                            instruction: index,
                            lengths: vec![length],
                        },
                    );
                    self.machine.push(array);
                    Ok(())
                }
                other => Err(self.unsupported(format!("int instruction opcode 0x{other:02x}"))),
            },
            Instruction::Var { opcode, var } => {
                let var = usize::from(*var);
                match *opcode {
                    opcodes::ILOAD..=opcodes::ALOAD => {
                        let value = self
                            .machine
                            .load_local(var)
                            .ok_or_else(|| self.malformed(format!("load from missing local {var}")))?;
                        self.machine.push(value);
                        Ok(())
                    }
                    opcodes::ISTORE..=opcodes::ASTORE => {
                        let value = self.pop()?;
                        self.store_local(var, value);
                        Ok(())
                    }
                    other => Err(self.unsupported(format!("variable instruction opcode 0x{other:02x}"))),
                }
            }
            Instruction::Type { opcode, descriptor } => self.type_instruction(*opcode, descriptor),
            Instruction::Field {
                opcode, descriptor, ..
            } => {
                match *opcode {
                    opcodes::GETSTATIC => {}
                    opcodes::PUTSTATIC => {
                        self.pop()?;
                    }
                    opcodes::GETFIELD => {
                        self.pop()?;
                    }
                    opcodes::PUTFIELD => {
                        self.pop_n(2)?;
                    }
                    other => return Err(self.unsupported(format!("field instruction opcode 0x{other:02x}"))),
                }
                if matches!(*opcode, opcodes::GETSTATIC | opcodes::GETFIELD) {
                    let value = self.value(descriptor.as_str(), Provenance::FieldRead { instruction: index });
                    self.machine.push(value);
                }
                Ok(())
            }
            Instruction::Method {
                opcode, descriptor, ..
            } => {
                if !(opcodes::INVOKEVIRTUAL..=opcodes::INVOKEINTERFACE).contains(opcode) {
                    return Err(self.unsupported(format!("method instruction opcode 0x{opcode:02x}")));
                }
                let receiver = *opcode != opcodes::INVOKESTATIC;
                self.invoke(descriptor, receiver, Provenance::MethodReturn { instruction: index })
            }
            Instruction::InvokeDynamic { descriptor, .. } => {
                self.invoke(descriptor, false, Provenance::IndyReturn { instruction: index })
            }
            Instruction::Jump { opcode, .. } => match *opcode {
                opcodes::IFEQ..=opcodes::IFLE | opcodes::IFNULL | opcodes::IFNONNULL => {
                    self.pop()?;
                    Ok(())
                }
                opcodes::IF_ICMPEQ..=opcodes::IF_ACMPNE => {
                    self.pop_n(2)?;
                    Ok(())
                }
                opcodes::GOTO | opcodes::GOTO_W => Ok(()),
                opcodes::JSR | opcodes::JSR_W => Err(self.unsupported("subroutine jump")),
                other => Err(self.unsupported(format!("jump opcode 0x{other:02x}"))),
            },
            Instruction::Label { .. } | Instruction::LineNumber { .. } | Instruction::Iinc { .. } => Ok(()),
            Instruction::Ldc { value } => {
                let pushed = self.value(constant_descriptor(value), Provenance::Constant(value.clone()));
                self.machine.push(pushed);
                Ok(())
            }
            Instruction::TableSwitch { .. } | Instruction::LookupSwitch { .. } => {
                self.pop()?;
                Ok(())
            }
            Instruction::MultiANewArray {
                descriptor,
                dimensions,
            } => {
                let lengths = self.pop_n(usize::from(*dimensions))?;
                let array = self.value(
                    descriptor.as_str(),
                    Provenance::NewArray {
                        instruction: index,
                        lengths,
                    },
                );
                self.machine.push(array);
                Ok(())
            }
            Instruction::Frame { frame } => self.apply_frame(frame),
        }
    }

    fn simple(&mut self, opcode: u8) -> Result<(), Error> {
        let Some(effect) = decode(opcode) else {
            return Err(self.unsupported(format!("opcode 0x{opcode:02x}")));
        };
        let index = self.index;
        match effect {
            Effect::Noop => {}
            Effect::Push(constant) => {
                let value = self.value(constant_descriptor(&constant), Provenance::Constant(constant));
                self.machine.push(value);
            }
            Effect::PushNull => {
                let value = self.fresh(None, true, true, Provenance::Null);
                self.machine.push(value);
            }
            Effect::ArrayLoad(element) => {
                let array_index = self.pop()?;
                let array = self.pop()?;
                let element = match element {
                    Some(element) => element.to_string(),
                    None if array.is_null => "Ljava/lang/Object;".to_string(),
                    None => match array.descriptor.as_deref().and_then(|d| d.strip_prefix('[')) {
                        Some(element) => element.to_string(),
                        None => return Err(self.malformed(format!("aaload from non-array {array}"))),
                    },
                };
                let value = self.value(
                    element,
                    Provenance::ArrayElement {
                        instruction: index,
                        array,
                        index: array_index,
                    },
                );
                self.machine.push(value);
            }
            Effect::ArrayLength => {
                let array = self.pop()?;
                let value = self.value("I", Provenance::ArrayLength { instruction: index, array });
                self.machine.push(value);
            }
            Effect::Consume(count) => {
                self.pop_n(count)?;
            }
            Effect::Pop => {
                self.pop_category_one()?;
            }
            Effect::Pop2 => {
                let top = self.pop()?;
                match top.category() {
                    Some(Category::Two) => {}
                    Some(Category::One) => {
                        self.pop_category_one()?;
                    }
                    None => return Err(self.malformed(format!("pop2 of {top}"))),
                }
            }
            Effect::Dup
            | Effect::DupX1
            | Effect::DupX2
            | Effect::Dup2
            | Effect::Dup2X1
            | Effect::Dup2X2 => self.duplicate(&effect)?,
            Effect::Swap => {
                if self.machine.category_at(0) != Some(Category::One)
                    || self.machine.category_at(1) != Some(Category::One)
                {
                    return Err(self.malformed("swap requires two one-word values"));
                }
                self.machine.swap();
            }
            Effect::Binary(result) => {
                let right = self.pop()?;
                let left = self.pop()?;
                let value = self.value(result, Provenance::Arithmetic { instruction: index, left, right });
                self.machine.push(value);
            }
            Effect::Negate(result) => {
                let operand = self.pop()?;
                let value = self.value(result, Provenance::Negation { instruction: index, operand });
                self.machine.push(value);
            }
            Effect::Convert(result) => {
                let source = self.pop()?;
                let value = self.value(result, Provenance::Conversion { instruction: index, source });
                self.machine.push(value);
            }
            Effect::Compare => {
                let right = self.pop()?;
                let left = self.pop()?;
                let value = self.value("I", Provenance::Comparison { instruction: index, left, right });
                self.machine.push(value);
            }
        }
        Ok(())
    }

    /// Applies one of the JVMS forms of the dup family, chosen by the categories on top of the stack.
    fn duplicate(&mut self, effect: &Effect) -> Result<(), Error> {
        use Category::{One, Two};
        let categories: [Option<Category>; 4] =
            std::array::from_fn(|depth| self.machine.category_at(depth));
        let (take, below) = match (effect, categories) {
            (Effect::Dup, [Some(One), ..]) => (1, 0),
            (Effect::DupX1, [Some(One), Some(One), ..]) => (1, 1),
            (Effect::DupX2, [Some(One), Some(One), Some(One), _]) => (1, 2),
            (Effect::DupX2, [Some(One), Some(Two), ..]) => (1, 1),
            (Effect::Dup2, [Some(One), Some(One), ..]) => (2, 0),
            (Effect::Dup2, [Some(Two), ..]) => (1, 0),
            (Effect::Dup2X1, [Some(One), Some(One), Some(One), _]) => (2, 1),
            (Effect::Dup2X1, [Some(Two), Some(One), ..]) => (1, 1),
            (Effect::Dup2X2, [Some(One), Some(One), Some(One), Some(One)]) => (2, 2),
            (Effect::Dup2X2, [Some(Two), Some(One), Some(One), _]) => (1, 2),
            (Effect::Dup2X2, [Some(One), Some(One), Some(Two), _]) => (2, 1),
            (Effect::Dup2X2, [Some(Two), Some(Two), ..]) => (1, 1),
            _ => {
                return Err(self.malformed(format!(
                    "no {effect:?} form for top-of-stack categories {categories:?}"
                )));
            }
        };
        self.machine.duplicate(take, below);
        Ok(())
    }

    fn type_instruction(&mut self, opcode: u8, descriptor: &str) -> Result<(), Error> {
        let index = self.index;
        let value = match opcode {
            opcodes::NEW => self.value(
                descriptor::object_descriptor(descriptor),
                Provenance::NewObject { instruction: index },
            ),
            opcodes::ANEWARRAY => {
                let length = self.pop()?;
                self.value(
                    format!("[{}", descriptor::object_descriptor(descriptor)),
                    Provenance::NewArray {
                        instruction: index,
                        lengths: vec![length],
                    },
                )
            }
            opcodes::CHECKCAST => {
                let uncast = self.pop()?;
                let null = uncast.is_null;
                self.fresh(
                    Some(descriptor::object_descriptor(descriptor)),
                    true,
                    null,
                    Provenance::Cast {
                        instruction: index,
                        uncast,
                    },
                )
            }
            opcodes::INSTANCEOF => {
                let checked = self.pop()?;
                self.value(
                    "Z",
                    Provenance::InstanceOf {
                        instruction: index,
                        checked,
                    },
                )
            }
            other => return Err(self.unsupported(format!("type instruction opcode 0x{other:02x}"))),
        };
        self.machine.push(value);
        Ok(())
    }

    fn invoke(&mut self, method_descriptor: &str, receiver: bool, provenance: Provenance) -> Result<(), Error> {
        let (parameters, return_type) = descriptor::split_method_descriptor(method_descriptor)
            .map_err(|error| self.malformed(format!("{error:#}")))?;
        self.pop_n(parameters.len())?;
        if receiver {
            self.pop()?;
        }
        if return_type != "V" {
            let value = self.value(return_type, provenance);
            self.machine.push(value);
        }
        Ok(())
    }

    fn store_local(&mut self, var: usize, value: ValueRef) {
        let wide = value.category() == Some(Category::Two);
        let width = if wide { 2 } else { 1 };
        self.ensure_locals(var + width);
        if var > 0
            && self.machine.locals()[var - 1].category() == Some(Category::Two)
        {
            let invalid = self.invalid();
            self.machine.set_local(var - 1, invalid);
        }
        self.machine.set_local(var, value);
        if wide {
            let invalid = self.invalid();
            self.machine.set_local(var + 1, invalid);
        }
    }

    fn ensure_locals(&mut self, len: usize) {
        while self.machine.locals().len() < len {
            let filler = self.undefined();
            self.machine.push_local(filler);
        }
    }

    fn apply_frame(&mut self, frame: &Frame) -> Result<(), Error> {
        match frame {
            Frame::Same => self.machine.clear_stack(),
            Frame::Same1 { stack } => {
                let (value, _) = self.frame_value(stack)?;
                self.machine.clear_stack();
                self.machine.push(value);
            }
            Frame::Append { locals } => {
                for local in locals {
                    let slot = self.frame_local_slots();
                    let width = self.set_frame_local(slot, local)?;
                    self.frame_locals.push(width);
                }
                self.machine.clear_stack();
            }
            Frame::Chop { count } => {
                for _ in 0..*count {
                    let width = self
                        .frame_locals
                        .pop()
                        .ok_or_else(|| self.malformed("chop frame removes more locals than declared"))?;
                    let slot = self.frame_local_slots();
                    for offset in 0..width {
                        let invalid = self.invalid();
                        self.machine.set_local(slot + offset, invalid);
                    }
                }
                self.machine.clear_stack();
            }
            Frame::Full { locals, stack } => {
                self.frame_locals.clear();
                let declared = self.machine.locals().len();
                for local in locals {
                    let slot = self.frame_local_slots();
                    let width = self.set_frame_local(slot, local)?;
                    self.frame_locals.push(width);
                }
                for slot in self.frame_local_slots()..declared {
                    let invalid = self.invalid();
                    self.machine.set_local(slot, invalid);
                }
                self.machine.clear_stack();
                for entry in stack {
                    let (value, _) = self.frame_value(entry)?;
                    self.machine.push(value);
                }
            }
        }
        Ok(())
    }

    fn frame_local_slots(&self) -> usize {
        self.frame_locals.iter().sum()
    }

    fn set_frame_local(&mut self, slot: usize, local: &FrameValue) -> Result<usize, Error> {
        let (value, width) = self.frame_value(local)?;
        self.ensure_locals(slot + width);
        self.machine.set_local(slot, value);
        if width == 2 {
            let invalid = self.invalid();
            self.machine.set_local(slot + 1, invalid);
        }
        Ok(width)
    }

    /// Value declared by a frame entry and the number of local slots it covers.
    fn frame_value(&mut self, entry: &FrameValue) -> Result<(ValueRef, usize), Error> {
        let provenance = Provenance::Frame {
            instruction: self.index,
        };
        let declared = match entry {
            FrameValue::Top => return Ok((self.invalid(), 1)),
            FrameValue::Null => return Ok((self.fresh(None, true, true, provenance), 1)),
            FrameValue::Integer => ("I".to_string(), 1),
            FrameValue::Float => ("F".to_string(), 1),
            FrameValue::Long => ("J".to_string(), 2),
            FrameValue::Double => ("D".to_string(), 2),
            FrameValue::UninitializedThis => (descriptor::object_descriptor(self.owner), 1),
            FrameValue::Object(name) => (descriptor::object_descriptor(name), 1),
            FrameValue::Uninitialized(label) => (self.allocated_type(*label)?, 1),
        };
        let (descriptor, width) = declared;
        Ok((self.value(descriptor, provenance), width))
    }

    /// Type created by the `NEW` instruction that follows `label`.
    fn allocated_type(&self, label: LabelId) -> Result<String, Error> {
        let start = self
            .labels
            .get(&label)
            .copied()
            .ok_or_else(|| self.malformed(format!("frame refers to unknown label {}", label.0)))?;
        let allocation = self.method.instructions[start + 1..].iter().find(|instruction| {
            !matches!(
                instruction,
                Instruction::Label { .. } | Instruction::LineNumber { .. } | Instruction::Frame { .. }
            )
        });
        match allocation {
            Some(Instruction::Type {
                opcode: opcodes::NEW,
                descriptor,
            }) => Ok(descriptor::object_descriptor(descriptor)),
            _ => Err(self.malformed(format!(
                "uninitialized frame value at label {} is not followed by new",
                label.0
            ))),
        }
    }
}

/// Descriptor of the value a loadable constant pushes.
fn constant_descriptor(constant: &Constant) -> String {
    match constant {
        Constant::Int(_) => "I".to_string(),
        Constant::Float(_) => "F".to_string(),
        Constant::Long(_) => "J".to_string(),
        Constant::Double(_) => "D".to_string(),
        Constant::String(_) => "Ljava/lang/String;".to_string(),
        Constant::Type(_) => "Ljava/lang/Class;".to_string(),
        Constant::MethodType(_) => "Ljava/lang/invoke/MethodType;".to_string(),
        Constant::Handle(_) => "Ljava/lang/invoke/MethodHandle;".to_string(),
        Constant::Dynamic(dynamic) => dynamic.descriptor.clone(),
    }
}
