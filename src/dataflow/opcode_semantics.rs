use std::sync::OnceLock;

use crate::ir::Constant;
use crate::opcodes;

/// Stack effect of a zero-operand instruction.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Effect {
    Noop,
    Push(Constant),
    PushNull,
    /// Pops index and array; `None` takes the element type from the array reference.
    ArrayLoad(Option<&'static str>),
    ArrayLength,
    /// Pops this many entries regardless of category.
    Consume(usize),
    Pop,
    Pop2,
    Dup,
    DupX1,
    DupX2,
    Dup2,
    Dup2X1,
    Dup2X2,
    Swap,
    Binary(&'static str),
    Negate(&'static str),
    Convert(&'static str),
    Compare,
}

/// Looks up the effect of a zero-operand opcode. `None` means the opcode is not modelled.
pub(crate) fn decode(opcode: u8) -> Option<Effect> {
    let effect = match opcode {
        opcodes::NOP | opcodes::RETURN => Effect::Noop,
        opcodes::ACONST_NULL => Effect::PushNull,
        opcodes::ICONST_M1..=opcodes::ICONST_5 => {
            Effect::Push(Constant::Int(i32::from(opcode) - i32::from(opcodes::ICONST_0)))
        }
        opcodes::LCONST_0 => Effect::Push(Constant::Long(0)),
        opcodes::LCONST_1 => Effect::Push(Constant::Long(1)),
        opcodes::FCONST_0 => Effect::Push(Constant::Float(0.0)),
        opcodes::FCONST_1 => Effect::Push(Constant::Float(1.0)),
        opcodes::FCONST_2 => Effect::Push(Constant::Float(2.0)),
        opcodes::DCONST_0 => Effect::Push(Constant::Double(0.0)),
        opcodes::DCONST_1 => Effect::Push(Constant::Double(1.0)),
        opcodes::IALOAD => Effect::ArrayLoad(Some("I")),
        opcodes::LALOAD => Effect::ArrayLoad(Some("J")),
        opcodes::FALOAD => Effect::ArrayLoad(Some("F")),
        opcodes::DALOAD => Effect::ArrayLoad(Some("D")),
        opcodes::AALOAD => Effect::ArrayLoad(None),
        // baload serves both byte[] and boolean[].
        opcodes::BALOAD => Effect::ArrayLoad(Some("B")),
        opcodes::CALOAD => Effect::ArrayLoad(Some("C")),
        opcodes::SALOAD => Effect::ArrayLoad(Some("S")),
        opcodes::IASTORE..=opcodes::SASTORE => Effect::Consume(3),
        opcodes::POP => Effect::Pop,
        opcodes::POP2 => Effect::Pop2,
        opcodes::DUP => Effect::Dup,
        opcodes::DUP_X1 => Effect::DupX1,
        opcodes::DUP_X2 => Effect::DupX2,
        opcodes::DUP2 => Effect::Dup2,
        opcodes::DUP2_X1 => Effect::Dup2X1,
        opcodes::DUP2_X2 => Effect::Dup2X2,
        opcodes::SWAP => Effect::Swap,
        opcodes::IADD..=opcodes::DREM | opcodes::ISHL..=opcodes::LXOR => {
            Effect::Binary(arithmetic_result(opcode))
        }
        opcodes::INEG => Effect::Negate("I"),
        opcodes::LNEG => Effect::Negate("J"),
        opcodes::FNEG => Effect::Negate("F"),
        opcodes::DNEG => Effect::Negate("D"),
        opcodes::I2L | opcodes::F2L | opcodes::D2L => Effect::Convert("J"),
        opcodes::I2F | opcodes::L2F | opcodes::D2F => Effect::Convert("F"),
        opcodes::I2D | opcodes::L2D | opcodes::F2D => Effect::Convert("D"),
        opcodes::L2I | opcodes::F2I | opcodes::D2I => Effect::Convert("I"),
        opcodes::I2B => Effect::Convert("B"),
        opcodes::I2C => Effect::Convert("C"),
        opcodes::I2S => Effect::Convert("S"),
        opcodes::LCMP..=opcodes::DCMPG => Effect::Compare,
        opcodes::IRETURN..=opcodes::ARETURN
        | opcodes::ATHROW
        | opcodes::MONITORENTER
        | opcodes::MONITOREXIT => Effect::Consume(1),
        opcodes::ARRAYLENGTH => Effect::ArrayLength,
        _ => return None,
    };
    Some(effect)
}

/// Result descriptor of a binary arithmetic, shift or bitwise opcode.
fn arithmetic_result(opcode: u8) -> &'static str {
    // Both blocks cycle through int, long, float, double (shifts and bitwise only int, long).
    let lane = if opcode >= opcodes::ISHL {
        (opcode - opcodes::ISHL) % 2
    } else {
        (opcode - opcodes::IADD) % 4
    };
    match lane {
        0 => "I",
        1 => "J",
        2 => "F",
        _ => "D",
    }
}

/// Returns whether per-instruction stack walk tracing is enabled.
pub(crate) fn stack_walk_debug_enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| {
        std::env::var("JREMAP_DEBUG_STACK_WALK")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    })
}
