//! Single-pass operand stack simulation driven by stack map frames.

pub(crate) mod opcode_semantics;
pub(crate) mod stack_machine;
pub(crate) mod value;
pub(crate) mod walker;
