use crate::dataflow::value::ValueRef;
use crate::descriptor::Category;

/// Operand stack and local variable array of one simulated frame.
#[derive(Clone, Debug, Default)]
pub(crate) struct StackMachine {
    stack: Vec<ValueRef>,
    locals: Vec<ValueRef>,
}

impl StackMachine {
    pub(crate) fn new(locals: Vec<ValueRef>) -> Self {
        Self {
            stack: Vec::new(),
            locals,
        }
    }

    pub(crate) fn push(&mut self, value: ValueRef) {
        self.stack.push(value);
    }

    pub(crate) fn pop(&mut self) -> Option<ValueRef> {
        self.stack.pop()
    }

    /// Entry `depth` positions below the top; 0 is the top.
    pub(crate) fn peek(&self, depth: usize) -> Option<&ValueRef> {
        let len = self.stack.len();
        if depth >= len {
            return None;
        }
        self.stack.get(len - 1 - depth)
    }

    pub(crate) fn category_at(&self, depth: usize) -> Option<Category> {
        self.peek(depth).and_then(|value| value.category())
    }

    pub(crate) fn stack_len(&self) -> usize {
        self.stack.len()
    }

    /// Stack contents, bottom first.
    pub(crate) fn stack_values(&self) -> &[ValueRef] {
        &self.stack
    }

    pub(crate) fn clear_stack(&mut self) {
        self.stack.clear();
    }

    /// Copies the top `take` entries and inserts the copies `below` entries further down.
    pub(crate) fn duplicate(&mut self, take: usize, below: usize) {
        let len = self.stack.len();
        let at = len - take - below;
        let copies = self.stack[len - take..].to_vec();
        self.stack.splice(at..at, copies);
    }

    pub(crate) fn swap(&mut self) {
        let len = self.stack.len();
        self.stack.swap(len - 1, len - 2);
    }

    pub(crate) fn locals(&self) -> &[ValueRef] {
        &self.locals
    }

    pub(crate) fn load_local(&self, index: usize) -> Option<ValueRef> {
        self.locals.get(index).cloned()
    }

    pub(crate) fn push_local(&mut self, value: ValueRef) {
        self.locals.push(value);
    }

    /// Overwrites an existing slot; out-of-range slots are ignored.
    pub(crate) fn set_local(&mut self, index: usize, value: ValueRef) {
        if let Some(slot) = self.locals.get_mut(index) {
            *slot = value;
        }
    }
}
