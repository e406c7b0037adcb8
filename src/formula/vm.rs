use super::error::VmError;
use super::program::{DataCursor, Op, Program, Source};
use super::scalar::Scalar;

/// Maximum evaluation stack depth.
pub const STACK_SIZE: usize = 256;

/// Number of named variable slots, `a` through `z`.
pub const VARIABLE_COUNT: usize = 26;

/// The 26 single-letter variables a program can read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Variables<S> {
    slots: [S; VARIABLE_COUNT],
}

impl<S: Scalar> Default for Variables<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Scalar> Variables<S> {
    pub fn new() -> Self {
        Self {
            slots: [S::zero(); VARIABLE_COUNT],
        }
    }

    /// Slot index for a letter, case-insensitive.
    pub fn slot_of(name: char) -> Option<usize> {
        let lower = name.to_ascii_lowercase();
        lower
            .is_ascii_lowercase()
            .then(|| usize::from(lower as u8 - b'a'))
    }

    /// Set a variable by letter. Returns false for non-letters.
    pub fn set(&mut self, name: char, value: S) -> bool {
        match Self::slot_of(name).and_then(|i| self.slots.get_mut(i)) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, name: char) -> Option<S> {
        Self::slot_of(name).and_then(|i| self.get_slot(i))
    }

    #[inline]
    pub fn get_slot(&self, index: usize) -> Option<S> {
        self.slots.get(index).copied()
    }

    #[inline]
    pub fn slot_mut(&mut self, index: usize) -> Option<&mut S> {
        self.slots.get_mut(index)
    }
}

/// Reusable VM working memory. Create once per formula and reuse across
/// pixels so the per-pixel hot path does not allocate.
#[derive(Debug, Default)]
pub struct Evaluator<S> {
    stack: Vec<S>,
}

impl<S: Scalar> Evaluator<S> {
    pub fn new() -> Self {
        Self {
            stack: Vec::with_capacity(32),
        }
    }

    /// Clear the stack.
    pub fn reset(&mut self) {
        self.stack.clear();
    }

    /// Top of the stack, left in place.
    pub fn result(&self) -> Option<S> {
        self.stack.last().copied()
    }

    pub fn pop(&mut self) -> Option<S> {
        self.stack.pop()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Execute `program` against `vars` and return its value.
    ///
    /// An empty program evaluates to zero. On success exactly one value is
    /// left on the stack, readable again through `result`.
    pub fn run(&mut self, program: &Program<S>, vars: &Variables<S>) -> Result<S, VmError> {
        self.stack.clear();
        if program.is_empty() {
            self.stack.push(S::zero());
            return Ok(S::zero());
        }

        let mut data = DataCursor::new(program.data());
        for (ip, &op) in program.ops().iter().enumerate() {
            match op {
                Op::PushVar => {
                    let v = data.variable(vars, ip)?;
                    self.push(v, ip)?;
                }
                Op::PushLiteral => {
                    let v = data.literal(ip)?;
                    self.push(v, ip)?;
                }
                Op::Add(src) => self.binary(src, &mut data, vars, ip, |a, b| a + b)?,
                Op::Sub(src) => self.binary(src, &mut data, vars, ip, |a, b| a - b)?,
                Op::Mul(src) => self.binary(src, &mut data, vars, ip, |a, b| a * b)?,
                Op::Div(src) => self.binary(src, &mut data, vars, ip, |a, b| a / b)?,
                Op::Pow(src) => self.binary(src, &mut data, vars, ip, S::pow)?,
                Op::Neg(src) => self.unary(src, &mut data, vars, ip, |x| -x)?,
                Op::Inv(src) => self.unary(src, &mut data, vars, ip, S::recip)?,
                Op::Call(func, src) => self.unary(src, &mut data, vars, ip, |x| func.apply(x))?,
                Op::PowInt(src) => {
                    let base = match src {
                        Source::Stack => self.stack.pop().ok_or(VmError::StackUnderflow { ip })?,
                        _ => data.operand(src, vars, ip)?,
                    };
                    let n = data.exponent(ip)?;
                    self.push(base.powi(n), ip)?;
                }
            }
        }

        if data.remaining() > 0 {
            return Err(VmError::TrailingData {
                remaining: data.remaining(),
            });
        }
        match (self.stack.len(), self.stack.last()) {
            (1, Some(&v)) => Ok(v),
            (depth, _) => Err(VmError::Unbalanced { depth }),
        }
    }

    #[inline]
    fn push(&mut self, v: S, ip: usize) -> Result<(), VmError> {
        if self.stack.len() >= STACK_SIZE {
            return Err(VmError::StackOverflow { ip, max: STACK_SIZE });
        }
        self.stack.push(v);
        Ok(())
    }

    #[inline]
    fn binary(
        &mut self,
        src: Source,
        data: &mut DataCursor<'_, S>,
        vars: &Variables<S>,
        ip: usize,
        f: impl FnOnce(S, S) -> S,
    ) -> Result<(), VmError> {
        let rhs = match src {
            Source::Stack => self.stack.pop().ok_or(VmError::StackUnderflow { ip })?,
            _ => data.operand(src, vars, ip)?,
        };
        let lhs = self.stack.last_mut().ok_or(VmError::StackUnderflow { ip })?;
        *lhs = f(*lhs, rhs);
        Ok(())
    }

    #[inline]
    fn unary(
        &mut self,
        src: Source,
        data: &mut DataCursor<'_, S>,
        vars: &Variables<S>,
        ip: usize,
        f: impl FnOnce(S) -> S,
    ) -> Result<(), VmError> {
        match src {
            Source::Stack => {
                let top = self.stack.last_mut().ok_or(VmError::StackUnderflow { ip })?;
                *top = f(*top);
                Ok(())
            }
            _ => {
                let x = data.operand(src, vars, ip)?;
                self.push(f(x), ip)
            }
        }
    }
}
