use std::fmt;

use super::error::{CompileError, VmError};
use super::scalar::Scalar;
use super::vm::{Variables, STACK_SIZE, VARIABLE_COUNT};

/// Maximum number of instructions in one program.
pub const MAX_INSTRUCTIONS: usize = 256;

/// Where a computational opcode reads its last operand from.
///
/// `Stack` is the plain form. `Var` and `Literal` are the fused forms produced
/// when the instruction directly follows a push: the operand is read from the
/// data stream instead of being materialized on the stack first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Stack,
    Var,
    Literal,
}

/// One-argument built-in functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func {
    Sin,
    Cos,
    Tan,
    Exp,
    Log,
    Re,
    Im,
    Sqrt,
    Abs,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Asinh,
    Acosh,
    Atanh,
}

impl Func {
    #[inline]
    pub fn apply<S: Scalar>(self, x: S) -> S {
        match self {
            Self::Sin => x.sin(),
            Self::Cos => x.cos(),
            Self::Tan => x.tan(),
            Self::Exp => x.exp(),
            Self::Log => x.ln(),
            Self::Re => x.re(),
            Self::Im => x.im(),
            Self::Sqrt => x.sqrt(),
            Self::Abs => x.abs(),
            Self::Asin => x.asin(),
            Self::Acos => x.acos(),
            Self::Atan => x.atan(),
            Self::Sinh => x.sinh(),
            Self::Cosh => x.cosh(),
            Self::Tanh => x.tanh(),
            Self::Asinh => x.asinh(),
            Self::Acosh => x.acosh(),
            Self::Atanh => x.atanh(),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Sin => "sin",
            Self::Cos => "cos",
            Self::Tan => "tan",
            Self::Exp => "exp",
            Self::Log => "log",
            Self::Re => "Re",
            Self::Im => "Im",
            Self::Sqrt => "sqrt",
            Self::Abs => "abs",
            Self::Asin => "asin",
            Self::Acos => "acos",
            Self::Atan => "atan",
            Self::Sinh => "sinh",
            Self::Cosh => "cosh",
            Self::Tanh => "tanh",
            Self::Asinh => "asinh",
            Self::Acosh => "acosh",
            Self::Atanh => "atanh",
        }
    }
}

/// Bytecode operations for the stack VM.
///
/// Binary ops with a fused source combine the top of stack with the operand
/// read from the data stream. Unary ops with a fused source push the result
/// of applying themselves to that operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// Push the variable whose slot index is next in the data stream.
    PushVar,
    /// Push the literal that is next in the data stream.
    PushLiteral,

    Add(Source),
    Sub(Source),
    Mul(Source),
    Div(Source),
    Neg(Source),
    /// Reciprocal.
    Inv(Source),
    /// Integer power; the exponent follows the operand in the data stream.
    PowInt(Source),
    /// General power, `pow(base, exponent)`.
    Pow(Source),
    Call(Func, Source),
}

impl Op {
    pub fn is_push(self) -> bool {
        matches!(self, Self::PushVar | Self::PushLiteral)
    }

    pub fn source(self) -> Option<Source> {
        match self {
            Self::PushVar | Self::PushLiteral => None,
            Self::Add(s)
            | Self::Sub(s)
            | Self::Mul(s)
            | Self::Div(s)
            | Self::Neg(s)
            | Self::Inv(s)
            | Self::PowInt(s)
            | Self::Pow(s)
            | Self::Call(_, s) => Some(s),
        }
    }

    /// Same operation reading its operand from `source`. Pushes have no fused form.
    pub fn with_source(self, source: Source) -> Option<Self> {
        Some(match self {
            Self::PushVar | Self::PushLiteral => return None,
            Self::Add(_) => Self::Add(source),
            Self::Sub(_) => Self::Sub(source),
            Self::Mul(_) => Self::Mul(source),
            Self::Div(_) => Self::Div(source),
            Self::Neg(_) => Self::Neg(source),
            Self::Inv(_) => Self::Inv(source),
            Self::PowInt(_) => Self::PowInt(source),
            Self::Pow(_) => Self::Pow(source),
            Self::Call(f, _) => Self::Call(f, source),
        })
    }

    /// Number of stack operands the plain (`Source::Stack`) form consumes.
    pub fn arity(self) -> usize {
        match self {
            Self::PushVar | Self::PushLiteral => 0,
            Self::Add(_) | Self::Sub(_) | Self::Mul(_) | Self::Div(_) | Self::Pow(_) => 2,
            Self::Neg(_) | Self::Inv(_) | Self::PowInt(_) | Self::Call(..) => 1,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Self::PushVar | Self::PushLiteral => "push",
            Self::Add(_) => "add",
            Self::Sub(_) => "sub",
            Self::Mul(_) => "mul",
            Self::Div(_) => "div",
            Self::Neg(_) => "neg",
            Self::Inv(_) => "inv",
            Self::PowInt(_) => "powi",
            Self::Pow(_) => "pow",
            Self::Call(f, _) => f.name(),
        }
    }
}

/// Entry in the operand stream that runs alongside the instruction stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Datum<S> {
    Slot(u8),
    Literal(S),
    Exponent(i32),
}

/// A compiled formula: instruction stream plus the parallel data stream.
///
/// Built through `push_var`/`push_literal`/`emit`, which keep a running count
/// of stack depth so overflow and underflow are rejected while compiling
/// rather than discovered at run time.
#[derive(Debug, Clone, PartialEq)]
pub struct Program<S> {
    ops: Vec<Op>,
    data: Vec<Datum<S>>,
    depth: usize,
    max_depth: usize,
}

impl<S: Scalar> Default for Program<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Scalar> Program<S> {
    pub fn new() -> Self {
        Self {
            ops: Vec::new(),
            data: Vec::new(),
            depth: 0,
            max_depth: 0,
        }
    }

    /// Drop every instruction and operand.
    pub fn reset(&mut self) {
        self.ops.clear();
        self.data.clear();
        self.depth = 0;
        self.max_depth = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn data(&self) -> &[Datum<S>] {
        &self.data
    }

    /// Deepest stack the program reaches (counted before fusion, so an upper bound).
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Values left on the stack after the emitted instructions run.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn push_var(&mut self, slot: u8) -> Result<(), CompileError> {
        if usize::from(slot) >= VARIABLE_COUNT {
            return Err(CompileError::InvalidSlot { slot });
        }
        self.append_push(Op::PushVar, Datum::Slot(slot))
    }

    pub fn push_literal(&mut self, value: S) -> Result<(), CompileError> {
        self.append_push(Op::PushLiteral, Datum::Literal(value))
    }

    /// Emit a computational instruction in its plain form, fusing it with a
    /// directly preceding push.
    pub fn emit(&mut self, op: Op) -> Result<(), CompileError> {
        if op.is_push() || op.source() != Some(Source::Stack) || matches!(op, Op::PowInt(_)) {
            return Err(CompileError::NotEmittable { op: op.mnemonic() });
        }
        self.emit_computation(op)
    }

    /// Emit an integer power with its exponent.
    pub fn emit_pow_int(&mut self, exponent: i32) -> Result<(), CompileError> {
        self.emit_computation(Op::PowInt(Source::Stack))?;
        self.data.push(Datum::Exponent(exponent));
        Ok(())
    }

    fn append_push(&mut self, op: Op, datum: Datum<S>) -> Result<(), CompileError> {
        // Depth first: a run of pushes reaches both bounds on the same instruction.
        if self.depth >= STACK_SIZE {
            return Err(CompileError::StackOverflow { max: STACK_SIZE });
        }
        if self.ops.len() >= MAX_INSTRUCTIONS {
            return Err(CompileError::ProgramTooLarge { max: MAX_INSTRUCTIONS });
        }
        self.ops.push(op);
        self.data.push(datum);
        self.depth += 1;
        self.max_depth = self.max_depth.max(self.depth);
        Ok(())
    }

    fn emit_computation(&mut self, op: Op) -> Result<(), CompileError> {
        let needed = op.arity();
        if self.depth < needed {
            return Err(CompileError::StackUnderflow {
                op: op.mnemonic(),
                needed,
                depth: self.depth,
            });
        }
        self.depth = self.depth + 1 - needed;

        let fused = match self.ops.last() {
            Some(Op::PushVar) => op.with_source(Source::Var),
            Some(Op::PushLiteral) => op.with_source(Source::Literal),
            _ => None,
        };
        match (fused, self.ops.last_mut()) {
            (Some(fused), Some(last)) => *last = fused,
            _ => {
                if self.ops.len() >= MAX_INSTRUCTIONS {
                    return Err(CompileError::ProgramTooLarge { max: MAX_INSTRUCTIONS });
                }
                self.ops.push(op);
            }
        }
        Ok(())
    }
}

/// Sequential reader over a program's data stream.
pub(crate) struct DataCursor<'a, S> {
    data: &'a [Datum<S>],
    pos: usize,
}

impl<'a, S: Scalar> DataCursor<'a, S> {
    pub(crate) fn new(data: &'a [Datum<S>]) -> Self {
        Self { data, pos: 0 }
    }

    #[inline]
    fn next(&mut self, ip: usize) -> Result<Datum<S>, VmError> {
        let datum = self
            .data
            .get(self.pos)
            .copied()
            .ok_or(VmError::DataExhausted { ip })?;
        self.pos += 1;
        Ok(datum)
    }

    #[inline]
    pub(crate) fn variable(&mut self, vars: &Variables<S>, ip: usize) -> Result<S, VmError> {
        match self.next(ip)? {
            Datum::Slot(slot) => vars
                .get_slot(usize::from(slot))
                .ok_or(VmError::InvalidSlot { ip, slot }),
            _ => Err(VmError::DataMismatch { ip, expected: "a variable slot" }),
        }
    }

    #[inline]
    pub(crate) fn literal(&mut self, ip: usize) -> Result<S, VmError> {
        match self.next(ip)? {
            Datum::Literal(value) => Ok(value),
            _ => Err(VmError::DataMismatch { ip, expected: "a literal" }),
        }
    }

    #[inline]
    pub(crate) fn exponent(&mut self, ip: usize) -> Result<i32, VmError> {
        match self.next(ip)? {
            Datum::Exponent(n) => Ok(n),
            _ => Err(VmError::DataMismatch { ip, expected: "an integer exponent" }),
        }
    }

    /// Read the operand of a fused instruction.
    #[inline]
    pub(crate) fn operand(
        &mut self,
        source: Source,
        vars: &Variables<S>,
        ip: usize,
    ) -> Result<S, VmError> {
        match source {
            Source::Var => self.variable(vars, ip),
            Source::Literal => self.literal(ip),
            Source::Stack => Err(VmError::DataMismatch { ip, expected: "a fused operand" }),
        }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }
}

fn slot_name(slot: u8) -> char {
    char::from(b'a'.saturating_add(slot))
}

/// Disassembly listing, one instruction per line.
impl<S: Scalar> fmt::Display for Program<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "; {} program, {} instructions, max stack {}",
            S::NAME,
            self.ops.len(),
            self.max_depth
        )?;
        let mut data = self.data.iter();
        for (ip, op) in self.ops.iter().enumerate() {
            let suffix = match op.source() {
                None if *op == Op::PushVar => ".var",
                None => ".lit",
                Some(Source::Stack) => "",
                Some(Source::Var) => ".var",
                Some(Source::Literal) => ".lit",
            };
            write!(f, "{ip:04}  {}{suffix}", op.mnemonic())?;
            if op.source() != Some(Source::Stack) {
                match data.next() {
                    Some(Datum::Slot(slot)) => write!(f, " {}", slot_name(*slot))?,
                    Some(Datum::Literal(v)) => write!(f, " {v}")?,
                    Some(Datum::Exponent(n)) => write!(f, " ?{n}")?,
                    None => write!(f, " <missing>")?,
                }
            }
            if matches!(op, Op::PowInt(_)) {
                match data.next() {
                    Some(Datum::Exponent(n)) => write!(f, " {n}")?,
                    _ => write!(f, " <missing exponent>")?,
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn push_then_add_fuses() {
        let mut p = Program::<f64>::new();
        p.push_var(0).unwrap();
        p.push_var(1).unwrap();
        p.emit(Op::Add(Source::Stack)).unwrap();
        assert_eq!(p.ops(), &[Op::PushVar, Op::Add(Source::Var)]);
        assert_eq!(p.data(), &[Datum::Slot(0), Datum::Slot(1)]);
        assert_eq!(p.depth(), 1);
    }

    #[test]
    fn literal_push_fuses_into_literal_form() {
        let mut p = Program::<f64>::new();
        p.push_literal(2.0).unwrap();
        p.emit(Op::Call(Func::Sin, Source::Stack)).unwrap();
        assert_eq!(p.ops(), &[Op::Call(Func::Sin, Source::Literal)]);
    }

    #[test]
    fn op_after_computation_stays_plain() {
        let mut p = Program::<f64>::new();
        p.push_var(0).unwrap();
        p.push_var(1).unwrap();
        p.emit(Op::Mul(Source::Stack)).unwrap();
        p.emit(Op::Neg(Source::Stack)).unwrap();
        assert_eq!(
            p.ops(),
            &[Op::PushVar, Op::Mul(Source::Var), Op::Neg(Source::Stack)]
        );
    }

    #[test]
    fn pow_int_exponent_follows_fused_operand() {
        let mut p = Program::<f64>::new();
        p.push_var(25).unwrap();
        p.emit_pow_int(2).unwrap();
        assert_eq!(p.ops(), &[Op::PowInt(Source::Var)]);
        assert_eq!(p.data(), &[Datum::Slot(25), Datum::Exponent(2)]);
    }

    #[test]
    fn underflow_is_rejected_at_emit() {
        let mut p = Program::<f64>::new();
        p.push_var(0).unwrap();
        let err = p.emit(Op::Add(Source::Stack)).unwrap_err();
        assert_eq!(err, CompileError::StackUnderflow { op: "add", needed: 2, depth: 1 });
    }

    #[test]
    fn fused_forms_cannot_be_emitted_directly() {
        let mut p = Program::<f64>::new();
        p.push_var(0).unwrap();
        assert!(matches!(
            p.emit(Op::Neg(Source::Var)),
            Err(CompileError::NotEmittable { .. })
        ));
        assert!(matches!(p.emit(Op::PushVar), Err(CompileError::NotEmittable { .. })));
    }

    #[test]
    fn slot_out_of_range_is_rejected() {
        let mut p = Program::<f64>::new();
        assert_eq!(p.push_var(26), Err(CompileError::InvalidSlot { slot: 26 }));
    }

    #[test]
    fn stack_capacity_is_enforced() {
        let mut p = Program::<f64>::new();
        for _ in 0..STACK_SIZE {
            p.push_literal(1.0).unwrap();
        }
        assert_eq!(
            p.push_literal(1.0),
            Err(CompileError::StackOverflow { max: STACK_SIZE })
        );
        assert_eq!(p.len(), STACK_SIZE);
        assert_eq!(p.max_depth(), STACK_SIZE);
    }

    #[test]
    fn folding_frees_stack_but_not_instructions() {
        let mut p = Program::<f64>::new();
        p.push_literal(1.0).unwrap();
        while p.len() < MAX_INSTRUCTIONS {
            p.push_var(0).unwrap();
            p.emit(Op::Add(Source::Stack)).unwrap();
        }
        assert_eq!(p.depth(), 1);
        assert_eq!(
            p.push_literal(1.0),
            Err(CompileError::ProgramTooLarge { max: MAX_INSTRUCTIONS })
        );
    }

    #[test]
    fn instruction_capacity_is_enforced() {
        let mut p = Program::<f64>::new();
        p.push_literal(1.0).unwrap();
        // the first neg fuses into the push, the rest append
        while p.len() < MAX_INSTRUCTIONS {
            p.emit(Op::Neg(Source::Stack)).unwrap();
        }
        assert_eq!(
            p.emit(Op::Neg(Source::Stack)),
            Err(CompileError::ProgramTooLarge { max: MAX_INSTRUCTIONS })
        );
    }

    #[test]
    fn reset_empties_both_streams() {
        let mut p = Program::<f64>::new();
        p.push_var(3).unwrap();
        p.reset();
        assert!(p.is_empty());
        assert!(p.data().is_empty());
        assert_eq!(p.max_depth(), 0);
    }

    #[test]
    fn disassembly_lists_operands() {
        let mut p = Program::<f64>::new();
        p.push_var(25).unwrap();
        p.emit_pow_int(2).unwrap();
        p.push_var(2).unwrap();
        p.emit(Op::Add(Source::Stack)).unwrap();
        let text = p.to_string();
        assert!(text.contains("0000  powi.var z 2"), "{text}");
        assert!(text.contains("0001  add.var c"), "{text}");
    }
}
