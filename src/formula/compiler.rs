use super::builtins::lookup_builtin;
use super::error::CompileError;
use super::program::{Op, Program, Source};
use super::scalar::Scalar;

/// Maximum nesting of parentheses, function calls and unary minus.
pub const MAX_NESTING: usize = 128;

/// Grammar tiers from loosest to tightest binding.
///
/// Each binary tier only matches its own operator and recurses into the next
/// tier for its operands, so `a+b-c` groups as `a+(b-c)` and `a*b/c` as
/// `a*(b/c)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    Sum,
    Difference,
    Product,
    Quotient,
    Power,
    Atom,
}

impl Tier {
    fn tighter(self) -> Self {
        match self {
            Self::Sum => Self::Difference,
            Self::Difference => Self::Product,
            Self::Product => Self::Quotient,
            Self::Quotient => Self::Power,
            Self::Power | Self::Atom => Self::Atom,
        }
    }

    fn operator(self) -> Option<(u8, Op)> {
        match self {
            Self::Sum => Some((b'+', Op::Add(Source::Stack))),
            Self::Difference => Some((b'-', Op::Sub(Source::Stack))),
            Self::Product => Some((b'*', Op::Mul(Source::Stack))),
            Self::Quotient => Some((b'/', Op::Div(Source::Stack))),
            Self::Power | Self::Atom => None,
        }
    }
}

/// Compile a formula into a fresh program.
pub fn compile<S: Scalar>(source: &str) -> Result<Program<S>, CompileError> {
    let mut program = Program::new();
    compile_into(&mut program, source)?;
    Ok(program)
}

/// Compile a formula into an existing program, replacing its contents.
///
/// On failure the program is left empty.
pub fn compile_into<S: Scalar>(program: &mut Program<S>, source: &str) -> Result<(), CompileError> {
    program.reset();
    let result = Parser {
        src: source,
        bytes: source.as_bytes(),
        pos: 0,
        nesting: 0,
        program: &mut *program,
    }
    .parse();
    if let Err(ref err) = result {
        program.reset();
        tracing::debug!(formula = source, kind = S::NAME, error = %err, "formula failed to compile");
    }
    result
}

struct Parser<'a, S> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    nesting: usize,
    program: &'a mut Program<S>,
}

impl<S: Scalar> Parser<'_, S> {
    fn parse(&mut self) -> Result<(), CompileError> {
        if self.bytes.is_empty() {
            return Err(CompileError::Empty);
        }
        self.tier(Tier::Sum)?;
        if self.pos < self.bytes.len() {
            return Err(self.unexpected());
        }
        Ok(())
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn unexpected(&self) -> CompileError {
        match self.src.get(self.pos..).and_then(|rest| rest.chars().next()) {
            Some(found) => CompileError::Unexpected { found, pos: self.pos },
            None => CompileError::UnexpectedEnd { pos: self.pos },
        }
    }

    fn expect(&mut self, expected: u8) -> Result<(), CompileError> {
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(CompileError::Expected {
                expected: char::from(expected),
                pos: self.pos,
            })
        }
    }

    /// Run `f` one nesting level deeper.
    fn nested(&mut self, f: impl FnOnce(&mut Self) -> Result<(), CompileError>) -> Result<(), CompileError> {
        if self.nesting >= MAX_NESTING {
            return Err(CompileError::TooDeep {
                max: MAX_NESTING,
                pos: self.pos,
            });
        }
        self.nesting += 1;
        let result = f(self);
        self.nesting -= 1;
        result
    }

    fn tier(&mut self, tier: Tier) -> Result<(), CompileError> {
        if tier == Tier::Atom {
            return self.atom();
        }
        self.tier(tier.tighter())?;

        if tier == Tier::Power {
            while self.peek() == Some(b'^') {
                self.pos += 1;
                let exponent = self.integer()?;
                self.program.emit_pow_int(exponent)?;
            }
            return Ok(());
        }

        if let Some((symbol, op)) = tier.operator() {
            while self.peek() == Some(symbol) {
                self.pos += 1;
                self.tier(tier.tighter())?;
                self.program.emit(op)?;
            }
        }
        Ok(())
    }

    fn atom(&mut self) -> Result<(), CompileError> {
        let Some(c) = self.peek() else {
            return Err(CompileError::UnexpectedEnd { pos: self.pos });
        };
        match c {
            b'-' if self.peek_at(1).is_some_and(|n| n.is_ascii_digit()) => self.number(),
            b'-' => {
                self.pos += 1;
                self.nested(|p| {
                    p.tier(Tier::Product)?;
                    p.program.emit(Op::Neg(Source::Stack))
                })
            }
            b'0'..=b'9' => self.number(),
            b'(' => {
                self.pos += 1;
                if self.peek() == Some(b')') {
                    return Err(self.unexpected());
                }
                self.nested(|p| {
                    p.tier(Tier::Sum)?;
                    p.expect(b')')
                })
            }
            c if c.is_ascii_alphabetic() => {
                if self.peek_at(1).is_some_and(|n| n.is_ascii_lowercase()) {
                    self.function()
                } else {
                    self.variable(c)
                }
            }
            _ => Err(self.unexpected()),
        }
    }

    fn skip_digits(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
    }

    /// `-?digits(.digits)?([eE]-?digits)?`
    fn number(&mut self) -> Result<(), CompileError> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        self.skip_digits();
        if self.peek() == Some(b'.') {
            self.pos += 1;
            self.skip_digits();
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            self.pos += 1;
            if self.peek() == Some(b'-') {
                self.pos += 1;
            }
            let digits_start = self.pos;
            self.skip_digits();
            if self.pos == digits_start {
                return Err(CompileError::InvalidNumber { pos: start });
            }
        }
        let value: f64 = self
            .src
            .get(start..self.pos)
            .and_then(|text| text.parse().ok())
            .ok_or(CompileError::InvalidNumber { pos: start })?;
        self.program.push_literal(S::from_real(value))
    }

    /// Integer exponent after `^`: `-?digits`, not followed by a decimal point.
    fn integer(&mut self) -> Result<i32, CompileError> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        let digits_start = self.pos;
        self.skip_digits();
        if self.pos == digits_start || self.peek() == Some(b'.') {
            return Err(CompileError::InvalidExponent { pos: start });
        }
        self.src
            .get(start..self.pos)
            .and_then(|text| text.parse().ok())
            .ok_or(CompileError::InvalidExponent { pos: start })
    }

    fn variable(&mut self, letter: u8) -> Result<(), CompileError> {
        self.pos += 1;
        let slot = letter.to_ascii_lowercase() - b'a';
        self.program.push_var(slot)
    }

    fn function(&mut self) -> Result<(), CompileError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
            self.pos += 1;
        }
        let name = self.src.get(start..self.pos).unwrap_or_default();
        if self.peek() != Some(b'(') {
            return Err(CompileError::Expected { expected: '(', pos: self.pos });
        }
        let builtin = lookup_builtin(name).ok_or_else(|| CompileError::UnknownFunction {
            name: name.to_string(),
            pos: start,
        })?;
        self.pos += 1;
        self.nested(|p| {
            for i in 0..builtin.arity {
                if i > 0 {
                    p.expect(b',')?;
                }
                p.tier(Tier::Sum)?;
            }
            p.expect(b')')?;
            p.program.emit(builtin.op)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use num_complex::Complex64;

    use super::*;
    use crate::formula::program::{Datum, MAX_INSTRUCTIONS};
    use crate::formula::vm::{Evaluator, Variables};

    fn eval_real(src: &str) -> f64 {
        let program = compile::<f64>(src).unwrap();
        Evaluator::new().run(&program, &Variables::new()).unwrap()
    }

    fn eval_real_with(src: &str, vars: &[(char, f64)]) -> f64 {
        let program = compile::<f64>(src).unwrap();
        let mut v = Variables::new();
        for &(name, value) in vars {
            v.set(name, value);
        }
        Evaluator::new().run(&program, &v).unwrap()
    }

    fn eval_complex(src: &str, vars: &[(char, Complex64)]) -> Complex64 {
        let program = compile::<Complex64>(src).unwrap();
        let mut v = Variables::new();
        for &(name, value) in vars {
            v.set(name, value);
        }
        Evaluator::new().run(&program, &v).unwrap()
    }

    // ── Arithmetic ──────────────────────────────────────────────

    #[test]
    fn precedence() {
        assert_eq!(eval_real("1+2*3"), 7.0);
        assert_eq!(eval_real("(1+2)*3"), 9.0);
        assert_eq!(eval_real("2*3^2"), 18.0);
        assert_eq!(eval_real("8/2/2"), 2.0);
        assert_eq!(eval_real("10-4-3"), 3.0);
        assert_eq!(eval_real("2^10"), 1024.0);
        assert_eq!(eval_real("2^-1"), 0.5);
    }

    #[test]
    fn sum_tier_is_looser_than_difference_tier() {
        let p = compile::<f64>("a+b-c").unwrap();
        assert_eq!(p.ops(), &[Op::PushVar, Op::PushVar, Op::Sub(Source::Var), Op::Add(Source::Stack)]);
    }

    #[test]
    fn product_tier_is_looser_than_quotient_tier() {
        let p = compile::<f64>("a*b/c").unwrap();
        assert_eq!(p.ops(), &[Op::PushVar, Op::PushVar, Op::Div(Source::Var), Op::Mul(Source::Stack)]);
        let q = compile::<f64>("a/b*c").unwrap();
        assert_eq!(q.ops(), &[Op::PushVar, Op::Div(Source::Var), Op::Mul(Source::Var)]);
    }

    #[test]
    fn power_chains_fold_left() {
        assert_eq!(eval_real_with("x^2^3", &[('x', 2.0)]), 64.0);
    }

    #[test]
    fn unary_minus() {
        assert_eq!(eval_real("-2^2"), 4.0);
        assert_eq!(eval_real_with("-z^2", &[('z', 3.0)]), -9.0);
        assert_eq!(eval_real_with("-a*b", &[('a', 2.0), ('b', 5.0)]), -10.0);
        assert_eq!(eval_real("2*-3"), -6.0);
        assert_eq!(eval_real("-(1+2)"), -3.0);
        assert_eq!(eval_real("--2"), 2.0);
    }

    #[test]
    fn numeric_literals() {
        assert_eq!(eval_real("1.5e2"), 150.0);
        assert_eq!(eval_real("2E-1"), 0.2);
        assert_eq!(eval_real("2."), 2.0);
        assert_eq!(eval_real("0.25"), 0.25);
    }

    #[test]
    fn variables_fold_to_lowercase() {
        assert_eq!(eval_real_with("Z+1", &[('z', 4.0)]), 5.0);
    }

    // ── Functions ───────────────────────────────────────────────

    #[test]
    fn builtin_calls() {
        assert_eq!(eval_real("sin(0)"), 0.0);
        assert_eq!(eval_real("pow(2,3)"), 8.0);
        assert_eq!(eval_real("abs(-3)"), 3.0);
        assert_eq!(eval_real("Im(3)"), 0.0);
        let r = eval_complex("sqrt(-4)", &[]);
        assert!((r - Complex64::new(0.0, 2.0)).norm() < 1e-12);
        let re = eval_complex("Re(z)+Im(z)", &[('z', Complex64::new(2.0, 5.0))]);
        assert_eq!(re, Complex64::new(7.0, 0.0));
    }

    #[test]
    fn general_power_compiles_for_any_exponent() {
        assert!(compile::<Complex64>("pow(z,c)").is_ok());
        assert!(compile::<Complex64>("pow(z,0.5)").is_ok());
        assert!(compile::<f64>("pow(n/m,2.2)").is_ok());
    }

    // ── Failures ────────────────────────────────────────────────

    #[test]
    fn whole_input_must_be_consumed() {
        assert_eq!(compile::<f64>("").unwrap_err(), CompileError::Empty);
        assert_eq!(
            compile::<f64>("z^2+").unwrap_err(),
            CompileError::UnexpectedEnd { pos: 4 }
        );
        assert_eq!(
            compile::<f64>("z^2 + c").unwrap_err(),
            CompileError::Unexpected { found: ' ', pos: 3 }
        );
        assert_eq!(
            compile::<f64>("z)").unwrap_err(),
            CompileError::Unexpected { found: ')', pos: 1 }
        );
        assert!(compile::<f64>("()").is_err());
        assert!(compile::<f64>("(z").is_err());
    }

    #[test]
    fn caret_needs_an_integer() {
        assert_eq!(
            compile::<f64>("z^2.5").unwrap_err(),
            CompileError::InvalidExponent { pos: 2 }
        );
        assert!(compile::<f64>("z^").is_err());
        assert!(compile::<f64>("z^c").is_err());
        assert!(compile::<f64>("z^-").is_err());
        assert!(compile::<f64>("z^-3").is_ok());
    }

    #[test]
    fn malformed_numbers() {
        assert_eq!(compile::<f64>("1e").unwrap_err(), CompileError::InvalidNumber { pos: 0 });
        assert_eq!(compile::<f64>("1e-").unwrap_err(), CompileError::InvalidNumber { pos: 0 });
        assert!(compile::<f64>(".5").is_err());
    }

    #[test]
    fn function_errors() {
        assert_eq!(
            compile::<f64>("foo(z)").unwrap_err(),
            CompileError::UnknownFunction { name: "foo".into(), pos: 0 }
        );
        assert_eq!(
            compile::<f64>("sin z").unwrap_err(),
            CompileError::Expected { expected: '(', pos: 3 }
        );
        assert_eq!(
            compile::<f64>("sin(z").unwrap_err(),
            CompileError::Expected { expected: ')', pos: 5 }
        );
        assert!(compile::<f64>("pow(z)").is_err());
        assert!(compile::<f64>("sin(z,c)").is_err());
        assert!(compile::<f64>("SIN(z)").is_err());
        // two lowercase letters start a function name, not a product
        assert!(compile::<f64>("zc").is_err());
    }

    #[test]
    fn failed_compile_leaves_program_empty() {
        let mut p = compile::<Complex64>("z^2+c").unwrap();
        assert!(!p.is_empty());
        assert!(compile_into(&mut p, "z^2+").is_err());
        assert!(p.is_empty());
        assert!(p.data().is_empty());
    }

    #[test]
    fn nesting_is_bounded() {
        let deep = format!("{}1{}", "(".repeat(MAX_NESTING + 1), ")".repeat(MAX_NESTING + 1));
        assert!(matches!(
            compile::<f64>(&deep).unwrap_err(),
            CompileError::TooDeep { .. }
        ));
        let ok = format!("{}1{}", "(".repeat(MAX_NESTING), ")".repeat(MAX_NESTING));
        assert_eq!(eval_real(&ok), 1.0);
    }

    #[test]
    fn program_capacity_is_a_compile_error() {
        let long = vec!["1"; MAX_INSTRUCTIONS + 10].join("+");
        assert!(matches!(
            compile::<f64>(&long).unwrap_err(),
            CompileError::ProgramTooLarge { .. }
        ));
    }

    // ── Code shape ──────────────────────────────────────────────

    #[test]
    fn standard_formula_fuses_fully() {
        let p = compile::<Complex64>("z^2+c").unwrap();
        assert_eq!(p.ops(), &[Op::PowInt(Source::Var), Op::Add(Source::Var)]);
        assert_eq!(p.data(), &[Datum::Slot(25), Datum::Exponent(2), Datum::Slot(2)]);
    }

    #[test]
    fn compilation_is_deterministic() {
        let a = compile::<Complex64>("sin(z)*c+pow(z,i)/3.5").unwrap();
        let b = compile::<Complex64>("sin(z)*c+pow(z,i)/3.5").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn z_squared_plus_c_iterates() {
        let z = eval_complex("z^2+c", &[('z', Complex64::new(0.0, 1.0)), ('c', Complex64::new(1.0, 0.0))]);
        assert_eq!(z, Complex64::new(0.0, 0.0));
    }
}
