pub mod builtins;
pub mod compiler;
pub mod error;
pub mod program;
pub mod scalar;
pub mod vm;

pub use compiler::{compile, compile_into};
pub use error::{CompileError, VmError};
pub use program::{Datum, Func, Op, Program, Source};
pub use scalar::Scalar;
pub use vm::{Evaluator, Variables};

/// Compile and evaluate a formula once, with every variable at zero except
/// those given. Handy for constant palette formulas and quick checks.
///
/// source → parse → `Program` → `Evaluator::run`
pub fn evaluate<S: Scalar>(source: &str, vars: &[(char, S)]) -> Result<S, crate::error::AppError> {
    let program = compile::<S>(source)?;
    let mut variables = Variables::new();
    for &(name, value) in vars {
        variables.set(name, value);
    }
    Ok(Evaluator::new().run(&program, &variables)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use num_complex::Complex64;

    use super::*;

    #[test]
    fn evaluate_real_formula() {
        assert_eq!(evaluate("n/m*(w-1)", &[('n', 50.0), ('m', 100.0), ('w', 257.0)]).unwrap(), 128.0);
    }

    #[test]
    fn evaluate_uses_imaginary_unit_slot() {
        let i = Complex64::new(0.0, 1.0);
        assert_eq!(evaluate("i^2", &[('i', i)]).unwrap(), Complex64::new(-1.0, 0.0));
    }

    #[test]
    fn evaluate_surfaces_compile_errors() {
        assert!(matches!(
            evaluate::<f64>("1+", &[]),
            Err(crate::error::AppError::Compile(CompileError::UnexpectedEnd { .. }))
        ));
    }
}
