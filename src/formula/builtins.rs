use super::program::{Func, Op, Source};

/// Built-in function: name, argument count and the opcode it compiles to.
/// Adding a builtin means adding ONE entry here; the compiler and the CLI
/// reference listing both read from this table.
#[derive(Debug, Clone)]
pub struct Builtin {
    pub name: &'static str,
    pub arity: usize,
    pub op: Op,
    pub description: &'static str,
}

const fn call(name: &'static str, func: Func, description: &'static str) -> Builtin {
    Builtin {
        name,
        arity: 1,
        op: Op::Call(func, Source::Stack),
        description,
    }
}

/// All built-in functions available in formulas. Lookup is case-sensitive.
pub static BUILTINS: &[Builtin] = &[
    // ── Trigonometric ───────────────────────────────────────────
    call("sin", Func::Sin, "Sine"),
    call("cos", Func::Cos, "Cosine"),
    call("tan", Func::Tan, "Tangent"),
    // ── Exponential ─────────────────────────────────────────────
    call("exp", Func::Exp, "Natural exponential"),
    Builtin {
        name: "pow",
        arity: 2,
        op: Op::Pow(Source::Stack),
        description: "General power pow(base, exponent)",
    },
    call("log", Func::Log, "Natural logarithm (principal branch)"),
    // ── Parts ───────────────────────────────────────────────────
    call("Re", Func::Re, "Real part"),
    call("Im", Func::Im, "Imaginary part (zero for reals)"),
    call("sqrt", Func::Sqrt, "Square root (principal branch)"),
    call("abs", Func::Abs, "Absolute value or modulus"),
    // ── Inverse trigonometric ───────────────────────────────────
    call("asin", Func::Asin, "Arc sine"),
    call("acos", Func::Acos, "Arc cosine"),
    call("atan", Func::Atan, "Arc tangent"),
    // ── Hyperbolic ──────────────────────────────────────────────
    call("sinh", Func::Sinh, "Hyperbolic sine"),
    call("cosh", Func::Cosh, "Hyperbolic cosine"),
    call("tanh", Func::Tanh, "Hyperbolic tangent"),
    call("asinh", Func::Asinh, "Inverse hyperbolic sine"),
    call("acosh", Func::Acosh, "Inverse hyperbolic cosine"),
    call("atanh", Func::Atanh, "Inverse hyperbolic tangent"),
];

pub fn lookup_builtin(name: &str) -> Option<&'static Builtin> {
    BUILTINS.iter().find(|b| b.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_has_nineteen_entries() {
        assert_eq!(BUILTINS.len(), 19);
    }

    #[test]
    fn only_pow_takes_two_arguments() {
        for b in BUILTINS {
            let expected = if b.name == "pow" { 2 } else { 1 };
            assert_eq!(b.arity, expected, "{}", b.name);
        }
    }

    #[test]
    fn lookup_is_case_sensitive() {
        assert!(lookup_builtin("Re").is_some());
        assert!(lookup_builtin("re").is_none());
        assert!(lookup_builtin("SIN").is_none());
    }

    #[test]
    fn call_entries_name_their_function() {
        for b in BUILTINS {
            if let Op::Call(func, _) = b.op {
                assert_eq!(func.name(), b.name);
            }
        }
    }
}
