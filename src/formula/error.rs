/// Why a formula failed to compile. Offsets are byte positions into the source.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("formula is empty")]
    Empty,
    #[error("unexpected '{found}'")]
    Unexpected { found: char, pos: usize },
    #[error("unexpected end of formula")]
    UnexpectedEnd { pos: usize },
    #[error("expected '{expected}'")]
    Expected { expected: char, pos: usize },
    #[error("malformed number")]
    InvalidNumber { pos: usize },
    #[error("'^' must be followed by an integer exponent")]
    InvalidExponent { pos: usize },
    #[error("unknown function '{name}'")]
    UnknownFunction { name: String, pos: usize },
    #[error("expression nests deeper than {max} levels")]
    TooDeep { max: usize, pos: usize },
    #[error("evaluation stack would exceed {max} entries")]
    StackOverflow { max: usize },
    #[error("program exceeds {max} instructions")]
    ProgramTooLarge { max: usize },
    #[error("variable slot {slot} out of range")]
    InvalidSlot { slot: u8 },
    #[error("'{op}' needs {needed} operand(s) on the stack, found {depth}")]
    StackUnderflow { op: &'static str, needed: usize, depth: usize },
    #[error("'{op}' cannot be emitted as a standalone instruction")]
    NotEmittable { op: &'static str },
}

impl CompileError {
    /// Byte offset the error points at, when it has one.
    pub fn offset(&self) -> Option<usize> {
        match self {
            Self::Unexpected { pos, .. }
            | Self::UnexpectedEnd { pos }
            | Self::Expected { pos, .. }
            | Self::InvalidNumber { pos }
            | Self::InvalidExponent { pos }
            | Self::UnknownFunction { pos, .. }
            | Self::TooDeep { pos, .. } => Some(*pos),
            Self::Empty
            | Self::StackOverflow { .. }
            | Self::ProgramTooLarge { .. }
            | Self::InvalidSlot { .. }
            | Self::StackUnderflow { .. }
            | Self::NotEmittable { .. } => None,
        }
    }

    /// Format the error with the formula and a caret under the offending column.
    pub fn format_with_source(&self, source: &str) -> String {
        match self.offset() {
            Some(pos) => {
                let col = source
                    .char_indices()
                    .take_while(|(i, _)| *i < pos)
                    .count();
                format!(
                    "[compile] offset {pos}: {self}\n  {source}\n  {caret:>width$}",
                    caret = "^",
                    width = col + 1,
                )
            }
            None => format!("[compile] {self}"),
        }
    }
}

/// Fault raised while executing a program. Programs produced by the compiler
/// never trigger these; they guard hand-assembled or corrupted programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VmError {
    #[error("stack underflow at instruction {ip}")]
    StackUnderflow { ip: usize },
    #[error("stack overflow at instruction {ip} (limit {max})")]
    StackOverflow { ip: usize, max: usize },
    #[error("data stream exhausted at instruction {ip}")]
    DataExhausted { ip: usize },
    #[error("instruction {ip} expected {expected} in the data stream")]
    DataMismatch { ip: usize, expected: &'static str },
    #[error("variable slot {slot} out of range at instruction {ip}")]
    InvalidSlot { ip: usize, slot: u8 },
    #[error("program left {depth} values on the stack instead of one")]
    Unbalanced { depth: usize },
    #[error("{remaining} data entries left unread after the last instruction")]
    TrailingData { remaining: usize },
}
