// Instruction table
pub mod isa;
pub use isa::{InstructionSet, Word};

// Assembling
mod parser;
pub use parser::{parse_const, parse_int, AsmParser};
mod program;
pub use program::{Diagnostic, DiagnosticKind, Program, SourceMap};
mod symbol;
pub use symbol::SymbolTable;

// Running
mod runtime;
pub use runtime::{Machine, MachineConfig, MAX_RUNTIME, OUTPUT_PREFIX};
mod state;
pub use state::{Memory, State};
pub mod listener;
pub mod output;
pub mod schedule;

pub mod error;

pub mod env;

/// Amount of lines to show as context, each side of focus line (line containing span).
pub const DIAGNOSTIC_CONTEXT_LINES: usize = 3;

/// Assemble `src`, collecting every diagnostic into the returned [`Program`].
pub fn assemble(isa: &InstructionSet, src: &str) -> Program {
    AsmParser::new(isa, src).parse()
}
