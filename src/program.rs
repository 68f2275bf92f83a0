use std::collections::BTreeMap;
use std::fmt;

use crate::isa::Word;
use crate::symbol::SymbolTable;

/// Assembled memory image with everything needed to run and annotate it.
#[derive(Clone, Debug)]
pub struct Program {
    /// Densely packed, gaps defaulted to zero
    pub memory: Vec<Word>,
    /// Address bound to `START`, if any
    pub start: Option<u32>,
    pub source_map: SourceMap,
    pub symbols: SymbolTable,
    pub diagnostics: Vec<Diagnostic>,
}

impl Program {
    /// A program may only be run when it assembled cleanly and has an entry point.
    pub fn is_runnable(&self) -> bool {
        self.diagnostics.is_empty() && self.start.is_some()
    }
}

/// Memory address -> index of the source line which produced it.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct SourceMap(BTreeMap<u32, usize>);

impl SourceMap {
    pub fn new() -> Self {
        SourceMap(BTreeMap::new())
    }

    pub fn insert(&mut self, addr: u32, line: usize) {
        self.0.insert(addr, line);
    }

    pub fn line(&self, addr: u32) -> Option<usize> {
        self.0.get(&addr).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, usize)> + '_ {
        self.0.iter().map(|(addr, line)| (*addr, *line))
    }
}

/// Advisory message about a source line, collected during assembly.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Diagnostic {
    /// 0-based line index
    pub line: usize,
    pub kind: DiagnosticKind,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum DiagnosticKind {
    /// More tokens than any statement takes.
    InvalidLine,
    /// Mnemonic not in the instruction set. Holds the statement's tokens.
    UnknownCommand(Vec<String>),
    /// Operand symbol defined nowhere in the file.
    UnresolvableConstant(String),
    MissingStart,
}

impl Diagnostic {
    pub fn new(line: usize, kind: DiagnosticKind) -> Self {
        Diagnostic { line, kind }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidLine => write!(f, "invalid line"),
            Self::UnknownCommand(tokens) => write!(f, "unknown command {}", tokens.join(",")),
            Self::UnresolvableConstant(name) => write!(f, "unresolvable constant {name}"),
            Self::MissingStart => write!(f, "could not find START label"),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line + 1, self.kind)
    }
}
