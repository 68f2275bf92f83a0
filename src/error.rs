use std::fmt;
use std::ops::Range;

use miette::{miette, LabeledSpan, Report, Severity};

use crate::program::{Diagnostic, DiagnosticKind};

/// Memory word with no bound instruction. Fatal to the current run.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DecodeError {
    InvalidOpcode(u8),
    InvalidExtended(u8),
}

impl std::error::Error for DecodeError {}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidOpcode(code) => write!(f, "invalid command: {code:X}"),
            Self::InvalidExtended(code) => write!(f, "invalid command: F{code:X}"),
        }
    }
}

// Assembler diagnostics

pub fn diagnostic_report(diag: &Diagnostic, src: &str) -> Report {
    let span = line_span(src, diag.line);
    let message = diag.kind.to_string();
    let report = match &diag.kind {
        DiagnosticKind::InvalidLine => miette!(
            severity = Severity::Error,
            code = "parse::invalid_line",
            help = "a statement is a mnemonic followed by at most one operand",
            labels = vec![LabeledSpan::at(span, "too many tokens")],
            "{message}",
        ),
        DiagnosticKind::UnknownCommand(_) => miette!(
            severity = Severity::Error,
            code = "parse::unknown_command",
            help = "mnemonics are case-sensitive, check the instruction list with `mima isa`",
            labels = vec![LabeledSpan::at(span, "unknown mnemonic")],
            "{message}",
        ),
        DiagnosticKind::UnresolvableConstant(_) => miette!(
            severity = Severity::Error,
            code = "parse::unresolvable",
            help = "define the symbol as a label, a constant or with DS",
            labels = vec![LabeledSpan::at(span, "undefined symbol")],
            "{message}",
        ),
        DiagnosticKind::MissingStart => miette!(
            severity = Severity::Error,
            code = "parse::no_start",
            help = "mark the first instruction to execute with `START:`",
            "{message}",
        ),
    };
    report.with_source_code(src.to_owned())
}

/// Byte range of the trimmed contents of line `idx`.
fn line_span(src: &str, idx: usize) -> Range<usize> {
    let mut offs = 0;
    for (i, line) in src.split('\n').enumerate() {
        if i == idx {
            let start = offs + (line.len() - line.trim_start().len());
            return start..start + line.trim().len();
        }
        offs += line.len() + 1;
    }
    src.len()..src.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_error_names_code() {
        assert_eq!(
            DecodeError::InvalidOpcode(0xD).to_string(),
            "invalid command: D"
        );
        assert_eq!(
            DecodeError::InvalidExtended(0x3).to_string(),
            "invalid command: F3"
        );
    }

    #[test]
    fn spans_cover_trimmed_line() {
        let src = "START: LDC 1\n   FOO 3  \nHLT";
        assert_eq!(line_span(src, 0), 0..12);
        assert_eq!(&src[line_span(src, 1)], "FOO 3");
        assert_eq!(&src[line_span(src, 2)], "HLT");
        assert_eq!(line_span(src, 9), src.len()..src.len());
    }

    #[test]
    fn report_carries_message() {
        let diag = Diagnostic::new(1, DiagnosticKind::InvalidLine);
        let report = diagnostic_report(&diag, "START:\nLDC 1 2 3 4");
        assert_eq!(report.to_string(), "invalid line");
    }
}
