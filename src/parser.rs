use crate::isa::{InstructionSet, Word, ADDRESS_MASK, RESERVE};
use crate::program::{Diagnostic, DiagnosticKind, Program, SourceMap};
use crate::symbol::{SymbolTable, POINTER, START};

/// Statement whose operand symbol was not yet defined when the line was scanned.
#[derive(Debug)]
struct Backpatch<'a> {
    line: usize,
    mnemonic: &'a str,
    symbol: &'a str,
    addr: u32,
}

/// Transforms source text into a [`Program`].
///
/// Assembly never stops at the first problem: every diagnostic is collected and the best-effort
/// memory image is returned alongside them.
pub struct AsmParser<'a> {
    isa: &'a InstructionSet,
    src: &'a str,
    symbols: SymbolTable,
    memory: Vec<Word>,
    source_map: SourceMap,
    diagnostics: Vec<Diagnostic>,
    backpatches: Vec<Backpatch<'a>>,
    /// Current write address
    pointer: u32,
    /// One past the highest address assigned a word or slot
    reached: u32,
}

impl<'a> AsmParser<'a> {
    pub fn new(isa: &'a InstructionSet, src: &'a str) -> Self {
        AsmParser {
            isa,
            src,
            symbols: SymbolTable::new(),
            memory: Vec::new(),
            source_map: SourceMap::new(),
            diagnostics: Vec::new(),
            backpatches: Vec::new(),
            pointer: 0,
            reached: 0,
        }
    }

    pub fn parse(mut self) -> Program {
        let src = self.src;
        for (idx, line) in src.split('\n').enumerate() {
            self.parse_line(idx, line);
        }
        self.backpatch();

        // Close gaps left by relocation or unencodable statements. A trailing relocation
        // claims no slot, so it does not extend the image.
        if self.memory.len() < self.reached as usize {
            self.memory.resize(self.reached as usize, 0);
        }

        let start = self.symbols.get(START);
        if start.is_none() {
            self.diagnostics
                .push(Diagnostic::new(0, DiagnosticKind::MissingStart));
        }

        Program {
            memory: self.memory,
            start,
            source_map: self.source_map,
            symbols: self.symbols,
            diagnostics: self.diagnostics,
        }
    }

    fn parse_line(&mut self, idx: usize, line: &'a str) {
        let line = match line.split_once(';') {
            Some((code, _comment)) => code.trim(),
            None => line.trim(),
        };
        if line.is_empty() {
            return;
        }

        // Constant or relocation
        if let Some((name, value)) = line.split_once('=') {
            let (name, value) = (name.trim(), parse_const(value));
            if name == POINTER {
                self.pointer = value as u32 & ADDRESS_MASK;
            } else {
                self.symbols.define(name, value as u32 & ADDRESS_MASK);
            }
            return;
        }

        let stmt = match line.split_once(':') {
            Some((label, rest)) => {
                self.symbols.define(label.trim(), self.pointer);
                rest.trim()
            }
            None => line,
        };
        if !stmt.is_empty() {
            self.parse_stmt(idx, stmt);
        }
    }

    fn parse_stmt(&mut self, idx: usize, stmt: &'a str) {
        let tokens: Vec<&'a str> = stmt.split_whitespace().collect();

        if tokens
            .get(1)
            .is_some_and(|tok| tok.eq_ignore_ascii_case(RESERVE))
        {
            let value = parse_const(tokens.get(2).copied().unwrap_or_default());
            self.symbols.define(tokens[0], self.pointer);
            self.emit(idx, value as Word);
            return;
        }

        if tokens.len() > 3 {
            self.diagnostics
                .push(Diagnostic::new(idx, DiagnosticKind::InvalidLine));
            return;
        }

        let mnemonic = tokens[0];
        let operand = match tokens.get(1) {
            None => Some(0),
            Some(tok) => parse_int(tok).or_else(|| self.symbols.get(tok).map(i64::from)),
        };

        self.source_map.insert(self.pointer, idx);
        let unknown = || {
            let tokens = tokens.iter().map(|tok| tok.to_string()).collect();
            Diagnostic::new(idx, DiagnosticKind::UnknownCommand(tokens))
        };
        match operand {
            Some(operand) => match self.isa.encode(mnemonic, operand) {
                Some(word) => self.write(self.pointer, word),
                None => self.diagnostics.push(unknown()),
            },
            None if !self.isa.knows(mnemonic) => self.diagnostics.push(unknown()),
            None => self.backpatches.push(Backpatch {
                line: idx,
                mnemonic,
                symbol: tokens[1],
                addr: self.pointer,
            }),
        }
        self.advance();
    }

    /// Second pass: resolve forward references against the complete symbol table.
    fn backpatch(&mut self) {
        for patch in std::mem::take(&mut self.backpatches) {
            let Some(value) = self.symbols.get(patch.symbol) else {
                self.diagnostics.push(Diagnostic::new(
                    patch.line,
                    DiagnosticKind::UnresolvableConstant(patch.symbol.to_owned()),
                ));
                continue;
            };
            if let Some(word) = self.isa.encode(patch.mnemonic, value.into()) {
                self.write(patch.addr, word);
            }
        }
    }

    /// Write a data word at the current address and advance.
    fn emit(&mut self, idx: usize, word: Word) {
        self.source_map.insert(self.pointer, idx);
        self.write(self.pointer, word);
        self.advance();
    }

    fn write(&mut self, addr: u32, word: Word) {
        let addr = addr as usize;
        if addr >= self.memory.len() {
            self.memory.resize(addr + 1, 0);
        }
        self.memory[addr] = word;
    }

    /// Claim the slot at the current address and move past it.
    fn advance(&mut self) {
        self.pointer += 1;
        self.reached = self.reached.max(self.pointer);
    }
}

/// Lenient integer literal: optional sign, `0x` prefix for hex, longest valid digit prefix.
///
/// `None` if no digit follows the prefix, in which case the text is a symbol.
pub fn parse_int(text: &str) -> Option<i64> {
    let text = text.trim();
    let (negative, rest) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let (radix, digits) = match rest.get(..2) {
        Some("0x" | "0X") => (16, &rest[2..]),
        _ => (10, rest),
    };
    let end = digits
        .find(|ch: char| !ch.is_digit(radix))
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let magnitude = digits[..end]
        .chars()
        .filter_map(|ch| ch.to_digit(radix))
        .fold(0i64, |acc, digit| {
            acc.saturating_mul(radix.into()).saturating_add(digit.into())
        });
    Some(if negative { -magnitude } else { magnitude })
}

/// Constant expression: `$` stands for `0x`, anything unparsable is zero.
pub fn parse_const(text: &str) -> i64 {
    parse_int(&text.trim().replacen('$', "0x", 1)).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assemble(src: &str) -> Program {
        let isa = InstructionSet::new();
        AsmParser::new(&isa, src).parse()
    }

    fn messages(program: &Program) -> Vec<String> {
        program
            .diagnostics
            .iter()
            .map(|diag| diag.kind.to_string())
            .collect()
    }

    #[test]
    fn int_literals() {
        assert_eq!(parse_int("42"), Some(42));
        assert_eq!(parse_int("-7"), Some(-7));
        assert_eq!(parse_int("0x1F"), Some(31));
        assert_eq!(parse_int("12abc"), Some(12));
        assert_eq!(parse_int("0x"), None);
        assert_eq!(parse_int("LOOP"), None);
        assert_eq!(parse_int("-"), None);
    }

    #[test]
    fn oversized_literal_saturates() {
        assert_eq!(parse_int("99999999999999999999999"), Some(i64::MAX));
        assert_eq!(parse_int("-99999999999999999999999"), Some(-i64::MAX));
        assert_eq!(parse_int("0xFFFFFFFFFFFFFFFFFFFF"), Some(i64::MAX));
    }

    #[test]
    fn const_expressions() {
        assert_eq!(parse_const("$10"), 16);
        assert_eq!(parse_const(" $FF "), 255);
        assert_eq!(parse_const("-$10"), -16);
        assert_eq!(parse_const("100"), 100);
        assert_eq!(parse_const("nonsense"), 0);
        assert_eq!(parse_const(""), 0);
    }

    #[test]
    fn simple_program() {
        let program = assemble("START: LDC 5\nHLT\n");
        assert!(program.diagnostics.is_empty());
        assert!(program.is_runnable());
        assert_eq!(program.start, Some(0));
        assert_eq!(program.memory, vec![0x000005, 0xF00000]);
        assert_eq!(program.source_map.line(0), Some(0));
        assert_eq!(program.source_map.line(1), Some(1));
    }

    #[test]
    fn forward_reference() {
        let src = "START: JMP END\nLDC 1\nEND: HALT";
        let program = assemble(src);
        assert!(program.diagnostics.is_empty(), "{:?}", program.diagnostics);
        assert_eq!(program.symbols.get("END"), Some(2));
        assert_eq!(program.memory, vec![0x800002, 0x000001, 0xF00000]);
    }

    #[test]
    fn unresolvable_forward_reference() {
        let program = assemble("START: JMP NOWHERE\nHLT");
        assert_eq!(messages(&program), vec!["unresolvable constant NOWHERE"]);
        assert_eq!(program.diagnostics[0].line, 0);
        // Slot stays zero, later code keeps its address
        assert_eq!(program.memory, vec![0, 0xF00000]);
    }

    #[test]
    fn unknown_command() {
        let program = assemble("START: LDC 1\nFOO 3\nHLT");
        assert_eq!(messages(&program), vec!["unknown command FOO,3"]);
        assert_eq!(program.diagnostics[0].line, 1);
        assert_eq!(program.memory, vec![0x000001, 0, 0xF00000]);
        assert!(!program.is_runnable());
    }

    #[test]
    fn missing_start() {
        let program = assemble("LDC 1\nHLT");
        assert_eq!(messages(&program), vec!["could not find START label"]);
        assert_eq!(program.diagnostics[0].line, 0);
        assert_eq!(program.start, None);
        assert!(!program.is_runnable());
    }

    #[test]
    fn invalid_line() {
        let program = assemble("START: LDC 1 2 3\nHLT");
        assert_eq!(messages(&program), vec!["invalid line"]);
        assert_eq!(program.memory, vec![0xF00000]);
    }

    #[test]
    fn reserve_storage() {
        let src = "START: LDV X\nHLT\nX DS 7\nY ds $10\nZ DS";
        let program = assemble(src);
        assert!(program.diagnostics.is_empty());
        assert_eq!(program.symbols.get("X"), Some(2));
        assert_eq!(program.symbols.get("Z"), Some(4));
        assert_eq!(
            program.memory,
            vec![0x100002, 0xF00000, 7, 16, 0]
        );
        assert_eq!(program.source_map.line(3), Some(3));
    }

    #[test]
    fn constants_and_relocation() {
        let src = "\
            ; comment only
            N = $FFFFFFF
            * = 4
            START: LDC N   ; trailing comment
            HLT
            * = 1
            ONE DS 1
        ";
        let program = assemble(src);
        assert!(program.diagnostics.is_empty(), "{:?}", program.diagnostics);
        assert_eq!(program.symbols.get("N"), Some(0xFFFFF));
        assert_eq!(program.start, Some(4));
        assert_eq!(program.memory, vec![0, 1, 0, 0, 0x0FFFFF, 0xF00000]);
        assert_eq!(program.source_map.line(0), None);
        assert_eq!(program.source_map.line(4), Some(3));
    }

    #[test]
    fn label_only_line() {
        let program = assemble("START:\nLOOP:\nJMP LOOP");
        assert!(program.diagnostics.is_empty());
        assert_eq!(program.symbols.get("LOOP"), Some(0));
        assert_eq!(program.memory, vec![0x800000]);
    }

    #[test]
    fn last_definition_wins() {
        let src = "START: JMP A\nA: LDC 1\nA: HLT";
        let program = assemble(src);
        assert!(program.diagnostics.is_empty());
        assert_eq!(program.memory[0], 0x800002);
    }

    #[test]
    fn backward_reference_is_resolved_immediately() {
        let src = "START: LDC 1\nLOOP: JMP LOOP\nLOOP: HLT";
        let program = assemble(src);
        assert_eq!(program.memory[1], 0x800001);
    }

    #[test]
    fn trailing_relocation_does_not_extend_image() {
        let program = assemble("START: LDC 1\n* = 50");
        assert!(program.diagnostics.is_empty(), "{:?}", program.diagnostics);
        assert_eq!(program.memory, vec![0x000001]);
    }

    #[test]
    fn relocation_gap_is_filled_up_to_last_word() {
        let program = assemble("START: LDC 1\n* = 3\nHLT\n* = 40");
        assert_eq!(program.memory, vec![0x000001, 0, 0, 0xF00000]);
    }

    #[test]
    fn third_token_is_ignored() {
        let program = assemble("START: LDC 7 junk\nHLT");
        assert!(program.diagnostics.is_empty(), "{:?}", program.diagnostics);
        assert_eq!(program.memory, vec![0x000007, 0xF00000]);
    }

    #[test]
    fn unknown_mnemonic_with_forward_reference_is_reported_once() {
        let program = assemble("START: FOO END\nEND: HLT");
        assert_eq!(messages(&program), vec!["unknown command FOO,END"]);
        assert_eq!(program.diagnostics[0].line, 0);
        assert_eq!(program.memory, vec![0, 0xF00000]);
        assert_eq!(program.symbols.get("END"), Some(1));
    }
}
