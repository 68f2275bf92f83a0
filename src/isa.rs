use std::fmt;

use fxhash::FxBuildHasher;
use indexmap::IndexMap;

use crate::error::DecodeError;
use crate::state::State;

/// A single memory cell. Only the low 24 bits are architecturally meaningful, but the
/// accumulator arithmetic is carried out on the full signed host integer.
pub type Word = i32;

/// Width of a memory word.
pub const WORD_MASK: u32 = 0xFF_FFFF;
/// Operand of a primary instruction, also the addressable range of memory.
pub const ADDRESS_MASK: u32 = 0xF_FFFF;
/// Operand of an extended instruction.
pub const EXTENDED_MASK: u32 = 0xFFFF;
/// Primary opcode which selects the extended table.
pub const EXTENDED_PREFIX: u8 = 0xF;

/// Pseudo-mnemonic for a raw data word.
pub const RESERVE: &str = "DS";
/// Synonym for `HLT`.
pub const HALT_ALIAS: &str = "HALT";

pub(crate) type FxMap<K, V> = IndexMap<K, V, FxBuildHasher>;

/// Side effect of an instruction that leaves the machine through the log channel.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Effect {
    None,
    Output(Word),
}

pub type Action = fn(&mut State, u32) -> Effect;

/// Mnemonic bound to its semantics.
#[derive(Clone, Copy, Debug)]
pub struct Instruction {
    mnemonic: &'static str,
    action: Action,
}

impl Instruction {
    const fn new(mnemonic: &'static str, action: Action) -> Self {
        Instruction { mnemonic, action }
    }

    pub fn mnemonic(&self) -> &'static str {
        self.mnemonic
    }

    pub fn execute(&self, state: &mut State, operand: u32) -> Effect {
        (self.action)(state, operand)
    }
}

/// Indexed by primary opcode.
const PRIMARY: [Instruction; 13] = [
    Instruction::new("LDC", ldc),     // 0x0
    Instruction::new("LDV", ldv),     // 0x1
    Instruction::new("STV", stv),     // 0x2
    Instruction::new("ADD", add),     // 0x3
    Instruction::new("AND", and),     // 0x4
    Instruction::new("OR", or),       // 0x5
    Instruction::new("XOR", xor),     // 0x6
    Instruction::new("EQL", eql),     // 0x7
    Instruction::new("JMP", jmp),     // 0x8
    Instruction::new("JMN", jmn),     // 0x9
    Instruction::new("LDIV", ldiv),   // 0xA
    Instruction::new("STIV", stiv),   // 0xB
    Instruction::new("OUTPUT", output), // 0xC
];

/// Indexed by extended sub-opcode, under primary opcode `0xF`.
const EXTENDED: [Instruction; 3] = [
    Instruction::new("HLT", hlt), // 0xF0
    Instruction::new("NOT", not), // 0xF1
    Instruction::new("RAR", rar), // 0xF2
];

/// Result of decoding a memory word.
#[derive(Clone, Copy, Debug)]
pub struct Decoded<'a> {
    pub extended: bool,
    pub instruction: &'a Instruction,
    pub operand: u32,
}

impl Decoded<'_> {
    pub fn mnemonic(&self) -> &'static str {
        self.instruction.mnemonic
    }
}

impl fmt::Display for Decoded<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.instruction.mnemonic, self.operand)
    }
}

/// The closed instruction catalog together with its mnemonic lookup.
///
/// Built once and shared by reference between the assembler and every machine.
#[derive(Debug)]
pub struct InstructionSet {
    primary: Vec<Instruction>,
    extended: Vec<Instruction>,
    /// Mnemonic -> opcode. Extended opcodes are stored as `0xF0 | sub`.
    reverse: FxMap<&'static str, u8>,
}

impl InstructionSet {
    pub fn new() -> Self {
        let mut reverse = FxMap::with_hasher(FxBuildHasher::default());
        for (code, instr) in PRIMARY.iter().enumerate() {
            reverse.insert(instr.mnemonic, code as u8);
        }
        for (code, instr) in EXTENDED.iter().enumerate() {
            reverse.insert(instr.mnemonic, (EXTENDED_PREFIX << 4) | code as u8);
        }
        InstructionSet {
            primary: PRIMARY.to_vec(),
            extended: EXTENDED.to_vec(),
            reverse,
        }
    }

    /// Numeric code of a mnemonic, `HALT` resolving like `HLT`.
    pub fn opcode(&self, mnemonic: &str) -> Option<u8> {
        let mnemonic = if mnemonic == HALT_ALIAS { "HLT" } else { mnemonic };
        self.reverse.get(mnemonic).copied()
    }

    /// Whether `mnemonic` can be encoded, including the `DS` pseudo-op.
    pub fn knows(&self, mnemonic: &str) -> bool {
        mnemonic == RESERVE || self.opcode(mnemonic).is_some()
    }

    /// Encode a statement into a memory word. `None` for an unknown mnemonic.
    pub fn encode(&self, mnemonic: &str, operand: i64) -> Option<Word> {
        if mnemonic == RESERVE {
            return Some(operand as Word);
        }
        let code = self.opcode(mnemonic)? as u32;
        let operand = operand as u32;
        let word = if code >= EXTENDED_PREFIX as u32 {
            (code << 16) | (operand & EXTENDED_MASK)
        } else {
            (code << 20) | (operand & ADDRESS_MASK)
        };
        Some(word as Word)
    }

    pub fn decode(&self, word: Word) -> Result<Decoded<'_>, DecodeError> {
        let opcode = ((word >> 20) & 0xF) as u8;
        if opcode == EXTENDED_PREFIX {
            let sub = ((word >> 16) & 0xF) as u8;
            let instruction = self
                .extended
                .get(sub as usize)
                .ok_or(DecodeError::InvalidExtended(sub))?;
            Ok(Decoded {
                extended: true,
                instruction,
                operand: word as u32 & EXTENDED_MASK,
            })
        } else {
            let instruction = self
                .primary
                .get(opcode as usize)
                .ok_or(DecodeError::InvalidOpcode(opcode))?;
            Ok(Decoded {
                extended: false,
                instruction,
                operand: word as u32 & ADDRESS_MASK,
            })
        }
    }

    /// Every mnemonic in opcode order, primary first.
    pub fn mnemonics(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.reverse.keys().copied()
    }
}

impl Default for InstructionSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Render a word as six hex digits, negative values in 24-bit two's complement.
pub fn hex(word: Word) -> String {
    format!("0x{:06X}", word as u32 & WORD_MASK)
}

fn ldc(state: &mut State, v: u32) -> Effect {
    state.acc = v as Word;
    Effect::None
}

fn ldv(state: &mut State, v: u32) -> Effect {
    state.acc = state.memory.load(v);
    Effect::None
}

fn stv(state: &mut State, v: u32) -> Effect {
    state.memory.store(v, state.acc);
    Effect::None
}

fn add(state: &mut State, v: u32) -> Effect {
    state.acc = state.acc.wrapping_add(state.memory.load(v));
    Effect::None
}

fn and(state: &mut State, v: u32) -> Effect {
    state.acc &= state.memory.load(v);
    Effect::None
}

fn or(state: &mut State, v: u32) -> Effect {
    state.acc |= state.memory.load(v);
    Effect::None
}

fn xor(state: &mut State, v: u32) -> Effect {
    state.acc ^= state.memory.load(v);
    Effect::None
}

fn eql(state: &mut State, v: u32) -> Effect {
    // All ones, so that `JMN` takes the branch on equality
    state.acc = if state.acc == state.memory.load(v) { -1 } else { 0 };
    Effect::None
}

fn jmp(state: &mut State, v: u32) -> Effect {
    state.ip = v;
    Effect::None
}

fn jmn(state: &mut State, v: u32) -> Effect {
    if state.acc < 0 {
        state.ip = v;
    }
    Effect::None
}

fn ldiv(state: &mut State, v: u32) -> Effect {
    let ptr = state.memory.load(v) as u32 & ADDRESS_MASK;
    state.acc = state.memory.load(ptr);
    Effect::None
}

fn stiv(state: &mut State, v: u32) -> Effect {
    let ptr = state.memory.load(v) as u32 & ADDRESS_MASK;
    state.memory.store(ptr, state.acc);
    Effect::None
}

fn output(state: &mut State, v: u32) -> Effect {
    Effect::Output(state.memory.load(v))
}

fn hlt(state: &mut State, _v: u32) -> Effect {
    state.running = false;
    // Fetch already moved past the halt word
    state.ip = state.ip.wrapping_sub(1);
    Effect::None
}

fn not(state: &mut State, _v: u32) -> Effect {
    state.acc = !state.acc;
    Effect::None
}

fn rar(state: &mut State, _v: u32) -> Effect {
    let bits = state.acc as u32;
    state.acc = (((bits >> 1) | (bits << 23)) & WORD_MASK) as Word;
    Effect::None
}
