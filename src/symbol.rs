use fxhash::FxBuildHasher;

use crate::isa::FxMap;

/// Symbol that relocates the assembler's write address.
pub const POINTER: &str = "*";
/// Symbol that marks the program entry point.
pub const START: &str = "START";

/// Symbol table of identifier -> constant or memory address.
///
/// Labels, constants and `DS` names share one namespace. Redefinition overwrites.
#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    table: FxMap<String, u32>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            table: FxMap::with_hasher(FxBuildHasher::default()),
        }
    }

    pub fn define(&mut self, name: &str, value: u32) {
        self.table.insert(name.to_owned(), value);
    }

    pub fn get(&self, name: &str) -> Option<u32> {
        self.table.get(name).copied()
    }

    /// Symbols in order of first definition.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.table.iter().map(|(name, value)| (name.as_str(), *value))
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
