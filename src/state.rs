use fxhash::FxBuildHasher;

use crate::isa::{FxMap, Word};

/// Word-addressed machine memory.
///
/// The assembled image is dense. Stores past its end land in a sparse overflow, so addresses
/// in between stay undefined: fetching them ends the run, loading them yields zero.
#[derive(Clone, Debug, Default)]
pub struct Memory {
    words: Vec<Word>,
    overflow: FxMap<u32, Word>,
}

impl Memory {
    pub fn new(words: Vec<Word>) -> Self {
        Memory {
            words,
            overflow: FxMap::with_hasher(FxBuildHasher::default()),
        }
    }

    /// Instruction fetch. `None` when the address holds no defined word.
    pub fn fetch(&self, addr: u32) -> Option<Word> {
        match self.words.get(addr as usize) {
            Some(word) => Some(*word),
            None => self.overflow.get(&addr).copied(),
        }
    }

    pub fn load(&self, addr: u32) -> Word {
        self.fetch(addr).unwrap_or(0)
    }

    pub fn store(&mut self, addr: u32, value: Word) {
        match self.words.get_mut(addr as usize) {
            Some(word) => *word = value,
            None => {
                self.overflow.insert(addr, value);
            }
        }
    }

    /// Length of the assembled image, not counting stores past its end.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// The assembled image.
    pub fn as_slice(&self) -> &[Word] {
        &self.words
    }
}

/// Complete machine state during a run.
#[derive(Clone, Debug)]
pub struct State {
    pub(crate) memory: Memory,
    /// Accumulator
    pub(crate) acc: Word,
    /// Instruction pointer
    pub(crate) ip: u32,
    pub(crate) running: bool,
    /// Steps taken, including the one which tripped the step ceiling
    pub(crate) steps: u32,
}

impl State {
    pub fn new(memory: Vec<Word>, start: u32) -> Self {
        State {
            memory: Memory::new(memory),
            acc: 0,
            ip: start,
            running: false,
            steps: 0,
        }
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn acc(&self) -> Word {
        self.acc
    }

    pub fn ip(&self) -> u32 {
        self.ip
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_bounds() {
        let mut memory = Memory::new(vec![1, 2]);
        assert_eq!(memory.fetch(1), Some(2));
        assert_eq!(memory.fetch(2), None);
        assert_eq!(memory.load(7), 0);

        memory.store(1, 5);
        assert_eq!(memory.as_slice(), &[1, 5]);
    }

    #[test]
    fn stores_past_the_image_leave_holes() {
        let mut memory = Memory::new(vec![1, 2]);
        memory.store(4, 9);
        assert_eq!(memory.as_slice(), &[1, 2]);
        assert_eq!(memory.fetch(4), Some(9));
        assert_eq!(memory.load(4), 9);
        assert_eq!(memory.fetch(2), None);
        assert_eq!(memory.fetch(3), None);
        assert_eq!(memory.load(3), 0);

        memory.store(4, -1);
        assert_eq!(memory.load(4), -1);
    }

    #[test]
    fn initial_state_is_halted() {
        let state = State::new(vec![0; 3], 2);
        assert!(!state.is_running());
        assert_eq!(state.ip(), 2);
        assert_eq!(state.acc(), 0);
        assert_eq!(state.steps(), 0);
    }
}
