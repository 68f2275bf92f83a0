use crate::isa::Word;

/// Whether a log line is meant for the user or only for verbose inspection.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Visibility {
    Visible,
    Suppressed,
}

/// One executed instruction, as shown by a tracing front-end.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct TraceRecord {
    /// Address the instruction was fetched from
    pub addr: u32,
    /// Source line of `addr`, 0 if unmapped
    pub line: usize,
    /// Mnemonic and operand, eg. `LDC 5`
    pub instr: String,
    /// Accumulator after execution
    pub acc: Word,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct HaltSummary {
    pub steps: u32,
    pub addr: u32,
    pub acc: Word,
}

/// Receives the notifications of a running machine.
pub trait Listener {
    /// Called for every retained trace record.
    fn trace(&mut self, _record: &TraceRecord) {}
    /// Called exactly once per run, when the machine halts.
    fn halted(&mut self, _summary: &HaltSummary) {}
    fn log(&mut self, _message: &str, _visibility: Visibility) {}
}

/// Discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct Quiet;

impl Listener for Quiet {}

/// Keeps every notification, in order of arrival per channel.
#[derive(Clone, Debug, Default)]
pub struct Recorder {
    pub traces: Vec<TraceRecord>,
    pub halts: Vec<HaltSummary>,
    pub logs: Vec<(String, Visibility)>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log lines with [`Visibility::Visible`].
    pub fn visible(&self) -> impl Iterator<Item = &str> {
        self.logs
            .iter()
            .filter(|(_, visibility)| *visibility == Visibility::Visible)
            .map(|(message, _)| message.as_str())
    }
}

impl Listener for Recorder {
    fn trace(&mut self, record: &TraceRecord) {
        self.traces.push(record.clone());
    }

    fn halted(&mut self, summary: &HaltSummary) {
        self.halts.push(*summary);
    }

    fn log(&mut self, message: &str, visibility: Visibility) {
        self.logs.push((message.to_owned(), visibility));
    }
}

impl<L: Listener + ?Sized> Listener for &mut L {
    fn trace(&mut self, record: &TraceRecord) {
        (**self).trace(record)
    }

    fn halted(&mut self, summary: &HaltSummary) {
        (**self).halted(summary)
    }

    fn log(&mut self, message: &str, visibility: Visibility) {
        (**self).log(message, visibility)
    }
}
