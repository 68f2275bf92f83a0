use miette::{bail, Result};

use crate::isa::{Effect, InstructionSet};
use crate::listener::{HaltSummary, Listener, TraceRecord, Visibility};
use crate::program::{Program, SourceMap};
use crate::schedule::{Interval, Outcome};
use crate::state::State;

/// Prefix of log lines produced by the `OUTPUT` instruction.
pub const OUTPUT_PREFIX: &str = "OUTPUT: ";

/// Default step ceiling. Runs are forcibly halted when the step counter reaches it.
pub const MAX_RUNTIME: u32 = 10_000;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct MachineConfig {
    pub max_steps: u32,
}

impl Default for MachineConfig {
    fn default() -> Self {
        MachineConfig {
            max_steps: MAX_RUNTIME,
        }
    }
}

/// Interpreter for an assembled [`Program`].
///
/// Runs either to completion with [`Machine::run`], or one tick at a time with
/// [`Machine::start`] and [`Machine::tick`] under an external scheduler.
pub struct Machine<'a, L: Listener> {
    isa: &'a InstructionSet,
    state: State,
    source_map: SourceMap,
    config: MachineConfig,
    listener: L,
    /// Halt summary already delivered for the current run
    finalized: bool,
    cancelled: bool,
}

impl<'a, L: Listener> Machine<'a, L> {
    pub fn new(isa: &'a InstructionSet, state: State, source_map: SourceMap, listener: L) -> Self {
        Machine {
            isa,
            state,
            source_map,
            config: MachineConfig::default(),
            listener,
            finalized: false,
            cancelled: false,
        }
    }

    /// Load a program, refusing one without an entry point.
    pub fn try_from(isa: &'a InstructionSet, program: &Program, listener: L) -> Result<Self> {
        let Some(start) = program.start else {
            bail!("could not find START label, program cannot be run");
        };
        let state = State::new(program.memory.clone(), start);
        Ok(Self::new(isa, state, program.source_map.clone(), listener))
    }

    pub fn with_config(mut self, config: MachineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }

    pub fn into_listener(self) -> L {
        self.listener
    }

    /// Run to completion with tracing suppressed.
    pub fn run(&mut self) {
        self.start();
        while self.state.running {
            self.step(false, true);
        }
    }

    /// Enter the running state without executing anything.
    pub fn start(&mut self) {
        self.state.running = true;
        self.finalized = false;
        self.cancelled = false;
    }

    /// Execute one traced step. Returns whether another tick should be scheduled.
    pub fn tick(&mut self) -> bool {
        if self.cancelled || !self.state.running {
            return false;
        }
        self.step(false, false);
        self.state.running
    }

    /// Stop a cooperative run. Safe to call at any time, any number of times.
    pub fn cancel(&mut self) {
        self.cancelled = true;
        self.finish();
    }

    /// Run cooperatively, one step per tick of `interval`.
    pub fn run_with(&mut self, interval: &Interval) -> Outcome {
        self.start();
        let outcome = interval.run(|| self.tick());
        if let Outcome::Cancelled { .. } = outcome {
            self.cancel();
        }
        outcome
    }

    /// Execute a single instruction.
    ///
    /// A `single` step never finalizes on a normal halt, leaving that to the caller. A `silent`
    /// step emits no trace record and logs its step line as suppressed.
    pub fn step(&mut self, single: bool, silent: bool) {
        self.state.steps += 1;
        if self.state.steps >= self.config.max_steps {
            self.finish();
            self.log("Max Runtime reached, aborting.", Visibility::Visible);
            return;
        }

        let addr = self.state.ip;
        let word = self.state.memory.fetch(addr);
        self.state.ip = addr.wrapping_add(1);
        let Some(word) = word else {
            self.finish();
            self.log("reached undefined memory, aborting.", Visibility::Visible);
            return;
        };

        // Copy out so the decoded instruction does not borrow `self`
        let isa = self.isa;
        let decoded = match isa.decode(word) {
            Ok(decoded) => decoded,
            Err(err) => {
                self.log(&err.to_string(), Visibility::Visible);
                self.finish();
                return;
            }
        };
        if let Effect::Output(value) = decoded.instruction.execute(&mut self.state, decoded.operand)
        {
            self.log(&format!("{OUTPUT_PREFIX}{value}"), Visibility::Visible);
        }

        let visibility = if silent {
            Visibility::Suppressed
        } else {
            Visibility::Visible
        };
        self.log(
            &format!(
                "Step {} at {}:  {} => {}",
                self.state.steps, self.state.ip, decoded, self.state.acc
            ),
            visibility,
        );

        // Two zero words in a row are the padded tail of memory, not program steps
        let previous = self.state.ip.checked_sub(2).and_then(|a| self.state.memory.fetch(a));
        if !silent && (word != 0 || previous != Some(0)) {
            let record = TraceRecord {
                addr,
                line: self.source_map.line(addr).unwrap_or(0),
                instr: decoded.to_string(),
                acc: self.state.acc,
            };
            self.listener.trace(&record);
        }

        if !single && !self.state.running {
            self.finish();
        }
    }

    /// Transition to halted and notify the listener, at most once per run.
    fn finish(&mut self) {
        self.state.running = false;
        if self.finalized {
            return;
        }
        self.finalized = true;
        let summary = HaltSummary {
            steps: self.state.steps,
            addr: self.state.ip,
            acc: self.state.acc,
        };
        self.log(
            &format!(
                "Mima halted after {} Steps at address {}",
                summary.steps, summary.addr
            ),
            Visibility::Visible,
        );
        self.listener.halted(&summary);
    }

    fn log(&mut self, message: &str, visibility: Visibility) {
        self.listener.log(message, visibility);
    }
}
