use colored::Colorize;

use crate::isa::hex;
use crate::listener::{HaltSummary, Listener, TraceRecord, Visibility};
use crate::runtime::OUTPUT_PREFIX;

/// Prints machine notifications to the terminal.
///
/// Trace records and `OUTPUT` values go to stdout, every other log line to stderr.
#[derive(Clone, Copy, Debug, Default)]
pub struct Terminal {
    /// Plain output, suited for blackbox tests
    minimal: bool,
    /// Also print suppressed log lines
    verbose: bool,
}

impl Terminal {
    pub fn new(minimal: bool, verbose: bool) -> Self {
        if minimal {
            colored::control::set_override(false);
        }
        Terminal { minimal, verbose }
    }
}

impl Listener for Terminal {
    fn trace(&mut self, record: &TraceRecord) {
        if self.minimal {
            println!("{} {} {}", record.addr, record.instr, record.acc);
            return;
        }
        println!(
            "{:>6} {} {:<12} {} {}",
            record.addr.to_string().dimmed(),
            format!("l{:<4}", record.line + 1).dimmed(),
            record.instr.bold(),
            "=>".dimmed(),
            hex(record.acc),
        );
    }

    fn halted(&mut self, summary: &HaltSummary) {
        if self.minimal {
            println!("ACC {}", summary.acc);
            return;
        }
        println!(
            "\n{:>12} accumulator {} ({})",
            "Halted".cyan(),
            summary.acc,
            hex(summary.acc)
        );
    }

    fn log(&mut self, message: &str, visibility: Visibility) {
        if let Some(value) = message.strip_prefix(OUTPUT_PREFIX) {
            println!("{value}");
            return;
        }
        match visibility {
            Visibility::Visible => eprintln!("{}", message.blue()),
            Visibility::Suppressed if self.verbose => eprintln!("{}", message.dimmed()),
            Visibility::Suppressed => (),
        }
    }
}
