use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;
use miette::{bail, IntoDiagnostic, Result};

use mima::output::Terminal;
use mima::schedule::{Interval, Outcome};
use mima::{isa, InstructionSet, Machine, MachineConfig, Program};

/// Assembler and interpreter for the MIMA accumulator machine.
#[derive(Parser)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Quickly provide a `.mima` file to run
    path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Assemble and run a file to completion
    Run {
        /// `.mima` file to run
        name: PathBuf,
        /// Produce minimal output, suited for blackbox tests
        #[arg(short, long)]
        minimal: bool,
        /// Also print every executed step
        #[arg(short, long)]
        verbose: bool,
    },
    /// Run a file one step per tick, printing each executed instruction
    Trace {
        /// `.mima` file to run
        name: PathBuf,
        /// Milliseconds between steps
        #[arg(short, long)]
        delay: Option<u64>,
        /// Cancel the run after this many steps
        #[arg(short, long)]
        limit: Option<u32>,
        /// Produce minimal output, suited for blackbox tests
        #[arg(short, long)]
        minimal: bool,
    },
    /// Write the assembled memory image, one hex word per line
    Compile {
        /// `.mima` file to compile
        name: PathBuf,
        /// Destination to output the image to
        dest: Option<PathBuf>,
    },
    /// Check a file without running it
    Check {
        /// File to check
        name: PathBuf,
    },
    /// List the instruction set with opcodes
    Isa,
}

fn main() -> miette::Result<()> {
    use MsgColor::*;
    let args = Args::parse();
    mima::env::init();

    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new() //
                .context_lines(mima::DIAGNOSTIC_CONTEXT_LINES)
                .build(),
        )
    }))?;

    let isa = InstructionSet::new();

    let Some(command) = args.command else {
        if let Some(path) = args.path {
            return run(&isa, &path, false, false);
        }
        println!("\n~ mima v{VERSION} ~");
        println!("{SHORT_INFO}");
        return Ok(());
    };

    match command {
        Command::Run {
            name,
            minimal,
            verbose,
        } => run(&isa, &name, minimal, verbose),
        Command::Trace {
            name,
            delay,
            limit,
            minimal,
        } => trace(&isa, &name, delay, limit, minimal),
        Command::Compile { name, dest } => {
            file_message(Green, "Assembling", &name);
            let program = load(&isa, &name)?;

            let dest = dest.unwrap_or_else(|| name.with_extension("hex"));
            let mut file = File::create(&dest).into_diagnostic()?;
            for word in &program.memory {
                writeln!(file, "{}", isa::hex(*word)).into_diagnostic()?;
            }

            message(Green, "Finished", "emit image");
            file_message(Green, "Saved", &dest);
            Ok(())
        }
        Command::Check { name } => {
            file_message(Green, "Checking", &name);
            let _ = load(&isa, &name)?;
            message(Green, "Success", "no errors found!");
            Ok(())
        }
        Command::Isa => {
            for mnemonic in isa.mnemonics() {
                if let Some(code) = isa.opcode(mnemonic) {
                    println!("{:>#6X} {mnemonic}", code);
                }
            }
            Ok(())
        }
    }
}

#[allow(unused)]
enum MsgColor {
    Green,
    Cyan,
    Red,
}

fn file_message(color: MsgColor, left: &str, right: &Path) {
    let right = format!("target {}", right.display());
    message(color, left, right.as_str());
}

fn message<S>(color: MsgColor, left: S, right: S)
where
    S: Colorize + std::fmt::Display,
{
    let left = match color {
        MsgColor::Green => left.green(),
        MsgColor::Cyan => left.cyan(),
        MsgColor::Red => left.red(),
    };
    println!("{left:>12} {right}");
}

fn config() -> MachineConfig {
    MachineConfig {
        max_steps: mima::env::max_steps(),
    }
}

fn run(isa: &InstructionSet, name: &Path, minimal: bool, verbose: bool) -> Result<()> {
    let terminal = Terminal::new(minimal, verbose);
    if !minimal {
        file_message(MsgColor::Green, "Assembling", name);
    }
    let program = load(isa, name)?;

    let mut machine = Machine::try_from(isa, &program, terminal)?.with_config(config());
    if !minimal {
        message(MsgColor::Green, "Running", "assembled image");
    }
    machine.run();

    if !minimal {
        file_message(MsgColor::Green, "Completed", name);
    }
    Ok(())
}

fn trace(
    isa: &InstructionSet,
    name: &Path,
    delay: Option<u64>,
    limit: Option<u32>,
    minimal: bool,
) -> Result<()> {
    let terminal = Terminal::new(minimal, false);
    if !minimal {
        file_message(MsgColor::Green, "Assembling", name);
    }
    let program = load(isa, name)?;

    let mut machine = Machine::try_from(isa, &program, terminal)?.with_config(config());
    let delay = Duration::from_millis(delay.unwrap_or_else(mima::env::trace_delay));
    let interval = Interval::new(delay);
    let token = interval.token();

    if !minimal {
        message(MsgColor::Green, "Tracing", "assembled image");
    }
    machine.start();
    let mut ticks = 0;
    let outcome = interval.run(|| {
        ticks += 1;
        let more = machine.tick();
        if limit.is_some_and(|limit| ticks >= limit) {
            token.cancel();
        }
        more
    });
    if let Outcome::Cancelled { ticks } = outcome {
        machine.cancel();
        if !minimal {
            message(MsgColor::Cyan, "Cancelled", format!("after {ticks} ticks").as_str());
        }
    }

    if !minimal {
        file_message(MsgColor::Green, "Completed", name);
    }
    Ok(())
}

/// Assemble a source file, refusing it if any diagnostic was raised.
fn load(isa: &InstructionSet, name: &Path) -> Result<Program> {
    let src = fs::read_to_string(name).into_diagnostic()?;
    let program = mima::assemble(isa, &src);
    if program.diagnostics.is_empty() {
        return Ok(program);
    }
    for diag in &program.diagnostics {
        eprintln!("{:?}", mima::error::diagnostic_report(diag, &src));
    }
    bail!(
        "could not assemble {} due to {} previous error(s)",
        name.display(),
        program.diagnostics.len()
    );
}

const SHORT_INFO: &str = r"
Welcome to mima, an assembler and interpreter for the MIMA accumulator machine.
Please use `-h` or `--help` to access the usage instructions and documentation.
";

const VERSION: &str = env!("CARGO_PKG_VERSION");
