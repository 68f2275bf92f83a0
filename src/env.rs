use std::cell::RefCell;
use std::ffi::OsStr;
use std::str::FromStr;

use crate::runtime::MAX_RUNTIME;

/// Default delay between trace ticks, in milliseconds.
pub const TRACE_DELAY: u64 = 50;

#[derive(Clone, Copy, Debug)]
struct Env {
    max_steps: u32,
    trace_delay: u64,
}

thread_local! {
    /// Must only be mutated within `set_env`
    static ENV: RefCell<Option<Env>> = const { RefCell::new(None) };
}

pub fn init() {
    let value = Env {
        max_steps: var_or("MIMA_MAX_STEPS", MAX_RUNTIME),
        trace_delay: var_or("MIMA_TRACE_DELAY", TRACE_DELAY),
    };
    set_env(value);
}

/// Step ceiling for every run.
pub fn max_steps() -> u32 {
    with_env(|env| env.max_steps)
}

/// Delay between trace ticks when none is given on the command line.
pub fn trace_delay() -> u64 {
    with_env(|env| env.trace_delay)
}

fn set_env(value: Env) {
    ENV.with(|env| {
        let mut env = env.borrow_mut();
        assert!(
            env.is_none(),
            "tried to initialize environment state multiple times"
        );
        *env = Some(value);
    });
}

fn with_env<F, R>(callback: F) -> R
where
    F: Fn(&Env) -> R,
{
    ENV.with(|env| {
        let env = env.borrow();
        let env = env.unwrap_or_else(|| {
            panic!("tried to access environment state before initialization");
        });
        callback(&env)
    })
}

/// Parsed value of a variable, `default` if unset or malformed.
fn var_or<T: FromStr>(name: impl AsRef<OsStr>, default: T) -> T {
    std::env::var(name.as_ref())
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_unset() {
        assert_eq!(var_or("MIMA_TEST_UNSET_VARIABLE", 7u32), 7);
    }

    #[test]
    #[should_panic(expected = "before initialization")]
    fn read_before_init() {
        // Each test runs on its own thread, so this one never saw `init`
        max_steps();
    }
}
