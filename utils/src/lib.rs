//! This module implements features common to several commands.

pub mod disk;
pub mod prompt;
pub mod util;

use std::fmt;
use std::process::exit;

/// Writes an error to stderr, then exits.
pub fn error<M: fmt::Display>(bin: &str, msg: M) -> ! {
	eprintln!("{}: error: {}", bin, msg);
	exit(1);
}
