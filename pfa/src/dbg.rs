//! Debug logging at the init/allocate/free boundaries.
//!
//! Mirrors the surrounding kernel lineage's `dbg!`/`dbg_warn!`/`dbg_err!`
//! macro family: a narrow trait standing in for "the architecture's debug
//! console", plus three macros that format a tagged message through it.
#![allow(unused_macros)]

/// A sink for the allocator's debug output.
///
/// Implementors typically forward to a serial port, a framebuffer console,
/// or (in the hosted harness) `stderr`.
pub trait PfaLog {
	/// Writes a single formatted debug line.
	fn log(args: core::fmt::Arguments<'_>);
}

/// A [`PfaLog`] that discards everything. Used wherever a debug console
/// has not been wired up yet.
pub struct NullLog;

impl PfaLog for NullLog {
	#[inline]
	fn log(_args: core::fmt::Arguments<'_>) {}
}

/// Sends a general debug message through `$Log: PfaLog`.
#[macro_export]
macro_rules! pfa_dbg {
	($Log:ty, $($arg:tt)*) => {
		<$Log as $crate::PfaLog>::log(format_args!(" :pfa:{}", format_args!($($arg)*)))
	};
}

/// Sends a warning through `$Log: PfaLog`.
#[macro_export]
macro_rules! pfa_warn {
	($Log:ty, $($arg:tt)*) => {
		<$Log as $crate::PfaLog>::log(format_args!("W:pfa:{}", format_args!($($arg)*)))
	};
}

/// Sends an error through `$Log: PfaLog`.
#[macro_export]
macro_rules! pfa_err {
	($Log:ty, $($arg:tt)*) => {
		<$Log as $crate::PfaLog>::log(format_args!("E:pfa:{}", format_args!($($arg)*)))
	};
}
