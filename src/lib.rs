//! Pool tag triage for live kernel debugging sessions.
//!
//! The crate drives a debugger engine through a line-oriented [`channel::CommandChannel`]:
//! it arms `nt!PoolHitTag` on a single pool tag, then repeatedly resumes the target, classifies
//! every halt as an allocation or a free by looking at the top of the call stack, collects the
//! diagnostic evidence of the event (allocated address, free-site parameter, process identity)
//! and appends it to a [`journal::Journal`] for offline allocate/free correlation.

pub mod log;

pub mod channel;
pub mod classify;
pub mod config;
pub mod error;
pub mod evidence;
pub mod format;
pub mod journal;
pub mod monitor;
pub mod tag;

pub use error::Error;
