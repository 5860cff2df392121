//! cos Component SDK
//!
//! The interface every component uses to reach the kernel.
//!
//! # Modules
//! - [`component`]: identity cell, heap pointer, info region, the [`Component`] context
//! - [`syscall`]: typed wrappers over the trap, one per kernel operation
//! - [`sched`]: publish-then-trap thread switch protocol
//! - [`argreg`]: LIFO argument region for payloads larger than registers
//! - [`console`]: `core::fmt` output through the `print` syscall
//!
//! # Example
//! ```no_run
//! # #[cfg(feature = "runtime")]
//! # fn main() {
//! use cos_sdk::{Component, SwitchFlags};
//!
//! let component = unsafe { Component::this() };
//! component.print("hello from a component\n");
//! component.switch_thread(5, SwitchFlags::empty(), 10);
//! # }
//! # #[cfg(not(feature = "runtime"))]
//! # fn main() {}
//! ```

#![no_std]

#[cfg(test)]
extern crate std;

pub mod argreg;
pub mod component;
pub mod console;
pub mod sched;
pub mod syscall;

use thiserror::Error;

pub use argreg::{ArgRegion, ArgRegionError, ArgRegionPage};
pub use component::{Component, ComponentEnv, HeapPointer, IdentityCell};
pub use console::ConsoleWriter;
pub use syscall::SyscallRet;

// Re-export the platform layer for convenience
pub use cos_platform as platform;
pub use cos_platform::{
    ComponentId, NextThreadHint, SpdId, SwitchFlags, SyscallNo, ThreadId, TrapGate, Word,
};

/// SDK version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Result type for SDK operations
pub type Result<T> = core::result::Result<T, Error>;

/// SDK error types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// The kernel returned its failure sentinel
    #[error("syscall failed (returned {ret})")]
    Syscall { ret: isize },

    #[error(transparent)]
    ArgRegion(#[from] ArgRegionError),

    #[error(transparent)]
    Decode(#[from] cos_platform::DecodeError),
}
