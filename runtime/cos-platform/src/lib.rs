//! # cos Platform Layer
//!
//! Everything a component and the kernel must agree on bit-for-bit:
//! - **ABI**: syscall numbers, the tagged primary word, the trap frame
//! - **Encodings**: fixed-width packing of multi-field operations into
//!   the three argument words
//! - **Shared memory**: the scheduler notification area and the info
//!   region the loader maps into every component
//! - **Trap**: the single narrow primitive that crosses into the kernel
//!
//! ## Build Modes
//!
//! ```bash
//! # Mock (default - hosted, a test double implements the trap)
//! cargo build
//!
//! # Runtime (native trap instruction)
//! cargo build --no-default-features --features runtime
//! ```

#![no_std]

#[cfg(test)]
extern crate std;

/// Syscall numbers, descriptors and the trap frame
pub mod abi;

/// Build-mode detection and layout constants agreed with the loader
pub mod config;

/// Bit-packed operation encodings
pub mod encoding;

/// Scheduler notification area and info region layouts
pub mod shared;

/// The raw trap primitive
pub mod trap;

pub use abi::{
    ComponentId, DecodeError, ReturnKind, SpdId, SyscallDescriptor, SyscallNo, ThreadId, TrapFrame,
    Word,
};
pub use encoding::{BrandUpcall, BuffMgmt, MmapCntl, PackedCall, SwitchThread, ThdCntl};
pub use shared::{NextThreadHint, SchedDataArea, SchedNextThread, SharedUserData, SwitchFlags};
pub use trap::TrapGate;

#[cfg(feature = "runtime")]
pub use trap::NativeGate;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_detection() {
        let mode = config::platform_mode();
        assert!(mode == "mock" || mode == "runtime");
    }

    #[test]
    #[cfg(all(feature = "mock", not(feature = "runtime")))]
    fn test_mock_mode() {
        assert!(config::is_mock());
        assert!(!config::is_runtime());
    }

    #[test]
    fn test_reexports_resolve() {
        let _ = SyscallNo::SwitchThread.tagged();
        let _ = NextThreadHint::default();
        let _ = SwitchFlags::empty();
        let _ = config::ARGREG_SZ;
    }
}
