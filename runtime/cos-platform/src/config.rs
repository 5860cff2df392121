//! Platform configuration
//!
//! Backend selection happens at compile time through cargo features; the
//! layout constants below are the addresses and sizes the loader and the
//! kernel are built against.

/// Page size of the target (4KB)
pub const PAGE_SIZE: usize = 4096;

/// Shift applied to a syscall number in the primary trap word.
///
/// The low 16 bits stay clear so the kernel entry path can tell our
/// operations apart from the host call-number space sharing the register.
pub const SYSCALL_TAG_SHIFT: u32 = 16;

/// Mask of the bits that must be zero in a tagged primary word
pub const SYSCALL_TAG_MASK: usize = (1 << SYSCALL_TAG_SHIFT) - 1;

/// Address at which the loader maps the read-only info region
pub const INFO_REGION_ADDR: usize = 0x4000_0000;

/// Argument region capacity (one page)
pub const ARGREG_SZ: usize = PAGE_SIZE;

/// Largest single extent, header included
pub const MAX_ARG_SZ: usize = 2048;

/// Which trap backend this build uses
pub const fn platform_mode() -> &'static str {
    if cfg!(feature = "runtime") {
        "runtime"
    } else {
        "mock"
    }
}

/// Check if we're in mock mode (testing)
pub const fn is_mock() -> bool {
    cfg!(feature = "mock") && !cfg!(feature = "runtime")
}

/// Check if we're in runtime mode (native trap)
pub const fn is_runtime() -> bool {
    cfg!(feature = "runtime")
}

#[cfg(not(any(feature = "mock", feature = "runtime")))]
compile_error!("No trap backend selected. Use either the 'mock' or the 'runtime' feature.");

static_assertions::const_assert!(MAX_ARG_SZ < ARGREG_SZ);
static_assertions::const_assert!(ARGREG_SZ.is_power_of_two());
