//! Raw trap primitive
//!
//! The only place the layer touches instruction-level mechanics. Everything
//! above it is expressed as "five words in, one word out" through
//! [`TrapGate`].
//!
//! Register assignment of [`NativeGate`]:
//!
//! | Arch    | Instruction | op  | spd | arg0 | arg1 | arg2 | ret |
//! |---------|-------------|-----|-----|------|------|------|-----|
//! | aarch64 | `svc #0`    | x8  | x3  | x0   | x1   | x2   | x0  |
//! | x86_64  | `syscall`   | rax | rdx | rdi  | rsi  | r10  | rax |
//! | riscv64 | `ecall`     | a7  | a6  | a0   | a1   | a2   | a0  |

use crate::abi::TrapFrame;

/// Synchronous call-and-return into the kernel
///
/// Implementations must not reorder memory accesses across the trap: any
/// store made before `trap` (the next-thread hint in particular) is visible
/// to the kernel when it handles the frame.
pub trait TrapGate {
    /// Deliver `frame` and return the kernel's one-word answer
    fn trap(&self, frame: &TrapFrame) -> isize;
}

impl<T: TrapGate + ?Sized> TrapGate for &T {
    #[inline]
    fn trap(&self, frame: &TrapFrame) -> isize {
        (**self).trap(frame)
    }
}

/// Trap gate issuing the target's system-call instruction
#[cfg(feature = "runtime")]
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeGate;

#[cfg(feature = "runtime")]
impl TrapGate for NativeGate {
    #[inline]
    fn trap(&self, frame: &TrapFrame) -> isize {
        // SAFETY: the kernel validates every register it is handed; the asm
        // block is a full compiler barrier (no `nomem`), so prior stores are
        // emitted before the trap.
        unsafe { arch::raw_trap(frame) as isize }
    }
}

#[cfg(all(feature = "runtime", target_arch = "aarch64"))]
mod arch {
    use crate::abi::TrapFrame;

    #[inline(always)]
    pub(super) unsafe fn raw_trap(frame: &TrapFrame) -> usize {
        let ret: usize;
        core::arch::asm!(
            "svc #0",
            in("x8") frame.op,
            in("x3") frame.spd,
            inlateout("x0") frame.args[0] => ret,
            in("x1") frame.args[1],
            in("x2") frame.args[2],
            options(nostack),
        );
        ret
    }
}

#[cfg(all(feature = "runtime", target_arch = "x86_64"))]
mod arch {
    use crate::abi::TrapFrame;

    #[inline(always)]
    pub(super) unsafe fn raw_trap(frame: &TrapFrame) -> usize {
        let ret: usize;
        core::arch::asm!(
            "syscall",
            inlateout("rax") frame.op => ret,
            in("rdx") frame.spd,
            in("rdi") frame.args[0],
            in("rsi") frame.args[1],
            in("r10") frame.args[2],
            out("rcx") _,
            out("r11") _,
            options(nostack),
        );
        ret
    }
}

#[cfg(all(feature = "runtime", target_arch = "riscv64"))]
mod arch {
    use crate::abi::TrapFrame;

    #[inline(always)]
    pub(super) unsafe fn raw_trap(frame: &TrapFrame) -> usize {
        let ret: usize;
        core::arch::asm!(
            "ecall",
            in("a7") frame.op,
            in("a6") frame.spd,
            inlateout("a0") frame.args[0] => ret,
            in("a1") frame.args[1],
            in("a2") frame.args[2],
            options(nostack),
        );
        ret
    }
}

#[cfg(all(
    feature = "runtime",
    not(any(target_arch = "aarch64", target_arch = "x86_64", target_arch = "riscv64"))
))]
compile_error!("runtime mode has no trap sequence for this target architecture");

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::SyscallNo;
    use core::cell::Cell;

    struct Echo {
        last_spd: Cell<usize>,
    }

    impl TrapGate for Echo {
        fn trap(&self, frame: &TrapFrame) -> isize {
            self.last_spd.set(frame.spd);
            frame.args.iter().sum::<usize>() as isize
        }
    }

    #[test]
    fn test_gate_through_reference() {
        let echo = Echo { last_spd: Cell::new(0) };
        let gate: &dyn TrapGate = &echo;
        let frame = TrapFrame::new(SyscallNo::CreateThread, 4, [1, 2, 3]);
        assert_eq!((&gate).trap(&frame), 6);
        assert_eq!(echo.last_spd.get(), 4);
    }
}
