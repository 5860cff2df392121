//! Shared-memory layouts
//!
//! Two regions are shared between a component and the kernel:
//! - the **scheduler notification area**, written by the component and read
//!   by the kernel at trap time
//! - the **info region**, written by the kernel and read by the component
//!
//! Neither carries a lock. The notification area is a single-slot overwrite
//! channel: the last publish before a trap is the one the kernel sees.

use core::sync::atomic::{AtomicPtr, AtomicU16, AtomicU64, Ordering};

use bitflags::bitflags;
use static_assertions::const_assert_eq;

use crate::abi::ThreadId;

bitflags! {
    /// Flags accompanying a thread switch
    ///
    /// Unknown bits are carried through untouched; the kernel owns their
    /// meaning.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SwitchFlags: u16 {
        /// The switching thread does not expect to be resumed
        const TAILCALL     = 1 << 0;
        /// The switching thread blocks on a synchronization object
        const SYNC_BLOCK   = 1 << 1;
        /// The target is being woken from a synchronization object
        const SYNC_UNBLOCK = 1 << 2;

        const _ = !0;
    }
}

/// The scheduler's statement of which thread should run next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NextThreadHint {
    pub thread_id: ThreadId,
    pub flags: SwitchFlags,
    pub urgency: u32,
}

impl NextThreadHint {
    pub const fn new(thread_id: ThreadId, flags: SwitchFlags, urgency: u32) -> Self {
        Self {
            thread_id,
            flags,
            urgency,
        }
    }

    /// Slot encoding: bits 0..16 thread id, 16..32 flags, 32..64 urgency
    pub const fn to_word(self) -> u64 {
        (self.urgency as u64) << 32 | (self.flags.bits() as u64) << 16 | self.thread_id as u64
    }

    pub const fn from_word(word: u64) -> Self {
        Self {
            thread_id: word as u16,
            flags: SwitchFlags::from_bits_retain((word >> 16) as u16),
            urgency: (word >> 32) as u32,
        }
    }
}

/// Single hint slot
///
/// The whole hint lives in one 64-bit word so a publish is a single store
/// and the kernel can never read a hint assembled from two publishers.
#[repr(C)]
#[derive(Debug)]
pub struct SchedNextThread {
    word: AtomicU64,
}

const_assert_eq!(core::mem::size_of::<SchedNextThread>(), 8);

impl SchedNextThread {
    pub const fn new() -> Self {
        Self {
            word: AtomicU64::new(0),
        }
    }

    /// Overwrite the slot. Visible to the kernel before any later trap.
    #[inline]
    pub fn publish(&self, hint: NextThreadHint) {
        self.word.store(hint.to_word(), Ordering::SeqCst);
    }

    /// Overwrite only the thread id, keeping the published flags and urgency
    #[inline]
    pub fn publish_thread(&self, thread_id: ThreadId) {
        let _ = self
            .word
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |word| {
                Some(word & !0xFFFF | thread_id as u64)
            });
    }

    /// Value the kernel would resolve if it trapped now
    #[inline]
    pub fn current(&self) -> NextThreadHint {
        NextThreadHint::from_word(self.word.load(Ordering::SeqCst))
    }
}

impl Default for SchedNextThread {
    fn default() -> Self {
        Self::new()
    }
}

/// Scheduler notification area, produced by the component
#[repr(C)]
#[derive(Debug, Default)]
pub struct SchedDataArea {
    pub next: SchedNextThread,
}

impl SchedDataArea {
    pub const fn new() -> Self {
        Self {
            next: SchedNextThread::new(),
        }
    }
}

/// Info region, produced by the kernel and mapped read-only by the loader
/// at [`INFO_REGION_ADDR`](crate::config::INFO_REGION_ADDR)
#[repr(C)]
#[derive(Debug)]
pub struct SharedUserData {
    current_thread: AtomicU16,
    argument_region: AtomicPtr<u8>,
}

impl SharedUserData {
    pub const fn new() -> Self {
        Self {
            current_thread: AtomicU16::new(0),
            argument_region: AtomicPtr::new(core::ptr::null_mut()),
        }
    }

    /// Thread currently executing in this component
    pub fn current_thread(&self) -> ThreadId {
        self.current_thread.load(Ordering::Acquire)
    }

    /// Argument region the kernel assigned to the current thread
    pub fn argument_region(&self) -> *mut u8 {
        self.argument_region.load(Ordering::Acquire)
    }

    /// Kernel-side update on dispatch
    pub fn set_current_thread(&self, thread_id: ThreadId) {
        self.current_thread.store(thread_id, Ordering::Release);
    }

    /// Kernel-side update on dispatch
    pub fn set_argument_region(&self, region: *mut u8) {
        self.argument_region.store(region, Ordering::Release);
    }
}

impl Default for SharedUserData {
    fn default() -> Self {
        Self::new()
    }
}
