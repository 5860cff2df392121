//! System call wrappers
//!
//! Every wrapper reads the component id fresh, lowers its arguments to at
//! most three words, traps, and hands the one-word answer back untouched
//! in a [`SyscallRet`]. What a particular negative value means is up to the
//! caller of that operation.

use cos_platform::{
    BrandUpcall, BuffMgmt, MmapCntl, PackedCall, SpdId, SyscallNo, ThdCntl, ThreadId, TrapFrame,
    TrapGate, Word,
};
use log::trace;

use crate::component::Component;
use crate::{Error, Result};

/// One-word kernel answer, unchanged
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SyscallRet(isize);

impl SyscallRet {
    pub const fn from_raw(ret: isize) -> Self {
        Self(ret)
    }

    /// The word as the kernel returned it
    pub const fn word(self) -> isize {
        self.0
    }

    /// Same bits, for operations with an unsigned return
    pub const fn as_unsigned(self) -> usize {
        self.0 as usize
    }

    pub const fn is_ok(self) -> bool {
        self.0 >= 0
    }

    pub const fn is_err(self) -> bool {
        self.0 < 0
    }

    /// Non-negative words become `Ok`, the failure sentinel becomes
    /// [`Error::Syscall`] carrying the raw value
    pub fn into_result(self) -> Result<usize> {
        if self.is_ok() {
            Ok(self.0 as usize)
        } else {
            Err(Error::Syscall { ret: self.0 })
        }
    }
}

impl From<SyscallRet> for isize {
    fn from(ret: SyscallRet) -> Self {
        ret.0
    }
}

impl<'a, G: TrapGate> Component<'a, G> {
    /// Trap with `no` and up to three argument words
    pub fn invoke(&self, no: SyscallNo, args: [Word; 3]) -> SyscallRet {
        let frame = TrapFrame::new(no, self.spd_id(), args);
        let ret = self.gate().trap(&frame);
        trace!("{:?}(spd={}, {:x?}) -> {}", no, frame.spd, args, ret);
        SyscallRet(ret)
    }

    /// Trap with a packed operation, lowered to wire words here
    pub fn invoke_packed<P: PackedCall>(&self, call: &P) -> SyscallRet {
        self.invoke(P::SYSCALL, call.encode())
    }

    /// Return from an upcall to the kernel's resume path
    pub fn resume_return(&self) -> SyscallRet {
        self.invoke(SyscallNo::ResumeReturn, [0; 3])
    }

    /// Write `msg` to the kernel console. Returns the byte count.
    ///
    /// # Example
    /// ```no_run
    /// # fn demo<G: cos_sdk::TrapGate>(component: &cos_sdk::Component<'_, G>) {
    /// component.print("Hello, world!\n");
    /// # }
    /// ```
    pub fn print(&self, msg: &str) -> SyscallRet {
        self.invoke(SyscallNo::Print, [msg.as_ptr() as Word, msg.len(), 0])
    }

    /// Create a thread. The three words are passed through to the kernel;
    /// on success the new thread id is returned.
    pub fn create_thread(&self, a: Word, b: Word, c: Word) -> SyscallRet {
        self.invoke(SyscallNo::CreateThread, [a, b, c])
    }

    /// Retire `kill`, optionally switching to `switch_to` (0 for none)
    pub fn kill_thd(&self, kill: ThreadId, switch_to: ThreadId) -> SyscallRet {
        self.invoke(SyscallNo::KillThd, [kill as Word, switch_to as Word, 0])
    }

    /// Deliver a branded upcall to `thd_id`
    pub fn brand_upcall(&self, thd_id: ThreadId, flags: u16, arg1: Word, arg2: Word) -> SyscallRet {
        self.invoke_packed(&BrandUpcall {
            thd_id,
            flags,
            arg1,
            arg2,
        })
    }

    pub fn brand_cntl(&self, thd_id: ThreadId, flags: Word, depth: Word) -> SyscallRet {
        self.invoke(SyscallNo::BrandCntl, [thd_id as Word, flags, depth])
    }

    /// Upcall into component `spd`
    pub fn upcall(&self, spd: SpdId) -> SyscallRet {
        self.invoke(SyscallNo::Upcall, [spd as Word, 0, 0])
    }

    pub fn sched_cntl(&self, op: Word, thd_id: ThreadId, option: Word) -> SyscallRet {
        self.invoke(SyscallNo::SchedCntl, [op, thd_id as Word, option])
    }

    /// Composite protection domain control
    pub fn mpd_cntl(&self, op: Word, composite_spd: SpdId, composite_dest: SpdId) -> SyscallRet {
        self.invoke(
            SyscallNo::MpdCntl,
            [op, composite_spd as Word, composite_dest as Word],
        )
    }

    /// Memory-map control: `op` and `flags` share a word with `dest_spd`
    pub fn mmap_cntl(
        &self,
        op: u8,
        flags: u8,
        dest_spd: SpdId,
        dest_addr: Word,
        mem_id: Word,
    ) -> SyscallRet {
        self.invoke_packed(&MmapCntl {
            op,
            flags,
            dest_spd,
            dest_addr,
            mem_id,
        })
    }

    pub fn brand_wire(&self, thd_id: ThreadId, option: Word, data: Word) -> SyscallRet {
        self.invoke(SyscallNo::BrandWire, [thd_id as Word, option, data])
    }

    /// Capability control. The return is a full-width unsigned word with
    /// no failure sentinel.
    pub fn cap_cntl(&self, client: SpdId, server: SpdId, data: Word) -> usize {
        self.invoke(SyscallNo::CapCntl, [client as Word, server as Word, data])
            .as_unsigned()
    }

    /// Buffer management on `len` bytes at `addr` for `thd_id`
    pub fn buff_mgmt(&self, op: u16, addr: *mut u8, len: u16, thd_id: ThreadId) -> SyscallRet {
        self.invoke_packed(&BuffMgmt {
            op,
            addr: addr as Word,
            len,
            thd_id,
        })
    }

    /// Thread control: `op` and `thd_id` share the first word
    pub fn thd_cntl(&self, op: u16, thd_id: ThreadId, arg1: Word, arg2: Word) -> SyscallRet {
        self.invoke_packed(&ThdCntl {
            op,
            thd_id,
            arg1,
            arg2,
        })
    }
}
