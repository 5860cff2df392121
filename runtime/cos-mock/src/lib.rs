//! MOCK kernel for hosted development
//!
//! # WARNING: This is NOT the kernel!
//!
//! A small simulation of the kernel side of the trap, enough to exercise
//! the component interface layer in ordinary `cargo test` runs:
//!
//! - every trap is recorded with its decoded call and return value
//! - `switch_thread` resolves its target from the scheduler notification
//!   area at trap time, never from the registers
//! - threads are created and killed against a simple id set
//! - `print` output is captured once enabled with the `unsafe`
//!   [`MockKernel::with_console`] opt-in; otherwise only the length is
//!   acknowledged and the pointer is never read
//! - a one-shot preemption hook runs at trap entry, before the hint is read
//!
//! ## Limitations
//!
//! - No capabilities, no memory mapping: packed control calls are decoded
//!   and acknowledged with 0
//! - Single CPU; callers serialize publish+trap themselves

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use cos_platform::{
    BrandUpcall, BuffMgmt, DecodeError, MmapCntl, NextThreadHint, PackedCall, SchedDataArea,
    SchedNextThread, SharedUserData, SwitchThread, SyscallNo, ThdCntl, ThreadId, TrapFrame,
    TrapGate, Word,
};
use log::{trace, warn};

/// Failure sentinel returned for every rejected call
pub const EINVAL: isize = -1;

/// First id handed out by `create_thread`
pub const FIRST_DYNAMIC_THREAD: ThreadId = 64;

/// A trap as the kernel understood it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodedCall {
    Switch(SwitchThread),
    Mmap(MmapCntl),
    BrandUpcall(BrandUpcall),
    BuffMgmt(BuffMgmt),
    ThdCntl(ThdCntl),
    /// Unpacked operation; arguments are in the frame
    Plain(SyscallNo),
}

/// One handled trap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrapRecord {
    pub frame: TrapFrame,
    pub call: Option<DecodedCall>,
    /// Hint the kernel read for a switch
    pub resolved: Option<NextThreadHint>,
    pub ret: isize,
}

type PreemptHook = Box<dyn FnOnce(&SchedNextThread) + Send>;

struct MockState {
    threads: BTreeSet<ThreadId>,
    next_thread: ThreadId,
    traps: Vec<TrapRecord>,
    console: Option<String>,
    overrides: HashMap<SyscallNo, isize>,
}

/// Simulated kernel bound to one component's shared regions
pub struct MockKernel<'a> {
    sched: &'a SchedDataArea,
    info: &'a SharedUserData,
    state: Mutex<MockState>,
    preempt: Mutex<Option<PreemptHook>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<'a> MockKernel<'a> {
    pub fn new(sched: &'a SchedDataArea, info: &'a SharedUserData) -> Self {
        Self {
            sched,
            info,
            state: Mutex::new(MockState {
                threads: BTreeSet::new(),
                next_thread: FIRST_DYNAMIC_THREAD,
                traps: Vec::new(),
                console: None,
                overrides: HashMap::new(),
            }),
            preempt: Mutex::new(None),
        }
    }

    /// Builder form of [`add_thread`](Self::add_thread)
    pub fn with_threads(self, threads: impl IntoIterator<Item = ThreadId>) -> Self {
        for thread in threads {
            self.add_thread(thread);
        }
        self
    }

    /// Capture `print` output, readable through [`console`](Self::console)
    ///
    /// # Safety
    /// Every `Print` frame trapped into this kernel afterwards must carry
    /// a pointer and length describing bytes valid for reads for the
    /// duration of the trap, as frames lowered from a `&str` by the SDK
    /// wrappers do.
    pub unsafe fn with_console(self) -> Self {
        lock(&self.state).console = Some(String::new());
        self
    }

    /// Make `thread` a valid switch target
    pub fn add_thread(&self, thread: ThreadId) {
        lock(&self.state).threads.insert(thread);
    }

    pub fn has_thread(&self, thread: ThreadId) -> bool {
        lock(&self.state).threads.contains(&thread)
    }

    /// Force every trap of `no` to return `ret`
    pub fn set_return(&self, no: SyscallNo, ret: isize) {
        lock(&self.state).overrides.insert(no, ret);
    }

    /// Run `hook` at the entry of the next trap, before the kernel reads
    /// the hint. Simulates a higher-priority thread publishing between a
    /// caller's publish and its trap.
    pub fn preempt_once(&self, hook: impl FnOnce(&SchedNextThread) + Send + 'static) {
        *lock(&self.preempt) = Some(Box::new(hook));
    }

    /// All traps handled so far, oldest first
    pub fn traps(&self) -> Vec<TrapRecord> {
        lock(&self.state).traps.clone()
    }

    pub fn last_trap(&self) -> Option<TrapRecord> {
        lock(&self.state).traps.last().copied()
    }

    /// Targets resolved by switch traps, oldest first
    pub fn resolved_targets(&self) -> Vec<ThreadId> {
        lock(&self.state)
            .traps
            .iter()
            .filter_map(|record| record.resolved.map(|hint| hint.thread_id))
            .collect()
    }

    /// Everything written through `print`; empty unless capture is on
    pub fn console(&self) -> String {
        lock(&self.state).console.clone().unwrap_or_default()
    }

    fn decode(no: SyscallNo, args: [Word; 3]) -> Result<DecodedCall, DecodeError> {
        Ok(match no {
            SyscallNo::SwitchThread => DecodedCall::Switch(SwitchThread::decode(args)?),
            SyscallNo::MmapCntl => DecodedCall::Mmap(MmapCntl::decode(args)?),
            SyscallNo::BrandUpcall => DecodedCall::BrandUpcall(BrandUpcall::decode(args)?),
            SyscallNo::BuffMgmt => DecodedCall::BuffMgmt(BuffMgmt::decode(args)?),
            SyscallNo::ThdCntl => DecodedCall::ThdCntl(ThdCntl::decode(args)?),
            other => DecodedCall::Plain(other),
        })
    }

    fn dispatch(
        &self,
        state: &mut MockState,
        call: DecodedCall,
        frame: &TrapFrame,
        resolved: Option<NextThreadHint>,
    ) -> isize {
        match call {
            DecodedCall::Switch(_) => {
                // Registers are advisory; the live hint decides
                let Some(hint) = resolved else {
                    return EINVAL;
                };
                if !state.threads.contains(&hint.thread_id) {
                    warn!("switch to unknown thread {}", hint.thread_id);
                    return EINVAL;
                }
                self.info.set_current_thread(hint.thread_id);
                0
            }
            DecodedCall::Plain(SyscallNo::CreateThread) => {
                let id = state.next_thread;
                state.next_thread = state.next_thread.wrapping_add(1);
                state.threads.insert(id);
                id as isize
            }
            DecodedCall::Plain(SyscallNo::KillThd) => {
                let (Ok(victim), Ok(switch_to)) = (
                    ThreadId::try_from(frame.args[0]),
                    ThreadId::try_from(frame.args[1]),
                ) else {
                    return EINVAL;
                };
                if !state.threads.remove(&victim) {
                    warn!("kill of unknown thread {}", victim);
                    return EINVAL;
                }
                if switch_to != 0 && state.threads.contains(&switch_to) {
                    self.info.set_current_thread(switch_to);
                }
                0
            }
            DecodedCall::Plain(SyscallNo::Print) => {
                let (ptr, len) = (frame.args[0] as *const u8, frame.args[1]);
                if ptr.is_null() {
                    return EINVAL;
                }
                if let Some(console) = state.console.as_mut() {
                    // SAFETY: capture was enabled through `with_console`,
                    // whose caller vouched for every Print frame.
                    let bytes = unsafe { std::slice::from_raw_parts(ptr, len) };
                    console.push_str(&String::from_utf8_lossy(bytes));
                }
                len as isize
            }
            _ => 0,
        }
    }
}

impl TrapGate for MockKernel<'_> {
    fn trap(&self, frame: &TrapFrame) -> isize {
        // Preemption lands before the kernel looks at anything
        let hook = lock(&self.preempt).take();
        if let Some(hook) = hook {
            hook(&self.sched.next);
        }

        let mut state = lock(&self.state);
        let (call, resolved, ret) = match frame.syscall() {
            Ok(no) => match Self::decode(no, frame.args) {
                Ok(call) => {
                    let resolved = matches!(call, DecodedCall::Switch(_))
                        .then(|| self.sched.next.current());
                    let forced = state.overrides.get(&no).copied();
                    let ret = match forced {
                        Some(ret) => ret,
                        None => self.dispatch(&mut state, call, frame, resolved),
                    };
                    (Some(call), resolved, ret)
                }
                Err(err) => {
                    warn!("rejecting {:?}: {}", no, err);
                    (None, None, EINVAL)
                }
            },
            Err(err) => {
                warn!("rejecting trap: {}", err);
                (None, None, EINVAL)
            }
        };

        trace!(
            "trap op={:#x} spd={} args={:x?} -> {}",
            frame.op,
            frame.spd,
            frame.args,
            ret
        );
        state.traps.push(TrapRecord {
            frame: *frame,
            call,
            resolved,
            ret,
        });
        ret
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cos_platform::SwitchFlags;

    fn frame(no: SyscallNo, args: [Word; 3]) -> TrapFrame {
        TrapFrame::new(no, 1, args)
    }

    #[test]
    fn test_switch_resolves_from_hint_not_registers() {
        let sched = SchedDataArea::new();
        let info = SharedUserData::new();
        let kernel = MockKernel::new(&sched, &info).with_threads([5, 7]);

        sched.next.publish(NextThreadHint::new(7, SwitchFlags::empty(), 20));
        let ret = kernel.trap(&frame(SyscallNo::SwitchThread, [5, 0, 0]));

        assert_eq!(ret, 0);
        assert_eq!(kernel.resolved_targets(), vec![7]);
        assert_eq!(info.current_thread(), 7);
    }

    #[test]
    fn test_switch_to_unknown_thread_fails() {
        let sched = SchedDataArea::new();
        let info = SharedUserData::new();
        let kernel = MockKernel::new(&sched, &info).with_threads([5]);

        sched.next.publish(NextThreadHint::new(9, SwitchFlags::empty(), 0));
        assert_eq!(kernel.trap(&frame(SyscallNo::SwitchThread, [9, 0, 0])), EINVAL);
        assert_eq!(info.current_thread(), 0);
    }

    #[test]
    fn test_preempt_hook_runs_before_resolution() {
        let sched = SchedDataArea::new();
        let info = SharedUserData::new();
        let kernel = MockKernel::new(&sched, &info).with_threads([5, 7]);

        sched.next.publish(NextThreadHint::new(5, SwitchFlags::empty(), 10));
        kernel.preempt_once(|slot| slot.publish(NextThreadHint::new(7, SwitchFlags::empty(), 20)));
        kernel.trap(&frame(SyscallNo::SwitchThread, [5, 0, 0]));

        assert_eq!(kernel.resolved_targets(), vec![7]);
        // The hook is one-shot
        sched.next.publish(NextThreadHint::new(5, SwitchFlags::empty(), 10));
        kernel.trap(&frame(SyscallNo::SwitchThread, [5, 0, 0]));
        assert_eq!(kernel.resolved_targets(), vec![7, 5]);
    }

    #[test]
    fn test_create_and_kill_threads() {
        let sched = SchedDataArea::new();
        let info = SharedUserData::new();
        let kernel = MockKernel::new(&sched, &info).with_threads([1]);

        let id = kernel.trap(&frame(SyscallNo::CreateThread, [0, 0, 0]));
        assert_eq!(id, FIRST_DYNAMIC_THREAD as isize);
        assert!(kernel.has_thread(FIRST_DYNAMIC_THREAD));

        let ret = kernel.trap(&frame(SyscallNo::KillThd, [id as Word, 1, 0]));
        assert_eq!(ret, 0);
        assert!(!kernel.has_thread(FIRST_DYNAMIC_THREAD));
        assert_eq!(info.current_thread(), 1);

        assert_eq!(kernel.trap(&frame(SyscallNo::KillThd, [id as Word, 0, 0])), EINVAL);
    }

    #[test]
    fn test_rejects_untagged_and_overflowing_frames() {
        let sched = SchedDataArea::new();
        let info = SharedUserData::new();
        let kernel = MockKernel::new(&sched, &info);

        let untagged = TrapFrame { op: 4, spd: 1, args: [0; 3] };
        assert_eq!(kernel.trap(&untagged), EINVAL);
        assert_eq!(
            kernel.trap(&frame(SyscallNo::BuffMgmt, [0, 0x1_0000, 0])),
            EINVAL
        );
        assert!(kernel.traps().iter().all(|record| record.call.is_none()));
    }

    #[test]
    fn test_overrides_and_console() {
        let sched = SchedDataArea::new();
        let info = SharedUserData::new();
        // SAFETY: every Print frame below points at a live `&str`
        let kernel = unsafe { MockKernel::new(&sched, &info).with_console() };

        let msg = "hello";
        let ret = kernel.trap(&frame(SyscallNo::Print, [msg.as_ptr() as Word, msg.len(), 0]));
        assert_eq!(ret, 5);
        assert_eq!(kernel.console(), "hello");

        kernel.set_return(SyscallNo::SchedCntl, -3);
        assert_eq!(kernel.trap(&frame(SyscallNo::SchedCntl, [0, 0, 0])), -3);
        assert_eq!(kernel.last_trap().map(|record| record.ret), Some(-3));
    }

    #[test]
    fn test_print_without_capture_never_reads_pointer() {
        let sched = SchedDataArea::new();
        let info = SharedUserData::new();
        let kernel = MockKernel::new(&sched, &info);

        // Address that is not readable memory
        let ret = kernel.trap(&frame(SyscallNo::Print, [0x10, 4, 0]));
        assert_eq!(ret, 4);
        assert_eq!(kernel.console(), "");
        assert_eq!(kernel.last_trap().map(|record| record.frame.args[0]), Some(0x10));
    }
}
