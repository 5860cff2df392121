//! Thread switch protocol
//!
//! Deciding which thread runs next and trapping are two steps, and a
//! higher-priority thread can run between them and make its own decision.
//! So the decision is published into the scheduler notification area
//! first, and the kernel resolves the switch from whatever is in that slot
//! when the trap arrives. The thread id and flags passed in registers are
//! advisory only.
//!
//! ```text
//!   decide ──► publish (one atomic store) ──► trap ──► kernel reads slot
//!                         ▲
//!          preempting thread may overwrite here
//! ```
//!
//! Concurrent publishers to the same slot are the caller's problem: if a
//! thread and an interrupt-completion path can race on one trap, disable
//! local preemption around publish+trap.

use cos_platform::{NextThreadHint, SwitchFlags, SwitchThread, ThreadId, TrapGate};
use log::trace;

use crate::component::Component;
use crate::syscall::SyscallRet;

impl<'a, G: TrapGate> Component<'a, G> {
    /// Publish step: overwrite the next-thread slot
    pub fn publish_next(&self, hint: NextThreadHint) {
        trace!(
            "publish next thread {} flags={:?} urgency={}",
            hint.thread_id,
            hint.flags,
            hint.urgency
        );
        self.env().sched().next.publish(hint);
    }

    /// Trap step: ask the kernel to switch according to the live slot
    pub fn trap_switch(&self, thd_id: ThreadId, flags: SwitchFlags) -> SyscallRet {
        self.invoke_packed(&SwitchThread { thd_id, flags })
    }

    /// Publish `{thd_id, flags, urgency}`, then trap.
    pub fn switch_thread(&self, thd_id: ThreadId, flags: SwitchFlags, urgency: u32) -> SyscallRet {
        self.publish_next(NextThreadHint::new(thd_id, flags, urgency));
        self.trap_switch(thd_id, flags)
    }

    /// Bias what the kernel resumes once the current (interrupt or upcall)
    /// execution completes, without switching now. Only the thread id is
    /// replaced; published flags and urgency stay.
    pub fn next_thread(&self, thd_id: ThreadId) {
        trace!("publish next thread {} (id only)", thd_id);
        self.env().sched().next.publish_thread(thd_id);
    }

    /// What the kernel would resolve if this thread trapped now
    pub fn pending_hint(&self) -> NextThreadHint {
        self.env().sched().next.current()
    }
}
