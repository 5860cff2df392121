//! Component identity and process-wide state
//!
//! A component learns who it is from a word-sized cell the loader patches
//! before the entry point runs. The cell is read on every trap and never
//! cached, so a loader (or a context switch into a composite component)
//! that rewrites it is observed by the very next call.
//!
//! The loader-facing cells are exported unmangled:
//! - `COS_THIS_SPD_ID`: component identity
//! - `COS_SCHED_NOTIFICATIONS`: scheduler notification area
//! - `COS_HEAP_PTR`: first free byte of the component heap

use core::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

use cos_platform::{ComponentId, SchedDataArea, SharedUserData, ThreadId, TrapGate};
use log::debug;

use crate::argreg::ArgRegion;

/// Word-sized identity cell, written once by the loader
#[repr(transparent)]
#[derive(Debug)]
pub struct IdentityCell(AtomicUsize);

impl IdentityCell {
    pub const fn new() -> Self {
        Self(AtomicUsize::new(0))
    }

    pub const fn with_id(id: ComponentId) -> Self {
        Self(AtomicUsize::new(id))
    }

    /// Loader-side write
    pub fn publish(&self, id: ComponentId) {
        self.0.store(id, Ordering::Release);
    }

    /// Live read of the whole word
    #[inline]
    pub fn load(&self) -> ComponentId {
        self.0.load(Ordering::Acquire)
    }
}

impl Default for IdentityCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Start of free memory, consumed by the component's allocator.
/// No bounds or alignment checks happen here.
#[repr(transparent)]
#[derive(Debug)]
pub struct HeapPointer(AtomicPtr<u8>);

impl HeapPointer {
    pub const fn new() -> Self {
        Self(AtomicPtr::new(core::ptr::null_mut()))
    }

    pub fn get(&self) -> *mut u8 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn set(&self, addr: *mut u8) {
        self.0.store(addr, Ordering::Relaxed);
    }
}

impl Default for HeapPointer {
    fn default() -> Self {
        Self::new()
    }
}

// The loader patches these as plain machine words
static_assertions::assert_eq_size!(IdentityCell, usize);
static_assertions::assert_eq_size!(HeapPointer, *mut u8);

#[no_mangle]
pub static COS_THIS_SPD_ID: IdentityCell = IdentityCell::new();

#[no_mangle]
pub static COS_SCHED_NOTIFICATIONS: SchedDataArea = SchedDataArea::new();

#[no_mangle]
pub static COS_HEAP_PTR: HeapPointer = HeapPointer::new();

/// The shared cells one component instance operates on
#[derive(Debug, Clone, Copy)]
pub struct ComponentEnv<'a> {
    identity: &'a IdentityCell,
    sched: &'a SchedDataArea,
    info: &'a SharedUserData,
    heap: &'a HeapPointer,
}

impl<'a> ComponentEnv<'a> {
    pub const fn new(
        identity: &'a IdentityCell,
        sched: &'a SchedDataArea,
        info: &'a SharedUserData,
        heap: &'a HeapPointer,
    ) -> Self {
        Self {
            identity,
            sched,
            info,
            heap,
        }
    }

    /// Environment of the running component: the exported cells plus the
    /// info region the loader mapped at `INFO_REGION_ADDR`.
    ///
    /// # Safety
    /// The loader must have mapped a `SharedUserData` at
    /// [`INFO_REGION_ADDR`](cos_platform::config::INFO_REGION_ADDR).
    #[cfg(feature = "runtime")]
    pub unsafe fn this() -> ComponentEnv<'static> {
        let info = &*(cos_platform::config::INFO_REGION_ADDR as *const SharedUserData);
        ComponentEnv::new(&COS_THIS_SPD_ID, &COS_SCHED_NOTIFICATIONS, info, &COS_HEAP_PTR)
    }

    /// This component's id, read from the cell now
    #[inline]
    pub fn spd_id(&self) -> ComponentId {
        self.identity.load()
    }

    /// Thread currently executing, as reported by the kernel
    pub fn thread_id(&self) -> ThreadId {
        self.info.current_thread()
    }

    /// Argument region of the current thread (may be null before dispatch)
    pub fn arg_region_ptr(&self) -> *mut u8 {
        self.info.argument_region()
    }

    pub fn heap_ptr(&self) -> *mut u8 {
        self.heap.get()
    }

    pub fn set_heap_ptr(&self, addr: *mut u8) {
        self.heap.set(addr);
    }

    pub fn sched(&self) -> &'a SchedDataArea {
        self.sched
    }
}

/// Explicit component context: shared cells plus the trap gate
pub struct Component<'a, G> {
    env: ComponentEnv<'a>,
    gate: G,
}

impl<'a, G: TrapGate> Component<'a, G> {
    pub fn new(env: ComponentEnv<'a>, gate: G) -> Self {
        debug!("component context for spd {}", env.spd_id());
        Self { env, gate }
    }

    pub fn env(&self) -> &ComponentEnv<'a> {
        &self.env
    }

    pub(crate) fn gate(&self) -> &G {
        &self.gate
    }

    /// Live identity read; see [`ComponentEnv::spd_id`]
    pub fn spd_id(&self) -> ComponentId {
        self.env.spd_id()
    }

    pub fn thread_id(&self) -> ThreadId {
        self.env.thread_id()
    }

    pub fn heap_ptr(&self) -> *mut u8 {
        self.env.heap_ptr()
    }

    pub fn set_heap_ptr(&self, addr: *mut u8) {
        self.env.set_heap_ptr(addr);
    }

    /// Argument region the kernel assigned to the current thread
    ///
    /// # Safety
    /// The info region's argument pointer must reference a writable,
    /// 4-byte aligned page owned by the current call context, and no other
    /// `ArgRegion` over the same page may be live.
    pub unsafe fn arg_region(&self) -> Option<ArgRegion<'a>> {
        ArgRegion::from_raw(self.env.arg_region_ptr())
    }
}

#[cfg(feature = "runtime")]
impl Component<'static, cos_platform::NativeGate> {
    /// Context of the running component
    ///
    /// # Safety
    /// See [`ComponentEnv::this`].
    pub unsafe fn this() -> Self {
        Component::new(ComponentEnv::this(), cos_platform::NativeGate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::argreg::ArgRegionPage;
    use cos_mock::MockKernel;

    #[test]
    fn test_identity_cell_publish() {
        let cell = IdentityCell::new();
        assert_eq!(cell.load(), 0);
        cell.publish(17);
        assert_eq!(cell.load(), 17);
        assert_eq!(IdentityCell::with_id(usize::MAX).load(), usize::MAX);
    }

    #[test]
    fn test_identity_wider_than_u16_is_not_truncated() {
        let cell = IdentityCell::with_id(1);
        cell.publish(0x1_0001);
        assert_eq!(cell.load(), 0x1_0001);
        assert_ne!(cell.load(), 1);
    }

    #[test]
    fn test_env_reads_live_identity() {
        let identity = IdentityCell::with_id(3);
        let sched = SchedDataArea::new();
        let info = SharedUserData::new();
        let heap = HeapPointer::new();
        let env = ComponentEnv::new(&identity, &sched, &info, &heap);

        assert_eq!(env.spd_id(), 3);
        identity.publish(4);
        assert_eq!(env.spd_id(), 4);
    }

    #[test]
    fn test_heap_pointer_get_set() {
        let identity = IdentityCell::new();
        let sched = SchedDataArea::new();
        let info = SharedUserData::new();
        let heap = HeapPointer::new();
        let kernel = MockKernel::new(&sched, &info);
        let component = Component::new(ComponentEnv::new(&identity, &sched, &info, &heap), &kernel);

        assert!(component.heap_ptr().is_null());
        // Unaligned on purpose: no validation at this layer
        let addr = 0x8000_0001usize as *mut u8;
        component.set_heap_ptr(addr);
        assert_eq!(component.heap_ptr(), addr);
        assert_eq!(heap.get(), addr);
    }

    #[test]
    fn test_info_region_accessors() {
        let identity = IdentityCell::new();
        let sched = SchedDataArea::new();
        let info = SharedUserData::new();
        let heap = HeapPointer::new();
        let kernel = MockKernel::new(&sched, &info);
        let component = Component::new(ComponentEnv::new(&identity, &sched, &info, &heap), &kernel);

        assert_eq!(component.thread_id(), 0);
        assert!(unsafe { component.arg_region() }.is_none());

        let mut page = ArgRegionPage::new();
        info.set_current_thread(9);
        info.set_argument_region(page.as_mut_ptr());
        assert_eq!(component.thread_id(), 9);

        let mut region = unsafe { component.arg_region() }.expect("region mapped");
        region.init();
        assert_eq!(region.used(), 4);
    }
}
