//! Argument region
//!
//! A page shared between call frames for payloads that do not fit in trap
//! registers. It is a stack of extents; every extent ends with a header
//! holding its own length (data + header), and the base header holds the
//! running total:
//!
//! ```text
//! | ..... |
//! +-------+
//! | sizeB | <- header closing extent B
//! | dataB |
//! +-------+
//! | sizeA | <- header closing extent A
//! | ..... |
//! | dataA |
//! +-------+
//! | total | <- base header, offset 0
//! +-------+
//! ```
//!
//! Frees are strictly LIFO: only the current top extent can be released.
//! A rejected call leaves the region untouched. There is no internal
//! locking; one region belongs to one call context.

use core::marker::PhantomData;
use core::ptr::{self, NonNull};

use cos_platform::config::{ARGREG_SZ, MAX_ARG_SZ};
use log::debug;
use thiserror::Error;

/// Extent header as laid out in the page
#[repr(C)]
struct ArgRegExtent {
    size: u32,
}

/// Size of one extent header
pub const EXTENT_HEADER_SZ: usize = core::mem::size_of::<ArgRegExtent>();

static_assertions::const_assert_eq!(EXTENT_HEADER_SZ, 4);
static_assertions::const_assert!(MAX_ARG_SZ <= u32::MAX as usize);

/// Round `v` up to `a` (a power of two)
#[inline]
pub const fn align_up(v: usize, a: usize) -> usize {
    (v + (a - 1)) & !(a - 1)
}

/// Argument region failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ArgRegionError {
    #[error("extent of {requested} bytes exceeds the per-extent maximum of {max}")]
    TooLarge { requested: usize, max: usize },

    #[error("extent of {requested} bytes does not fit ({available} bytes left)")]
    Exhausted { requested: usize, available: usize },

    #[error("nothing allocated")]
    Empty,

    #[error("pointer is not the top extent")]
    NotTop,

    #[error("pointer lies outside the argument region")]
    OutOfBounds,

    #[error("region header is inconsistent (used = {used})")]
    Corrupted { used: usize },
}

pub type Result<T> = core::result::Result<T, ArgRegionError>;

/// Page-sized, page-aligned backing store for an argument region
#[repr(C, align(4096))]
pub struct ArgRegionPage([u8; ARGREG_SZ]);

static_assertions::const_assert_eq!(core::mem::align_of::<ArgRegionPage>(), ARGREG_SZ);

impl ArgRegionPage {
    pub const fn new() -> Self {
        Self([0; ARGREG_SZ])
    }

    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.0.as_mut_ptr()
    }
}

impl Default for ArgRegionPage {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle on one argument region
pub struct ArgRegion<'a> {
    base: NonNull<u8>,
    _page: PhantomData<&'a mut [u8; ARGREG_SZ]>,
}

impl<'a> ArgRegion<'a> {
    /// Region over an owned page. Call [`init`](Self::init) before use.
    pub fn new(page: &'a mut ArgRegionPage) -> Self {
        Self {
            base: NonNull::from(&mut page.0).cast(),
            _page: PhantomData,
        }
    }

    /// Region over a kernel-provided page
    ///
    /// Returns `None` for a null or misaligned pointer.
    ///
    /// # Safety
    /// `base` must point to `ARGREG_SZ` writable bytes valid for `'a` and
    /// not aliased by another live `ArgRegion`.
    pub unsafe fn from_raw(base: *mut u8) -> Option<Self> {
        let base = NonNull::new(base)?;
        if base.as_ptr() as usize % EXTENT_HEADER_SZ != 0 {
            return None;
        }
        Some(Self {
            base,
            _page: PhantomData,
        })
    }

    #[inline]
    fn read_header(&self, offset: usize) -> usize {
        debug_assert!(offset + EXTENT_HEADER_SZ <= ARGREG_SZ);
        // SAFETY: offset is in bounds and 4-aligned; the page is shared, so
        // the access is volatile.
        unsafe { ptr::read_volatile(self.base.as_ptr().add(offset).cast::<u32>()) as usize }
    }

    #[inline]
    fn write_header(&mut self, offset: usize, size: usize) {
        debug_assert!(offset + EXTENT_HEADER_SZ <= ARGREG_SZ);
        // SAFETY: as in `read_header`; sizes never exceed ARGREG_SZ.
        unsafe { ptr::write_volatile(self.base.as_ptr().add(offset).cast::<u32>(), size as u32) }
    }

    /// Running total, validated against the region bounds
    fn checked_used(&self) -> Result<usize> {
        let used = self.read_header(0);
        if used < EXTENT_HEADER_SZ || used > ARGREG_SZ || used % EXTENT_HEADER_SZ != 0 {
            return Err(ArgRegionError::Corrupted { used });
        }
        Ok(used)
    }

    /// Reset to the bare base header
    pub fn init(&mut self) {
        debug!("argument region init at {:p}", self.base);
        self.write_header(0, EXTENT_HEADER_SZ);
    }

    /// Bytes in use, base header included
    pub fn used(&self) -> usize {
        self.read_header(0)
    }

    pub fn capacity(&self) -> usize {
        ARGREG_SZ
    }

    pub fn available(&self) -> usize {
        ARGREG_SZ.saturating_sub(self.used())
    }

    /// Push an extent with room for `size` bytes and return its data
    /// pointer. The memory is not zeroed.
    pub fn alloc(&mut self, size: usize) -> Result<NonNull<u8>> {
        let used = self.checked_used()?;
        if size > MAX_ARG_SZ {
            return Err(ArgRegionError::TooLarge {
                requested: size,
                max: MAX_ARG_SZ,
            });
        }
        let ext_len = align_up(size, EXTENT_HEADER_SZ) + EXTENT_HEADER_SZ;
        if ext_len > MAX_ARG_SZ {
            return Err(ArgRegionError::TooLarge {
                requested: ext_len,
                max: MAX_ARG_SZ,
            });
        }
        if used + ext_len > ARGREG_SZ {
            return Err(ArgRegionError::Exhausted {
                requested: ext_len,
                available: ARGREG_SZ - used,
            });
        }

        self.write_header(used + ext_len - EXTENT_HEADER_SZ, ext_len);
        self.write_header(0, used + ext_len);
        // SAFETY: used < ARGREG_SZ, so the pointer stays inside the page
        Ok(unsafe { NonNull::new_unchecked(self.base.as_ptr().add(used)) })
    }

    /// Push an extent holding a copy of `data`
    pub fn alloc_copy(&mut self, data: &[u8]) -> Result<NonNull<u8>> {
        let dst = self.alloc(data.len())?;
        // SAFETY: the extent was just reserved with room for data.len() bytes
        unsafe { ptr::copy_nonoverlapping(data.as_ptr(), dst.as_ptr(), data.len()) };
        Ok(dst)
    }

    /// Pop the top extent. `ptr` must be the pointer `alloc` returned for
    /// it; anything else is rejected and nothing changes.
    pub fn free(&mut self, ptr: *const u8) -> Result<()> {
        let used = self.checked_used()?;
        if !self.contains(ptr) {
            return Err(ArgRegionError::OutOfBounds);
        }
        if used == EXTENT_HEADER_SZ {
            return Err(ArgRegionError::Empty);
        }

        let ext_len = self.read_header(used - EXTENT_HEADER_SZ);
        if ext_len < EXTENT_HEADER_SZ
            || ext_len > used - EXTENT_HEADER_SZ
            || ext_len % EXTENT_HEADER_SZ != 0
        {
            return Err(ArgRegionError::Corrupted { used });
        }
        let top = self.base.as_ptr() as usize + used - ext_len;
        if ptr as usize != top {
            return Err(ArgRegionError::NotTop);
        }

        self.write_header(0, used - ext_len);
        Ok(())
    }

    /// Data bytes of the top extent, alignment padding included
    pub fn top_mut(&mut self) -> Option<&mut [u8]> {
        let used = self.checked_used().ok()?;
        if used == EXTENT_HEADER_SZ {
            return None;
        }
        let ext_len = self.read_header(used - EXTENT_HEADER_SZ);
        if ext_len < EXTENT_HEADER_SZ || ext_len > used - EXTENT_HEADER_SZ {
            return None;
        }
        let len = ext_len - EXTENT_HEADER_SZ;
        // SAFETY: the extent lies inside the page and `&mut self` keeps it
        // exclusive for the slice's lifetime.
        Some(unsafe {
            core::slice::from_raw_parts_mut(self.base.as_ptr().add(used - ext_len), len)
        })
    }

    /// Whether `ptr` points into this region
    pub fn contains(&self, ptr: *const u8) -> bool {
        let base = self.base.as_ptr() as usize;
        let addr = ptr as usize;
        addr >= base && addr < base + ARGREG_SZ
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.base.as_ptr()
    }
}
