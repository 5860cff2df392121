//! Formatted console output
//!
//! [`ConsoleWriter`] adapts the `print` syscall to [`core::fmt::Write`], so
//! components can use `write!` without an allocator. Each formatted piece is
//! one trap; a short write is retried on the remainder until the kernel has
//! taken every byte or refuses to make progress.

use core::fmt;

use cos_platform::TrapGate;

use crate::component::Component;

pub struct ConsoleWriter<'c, 'a, G> {
    component: &'c Component<'a, G>,
    written: usize,
}

impl<'c, 'a, G: TrapGate> ConsoleWriter<'c, 'a, G> {
    pub fn new(component: &'c Component<'a, G>) -> Self {
        Self {
            component,
            written: 0,
        }
    }

    /// Bytes the kernel accepted so far
    pub fn written(&self) -> usize {
        self.written
    }
}

impl<'c, 'a, G: TrapGate> fmt::Write for ConsoleWriter<'c, 'a, G> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let mut rest = s;
        while !rest.is_empty() {
            let n = self.component.print(rest).into_result().map_err(|_| fmt::Error)?;
            if n == 0 || n > rest.len() {
                return Err(fmt::Error);
            }
            self.written += n;
            // A split inside a UTF-8 sequence cannot be re-sent as `&str`
            rest = rest.get(n..).ok_or(fmt::Error)?;
        }
        Ok(())
    }
}

impl<'a, G: TrapGate> Component<'a, G> {
    pub fn console(&self) -> ConsoleWriter<'_, 'a, G> {
        ConsoleWriter::new(self)
    }
}

/// `print!`-style output through a component's console. Evaluates to the
/// `core::fmt::Result` of the write.
///
/// ```no_run
/// # fn demo<G: cos_sdk::TrapGate>(component: &cos_sdk::Component<'_, G>) -> core::fmt::Result {
/// cos_sdk::cos_print!(component, "spd {} ready\n", component.spd_id())?;
/// # Ok(())
/// # }
/// ```
#[macro_export]
macro_rules! cos_print {
    ($component:expr, $($arg:tt)*) => {{
        use ::core::fmt::Write as _;
        $crate::ConsoleWriter::new(&$component).write_fmt(format_args!($($arg)*))
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{ComponentEnv, HeapPointer, IdentityCell};
    use core::fmt::Write;
    use cos_mock::MockKernel;
    use cos_platform::{SchedDataArea, SharedUserData, SyscallNo};

    #[test]
    fn test_write_fmt_goes_through_print() {
        let identity = IdentityCell::with_id(2);
        let sched = SchedDataArea::new();
        let info = SharedUserData::new();
        let heap = HeapPointer::new();
        // SAFETY: Print frames come only from the SDK's `&str` wrappers
        let kernel = unsafe { MockKernel::new(&sched, &info).with_console() };
        let component = Component::new(ComponentEnv::new(&identity, &sched, &info, &heap), &kernel);

        let mut out = component.console();
        write!(out, "spd {} thread {}", component.spd_id(), 7).unwrap();

        assert_eq!(kernel.console(), "spd 2 thread 7");
        assert_eq!(out.written(), "spd 2 thread 7".len());
        assert!(kernel
            .traps()
            .iter()
            .all(|r| r.frame.op == SyscallNo::Print.tagged()));
    }

    #[test]
    fn test_print_failure_is_fmt_error() {
        let identity = IdentityCell::with_id(2);
        let sched = SchedDataArea::new();
        let info = SharedUserData::new();
        let heap = HeapPointer::new();
        let kernel = MockKernel::new(&sched, &info);
        let component = Component::new(ComponentEnv::new(&identity, &sched, &info, &heap), &kernel);

        kernel.set_return(SyscallNo::Print, -1);
        assert!(component.console().write_str("lost").is_err());
    }

    #[test]
    fn test_short_write_resends_remainder() {
        let identity = IdentityCell::with_id(2);
        let sched = SchedDataArea::new();
        let info = SharedUserData::new();
        let heap = HeapPointer::new();
        let kernel = MockKernel::new(&sched, &info);
        let component = Component::new(ComponentEnv::new(&identity, &sched, &info, &heap), &kernel);

        // Kernel accepts two bytes per trap
        kernel.set_return(SyscallNo::Print, 2);
        let mut out = component.console();
        out.write_str("abcd").unwrap();

        assert_eq!(out.written(), 4);
        let lens: std::vec::Vec<_> = kernel.traps().iter().map(|r| r.frame.args[1]).collect();
        assert_eq!(lens, [4, 2]);
    }

    #[test]
    fn test_short_write_without_progress_is_fmt_error() {
        let identity = IdentityCell::with_id(2);
        let sched = SchedDataArea::new();
        let info = SharedUserData::new();
        let heap = HeapPointer::new();
        let kernel = MockKernel::new(&sched, &info);
        let component = Component::new(ComponentEnv::new(&identity, &sched, &info, &heap), &kernel);

        kernel.set_return(SyscallNo::Print, 0);
        assert_eq!(component.console().write_str("abc"), Err(fmt::Error));

        // Claims more than was left on the second trap
        kernel.set_return(SyscallNo::Print, 2);
        let mut out = component.console();
        assert_eq!(out.write_str("abc"), Err(fmt::Error));
        assert_eq!(out.written(), 2);
    }

    #[test]
    fn test_cos_print_macro_returns_result() {
        let identity = IdentityCell::with_id(2);
        let sched = SchedDataArea::new();
        let info = SharedUserData::new();
        let heap = HeapPointer::new();
        // SAFETY: Print frames come only from the SDK's `&str` wrappers
        let kernel = unsafe { MockKernel::new(&sched, &info).with_console() };
        let component = Component::new(ComponentEnv::new(&identity, &sched, &info, &heap), &kernel);

        assert_eq!(crate::cos_print!(component, "x={:#x}", 255), Ok(()));
        assert_eq!(kernel.console(), "x=0xff");

        kernel.set_return(SyscallNo::Print, -1);
        assert_eq!(crate::cos_print!(component, "y"), Err(fmt::Error));
    }
}
