//! Syscall ABI
//!
//! A trap carries five words: the tagged operation code, the caller's
//! component id, and up to three arguments. One word comes back.

use thiserror::Error;

use crate::config::{SYSCALL_TAG_MASK, SYSCALL_TAG_SHIFT};

/// Machine word as carried in a trap register
pub type Word = usize;

/// Component (protection domain) identifier as carried in packed fields
pub type SpdId = u16;

/// Caller identity as the loader writes it: a full machine word, sent
/// untruncated in the trap's identity channel
pub type ComponentId = Word;

/// Kernel thread identifier
pub type ThreadId = u16;

/// Errors raised while lowering or lifting wire words
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unknown syscall number {0}")]
    UnknownSyscall(u16),

    #[error("primary word {0:#x} carries bits below the syscall tag")]
    Untagged(Word),

    #[error("field `{field}` does not fit its wire width (value {value:#x})")]
    FieldOverflow { field: &'static str, value: Word },
}

/// Operation codes understood by the kernel
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SyscallNo {
    ResumeReturn = 1,
    Print = 2,
    CreateThread = 3,
    SwitchThread = 4,
    KillThd = 5,
    BrandUpcall = 6,
    BrandCntl = 7,
    Upcall = 8,
    SchedCntl = 9,
    MpdCntl = 10,
    MmapCntl = 11,
    BrandWire = 12,
    CapCntl = 13,
    BuffMgmt = 14,
    ThdCntl = 15,
}

/// How the caller interprets the returned word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnKind {
    /// Non-negative is success, negative is the failure sentinel
    Signed,
    /// Full-width value, no sentinel
    Unsigned,
}

/// Static description of one operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyscallDescriptor {
    pub no: SyscallNo,
    pub arity: usize,
    pub ret: ReturnKind,
}

impl SyscallNo {
    /// Every operation, in numeric order
    pub const ALL: [SyscallNo; 15] = [
        SyscallNo::ResumeReturn,
        SyscallNo::Print,
        SyscallNo::CreateThread,
        SyscallNo::SwitchThread,
        SyscallNo::KillThd,
        SyscallNo::BrandUpcall,
        SyscallNo::BrandCntl,
        SyscallNo::Upcall,
        SyscallNo::SchedCntl,
        SyscallNo::MpdCntl,
        SyscallNo::MmapCntl,
        SyscallNo::BrandWire,
        SyscallNo::CapCntl,
        SyscallNo::BuffMgmt,
        SyscallNo::ThdCntl,
    ];

    /// Raw operation number
    pub const fn number(self) -> u16 {
        self as u16
    }

    /// Primary trap word: the operation number shifted above the host range
    pub const fn tagged(self) -> Word {
        (self as Word) << SYSCALL_TAG_SHIFT
    }

    /// Recover the operation from a primary trap word
    pub fn from_tagged(word: Word) -> Result<Self, DecodeError> {
        if word & SYSCALL_TAG_MASK != 0 {
            return Err(DecodeError::Untagged(word));
        }
        let number = word >> SYSCALL_TAG_SHIFT;
        let number = u16::try_from(number).map_err(|_| DecodeError::Untagged(word))?;
        Self::try_from(number)
    }

    /// Number of argument words the operation consumes
    pub const fn arity(self) -> usize {
        match self {
            SyscallNo::ResumeReturn => 0,
            SyscallNo::Upcall => 1,
            SyscallNo::Print | SyscallNo::SwitchThread | SyscallNo::KillThd => 2,
            _ => 3,
        }
    }

    pub const fn descriptor(self) -> SyscallDescriptor {
        let ret = match self {
            SyscallNo::CapCntl => ReturnKind::Unsigned,
            _ => ReturnKind::Signed,
        };
        SyscallDescriptor {
            no: self,
            arity: self.arity(),
            ret,
        }
    }
}

impl TryFrom<u16> for SyscallNo {
    type Error = DecodeError;

    fn try_from(number: u16) -> Result<Self, Self::Error> {
        match number {
            1..=15 => Ok(Self::ALL[number as usize - 1]),
            _ => Err(DecodeError::UnknownSyscall(number)),
        }
    }
}

/// Register image of one trap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrapFrame {
    /// Tagged operation code (`SyscallNo::tagged`)
    pub op: Word,
    /// Caller identity, read from the identity cell for this trap
    pub spd: Word,
    /// Argument words; unused slots are zero
    pub args: [Word; 3],
}

impl TrapFrame {
    pub fn new(no: SyscallNo, spd: ComponentId, args: [Word; 3]) -> Self {
        Self {
            op: no.tagged(),
            spd,
            args,
        }
    }

    /// Operation carried in the primary word
    pub fn syscall(&self) -> Result<SyscallNo, DecodeError> {
        SyscallNo::from_tagged(self.op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_leaves_host_range_clear() {
        for no in SyscallNo::ALL {
            assert_eq!(no.tagged() & SYSCALL_TAG_MASK, 0);
            assert_eq!(no.tagged() >> SYSCALL_TAG_SHIFT, no.number() as usize);
        }
    }

    #[test]
    fn test_from_tagged() {
        assert_eq!(SyscallNo::from_tagged(4 << 16), Ok(SyscallNo::SwitchThread));
        assert_eq!(SyscallNo::from_tagged(15 << 16), Ok(SyscallNo::ThdCntl));
        assert_eq!(SyscallNo::from_tagged(4), Err(DecodeError::Untagged(4)));
        assert_eq!(
            SyscallNo::from_tagged(16 << 16),
            Err(DecodeError::UnknownSyscall(16))
        );
        assert_eq!(
            SyscallNo::from_tagged(0),
            Err(DecodeError::UnknownSyscall(0))
        );
    }

    #[test]
    fn test_numbers_are_dense() {
        for (i, no) in SyscallNo::ALL.iter().enumerate() {
            assert_eq!(no.number() as usize, i + 1);
            assert_eq!(SyscallNo::try_from(no.number()), Ok(*no));
        }
    }

    #[test]
    fn test_descriptors() {
        assert_eq!(SyscallNo::ResumeReturn.arity(), 0);
        assert_eq!(SyscallNo::Upcall.arity(), 1);
        assert_eq!(SyscallNo::SwitchThread.arity(), 2);
        assert_eq!(SyscallNo::MmapCntl.arity(), 3);
        assert_eq!(SyscallNo::CapCntl.descriptor().ret, ReturnKind::Unsigned);
        assert_eq!(SyscallNo::Print.descriptor().ret, ReturnKind::Signed);
    }

    #[test]
    fn test_trap_frame() {
        let frame = TrapFrame::new(SyscallNo::KillThd, 9, [3, 4, 0]);
        assert_eq!(frame.op, 5 << 16);
        assert_eq!(frame.spd, 9);
        assert_eq!(frame.syscall(), Ok(SyscallNo::KillThd));
    }
}
