//! Bit-packed operation encodings
//!
//! Operations with more than three scalar fields share a transport word
//! between several narrow fields. Each packed word is 32 bits wide, so the
//! layout is identical on 32- and 64-bit targets:
//!
//! | Operation     | Word 0                                  | Word 1    | Word 2                 |
//! |---------------|-----------------------------------------|-----------|------------------------|
//! | mmap_cntl     | op[31:24] flags[23:16] dest_spd[15:0]   | dest_addr | mem_id                 |
//! | brand_upcall  | thd_id[31:16] flags[15:0]               | arg1      | arg2                   |
//! | buff_mgmt     | addr                                    | thd_id    | len[31:16] op[15:0]    |
//! | thd_cntl      | op[31:16] thd_id[15:0]                  | arg1      | arg2                   |
//! | switch_thread | thd_id                                  | flags     | 0                      |
//!
//! `decode` rejects words with bits set outside a field's width instead of
//! truncating them, so `decode(encode(x)) == x` and nothing else decodes.

use crate::abi::{DecodeError, SpdId, SyscallNo, ThreadId, Word};
use crate::shared::SwitchFlags;

/// An operation whose fields lower to the three argument words
pub trait PackedCall: Sized {
    /// Operation the words are destined for
    const SYSCALL: SyscallNo;

    /// Lower the fields to wire words
    fn encode(&self) -> [Word; 3];

    /// Lift wire words back to fields
    fn decode(args: [Word; 3]) -> Result<Self, DecodeError>;
}

#[inline]
fn narrow_u16(field: &'static str, value: Word) -> Result<u16, DecodeError> {
    u16::try_from(value).map_err(|_| DecodeError::FieldOverflow { field, value })
}

#[inline]
fn packed_word(field: &'static str, value: Word) -> Result<u32, DecodeError> {
    u32::try_from(value).map_err(|_| DecodeError::FieldOverflow { field, value })
}

/// Memory-map control: 8-bit op, 8-bit flags, 16-bit destination component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MmapCntl {
    pub op: u8,
    pub flags: u8,
    pub dest_spd: SpdId,
    pub dest_addr: Word,
    pub mem_id: Word,
}

impl PackedCall for MmapCntl {
    const SYSCALL: SyscallNo = SyscallNo::MmapCntl;

    fn encode(&self) -> [Word; 3] {
        let word = (self.op as u32) << 24 | (self.flags as u32) << 16 | self.dest_spd as u32;
        [word as Word, self.dest_addr, self.mem_id]
    }

    fn decode(args: [Word; 3]) -> Result<Self, DecodeError> {
        let word = packed_word("op_flags_dspd", args[0])?;
        Ok(Self {
            op: (word >> 24) as u8,
            flags: (word >> 16) as u8,
            dest_spd: word as u16,
            dest_addr: args[1],
            mem_id: args[2],
        })
    }
}

/// Branded upcall: 16-bit thread id, 16-bit flags, two free words
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BrandUpcall {
    pub thd_id: ThreadId,
    pub flags: u16,
    pub arg1: Word,
    pub arg2: Word,
}

impl PackedCall for BrandUpcall {
    const SYSCALL: SyscallNo = SyscallNo::BrandUpcall;

    fn encode(&self) -> [Word; 3] {
        let word = (self.thd_id as u32) << 16 | self.flags as u32;
        [word as Word, self.arg1, self.arg2]
    }

    fn decode(args: [Word; 3]) -> Result<Self, DecodeError> {
        let word = packed_word("thd_id_flags", args[0])?;
        Ok(Self {
            thd_id: (word >> 16) as u16,
            flags: word as u16,
            arg1: args[1],
            arg2: args[2],
        })
    }
}

/// Buffer management: address, thread, and 16-bit length with 16-bit op
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BuffMgmt {
    pub op: u16,
    pub addr: Word,
    pub len: u16,
    pub thd_id: ThreadId,
}

impl PackedCall for BuffMgmt {
    const SYSCALL: SyscallNo = SyscallNo::BuffMgmt;

    fn encode(&self) -> [Word; 3] {
        let word = (self.len as u32) << 16 | self.op as u32;
        [self.addr, self.thd_id as Word, word as Word]
    }

    fn decode(args: [Word; 3]) -> Result<Self, DecodeError> {
        let word = packed_word("len_option", args[2])?;
        Ok(Self {
            op: word as u16,
            addr: args[0],
            len: (word >> 16) as u16,
            thd_id: narrow_u16("thd_id", args[1])?,
        })
    }
}

/// Thread control: 16-bit op, 16-bit thread id, two free words
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ThdCntl {
    pub op: u16,
    pub thd_id: ThreadId,
    pub arg1: Word,
    pub arg2: Word,
}

impl PackedCall for ThdCntl {
    const SYSCALL: SyscallNo = SyscallNo::ThdCntl;

    fn encode(&self) -> [Word; 3] {
        let word = (self.op as u32) << 16 | self.thd_id as u32;
        [word as Word, self.arg1, self.arg2]
    }

    fn decode(args: [Word; 3]) -> Result<Self, DecodeError> {
        let word = packed_word("op_thdid", args[0])?;
        Ok(Self {
            op: (word >> 16) as u16,
            thd_id: word as u16,
            arg1: args[1],
            arg2: args[2],
        })
    }
}

/// Register half of a thread switch.
///
/// The kernel resolves the target from the scheduler notification area;
/// these words are advisory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SwitchThread {
    pub thd_id: ThreadId,
    pub flags: SwitchFlags,
}

impl PackedCall for SwitchThread {
    const SYSCALL: SyscallNo = SyscallNo::SwitchThread;

    fn encode(&self) -> [Word; 3] {
        [self.thd_id as Word, self.flags.bits() as Word, 0]
    }

    fn decode(args: [Word; 3]) -> Result<Self, DecodeError> {
        Ok(Self {
            thd_id: narrow_u16("thd_id", args[0])?,
            flags: SwitchFlags::from_bits_retain(narrow_u16("flags", args[1])?),
        })
    }
}
