use core::fmt;
use core::ops::Add;

use crate::Error;

/// Zero-based sequential sector address, independent of the physical
/// geometry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LogicalBlock(pub u32);

impl LogicalBlock {
    pub const BOOT_SECTOR: Self = Self(0);

    pub const fn new(value: u32) -> Self {
        Self(value)
    }
}

impl From<u32> for LogicalBlock {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<LogicalBlock> for u32 {
    fn from(value: LogicalBlock) -> Self {
        value.0
    }
}

impl Add<u32> for LogicalBlock {
    type Output = Self;

    fn add(self, rhs: u32) -> Self::Output {
        Self(self.0 + rhs)
    }
}

/// Size of a sector in bytes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SectorSize(u16);

impl SectorSize {
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    pub fn bytes(self) -> usize {
        usize::from(self.0)
    }
}

impl From<u16> for SectorSize {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl From<SectorSize> for u16 {
    fn from(value: SectorSize) -> Self {
        value.0
    }
}

/// Firmware drive number, as passed in `DL` to the disk services.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Drive(pub u8);

impl Drive {
    pub const FLOPPY_A: Self = Self(0x00);
    pub const FLOPPY_B: Self = Self(0x01);
    pub const HARD_DISK_0: Self = Self(0x80);
    pub const HARD_DISK_1: Self = Self(0x81);
}

impl fmt::Debug for Drive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::FLOPPY_A => write!(f, "Drive(floppy a)"),
            Self::FLOPPY_B => write!(f, "Drive(floppy b)"),
            Self::HARD_DISK_0 => write!(f, "Drive(hard disk 0)"),
            Self::HARD_DISK_1 => write!(f, "Drive(hard disk 1)"),
            Self(other) => write!(f, "Drive({other:#04x})"),
        }
    }
}

/// The part of the geometry needed to turn a logical block into a physical
/// address.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DiskParameters {
    pub sectors_per_track: u16,
    pub heads_per_cylinder: u16,
}

impl DiskParameters {
    /// Usable before the boot sector is read. Block 0 maps to 0/0/1 under any
    /// geometry, so this is only good for reading the boot sector.
    pub const BOOTSTRAP: Self = Self {
        sectors_per_track: 1,
        heads_per_cylinder: 1,
    };

    /// Converts a logical block to a physical address. Sectors are 1-based.
    ///
    /// ```text
    /// cylinder = block / (heads * sectors_per_track)
    /// head     = (block / sectors_per_track) % heads
    /// sector   = (block % sectors_per_track) + 1
    /// ```
    pub fn to_chs(self, block: LogicalBlock) -> Result<Chs, Error> {
        let sectors_per_track = u32::from(self.sectors_per_track);
        let heads = u32::from(self.heads_per_cylinder);
        if sectors_per_track == 0 || heads == 0 {
            return Err(Error::BlockOutOfRange(block));
        }

        let cylinder = block.0 / (heads * sectors_per_track);
        let head = (block.0 / sectors_per_track) % heads;
        let sector = (block.0 % sectors_per_track) + 1;

        let out_of_range = || Error::BlockOutOfRange(block);
        let cylinder = u16::try_from(cylinder).map_err(|_| out_of_range())?;
        if cylinder > Chs::MAX_CYLINDER {
            return Err(out_of_range());
        }
        Ok(Chs {
            cylinder,
            head: u8::try_from(head).map_err(|_| out_of_range())?,
            sector: u8::try_from(sector).map_err(|_| out_of_range())?,
        })
    }

    pub fn to_logical(self, chs: Chs) -> LogicalBlock {
        let sectors_per_track = u32::from(self.sectors_per_track);
        let heads = u32::from(self.heads_per_cylinder);
        let track = u32::from(chs.cylinder) * heads + u32::from(chs.head);
        LogicalBlock(track * sectors_per_track + u32::from(chs.sector) - 1)
    }
}

/// Physical cylinder/head/sector address as understood by the firmware.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Chs {
    pub cylinder: u16,
    pub head: u8,
    pub sector: u8,
}

impl Chs {
    /// The cylinder number is 10 bits wide in the firmware call.
    pub const MAX_CYLINDER: u16 = 0x3FF;
}

impl fmt::Display for Chs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.cylinder, self.head, self.sector)
    }
}
