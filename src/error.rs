use core::fmt;

use crate::{FirmwareStatus, LogicalBlock, UnitIndex};

/// Everything that can go wrong between the firmware and an open file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The firmware transfer kept failing until the attempt budget ran out,
    /// or the controller could not be reset between attempts.
    MediaError {
        block: LogicalBlock,
        status: FirmwareStatus,
    },

    /// The firmware reported success but moved a different number of sectors
    /// than requested.
    ShortTransfer {
        block: LogicalBlock,
        requested: u8,
        transferred: u8,
    },

    /// A path segment has no matching directory record.
    NotFound,

    /// Tried to descend through a record that is not a directory.
    NotADirectory,

    /// Paths must start with the separator.
    RelativePathRejected,

    /// Boot sector signature missing or geometry unusable.
    InvalidVolume(InvalidVolumeReason),

    /// The allocator refused a buffer of the given size.
    OutOfMemory { bytes: usize },

    /// A transfer buffer cannot hold the sectors requested.
    BufferTooSmall { needed: usize, len: usize },

    /// The logical block cannot be expressed as a CHS address on this disk.
    BlockOutOfRange(LogicalBlock),

    /// The allocation table links to a unit outside the data area, loops, or
    /// a record starts at a reserved unit.
    CorruptChain(UnitIndex),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidVolumeReason {
    MissingSignature,
    ZeroBytesPerSector,
    MisalignedBytesPerSector,
    ZeroSectorsPerUnit,
    ZeroAllocationTables,
    ZeroAllocationTableSectors,
    ZeroSectorsPerTrack,
    ZeroHeads,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MediaError { block, status } => {
                write!(f, "media error at block {} (status {status})", block.0)
            }
            Self::ShortTransfer {
                block,
                requested,
                transferred,
            } => write!(
                f,
                "short transfer at block {}: requested {requested} sectors, got {transferred}",
                block.0
            ),
            Self::NotFound => write!(f, "no such file or directory"),
            Self::NotADirectory => write!(f, "not a directory"),
            Self::RelativePathRejected => write!(f, "path must be absolute"),
            Self::InvalidVolume(reason) => write!(f, "invalid volume: {reason}"),
            Self::OutOfMemory { bytes } => write!(f, "failed to allocate {bytes} bytes"),
            Self::BufferTooSmall { needed, len } => {
                write!(f, "transfer needs {needed} bytes, buffer holds {len}")
            }
            Self::BlockOutOfRange(block) => {
                write!(f, "block {} is outside the disk geometry", block.0)
            }
            Self::CorruptChain(unit) => {
                write!(f, "corrupt allocation chain at unit {:#05x}", unit.0)
            }
        }
    }
}

impl fmt::Display for InvalidVolumeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::MissingSignature => "boot sector signature 0x55 0xAA missing",
            Self::ZeroBytesPerSector => "bytes per sector is zero",
            Self::MisalignedBytesPerSector => "bytes per sector is not a multiple of 32",
            Self::ZeroSectorsPerUnit => "sectors per cluster is zero",
            Self::ZeroAllocationTables => "no allocation tables",
            Self::ZeroAllocationTableSectors => "allocation table has no sectors",
            Self::ZeroSectorsPerTrack => "sectors per track is zero",
            Self::ZeroHeads => "head count is zero",
        };
        f.write_str(reason)
    }
}
