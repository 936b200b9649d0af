use alloc::vec::Vec;
use core::fmt;

use crate::io::zeroed_buffer;
use crate::{Chs, DiskParameters, Drive, Error, LogicalBlock, SectorSize};

/// The firmware's sector transfer and controller reset services. This is the
/// only way the storage stack touches hardware.
pub trait Firmware {
    /// Transfers `count` sectors starting at `chs`. For reads the sectors
    /// land in `buffer`; for writes they are taken from it. Returns the
    /// number of sectors the firmware claims to have moved.
    fn raw_transfer(
        &mut self,
        direction: Direction,
        count: u8,
        chs: Chs,
        drive: Drive,
        buffer: &mut [u8],
    ) -> Result<u8, FirmwareStatus>;

    fn reset_controller(&mut self, drive: Drive) -> Result<(), FirmwareStatus>;
}

/// Firmware disk service function numbers.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Direction {
    Read = 0x02,
    Write = 0x03,
}

/// Status byte returned by the firmware (`AH` after the disk service call).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FirmwareStatus(pub u8);

impl FirmwareStatus {
    pub const BAD_COMMAND: Self = Self(0x01);
    pub const SECTOR_NOT_FOUND: Self = Self(0x04);
    pub const RESET_FAILED: Self = Self(0x05);
    pub const CRC_ERROR: Self = Self(0x10);
    pub const TIMEOUT: Self = Self(0x80);
}

impl fmt::Display for FirmwareStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

/// Retried sector transfers addressed by logical block.
///
/// Transfers take `&mut self`, so a second transfer can never be issued while
/// one is outstanding on the same drive.
#[derive(Debug)]
pub struct Disk<F> {
    firmware: F,
    drive: Drive,
    parameters: DiskParameters,
    sector_size: SectorSize,
    attempts: u8,
}

/// Firmware attempts per transfer unless configured otherwise.
pub const DEFAULT_TRANSFER_ATTEMPTS: u8 = 3;

impl<F: Firmware> Disk<F> {
    /// A disk that only knows how to reach the boot sector. Call
    /// [`Disk::set_geometry`] once the real geometry is known.
    pub fn new(firmware: F, drive: Drive, attempts: u8) -> Self {
        Self {
            firmware,
            drive,
            parameters: DiskParameters::BOOTSTRAP,
            sector_size: SectorSize::new(512),
            attempts: attempts.max(1),
        }
    }

    pub fn set_geometry(&mut self, parameters: DiskParameters, sector_size: SectorSize) {
        self.parameters = parameters;
        self.sector_size = sector_size;
    }

    pub fn drive(&self) -> Drive {
        self.drive
    }

    pub fn parameters(&self) -> DiskParameters {
        self.parameters
    }

    pub fn sector_size(&self) -> SectorSize {
        self.sector_size
    }

    pub fn firmware(&self) -> &F {
        &self.firmware
    }

    pub fn firmware_mut(&mut self) -> &mut F {
        &mut self.firmware
    }

    pub fn into_firmware(self) -> F {
        self.firmware
    }

    pub fn reset(&mut self) -> Result<(), FirmwareStatus> {
        self.firmware.reset_controller(self.drive)
    }

    /// Transfers `count` sectors starting at `block`. A failed attempt resets
    /// the controller and tries again, up to the attempt budget. A controller
    /// that cannot be reset aborts immediately.
    pub fn transfer(
        &mut self,
        direction: Direction,
        count: u8,
        block: LogicalBlock,
        buffer: &mut [u8],
    ) -> Result<(), Error> {
        let needed = usize::from(count) * self.sector_size.bytes();
        if buffer.len() < needed {
            return Err(Error::BufferTooSmall {
                needed,
                len: buffer.len(),
            });
        }

        let chs = self.parameters.to_chs(block)?;
        log::trace!("{direction:?} {count} sectors: block {} -> chs {chs}", block.0);

        let mut status = FirmwareStatus::BAD_COMMAND;
        for attempt in 1..=self.attempts {
            match self
                .firmware
                .raw_transfer(direction, count, chs, self.drive, buffer)
            {
                Ok(transferred) if transferred == count => return Ok(()),
                Ok(transferred) => {
                    log::error!(
                        "firmware moved {transferred} of {count} sectors at block {}",
                        block.0
                    );
                    return Err(Error::ShortTransfer {
                        block,
                        requested: count,
                        transferred,
                    });
                }
                Err(failure) => {
                    log::warn!(
                        "transfer at block {} failed with status {failure} (attempt {attempt}/{})",
                        block.0,
                        self.attempts
                    );
                    status = failure;
                }
            }

            if let Err(reset_status) = self.reset() {
                log::error!("reset of {:?} failed with status {reset_status}", self.drive);
                return Err(Error::MediaError {
                    block,
                    status: reset_status,
                });
            }
        }

        log::error!("giving up on block {} after {} attempts", block.0, self.attempts);
        Err(Error::MediaError { block, status })
    }

    /// Reads `count` sectors into a freshly allocated buffer, splitting the
    /// request into as many firmware transfers as the 8-bit count needs.
    pub fn read_blocks(&mut self, start: LogicalBlock, count: u32) -> Result<Vec<u8>, Error> {
        let sector_size = self.sector_size.bytes();
        let mut buffer = zeroed_buffer(count as usize * sector_size)?;

        let mut done = 0;
        for chunk in buffer.chunks_mut(usize::from(u8::MAX) * sector_size) {
            let sectors = (chunk.len() / sector_size) as u8;
            self.transfer(Direction::Read, sectors, start + done, chunk)?;
            done += u32::from(sectors);
        }
        Ok(buffer)
    }
}
