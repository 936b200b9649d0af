use alloc::vec::Vec;

use crate::{Chs, DiskParameters, Direction, Drive, Firmware, FirmwareStatus, SectorSize};

/// Firmware disk services backed by an in-memory disk image. Used by the
/// `read-fat12` tool and by tests, which can also inject faults.
#[derive(Debug)]
pub struct RamDisk {
    image: Vec<u8>,
    parameters: DiskParameters,
    sector_size: SectorSize,

    successes_before_failure: u32,
    failures_left: u32,
    failure_status: FirmwareStatus,
    short_next: Option<u8>,
    fail_resets: bool,

    transfers: usize,
    resets: usize,
    last_chs: Option<Chs>,
}

impl RamDisk {
    pub fn new(image: Vec<u8>, parameters: DiskParameters, sector_size: SectorSize) -> Self {
        Self {
            image,
            parameters,
            sector_size,
            successes_before_failure: 0,
            failures_left: 0,
            failure_status: FirmwareStatus::TIMEOUT,
            short_next: None,
            fail_resets: false,
            transfers: 0,
            resets: 0,
            last_chs: None,
        }
    }

    pub fn image(&self) -> &[u8] {
        &self.image
    }

    /// The next `count` transfers fail with `status`.
    pub fn fail_next_transfers(&mut self, count: u32, status: FirmwareStatus) {
        self.fail_transfers_after(0, count, status);
    }

    /// Lets `successes` transfers through, then fails the `count` after them.
    pub fn fail_transfers_after(&mut self, successes: u32, count: u32, status: FirmwareStatus) {
        self.successes_before_failure = successes;
        self.failures_left = count;
        self.failure_status = status;
    }

    /// The next successful transfer moves only `sectors` sectors.
    pub fn short_next_transfer(&mut self, sectors: u8) {
        self.short_next = Some(sectors);
    }

    pub fn fail_resets(&mut self, fail: bool) {
        self.fail_resets = fail;
    }

    /// Number of transfer calls, failed ones included.
    pub fn transfer_count(&self) -> usize {
        self.transfers
    }

    pub fn reset_count(&self) -> usize {
        self.resets
    }

    pub fn last_chs(&self) -> Option<Chs> {
        self.last_chs
    }
}

impl Firmware for RamDisk {
    fn raw_transfer(
        &mut self,
        direction: Direction,
        count: u8,
        chs: Chs,
        _drive: Drive,
        buffer: &mut [u8],
    ) -> Result<u8, FirmwareStatus> {
        self.transfers += 1;
        self.last_chs = Some(chs);

        if self.successes_before_failure > 0 {
            self.successes_before_failure -= 1;
        } else if self.failures_left > 0 {
            self.failures_left -= 1;
            return Err(self.failure_status);
        }
        if chs.sector == 0 || u16::from(chs.sector) > self.parameters.sectors_per_track {
            return Err(FirmwareStatus::SECTOR_NOT_FOUND);
        }

        let moved = self.short_next.take().unwrap_or(count).min(count);
        let sector_size = self.sector_size.bytes();
        let start = self.parameters.to_logical(chs).0 as usize * sector_size;
        let len = usize::from(moved) * sector_size;
        let Some(disk_bytes) = self.image.get_mut(start..start + len) else {
            return Err(FirmwareStatus::SECTOR_NOT_FOUND);
        };

        match direction {
            Direction::Read => buffer[..len].copy_from_slice(disk_bytes),
            Direction::Write => disk_bytes.copy_from_slice(&buffer[..len]),
        }
        Ok(moved)
    }

    fn reset_controller(&mut self, _drive: Drive) -> Result<(), FirmwareStatus> {
        self.resets += 1;
        if self.fail_resets {
            Err(FirmwareStatus::RESET_FAILED)
        } else {
            Ok(())
        }
    }
}
