use alloc::vec::Vec;
use core::ops::ControlFlow;

use crate::{
    AllocationTable, BootSector, DirectoryEntry, DirectoryTable, Disk, Drive, Error, FilePath,
    Firmware, LogicalBlock, ShortName, UnitIndex, VolumeGeometry, DEFAULT_TRANSFER_ATTEMPTS,
};

/// Mount-time configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MountOptions {
    pub drive: Drive,

    /// Firmware attempts per transfer before giving up. Each failed attempt
    /// resets the controller.
    pub transfer_attempts: u8,
}

impl Default for MountOptions {
    fn default() -> Self {
        Self {
            drive: Drive::FLOPPY_A,
            transfer_attempts: DEFAULT_TRANSFER_ATTEMPTS,
        }
    }
}

/// A mounted FAT12 volume.
///
/// Geometry, allocation table and root directory are read once by
/// [`Volume::mount`] and never change afterwards. All other state lives in
/// the [`OpenFile`](crate::OpenFile) handles.
#[derive(Debug)]
pub struct Volume<F> {
    pub(crate) disk: Disk<F>,
    boot_sector: BootSector,
    pub(crate) geometry: VolumeGeometry,
    pub(crate) table: AllocationTable,
    root_directory: Vec<u8>,
    pub(crate) next_file_id: u32,
}

impl<F: Firmware> Volume<F> {
    pub fn mount(firmware: F, options: MountOptions) -> Result<Self, Error> {
        let mut disk = Disk::new(firmware, options.drive, options.transfer_attempts);

        // The first transfer reports real media trouble, so a failed reset
        // here is only worth a warning.
        if let Err(status) = disk.reset() {
            log::warn!("reset of {:?} before mount failed with status {status}", options.drive);
        }

        let sector = disk.read_blocks(LogicalBlock::BOOT_SECTOR, 1)?;
        let boot_sector = BootSector::parse(&sector)?;
        let geometry = boot_sector.geometry()?;
        log::debug!("mounting {:?}: {geometry:#?}", options.drive);

        disk.set_geometry(geometry.disk_parameters(), geometry.sector_size());

        let table = disk.read_blocks(
            geometry.allocation_table_start(),
            u32::from(geometry.sectors_per_allocation_table),
        )?;
        let root_directory = disk.read_blocks(
            geometry.root_directory_start(),
            geometry.root_directory_sectors(),
        )?;
        log::debug!(
            "allocation table: {} bytes at block {}, root directory: {} entries at block {}, data at block {}",
            table.len(),
            geometry.allocation_table_start().0,
            geometry.root_directory_capacity,
            geometry.root_directory_start().0,
            geometry.data_start().0
        );

        Ok(Self {
            disk,
            boot_sector,
            geometry,
            table: AllocationTable::with_data_units(table, geometry.data_units()),
            root_directory,
            next_file_id: 0,
        })
    }

    /// Releases the volume and hands back the firmware it was mounted on.
    pub fn unmount(self) -> F {
        self.disk.into_firmware()
    }

    pub fn boot_sector(&self) -> &BootSector {
        &self.boot_sector
    }

    pub fn geometry(&self) -> &VolumeGeometry {
        &self.geometry
    }

    pub fn allocation_table(&self) -> &AllocationTable {
        &self.table
    }

    pub fn root_directory(&self) -> DirectoryTable<'_> {
        DirectoryTable::new(
            &self.root_directory,
            usize::from(self.geometry.root_directory_capacity),
        )
    }

    pub fn disk(&self) -> &Disk<F> {
        &self.disk
    }

    /// Finds the directory record named by an absolute path.
    ///
    /// Each segment is looked up in the directory found for the previous one,
    /// starting at the root table. Descending through a file is
    /// [`Error::NotADirectory`]. The root itself has no record, so `"/"` is
    /// [`Error::NotFound`].
    pub fn resolve(&mut self, path: &str) -> Result<DirectoryEntry, Error> {
        let path = FilePath::parse(path)?;
        log::trace!("resolving {path}");

        let mut current: Option<DirectoryEntry> = None;
        for component in &path.components {
            let name = component.short_name();
            let entry = match current {
                None => self.root_directory().find(&name),
                Some(directory) if directory.is_dir() => {
                    self.find_in_directory(&directory, &name)?
                }
                Some(file) => {
                    log::debug!("resolve {path}: {} is not a directory", file.name);
                    return Err(Error::NotADirectory);
                }
            };
            let Some(entry) = entry else {
                log::debug!("resolve {path}: {component} not found");
                return Err(Error::NotFound);
            };
            current = Some(entry);
        }
        current.ok_or(Error::NotFound)
    }

    /// Visible records of a directory in on-disk order. `"/"` lists the root
    /// table.
    pub fn list_directory(&mut self, path: &str) -> Result<Vec<DirectoryEntry>, Error> {
        let start = if FilePath::parse(path)?.is_root() {
            None
        } else {
            let directory = self.resolve(path)?;
            if !directory.is_dir() {
                return Err(Error::NotADirectory);
            }
            directory_start(&directory)?
        };

        let mut entries = Vec::new();
        self.scan_directory(start, |table| {
            entries.extend(table.iter());
            ControlFlow::<()>::Continue(())
        })?;
        Ok(entries)
    }

    fn find_in_directory(
        &mut self,
        directory: &DirectoryEntry,
        name: &ShortName,
    ) -> Result<Option<DirectoryEntry>, Error> {
        let start = directory_start(directory)?;
        self.scan_directory(start, |table| match table.find(name) {
            Some(entry) => ControlFlow::Break(entry),
            None => ControlFlow::Continue(()),
        })
    }

    /// Hands each storage unit of a directory to `visit`, in chain order,
    /// until it breaks or the chain ends. `None` is the root directory table.
    fn scan_directory<B>(
        &mut self,
        start: Option<UnitIndex>,
        mut visit: impl FnMut(DirectoryTable<'_>) -> ControlFlow<B>,
    ) -> Result<Option<B>, Error> {
        let Some(first_unit) = start else {
            return Ok(match visit(self.root_directory()) {
                ControlFlow::Break(value) => Some(value),
                ControlFlow::Continue(()) => None,
            });
        };

        let sectors = u32::from(self.geometry.sectors_per_unit);
        let capacity = self.geometry.entries_per_unit();
        for unit in self.table.chain(first_unit) {
            let unit = unit?;
            let block = self.geometry.unit_to_logical_block(unit);
            log::trace!("scanning directory unit {:#05x} at block {}", unit.0, block.0);
            let bytes = self.disk.read_blocks(block, sectors)?;
            if let ControlFlow::Break(value) = visit(DirectoryTable::new(&bytes, capacity)) {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }
}

/// First unit of a directory's data, or `None` for the root table.
///
/// Only a `..` record may point at unit 0, meaning the root. Any other
/// directory owns at least one unit.
fn directory_start(directory: &DirectoryEntry) -> Result<Option<UnitIndex>, Error> {
    match directory.first_unit {
        UnitIndex(0) if directory.name == ShortName::DOT_DOT => Ok(None),
        UnitIndex(0) => Err(Error::CorruptChain(UnitIndex(0))),
        unit => Ok(Some(unit)),
    }
}
