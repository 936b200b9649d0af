//! Disk image builders for tests.

use alloc::vec::Vec;

use zerocopy::AsBytes;

use crate::{
    AllocationTable, Attributes, BIOSParameterBlock, BootSector, DirectoryEntry, DiskParameters,
    FileDate, FileTime, MountOptions, RamDisk, RawDirectoryEntry, SectorSize, ShortName,
    UnitIndex, Volume, VolumeGeometry,
};

/// A freshly formatted 1.44MB floppy.
pub(crate) fn floppy_parameters() -> BIOSParameterBlock {
    BIOSParameterBlock {
        jmp_boot: [0xEB, 0x3C, 0x90],
        oem_name: *b"NOSFMT  ",
        bytes_per_sector: 512,
        sectors_per_cluster: 1,
        reserved_sectors: 1,
        fat_count: 2,
        root_dir_entries: 224,
        total_sectors: 2880,
        media_descriptor: 0xF0,
        sectors_per_fat: 9,
        sectors_per_track: 18,
        head_count: 2,
        hidden_sectors: 0,
        total_sectors_large: 0,
    }
}

/// Deterministic file contents that differ from one storage unit to the next.
pub(crate) fn pattern(len: usize, seed: usize) -> Vec<u8> {
    (0..len).map(|i| ((i + seed * 17) % 251) as u8).collect()
}

/// A record with zeroed timestamps. `name` is the 11-byte on-disk form or
/// `NAME.EXT`.
pub(crate) fn entry(name: &str, attributes: Attributes, first_unit: u16, size: u32) -> DirectoryEntry {
    DirectoryEntry {
        name: ShortName::from_segment(name),
        attributes,
        creation_time: FileTime::new(),
        creation_date: FileDate::new(),
        last_access_date: FileDate::new(),
        last_write_time: FileTime::new(),
        last_write_date: FileDate::new(),
        first_unit: UnitIndex(first_unit),
        size,
    }
}

/// `capacity` record slots holding `entries`, the rest zeroed.
pub(crate) fn directory_bytes(entries: &[DirectoryEntry], capacity: usize) -> Vec<u8> {
    let mut bytes = vec![0; capacity * DirectoryEntry::SIZE];
    for (slot, entry) in bytes.chunks_mut(DirectoryEntry::SIZE).zip(entries) {
        slot.copy_from_slice(entry.encode().as_bytes());
    }
    bytes
}

pub(crate) struct TableBuilder {
    bytes: Vec<u8>,
}

impl TableBuilder {
    pub(crate) fn new(len: usize) -> Self {
        let mut builder = Self {
            bytes: vec![0; len],
        };
        if len >= 3 {
            builder.set(UnitIndex(0), 0xFF0);
            builder.set(UnitIndex(1), 0xFFF);
        }
        builder
    }

    pub(crate) fn set(&mut self, index: UnitIndex, value: u16) {
        let offset = usize::from(index.0) * 3 / 2;
        if index.is_odd() {
            self.bytes[offset] = (self.bytes[offset] & 0x0F) | ((value & 0x0F) << 4) as u8;
            self.bytes[offset + 1] = (value >> 4) as u8;
        } else {
            self.bytes[offset] = value as u8;
            self.bytes[offset + 1] = (self.bytes[offset + 1] & 0xF0) | ((value >> 8) & 0x0F) as u8;
        }
    }

    /// Links `units` in order and ends the chain after the last one.
    pub(crate) fn link(&mut self, units: &[u16]) {
        for pair in units.windows(2) {
            self.set(UnitIndex(pair[0]), pair[1]);
        }
        if let Some(&last) = units.last() {
            self.set(UnitIndex(last), 0xFFF);
        }
    }

    pub(crate) fn build(self) -> AllocationTable {
        AllocationTable::new(self.bytes)
    }
}

/// Builds a floppy image, laid out the way a formatter would.
pub(crate) struct ImageBuilder {
    parameters: BIOSParameterBlock,
    geometry: VolumeGeometry,
    image: Vec<u8>,
    table: TableBuilder,
    root: Vec<RawDirectoryEntry>,
}

impl ImageBuilder {
    pub(crate) fn new() -> Self {
        Self::with_parameters(floppy_parameters())
    }

    pub(crate) fn with_sectors_per_unit(sectors: u8) -> Self {
        let mut parameters = floppy_parameters();
        parameters.sectors_per_cluster = sectors;
        Self::with_parameters(parameters)
    }

    fn with_parameters(parameters: BIOSParameterBlock) -> Self {
        let geometry = VolumeGeometry::from_parameters(&parameters).unwrap();
        Self {
            parameters,
            geometry,
            image: vec![0; geometry.total_sectors as usize * usize::from(geometry.bytes_per_sector)],
            table: TableBuilder::new(geometry.allocation_table_bytes()),
            root: Vec::new(),
        }
    }

    /// A disk of zeros: no boot sector, nothing to mount.
    pub(crate) fn blank() -> RamDisk {
        let geometry = VolumeGeometry::from_parameters(&floppy_parameters()).unwrap();
        let image = vec![0; geometry.total_sectors as usize * 512];
        RamDisk::new(image, geometry.disk_parameters(), geometry.sector_size())
    }

    /// ```text
    /// /
    /// ├── <volume label FLOPPY>
    /// ├── DIR1/               units 2, 10
    /// │   ├── .  ..
    /// │   ├── FILE1.TXT       units 5, 9, 6   1300 bytes
    /// │   ├── FILL00.DAT .. FILL12.DAT (empty)
    /// │   └── LAST.TXT        unit 11         5 bytes, second unit of DIR1
    /// ├── FILE1.TXT           units 3, 4      700 bytes
    /// ├── EMPTY.TXT           no units
    /// └── <deleted FILE2.TXT>
    /// ```
    pub(crate) fn sample() -> Self {
        let mut builder = Self::new();

        builder.root_entry(entry("FLOPPY     ", Attributes::VOLUME_LABEL, 0, 0));
        builder.root_entry(entry("DIR1", Attributes::DIRECTORY, 2, 0));

        let mut file1 = entry("FILE1.TXT", Attributes::ARCHIVE, 3, 700);
        file1.last_write_time = FileTime::new()
            .with_hour(13)
            .with_minute(45)
            .with_double_seconds(29);
        file1.last_write_date = FileDate::new()
            .with_years_since_1980(41)
            .with_month(4)
            .with_day(20);
        builder.root_entry(file1);
        builder.write_chain(&[3, 4], &pattern(700, 0));

        builder.root_entry(entry("EMPTY.TXT", Attributes::ARCHIVE, 0, 0));

        let mut deleted = entry("FILE2.TXT", Attributes::ARCHIVE, 12, 10).encode();
        deleted.name[0] = DirectoryEntry::DELETED_MARKER;
        builder.root.push(deleted);

        let mut first_unit = vec![
            entry(".", Attributes::DIRECTORY, 2, 0),
            entry("..", Attributes::DIRECTORY, 0, 0),
            entry("FILE1.TXT", Attributes::ARCHIVE, 5, 1300),
        ];
        for i in 0..13 {
            let name = format!("FILL{i:02}.DAT");
            first_unit.push(entry(&name, Attributes::ARCHIVE, 0, 0));
        }
        let second_unit = [entry("LAST.TXT", Attributes::ARCHIVE, 11, 5)];
        let mut dir1 = directory_bytes(&first_unit, 16);
        dir1.extend(directory_bytes(&second_unit, 16));
        builder.write_chain(&[2, 10], &dir1);

        builder.write_chain(&[5, 9, 6], &pattern(1300, 1));
        builder.write_chain(&[11], &pattern(5, 2));
        builder
    }

    pub(crate) fn root_entry(&mut self, entry: DirectoryEntry) {
        self.root.push(entry.encode());
    }

    pub(crate) fn set_root_size(&mut self, name: &str, size: u32) {
        let name = ShortName::from_segment(name);
        let raw = self
            .root
            .iter_mut()
            .find(|raw| ShortName::new(raw.name, raw.extension) == name)
            .unwrap();
        raw.size = size;
    }

    /// Links `units` and spreads `contents` over them, one storage unit each.
    pub(crate) fn write_chain(&mut self, units: &[u16], contents: &[u8]) {
        self.table.link(units);
        let unit_bytes = self.geometry.unit_bytes();
        for (&unit, chunk) in units.iter().zip(contents.chunks(unit_bytes)) {
            let block = self.geometry.unit_to_logical_block(UnitIndex(unit));
            let offset = block.0 as usize * usize::from(self.geometry.bytes_per_sector);
            self.image[offset..offset + chunk.len()].copy_from_slice(chunk);
        }
    }

    pub(crate) fn file_in_root(&mut self, name: &str, units: &[u16], contents: &[u8]) {
        self.write_chain(units, contents);
        self.root_entry(entry(name, Attributes::ARCHIVE, units[0], contents.len() as u32));
    }

    pub(crate) fn build(mut self) -> RamDisk {
        let sector_bytes = usize::from(self.geometry.bytes_per_sector);

        let parameters = self.parameters.as_bytes();
        self.image[..parameters.len()].copy_from_slice(parameters);
        self.image[BootSector::SIGNATURE_OFFSET..BootSector::SIZE]
            .copy_from_slice(&BootSector::SIGNATURE);

        let table = self.table.build();
        let table_start = self.geometry.allocation_table_start().0 as usize * sector_bytes;
        for copy in 0..usize::from(self.geometry.allocation_table_copies) {
            let offset = table_start + copy * table.bytes().len();
            self.image[offset..offset + table.bytes().len()].copy_from_slice(table.bytes());
        }

        let root_start = self.geometry.root_directory_start().0 as usize * sector_bytes;
        for (i, raw) in self.root.iter().enumerate() {
            let offset = root_start + i * DirectoryEntry::SIZE;
            self.image[offset..offset + DirectoryEntry::SIZE].copy_from_slice(raw.as_bytes());
        }

        RamDisk::new(
            self.image,
            DiskParameters {
                sectors_per_track: self.geometry.sectors_per_track,
                heads_per_cylinder: self.geometry.heads_per_cylinder,
            },
            SectorSize::new(self.geometry.bytes_per_sector),
        )
    }
}

pub(crate) fn sample_volume() -> Volume<RamDisk> {
    Volume::mount(ImageBuilder::sample().build(), MountOptions::default()).unwrap()
}
