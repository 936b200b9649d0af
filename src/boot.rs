use zerocopy::{AsBytes, FromBytes, FromZeroes};

use crate::io::read_struct;
use crate::name::trim_padding;
use crate::{DiskParameters, Error, InvalidVolumeReason, LogicalBlock, SectorSize, UnitIndex};

/// The BIOS parameter block is the first part of the boot sector. It sits
/// right after the 3-byte jump over it into the boot code.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct BIOSParameterBlock {
    pub jmp_boot: [u8; 3],
    pub oem_name: [u8; 8],
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub reserved_sectors: u16,
    pub fat_count: u8,
    pub root_dir_entries: u16,
    pub total_sectors: u16,
    pub media_descriptor: u8,
    pub sectors_per_fat: u16,
    pub sectors_per_track: u16,
    pub head_count: u16,
    pub hidden_sectors: u32,
    pub total_sectors_large: u32,
}

/// Optional DOS 4.0 extension following the parameter block. Only present
/// when `signature` is 0x28 or 0x29, and only 0x29 carries the label and
/// file system type.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct ExtendedBootRecord {
    pub drive_number: u8,
    pub reserved: u8,
    pub signature: u8,
    pub volume_id: u32,
    pub volume_label: [u8; 11],
    pub file_system_type: [u8; 8],
}

impl ExtendedBootRecord {
    pub const OFFSET: usize = core::mem::size_of::<BIOSParameterBlock>();

    fn present(&self) -> bool {
        matches!(self.signature, 0x28 | 0x29)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BootSector {
    pub parameters: BIOSParameterBlock,
    pub extended: Option<ExtendedBootRecord>,
}

impl BootSector {
    pub const SIZE: usize = 512;
    pub const SIGNATURE_OFFSET: usize = 510;
    pub const SIGNATURE: [u8; 2] = [0x55, 0xAA];

    /// Decodes the first sector of a volume.
    pub fn parse(sector: &[u8]) -> Result<Self, Error> {
        let signature = sector.get(Self::SIGNATURE_OFFSET..Self::SIZE);
        if signature != Some(&Self::SIGNATURE[..]) {
            return Err(Error::InvalidVolume(InvalidVolumeReason::MissingSignature));
        }

        let parameters: BIOSParameterBlock = read_struct(sector, 0)
            .ok_or(Error::InvalidVolume(InvalidVolumeReason::MissingSignature))?;
        let extended = read_struct::<ExtendedBootRecord>(sector, ExtendedBootRecord::OFFSET)
            .filter(ExtendedBootRecord::present);

        Ok(Self {
            parameters,
            extended,
        })
    }

    pub fn oem_name(&self) -> &str {
        let oem_name = &self.parameters.oem_name;
        core::str::from_utf8(trim_padding(oem_name)).unwrap_or("<invalid>")
    }

    /// Volume label from the extended boot record, if there is one.
    pub fn volume_label(&self) -> Option<&str> {
        let extended = self.extended.as_ref().filter(|e| e.signature == 0x29)?;
        core::str::from_utf8(trim_padding(&extended.volume_label)).ok()
    }

    pub fn geometry(&self) -> Result<VolumeGeometry, Error> {
        VolumeGeometry::from_parameters(&self.parameters)
    }
}

/// Layout of the volume, taken from the boot sector at mount time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeGeometry {
    pub bytes_per_sector: u16,
    pub sectors_per_unit: u8,
    pub reserved_sectors: u16,
    pub allocation_table_copies: u8,
    pub root_directory_capacity: u16,
    pub total_sectors: u32,
    pub sectors_per_allocation_table: u16,
    pub sectors_per_track: u16,
    pub heads_per_cylinder: u16,
    pub hidden_sectors: u32,
    pub media_descriptor: u8,
}

impl VolumeGeometry {
    /// Checks every field later used as a divisor or a size.
    pub fn from_parameters(bpb: &BIOSParameterBlock) -> Result<Self, Error> {
        let total_sectors = if bpb.total_sectors == 0 {
            bpb.total_sectors_large
        } else {
            u32::from(bpb.total_sectors)
        };
        let geometry = Self {
            bytes_per_sector: bpb.bytes_per_sector,
            sectors_per_unit: bpb.sectors_per_cluster,
            reserved_sectors: bpb.reserved_sectors,
            allocation_table_copies: bpb.fat_count,
            root_directory_capacity: bpb.root_dir_entries,
            total_sectors,
            sectors_per_allocation_table: bpb.sectors_per_fat,
            sectors_per_track: bpb.sectors_per_track,
            heads_per_cylinder: bpb.head_count,
            hidden_sectors: bpb.hidden_sectors,
            media_descriptor: bpb.media_descriptor,
        };
        geometry.validate()?;
        Ok(geometry)
    }

    fn validate(&self) -> Result<(), Error> {
        let reason = if self.bytes_per_sector == 0 {
            InvalidVolumeReason::ZeroBytesPerSector
        } else if self.bytes_per_sector % 32 != 0 {
            InvalidVolumeReason::MisalignedBytesPerSector
        } else if self.sectors_per_unit == 0 {
            InvalidVolumeReason::ZeroSectorsPerUnit
        } else if self.allocation_table_copies == 0 {
            InvalidVolumeReason::ZeroAllocationTables
        } else if self.sectors_per_allocation_table == 0 {
            InvalidVolumeReason::ZeroAllocationTableSectors
        } else if self.sectors_per_track == 0 {
            InvalidVolumeReason::ZeroSectorsPerTrack
        } else if self.heads_per_cylinder == 0 {
            InvalidVolumeReason::ZeroHeads
        } else {
            return Ok(());
        };
        Err(Error::InvalidVolume(reason))
    }

    pub fn sector_size(&self) -> SectorSize {
        SectorSize::new(self.bytes_per_sector)
    }

    pub fn disk_parameters(&self) -> DiskParameters {
        DiskParameters {
            sectors_per_track: self.sectors_per_track,
            heads_per_cylinder: self.heads_per_cylinder,
        }
    }

    pub fn allocation_table_start(&self) -> LogicalBlock {
        LogicalBlock(u32::from(self.reserved_sectors))
    }

    pub fn allocation_table_bytes(&self) -> usize {
        usize::from(self.bytes_per_sector) * usize::from(self.sectors_per_allocation_table)
    }

    /// The root directory follows every copy of the allocation table.
    pub fn root_directory_start(&self) -> LogicalBlock {
        let tables = u32::from(self.allocation_table_copies)
            * u32::from(self.sectors_per_allocation_table);
        self.allocation_table_start() + tables
    }

    pub fn root_directory_bytes(&self) -> usize {
        usize::from(self.root_directory_capacity) * crate::DirectoryEntry::SIZE
    }

    pub fn root_directory_sectors(&self) -> u32 {
        (self.root_directory_bytes() as u32).div_ceil(u32::from(self.bytes_per_sector))
    }

    /// First block of storage unit 2.
    ///
    /// ```text
    /// data_start = reserved + copies * sectors_per_table
    ///            + ceil(root_capacity * 32 / bytes_per_sector)
    /// ```
    pub fn data_start(&self) -> LogicalBlock {
        self.root_directory_start() + self.root_directory_sectors()
    }

    pub fn unit_bytes(&self) -> usize {
        usize::from(self.bytes_per_sector) * usize::from(self.sectors_per_unit)
    }

    /// Directory records held by one storage unit.
    pub fn entries_per_unit(&self) -> usize {
        self.unit_bytes() / crate::DirectoryEntry::SIZE
    }

    /// Storage units in the data area. Mount hands this to the allocation
    /// table, which rejects links past it.
    pub fn data_units(&self) -> u32 {
        let data_sectors = self.total_sectors.saturating_sub(self.data_start().0);
        data_sectors / u32::from(self.sectors_per_unit)
    }

    /// ```text
    /// block = data_start + (unit - 2) * sectors_per_unit
    /// ```
    pub fn unit_to_logical_block(&self, unit: UnitIndex) -> LogicalBlock {
        let offset = u32::from(unit.0 - UnitIndex::FIRST_DATA.0) * u32::from(self.sectors_per_unit);
        self.data_start() + offset
    }
}
