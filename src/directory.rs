use core::fmt;

use bitfield_struct::bitfield;
use bitflags::bitflags;
use zerocopy::{AsBytes, FromBytes, FromZeroes};

use crate::io::read_struct;
use crate::{ShortName, UnitIndex};

/// On-disk 32-byte directory record. All multi-byte fields little-endian.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct RawDirectoryEntry {
    pub name: [u8; 8],
    pub extension: [u8; 3],
    pub attributes: u8,
    pub reserved: [u8; 2],
    pub creation_time: u16,
    pub creation_date: u16,
    pub last_access_date: u16,
    /// High half of the first cluster on FAT32. Unused on FAT12.
    pub ignored: [u8; 2],
    pub last_write_time: u16,
    pub last_write_date: u16,
    pub first_unit: u16,
    pub size: u32,
}

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct Attributes: u8 {
        const READ_ONLY = 0x01;
        const HIDDEN = 0x02;
        const SYSTEM = 0x04;

        /// Volume label, or one slot of a long file name. Neither is a file.
        const VOLUME_LABEL = 0x08;

        const DIRECTORY = 0x10;
        const ARCHIVE = 0x20;
    }
}

/// Packed time of day with 2-second resolution.
#[bitfield(u16)]
#[derive(PartialEq, Eq)]
pub struct FileTime {
    #[bits(5)]
    pub double_seconds: u8,
    #[bits(6)]
    pub minute: u8,
    #[bits(5)]
    pub hour: u8,
}

impl FileTime {
    pub fn second(&self) -> u8 {
        self.double_seconds() * 2
    }
}

impl fmt::Display for FileTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hour(), self.minute(), self.second())
    }
}

/// Packed calendar date, years counted from 1980.
#[bitfield(u16)]
#[derive(PartialEq, Eq)]
pub struct FileDate {
    #[bits(5)]
    pub day: u8,
    #[bits(4)]
    pub month: u8,
    #[bits(7)]
    pub years_since_1980: u8,
}

impl FileDate {
    pub fn year(&self) -> u16 {
        1980 + u16::from(self.years_since_1980())
    }
}

impl fmt::Display for FileDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year(), self.month(), self.day())
    }
}

/// A decoded directory record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: ShortName,
    pub attributes: Attributes,
    pub creation_time: FileTime,
    pub creation_date: FileDate,
    pub last_access_date: FileDate,
    pub last_write_time: FileTime,
    pub last_write_date: FileDate,
    pub first_unit: UnitIndex,
    pub size: u32,
}

impl DirectoryEntry {
    pub const SIZE: usize = core::mem::size_of::<RawDirectoryEntry>();

    /// First name byte of the slot that ends the used part of a directory.
    pub const END_MARKER: u8 = 0x00;

    /// First name byte of a deleted record.
    pub const DELETED_MARKER: u8 = 0xE5;

    /// Stands in for a real leading 0xE5 byte, which would read as deleted.
    const ESCAPED_E5: u8 = 0x05;

    pub fn decode(raw: &RawDirectoryEntry) -> Self {
        let mut name = ShortName::new(raw.name, raw.extension);
        if name.0[0] == Self::ESCAPED_E5 {
            name.0[0] = Self::DELETED_MARKER;
        }
        Self {
            name,
            attributes: Attributes::from_bits_retain(raw.attributes),
            creation_time: FileTime::from(raw.creation_time),
            creation_date: FileDate::from(raw.creation_date),
            last_access_date: FileDate::from(raw.last_access_date),
            last_write_time: FileTime::from(raw.last_write_time),
            last_write_date: FileDate::from(raw.last_write_date),
            first_unit: UnitIndex(raw.first_unit),
            size: raw.size,
        }
    }

    pub fn encode(&self) -> RawDirectoryEntry {
        let mut base = [0; 8];
        base.copy_from_slice(self.name.base());
        if base[0] == Self::DELETED_MARKER {
            base[0] = Self::ESCAPED_E5;
        }
        let mut extension = [0; 3];
        extension.copy_from_slice(self.name.extension());
        RawDirectoryEntry {
            name: base,
            extension,
            attributes: self.attributes.bits(),
            reserved: [0; 2],
            creation_time: self.creation_time.into(),
            creation_date: self.creation_date.into(),
            last_access_date: self.last_access_date.into(),
            ignored: [0; 2],
            last_write_time: self.last_write_time.into(),
            last_write_date: self.last_write_date.into(),
            first_unit: self.first_unit.0,
            size: self.size,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.attributes.contains(Attributes::DIRECTORY)
    }

    pub fn is_volume_label(&self) -> bool {
        self.attributes.contains(Attributes::VOLUME_LABEL)
    }
}

/// A run of directory records: the root directory table, or one storage
/// unit of a subdirectory.
#[derive(Debug, Clone, Copy)]
pub struct DirectoryTable<'a> {
    bytes: &'a [u8],
    capacity: usize,
}

impl<'a> DirectoryTable<'a> {
    /// `capacity` is the number of record slots to consider, clamped to what
    /// `bytes` can hold.
    pub fn new(bytes: &'a [u8], capacity: usize) -> Self {
        let capacity = capacity.min(bytes.len() / DirectoryEntry::SIZE);
        Self { bytes, capacity }
    }

    /// Visible records in slot order: the scan stops at the end marker or at
    /// capacity, and skips deleted records and volume labels.
    pub fn iter(&self) -> DirectoryIter<'a> {
        DirectoryIter {
            table: *self,
            index: 0,
        }
    }

    /// First visible record whose name matches, case-insensitively.
    pub fn find(&self, name: &ShortName) -> Option<DirectoryEntry> {
        self.iter().find(|entry| entry.name.matches(name))
    }
}

pub struct DirectoryIter<'a> {
    table: DirectoryTable<'a>,
    index: usize,
}

impl Iterator for DirectoryIter<'_> {
    type Item = DirectoryEntry;

    fn next(&mut self) -> Option<Self::Item> {
        while self.index < self.table.capacity {
            let raw: RawDirectoryEntry =
                read_struct(self.table.bytes, self.index * DirectoryEntry::SIZE)?;
            self.index += 1;

            match raw.name[0] {
                DirectoryEntry::END_MARKER => {
                    self.index = self.table.capacity;
                    return None;
                }
                DirectoryEntry::DELETED_MARKER => continue,
                _ => {}
            }
            if Attributes::from_bits_retain(raw.attributes).contains(Attributes::VOLUME_LABEL) {
                continue;
            }
            return Some(DirectoryEntry::decode(&raw));
        }
        None
    }
}
