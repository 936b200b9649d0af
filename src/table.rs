use alloc::vec::Vec;
use core::ops::RangeInclusive;

use crate::Error;

/// Index of a storage unit (cluster). Units 0 and 1 are reserved; data
/// starts at unit 2.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnitIndex(pub u16);

impl UnitIndex {
    pub const FIRST_DATA: Self = Self(2);

    pub fn is_odd(self) -> bool {
        self.0 & 1 == 1
    }
}

/// Classification of one decoded 12-bit table entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TableEntry {
    /// 0x000: unused. Never valid to follow.
    Free,
    /// 0x001
    Invalid,
    /// 0x002..=0xFEF
    Next(UnitIndex),
    /// 0xFF0..=0xFF6
    Reserved(u16),
    /// 0xFF7
    Bad,
    /// 0xFF8..=0xFFF
    EndOfChain(u16),
}

impl TableEntry {
    pub const FREE: u16 = 0x000;
    pub const INVALID: u16 = 0x001;
    pub const NEXT: RangeInclusive<u16> = 0x002..=0xFEF;
    pub const RESERVED: RangeInclusive<u16> = 0xFF0..=0xFF6;
    pub const BAD: u16 = 0xFF7;
    pub const END_OF_CHAIN: RangeInclusive<u16> = 0xFF8..=0xFFF;

    pub fn from_raw(raw: u16) -> Self {
        match raw & 0x0FFF {
            Self::FREE => Self::Free,
            Self::INVALID => Self::Invalid,
            Self::BAD => Self::Bad,
            value if Self::NEXT.contains(&value) => Self::Next(UnitIndex(value)),
            value if Self::RESERVED.contains(&value) => Self::Reserved(value),
            value => Self::EndOfChain(value),
        }
    }

    /// The following unit, or `None` if this entry ends the chain.
    pub fn next(self) -> Option<UnitIndex> {
        match self {
            Self::Next(unit) => Some(unit),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }
}

/// The allocation table: 12-bit entries packed two to every three bytes.
///
/// ```text
/// entry i at byte offset floor(i * 3 / 2)
///   even i: u16_le & 0x0FFF
///   odd i:  u16_le >> 4
/// ```
#[derive(Debug, Clone)]
pub struct AllocationTable {
    bytes: Vec<u8>,
    /// One past the highest unit a chain may reach.
    end: usize,
}

impl AllocationTable {
    /// A table whose every entry may be linked to.
    pub fn new(bytes: Vec<u8>) -> Self {
        let end = bytes.len() * 2 / 3;
        Self { bytes, end }
    }

    /// A table for a volume with `data_units` storage units. Entries past the
    /// data area exist in the table's last sector but name no storage.
    pub fn with_data_units(bytes: Vec<u8>, data_units: u32) -> Self {
        let mut table = Self::new(bytes);
        let data_end = usize::from(UnitIndex::FIRST_DATA.0) + data_units as usize;
        table.end = table.end.min(data_end);
        table
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of entries the table has room for, reserved ones included.
    pub fn len(&self) -> usize {
        self.bytes.len() * 2 / 3
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `unit` names a storage unit of the data area.
    pub fn contains(&self, unit: UnitIndex) -> bool {
        unit >= UnitIndex::FIRST_DATA && usize::from(unit.0) < self.end
    }

    /// The raw 12-bit value of entry `index`, or `None` if the table is too
    /// short. It is the parity of the index, not of the value, that picks
    /// the shift or the mask.
    pub fn raw_entry(&self, index: UnitIndex) -> Option<u16> {
        let offset = usize::from(index.0) * 3 / 2;
        let low = *self.bytes.get(offset)?;
        let high = *self.bytes.get(offset + 1)?;
        let word = u16::from_le_bytes([low, high]);
        Some(if index.is_odd() { word >> 4 } else { word & 0x0FFF })
    }

    pub fn entry(&self, index: UnitIndex) -> Option<TableEntry> {
        self.raw_entry(index).map(TableEntry::from_raw)
    }

    /// Follows one link. `Ok(None)` means `current` is the last unit.
    pub fn next_unit(&self, current: UnitIndex) -> Result<Option<UnitIndex>, Error> {
        let entry = self.entry(current).ok_or(Error::CorruptChain(current))?;
        if let Some(next) = entry.next() {
            if !self.contains(next) {
                return Err(Error::CorruptChain(next));
            }
        }
        Ok(entry.next())
    }

    /// Walks the chain starting at `first`. A first unit of 0 is an empty
    /// chain; any other first unit outside the pointer range or the data
    /// area is corrupt.
    pub fn chain(&self, first: UnitIndex) -> Chain<'_> {
        let (next, error) = match first {
            UnitIndex(0) => (None, None),
            unit if self.contains(unit) && TableEntry::NEXT.contains(&unit.0) => (Some(unit), None),
            _ => (None, Some(Error::CorruptChain(first))),
        };
        Chain {
            table: self,
            next,
            error,
            visited: 0,
        }
    }
}

/// Iterator over the units of one chain, in chain order.
#[derive(Debug)]
pub struct Chain<'a> {
    table: &'a AllocationTable,
    next: Option<UnitIndex>,
    error: Option<Error>,
    visited: usize,
}

impl Iterator for Chain<'_> {
    type Item = Result<UnitIndex, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(error) = self.error.take() {
            self.next = None;
            return Some(Err(error));
        }

        let current = self.next.take()?;

        // A chain longer than the data area can only be a cycle.
        self.visited += 1;
        if self.visited > self.table.end {
            return Some(Err(Error::CorruptChain(current)));
        }

        match self.table.next_unit(current) {
            Ok(next) => self.next = next,
            Err(error) => self.error = Some(error),
        }
        Some(Ok(current))
    }
}
