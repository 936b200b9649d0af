use alloc::vec::Vec;
use core::fmt;

use crate::io::{try_extend, zeroed_buffer};
use crate::{
    Attributes, DirectoryEntry, Direction, Error, FileDate, FileTime, Firmware, LogicalBlock,
    ShortName, UnitIndex, Volume,
};

/// Identity of an open file, unique for the life of the volume.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileId(pub u32);

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One storage unit of an open file: where it is and how many of its bytes
/// belong to the file.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ChainNode {
    pub unit: UnitIndex,
    pub block: LogicalBlock,
    pub sectors: u8,
    pub len: usize,
}

/// An open file. Owns its chain; dropping or [closing](OpenFile::close) the
/// handle releases it.
#[derive(Debug, PartialEq, Eq)]
pub struct OpenFile {
    id: FileId,
    entry: DirectoryEntry,
    chain: Vec<ChainNode>,
}

impl OpenFile {
    pub fn id(&self) -> FileId {
        self.id
    }

    /// The directory record as it was when the file was opened.
    pub fn entry(&self) -> &DirectoryEntry {
        &self.entry
    }

    pub fn name(&self) -> ShortName {
        self.entry.name
    }

    pub fn attributes(&self) -> Attributes {
        self.entry.attributes
    }

    pub fn size(&self) -> u32 {
        self.entry.size
    }

    pub fn last_write_time(&self) -> FileTime {
        self.entry.last_write_time
    }

    pub fn last_write_date(&self) -> FileDate {
        self.entry.last_write_date
    }

    pub fn chain(&self) -> &[ChainNode] {
        &self.chain
    }

    /// Bytes a full [`Volume::read`] delivers.
    pub fn readable_bytes(&self) -> usize {
        self.chain.iter().map(|node| node.len).sum()
    }

    /// Releases the handle and its chain. Nothing is written back.
    pub fn close(self) {
        log::debug!("closing {} {}", self.id, self.entry.name);
    }
}

/// Sink for reads that have no destination buffer.
pub trait Console {
    fn write_bytes(&mut self, bytes: &[u8]);
}

/// Where [`Volume::read`] delivers a file's bytes.
pub enum ReadTarget<'a> {
    /// Appended in chain order.
    Buffer(&'a mut Vec<u8>),
    Console(&'a mut dyn Console),
}

impl<F: Firmware> Volume<F> {
    /// Resolves `path` and materializes its whole chain.
    ///
    /// Each node covers one storage unit. For files, node lengths add up to
    /// the recorded size: the last node is trimmed, and units past the size
    /// are left out. Directories record no size and get whole units.
    pub fn open(&mut self, path: &str) -> Result<OpenFile, Error> {
        let entry = self.resolve(path)?;
        let chain = self.build_chain(&entry)?;

        let id = FileId(self.next_file_id);
        self.next_file_id = self.next_file_id.wrapping_add(1);
        log::debug!(
            "opened {id} {path}: {} bytes in {} units",
            entry.size,
            chain.len()
        );

        Ok(OpenFile { id, entry, chain })
    }

    fn build_chain(&self, entry: &DirectoryEntry) -> Result<Vec<ChainNode>, Error> {
        let unit_bytes = self.geometry.unit_bytes();
        let sectors = self.geometry.sectors_per_unit;
        let mut remaining = entry.size as usize;
        let mut chain: Vec<ChainNode> = Vec::new();

        for unit in self.table.chain(entry.first_unit) {
            let unit = unit?;
            let len = if entry.is_dir() {
                unit_bytes
            } else if remaining == 0 {
                log::warn!(
                    "{}: chain continues past its {} bytes at unit {:#05x}",
                    entry.name,
                    entry.size,
                    unit.0
                );
                break;
            } else {
                let len = remaining.min(unit_bytes);
                remaining -= len;
                len
            };

            chain.try_reserve(1).map_err(|_| Error::OutOfMemory {
                bytes: (chain.len() + 1) * core::mem::size_of::<ChainNode>(),
            })?;
            let block = self.geometry.unit_to_logical_block(unit);
            log::trace!("{}: unit {:#05x} at block {}, {len} bytes", entry.name, unit.0, block.0);
            chain.push(ChainNode {
                unit,
                block,
                sectors,
                len,
            });
        }

        if remaining > 0 && !entry.is_dir() {
            log::warn!(
                "{}: chain ends {remaining} bytes short of its {} bytes",
                entry.name,
                entry.size
            );
        }
        Ok(chain)
    }

    /// Reads every node of `file` in chain order, one transfer per node.
    /// Returns the number of bytes delivered.
    ///
    /// On failure a destination buffer is cut back to its length on entry.
    /// Bytes already streamed to a console stay streamed.
    pub fn read(&mut self, file: &OpenFile, mut target: ReadTarget<'_>) -> Result<usize, Error> {
        let start = match &target {
            ReadTarget::Buffer(buffer) => buffer.len(),
            ReadTarget::Console(_) => 0,
        };
        let result = self.read_nodes(file, &mut target);
        if result.is_err() {
            if let ReadTarget::Buffer(buffer) = target {
                buffer.truncate(start);
            }
        }
        result
    }

    fn read_nodes(&mut self, file: &OpenFile, target: &mut ReadTarget<'_>) -> Result<usize, Error> {
        let mut unit = zeroed_buffer(self.geometry.unit_bytes())?;
        let mut delivered = 0;
        for node in &file.chain {
            self.read_node(node, &mut unit)?;
            let bytes = &unit[..node.len];
            match target {
                ReadTarget::Buffer(buffer) => try_extend(buffer, bytes)?,
                ReadTarget::Console(console) => console.write_bytes(bytes),
            }
            delivered += node.len;
        }
        Ok(delivered)
    }

    /// A sequential reader over `file`.
    pub fn reader<'a>(&'a mut self, file: &'a OpenFile) -> Result<FileReader<'a, F>, Error> {
        let unit = zeroed_buffer(self.geometry.unit_bytes())?;
        Ok(FileReader {
            volume: self,
            file,
            unit,
            next_node: 0,
            position: 0,
            loaded: 0,
        })
    }

    fn read_node(&mut self, node: &ChainNode, buffer: &mut [u8]) -> Result<(), Error> {
        self.disk
            .transfer(Direction::Read, node.sectors, node.block, buffer)
    }
}

/// Reads an open file as a byte stream, one storage unit at a time.
pub struct FileReader<'a, F> {
    volume: &'a mut Volume<F>,
    file: &'a OpenFile,
    unit: Vec<u8>,
    next_node: usize,
    position: usize,
    loaded: usize,
}

impl<F: Firmware> genio::Read for FileReader<'_, F> {
    type ReadError = Error;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::ReadError> {
        while self.position == self.loaded {
            let Some(node) = self.file.chain.get(self.next_node) else {
                return Ok(0);
            };
            self.volume.read_node(node, &mut self.unit)?;
            self.next_node += 1;
            self.position = 0;
            self.loaded = node.len;
        }

        let available = &self.unit[self.position..self.loaded];
        let len = available.len().min(buf.len());
        buf[..len].copy_from_slice(&available[..len]);
        self.position += len;
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use genio::Read;
    use zerocopy::{AsBytes, FromBytes, FromZeroes};

    use crate::testing::{pattern, sample_volume, ImageBuilder};
    use crate::{zero_copy_read, FirmwareStatus, MountOptions};

    #[derive(Default)]
    struct CapturedConsole {
        writes: Vec<Vec<u8>>,
    }

    impl Console for CapturedConsole {
        fn write_bytes(&mut self, bytes: &[u8]) {
            self.writes.push(bytes.to_vec());
        }
    }

    #[test]
    fn open_builds_trimmed_chain() {
        let mut volume = sample_volume();
        let file = volume.open("/dir1/file1.txt").unwrap();
        let units: Vec<_> = file.chain().iter().map(|n| n.unit.0).collect();
        let lens: Vec<_> = file.chain().iter().map(|n| n.len).collect();
        assert_eq!(units, [5, 9, 6]);
        assert_eq!(lens, [512, 512, 276]);
        assert_eq!(file.chain()[1].block, LogicalBlock(33 + 7));
        assert_eq!(file.readable_bytes(), 1300);
    }

    #[test]
    fn read_into_buffer() {
        let mut volume = sample_volume();
        let file = volume.open("/dir1/file1.txt").unwrap();
        let mut buffer = Vec::new();
        let n = volume.read(&file, ReadTarget::Buffer(&mut buffer)).unwrap();
        assert_eq!(n, 1300);
        assert_eq!(buffer, pattern(1300, 1));
        file.close();
    }

    #[test]
    fn read_appends_to_existing_bytes() {
        let mut volume = sample_volume();
        let file = volume.open("/file1.txt").unwrap();
        let mut buffer = b"header".to_vec();
        volume.read(&file, ReadTarget::Buffer(&mut buffer)).unwrap();
        assert_eq!(buffer.len(), 6 + 700);
        assert_eq!(buffer[6..], pattern(700, 0));
    }

    #[test]
    fn read_streams_to_console_per_node() {
        let mut volume = sample_volume();
        let file = volume.open("/file1.txt").unwrap();
        let mut console = CapturedConsole::default();
        volume
            .read(&file, ReadTarget::Console(&mut console))
            .unwrap();
        let lens: Vec<_> = console.writes.iter().map(Vec::len).collect();
        assert_eq!(lens, [512, 188]);
        assert_eq!(console.writes.concat(), pattern(700, 0));
    }

    #[test]
    fn one_transfer_per_node() {
        let mut volume = sample_volume();
        let file = volume.open("/dir1/file1.txt").unwrap();
        let before = volume.disk().firmware().transfer_count();
        volume.read(&file, ReadTarget::Buffer(&mut Vec::new())).unwrap();
        assert_eq!(volume.disk().firmware().transfer_count() - before, 3);
    }

    #[test]
    fn empty_file() {
        let mut volume = sample_volume();
        let file = volume.open("/empty.txt").unwrap();
        assert!(file.chain().is_empty());
        let mut buffer = Vec::new();
        assert_eq!(volume.read(&file, ReadTarget::Buffer(&mut buffer)), Ok(0));
    }

    #[test]
    fn open_twice_gives_independent_handles() {
        let mut volume = sample_volume();
        let first = volume.open("/dir1/file1.txt").unwrap();
        let second = volume.open("/dir1/file1.txt").unwrap();
        assert_ne!(first.id(), second.id());
        assert_eq!(first.chain(), second.chain());
        assert_ne!(first.chain().as_ptr(), second.chain().as_ptr());

        first.close();
        let mut buffer = Vec::new();
        volume.read(&second, ReadTarget::Buffer(&mut buffer)).unwrap();
        assert_eq!(buffer, pattern(1300, 1));
        second.close();
    }

    #[test]
    fn open_copies_record_fields() {
        let mut volume = sample_volume();
        let file = volume.open("/file1.txt").unwrap();
        assert_eq!(file.name().to_string(), "FILE1.TXT");
        assert_eq!(file.size(), 700);
        assert_eq!(file.attributes(), Attributes::ARCHIVE);
        assert_eq!(file.last_write_time().to_string(), "13:45:58");
        assert_eq!(file.last_write_date().to_string(), "2021-04-20");
    }

    #[test]
    fn open_missing_file() {
        let mut volume = sample_volume();
        assert_eq!(volume.open("/nothing.txt"), Err(Error::NotFound));
        assert_eq!(volume.open("nothing.txt"), Err(Error::RelativePathRejected));
    }

    #[test]
    fn units_past_recorded_size_are_dropped() {
        let mut builder = ImageBuilder::new();
        builder.file_in_root("SHORT   BIN", &[7, 8, 9], &pattern(1536, 3));
        // The record claims less than the chain holds.
        builder.set_root_size("SHORT   BIN", 600);
        let mut volume = Volume::mount(builder.build(), MountOptions::default()).unwrap();

        let file = volume.open("/short.bin").unwrap();
        let lens: Vec<_> = file.chain().iter().map(|n| n.len).collect();
        assert_eq!(lens, [512, 88]);
    }

    #[test]
    fn chain_shorter_than_size_reads_what_exists() {
        let mut builder = ImageBuilder::new();
        builder.file_in_root("LONG    BIN", &[7], &pattern(512, 3));
        builder.set_root_size("LONG    BIN", 5000);
        let mut volume = Volume::mount(builder.build(), MountOptions::default()).unwrap();

        let file = volume.open("/long.bin").unwrap();
        assert_eq!(file.readable_bytes(), 512);
    }

    #[test]
    fn multi_sector_units() {
        let mut builder = ImageBuilder::with_sectors_per_unit(4);
        builder.file_in_root("BIG     BIN", &[3, 2], &pattern(3000, 9));
        let mut volume = Volume::mount(builder.build(), MountOptions::default()).unwrap();

        let file = volume.open("/big.bin").unwrap();
        let nodes = file.chain();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].sectors, 4);
        assert_eq!(nodes[0].len, 2048);
        assert_eq!(nodes[1].len, 952);

        let mut buffer = Vec::new();
        volume.read(&file, ReadTarget::Buffer(&mut buffer)).unwrap();
        assert_eq!(buffer, pattern(3000, 9));
    }

    #[test]
    fn media_error_during_read() {
        let mut volume = sample_volume();
        let file = volume.open("/file1.txt").unwrap();
        volume
            .disk
            .firmware_mut()
            .fail_next_transfers(3, FirmwareStatus::CRC_ERROR);
        let mut buffer = Vec::new();
        let err = volume
            .read(&file, ReadTarget::Buffer(&mut buffer))
            .unwrap_err();
        assert_eq!(
            err,
            Error::MediaError {
                block: file.chain()[0].block,
                status: FirmwareStatus::CRC_ERROR
            }
        );
        assert!(buffer.is_empty());

        // The handle stays usable once the media recovers.
        volume.read(&file, ReadTarget::Buffer(&mut buffer)).unwrap();
        assert_eq!(buffer, pattern(700, 0));
    }

    #[test]
    fn failed_read_leaves_buffer_untouched() {
        let mut volume = sample_volume();
        let file = volume.open("/file1.txt").unwrap();
        volume
            .disk
            .firmware_mut()
            .fail_transfers_after(1, 3, FirmwareStatus::SECTOR_NOT_FOUND);

        let mut buffer = b"header".to_vec();
        let err = volume
            .read(&file, ReadTarget::Buffer(&mut buffer))
            .unwrap_err();
        assert_eq!(
            err,
            Error::MediaError {
                block: file.chain()[1].block,
                status: FirmwareStatus::SECTOR_NOT_FOUND
            }
        );
        assert_eq!(buffer, b"header");
    }

    #[test]
    fn aliasing_first_unit_is_corrupt() {
        let mut builder = ImageBuilder::new();
        builder.file_in_root("DATA    BIN", &[3], &pattern(512, 4));
        builder.root_entry(crate::testing::entry("ALIAS   BIN", Attributes::ARCHIVE, 0x1003, 512));
        let mut volume = Volume::mount(builder.build(), MountOptions::default()).unwrap();

        assert_eq!(
            volume.open("/alias.bin"),
            Err(Error::CorruptChain(UnitIndex(0x1003)))
        );
    }

    #[test]
    fn link_past_disk_end_fails_open() {
        let mut builder = ImageBuilder::new();
        // Only unit 3 has data; 3000 is a table entry with no storage behind it.
        builder.write_chain(&[3, 3000], &pattern(512, 5));
        builder.root_entry(crate::testing::entry("FAR     BIN", Attributes::ARCHIVE, 3, 1024));
        let mut volume = Volume::mount(builder.build(), MountOptions::default()).unwrap();
        let transfers = volume.disk().firmware().transfer_count();

        assert_eq!(
            volume.open("/far.bin"),
            Err(Error::CorruptChain(UnitIndex(3000)))
        );
        assert_eq!(volume.disk().firmware().transfer_count(), transfers);
        assert_eq!(volume.disk().firmware().reset_count(), 1);
    }

    #[test]
    fn reader_streams_across_units() {
        let mut volume = sample_volume();
        let file = volume.open("/dir1/file1.txt").unwrap();
        let mut reader = volume.reader(&file).unwrap();

        let mut head = [0; 10];
        reader.read_exact(&mut head).unwrap();
        assert_eq!(head[..], pattern(1300, 1)[..10]);

        let mut rest = vec![0; 1290];
        reader.read_exact(&mut rest).unwrap();
        assert_eq!(rest[..], pattern(1300, 1)[10..]);

        let mut more = [0; 1];
        assert_eq!(reader.read(&mut more), Ok(0));
    }

    #[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
    #[repr(C, packed)]
    struct Header {
        magic: [u8; 4],
        length: u32,
    }

    #[test]
    fn zero_copy_header_from_file() {
        let mut contents = Vec::new();
        contents.extend_from_slice(b"ELF!");
        contents.extend_from_slice(&600_u32.to_le_bytes());
        contents.resize(600, 0xAA);

        let mut builder = ImageBuilder::new();
        builder.file_in_root("PROGRAM BIN", &[2, 3], &contents);
        let mut volume = Volume::mount(builder.build(), MountOptions::default()).unwrap();
        let file = volume.open("/program.bin").unwrap();
        let mut reader = volume.reader(&file).unwrap();

        let header: Header = zero_copy_read(&mut reader).unwrap();
        assert_eq!(header.magic, *b"ELF!");
        assert_eq!({ header.length }, 600);
    }
}
