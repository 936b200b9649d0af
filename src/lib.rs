//! Read-only FAT12 storage stack: turns raw sector I/O on a floppy or small
//! fixed disk into named files reachable by an absolute path.
//!
//! The layers, leaf to root:
//!
//! - [`Disk`]: logical block to CHS conversion and retried firmware transfers.
//! - [`BootSector`] / [`VolumeGeometry`]: boot sector parsing and layout math.
//! - [`AllocationTable`]: 12-bit packed table and the cluster chain walker.
//! - [`DirectoryTable`]: fixed 32-byte directory records and name lookup.
//! - [`Volume`]: the mount context, path resolution and directory listing.
//! - [`OpenFile`] / [`FileReader`]: materialized cluster chains and reads.
//!
//! # Resources
//!
//! - <https://en.wikipedia.org/wiki/Design_of_the_FAT_file_system>
//! - <https://www.eit.lth.se/fileadmin/eit/courses/eitn50/Literature/fat12_description.pdf>
//! - <https://wiki.osdev.org/FAT>
//! - <http://www.ctyme.com/intr/rb-0607.htm> (INT 13h, AH=02h)

#![cfg_attr(not(test), no_std)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cargo_common_metadata,
    clippy::doc_markdown,
    clippy::implicit_hasher,
    clippy::implicit_return,
    clippy::missing_const_for_fn,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::multiple_crate_versions,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::redundant_pub_crate,
    clippy::suboptimal_flops,
    clippy::upper_case_acronyms,
    clippy::wildcard_imports
)]

extern crate alloc;

mod block;
mod boot;
mod directory;
mod disk;
mod error;
mod file;
mod io;
mod name;
mod path;
mod ramdisk;
mod table;
mod volume;

#[cfg(test)]
mod testing;

pub use block::*;
pub use boot::*;
pub use directory::*;
pub use disk::*;
pub use error::*;
pub use file::*;
pub use io::*;
pub use name::*;
pub use path::*;
pub use ramdisk::*;
pub use table::*;
pub use volume::*;
