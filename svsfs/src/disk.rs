//! The block device abstraction consumed by the filesystem engine.
//!
//! §6 of the design treats the block device as an external collaborator
//! described only by its interface (fixed block size, `nblocks`/`read`/
//! `write`). This module states that interface as the [`Disk`] trait and
//! provides the two implementations this repository actually drives: an
//! in-memory one for tests, and a file/block-device-backed one for the CLI.

use crate::BLOCK_SIZE;
use std::fs::File;
use std::io;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;

/// A fixed-block-size storage device.
///
/// Every read and write is exactly one [`BLOCK_SIZE`]-byte block; the device
/// defines no notion of partial-block I/O, and reads/writes are atomic per
/// block.
pub trait Disk {
	/// Returns the total number of blocks on the device.
	fn nblocks(&self) -> u32;

	/// Reads block `block_no` into `buf`.
	fn read(&mut self, block_no: u32, buf: &mut [u8; BLOCK_SIZE]) -> io::Result<()>;

	/// Writes `buf` to block `block_no`.
	fn write(&mut self, block_no: u32, buf: &[u8; BLOCK_SIZE]) -> io::Result<()>;
}

/// An in-memory [`Disk`], used by unit and integration tests.
pub struct MemDisk {
	blocks: Vec<u8>,
	nblocks: u32,
}

impl MemDisk {
	/// Creates a new, zeroed in-memory disk of `nblocks` blocks.
	pub fn new(nblocks: u32) -> Self {
		Self {
			blocks: vec![0; nblocks as usize * BLOCK_SIZE],
			nblocks,
		}
	}
}

impl Disk for MemDisk {
	fn nblocks(&self) -> u32 {
		self.nblocks
	}

	fn read(&mut self, block_no: u32, buf: &mut [u8; BLOCK_SIZE]) -> io::Result<()> {
		let off = block_no as usize * BLOCK_SIZE;
		buf.copy_from_slice(&self.blocks[off..off + BLOCK_SIZE]);
		Ok(())
	}

	fn write(&mut self, block_no: u32, buf: &[u8; BLOCK_SIZE]) -> io::Result<()> {
		let off = block_no as usize * BLOCK_SIZE;
		self.blocks[off..off + BLOCK_SIZE].copy_from_slice(buf);
		Ok(())
	}
}

/// A [`Disk`] backed by a regular file or a real block device.
pub struct FileDisk {
	file: File,
	nblocks: u32,
}

impl FileDisk {
	/// Opens `path` for reading and writing, sizing it in [`BLOCK_SIZE`]
	/// units.
	///
	/// Sizing is delegated to [`utils::disk::get_disk_size`], which obtains
	/// the sector count via `BLKGETSIZE64` for a block or character device
	/// and from the file's metadata otherwise; the sector count is then
	/// converted from 512-byte sectors into whole [`BLOCK_SIZE`] blocks.
	pub fn open(path: &std::path::Path) -> io::Result<Self> {
		let file = File::options().read(true).write(true).open(path)?;
		let sectors = utils::disk::get_disk_size(path)?;
		let nbytes = sectors * 512;
		Ok(Self {
			file,
			nblocks: (nbytes / BLOCK_SIZE as u64) as u32,
		})
	}
}

impl Disk for FileDisk {
	fn nblocks(&self) -> u32 {
		self.nblocks
	}

	fn read(&mut self, block_no: u32, buf: &mut [u8; BLOCK_SIZE]) -> io::Result<()> {
		self.file.seek(SeekFrom::Start(block_no as u64 * BLOCK_SIZE as u64))?;
		self.file.read_exact(buf)
	}

	fn write(&mut self, block_no: u32, buf: &[u8; BLOCK_SIZE]) -> io::Result<()> {
		self.file.seek(SeekFrom::Start(block_no as u64 * BLOCK_SIZE as u64))?;
		self.file.write_all(buf)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn mem_disk_round_trip() {
		let mut disk = MemDisk::new(4);
		let mut buf = [0xab; BLOCK_SIZE];
		disk.write(2, &buf).unwrap();
		buf = [0; BLOCK_SIZE];
		disk.read(2, &mut buf).unwrap();
		assert!(buf.iter().all(|&b| b == 0xab));
		// Other blocks stay zeroed.
		let mut other = [0xff; BLOCK_SIZE];
		disk.read(0, &mut other).unwrap();
		assert!(other.iter().all(|&b| b == 0));
	}
}
