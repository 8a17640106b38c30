//! The superblock: block 0, describing the filesystem's geometry.

use crate::disk::Disk;
use crate::BLOCK_MAGIC;
use crate::BLOCK_SIZE;
use crate::INODES_PER_BLOCK;
use crate::Error;

/// Block number of the superblock. Fixed by design.
pub const SUPERBLOCK_NO: u32 = 0;

/// The on-disk geometry of an SVSFS filesystem.
///
/// Stored as four little-endian 32-bit fields with no padding, packed at the
/// start of block 0. The remainder of the block is unused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Superblock {
	/// Must equal [`BLOCK_MAGIC`] for a valid filesystem.
	pub magic: u32,
	/// Total number of blocks on the device.
	pub nblocks: u32,
	/// Number of blocks reserved for the inode table, `ceil(nblocks / 10)`.
	pub ninodeblocks: u32,
	/// Total number of inode slots, `ninodeblocks * INODES_PER_BLOCK`.
	pub ninodes: u32,
}

impl Superblock {
	/// Computes the geometry for a fresh filesystem of `nblocks` blocks.
	pub fn for_device(nblocks: u32) -> Self {
		let ninodeblocks = utils::util::ceil_division(nblocks, 10);
		Self {
			magic: BLOCK_MAGIC,
			nblocks,
			ninodeblocks,
			ninodes: ninodeblocks * INODES_PER_BLOCK as u32,
		}
	}

	/// Decodes a superblock from the first 16 bytes of a raw block.
	pub fn decode(block: &[u8; BLOCK_SIZE]) -> Self {
		Self {
			magic: u32::from_le_bytes(block[0..4].try_into().unwrap()),
			nblocks: u32::from_le_bytes(block[4..8].try_into().unwrap()),
			ninodeblocks: u32::from_le_bytes(block[8..12].try_into().unwrap()),
			ninodes: u32::from_le_bytes(block[12..16].try_into().unwrap()),
		}
	}

	/// Encodes this superblock into a fresh, otherwise-zeroed raw block.
	pub fn encode(&self) -> [u8; BLOCK_SIZE] {
		let mut block = [0u8; BLOCK_SIZE];
		block[0..4].copy_from_slice(&self.magic.to_le_bytes());
		block[4..8].copy_from_slice(&self.nblocks.to_le_bytes());
		block[8..12].copy_from_slice(&self.ninodeblocks.to_le_bytes());
		block[12..16].copy_from_slice(&self.ninodes.to_le_bytes());
		block
	}

	/// Checks the recoverable preconditions `mount` imposes on a freshly
	/// read superblock.
	pub fn validate(&self) -> Result<(), Error> {
		if self.magic != BLOCK_MAGIC {
			return Err(Error::BadMagic);
		}
		if self.nblocks == 0 || self.ninodes == 0 {
			return Err(Error::EmptyFilesystem);
		}
		Ok(())
	}
}

/// Reads the superblock from block 0 of `disk`.
pub fn read<D: Disk>(disk: &mut D) -> Result<Superblock, Error> {
	let mut buf = [0u8; BLOCK_SIZE];
	disk.read(SUPERBLOCK_NO, &mut buf)
		.map_err(|e| Error::Disk(e.to_string()))?;
	Ok(Superblock::decode(&buf))
}

/// Writes `sb` to block 0 of `disk`.
pub fn write<D: Disk>(disk: &mut D, sb: &Superblock) -> Result<(), Error> {
	disk.write(SUPERBLOCK_NO, &sb.encode())
		.map_err(|e| Error::Disk(e.to_string()))
}
