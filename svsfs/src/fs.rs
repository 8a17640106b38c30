//! The lifecycle controller, allocator, and read/write engine.
//!
//! The "mounted" flag of the original design becomes a pure fact about
//! ownership here: [`FileSystem::mount`] takes a [`Disk`] by value and
//! returns a [`FileSystem`] that owns it, and [`FileSystem::format`] takes a
//! `Disk` by value too. A device that is still owned by a live
//! `FileSystem` cannot be passed to `format` without first calling
//! [`FileSystem::unmount`] to get it back — the "format requires unmounted"
//! precondition is enforced by the borrow checker, not a runtime flag.

use crate::bitmap::Bitmap;
use crate::debug::DebugReport;
use crate::disk::Disk;
use crate::inode;
use crate::inode::Inode;
use crate::inode::InodeNumber;
use crate::superblock;
use crate::superblock::Superblock;
use crate::Error;
use crate::BLOCK_SIZE;
use crate::POINTERS_PER_BLOCK;
use crate::POINTERS_PER_INODE;

/// Maximum file capacity per inode, in bytes:
/// `(POINTERS_PER_INODE + POINTERS_PER_BLOCK) * BLOCK_SIZE`.
pub const MAX_FILE_SIZE: u64 =
	(POINTERS_PER_INODE as u64 + POINTERS_PER_BLOCK as u64) * BLOCK_SIZE as u64;

/// A mounted SVSFS filesystem, holding the device, the superblock, and the
/// free-block bitmap rebuilt from disk state.
pub struct FileSystem<D: Disk> {
	device: D,
	superblock: Superblock,
	bitmap: Bitmap,
}

impl<D: Disk> FileSystem<D> {
	/// Wipes the inode-table region of `device` (blocks `0..=ninodeblocks`)
	/// and writes a fresh superblock, without mounting.
	///
	/// Since this takes `device` by value, it cannot be called on a device
	/// still owned by a live [`FileSystem`] — see the module documentation.
	/// Does not touch the data region: its contents become garbage but are
	/// marked free the next time the filesystem is mounted.
	pub fn format(mut device: D) -> Result<D, Error> {
		let sb = Superblock::for_device(device.nblocks());
		let zero = [0u8; BLOCK_SIZE];
		for block_no in 1..=sb.ninodeblocks {
			device.write(block_no, &zero).map_err(|e| Error::Disk(e.to_string()))?;
		}
		superblock::write(&mut device, &sb)?;
		Ok(device)
	}

	/// Reads and validates the superblock, then rebuilds the free-block
	/// bitmap by walking every inode.
	///
	/// Fails with [`Error::BadMagic`] or [`Error::EmptyFilesystem`] per
	/// [`Superblock::validate`].
	pub fn mount(mut device: D) -> Result<Self, Error> {
		let sb = superblock::read(&mut device)?;
		sb.validate()?;

		let mut bitmap = Bitmap::new(sb.nblocks, sb.ninodeblocks + 1);
		bitmap.mark_used(superblock::SUPERBLOCK_NO);
		for b in 1..=sb.ninodeblocks {
			bitmap.mark_used(b);
		}

		for i in 1..sb.ninodes {
			let inumber = InodeNumber::new(i).unwrap();
			let node = inode::read(&mut device, &sb, inumber)?;
			if !node.is_valid() {
				continue;
			}
			for &d in &node.direct {
				if d != 0 {
					bitmap.mark_used(d);
				}
			}
			if node.indirect != 0 {
				bitmap.mark_used(node.indirect);
				let pointers = read_pointer_block(&mut device, node.indirect)?;
				for &p in pointers.iter() {
					// Indirect pointers are densely packed from index 0; the
					// first zero entry marks the end of the live range.
					if p == 0 {
						break;
					}
					bitmap.mark_used(p);
				}
			}
		}

		Ok(Self {
			device,
			superblock: sb,
			bitmap,
		})
	}

	/// Releases this filesystem's hold on its device, discarding the
	/// in-memory bitmap.
	pub fn unmount(self) -> D {
		self.device
	}

	/// Prints the diagnostic report for the currently-mounted filesystem.
	///
	/// Equivalent to calling the free function [`crate::debug::debug`] on
	/// this filesystem's device; provided as a convenience since `debug`
	/// itself requires only a valid superblock, not a live mount.
	pub fn debug(&mut self) -> Result<DebugReport, Error> {
		crate::debug::report(&mut self.device)
	}

	/// Claims the lowest-numbered free inode slot.
	///
	/// Returns `None` if every slot in `[1, ninodes)` is allocated.
	pub fn create(&mut self) -> Option<InodeNumber> {
		for i in 1..self.superblock.ninodes {
			let inumber = InodeNumber::new(i).unwrap();
			let node = inode::read(&mut self.device, &self.superblock, inumber).ok()?;
			if node.is_valid() {
				continue;
			}
			let fresh = Inode {
				isvalid: 1,
				size: 0,
				ctime: utils::util::get_timestamp().as_secs() as i64,
				direct: [0; POINTERS_PER_INODE],
				indirect: 0,
			};
			inode::write(&mut self.device, &self.superblock, inumber, &fresh).ok()?;
			return Some(inumber);
		}
		None
	}

	/// Frees every block reachable from `inumber` and zeroes its slot.
	pub fn delete(&mut self, inumber: InodeNumber) -> Result<(), Error> {
		let mut node = self.valid_inode(inumber)?;

		for d in node.direct.iter_mut() {
			if *d != 0 {
				self.bitmap.mark_free(*d);
				*d = 0;
			}
		}
		if node.indirect != 0 {
			let mut pointers = read_pointer_block(&mut self.device, node.indirect)?;
			for p in pointers.iter_mut() {
				if *p == 0 {
					break;
				}
				self.bitmap.mark_free(*p);
				*p = 0;
			}
			self.bitmap.mark_free(node.indirect);
			node.indirect = 0;
		}

		node = Inode::default();
		inode::write(&mut self.device, &self.superblock, inumber, &node)?;
		Ok(())
	}

	/// Returns the logical size of `inumber`'s file.
	pub fn size(&mut self, inumber: InodeNumber) -> Result<u32, Error> {
		Ok(self.valid_inode(inumber)?.size)
	}

	/// Reads up to `buf.len()` bytes from `inumber` starting at `offset`
	/// into `buf`, returning the number of bytes copied.
	///
	/// Clamps the request to the file's current size; fails with
	/// [`Error::OffsetPastEnd`] if `offset` is past it. Never allocates.
	pub fn read(
		&mut self,
		inumber: InodeNumber,
		buf: &mut [u8],
		offset: u32,
	) -> Result<usize, Error> {
		let node = self.valid_inode(inumber)?;
		if offset > node.size {
			return Err(Error::OffsetPastEnd);
		}
		let length = buf.len().min((node.size - offset) as usize);

		let mut done = 0usize;
		while done < length {
			let pos = offset as usize + done;
			let fb = (pos / BLOCK_SIZE) as u32;
			let in_block_off = pos % BLOCK_SIZE;
			let span = (BLOCK_SIZE - in_block_off).min(length - done);

			let phys = self.map_block(&node, fb);
			let mut block = [0u8; BLOCK_SIZE];
			self.device.read(phys, &mut block).map_err(|e| Error::Disk(e.to_string()))?;
			buf[done..done + span].copy_from_slice(&block[in_block_off..in_block_off + span]);
			done += span;
		}
		Ok(done)
	}

	/// Writes `buf` to `inumber` starting at `offset`, allocating new data
	/// blocks as needed and growing the file's recorded size.
	///
	/// Returns the number of bytes actually written, which is less than
	/// `buf.len()` only if the device ran out of free blocks mid-write — a
	/// short write is not an error.
	pub fn write(
		&mut self,
		inumber: InodeNumber,
		buf: &[u8],
		offset: u32,
	) -> Result<usize, Error> {
		let mut node = self.valid_inode(inumber)?;

		let new_end = offset as u64 + buf.len() as u64;
		let old_blocks = (node.size as u64).div_ceil(BLOCK_SIZE as u64);
		let new_blocks = new_end.div_ceil(BLOCK_SIZE as u64);
		let mut to_alloc = new_blocks.saturating_sub(old_blocks);

		// Fill direct pointers first.
		for d in node.direct.iter_mut() {
			if to_alloc == 0 {
				break;
			}
			if *d == 0 {
				match self.bitmap.find_free() {
					Some(b) => {
						self.bitmap.mark_used(b);
						*d = b;
						to_alloc -= 1;
					}
					None => break,
				}
			}
		}

		// Spill into the indirect block.
		if to_alloc > 0 {
			if node.indirect == 0 {
				match self.bitmap.find_free() {
					Some(b) => {
						self.bitmap.mark_used(b);
						self.device
							.write(b, &[0u8; BLOCK_SIZE])
							.map_err(|e| Error::Disk(e.to_string()))?;
						node.indirect = b;
					}
					None => {
						to_alloc = 0;
					}
				}
			}
			if node.indirect != 0 && to_alloc > 0 {
				let mut pointers = read_pointer_block(&mut self.device, node.indirect)?;
				for p in pointers.iter_mut() {
					if to_alloc == 0 {
						break;
					}
					if *p == 0 {
						match self.bitmap.find_free() {
							Some(b) => {
								self.bitmap.mark_used(b);
								*p = b;
								to_alloc -= 1;
							}
							None => break,
						}
					}
				}
				write_pointer_block(&mut self.device, node.indirect, &pointers)?;
			}
		}

		// Copy the caller's data into the now-allocated blocks.
		let mut done = 0usize;
		while done < buf.len() {
			let pos = offset as usize + done;
			let fb = (pos / BLOCK_SIZE) as u32;
			let in_block_off = pos % BLOCK_SIZE;
			let span = (BLOCK_SIZE - in_block_off).min(buf.len() - done);

			let phys = match self.try_map_block(&node, fb) {
				Some(p) => p,
				None => break,
			};

			if span < BLOCK_SIZE {
				let mut block = [0u8; BLOCK_SIZE];
				self.device.read(phys, &mut block).map_err(|e| Error::Disk(e.to_string()))?;
				block[in_block_off..in_block_off + span].copy_from_slice(&buf[done..done + span]);
				self.device.write(phys, &block).map_err(|e| Error::Disk(e.to_string()))?;
			} else {
				let mut block = [0u8; BLOCK_SIZE];
				block.copy_from_slice(&buf[done..done + span]);
				self.device.write(phys, &block).map_err(|e| Error::Disk(e.to_string()))?;
			}
			done += span;
		}

		let written_end = offset as u64 + done as u64;
		if written_end > node.size as u64 {
			node.size = written_end as u32;
		}
		inode::write(&mut self.device, &self.superblock, inumber, &node)?;
		Ok(done)
	}

	fn valid_inode(&mut self, inumber: InodeNumber) -> Result<Inode, Error> {
		let node = inode::read(&mut self.device, &self.superblock, inumber)?;
		inode::check_valid(&node)?;
		Ok(node)
	}

	/// Maps logical file block `fb` of `node` to a physical block number.
	///
	/// Fatal (panics) if `fb` is past the maximum file extent, if the
	/// required pointer is absent, or if the referenced block is marked
	/// free in the bitmap: any of these imply on-disk corruption, since a
	/// legitimate caller can only request blocks within `node.size`.
	fn map_block(&mut self, node: &Inode, fb: u32) -> u32 {
		assert!(
			(fb as u64) < POINTERS_PER_INODE as u64 + POINTERS_PER_BLOCK as u64,
			"logical block {fb} exceeds the maximum file extent"
		);
		let phys = if (fb as usize) < POINTERS_PER_INODE {
			node.direct[fb as usize]
		} else {
			assert!(node.indirect != 0, "missing indirect block for logical block {fb}");
			let pointers = read_pointer_block(&mut self.device, node.indirect)
				.expect("indirect block must be readable for a block within size");
			pointers[fb as usize - POINTERS_PER_INODE]
		};
		assert!(phys != 0, "missing data pointer for logical block {fb}");
		assert!(
			!self.bitmap.is_free(phys),
			"block {phys} is referenced by an inode but marked free"
		);
		phys
	}

	/// Like [`Self::map_block`], but used during `write`'s copy phase where
	/// allocation may have fallen short of `fb`'s block on a full device —
	/// that is a legitimate short write, not corruption.
	fn try_map_block(&mut self, node: &Inode, fb: u32) -> Option<u32> {
		if (fb as u64) >= POINTERS_PER_INODE as u64 + POINTERS_PER_BLOCK as u64 {
			return None;
		}
		let phys = if (fb as usize) < POINTERS_PER_INODE {
			node.direct[fb as usize]
		} else if node.indirect == 0 {
			0
		} else {
			let pointers = read_pointer_block(&mut self.device, node.indirect).ok()?;
			pointers[fb as usize - POINTERS_PER_INODE]
		};
		if phys == 0 {
			None
		} else {
			Some(phys)
		}
	}
}

fn read_pointer_block<D: Disk>(
	device: &mut D,
	block_no: u32,
) -> Result<[u32; POINTERS_PER_BLOCK], Error> {
	let mut raw = [0u8; BLOCK_SIZE];
	device.read(block_no, &mut raw).map_err(|e| Error::Disk(e.to_string()))?;
	let mut pointers = [0u32; POINTERS_PER_BLOCK];
	for (k, p) in pointers.iter_mut().enumerate() {
		*p = u32::from_le_bytes(raw[k * 4..k * 4 + 4].try_into().unwrap());
	}
	Ok(pointers)
}

fn write_pointer_block<D: Disk>(
	device: &mut D,
	block_no: u32,
	pointers: &[u32; POINTERS_PER_BLOCK],
) -> Result<(), Error> {
	let mut raw = [0u8; BLOCK_SIZE];
	for (k, p) in pointers.iter().enumerate() {
		raw[k * 4..k * 4 + 4].copy_from_slice(&p.to_le_bytes());
	}
	device.write(block_no, &raw).map_err(|e| Error::Disk(e.to_string()))
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::disk::MemDisk;

	fn fresh(nblocks: u32) -> FileSystem<MemDisk> {
		let device = FileSystem::format(MemDisk::new(nblocks)).unwrap();
		FileSystem::mount(device).unwrap()
	}

	#[test]
	fn format_then_mount_100_blocks() {
		let fs = fresh(100);
		assert_eq!(fs.superblock.nblocks, 100);
		assert_eq!(fs.superblock.ninodeblocks, 10);
		assert_eq!(fs.superblock.ninodes, 1280);
	}

	#[test]
	fn sequential_create_returns_increasing_inumbers() {
		let mut fs = fresh(100);
		assert_eq!(fs.create().unwrap().get(), 1);
		assert_eq!(fs.create().unwrap().get(), 2);
		assert_eq!(fs.size(InodeNumber::new(1).unwrap()).unwrap(), 0);
	}

	#[test]
	fn direct_block_round_trip() {
		let mut fs = fresh(100);
		let ino = fs.create().unwrap();
		let data = vec![b'A'; 5000];
		let mut out = vec![0u8; 5000];

		assert_eq!(fs.write(ino, &data, 0).unwrap(), 5000);
		assert_eq!(fs.size(ino).unwrap(), 5000);
		assert_eq!(fs.read(ino, &mut out, 0).unwrap(), 5000);
		assert_eq!(out, data);
	}

	#[test]
	fn append_preserves_earlier_bytes() {
		let mut fs = fresh(100);
		let ino = fs.create().unwrap();
		fs.write(ino, &vec![b'A'; 5000], 0).unwrap();
		assert_eq!(fs.write(ino, &vec![b'B'; 4096], 5000).unwrap(), 4096);
		assert_eq!(fs.size(ino).unwrap(), 9096);

		let mut out = vec![0u8; 9096];
		fs.read(ino, &mut out, 0).unwrap();
		assert!(out[0..5000].iter().all(|&b| b == b'A'));
		assert!(out[5000..9096].iter().all(|&b| b == b'B'));
	}

	#[test]
	fn large_write_spills_into_indirect_block() {
		let mut fs = fresh(100);
		let ino = fs.create().unwrap();
		let data = vec![0u8; BLOCK_SIZE * 4];
		assert_eq!(fs.write(ino, &data, 0).unwrap(), data.len());

		let node = fs.valid_inode(ino).unwrap();
		assert!(node.direct.iter().all(|&d| d != 0));
		assert_ne!(node.indirect, 0);
		let pointers = read_pointer_block(&mut fs.device, node.indirect).unwrap();
		assert_ne!(pointers[0], 0);
		assert_eq!(pointers[1], 0);
	}

	#[test]
	fn delete_releases_blocks_and_inumber_is_reused() {
		let mut fs = fresh(100);
		let ino = fs.create().unwrap();
		fs.write(ino, &vec![b'A'; 5000], 0).unwrap();

		fs.delete(ino).unwrap();
		assert_eq!(fs.size(ino).unwrap_err(), Error::InvalidInodeSlot);
		assert_eq!(fs.create().unwrap(), ino);
	}

	#[test]
	fn read_past_end_fails() {
		let mut fs = fresh(100);
		let ino = fs.create().unwrap();
		fs.write(ino, &vec![b'A'; 10], 0).unwrap();
		let mut out = vec![0u8; 10];
		assert_eq!(fs.read(ino, &mut out, 11).unwrap_err(), Error::OffsetPastEnd);
	}

	#[test]
	fn read_clamps_to_remaining_size() {
		let mut fs = fresh(100);
		let ino = fs.create().unwrap();
		fs.write(ino, &vec![b'A'; 10], 0).unwrap();
		let mut out = vec![0u8; 100];
		assert_eq!(fs.read(ino, &mut out, 5).unwrap(), 5);
	}

	#[test]
	fn allocated_blocks_stay_in_reservation_range() {
		let mut fs = fresh(100);
		let ino = fs.create().unwrap();
		fs.write(ino, &vec![0u8; BLOCK_SIZE * 4], 0).unwrap();
		let node = fs.valid_inode(ino).unwrap();
		let data_start = fs.superblock.ninodeblocks + 1;
		for &d in &node.direct {
			assert!(d >= data_start && d < fs.superblock.nblocks);
		}
	}

	#[test]
	fn format_on_unmounted_device_is_idempotent() {
		let device = FileSystem::format(MemDisk::new(64)).unwrap();
		let device = FileSystem::format(device).unwrap();
		assert!(FileSystem::mount(device).is_ok());
	}
}
