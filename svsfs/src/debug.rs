//! The diagnostic report: prints the superblock and, for each valid inode,
//! its size, creation time, and block pointers. Read-only; requires only a
//! valid superblock, not a live mount.

use crate::disk::Disk;
use crate::inode;
use crate::inode::InodeNumber;
use crate::superblock;
use crate::superblock::Superblock;
use crate::Error;
use crate::POINTERS_PER_BLOCK;
use std::fmt;
use std::fmt::Write as _;

/// One inode's worth of detail in a [`DebugReport`].
pub struct InodeReport {
	/// The inode this entry describes.
	pub inumber: InodeNumber,
	/// Logical file size in bytes.
	pub size: u32,
	/// Creation time, rendered `Www Mmm dd HH:MM:SS YYYY` in local time.
	pub ctime: String,
	/// Nonzero direct block numbers, in `direct[]` order.
	pub direct: Vec<u32>,
	/// The indirect block number and its nonzero pointers, if any.
	pub indirect: Option<(u32, Vec<u32>)>,
}

/// The full diagnostic report produced by [`report`].
pub struct DebugReport {
	/// The filesystem's geometry.
	pub superblock: Superblock,
	/// One entry per valid inode, in inumber order.
	pub inodes: Vec<InodeReport>,
}

impl fmt::Display for DebugReport {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		writeln!(f, "superblock:")?;
		writeln!(f, "    {} blocks", self.superblock.nblocks)?;
		writeln!(f, "    {} inode blocks", self.superblock.ninodeblocks)?;
		writeln!(f, "    {} inodes", self.superblock.ninodes)?;
		for entry in &self.inodes {
			writeln!(f, "inode {}:", entry.inumber)?;
			writeln!(f, "    size: {} bytes", entry.size)?;
			writeln!(f, "    created: {}", entry.ctime)?;
			if !entry.direct.is_empty() {
				let mut blocks = String::new();
				for b in &entry.direct {
					let _ = write!(blocks, " {b}");
				}
				writeln!(f, "    direct blocks:{blocks}")?;
			}
			if let Some((indirect, pointers)) = &entry.indirect {
				let mut rendered = String::new();
				for p in pointers {
					let _ = write!(rendered, " {p}");
				}
				writeln!(f, "    indirect block: {indirect}")?;
				writeln!(f, "    indirect data blocks:{rendered}")?;
			}
		}
		Ok(())
	}
}

/// Builds the diagnostic report for the filesystem on `device`.
///
/// Requires only that block 0 holds a valid superblock: unlike every other
/// operation in this crate, `debug` does not require a live mount.
pub fn report<D: Disk>(device: &mut D) -> Result<DebugReport, Error> {
	let sb = superblock::read(device)?;
	sb.validate()?;

	let mut inodes = Vec::new();
	for i in 1..sb.ninodes {
		let inumber = InodeNumber::new(i).unwrap();
		let node = inode::read(device, &sb, inumber)?;
		if !node.is_valid() {
			continue;
		}
		let direct = node.direct.iter().copied().filter(|&d| d != 0).collect();
		let indirect = if node.indirect != 0 {
			let mut raw = [0u8; crate::BLOCK_SIZE];
			device.read(node.indirect, &mut raw).map_err(|e| Error::Disk(e.to_string()))?;
			let mut pointers = Vec::new();
			for k in 0..POINTERS_PER_BLOCK {
				let p = u32::from_le_bytes(raw[k * 4..k * 4 + 4].try_into().unwrap());
				if p == 0 {
					break;
				}
				pointers.push(p);
			}
			Some((node.indirect, pointers))
		} else {
			None
		};
		inodes.push(InodeReport {
			inumber,
			size: node.size,
			ctime: format_ctime(node.ctime),
			direct,
			indirect,
		});
	}

	Ok(DebugReport {
		superblock: sb,
		inodes,
	})
}

/// Renders `secs` (seconds since the Unix epoch) as `ctime(3)` does in the
/// local timezone: `Www Mmm dd HH:MM:SS YYYY`.
fn format_ctime(secs: i64) -> String {
	unsafe {
		let time: libc::time_t = secs as libc::time_t;
		let mut tm: libc::tm = std::mem::zeroed();
		libc::localtime_r(&time, &mut tm);

		let mut buf = [0i8; 32];
		// "%a %b %e %H:%M:%S %Y" matches ctime(3)'s format exactly, including
		// the space-padded day-of-month.
		let fmt = c"%a %b %e %H:%M:%S %Y";
		let len = libc::strftime(buf.as_mut_ptr(), buf.len(), fmt.as_ptr(), &tm);
		let bytes: Vec<u8> = buf[..len].iter().map(|&c| c as u8).collect();
		String::from_utf8_lossy(&bytes).into_owned()
	}
}
