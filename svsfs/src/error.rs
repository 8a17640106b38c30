//! Recoverable error kinds returned by filesystem operations.
//!
//! Conditions that instead indicate on-disk corruption (a null pointer where
//! one must exist, a block marked free while still referenced, a logical
//! block index past the maximum file extent) are not represented here: they
//! abort the process at the call site that detects them, since continuing
//! would silently return garbage data. See [`crate::fs`] for those asserts.

use thiserror::Error;

/// A recoverable filesystem error.
///
/// Every variant corresponds to one of the recoverable kinds in the design:
/// a legitimate but wrong caller can trigger any of these without implying
/// corruption.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
	/// An operation requiring a mount was attempted on an unmounted device.
	#[error("filesystem not mounted")]
	NotMounted,
	/// [`crate::fs::format`] was attempted on a device that is still mounted.
	#[error("filesystem already mounted")]
	AlreadyMounted,
	/// The superblock's magic number did not match [`crate::BLOCK_MAGIC`].
	#[error("bad magic number")]
	BadMagic,
	/// The superblock describes zero inodes or zero blocks.
	#[error("empty filesystem")]
	EmptyFilesystem,
	/// Named for parity with the design's error taxonomy. In this API
	/// [`crate::fs::FileSystem::create`] surfaces the same condition as
	/// `None` rather than this variant, matching its `inumber | 0` contract.
	#[error("no free inode")]
	NoFreeInode,
	/// An inumber was out of the valid `[1, ninodes)` range.
	#[error("invalid inumber")]
	InvalidInumber,
	/// An inumber refers to a slot with `isvalid == 0`.
	#[error("invalid inode slot")]
	InvalidInodeSlot,
	/// A read was attempted at an offset past the inode's current size.
	#[error("offset past end of file")]
	OffsetPastEnd,
	/// The underlying block device reported an I/O error.
	#[error("disk I/O error: {0}")]
	Disk(String),
}
