//! SVSFS — a small Unix-style filesystem storing a flat population of
//! numbered inodes on a fixed-size block device.
//!
//! This crate implements the CORE of that filesystem: the on-disk layout,
//! the mount/format lifecycle, the free-block bitmap reconstructed from disk
//! state on every mount, inode allocation and deletion, and the read/write
//! paths that traverse direct and indirect block pointers. It has no
//! concept of names, directories, permissions, or hard links, and it
//! implements no hierarchical layer above inodes — see [`fs::FileSystem`]
//! for the full operation set.
//!
//! The block device itself is an external collaborator: [`disk::Disk`]
//! states the interface this crate consumes, with [`disk::MemDisk`] and
//! [`disk::FileDisk`] as the two concrete implementations this repository
//! ships (for tests and for the `mkfs-svsfs` CLI, respectively).

pub mod bitmap;
pub mod debug;
pub mod disk;
mod error;
pub mod fs;
pub mod inode;
pub mod superblock;

pub use error::Error;
pub use fs::FileSystem;

/// Bytes per disk block. Every read or write on a [`disk::Disk`] is exactly
/// one block.
pub const BLOCK_SIZE: usize = 4096;

/// Magic number identifying a valid SVSFS superblock.
pub const BLOCK_MAGIC: u32 = 0x34341023;

/// Number of inode slots packed into one inode-table block.
pub const INODES_PER_BLOCK: usize = 128;

/// Number of direct block pointers carried in each inode.
pub const POINTERS_PER_INODE: usize = 3;

/// Number of block pointers packed into one indirect block.
pub const POINTERS_PER_BLOCK: usize = BLOCK_SIZE / 4;
