//! `mkfs.svsfs` formats a device with a fresh SVSFS filesystem, and, given
//! `--debug`, prints the diagnostic report for an existing one instead.
//!
//! This is a one-shot tool, not a shell: it performs exactly one operation
//! per invocation and exits, following this codebase's `mkfs` convention,
//! including its "a filesystem is already present, proceed anyway?"
//! confirmation prompt.

use std::env;
use std::path::PathBuf;
use std::process::exit;
use svsfs::disk::Disk;
use svsfs::disk::FileDisk;
use svsfs::fs::FileSystem;
use svsfs::superblock;
use utils::error;
use utils::prompt::prompt;

struct Args {
	debug: bool,
	device_path: Option<PathBuf>,
}

fn parse_args() -> Args {
	let mut args = Args {
		debug: false,
		device_path: None,
	};
	for arg in env::args().skip(1) {
		match arg.as_str() {
			"--debug" => args.debug = true,
			_ => args.device_path = Some(PathBuf::from(arg)),
		}
	}
	args
}

fn main() {
	let args = parse_args();
	let device_path = args.device_path.unwrap_or_else(|| {
		error("mkfs.svsfs", "specify path to a device");
	});

	let mut disk = FileDisk::open(&device_path).unwrap_or_else(|e| {
		error("mkfs.svsfs", format_args!("{}: {e}", device_path.display()));
	});

	if args.debug {
		let report = svsfs::debug::report(&mut disk).unwrap_or_else(|e| {
			error("mkfs.svsfs", format_args!("{}: {e}", device_path.display()));
		});
		print!("{report}");
		return;
	}

	let already_present = superblock::read(&mut disk)
		.map(|sb| sb.validate().is_ok())
		.unwrap_or(false);
	if already_present {
		println!("{} already contains an SVSFS filesystem", device_path.display());
		let confirm = prompt(Some("Proceed anyway? (y/N) "), false)
			.map(|s| s.to_lowercase() == "y")
			.unwrap_or(false);
		if !confirm {
			eprintln!("Abort.");
			exit(1);
		}
	}

	let nblocks = disk.nblocks();
	FileSystem::format(disk).unwrap_or_else(|e| {
		error("mkfs.svsfs", format_args!("failed to create filesystem: {e}"));
	});

	let size = utils::util::ByteSize(nblocks as u64 * svsfs::BLOCK_SIZE as u64);
	println!("{}: formatted {size} as SVSFS", device_path.display());
}
