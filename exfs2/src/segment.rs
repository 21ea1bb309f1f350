//! Segment store: maps `(kind, segment index, slot index)` to bytes in host
//! files.
//!
//! A segment file is always exactly [`SEGMENT_SIZE`] bytes: the first block
//! is the bitmap, the remaining [`SLOTS_PER_SEGMENT`] blocks are object
//! slots. File handles are opened, used, and dropped within a single call —
//! there is no process-wide cache of open handles.

use crate::consts::{BLOCK_SIZE, SEGMENT_SIZE, SLOTS_PER_SEGMENT};
use crate::error::Result;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// The two kinds of segment, each with its own allocation pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
	Inode,
	Data,
}

impl SegmentKind {
	/// File name prefix for segments of this kind.
	fn prefix(self) -> &'static str {
		match self {
			SegmentKind::Inode => "inode_",
			SegmentKind::Data => "data_",
		}
	}
}

/// A handle onto the directory holding a store's segment files.
///
/// Owns no open file descriptors and no mutable counters; every call
/// computes the file it needs and opens it for the duration of the call.
#[derive(Debug, Clone)]
pub struct SegmentStore {
	root: PathBuf,
}

impl SegmentStore {
	/// Creates a handle rooted at `root`. Does not touch the filesystem.
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	/// Directory holding this store's segment files.
	pub fn root(&self) -> &Path {
		&self.root
	}

	fn segment_path(&self, kind: SegmentKind, seg: u32) -> PathBuf {
		self.root.join(format!("{}{}", kind.prefix(), seg))
	}

	/// Reads object slot `idx` (`idx < SLOTS_PER_SEGMENT`) of segment `seg`.
	///
	/// Fails with [`crate::Error::Io`] wrapping `NotFound` if the segment
	/// file does not exist, and with an `UnexpectedEof`-flavoured I/O error
	/// if the file is shorter than required.
	pub fn read_block(&self, kind: SegmentKind, seg: u32, idx: u32) -> Result<[u8; BLOCK_SIZE]> {
		debug_assert!(idx < SLOTS_PER_SEGMENT);
		let offset = (1 + idx as u64) * BLOCK_SIZE as u64;
		self.read_at(kind, seg, offset)
	}

	/// Writes object slot `idx` of segment `seg`, creating the segment file
	/// (zero-filled to [`SEGMENT_SIZE`]) if it does not already exist.
	pub fn write_block(
		&self,
		kind: SegmentKind,
		seg: u32,
		idx: u32,
		bytes: &[u8; BLOCK_SIZE],
	) -> Result<()> {
		debug_assert!(idx < SLOTS_PER_SEGMENT);
		let offset = (1 + idx as u64) * BLOCK_SIZE as u64;
		self.write_at(kind, seg, offset, bytes)
	}

	/// Reads the bitmap block (slot 0 of the file) of segment `seg`.
	pub fn read_bitmap(&self, kind: SegmentKind, seg: u32) -> Result<[u8; BLOCK_SIZE]> {
		self.read_at(kind, seg, 0)
	}

	/// Writes the bitmap block of segment `seg`, creating the segment file
	/// if it does not already exist.
	pub fn write_bitmap(&self, kind: SegmentKind, seg: u32, bytes: &[u8; BLOCK_SIZE]) -> Result<()> {
		self.write_at(kind, seg, 0, bytes)
	}

	fn read_at(&self, kind: SegmentKind, seg: u32, offset: u64) -> Result<[u8; BLOCK_SIZE]> {
		let path = self.segment_path(kind, seg);
		let mut file = File::open(&path)?;
		file.seek(SeekFrom::Start(offset))?;
		let mut buf = [0u8; BLOCK_SIZE];
		file.read_exact(&mut buf)?;
		Ok(buf)
	}

	fn write_at(&self, kind: SegmentKind, seg: u32, offset: u64, bytes: &[u8; BLOCK_SIZE]) -> Result<()> {
		let path = self.segment_path(kind, seg);
		let mut file = OpenOptions::new()
			.read(true)
			.write(true)
			.create(true)
			.open(&path)?;
		let len = file.metadata()?.len();
		if len < SEGMENT_SIZE {
			file.set_len(SEGMENT_SIZE)?;
		}
		file.seek(SeekFrom::Start(offset))?;
		file.write_all(bytes)?;
		Ok(())
	}
}
