//! Fixed-size inode records.
//!
//! An inode occupies exactly one object slot; reads and writes go through
//! [`SegmentStore`] the same way a data block does, since the inode
//! segments and data segments differ only in which pool they belong to.

use crate::bitmap;
use crate::consts::{BLOCK_SIZE, DIRECT_POINTERS, NULL_BLOCK, SLOTS_PER_SEGMENT};
use crate::error::{Error, Result};
use crate::segment::{SegmentKind, SegmentStore};

/// The type tag stored in an inode record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeType {
	Free,
	Regular,
	Directory,
}

impl InodeType {
	fn to_u32(self) -> u32 {
		match self {
			InodeType::Free => 0,
			InodeType::Regular => 1,
			InodeType::Directory => 2,
		}
	}

	fn from_u32(v: u32) -> Result<Self> {
		match v {
			0 => Ok(InodeType::Free),
			1 => Ok(InodeType::Regular),
			2 => Ok(InodeType::Directory),
			other => Err(Error::Corruption(format!("invalid inode type {other}"))),
		}
	}
}

/// In-memory view of one inode record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inode {
	pub kind: InodeType,
	pub size: u64,
	pub direct: [u32; DIRECT_POINTERS],
	pub single_indirect: u32,
	pub double_indirect: u32,
	pub triple_indirect: u32,
}

impl Inode {
	/// A freshly zeroed record with no allocated blocks.
	pub fn free() -> Self {
		Self {
			kind: InodeType::Free,
			size: 0,
			direct: [NULL_BLOCK; DIRECT_POINTERS],
			single_indirect: NULL_BLOCK,
			double_indirect: NULL_BLOCK,
			triple_indirect: NULL_BLOCK,
		}
	}

	/// A new, empty regular file record.
	pub fn new_regular() -> Self {
		Self {
			kind: InodeType::Regular,
			..Self::free()
		}
	}

	/// A new, empty directory record (caller still has to populate its
	/// first data block with the `.`/`..` entries; see `directory::init_directory`).
	pub fn new_directory() -> Self {
		Self {
			kind: InodeType::Directory,
			..Self::free()
		}
	}

	pub(crate) fn encode(&self) -> [u8; BLOCK_SIZE] {
		let mut buf = [0u8; BLOCK_SIZE];
		buf[0..4].copy_from_slice(&self.kind.to_u32().to_le_bytes());
		buf[4..12].copy_from_slice(&self.size.to_le_bytes());
		let mut off = 12;
		for ptr in &self.direct {
			buf[off..off + 4].copy_from_slice(&ptr.to_le_bytes());
			off += 4;
		}
		buf[off..off + 4].copy_from_slice(&self.single_indirect.to_le_bytes());
		off += 4;
		buf[off..off + 4].copy_from_slice(&self.double_indirect.to_le_bytes());
		off += 4;
		buf[off..off + 4].copy_from_slice(&self.triple_indirect.to_le_bytes());
		buf
	}

	pub(crate) fn decode(buf: &[u8; BLOCK_SIZE]) -> Result<Self> {
		let kind = InodeType::from_u32(u32::from_le_bytes(buf[0..4].try_into().unwrap()))?;
		let size = u64::from_le_bytes(buf[4..12].try_into().unwrap());
		let mut direct = [0u32; DIRECT_POINTERS];
		let mut off = 12;
		for slot in &mut direct {
			*slot = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
			off += 4;
		}
		let single_indirect = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
		off += 4;
		let double_indirect = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
		off += 4;
		let triple_indirect = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
		Ok(Self {
			kind,
			size,
			direct,
			single_indirect,
			double_indirect,
			triple_indirect,
		})
	}
}

fn locate(num: u32) -> (u32, u32) {
	(num / SLOTS_PER_SEGMENT, num % SLOTS_PER_SEGMENT)
}

/// Reads the inode numbered `num`.
pub fn read(store: &SegmentStore, num: u32) -> Result<Inode> {
	let (seg, idx) = locate(num);
	let buf = store.read_block(SegmentKind::Inode, seg, idx)?;
	Inode::decode(&buf)
}

/// Overwrites the inode numbered `num`.
pub fn write(store: &SegmentStore, num: u32, inode: &Inode) -> Result<()> {
	let (seg, idx) = locate(num);
	store.write_block(SegmentKind::Inode, seg, idx, &inode.encode())
}

/// Draws a fresh inode number from the allocator and initializes its slot
/// to a zeroed, free-typed record.
pub fn allocate(store: &SegmentStore) -> Result<u32> {
	let num = bitmap::allocate(store, SegmentKind::Inode)?;
	write(store, num, &Inode::free())?;
	Ok(num)
}

/// Writes back a zeroed (free-typed) record and returns the number to the
/// allocator.
pub fn free(store: &SegmentStore, num: u32) -> Result<()> {
	write(store, num, &Inode::free())?;
	bitmap::free(store, SegmentKind::Inode, num)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn store() -> (tempfile::TempDir, SegmentStore) {
		let dir = tempfile::tempdir().unwrap();
		let store = SegmentStore::new(dir.path());
		(dir, store)
	}

	#[test]
	fn allocate_then_read_is_free_typed() {
		let (_d, store) = store();
		let num = allocate(&store).unwrap();
		let inode = read(&store, num).unwrap();
		assert_eq!(inode.kind, InodeType::Free);
		assert_eq!(inode.direct, [NULL_BLOCK; DIRECT_POINTERS]);
	}

	#[test]
	fn write_then_read_round_trips() {
		let (_d, store) = store();
		let num = allocate(&store).unwrap();
		let mut inode = Inode::new_regular();
		inode.size = 4096 * 3 + 17;
		inode.direct[0] = 5;
		inode.single_indirect = 9;
		write(&store, num, &inode).unwrap();
		let back = read(&store, num).unwrap();
		assert_eq!(inode, back);
	}

	#[test]
	fn corrupt_type_is_rejected() {
		let (_d, store) = store();
		let num = allocate(&store).unwrap();
		let mut buf = Inode::free().encode();
		buf[0..4].copy_from_slice(&7u32.to_le_bytes());
		let (seg, idx) = locate(num);
		store.write_block(SegmentKind::Inode, seg, idx, &buf).unwrap();
		assert!(matches!(read(&store, num), Err(Error::Corruption(_))));
	}

	#[test]
	fn free_then_allocate_reuses_number() {
		let (_d, store) = store();
		let a = allocate(&store).unwrap();
		let b = allocate(&store).unwrap();
		free(&store, b).unwrap();
		let c = allocate(&store).unwrap();
		assert_eq!(b, c);
		let _ = a;
	}
}
