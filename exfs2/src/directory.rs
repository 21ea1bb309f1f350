//! Directory contents: a sequence of fixed-size entries packed into data
//! blocks reached through the block map.
//!
//! Iteration never consults an inode's `size` field — it walks logical
//! blocks through the block map until one comes back unallocated, which is
//! always contiguous because `add_entry` only grows a directory by
//! appending a new block when every existing one is full.

use crate::blockmap;
use crate::consts::{
	ENTRIES_PER_BLOCK, ENTRY_RECORD_SIZE, MAX_NAME_LEN, NAME_FIELD_LEN, NULL_BLOCK, NULL_INODE,
};
use crate::error::{Error, Result};
use crate::inode::{self, Inode};
use crate::segment::SegmentStore;

/// One live or unused directory entry slot.
#[derive(Debug, Clone)]
pub struct DirEntry {
	pub inode: u32,
	pub name: String,
}

impl DirEntry {
	fn empty() -> Self {
		Self {
			inode: NULL_INODE,
			name: String::new(),
		}
	}

	fn is_used(&self) -> bool {
		self.inode != NULL_INODE
	}

	fn encode(&self) -> [u8; ENTRY_RECORD_SIZE] {
		let mut buf = [0u8; ENTRY_RECORD_SIZE];
		buf[0..4].copy_from_slice(&self.inode.to_le_bytes());
		let name_bytes = self.name.as_bytes();
		let len = name_bytes.len().min(MAX_NAME_LEN);
		buf[4..4 + len].copy_from_slice(&name_bytes[..len]);
		buf
	}

	fn decode(buf: &[u8]) -> Self {
		let inode = u32::from_le_bytes(buf[0..4].try_into().unwrap());
		let name_field = &buf[4..4 + NAME_FIELD_LEN];
		let end = name_field.iter().position(|&b| b == 0).unwrap_or(name_field.len());
		let name = String::from_utf8_lossy(&name_field[..end]).into_owned();
		Self { inode, name }
	}
}

fn decode_block(buf: &[u8; crate::consts::BLOCK_SIZE]) -> Vec<DirEntry> {
	(0..ENTRIES_PER_BLOCK)
		.map(|i| DirEntry::decode(&buf[i * ENTRY_RECORD_SIZE..(i + 1) * ENTRY_RECORD_SIZE]))
		.collect()
}

fn encode_block(entries: &[DirEntry]) -> [u8; crate::consts::BLOCK_SIZE] {
	let mut buf = [0u8; crate::consts::BLOCK_SIZE];
	for (i, entry) in entries.iter().enumerate() {
		let rec = entry.encode();
		buf[i * ENTRY_RECORD_SIZE..(i + 1) * ENTRY_RECORD_SIZE].copy_from_slice(&rec);
	}
	buf
}

fn read_block(store: &SegmentStore, global: u32) -> Result<Vec<DirEntry>> {
	let buf = blockmap::read_data_block(store, global)?;
	Ok(decode_block(&buf))
}

fn write_block(store: &SegmentStore, global: u32, entries: &[DirEntry]) -> Result<()> {
	blockmap::write_data_block(store, global, &encode_block(entries))
}

fn validate_name(name: &str) -> Result<()> {
	if name.is_empty() || name.len() > MAX_NAME_LEN || name.contains('/') {
		return Err(Error::InvalidName);
	}
	Ok(())
}

/// Scans every directory block of `dir` for an entry named `name`.
pub fn lookup(store: &SegmentStore, dir: &Inode, name: &str) -> Result<Option<u32>> {
	let mut logical = 0u64;
	loop {
		let phys = blockmap::read_logical(store, dir, logical)?;
		if phys == NULL_BLOCK {
			return Ok(None);
		}
		let entries = read_block(store, phys)?;
		if let Some(e) = entries.iter().find(|e| e.is_used() && e.name == name) {
			return Ok(Some(e.inode));
		}
		logical += 1;
	}
}

/// Every live entry of `dir`, in on-disk order, including `.` and `..`.
pub fn iter_entries(store: &SegmentStore, dir: &Inode) -> Result<Vec<DirEntry>> {
	let mut out = Vec::new();
	let mut logical = 0u64;
	loop {
		let phys = blockmap::read_logical(store, dir, logical)?;
		if phys == NULL_BLOCK {
			return Ok(out);
		}
		out.extend(read_block(store, phys)?.into_iter().filter(DirEntry::is_used));
		logical += 1;
	}
}

/// Adds a new entry `name -> child` to `dir`, refusing duplicates. Appends
/// a new block if every existing block is packed. Persists `dir_num`'s
/// inode record (its `size` grows by one entry record) before returning.
pub fn add_entry(
	store: &SegmentStore,
	dir_num: u32,
	dir: &mut Inode,
	name: &str,
	child: u32,
) -> Result<()> {
	validate_name(name)?;
	if lookup(store, dir, name)?.is_some() {
		return Err(Error::AlreadyExists);
	}

	let mut logical = 0u64;
	loop {
		let phys = blockmap::read_logical(store, dir, logical)?;
		if phys == NULL_BLOCK {
			let phys = blockmap::write_logical(store, dir, logical)?;
			inode::write(store, dir_num, dir)?;
			let mut entries = vec![DirEntry::empty(); ENTRIES_PER_BLOCK];
			entries[0] = DirEntry {
				inode: child,
				name: name.to_string(),
			};
			write_block(store, phys, &entries)?;
			break;
		}
		let mut entries = read_block(store, phys)?;
		if let Some(slot) = entries.iter().position(|e| !e.is_used()) {
			entries[slot] = DirEntry {
				inode: child,
				name: name.to_string(),
			};
			write_block(store, phys, &entries)?;
			break;
		}
		logical += 1;
	}

	dir.size += ENTRY_RECORD_SIZE as u64;
	inode::write(store, dir_num, dir)
}

/// Clears the entry named `name`. Does not compact the block and does not
/// free it even if it becomes entirely empty.
pub fn remove_entry(store: &SegmentStore, dir_num: u32, dir: &mut Inode, name: &str) -> Result<()> {
	let mut logical = 0u64;
	loop {
		let phys = blockmap::read_logical(store, dir, logical)?;
		if phys == NULL_BLOCK {
			return Err(Error::NotFound);
		}
		let mut entries = read_block(store, phys)?;
		if let Some(slot) = entries.iter().position(|e| e.is_used() && e.name == name) {
			entries[slot] = DirEntry::empty();
			write_block(store, phys, &entries)?;
			dir.size = dir.size.saturating_sub(ENTRY_RECORD_SIZE as u64);
			inode::write(store, dir_num, dir)?;
			return Ok(());
		}
		logical += 1;
	}
}

/// Writes the `.`/`..` self-entries into an already-allocated block. Used
/// both for ordinary subdirectories and for bootstrapping the root.
pub fn write_self_entries(store: &SegmentStore, block: u32, self_num: u32, parent_num: u32) -> Result<()> {
	let mut entries = vec![DirEntry::empty(); ENTRIES_PER_BLOCK];
	entries[0] = DirEntry {
		inode: self_num,
		name: ".".to_string(),
	};
	entries[1] = DirEntry {
		inode: parent_num,
		name: "..".to_string(),
	};
	write_block(store, block, &entries)
}

/// Allocates a directory's first data block and populates it with `.` and
/// `..`. Returns the allocated block number.
pub fn init_directory(store: &SegmentStore, dir_num: u32, dir: &mut Inode, parent_num: u32) -> Result<u32> {
	let block = blockmap::write_logical(store, dir, 0)?;
	// persisted before populating the block so a failure below still
	// leaves the on-disk inode pointing at the block just allocated, for
	// `free_subtree` to reclaim it.
	inode::write(store, dir_num, dir)?;
	write_self_entries(store, block, dir_num, parent_num)?;
	dir.size = 2 * ENTRY_RECORD_SIZE as u64;
	inode::write(store, dir_num, dir)?;
	Ok(block)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::inode::InodeType;

	fn store() -> (tempfile::TempDir, SegmentStore) {
		let dir = tempfile::tempdir().unwrap();
		let store = SegmentStore::new(dir.path());
		(dir, store)
	}

	fn new_dir(store: &SegmentStore, num: u32, parent: u32) -> Inode {
		let mut dir = Inode::new_directory();
		init_directory(store, num, &mut dir, parent).unwrap();
		dir
	}

	#[test]
	fn self_entries_resolve_to_self_and_parent() {
		let (_d, store) = store();
		let dir = new_dir(&store, 5, 1);
		assert_eq!(lookup(&store, &dir, ".").unwrap(), Some(5));
		assert_eq!(lookup(&store, &dir, "..").unwrap(), Some(1));
	}

	#[test]
	fn add_then_lookup() {
		let (_d, store) = store();
		let mut dir = new_dir(&store, 5, 5);
		add_entry(&store, 5, &mut dir, "readme", 42).unwrap();
		assert_eq!(lookup(&store, &dir, "readme").unwrap(), Some(42));
	}

	#[test]
	fn duplicate_name_is_refused() {
		let (_d, store) = store();
		let mut dir = new_dir(&store, 5, 5);
		add_entry(&store, 5, &mut dir, "a", 42).unwrap();
		let err = add_entry(&store, 5, &mut dir, "a", 43).unwrap_err();
		assert!(matches!(err, Error::AlreadyExists));
	}

	#[test]
	fn remove_then_readd_reuses_slot_in_place() {
		let (_d, store) = store();
		let mut dir = new_dir(&store, 5, 5);
		add_entry(&store, 5, &mut dir, "a", 42).unwrap();
		remove_entry(&store, 5, &mut dir, "a").unwrap();
		assert_eq!(lookup(&store, &dir, "a").unwrap(), None);
		add_entry(&store, 5, &mut dir, "b", 43).unwrap();
		assert_eq!(lookup(&store, &dir, "b").unwrap(), Some(43));
	}

	#[test]
	fn directory_spills_into_a_second_block() {
		let (_d, store) = store();
		let mut dir = new_dir(&store, 5, 5);
		// ENTRIES_PER_BLOCK - 2 slots remain in block 0 after "." and "..".
		let capacity = ENTRIES_PER_BLOCK - 2;
		for i in 0..capacity {
			add_entry(&store, 5, &mut dir, &format!("f{i}"), 100 + i as u32).unwrap();
		}
		assert_eq!(blockmap::read_logical(&store, &dir, 1).unwrap(), NULL_BLOCK);
		add_entry(&store, 5, &mut dir, "overflow", 999).unwrap();
		assert_ne!(blockmap::read_logical(&store, &dir, 1).unwrap(), NULL_BLOCK);
		assert_eq!(lookup(&store, &dir, "overflow").unwrap(), Some(999));
	}

	#[test]
	fn iter_entries_skips_unused_slots() {
		let (_d, store) = store();
		let mut dir = new_dir(&store, 5, 5);
		add_entry(&store, 5, &mut dir, "a", 10).unwrap();
		add_entry(&store, 5, &mut dir, "b", 11).unwrap();
		remove_entry(&store, 5, &mut dir, "a").unwrap();
		let names: Vec<_> = iter_entries(&store, &dir)
			.unwrap()
			.into_iter()
			.map(|e| e.name)
			.collect();
		assert!(names.contains(&"b".to_string()));
		assert!(!names.contains(&"a".to_string()));
	}

	#[test]
	fn rejects_invalid_names() {
		let (_d, store) = store();
		let mut dir = new_dir(&store, 5, 5);
		assert!(matches!(
			add_entry(&store, 5, &mut dir, "", 1),
			Err(Error::InvalidName)
		));
		assert!(matches!(
			add_entry(&store, 5, &mut dir, "a/b", 1),
			Err(Error::InvalidName)
		));
	}

	#[test]
	fn two_hundred_fifty_six_siblings_all_enumerate_once() {
		let (_d, store) = store();
		let mut dir = new_dir(&store, 5, 5);
		for i in 0..256 {
			add_entry(&store, 5, &mut dir, &format!("file{i}"), 1000 + i as u32).unwrap();
		}
		let names: Vec<_> = iter_entries(&store, &dir)
			.unwrap()
			.into_iter()
			.filter(|e| e.name != "." && e.name != "..")
			.map(|e| e.name)
			.collect();
		assert_eq!(names.len(), 256);
		let mut unique = names.clone();
		unique.sort();
		unique.dedup();
		assert_eq!(unique.len(), 256);
		let _ = InodeType::Directory;
	}
}
