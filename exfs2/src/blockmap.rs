//! Logical-to-physical block translation through direct and indirect
//! pointers.
//!
//! Indirect blocks are themselves data blocks, storing [`POINTERS_PER_INDIRECT`]
//! little-endian `u32` block numbers. The read path never allocates; the
//! write path allocates on demand and rolls back any block it allocated at
//! a level that ends up failing further down the chain.

use crate::bitmap;
use crate::consts::{
	BLOCK_SIZE, DIRECT_LIMIT, DOUBLE_LIMIT, NULL_BLOCK, POINTERS_PER_INDIRECT, SINGLE_LIMIT,
	SLOTS_PER_SEGMENT, TRIPLE_LIMIT,
};
use crate::error::{Error, Result};
use crate::inode::Inode;
use crate::segment::{SegmentKind, SegmentStore};

/// Which pointer field(s) a logical block index falls under.
enum Locator {
	Direct(usize),
	Single(usize),
	Double(usize, usize),
	Triple(usize, usize, usize),
}

fn locate(logical: u64) -> Result<Locator> {
	if logical < DIRECT_LIMIT {
		return Ok(Locator::Direct(logical as usize));
	}
	if logical < SINGLE_LIMIT {
		return Ok(Locator::Single((logical - DIRECT_LIMIT) as usize));
	}
	if logical < DOUBLE_LIMIT {
		let rem = logical - SINGLE_LIMIT;
		let p = POINTERS_PER_INDIRECT as u64;
		return Ok(Locator::Double((rem / p) as usize, (rem % p) as usize));
	}
	if logical < TRIPLE_LIMIT {
		let rem = logical - DOUBLE_LIMIT;
		let p = POINTERS_PER_INDIRECT as u64;
		let upper = rem / (p * p);
		let mid = (rem / p) % p;
		let lower = rem % p;
		return Ok(Locator::Triple(upper as usize, mid as usize, lower as usize));
	}
	Err(Error::FileTooLarge)
}

fn split(global: u32) -> (u32, u32) {
	(global / SLOTS_PER_SEGMENT, global % SLOTS_PER_SEGMENT)
}

/// Reads the data block numbered `global`.
pub fn read_data_block(store: &SegmentStore, global: u32) -> Result<[u8; BLOCK_SIZE]> {
	let (seg, idx) = split(global);
	store.read_block(SegmentKind::Data, seg, idx)
}

/// Overwrites the data block numbered `global`.
pub fn write_data_block(store: &SegmentStore, global: u32, bytes: &[u8; BLOCK_SIZE]) -> Result<()> {
	let (seg, idx) = split(global);
	store.write_block(SegmentKind::Data, seg, idx, bytes)
}

fn decode_indirect(buf: &[u8; BLOCK_SIZE]) -> [u32; POINTERS_PER_INDIRECT] {
	let mut out = [0u32; POINTERS_PER_INDIRECT];
	for (i, slot) in out.iter_mut().enumerate() {
		*slot = u32::from_le_bytes(buf[i * 4..i * 4 + 4].try_into().unwrap());
	}
	out
}

fn encode_indirect(ptrs: &[u32; POINTERS_PER_INDIRECT]) -> [u8; BLOCK_SIZE] {
	let mut buf = [0u8; BLOCK_SIZE];
	for (i, ptr) in ptrs.iter().enumerate() {
		buf[i * 4..i * 4 + 4].copy_from_slice(&ptr.to_le_bytes());
	}
	buf
}

fn read_indirect(store: &SegmentStore, global: u32) -> Result<[u32; POINTERS_PER_INDIRECT]> {
	Ok(decode_indirect(&read_data_block(store, global)?))
}

fn write_indirect(store: &SegmentStore, global: u32, ptrs: &[u32; POINTERS_PER_INDIRECT]) -> Result<()> {
	write_data_block(store, global, &encode_indirect(ptrs))
}

fn alloc_data_block(store: &SegmentStore) -> Result<u32> {
	let num = bitmap::allocate(store, SegmentKind::Data)?;
	write_data_block(store, num, &[0u8; BLOCK_SIZE])?;
	Ok(num)
}

fn alloc_indirect_block(store: &SegmentStore) -> Result<u32> {
	let num = bitmap::allocate(store, SegmentKind::Data)?;
	write_indirect(store, num, &[NULL_BLOCK; POINTERS_PER_INDIRECT])?;
	Ok(num)
}

fn free_data_block(store: &SegmentStore, global: u32) -> Result<()> {
	bitmap::free(store, SegmentKind::Data, global)
}

/// Follows `indices.len()` levels of indirect blocks starting from `root`,
/// returning the pointer at the end of the chain, or `NULL_BLOCK` if any
/// pointer along the way is unset. Never allocates.
fn resolve_read(store: &SegmentStore, root: u32, indices: &[usize]) -> Result<u32> {
	if root == NULL_BLOCK {
		return Ok(NULL_BLOCK);
	}
	let mut current = root;
	for &idx in indices {
		let block = read_indirect(store, current)?;
		let next = block[idx];
		if next == NULL_BLOCK {
			return Ok(NULL_BLOCK);
		}
		current = next;
	}
	Ok(current)
}

/// Same traversal as [`resolve_read`], but allocates any indirect block or
/// leaf data block missing along the way. `root` is the inode's pointer
/// field itself, updated in place if a fresh top-level indirect block is
/// allocated.
///
/// If an allocation past the first level fails, every block this call
/// allocated (including `root` itself, if freshly minted) is freed before
/// the error is returned.
fn resolve_write(store: &SegmentStore, root: &mut u32, indices: &[usize]) -> Result<u32> {
	enum Claim {
		Root,
		Slot { parent: u32, idx: usize },
	}
	let mut claims: Vec<Claim> = Vec::new();

	let outcome = (|| -> Result<u32> {
		if *root == NULL_BLOCK {
			*root = alloc_indirect_block(store)?;
			claims.push(Claim::Root);
		}
		let mut current = *root;
		let last = indices.len() - 1;
		for (depth, &idx) in indices.iter().enumerate() {
			let mut block = read_indirect(store, current)?;
			if block[idx] == NULL_BLOCK {
				let fresh = if depth == last {
					alloc_data_block(store)?
				} else {
					alloc_indirect_block(store)?
				};
				block[idx] = fresh;
				write_indirect(store, current, &block)?;
				claims.push(Claim::Slot { parent: current, idx });
			}
			current = block[idx];
		}
		Ok(current)
	})();

	if outcome.is_err() {
		for claim in claims.into_iter().rev() {
			match claim {
				Claim::Root => {
					let _ = free_data_block(store, *root);
					*root = NULL_BLOCK;
				}
				Claim::Slot { parent, idx } => {
					if let Ok(mut block) = read_indirect(store, parent) {
						let _ = free_data_block(store, block[idx]);
						block[idx] = NULL_BLOCK;
						let _ = write_indirect(store, parent, &block);
					}
				}
			}
		}
	}
	outcome
}

fn resolve_direct(store: &SegmentStore, slot: &mut u32) -> Result<u32> {
	if *slot == NULL_BLOCK {
		*slot = alloc_data_block(store)?;
	}
	Ok(*slot)
}

/// Returns the physical block number for logical block `logical` of
/// `inode`, or `NULL_BLOCK` if it has never been written. Never allocates.
pub fn read_logical(store: &SegmentStore, inode: &Inode, logical: u64) -> Result<u32> {
	match locate(logical)? {
		Locator::Direct(i) => Ok(inode.direct[i]),
		Locator::Single(i) => resolve_read(store, inode.single_indirect, &[i]),
		Locator::Double(u, l) => resolve_read(store, inode.double_indirect, &[u, l]),
		Locator::Triple(u, m, l) => resolve_read(store, inode.triple_indirect, &[u, m, l]),
	}
}

/// Returns the physical block number for logical block `logical` of
/// `inode`, allocating and zeroing any missing indirect or data block along
/// the way. Mutates `inode`'s pointer fields; the caller is responsible for
/// persisting the inode afterwards.
pub fn write_logical(store: &SegmentStore, inode: &mut Inode, logical: u64) -> Result<u32> {
	match locate(logical)? {
		Locator::Direct(i) => resolve_direct(store, &mut inode.direct[i]),
		Locator::Single(i) => resolve_write(store, &mut inode.single_indirect, &[i]),
		Locator::Double(u, l) => resolve_write(store, &mut inode.double_indirect, &[u, l]),
		Locator::Triple(u, m, l) => resolve_write(store, &mut inode.triple_indirect, &[u, m, l]),
	}
}

/// Frees every data block reachable from `inode`'s pointer fields,
/// including indirect blocks themselves, in post-order (children before
/// parent). Indirection depth is fixed at three, so this recurses at most
/// three levels deep regardless of file size.
pub fn free_all_blocks(store: &SegmentStore, inode: &Inode) -> Result<()> {
	for &d in &inode.direct {
		if d != NULL_BLOCK {
			free_data_block(store, d)?;
		}
	}
	if inode.single_indirect != NULL_BLOCK {
		free_leaf_level(store, inode.single_indirect, 1)?;
	}
	if inode.double_indirect != NULL_BLOCK {
		free_leaf_level(store, inode.double_indirect, 2)?;
	}
	if inode.triple_indirect != NULL_BLOCK {
		free_leaf_level(store, inode.triple_indirect, 3)?;
	}
	Ok(())
}

fn free_leaf_level(store: &SegmentStore, block_num: u32, depth: u32) -> Result<()> {
	let entries = read_indirect(store, block_num)?;
	for &e in entries.iter() {
		if e == NULL_BLOCK {
			continue;
		}
		if depth == 1 {
			free_data_block(store, e)?;
		} else {
			free_leaf_level(store, e, depth - 1)?;
		}
	}
	free_data_block(store, block_num)?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::consts::DIRECT_POINTERS;

	fn store() -> (tempfile::TempDir, SegmentStore) {
		let dir = tempfile::tempdir().unwrap();
		let store = SegmentStore::new(dir.path());
		(dir, store)
	}

	#[test]
	fn direct_blocks_allocate_lazily() {
		let (_d, store) = store();
		let mut inode = Inode::new_regular();
		assert_eq!(read_logical(&store, &inode, 0).unwrap(), NULL_BLOCK);
		let phys = write_logical(&store, &mut inode, 0).unwrap();
		assert_ne!(phys, NULL_BLOCK);
		assert_eq!(read_logical(&store, &inode, 0).unwrap(), phys);
	}

	#[test]
	fn crosses_into_single_indirect() {
		let (_d, store) = store();
		let mut inode = Inode::new_regular();
		for l in 0..(DIRECT_POINTERS as u64 + 3) {
			write_logical(&store, &mut inode, l).unwrap();
		}
		assert_ne!(inode.single_indirect, NULL_BLOCK);
		let last = read_logical(&store, &inode, DIRECT_POINTERS as u64 + 2).unwrap();
		assert_ne!(last, NULL_BLOCK);
	}

	#[test]
	fn double_indirect_round_trips() {
		let (_d, store) = store();
		let mut inode = Inode::new_regular();
		let l = SINGLE_LIMIT + (POINTERS_PER_INDIRECT as u64) + 5;
		let phys = write_logical(&store, &mut inode, l).unwrap();
		assert_eq!(read_logical(&store, &inode, l).unwrap(), phys);
		assert_ne!(inode.double_indirect, NULL_BLOCK);
	}

	#[test]
	fn beyond_triple_indirect_is_file_too_large() {
		let (_d, store) = store();
		let mut inode = Inode::new_regular();
		let err = write_logical(&store, &mut inode, TRIPLE_LIMIT).unwrap_err();
		assert!(matches!(err, Error::FileTooLarge));
	}

	#[test]
	fn free_all_blocks_releases_direct_and_indirect() {
		let (_d, store) = store();
		let mut inode = Inode::new_regular();
		for l in 0..(DIRECT_POINTERS as u64 + 5) {
			write_logical(&store, &mut inode, l).unwrap();
		}
		free_all_blocks(&store, &inode).unwrap();
		// every block handed out, including the indirect block itself,
		// must be reusable again from the bottom of the range.
		let mut reused = Vec::new();
		for _ in 0..(DIRECT_POINTERS + 6) {
			reused.push(bitmap::allocate(&store, SegmentKind::Data).unwrap());
		}
		assert_eq!(reused, (0..(DIRECT_POINTERS as u32 + 6)).collect::<Vec<_>>());
	}
}
