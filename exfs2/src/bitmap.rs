//! Bitmap allocator over one kind of object (inodes or data blocks).
//! There is no cached free list: every call rescans the bitmaps from
//! segment 0 upward, which keeps allocation dense and deterministic.

use crate::consts::{BLOCK_SIZE, SLOTS_PER_SEGMENT};
use crate::error::{Error, Result};
use crate::segment::{SegmentKind, SegmentStore};

/// Finds and claims the lowest-numbered free slot of `kind`, creating a new
/// segment if every existing one is full.
pub fn allocate(store: &SegmentStore, kind: SegmentKind) -> Result<u32> {
	let mut seg = 0u32;
	loop {
		match store.read_bitmap(kind, seg) {
			Ok(mut bits) => {
				if let Some(j) = first_free_bit(&bits) {
					set_bit(&mut bits, j);
					store.write_bitmap(kind, seg, &bits)?;
					return Ok(seg * SLOTS_PER_SEGMENT + j as u32);
				}
				seg = seg
					.checked_add(1)
					.ok_or(Error::OutOfSpace)?;
			}
			Err(e) if e.is_missing_segment() => {
				let mut bits = [0u8; BLOCK_SIZE];
				set_bit(&mut bits, 0);
				store.write_bitmap(kind, seg, &bits)?;
				return Ok(seg * SLOTS_PER_SEGMENT);
			}
			Err(e) => return Err(e),
		}
	}
}

/// Releases a previously allocated slot. Refuses to free slot 0 (reserved
/// for the root inode/data block). Freeing an already-free slot is not an
/// error: it is accepted silently.
pub fn free(store: &SegmentStore, kind: SegmentKind, global: u32) -> Result<()> {
	if global == 0 {
		return Ok(());
	}
	let seg = global / SLOTS_PER_SEGMENT;
	let j = (global % SLOTS_PER_SEGMENT) as usize;
	let mut bits = store.read_bitmap(kind, seg)?;
	clear_bit(&mut bits, j);
	store.write_bitmap(kind, seg, &bits)
}

/// Lowest index `j < SLOTS_PER_SEGMENT` whose bit is clear, scanning each
/// byte from its least significant bit.
fn first_free_bit(bits: &[u8; BLOCK_SIZE]) -> Option<usize> {
	(0..SLOTS_PER_SEGMENT as usize).find(|&j| !bit_is_set(bits, j))
}

fn bit_is_set(bits: &[u8; BLOCK_SIZE], j: usize) -> bool {
	let byte = bits[j / 8];
	(byte >> (j % 8)) & 1 != 0
}

fn set_bit(bits: &mut [u8; BLOCK_SIZE], j: usize) {
	bits[j / 8] |= 1 << (j % 8);
}

fn clear_bit(bits: &mut [u8; BLOCK_SIZE], j: usize) {
	bits[j / 8] &= !(1 << (j % 8));
}
