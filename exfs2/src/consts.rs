//! On-disk numerical constants shared by every layer of the store.

/// Size of an object slot / data block, in bytes (`B`).
pub const BLOCK_SIZE: usize = 4096;
/// Size of a segment file, in bytes (`S`).
pub const SEGMENT_SIZE: u64 = 1_048_576;
/// Number of object slots per segment, not counting the bitmap block (`K`).
pub const SLOTS_PER_SEGMENT: u32 = 255;
/// Number of direct block pointers in an inode record (`D`).
pub const DIRECT_POINTERS: usize = 10;
/// Number of block numbers held by one indirect block (`P = B / 4`).
pub const POINTERS_PER_INDIRECT: usize = BLOCK_SIZE / 4;

/// Sentinel meaning "no block here", distinct from the valid block number 0.
///
/// Block 0 is the root directory's first data block and is a perfectly
/// valid target of a pointer; only this dedicated value means "unset".
pub const NULL_BLOCK: u32 = u32::MAX;
/// Sentinel meaning "no inode here" in a directory entry, distinct from
/// inode number 0 (the root). Without a dedicated sentinel, an entry
/// pointing at the root (as every directory's "." and ".." do) would be
/// indistinguishable from an unused slot.
pub const NULL_INODE: u32 = u32::MAX;

/// Global number of the root directory's inode.
pub const ROOT_INODE: u32 = 0;
/// Global number of the root directory's first data block.
pub const ROOT_DATA_BLOCK: u32 = 0;

/// Maximum length of a directory entry name, in bytes.
pub const MAX_NAME_LEN: usize = 255;
/// Size in bytes of the fixed name field of a directory entry record.
pub const NAME_FIELD_LEN: usize = 256;
/// Size in bytes of one directory entry record (inode number + name field).
pub const ENTRY_RECORD_SIZE: usize = 4 + NAME_FIELD_LEN;
/// Number of directory entries packed into one directory block.
pub const ENTRIES_PER_BLOCK: usize = BLOCK_SIZE / ENTRY_RECORD_SIZE;

/// Largest logical block index reachable through direct pointers alone.
pub const DIRECT_LIMIT: u64 = DIRECT_POINTERS as u64;
/// Largest logical block index reachable through the single indirect pointer.
pub const SINGLE_LIMIT: u64 = DIRECT_LIMIT + POINTERS_PER_INDIRECT as u64;
/// Largest logical block index reachable through the double indirect pointer.
pub const DOUBLE_LIMIT: u64 =
	SINGLE_LIMIT + (POINTERS_PER_INDIRECT as u64) * (POINTERS_PER_INDIRECT as u64);
/// Largest logical block index reachable through the triple indirect pointer.
pub const TRIPLE_LIMIT: u64 = DOUBLE_LIMIT
	+ (POINTERS_PER_INDIRECT as u64) * (POINTERS_PER_INDIRECT as u64) * (POINTERS_PER_INDIRECT as u64);
