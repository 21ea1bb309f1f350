//! Recursive removal, shared by the `remove` façade operation and by the
//! rollback path of failed `add`/resolver operations.
//!
//! The directory walk is iterative (an explicit worklist) rather than
//! native recursion, so freeing a subtree many directories deep cannot
//! overflow the call stack.

use crate::blockmap;
use crate::directory;
use crate::error::Result;
use crate::inode::{self, InodeType};
use crate::segment::SegmentStore;

enum Step {
	Enter(u32),
	Leave(u32),
}

/// Frees every block and inode reachable from `root_inode`, including
/// `root_inode` itself. If `root_inode` names a directory, every child
/// other than `.`/`..` is freed first, depth first, post-order.
pub fn free_subtree(store: &SegmentStore, root_inode: u32) -> Result<()> {
	let mut work = vec![Step::Enter(root_inode)];
	while let Some(step) = work.pop() {
		match step {
			Step::Enter(num) => {
				let inode = inode::read(store, num)?;
				work.push(Step::Leave(num));
				if inode.kind == InodeType::Directory {
					for entry in directory::iter_entries(store, &inode)? {
						if entry.name == "." || entry.name == ".." {
							continue;
						}
						work.push(Step::Enter(entry.inode));
					}
				}
			}
			Step::Leave(num) => {
				let inode = inode::read(store, num)?;
				blockmap::free_all_blocks(store, &inode)?;
				inode::free(store, num)?;
			}
		}
	}
	Ok(())
}
