//! Walks a slash-separated absolute path from the root inode.

use crate::consts::ROOT_INODE;
use crate::directory;
use crate::error::{Error, Result};
use crate::inode::{self, InodeType};
use crate::reclaim;
use crate::segment::SegmentStore;

/// Outcome of resolving a path.
pub struct Resolved {
	/// Strict mode: the final component's inode. Create-missing mode: the
	/// inode of the last *directory* component (the leaf itself is never
	/// created by the resolver).
	pub inode: u32,
	/// The final path component's name.
	pub leaf: String,
}

/// Resolves `path`, which must begin with `/`. In strict mode every
/// component (including the last) must already exist. In create-missing
/// mode, every component except the last is created as an empty directory
/// if it is absent; the last component is left for the caller to handle.
pub fn resolve(store: &SegmentStore, path: &str, create_missing: bool) -> Result<Resolved> {
	if !path.starts_with('/') {
		return Err(Error::InvalidName);
	}
	let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
	if components.is_empty() {
		return Ok(Resolved {
			inode: ROOT_INODE,
			leaf: String::new(),
		});
	}

	if create_missing {
		let (dirs, leaf) = components.split_at(components.len() - 1);
		let mut current = ROOT_INODE;
		for comp in dirs {
			current = step(store, current, comp, true)?;
		}
		Ok(Resolved {
			inode: current,
			leaf: leaf[0].to_string(),
		})
	} else {
		let mut current = ROOT_INODE;
		for comp in &components {
			current = step(store, current, comp, false)?;
		}
		Ok(Resolved {
			inode: current,
			leaf: components.last().unwrap().to_string(),
		})
	}
}

fn step(store: &SegmentStore, current: u32, comp: &str, create_missing: bool) -> Result<u32> {
	let dir = inode::read(store, current)?;
	if dir.kind != InodeType::Directory {
		return Err(Error::NotADirectory);
	}
	match directory::lookup(store, &dir, comp)? {
		Some(child) => Ok(child),
		None if create_missing => create_subdirectory(store, current, comp),
		None => Err(Error::NotFound),
	}
}

fn create_subdirectory(store: &SegmentStore, parent: u32, name: &str) -> Result<u32> {
	let new_num = inode::allocate(store)?;
	let mut new_inode = crate::inode::Inode::new_directory();

	let outcome = (|| -> Result<()> {
		directory::init_directory(store, new_num, &mut new_inode, parent)?;
		inode::write(store, new_num, &new_inode)?;
		let mut parent_inode = inode::read(store, parent)?;
		directory::add_entry(store, parent, &mut parent_inode, name, new_num)
	})();

	if let Err(e) = outcome {
		let _ = reclaim::free_subtree(store, new_num);
		return Err(e);
	}
	Ok(new_num)
}
