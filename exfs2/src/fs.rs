//! File operations façade: `list`, `add`, `extract`, `remove`, `debug`.

use crate::blockmap;
use crate::consts::{BLOCK_SIZE, ENTRY_RECORD_SIZE, ROOT_DATA_BLOCK, ROOT_INODE};
use crate::directory;
use crate::error::{Error, Result};
use crate::inode::{self, Inode, InodeType};
use crate::path;
use crate::reclaim;
use crate::segment::{SegmentKind, SegmentStore};
use std::io::{self, Read, Write};
use std::path::PathBuf;

/// A handle onto one ExFS2 store, rooted at a host directory holding its
/// segment files.
pub struct Fs {
	store: SegmentStore,
}

impl Fs {
	/// Opens (and, on first use against an empty directory, initializes)
	/// the store rooted at `root`. `root` is created if absent.
	pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
		let root = root.into();
		std::fs::create_dir_all(&root)?;
		let fs = Self {
			store: SegmentStore::new(root),
		};
		fs.ensure_initialized()?;
		Ok(fs)
	}

	#[cfg(test)]
	pub(crate) fn store(&self) -> &SegmentStore {
		&self.store
	}

	fn ensure_initialized(&self) -> Result<()> {
		match self.store.read_bitmap(SegmentKind::Inode, 0) {
			Ok(_) => Ok(()),
			Err(e) if e.is_missing_segment() => self.bootstrap_root(),
			Err(e) => Err(e),
		}
	}

	/// Claims inode 0 and data block 0 (the first-ever allocation of each
	/// pool always returns slot 0, so this needs no special-cased bitmap
	/// poking) and turns them into an empty root directory.
	fn bootstrap_root(&self) -> Result<()> {
		let inode_num = inode::allocate(&self.store)?;
		debug_assert_eq!(inode_num, ROOT_INODE);
		let mut root = Inode::new_directory();
		root.direct[0] = crate::bitmap::allocate(&self.store, SegmentKind::Data)?;
		debug_assert_eq!(root.direct[0], ROOT_DATA_BLOCK);
		directory::write_self_entries(&self.store, root.direct[0], ROOT_INODE, ROOT_INODE)?;
		root.size = 2 * ENTRY_RECORD_SIZE as u64;
		inode::write(&self.store, inode_num, &root)
	}

	fn resolve_strict(&self, target: &str) -> Result<(u32, String)> {
		if target == "/" {
			return Ok((ROOT_INODE, "/".to_string()));
		}
		let r = path::resolve(&self.store, target, false)?;
		Ok((r.inode, r.leaf))
	}

	/// Splits `target` into its parent path and leaf name, rejecting the
	/// empty path, the path "/", and leaves of "." or "..".
	fn split_leaf(target: &str) -> Result<(String, String)> {
		if !target.starts_with('/') {
			return Err(Error::InvalidName);
		}
		let trimmed = target.trim_end_matches('/');
		if trimmed.is_empty() {
			return Err(Error::InvalidName);
		}
		let idx = trimmed.rfind('/').unwrap();
		let parent = if idx == 0 { "/".to_string() } else { trimmed[..idx].to_string() };
		let leaf = trimmed[idx + 1..].to_string();
		if leaf.is_empty() || leaf == "." || leaf == ".." || leaf.len() > crate::consts::MAX_NAME_LEN {
			return Err(Error::InvalidName);
		}
		Ok((parent, leaf))
	}

	/// Resolves `path` strictly; returns the recursive listing of names if
	/// it names a directory, or the leaf name alone if it names a regular
	/// file. Directory entries are reported as `/`-joined paths relative to
	/// `path` itself.
	pub fn list(&self, target: &str) -> Result<Vec<String>> {
		let (num, leaf) = self.resolve_strict(target)?;
		let inode = inode::read(&self.store, num)?;
		match inode.kind {
			InodeType::Regular => Ok(vec![leaf]),
			InodeType::Directory => {
				let mut out = Vec::new();
				self.walk(num, "", &mut out)?;
				Ok(out)
			}
			InodeType::Free => Err(Error::Corruption("listed inode is free".into())),
		}
	}

	/// Strict-resolves `target` and returns its type and size, without
	/// reading any of its content.
	pub fn stat(&self, target: &str) -> Result<(InodeType, u64)> {
		let (num, _leaf) = self.resolve_strict(target)?;
		let inode = inode::read(&self.store, num)?;
		Ok((inode.kind, inode.size))
	}

	fn walk(&self, dir_num: u32, prefix: &str, out: &mut Vec<String>) -> Result<()> {
		let dir = inode::read(&self.store, dir_num)?;
		for entry in directory::iter_entries(&self.store, &dir)? {
			if entry.name == "." || entry.name == ".." {
				continue;
			}
			let full = if prefix.is_empty() {
				entry.name.clone()
			} else {
				format!("{prefix}/{}", entry.name)
			};
			out.push(full.clone());
			let child = inode::read(&self.store, entry.inode)?;
			if child.kind == InodeType::Directory {
				self.walk(entry.inode, &full, out)?;
			}
		}
		Ok(())
	}

	/// Ingests `source` as a new regular file at `target`. `target`'s
	/// parent path is created (as directories) if missing; `target` itself
	/// must not already exist. On any failure past inode allocation, every
	/// block and the inode allocated for the attempt are freed before the
	/// error is returned.
	pub fn add<R: Read>(&self, target: &str, mut source: R) -> Result<()> {
		let (parent_path, leaf) = Self::split_leaf(target)?;
		let resolved = path::resolve(&self.store, &parent_path, true)?;
		let parent_num = resolved.inode;
		let mut parent_inode = inode::read(&self.store, parent_num)?;
		if parent_inode.kind != InodeType::Directory {
			return Err(Error::NotADirectory);
		}
		if directory::lookup(&self.store, &parent_inode, &leaf)?.is_some() {
			return Err(Error::AlreadyExists);
		}

		let file_num = inode::allocate(&self.store)?;
		let mut file_inode = Inode::new_regular();
		inode::write(&self.store, file_num, &file_inode)?;

		let outcome = (|| -> Result<()> {
			let mut buf = [0u8; BLOCK_SIZE];
			let mut logical = 0u64;
			let mut total = 0u64;
			loop {
				let filled = read_chunk(&mut source, &mut buf)?;
				if filled == 0 {
					break;
				}
				if filled < BLOCK_SIZE {
					buf[filled..].fill(0);
				}
				let phys = blockmap::write_logical(&self.store, &mut file_inode, logical)?;
				blockmap::write_data_block(&self.store, phys, &buf)?;
				total += filled as u64;
				file_inode.size = total;
				// persisted on every block so a failure partway through
				// leaves the on-disk inode pointing at everything actually
				// allocated so far, for `free_subtree` to reclaim.
				inode::write(&self.store, file_num, &file_inode)?;
				logical += 1;
				if filled < BLOCK_SIZE {
					break;
				}
			}
			directory::add_entry(&self.store, parent_num, &mut parent_inode, &leaf, file_num)?;
			Ok(())
		})();

		if let Err(e) = outcome {
			let _ = reclaim::free_subtree(&self.store, file_num);
			return Err(e);
		}
		Ok(())
	}

	/// Strict-resolves `path`, requires it to name a regular file, and
	/// writes its bytes to `sink` in block order.
	pub fn extract<W: Write>(&self, target: &str, mut sink: W) -> Result<()> {
		let (num, _leaf) = self.resolve_strict(target)?;
		let inode = inode::read(&self.store, num)?;
		if inode.kind != InodeType::Regular {
			return Err(Error::IsADirectory);
		}
		let total_blocks = if inode.size == 0 {
			0
		} else {
			(inode.size + BLOCK_SIZE as u64 - 1) / BLOCK_SIZE as u64
		};
		let mut remaining = inode.size;
		for logical in 0..total_blocks {
			let phys = blockmap::read_logical(&self.store, &inode, logical)?;
			if phys == crate::consts::NULL_BLOCK {
				return Err(Error::Corruption("null block before end of file".into()));
			}
			let block = blockmap::read_data_block(&self.store, phys)?;
			let take = remaining.min(BLOCK_SIZE as u64) as usize;
			sink.write_all(&block[..take])?;
			remaining -= take as u64;
		}
		Ok(())
	}

	/// Strict-resolves `path`, refuses to remove the root, detaches the
	/// entry from its parent, then recursively frees the target.
	pub fn remove(&self, target: &str) -> Result<()> {
		let (parent_path, leaf) = Self::split_leaf(target)?;
		let resolved = path::resolve(&self.store, target, false)?;
		let target_num = resolved.inode;
		if target_num == ROOT_INODE {
			return Err(Error::InvalidName);
		}
		let parent_resolved = path::resolve(&self.store, &parent_path, false)?;
		let mut parent_inode = inode::read(&self.store, parent_resolved.inode)?;
		directory::remove_entry(&self.store, parent_resolved.inode, &mut parent_inode, &leaf)?;
		reclaim::free_subtree(&self.store, target_num)
	}

	/// Resolves `path` component by component, writing the inode number,
	/// type, size, and full pointer layout of each step to `out`. Never
	/// mutates the store.
	pub fn debug<W: Write>(&self, target: &str, mut out: W) -> Result<()> {
		let root = inode::read(&self.store, ROOT_INODE)?;
		writeln!(out, "/ inode={ROOT_INODE} {:?} size={}", root.kind, root.size)?;
		let mut current = ROOT_INODE;
		for comp in target.split('/').filter(|c| !c.is_empty()) {
			let dir = inode::read(&self.store, current)?;
			if dir.kind != InodeType::Directory {
				return Err(Error::NotADirectory);
			}
			let child = directory::lookup(&self.store, &dir, comp)?.ok_or(Error::NotFound)?;
			let inode = inode::read(&self.store, child)?;
			writeln!(
				out,
				"{comp} inode={child} {:?} size={} direct={:?} single={} double={} triple={}",
				inode.kind,
				inode.size,
				inode.direct,
				inode.single_indirect,
				inode.double_indirect,
				inode.triple_indirect
			)?;
			current = child;
		}
		Ok(())
	}
}

fn read_chunk<R: Read>(source: &mut R, buf: &mut [u8; BLOCK_SIZE]) -> io::Result<usize> {
	let mut filled = 0;
	while filled < BLOCK_SIZE {
		match source.read(&mut buf[filled..])? {
			0 => break,
			n => filled += n,
		}
	}
	Ok(filled)
}
