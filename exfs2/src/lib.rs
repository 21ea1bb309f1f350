//! A persistent, userspace, inode-based hierarchical file store backed by
//! fixed-size segment files.
//!
//! [`Fs`] is the entry point: `Fs::open` a directory of segment files (it is
//! created and bootstrapped with an empty root on first use), then call
//! `list`, `add`, `extract`, `remove`, or `debug`.

pub mod consts;
mod error;

mod bitmap;
mod blockmap;
mod directory;
mod fs;
mod inode;
mod path;
mod reclaim;
mod segment;

pub use error::{Error, Result};
pub use fs::Fs;
pub use inode::InodeType;
pub use segment::SegmentKind;
