//! Error taxonomy for the storage engine.

use std::io;
use thiserror::Error;

/// Errors produced by any layer of the storage engine.
#[derive(Debug, Error)]
pub enum Error {
	/// An underlying segment read or write failed.
	#[error("I/O error: {0}")]
	Io(#[from] io::Error),
	/// A structure read from disk violates an invariant.
	#[error("corrupted on-disk structure: {0}")]
	Corruption(String),
	/// A path component, or the target of `extract`/`remove`, does not exist.
	#[error("not found")]
	NotFound,
	/// `add` was refused because the target name already exists.
	#[error("already exists")]
	AlreadyExists,
	/// An intermediate path component is not a directory.
	#[error("not a directory")]
	NotADirectory,
	/// The operation requires a regular file but found a directory.
	#[error("is a directory")]
	IsADirectory,
	/// A name is empty, ".", "..", too long, or contains a slash.
	#[error("invalid name")]
	InvalidName,
	/// The allocator could not create a new segment.
	#[error("out of space")]
	OutOfSpace,
	/// A logical block index exceeds the triple-indirect capacity.
	#[error("file too large")]
	FileTooLarge,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
	/// True if this error is the expected "segment file does not exist" case
	/// that allocators and scanners use as a loop terminator.
	pub fn is_missing_segment(&self) -> bool {
		matches!(self, Error::Io(e) if e.kind() == io::ErrorKind::NotFound)
	}
}
