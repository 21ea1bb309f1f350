//! End-to-end scenarios exercised against the public `Fs` façade only,
//! through a fresh store per test.

use exfs2::{Error, Fs};
use std::io::Cursor;

fn open_store() -> (tempfile::TempDir, Fs) {
	let dir = tempfile::tempdir().unwrap();
	let fs = Fs::open(dir.path()).unwrap();
	(dir, fs)
}

#[test]
fn hello_world_nested_add_and_extract() {
	let (_dir, fs) = open_store();
	fs.add("/greetings/hello", Cursor::new(b"hello, world!".to_vec())).unwrap();

	let mut out = Vec::new();
	fs.extract("/greetings/hello", &mut out).unwrap();
	assert_eq!(out, b"hello, world!");

	let listing = fs.list("/").unwrap();
	assert!(listing.contains(&"greetings".to_string()));
	assert!(listing.contains(&"greetings/hello".to_string()));
}

#[test]
fn file_size_crosses_direct_to_single_indirect_boundary() {
	let (_dir, fs) = open_store();
	// 10 direct pointers' worth of blocks plus one byte forces the block
	// map into its single indirect pointer.
	let len = 10 * 4096 + 1;
	let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
	fs.add("/crossing", Cursor::new(data.clone())).unwrap();

	let mut out = Vec::new();
	fs.extract("/crossing", &mut out).unwrap();
	assert_eq!(out, data);
}

#[test]
fn file_size_crosses_single_to_double_indirect_boundary() {
	let (_dir, fs) = open_store();
	// 1024 pointers per indirect block: this length lands just past the
	// single indirect pointer's capacity.
	let single_capacity_blocks = 10 + 1024;
	let len = (single_capacity_blocks + 1) * 4096;
	let data = vec![0x5Au8; len];
	fs.add("/deep", Cursor::new(data.clone())).unwrap();

	let mut out = Vec::new();
	fs.extract("/deep", &mut out).unwrap();
	assert_eq!(out, data);
}

#[test]
fn duplicate_add_is_rejected_and_original_survives() {
	let (_dir, fs) = open_store();
	fs.add("/note", Cursor::new(b"first".to_vec())).unwrap();
	let err = fs.add("/note", Cursor::new(b"second".to_vec())).unwrap_err();
	assert!(matches!(err, Error::AlreadyExists));

	let mut out = Vec::new();
	fs.extract("/note", &mut out).unwrap();
	assert_eq!(out, b"first");
}

#[test]
fn directory_spills_across_two_hundred_fifty_six_entries() {
	let (_dir, fs) = open_store();
	for i in 0..256 {
		fs.add(&format!("/many/item-{i}"), Cursor::new(format!("body-{i}").into_bytes()))
			.unwrap();
	}
	let listing = fs.list("/many").unwrap();
	let items: Vec<_> = listing.iter().filter(|n| n.starts_with("item-")).collect();
	assert_eq!(items.len(), 256);

	let mut out = Vec::new();
	fs.extract("/many/item-255", &mut out).unwrap();
	assert_eq!(out, b"body-255");
}

#[test]
fn removing_a_deep_subtree_frees_every_inode_and_block() {
	let (_dir, fs) = open_store();
	for i in 0..8 {
		fs.add(&format!("/tree/a/b/c/leaf-{i}"), Cursor::new(vec![i as u8; 4096 * 3]))
			.unwrap();
	}
	assert!(fs.list("/tree/a/b/c").is_ok());

	fs.remove("/tree/a").unwrap();
	assert!(matches!(fs.list("/tree/a").unwrap_err(), Error::NotFound));

	// the reclaimed inodes and blocks must be dense enough that a
	// similarly sized subtree fits again without growing new segments
	// unboundedly; this is a smoke check, not an exact slot assertion.
	for i in 0..8 {
		fs.add(&format!("/tree2/x/y/z/leaf-{i}"), Cursor::new(vec![i as u8; 4096 * 3]))
			.unwrap();
	}
	assert_eq!(fs.list("/tree2/x/y/z").unwrap().len(), 8);
}

#[test]
fn extract_on_a_directory_is_an_error() {
	let (_dir, fs) = open_store();
	fs.add("/d/f", Cursor::new(b"x".to_vec())).unwrap();
	let mut out = Vec::new();
	assert!(matches!(fs.extract("/d", &mut out), Err(Error::IsADirectory)));
}

#[test]
fn add_through_a_regular_file_parent_is_not_a_directory() {
	let (_dir, fs) = open_store();
	fs.add("/f", Cursor::new(b"x".to_vec())).unwrap();
	let err = fs.add("/f/g", Cursor::new(b"y".to_vec())).unwrap_err();
	assert!(matches!(err, Error::NotADirectory));
}

#[test]
fn failed_add_leaves_no_trace_in_the_parent_directory() {
	let (_dir, fs) = open_store();
	fs.add("/ok", Cursor::new(b"x".to_vec())).unwrap();
	let _ = fs.add("/ok", Cursor::new(b"y".to_vec()));
	assert_eq!(fs.list("/").unwrap(), vec!["ok".to_string()]);
}
