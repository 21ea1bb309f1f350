//! `exfs2` is a command-line front end onto the ExFS2 segment-file store
//! rooted at the current working directory.

use exfs2::{Error, Fs, InodeType};
use std::env;
use std::fs::File;
use std::io::{self, Write};
use std::process::exit;
use utils::util::ByteSize;

/// Structure storing command line arguments.
#[derive(Default)]
struct Args {
	/// The name of the current program used in command line.
	prog: String,

	/// If true, print command line help.
	help: bool,

	/// The subcommand, if any.
	command: Option<String>,
	/// Positional arguments following the subcommand.
	rest: Vec<String>,
}

fn parse_args() -> Args {
	let mut args: Args = Default::default();
	let mut iter = env::args();
	args.prog = iter.next().unwrap_or_else(|| "exfs2".to_owned());

	for arg in iter {
		match arg.as_str() {
			"-h" | "--help" if args.command.is_none() => args.help = true,
			_ if args.command.is_none() => args.command = Some(arg),
			_ => args.rest.push(arg),
		}
	}

	args
}

fn print_usage(prog: &str) {
	eprintln!("{prog}: bad usage");
	eprintln!("Try '{prog} --help' for more information.");
}

fn print_help(prog: &str) {
	println!();
	println!("Usage:");
	println!(" {prog} list <path>");
	println!(" {prog} add <target-path> <source-file>");
	println!(" {prog} extract <path>");
	println!(" {prog} remove <path>");
	println!(" {prog} debug <path>");
	println!();
	println!("Operates on the ExFS2 store rooted at the current directory.");
}

/// Maps a store error to the message printed on stderr and the process exit
/// code, mirroring how `fdisk`/`mkfs` report `io::Error` today.
fn report(prog: &str, err: Error) -> i32 {
	eprintln!("{prog}: {err}");
	match err {
		Error::NotFound => 2,
		Error::AlreadyExists => 3,
		Error::NotADirectory | Error::IsADirectory => 4,
		Error::InvalidName => 5,
		Error::OutOfSpace | Error::FileTooLarge => 6,
		Error::Corruption(_) => 7,
		Error::Io(_) => 8,
	}
}

fn run(prog: &str, fs: &Fs, command: &str, rest: &[String]) -> Result<(), Error> {
	match command {
		"list" => {
			let path = rest.first().map(String::as_str).unwrap_or("/");
			let (kind, size) = fs.stat(path)?;
			if kind != InodeType::Directory {
				println!("{path}\t{}", ByteSize(size));
				return Ok(());
			}
			let base = path.trim_end_matches('/');
			for name in fs.list(path)? {
				let full = format!("{base}/{name}");
				match fs.stat(&full) {
					Ok((InodeType::Directory, _)) => println!("{name}/"),
					Ok((_, size)) => println!("{name}\t{}", ByteSize(size)),
					Err(_) => println!("{name}"),
				}
			}
			Ok(())
		}
		"add" => {
			let target = rest.first().ok_or(Error::InvalidName)?;
			let source = rest.get(1).ok_or(Error::InvalidName)?;
			let file = File::open(source)?;
			fs.add(target, file)
		}
		"extract" => {
			let path = rest.first().ok_or(Error::InvalidName)?;
			let stdout = io::stdout();
			fs.extract(path, stdout.lock())
		}
		"remove" => {
			let path = rest.first().ok_or(Error::InvalidName)?;
			fs.remove(path)
		}
		"debug" => {
			let path = rest.first().map(String::as_str).unwrap_or("/");
			let stdout = io::stdout();
			fs.debug(path, stdout.lock())
		}
		_ => {
			print_usage(prog);
			exit(1);
		}
	}
}

fn main() {
	let args = parse_args();

	if args.help {
		print_help(&args.prog);
		return;
	}

	let Some(command) = args.command.as_deref() else {
		print_usage(&args.prog);
		exit(1);
	};

	let fs = match Fs::open(".") {
		Ok(fs) => fs,
		Err(e) => exit(report(&args.prog, e)),
	};

	if let Err(e) = run(&args.prog, &fs, command, &args.rest) {
		exit(report(&args.prog, e));
	}
}
