//! Line-oriented shell over a mounted volume.
//!
//! Thin front end: every command translates into one or two core
//! operations. Path resolution is repeated lookup, one component per
//! `cd`, tracked on a stack of (name, cluster) pairs.

use std::io::{BufRead as _, Write as _};

use fatdisk::fs::fat::Cluster;
use fatdisk::{DiskImage, FileSystem, FsError, FsResult};

struct Shell {
    fs: FileSystem<DiskImage>,
    // Path from the root down to the current directory.
    stack: Vec<(String, Cluster)>,
}

impl Shell {
    fn new(fs: FileSystem<DiskImage>) -> Self {
        Self {
            fs,
            stack: vec![(String::new(), FileSystem::<DiskImage>::root())],
        }
    }

    fn current(&self) -> Cluster {
        self.stack.last().expect("stack always holds the root").1
    }

    fn prompt(&self) -> String {
        let mut path = String::from("/");
        path.push_str(
            &self
                .stack
                .iter()
                .skip(1)
                .map(|(name, _)| name.as_str())
                .collect::<Vec<_>>()
                .join("/"),
        );
        format!("H:{path}> ")
    }

    /// Runs one command line. Returns false when the session should end.
    fn execute(&mut self, line: &str) -> FsResult<bool> {
        let tokens = tokenize(line);
        let Some((command, args)) = tokens.split_first() else {
            return Ok(true);
        };

        match (command.to_lowercase().as_str(), args) {
            ("exit" | "quit", _) => return Ok(false),
            ("help", _) => print_help(),
            ("dir", _) => self.cmd_dir()?,
            ("cd", [target]) => self.cmd_cd(target)?,
            ("type", [name]) => {
                let content = self.fs.read_file(self.current(), name)?;
                println!("{}", String::from_utf8_lossy(&content));
            }
            ("write", [name, rest @ ..]) => {
                let cwd = self.current();
                if self.fs.lookup(cwd, name)?.is_none() {
                    self.fs.create_file(cwd, name)?;
                }
                self.fs.write_file(cwd, name, rest.join(" ").as_bytes())?;
            }
            ("del", [name]) => self.fs.delete_file(self.current(), name)?,
            ("copy", [src, dst]) => {
                let cwd = self.current();
                self.fs.copy_file(cwd, src, cwd, dst)?;
            }
            ("ren" | "rename", [old, new]) => self.fs.rename_entry(self.current(), old, new)?,
            ("md" | "mkdir", [name]) => {
                self.fs.create_directory(self.current(), name)?;
            }
            ("rd" | "rmdir", [name]) => self.fs.remove_directory(self.current(), name)?,
            _ => println!("Unknown command or wrong arguments. Type 'help'."),
        }
        Ok(true)
    }

    fn cmd_dir(&mut self) -> FsResult<()> {
        let entries = self.fs.list_directory(self.current())?;

        println!();
        for entry in &entries {
            if entry.is_directory() {
                println!("<DIR>  {}", entry.display_name());
            } else {
                println!("{:>6} {}", entry.size(), entry.display_name());
            }
        }
        println!("{} entries, {} bytes free\n", entries.len(), self.fs.free_space());
        Ok(())
    }

    fn cmd_cd(&mut self, target: &str) -> FsResult<()> {
        match target {
            "/" => self.stack.truncate(1),
            ".." => {
                if self.stack.len() > 1 {
                    self.stack.pop();
                }
            }
            name => {
                let entry = self
                    .fs
                    .lookup(self.current(), name)?
                    .ok_or(FsError::NotFound)?;
                if !entry.is_directory() {
                    return Err(FsError::NotADirectory);
                }
                let first = entry.first_cluster().ok_or(FsError::NotFound)?;
                self.stack.push((entry.display_name(), first));
            }
        }
        Ok(())
    }
}

/// Splits a command line on whitespace, honoring double quotes.
fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in line.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn print_help() {
    println!("Commands:");
    println!("  dir                 list the current directory");
    println!("  cd <name|..|/>      change directory");
    println!("  type <file>         print a file");
    println!("  write <file> <text> create/overwrite a file with text");
    println!("  del <file>          delete a file");
    println!("  copy <src> <dst>    copy a file");
    println!("  ren <old> <new>     rename a file or directory");
    println!("  mkdir <name>        create a directory");
    println!("  rmdir <name>        remove an empty directory");
    println!("  exit                quit");
}

fn main() -> std::process::ExitCode {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| String::from("disk.img"));

    let device = match DiskImage::open(&path, true) {
        Ok(device) => device,
        Err(err) => {
            eprintln!("Cannot open {path}: {err}");
            return std::process::ExitCode::FAILURE;
        }
    };
    let fs = match FileSystem::mount(device) {
        Ok(fs) => fs,
        Err(err) => {
            eprintln!("Cannot mount {path}: {err}");
            return std::process::ExitCode::FAILURE;
        }
    };

    println!("FAT file system shell on {path}");
    println!("Type 'help' for available commands.\n");

    let mut shell = Shell::new(fs);
    let stdin = std::io::stdin();

    loop {
        print!("{}", shell.prompt());
        let _ = std::io::stdout().flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }

        match shell.execute(&line) {
            Ok(true) => {}
            Ok(false) => break,
            Err(err) => println!("Error: {err}"),
        }
    }

    match shell.fs.unmount().and_then(|mut device| {
        device.close()?;
        Ok(())
    }) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error while closing {path}: {err}");
            std::process::ExitCode::FAILURE
        }
    }
}
