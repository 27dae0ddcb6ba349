//! Line-oriented front-end used by the binary to poke at the attribute.
//!
//! Understands a tiny shell dialect: `cat <path>`, `echo <value> > <path>`,
//! `ls [dir]`, `help` and `quit`.

use crate::error::{Error, Result};
use crate::host::{Accessor, Sysfs};
use std::io::BufRead;
use std::thread;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Cat(String),
    /// `echo` appends a newline, exactly like the shell builtin.
    Echo { data: String, path: String },
    Ls(String),
    Help,
    Quit,
    Nop,
}

pub const HELP: &str = "\
commands:
  cat <path>               read an attribute
  echo <value> > <path>    write an attribute
  ls [dir]                 list a sysfs directory
  help                     this text
  quit                     unload the module and exit";

impl Command {
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        match word {
            "" => Ok(Command::Nop),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" => Ok(Command::Quit),
            "ls" => Ok(Command::Ls(if rest.is_empty() {
                "/sys/kernel".to_string()
            } else {
                rest.to_string()
            })),
            "cat" if !rest.is_empty() => Ok(Command::Cat(rest.to_string())),
            "echo" => {
                let (data, path) = rest.split_once('>').ok_or(Error::InvalidArgument)?;
                let path = path.trim();
                if path.is_empty() {
                    return Err(Error::InvalidArgument);
                }
                Ok(Command::Echo {
                    data: unquote(data.trim()).to_string(),
                    path: path.to_string(),
                })
            }
            _ => Err(Error::InvalidArgument),
        }
    }

    /// Runs the command as root and returns what should be printed.
    pub fn execute(&self, sysfs: &Sysfs) -> Result<String> {
        match self {
            Command::Cat(path) => sysfs.read(path, Accessor::Owner),
            Command::Echo { data, path } => {
                sysfs.write(path, format!("{data}\n").as_bytes(), Accessor::Owner)?;
                Ok(String::new())
            }
            Command::Ls(dir) => Ok(sysfs
                .list(dir)?
                .into_iter()
                .map(|name| name + "\n")
                .collect()),
            Command::Help => Ok(format!("{HELP}\n")),
            Command::Quit | Command::Nop => Ok(String::new()),
        }
    }
}

/// Reads lines on a dedicated thread and hands them over a channel.
///
/// A blocking read cannot be cancelled, so it must not live on the runtime's
/// blocking pool: the runtime would wait for it on shutdown. The thread ends
/// at EOF, on a read error, or once the receiver is gone and a line arrives.
pub fn spawn_reader<R>(reader: R) -> mpsc::Receiver<String>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(16);
    thread::spawn(move || {
        for line in reader.lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    log::warn!("console read failed: {}", e);
                    break;
                }
            }
        }
    });
    rx
}

fn unquote(s: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = s.strip_prefix(quote).and_then(|s| s.strip_suffix(quote)) {
            return inner;
        }
    }
    s
}
