//! Reading comparison inputs from files or stdin.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputSource {
    File(PathBuf),
    Stdin,
}

impl InputSource {
    /// `-` means stdin, anything else is a path.
    pub fn parse(arg: &str) -> Self {
        if arg == "-" {
            Self::Stdin
        } else {
            Self::File(PathBuf::from(arg))
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::File(path) => Some(path),
            Self::Stdin => None,
        }
    }

    /// Default column label: the path as given, or "stdin".
    pub fn label(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Stdin => "stdin".to_string(),
        }
    }

    /// Extension of a file input, used to guess the syntax.
    pub fn extension(&self) -> Option<&str> {
        self.path()
            .and_then(|path| path.extension())
            .and_then(|ext| ext.to_str())
    }

    pub fn read(&self) -> Result<String> {
        match self {
            Self::File(path) => {
                let bytes =
                    fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
                String::from_utf8(bytes)
                    .map_err(|_| anyhow!("{} is not valid UTF-8 text", path.display()))
            }
            Self::Stdin => {
                let mut buf = String::new();
                io::stdin()
                    .read_to_string(&mut buf)
                    .context("Failed to read text from stdin")?;
                Ok(buf)
            }
        }
    }
}

/// Rejects input pairs that cannot both be read.
pub fn check_pair(previous: &InputSource, current: &InputSource) -> Result<()> {
    if *previous == InputSource::Stdin && *current == InputSource::Stdin {
        return Err(anyhow!("Only one of the two inputs can be read from stdin"));
    }
    Ok(())
}
