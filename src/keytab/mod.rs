//! MIT keytab files: in-memory image, file I/O, default path resolution.

pub mod parser;
pub mod writer;

use std::env;
use std::io;
use std::path::{Path, PathBuf};

use crate::principal::Principal;

pub use parser::ParseError;

const DEFAULT_KEYTAB_PATH: &str = "/etc/krb5.keytab";

/// One keytab record: key material for a (principal, kvno, enctype).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeytabEntry {
    pub principal: Principal,
    /// When the key was written, seconds since the epoch.
    pub timestamp: u32,
    /// Truncated key version kept for pre-1.14 readers.
    pub vno8: u8,
    pub key: Keyblock,
    /// Full 32 bit key version, present in keytabs since krb5 1.14.
    pub vno: Option<u32>,
}

impl KeytabEntry {
    /// Effective key version. The 32 bit field wins when present and
    /// non-zero, the way MIT resolves it.
    pub fn kvno(&self) -> u32 {
        match self.vno {
            Some(vno) if vno != 0 => vno,
            _ => self.vno8 as u32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyblock {
    pub keytype: u16,
    pub keyvalue: Vec<u8>,
}

/// In-memory image of a keytab file.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Keytab {
    pub entries: Vec<KeytabEntry>,
}

impl Keytab {
    /// Read a keytab file. A missing file is an empty keytab, so a first
    /// enrollment can create it.
    pub fn load(path: &Path) -> Result<Keytab, ParseError> {
        match std::fs::read(path) {
            Ok(data) => parser::parse_keytab_bytes(&data),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Keytab::default()),
            Err(err) => Err(ParseError::Io(err)),
        }
    }

    pub fn store(&self, path: &Path) -> io::Result<()> {
        std::fs::write(path, writer::write_keytab_bytes(self)?)
    }

    /// Remove every entry matching `pred`; returns how many were dropped.
    pub fn remove_matching<F>(&mut self, mut pred: F) -> usize
    where
        F: FnMut(&KeytabEntry) -> bool,
    {
        let before = self.entries.len();
        self.entries.retain(|entry| !pred(entry));
        before - self.entries.len()
    }

    pub fn push(&mut self, entry: KeytabEntry) {
        self.entries.push(entry);
    }
}

/// Resolve the keytab path to use when the caller didn't name one:
/// `KRB5_KTNAME` when it points at a file keytab, else the system default.
pub fn default_keytab_path() -> Result<PathBuf, String> {
    match env::var("KRB5_KTNAME") {
        Ok(name) => {
            if let Some(path) = name.strip_prefix("FILE:") {
                Ok(PathBuf::from(path))
            } else if name.contains(':') {
                Err(format!("unsupported keytab type: {}", name))
            } else {
                Ok(PathBuf::from(name))
            }
        }
        Err(_) => Ok(PathBuf::from(DEFAULT_KEYTAB_PATH)),
    }
}
