//! The LDAP surface the enrollment pipeline consumes, and its
//! implementation over a bound [`ldap3::LdapConn`].

use std::collections::HashSet;

use ldap3::{LdapConn, Mod, Scope, SearchEntry};
use thiserror::Error;

/// LDAP result codes the pipeline reacts to by value.
pub const RC_NO_SUCH_OBJECT: u32 = 32;
pub const RC_INSUFFICIENT_ACCESS: u32 = 50;
pub const RC_OBJECT_CLASS_VIOLATION: u32 = 65;
pub const RC_ENTRY_ALREADY_EXISTS: u32 = 68;

#[derive(Error, Debug)]
pub enum DirectoryError {
    /// The server answered with a non-success result code.
    #[error("{text} (result code {rc})")]
    Server { rc: u32, text: String },
    /// The connection itself failed.
    #[error("{0}")]
    Transport(String),
}

impl DirectoryError {
    /// Server result code, when the server got far enough to send one.
    pub fn rc(&self) -> Option<u32> {
        match self {
            DirectoryError::Server { rc, .. } => Some(*rc),
            DirectoryError::Transport(_) => None,
        }
    }
}

impl From<ldap3::LdapError> for DirectoryError {
    fn from(err: ldap3::LdapError) -> Self {
        match err {
            ldap3::LdapError::LdapResult { result } => DirectoryError::Server {
                rc: result.rc,
                text: result.text,
            },
            other => DirectoryError::Transport(other.to_string()),
        }
    }
}

/// Directory operations used while enrolling.
///
/// Only what the pipeline needs: base-scope reads of single objects, entry
/// creation, replace-modifies and one attribute compare. The production
/// implementation is [`LdapDirectory`]; tests supply mocks.
pub trait DirectoryClient {
    /// Base-scope search at `base`. Yields no entries when the object
    /// exists but does not match `filter`, and `RC_NO_SUCH_OBJECT` when
    /// there is no object at `base` at all.
    fn search_base(
        &mut self,
        base: &str,
        filter: &str,
        attrs: &[&str],
    ) -> Result<Vec<SearchEntry>, DirectoryError>;

    fn add(&mut self, dn: &str, attrs: &[(&str, Vec<String>)]) -> Result<(), DirectoryError>;

    fn modify_replace(
        &mut self,
        dn: &str,
        mods: &[(&str, Vec<String>)],
    ) -> Result<(), DirectoryError>;

    /// LDAP compare of a single attribute value at `dn`.
    fn compare(&mut self, dn: &str, attr: &str, value: &str) -> Result<bool, DirectoryError>;
}

/// [`DirectoryClient`] over an `ldap3` connection. The connection must
/// already be bound; binding is the connection layer's job.
pub struct LdapDirectory {
    ldap: LdapConn,
}

impl LdapDirectory {
    pub fn new(ldap: LdapConn) -> LdapDirectory {
        LdapDirectory { ldap }
    }
}

impl DirectoryClient for LdapDirectory {
    fn search_base(
        &mut self,
        base: &str,
        filter: &str,
        attrs: &[&str],
    ) -> Result<Vec<SearchEntry>, DirectoryError> {
        let attrs: Vec<String> = attrs.iter().map(|attr| attr.to_string()).collect();
        let (entries, _) = self
            .ldap
            .search(base, Scope::Base, filter, attrs)
            .map_err(DirectoryError::from)?
            .success()
            .map_err(DirectoryError::from)?;
        Ok(entries.into_iter().map(SearchEntry::construct).collect())
    }

    fn add(&mut self, dn: &str, attrs: &[(&str, Vec<String>)]) -> Result<(), DirectoryError> {
        let attrs: Vec<(String, HashSet<String>)> = attrs
            .iter()
            .map(|(name, values)| (name.to_string(), values.iter().cloned().collect()))
            .collect();
        self.ldap
            .add(dn, attrs)
            .map_err(DirectoryError::from)?
            .success()
            .map_err(DirectoryError::from)?;
        Ok(())
    }

    fn modify_replace(
        &mut self,
        dn: &str,
        mods: &[(&str, Vec<String>)],
    ) -> Result<(), DirectoryError> {
        let mods: Vec<Mod<String>> = mods
            .iter()
            .map(|(name, values)| {
                Mod::Replace(name.to_string(), values.iter().cloned().collect())
            })
            .collect();
        self.ldap
            .modify(dn, mods)
            .map_err(DirectoryError::from)?
            .success()
            .map_err(DirectoryError::from)?;
        Ok(())
    }

    fn compare(&mut self, dn: &str, attr: &str, value: &str) -> Result<bool, DirectoryError> {
        self.ldap
            .compare(dn, attr, value.to_string())
            .map_err(DirectoryError::from)?
            .equal()
            .map_err(DirectoryError::from)
    }
}

/// First value of `attr` on `entry`, if present.
pub(crate) fn entry_value<'a>(entry: &'a SearchEntry, attr: &str) -> Option<&'a str> {
    entry
        .attrs
        .get(attr)
        .and_then(|values| values.first())
        .map(String::as_str)
}

/// Multi-valued set equality. Attribute definitions rule here, so the
/// comparison is case sensitive and server casing is preserved.
pub(crate) fn values_equal(current: &[String], desired: &[String]) -> bool {
    let current: HashSet<&str> = current.iter().map(String::as_str).collect();
    let desired: HashSet<&str> = desired.iter().map(String::as_str).collect();
    current == desired
}
