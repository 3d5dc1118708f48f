//! Kerberos principal names and the salts derived from them.

use std::fmt;

use kerberos_constants::principal_names::NT_PRINCIPAL;
use thiserror::Error;

#[derive(Error, Debug)]
#[error("malformed kerberos principal: {0}")]
pub struct ParsePrincipalError(pub String);

/// A Kerberos principal within a fixed realm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub name_type: i32,
    pub components: Vec<String>,
    pub realm: String,
}

impl Principal {
    /// Parse a principal name such as `HOST1$` or `HOST/host1.example.com`,
    /// forcing `realm` regardless of any realm carried by the input.
    pub fn parse(name: &str, realm: &str) -> Result<Principal, ParsePrincipalError> {
        let body = match name.rsplit_once('@') {
            Some((body, _ignored_realm)) => body,
            None => name,
        };
        if body.is_empty() {
            return Err(ParsePrincipalError(name.to_string()));
        }
        let components: Vec<String> = body.split('/').map(str::to_string).collect();
        if components.iter().any(String::is_empty) {
            return Err(ParsePrincipalError(name.to_string()));
        }
        Ok(Principal {
            name_type: NT_PRINCIPAL,
            components,
            realm: realm.to_string(),
        })
    }

    /// True when both name the same entity. The name type does not
    /// participate, matching how krb5 compares principals.
    pub fn same_entity(&self, other: &Principal) -> bool {
        self.components == other.components && self.realm == other.realm
    }

    /// Default Kerberos salt: the realm followed by every name component,
    /// concatenated without separators.
    pub fn default_salt(&self) -> Vec<u8> {
        let mut salt = self.realm.clone().into_bytes();
        for component in &self.components {
            salt.extend_from_slice(component.as_bytes());
        }
        salt
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.components.join("/"), self.realm)
    }
}

/// Salt used by Windows 2003 era domain controllers for computer account
/// keys: `REALM | "host" | lowercase name | "." | lowercase realm`.
pub fn w2k3_salt(realm: &str, computer_name: &str) -> Vec<u8> {
    let mut salt = realm.as_bytes().to_vec();
    salt.extend_from_slice(b"host");
    salt.extend_from_slice(computer_name.to_lowercase().as_bytes());
    salt.push(b'.');
    salt.extend_from_slice(realm.to_lowercase().as_bytes());
    salt
}
