//! Enroll a host machine as a computer account in an Active Directory
//! domain and keep its keytab synchronized with the directory.
//!
//! The heart of the crate is [`enroll::Enrollment`], a session that walks
//! the join pipeline: derive names and a password, find where the computer
//! object belongs, create or update it, set its password over Kerberos,
//! push the remaining attributes and rewrite the host keytab. The LDAP
//! connection and the Kerberos password protocols are reached through the
//! [`directory::DirectoryClient`] and [`kdc::KdcClient`] seams, so the
//! pipeline can run against a bound [`ldap3::LdapConn`] in production and
//! against mocks in tests.

pub mod conn;
pub mod directory;
pub mod enctypes;
pub mod enroll;
pub mod error;
pub mod kdc;
pub mod keytab;
pub mod principal;

// Re-export commonly used types for convenience
pub use conn::{Connection, ConnectionConfig, LoginType};
pub use directory::{DirectoryClient, DirectoryError, LdapDirectory};
pub use enroll::{Enrollment, JoinFlags};
pub use error::{Error, Result};
pub use kdc::{KdcClient, KdcError, KpasswdReply};
pub use principal::Principal;
