use std::cell::{RefCell, RefMut};

use log::error;

use crate::directory::DirectoryClient;
use crate::error::Error;
use crate::kdc::KdcClient;

/// Which kind of credentials the connection layer bound with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginType {
    /// An administrative user logged in, typically to create the account.
    UserAccount,
    /// The computer itself logged in with its current password.
    ComputerAccount,
}

/// Facts about the domain, discovered by the connection layer before the
/// LDAP bind.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Fully qualified name of this host, if discovery produced one.
    pub host_fqdn: Option<String>,
    /// Default naming context of the directory, e.g. `DC=example,DC=com`.
    pub naming_context: String,
    /// Kerberos realm of the domain, e.g. `EXAMPLE.COM`.
    pub domain_realm: String,
    pub login_type: LoginType,
}

/// Shared handle to the external collaborators: an LDAP connection that is
/// already bound via SASL/GSSAPI and a Kerberos client holding the login
/// credentials.
///
/// A connection may back several enrollment sessions, but it is not
/// re-entrant; sessions borrow the directory one pipeline stage at a time.
pub struct Connection {
    config: ConnectionConfig,
    directory: RefCell<Box<dyn DirectoryClient>>,
    kdc: Box<dyn KdcClient>,
    last_error: RefCell<Option<String>>,
}

impl Connection {
    pub fn new(
        config: ConnectionConfig,
        directory: Box<dyn DirectoryClient>,
        kdc: Box<dyn KdcClient>,
    ) -> Connection {
        Connection {
            config,
            directory: RefCell::new(directory),
            kdc,
            last_error: RefCell::new(None),
        }
    }

    pub fn host_fqdn(&self) -> Option<&str> {
        self.config.host_fqdn.as_deref()
    }

    pub fn naming_context(&self) -> &str {
        &self.config.naming_context
    }

    pub fn domain_realm(&self) -> &str {
        &self.config.domain_realm
    }

    pub fn login_type(&self) -> LoginType {
        self.config.login_type
    }

    pub(crate) fn directory(&self) -> RefMut<'_, Box<dyn DirectoryClient>> {
        self.directory.borrow_mut()
    }

    pub(crate) fn kdc(&self) -> &dyn KdcClient {
        self.kdc.as_ref()
    }

    /// Human readable message for the most recent failure, if any.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.borrow().clone()
    }

    pub fn clear_last_error(&self) {
        self.last_error.borrow_mut().take();
    }

    fn record(&self, message: String) -> String {
        error!("{}", message);
        *self.last_error.borrow_mut() = Some(message.clone());
        message
    }

    pub(crate) fn directory_failure(&self, message: String) -> Error {
        Error::Directory(self.record(message))
    }

    pub(crate) fn credentials_failure(&self, message: String) -> Error {
        Error::Credentials(self.record(message))
    }

    pub(crate) fn config_failure(&self, message: String) -> Error {
        Error::Config(self.record(message))
    }

    pub(crate) fn io_failure(&self, message: String) -> Error {
        Error::Fail(self.record(message))
    }
}
