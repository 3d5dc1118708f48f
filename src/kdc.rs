//! The Kerberos operations the enrollment pipeline consumes.
//!
//! Both password protocols of RFC 3244 and the initial-authentication
//! probe used for salt discovery live behind this seam. The production
//! implementation belongs to the connection layer, which owns the krb5
//! context and the login credential cache.

use thiserror::Error;

use crate::principal::Principal;

/// Reply to an RFC 3244 password operation.
#[derive(Debug, Clone)]
pub struct KpasswdReply {
    /// Protocol result code; zero means the password was accepted.
    pub result_code: u16,
    /// Short result name from the reply, e.g. "Password change rejected".
    pub result_string: String,
    /// Server-supplied human readable explanation, when one was sent.
    pub message: Option<String>,
}

impl KpasswdReply {
    pub fn accepted() -> KpasswdReply {
        KpasswdReply {
            result_code: 0,
            result_string: String::new(),
            message: None,
        }
    }
}

/// A Kerberos library or transport failure, as opposed to a protocol
/// result the server sent back.
#[derive(Error, Debug)]
#[error("{0}")]
pub struct KdcError(pub String);

pub trait KdcClient {
    /// Set `target`'s password through the login credential cache. This is
    /// the administrative reset; it does not need the old password.
    fn set_password(
        &self,
        target: &Principal,
        new_password: &str,
    ) -> Result<KpasswdReply, KdcError>;

    /// Change `target`'s password using its own current key. The
    /// implementation authenticates as the computer and obtains a
    /// `kadmin/changepw` service ticket first.
    fn change_password(
        &self,
        target: &Principal,
        new_password: &str,
    ) -> Result<KpasswdReply, KdcError>;

    /// Attempt an initial authentication for `principal` with an explicit
    /// long-term key. `Ok(false)` means the KDC rejected the key, which
    /// during salt discovery just means the salt was wrong.
    fn try_key(
        &self,
        principal: &Principal,
        etype: i32,
        key: &[u8],
        kvno: u32,
    ) -> Result<bool, KdcError>;
}
