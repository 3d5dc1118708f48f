//! Set or change the computer password, selecting the Kerberos protocol
//! that matches the credentials the connection holds.

use log::info;

use super::Enrollment;
use crate::conn::LoginType;
use crate::error::{Error, Result};
use crate::kdc::{KdcClient, KpasswdReply};

fn chpw_message(prefix: &str, reply: &KpasswdReply) -> String {
    match &reply.message {
        Some(message) => format!("{}: {}: {}", prefix, reply.result_string, message),
        None => format!("{}: {}", prefix, reply.result_string),
    }
}

impl Enrollment {
    pub(super) fn change_computer_password(&mut self) -> Result<()> {
        match self.conn.login_type() {
            LoginType::ComputerAccount => self.set_password_with_computer_creds(),
            LoginType::UserAccount => self.set_password_with_user_creds(),
        }
    }

    fn set_password_with_user_creds(&mut self) -> Result<()> {
        let principal = self
            .computer_principal
            .clone()
            .ok_or_else(|| Error::Unexpected("computer principal was not derived".to_string()))?;
        let sam = self.computer_sam.clone().unwrap_or_default();
        let password = self
            .computer_password
            .value()
            .ok_or_else(|| Error::Unexpected("computer password was not derived".to_string()))?;

        let result = self.conn.kdc().set_password(&principal, password);
        match result {
            Err(e) => Err(self.conn.directory_failure(format!(
                "Couldn't set password for computer account: {}: {}",
                sam, e
            ))),
            Ok(reply) if reply.result_code != 0 => Err(self
                .conn
                .credentials_failure(chpw_message("Cannot set computer password", &reply))),
            Ok(_) => {
                info!("Set computer password");
                Ok(())
            }
        }
    }

    fn set_password_with_computer_creds(&mut self) -> Result<()> {
        let principal = self
            .computer_principal
            .clone()
            .ok_or_else(|| Error::Unexpected("computer principal was not derived".to_string()))?;
        let sam = self.computer_sam.clone().unwrap_or_default();
        let password = self
            .computer_password
            .value()
            .ok_or_else(|| Error::Unexpected("computer password was not derived".to_string()))?;

        let result = self.conn.kdc().change_password(&principal, password);
        match result {
            Err(e) => Err(self.conn.directory_failure(format!(
                "Couldn't change password for computer account: {}: {}",
                sam, e
            ))),
            Ok(reply) if reply.result_code != 0 => Err(self
                .conn
                .credentials_failure(chpw_message("Cannot change computer password", &reply))),
            Ok(_) => {
                info!("Changed computer password");
                Ok(())
            }
        }
    }
}
