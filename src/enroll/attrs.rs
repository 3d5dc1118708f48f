//! Post-creation attribute handling: key version, supported encryption
//! types, dNSHostName and servicePrincipalName.

use log::{info, warn};

use super::reconcile::filter_for_necessary_updates;
use super::{Enrollment, Setting};
use crate::directory::{self, DirectoryClient, DirectoryError, RC_INSUFFICIENT_ACCESS};
use crate::enctypes;
use crate::error::{Error, Result};

impl Enrollment {
    pub(super) fn retrieve_computer_account_info(&mut self) -> Result<()> {
        let dn = self
            .computer_dn
            .clone()
            .ok_or_else(|| Error::Unexpected("computer DN was not calculated".to_string()))?;

        let attrs = [
            "msDS-KeyVersionNumber",
            "msDS-supportedEncryptionTypes",
            "dNSHostName",
            "servicePrincipalName",
        ];

        let result = self
            .conn
            .directory()
            .search_base(&dn, "(objectClass=*)", &attrs);
        let entries = match result {
            Ok(entries) => entries,
            Err(e) => {
                return Err(self.conn.directory_failure(format!(
                    "Couldn't retrieve computer account info: {}: {}",
                    dn, e
                )));
            }
        };
        self.computer_attributes = entries.into_iter().next();

        // Update the kvno, unless the caller forced one.
        if self.kvno == 0 {
            let value = self
                .computer_attributes
                .as_ref()
                .and_then(|entry| directory::entry_value(entry, "msDS-KeyVersionNumber"))
                .map(str::to_string);
            match value {
                Some(value) => match value.parse::<u32>() {
                    Ok(kvno) => {
                        self.kvno = kvno;
                        info!(
                            "Retrieved kvno '{}' for computer account in directory: {}",
                            value, dn
                        );
                    }
                    Err(_) => {
                        return Err(self.conn.directory_failure(format!(
                            "Invalid kvno '{}' for computer account in directory: {}",
                            value, dn
                        )));
                    }
                },
                None => {
                    // Old AD didn't have this attribute; zero means the
                    // keytab entries carry whatever version is current.
                    self.kvno = 0;
                    info!("No kvno found for computer account in directory: {}", dn);
                }
            }
        }

        Ok(())
    }

    /// The server must know which enctypes this client can use, because a
    /// keytab cannot adapt to a new one thrown at it later. Adopt what the
    /// account already declares unless the caller chose explicitly, then
    /// write the effective mask back if it differs.
    pub(super) fn update_and_calculate_enctypes(&mut self) -> Result<()> {
        let dn = self
            .computer_dn
            .clone()
            .ok_or_else(|| Error::Unexpected("computer DN was not calculated".to_string()))?;

        let stored = self
            .computer_attributes
            .as_ref()
            .and_then(|entry| directory::entry_value(entry, "msDS-supportedEncryptionTypes"))
            .map(str::to_string);

        if !self.keytab_enctypes.is_explicit() {
            if let Some(value) = &stored {
                match enctypes::parse_enctypes(value) {
                    Some(read) => self.keytab_enctypes = Setting::Derived(read),
                    None => warn!(
                        "Invalid or unsupported encryption types are set on the computer account ({}).",
                        value
                    ),
                }
            }
        }

        let new_value = match enctypes::format_enctypes(self.keytab_enctypes()) {
            Some(value) => value,
            None => {
                warn!("The encryption types desired are not available in active directory");
                return Err(Error::Config(
                    "encryption types not representable in the directory".to_string(),
                ));
            }
        };

        // If the directory already holds this value there is nothing to do.
        if stored.as_deref() == Some(new_value.as_str()) {
            return Ok(());
        }

        let mods = filter_for_necessary_updates(
            self.computer_attributes.as_ref(),
            vec![("msDS-supportedEncryptionTypes", vec![new_value])],
        );
        if mods.is_empty() {
            return Ok(());
        }

        let result = self.conn.directory().modify_replace(&dn, &mods);
        match result {
            Ok(()) => Ok(()),
            Err(
                e @ DirectoryError::Server {
                    rc: RC_INSUFFICIENT_ACCESS,
                    ..
                },
            ) => Err(self.conn.credentials_failure(format!(
                "Insufficient permissions to set encryption types on computer account: {}: {}",
                dn, e
            ))),
            Err(e) => Err(self.conn.directory_failure(format!(
                "Couldn't set encryption types on computer account: {}: {}",
                dn, e
            ))),
        }
    }

    pub(super) fn update_dns_host_name(&mut self) -> Result<()> {
        let dn = self
            .computer_dn
            .clone()
            .ok_or_else(|| Error::Unexpected("computer DN was not calculated".to_string()))?;
        let Some(fqdn) = self.host_fqdn.value().cloned() else {
            return Ok(());
        };

        let mods = filter_for_necessary_updates(
            self.computer_attributes.as_ref(),
            vec![("dNSHostName", vec![fqdn])],
        );
        if mods.is_empty() {
            return Ok(());
        }

        let result = self.conn.directory().modify_replace(&dn, &mods);
        match result {
            Ok(()) => Ok(()),
            Err(
                e @ DirectoryError::Server {
                    rc: RC_INSUFFICIENT_ACCESS,
                    ..
                },
            ) => Err(self.conn.credentials_failure(format!(
                "Insufficient permissions to set host name on computer account: {}: {}",
                dn, e
            ))),
            Err(e) => Err(self.conn.directory_failure(format!(
                "Couldn't set host name on computer account: {}: {}",
                dn, e
            ))),
        }
    }

    pub(super) fn update_service_principals(&mut self) -> Result<()> {
        let dn = self
            .computer_dn
            .clone()
            .ok_or_else(|| Error::Unexpected("computer DN was not calculated".to_string()))?;
        let spns = self
            .service_principals
            .value()
            .cloned()
            .ok_or_else(|| Error::Unexpected("service principals were not derived".to_string()))?;

        let mods = filter_for_necessary_updates(
            self.computer_attributes.as_ref(),
            vec![("servicePrincipalName", spns)],
        );
        if mods.is_empty() {
            return Ok(());
        }

        let result = self.conn.directory().modify_replace(&dn, &mods);
        match result {
            Ok(()) => Ok(()),
            Err(
                e @ DirectoryError::Server {
                    rc: RC_INSUFFICIENT_ACCESS,
                    ..
                },
            ) => Err(self.conn.credentials_failure(format!(
                "Insufficient permissions to set service principals on computer account: {}: {}",
                dn, e
            ))),
            Err(e) => Err(self.conn.directory_failure(format!(
                "Couldn't set service principals on computer account: {}: {}",
                dn, e
            ))),
        }
    }
}
