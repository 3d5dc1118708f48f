//! Create the computer object, or reconcile an existing one with the
//! attributes a fresh enrollment would have written.

use ldap3::SearchEntry;
use log::info;

use super::Enrollment;
use crate::directory::{
    self, DirectoryClient, DirectoryError, RC_INSUFFICIENT_ACCESS, RC_NO_SUCH_OBJECT,
    RC_OBJECT_CLASS_VIOLATION,
};
use crate::error::{Error, Result};

/// WORKSTATION_TRUST_ACCOUNT | DONT_EXPIRE_PASSWD
const COMPUTER_ACCOUNT_CONTROL: &str = "69632";

/// Keep only mods whose desired value set differs from what the entry
/// already holds. With no entry nothing is filtered.
pub(super) fn filter_for_necessary_updates(
    entry: Option<&SearchEntry>,
    mods: Vec<(&'static str, Vec<String>)>,
) -> Vec<(&'static str, Vec<String>)> {
    mods.into_iter()
        .filter(|(attr, values)| match entry.and_then(|e| e.attrs.get(*attr)) {
            Some(current) => !directory::values_equal(current, values),
            None => true,
        })
        .collect()
}

fn mod_attr_names(mods: &[(&'static str, Vec<String>)]) -> String {
    mods.iter()
        .map(|(attr, _)| *attr)
        .collect::<Vec<_>>()
        .join(", ")
}

impl Enrollment {
    fn account_mods(&self) -> Vec<(&'static str, Vec<String>)> {
        vec![
            ("objectClass", vec!["computer".to_string()]),
            (
                "sAMAccountName",
                vec![self.computer_sam.clone().unwrap_or_default()],
            ),
            (
                "userAccountControl",
                vec![COMPUTER_ACCOUNT_CONTROL.to_string()],
            ),
        ]
    }

    pub(super) fn create_or_update_computer_account(
        &mut self,
        allow_overwrite: bool,
    ) -> Result<()> {
        let dn = self
            .computer_dn
            .clone()
            .ok_or_else(|| Error::Unexpected("computer DN was not calculated".to_string()))?;

        let mods = self.account_mods();
        let attrs: Vec<&str> = mods.iter().map(|(attr, _)| *attr).collect();

        let result = self.conn.directory().search_base(&dn, "(objectClass=*)", &attrs);
        match result {
            // No computer account, create a new one
            Err(DirectoryError::Server {
                rc: RC_NO_SUCH_OBJECT,
                ..
            }) => self.create_computer_account(&dn, mods),

            // Have a computer account, figure out what to update
            Ok(entries) => {
                if !allow_overwrite {
                    let name = self.computer_name.value().cloned().unwrap_or_default();
                    return Err(self
                        .conn
                        .config_failure(format!("The computer account {} already exists", name)));
                }
                let mods = filter_for_necessary_updates(entries.first(), mods);
                if mods.is_empty() {
                    return Ok(());
                }
                self.modify_computer_account(&dn, mods)
            }

            Err(e) => Err(self
                .conn
                .directory_failure(format!("Couldn't lookup computer account: {}: {}", dn, e))),
        }
    }

    fn create_computer_account(
        &mut self,
        dn: &str,
        mods: Vec<(&'static str, Vec<String>)>,
    ) -> Result<()> {
        // Don't send blank attributes
        let mods: Vec<(&'static str, Vec<String>)> = mods
            .into_iter()
            .filter(|(_, values)| values.iter().any(|value| !value.is_empty()))
            .collect();

        info!(
            "Creating computer account with attributes: {}",
            mod_attr_names(&mods)
        );

        let result = self.conn.directory().add(dn, &mods);
        match result {
            Ok(()) => {
                info!("Created computer account: {}", dn);
                Ok(())
            }
            // AD answers with an object class violation when the creating
            // account lacks permission to set some of the attributes, so
            // treat it like a permission problem.
            Err(
                e @ DirectoryError::Server {
                    rc: RC_INSUFFICIENT_ACCESS | RC_OBJECT_CLASS_VIOLATION,
                    ..
                },
            ) => Err(self.conn.credentials_failure(format!(
                "Insufficient permissions to modify computer account: {}: {}",
                dn, e
            ))),
            Err(e) => Err(self
                .conn
                .directory_failure(format!("Couldn't create computer account: {}: {}", dn, e))),
        }
    }

    fn modify_computer_account(
        &mut self,
        dn: &str,
        mods: Vec<(&'static str, Vec<String>)>,
    ) -> Result<()> {
        info!(
            "Modifying computer account attributes: {}",
            mod_attr_names(&mods)
        );

        let result = self.conn.directory().modify_replace(dn, &mods);
        match result {
            Ok(()) => {
                info!("Updated existing computer account: {}", dn);
                Ok(())
            }
            Err(
                e @ DirectoryError::Server {
                    rc: RC_INSUFFICIENT_ACCESS,
                    ..
                },
            ) => Err(self.conn.credentials_failure(format!(
                "Insufficient permissions to modify computer account: {}: {}",
                dn, e
            ))),
            Err(e) => Err(self
                .conn
                .directory_failure(format!("Couldn't modify computer account: {}: {}", dn, e))),
        }
    }
}
