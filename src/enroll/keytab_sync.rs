//! Keytab synchronization: open the host keytab, prune stale keys,
//! discover the right salt and write fresh entries for every principal.

use std::time::{SystemTime, UNIX_EPOCH};

use log::{info, warn};

use super::{Enrollment, Setting};
use crate::enctypes;
use crate::error::{Error, Result};
use crate::kdc::KdcClient;
use crate::keytab::{self, Keyblock, Keytab, KeytabEntry};
use crate::principal::{w2k3_salt, Principal};

impl Enrollment {
    pub(super) fn ensure_host_keytab(&mut self) -> Result<()> {
        if self.keytab.is_some() {
            return Ok(());
        }

        let path = match self.keytab_path.value().cloned() {
            Some(path) => path,
            None => {
                let path = keytab::default_keytab_path().map_err(|e| {
                    self.conn
                        .io_failure(format!("Failed to open default keytab: {}", e))
                })?;
                self.keytab_path = Setting::Derived(path.clone());
                path
            }
        };

        let keytab = Keytab::load(&path).map_err(|e| {
            self.conn
                .io_failure(format!("Failed to open keytab: {}: {}", path.display(), e))
        })?;

        info!("Using keytab: {}", path.display());
        self.keytab = Some(keytab);
        Ok(())
    }

    /// Candidate salts in discovery order: the standard principal salt,
    /// the Windows 2003 computer account salt, then no salt at all.
    fn build_principal_salts(&self, principal: &Principal) -> Vec<Vec<u8>> {
        let name = self.computer_name.value().cloned().unwrap_or_default();
        vec![
            principal.default_salt(),
            w2k3_salt(self.conn.domain_realm(), &name),
            Vec::new(),
        ]
    }

    /// Pick the enctype the discovery probe authenticates with. Prefer one
    /// whose key actually depends on the salt.
    fn probe_enctype(&self) -> Option<i32> {
        let enctypes = self.keytab_enctypes();
        enctypes
            .iter()
            .copied()
            .find(|&etype| enctypes::uses_salt(etype))
            .or_else(|| {
                enctypes
                    .iter()
                    .copied()
                    .find(|&etype| enctypes::is_derivable(etype))
            })
    }

    /// Figure out which salt the KDC applied when it derived the account
    /// keys, by test-authenticating with each candidate. As a side effect
    /// this also proves the new password works.
    fn discover_salt(
        &self,
        principal: &Principal,
        principal_name: &str,
        password: &str,
        salts: &[Vec<u8>],
    ) -> Result<usize> {
        let Some(etype) = self.probe_enctype() else {
            return Err(self.conn.directory_failure(format!(
                "No usable encryption types to test the keytab salt: {}",
                principal_name
            )));
        };

        for (index, salt) in salts.iter().enumerate() {
            let Some(key) = enctypes::derive_key(etype, password, salt) else {
                continue;
            };
            let result = self.conn.kdc().try_key(principal, etype, &key, self.kvno);
            match result {
                Ok(true) => {
                    info!("Discovered which keytab salt to use");
                    return Ok(index);
                }
                Ok(false) => continue,
                Err(e) => {
                    return Err(self.conn.directory_failure(format!(
                        "Couldn't authenticate while discovering which salt to use: {}: {}",
                        principal_name, e
                    )));
                }
            }
        }

        Err(self.conn.directory_failure(format!(
            "Couldn't authenticate with any keytab salt: {}",
            principal_name
        )))
    }

    fn add_principal_to_keytab(
        &mut self,
        principal: &Principal,
        which_salt: &mut Option<usize>,
    ) -> Result<()> {
        let principal_name = principal.to_string();
        let kvno = self.kvno;

        // Remove this principal's old keys. Entries at kvno - 1 stay, so
        // sessions established against the previous key keep working.
        let keytab = self
            .keytab
            .as_mut()
            .ok_or_else(|| Error::Unexpected("keytab is not open".to_string()))?;
        let removed = keytab.remove_matching(|entry| {
            entry.principal.same_entity(principal) && entry.kvno() + 1 != kvno
        });
        if removed > 0 {
            info!("Cleared {} old entries from keytab", removed);
        }

        let password = self
            .computer_password
            .value()
            .ok_or_else(|| Error::Unexpected("computer password was not derived".to_string()))?;
        let salts = self.build_principal_salts(principal);

        if which_salt.is_none() {
            *which_salt = Some(self.discover_salt(principal, &principal_name, password, &salts)?);
        }
        let salt = &salts[which_salt.unwrap_or(0)];

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs() as u32)
            .unwrap_or(0);

        let mut entries = Vec::new();
        for &etype in self.keytab_enctypes() {
            let Some(key) = enctypes::derive_key(etype, password.as_str(), salt) else {
                warn!(
                    "Skipping encryption type {} with no key derivation support",
                    etype
                );
                continue;
            };
            entries.push(KeytabEntry {
                principal: principal.clone(),
                timestamp,
                vno8: (kvno & 0xff) as u8,
                key: Keyblock {
                    keytype: etype as u16,
                    keyvalue: key,
                },
                vno: Some(kvno),
            });
        }

        let keytab = self
            .keytab
            .as_mut()
            .ok_or_else(|| Error::Unexpected("keytab is not open".to_string()))?;
        for entry in entries {
            keytab.push(entry);
        }

        info!("Added the entries to the keytab: {}", principal_name);
        Ok(())
    }

    pub(super) fn update_keytab_for_principals(&mut self) -> Result<()> {
        // Salting in keytabs is wild; the format has to be autodetected,
        // once, and reused for every principal after that.
        let mut which_salt = None;

        let principals = self.keytab_principals.clone();
        for principal in &principals {
            self.add_principal_to_keytab(principal, &mut which_salt)?;
        }

        let path = self
            .keytab_path
            .value()
            .cloned()
            .ok_or_else(|| Error::Unexpected("keytab path was not resolved".to_string()))?;
        let keytab = self
            .keytab
            .as_ref()
            .ok_or_else(|| Error::Unexpected("keytab is not open".to_string()))?;
        keytab.store(&path).map_err(|e| {
            self.conn
                .io_failure(format!("Couldn't update keytab: {}: {}", path.display(), e))
        })?;

        Ok(())
    }
}
