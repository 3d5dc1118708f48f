//! Resolve where the computer account lives: organizational unit,
//! computer container, final distinguished name.

use log::{info, warn};

use super::Enrollment;
use crate::directory::{self, DirectoryClient};
use crate::error::{Error, Result};

/// Prefix tagging the default computers container in wellKnownObjects.
const COMPUTERS_CONTAINER_PREFIX: &str = "B:32:AA312825768811D1ADED00C04FD8D5CD:";

impl Enrollment {
    pub(super) fn validate_preferred_ou(&mut self) -> Result<()> {
        if self.preferred_ou_validated {
            return Ok(());
        }

        let ou = self
            .preferred_ou
            .clone()
            .ok_or_else(|| Error::Unexpected("no preferred ou to validate".to_string()))?;
        let base = self.conn.naming_context().to_string();

        // The directory base itself always passes.
        if ou.eq_ignore_ascii_case(&base) {
            self.preferred_ou_validated = true;
            return Ok(());
        }

        let result = self
            .conn
            .directory()
            .compare(&ou, "objectClass", "organizationalUnit");
        match result {
            Ok(true) => {
                info!("The computer organizational unit is valid: {}", ou);
                self.preferred_ou_validated = true;
                Ok(())
            }
            Ok(false) => Err(self
                .conn
                .config_failure(format!("The computer organizational unit is invalid: {}", ou))),
            Err(e) => Err(self.conn.directory_failure(format!(
                "Couldn't check preferred organizational unit: {}: {}",
                ou, e
            ))),
        }
    }

    pub(super) fn lookup_preferred_ou(&mut self) -> Result<()> {
        let base = self.conn.naming_context().to_string();

        // The preferredOU attribute is documented with this filter, but
        // most domains never carry it and the search comes back empty.
        // Kept as is until it can be tested against a domain that has it.
        let result = self
            .conn
            .directory()
            .search_base(&base, "(objectClass=computer)", &["preferredOU"]);
        let entries = match result {
            Ok(entries) => entries,
            Err(e) => {
                return Err(self.conn.directory_failure(format!(
                    "Couldn't lookup preferred organizational unit: {}",
                    e
                )));
            }
        };

        match entries
            .first()
            .and_then(|entry| directory::entry_value(entry, "preferredOU"))
            .map(str::to_string)
        {
            Some(ou) => self.preferred_ou = Some(ou),
            None => {
                info!(
                    "No preferred organizational unit found, using directory base: {}",
                    base
                );
                self.preferred_ou = Some(base);
            }
        }

        Ok(())
    }

    pub(super) fn lookup_computer_container(&mut self) -> Result<()> {
        if self.computer_container.is_some() {
            return Ok(());
        }

        let ou = self
            .preferred_ou
            .clone()
            .ok_or_else(|| Error::Unexpected("no ou to search for a container".to_string()))?;

        let result = self
            .conn
            .directory()
            .search_base(&ou, "(objectClass=*)", &["wellKnownObjects"]);
        let entries = match result {
            Ok(entries) => entries,
            Err(e) => {
                return Err(self
                    .conn
                    .directory_failure(format!("Couldn't lookup computer container: {}", e)));
            }
        };

        let container = entries
            .first()
            .and_then(|entry| entry.attrs.get("wellKnownObjects"))
            .into_iter()
            .flatten()
            .find_map(|value| value.strip_prefix(COMPUTERS_CONTAINER_PREFIX))
            .map(str::to_string);
        if let Some(container) = container {
            info!("Found well known computer container at: {}", container);
            self.computer_container = Some(container);
        }

        // Try harder
        if self.computer_container.is_none() {
            let result = self.conn.directory().search_base(
                &ou,
                "(&(objectClass=container)(cn=Computers))",
                &["wellKnownObjects"],
            );
            if let Ok(entries) = result {
                if let Some(entry) = entries.first() {
                    info!(
                        "Well known computer container not found, but found suitable one at: {}",
                        entry.dn
                    );
                    self.computer_container = Some(entry.dn.clone());
                }
            }
        }

        if self.computer_container.is_none() {
            warn!(
                "Couldn't find a computer container in the ou, creating computer account directly in: {}",
                ou
            );
            self.computer_container = Some(ou);
        }

        Ok(())
    }

    pub(super) fn calc_computer_account(&mut self) -> Result<()> {
        let container = self
            .computer_container
            .clone()
            .ok_or_else(|| Error::Unexpected("no computer container".to_string()))?;
        let name = self
            .computer_name
            .value()
            .cloned()
            .ok_or_else(|| Error::Unexpected("computer name was not derived".to_string()))?;

        let dn = format!("CN={},{}", name, container);
        info!("Calculated computer DN: {}", dn);
        self.computer_dn = Some(dn);
        Ok(())
    }
}
