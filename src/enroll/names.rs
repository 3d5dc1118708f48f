//! Derivation stages: host name, computer name, sAMAccountName, password
//! and service principals.

use log::info;
use rand::RngCore;
use zeroize::Zeroizing;

use super::{Enrollment, Setting};
use crate::error::{Error, Result};
use crate::principal::Principal;

const GENERATED_PASSWORD_LENGTH: usize = 120;

/// Generate a random machine password. Windows only accepts ASCII between
/// 32 and 122 inclusive, so random bytes are filtered down to that range
/// until enough survive.
fn generate_host_password(length: usize) -> Zeroizing<String> {
    let mut rng = rand::thread_rng();
    let mut password = Zeroizing::new(String::with_capacity(length));
    let mut buffer = Zeroizing::new([0u8; 128]);

    while password.len() < length {
        rng.fill_bytes(&mut buffer[..]);
        for byte in buffer.iter() {
            if (32..=122).contains(byte) && password.len() < length {
                password.push(*byte as char);
            }
        }
    }

    password
}

/// The deterministic password Active Directory assigns after an account
/// reset: the computer name, lowercased, truncated to 14 bytes.
fn calc_reset_password(computer_name: &str) -> Zeroizing<String> {
    let mut password = computer_name.to_lowercase();
    password.truncate(14);
    Zeroizing::new(password)
}

impl Enrollment {
    pub(super) fn ensure_host_fqdn(&mut self) -> Result<()> {
        match &self.host_fqdn {
            Setting::Explicit(fqdn) | Setting::Derived(fqdn) => {
                info!("Using fully qualified name: {}", fqdn);
                Ok(())
            }
            Setting::Suppressed => {
                info!("Not setting fully qualified name");
                Ok(())
            }
            Setting::Unset => {
                // By default use the host name discovered while connecting.
                let discovered = self.conn.host_fqdn().map(str::to_string);
                if let Some(fqdn) = discovered {
                    self.host_fqdn = Setting::Derived(fqdn);
                }
                Ok(())
            }
        }
    }

    pub(super) fn ensure_computer_name(&mut self) -> Result<()> {
        if let Some(name) = self.computer_name.value() {
            info!("Enrolling computer name: {}", name);
            return Ok(());
        }

        let Some(fqdn) = self.host_fqdn.value().cloned() else {
            return Err(self.conn.config_failure(
                "No host name from which to determine the computer name".to_string(),
            ));
        };

        // Use the fqdn minus the domain part. No dot, or a dot first or
        // last, means there is nothing to split off.
        let name = match fqdn.split_once('.') {
            Some((name, domain)) if !name.is_empty() && !domain.is_empty() => name.to_uppercase(),
            _ => {
                return Err(self.conn.config_failure(format!(
                    "Couldn't determine the computer account name from host name: {}",
                    fqdn
                )));
            }
        };

        info!("Calculated computer account name from fqdn: {}", name);
        self.computer_name = Setting::Derived(name);
        Ok(())
    }

    pub(super) fn ensure_computer_sam(&mut self) -> Result<()> {
        let name = self
            .computer_name
            .value()
            .cloned()
            .ok_or_else(|| Error::Unexpected("computer name was not derived".to_string()))?;

        let sam = format!("{}$", name);
        let principal = Principal::parse(&sam, self.conn.domain_realm())
            .map_err(|e| Error::Unexpected(format!("couldn't parse computer principal: {}", e)))?;

        self.computer_sam = Some(sam);
        self.computer_principal = Some(principal);
        Ok(())
    }

    pub(super) fn ensure_computer_password(&mut self) -> Result<()> {
        if self.computer_password.value().is_some() {
            return Ok(());
        }

        if self.reset_password {
            let name = self
                .computer_name
                .value()
                .cloned()
                .ok_or_else(|| Error::Unexpected("computer name was not derived".to_string()))?;
            self.computer_password = Setting::Derived(calc_reset_password(&name));
            info!("Using default reset computer password");
        } else {
            self.computer_password =
                Setting::Derived(generate_host_password(GENERATED_PASSWORD_LENGTH));
            info!(
                "Generated {} character computer password",
                GENERATED_PASSWORD_LENGTH
            );
        }

        Ok(())
    }

    pub(super) fn ensure_service_names(&mut self) -> Result<()> {
        if self.service_names.is_none() {
            // The default services specified by MS.
            self.service_names = Some(vec!["HOST".to_string(), "RestrictedKrbHost".to_string()]);
        }
        Ok(())
    }

    pub(super) fn ensure_service_principals(&mut self) -> Result<()> {
        if self.service_principals.value().is_none() {
            let names = self
                .service_names
                .clone()
                .ok_or_else(|| Error::Unexpected("service names were not derived".to_string()))?;
            let name = self
                .computer_name
                .value()
                .cloned()
                .ok_or_else(|| Error::Unexpected("computer name was not derived".to_string()))?;
            let fqdn = self.host_fqdn.value().cloned();

            let mut principals = Vec::new();
            for service in &names {
                principals.push(format!("{}/{}", service, name));
                if let Some(fqdn) = &fqdn {
                    principals.push(format!("{}/{}", service, fqdn));
                }
            }
            self.service_principals = Setting::Derived(principals);
        }

        // Prepare the principals going into the keytab: the computer
        // account principal always leads, services follow in order.
        let computer = self
            .computer_principal
            .clone()
            .ok_or_else(|| Error::Unexpected("computer principal was not derived".to_string()))?;
        let realm = self.conn.domain_realm().to_string();
        let spns = self
            .service_principals
            .value()
            .cloned()
            .unwrap_or_default();

        self.keytab_principals.clear();
        self.keytab_principals.push(computer);
        for spn in &spns {
            let principal = Principal::parse(spn, &realm).map_err(|e| {
                self.conn.config_failure(format!(
                    "Couldn't parse kerberos service principal: {}: {}",
                    spn, e
                ))
            })?;
            self.keytab_principals.push(principal);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_password_length_and_range() {
        let password = generate_host_password(GENERATED_PASSWORD_LENGTH);
        assert_eq!(password.len(), 120);
        assert!(password.bytes().all(|b| (32..=122).contains(&b)));
    }

    #[test]
    fn test_generated_passwords_differ() {
        let a = generate_host_password(GENERATED_PASSWORD_LENGTH);
        let b = generate_host_password(GENERATED_PASSWORD_LENGTH);
        assert_ne!(*a, *b);
    }

    #[test]
    fn test_reset_password_is_lowercased_name() {
        assert_eq!(*calc_reset_password("HOST1"), "host1");
    }

    #[test]
    fn test_reset_password_truncates_to_14() {
        assert_eq!(
            *calc_reset_password("VERYLONGMACHINENAME"),
            "verylongmachin"
        );
    }
}
