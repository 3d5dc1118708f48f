//! The enrollment session and the join pipeline.
//!
//! An [`Enrollment`] aggregates caller configuration, state derived while
//! joining, and the handles that need cleanup afterwards. Each pipeline
//! stage lives in its own submodule and reads or writes session state;
//! required stages abort the pipeline with `?`, the post-creation
//! attribute updates are best effort.

mod attrs;
mod keytab_sync;
mod location;
mod names;
mod password;
mod reconcile;

use std::path::{Path, PathBuf};
use std::rc::Rc;

use bitflags::bitflags;
use ldap3::SearchEntry;
use zeroize::Zeroizing;

use crate::conn::Connection;
use crate::enctypes;
use crate::error::Result;
use crate::keytab::Keytab;
use crate::principal::Principal;

bitflags! {
    /// Options for [`Enrollment::prepare`] and [`Enrollment::join`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct JoinFlags: u32 {
        /// Allow updating a computer account that already exists.
        const ALLOW_OVERWRITE = 1 << 0;
        /// Do not open or modify any keytab.
        const NO_KEYTAB = 1 << 1;
    }
}

/// State of a caller-settable value: unset (derive it when needed),
/// explicitly suppressed (leave absent, don't derive), or carrying a value
/// whose origin decides whether it survives [`Enrollment::clear_state`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) enum Setting<T> {
    #[default]
    Unset,
    Suppressed,
    Explicit(T),
    Derived(T),
}

impl<T> Setting<T> {
    pub(crate) fn value(&self) -> Option<&T> {
        match self {
            Setting::Explicit(value) | Setting::Derived(value) => Some(value),
            Setting::Unset | Setting::Suppressed => None,
        }
    }

    pub(crate) fn is_explicit(&self) -> bool {
        matches!(self, Setting::Explicit(_))
    }

    /// Drop a derived value; explicit state survives.
    pub(crate) fn clear_derived(&mut self) {
        if matches!(self, Setting::Derived(_)) {
            *self = Setting::Unset;
        }
    }
}

/// A single enrollment session bound to a [`Connection`].
///
/// Sessions are single threaded and not re-entrant. Dropping the session
/// scrubs the password buffer and releases the keytab image.
pub struct Enrollment {
    conn: Rc<Connection>,

    host_fqdn: Setting<String>,
    computer_name: Setting<String>,
    computer_sam: Option<String>,
    computer_password: Setting<Zeroizing<String>>,
    reset_password: bool,
    computer_principal: Option<Principal>,

    preferred_ou: Option<String>,
    preferred_ou_validated: bool,
    computer_container: Option<String>,
    computer_dn: Option<String>,
    computer_attributes: Option<SearchEntry>,

    service_names: Option<Vec<String>>,
    service_principals: Setting<Vec<String>>,

    kvno: u32,
    keytab_path: Setting<PathBuf>,
    keytab: Option<Keytab>,
    keytab_principals: Vec<Principal>,
    keytab_enctypes: Setting<Vec<i32>>,
}

impl Enrollment {
    pub fn new(conn: Rc<Connection>) -> Enrollment {
        Enrollment {
            conn,
            host_fqdn: Setting::Unset,
            computer_name: Setting::Unset,
            computer_sam: None,
            computer_password: Setting::Unset,
            reset_password: false,
            computer_principal: None,
            preferred_ou: None,
            preferred_ou_validated: false,
            computer_container: None,
            computer_dn: None,
            computer_attributes: None,
            service_names: None,
            service_principals: Setting::Unset,
            kvno: 0,
            keytab_path: Setting::Unset,
            keytab: None,
            keytab_principals: Vec::new(),
            keytab_enctypes: Setting::Unset,
        }
    }

    pub fn host_fqdn(&self) -> Option<&str> {
        self.host_fqdn.value().map(String::as_str)
    }

    /// `None` means: leave the host name absent rather than deriving it
    /// from the connection.
    pub fn set_host_fqdn(&mut self, value: Option<&str>) {
        self.host_fqdn = match value {
            Some(fqdn) => Setting::Explicit(fqdn.to_string()),
            None => Setting::Suppressed,
        };
    }

    pub fn computer_name(&self) -> Option<&str> {
        self.computer_name.value().map(String::as_str)
    }

    pub fn set_computer_name(&mut self, value: Option<&str>) {
        self.computer_name = match value {
            Some(name) => Setting::Explicit(name.to_uppercase()),
            None => Setting::Unset,
        };
    }

    pub fn computer_sam(&self) -> Option<&str> {
        self.computer_sam.as_deref()
    }

    pub fn computer_principal(&self) -> Option<&Principal> {
        self.computer_principal.as_ref()
    }

    pub fn computer_password(&self) -> Option<&str> {
        self.computer_password.value().map(|p| p.as_str())
    }

    pub fn set_computer_password(&mut self, value: Option<&str>) {
        self.computer_password = match value {
            Some(password) => Setting::Explicit(Zeroizing::new(password.to_string())),
            None => Setting::Unset,
        };
    }

    /// Forget any password and derive the deterministic reset password on
    /// the next run.
    pub fn reset_computer_password(&mut self) {
        self.computer_password = Setting::Unset;
        self.reset_password = true;
    }

    pub fn preferred_ou(&self) -> Option<&str> {
        self.preferred_ou.as_deref()
    }

    pub fn set_preferred_ou(&mut self, value: Option<&str>) {
        self.preferred_ou_validated = false;
        self.preferred_ou = value.map(str::to_string);
    }

    pub fn computer_container(&self) -> Option<&str> {
        self.computer_container.as_deref()
    }

    pub fn set_computer_container(&mut self, value: Option<&str>) {
        self.computer_container = value.map(str::to_string);
    }

    pub fn computer_dn(&self) -> Option<&str> {
        self.computer_dn.as_deref()
    }

    pub fn set_computer_dn(&mut self, value: Option<&str>) {
        self.computer_dn = value.map(str::to_string);
    }

    pub fn service_names(&self) -> Option<&[String]> {
        self.service_names.as_deref()
    }

    pub fn set_service_names(&mut self, value: Option<&[String]>) {
        self.service_names = value.map(<[String]>::to_vec);
    }

    pub fn add_service_name(&mut self, value: &str) {
        self.service_names
            .get_or_insert_with(Vec::new)
            .push(value.to_string());
    }

    pub fn service_principals(&self) -> Option<&[String]> {
        self.service_principals.value().map(Vec::as_slice)
    }

    pub fn set_service_principals(&mut self, value: Option<&[String]>) {
        self.service_principals = match value {
            Some(principals) => Setting::Explicit(principals.to_vec()),
            None => Setting::Unset,
        };
    }

    pub fn kvno(&self) -> u32 {
        self.kvno
    }

    pub fn set_kvno(&mut self, value: u32) {
        self.kvno = value;
    }

    pub fn keytab_path(&self) -> Option<&Path> {
        self.keytab_path.value().map(PathBuf::as_path)
    }

    /// The keytab image, once `prepare` or `join` has opened it.
    pub fn keytab(&self) -> Option<&Keytab> {
        self.keytab.as_ref()
    }

    /// Choosing a different keytab closes any open one.
    pub fn set_keytab_path(&mut self, value: Option<&Path>) {
        self.keytab = None;
        self.keytab_path = match value {
            Some(path) => Setting::Explicit(path.to_path_buf()),
            None => Setting::Unset,
        };
    }

    /// The enctypes that will be written to the keytab; the built-in
    /// default list until the caller or the directory supplies one.
    pub fn keytab_enctypes(&self) -> &[i32] {
        self.keytab_enctypes
            .value()
            .map(Vec::as_slice)
            .unwrap_or(enctypes::DEFAULT_ENCTYPES)
    }

    pub fn set_keytab_enctypes(&mut self, value: Option<&[i32]>) {
        self.keytab_enctypes = match value {
            Some(enctypes) => Setting::Explicit(enctypes.to_vec()),
            None => Setting::Unset,
        };
    }

    /// Drop state derived by a previous run. Values the caller supplied
    /// explicitly stay put.
    fn clear_state(&mut self) {
        self.keytab_principals.clear();
        self.keytab = None;
        self.computer_sam = None;
        self.computer_principal = None;
        self.computer_password.clear_derived();
        self.computer_dn = None;
        self.service_principals.clear_derived();
        self.kvno = 0;
        self.computer_attributes = None;
    }

    /// Derive every value a join needs. Idempotent and safe to re-run;
    /// nothing here talks to the directory.
    pub fn prepare(&mut self, flags: JoinFlags) -> Result<()> {
        self.conn.clear_last_error();

        self.ensure_host_fqdn()?;
        self.ensure_computer_name()?;
        self.ensure_computer_sam()?;
        self.ensure_computer_password()?;
        if !flags.contains(JoinFlags::NO_KEYTAB) {
            self.ensure_host_keytab()?;
        }
        self.ensure_service_names()?;
        self.ensure_service_principals()?;

        Ok(())
    }

    /// The composed pipeline: derive state, resolve the account location,
    /// reconcile the directory object, set the password, update the
    /// remaining attributes and synchronize the keytab.
    pub fn join(&mut self, flags: JoinFlags) -> Result<()> {
        self.conn.clear_last_error();
        self.clear_state();

        self.prepare(flags)?;

        // Figure out where the computer account lives.
        if self.computer_dn.is_none() {
            if self.preferred_ou.is_some() {
                self.validate_preferred_ou()?;
            } else {
                self.lookup_preferred_ou()?;
            }
            self.lookup_computer_container()?;
            self.calc_computer_account()?;
        }

        self.create_or_update_computer_account(flags.contains(JoinFlags::ALLOW_OVERWRITE))?;
        self.change_computer_password()?;

        self.retrieve_computer_account_info()?;

        // Failures updating these attributes are logged but not fatal; the
        // account is already usable without them.
        let _ = self.update_and_calculate_enctypes();
        let _ = self.update_dns_host_name();
        let _ = self.update_service_principals();

        if flags.contains(JoinFlags::NO_KEYTAB) {
            return Ok(());
        }

        // The directory is authoritative at this point; only now touch
        // local state.
        self.update_keytab_for_principals()
    }
}
