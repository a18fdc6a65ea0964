//! passwd and shadow rows.
//!
//! One account becomes one `name:passwd:uid:gid:gecos:home:shell` row, or
//! nothing at all. Quarantines decide whether the account is exported, and
//! may lock its password or replace its shell.

use std::fmt;
use tracing::debug;

use crate::model::Account;
use crate::source::EligibilityPolicy;
use crate::transliterate::to_iso646_60;
use crate::validate::{illegal_field, illegal_name};

/// Password field of a quarantine-locked account.
pub const LOCKED: &str = "*locked";
/// Password field of an account without a password hash.
pub const NO_PASSWORD: &str = "*";
/// Method whose hash is used when no authentication method is selected.
pub const DEFAULT_AUTH_METHOD: &str = "MD5-crypt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswdRow {
    pub name: String,
    pub password: String,
    pub uid: u32,
    pub gid: u32,
    pub gecos: String,
    pub home: String,
    pub shell: String,
}

impl PasswdRow {
    pub fn to_line(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}:{}:{}",
            self.name, self.password, self.uid, self.gid, self.gecos, self.home, self.shell
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShadowRow {
    pub name: String,
    pub password: String,
}

impl ShadowRow {
    pub fn to_line(&self) -> String {
        format!("{}:{}:::", self.name, self.password)
    }
}

/// Rows produced for one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRecord {
    pub passwd: PasswdRow,
    /// Only present when a shadow map was requested.
    pub shadow: Option<ShadowRow>,
}

/// Why an account produced no rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Skip {
    /// An active quarantine removes the account from all maps.
    Quarantined,
    /// The account has no hash for the selected authentication method.
    NoAuthData,
    BadUsername(String),
    IllegalField { field: &'static str, reason: String },
    LineTooLong { len: usize, max: usize },
}

impl Skip {
    /// Silent skips are expected and not worth a warning.
    pub fn is_silent(&self) -> bool {
        matches!(self, Skip::Quarantined | Skip::NoAuthData)
    }
}

impl fmt::Display for Skip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Skip::Quarantined => write!(f, "quarantined"),
            Skip::NoAuthData => write!(f, "no password hash for the selected method"),
            Skip::BadUsername(reason) => write!(f, "bad username: {}", reason),
            Skip::IllegalField { field, reason } => write!(f, "illegal {}: {}", field, reason),
            Skip::LineTooLong { len, max } => write!(f, "line is {} bytes, max {}", len, max),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswdOptions {
    /// Publish this method's hash. Without it the password field is masked.
    pub auth_method: Option<String>,
    /// Move hashes to a shadow map.
    pub shadow: bool,
    pub max_username_len: usize,
    pub max_line_length: usize,
}

/// Resolves the passwd (and shadow) rows of single accounts.
pub struct AccountRecordBuilder<'a, P> {
    policy: &'a P,
    options: PasswdOptions,
}

impl<'a, P: EligibilityPolicy> AccountRecordBuilder<'a, P> {
    pub fn new(policy: &'a P, options: PasswdOptions) -> Self {
        Self { policy, options }
    }

    pub fn options(&self) -> &PasswdOptions {
        &self.options
    }

    pub fn build(&self, account: &Account) -> Result<AccountRecord, Skip> {
        debug!(account = account.id, name = %account.name, "processing account");

        if let Some(reason) = illegal_name(&account.name, self.options.max_username_len) {
            return Err(Skip::BadUsername(reason));
        }

        let method = self.options.auth_method.as_deref();
        let hash = account
            .auth
            .get(method.unwrap_or(DEFAULT_AUTH_METHOD))
            .filter(|h| !h.is_empty());
        if method.is_some() && hash.is_none() {
            return Err(Skip::NoAuthData);
        }

        let verdict = self.policy.verdict(account.id);
        if verdict.skip {
            return Err(Skip::Quarantined);
        }

        let gecos = account
            .gecos
            .as_deref()
            .or(account.owner_name.as_deref())
            .unwrap_or(&account.name);
        let gecos = to_iso646_60(gecos);
        let home = account.home.clone().unwrap_or_else(|| "/".to_string());
        let shell = verdict.shell.unwrap_or_else(|| account.shell.clone());

        for (field, value) in [("gecos", &gecos), ("home", &home), ("shell", &shell)] {
            if let Some(reason) = illegal_field(value) {
                return Err(Skip::IllegalField { field, reason });
            }
        }

        let stored = match (verdict.locked, hash) {
            (true, _) => LOCKED.to_string(),
            (false, Some(hash)) => hash.clone(),
            (false, None) => NO_PASSWORD.to_string(),
        };
        if let Some(reason) = illegal_field(&stored) {
            return Err(Skip::IllegalField { field: "password", reason });
        }

        let (password, shadow) = self.mask(&account.name, stored, verdict.locked);
        let passwd = PasswdRow {
            name: account.name.clone(),
            password,
            uid: account.posix_uid,
            gid: account.posix_gid,
            gecos,
            home,
            shell,
        };

        let len = passwd.to_line().len();
        if len > self.options.max_line_length {
            return Err(Skip::LineTooLong {
                len,
                max: self.options.max_line_length,
            });
        }

        Ok(AccountRecord { passwd, shadow })
    }

    /// Decide what the passwd row shows and what goes to shadow.
    fn mask(&self, name: &str, stored: String, locked: bool) -> (String, Option<ShadowRow>) {
        if self.options.shadow {
            let shown = if locked {
                LOCKED
            } else if stored.starts_with('*') {
                "!!"
            } else {
                "x"
            };
            let shadow = ShadowRow {
                name: name.to_string(),
                password: stored,
            };
            return (shown.to_string(), Some(shadow));
        }
        if locked {
            return (LOCKED.to_string(), None);
        }
        match self.options.auth_method {
            Some(_) => (stored, None),
            None => ("x".to_string(), None),
        }
    }
}
