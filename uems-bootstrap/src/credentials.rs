/// Administrator password policy
///
/// The bootstrap tool picks the administrator password from, in order:
///
/// 1. `UEMS_ADMIN_PASSWORD`, which must pass the strength rules in production
/// 2. the well-known development password outside production
/// 3. a freshly generated password in production
///
/// The resolved value is only ever shown on the console once, when the
/// account is actually created. It never reaches `tracing`.

use rand::Rng;
use std::fmt;
use uems_shared::auth::password::validate_password_strength;
use uems_shared::config::Environment;
use uems_shared::db::seed::DEFAULT_ADMIN_PASSWORD;

use crate::error::BootstrapError;

/// Environment variable overriding the administrator password
pub const ADMIN_PASSWORD_VAR: &str = "UEMS_ADMIN_PASSWORD";

/// Length of generated passwords
pub const GENERATED_PASSWORD_LEN: usize = 20;

const UPPER: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";
const LOWER: &[u8] = b"abcdefghijkmnopqrstuvwxyz";
const DIGITS: &[u8] = b"23456789";
const SYMBOLS: &[u8] = b"@#%+=!?-_";

/// Where the administrator password came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordSource {
    Configured,
    Default,
    Generated,
}

/// The administrator password chosen for this run
#[derive(Clone)]
pub struct AdminPassword {
    value: String,
    source: PasswordSource,
}

impl AdminPassword {
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn source(&self) -> PasswordSource {
        self.source
    }

    /// Whether the operator has to be shown the password
    ///
    /// A configured password is already known to whoever set it.
    pub fn should_display(&self) -> bool {
        self.source != PasswordSource::Configured
    }
}

impl fmt::Debug for AdminPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminPassword")
            .field("value", &"[REDACTED]")
            .field("source", &self.source)
            .finish()
    }
}

/// Resolves the administrator password from the process environment
pub fn admin_password_from_env(environment: Environment) -> Result<AdminPassword, BootstrapError> {
    resolve_admin_password(environment, |name| std::env::var(name).ok())
}

/// Resolves the administrator password from an arbitrary variable lookup
///
/// # Errors
///
/// `WeakAdminPassword` when a configured password fails the strength rules
/// in production.
pub fn resolve_admin_password<F>(
    environment: Environment,
    lookup: F,
) -> Result<AdminPassword, BootstrapError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(configured) = lookup(ADMIN_PASSWORD_VAR).filter(|p| !p.is_empty()) {
        if environment.is_production() {
            validate_password_strength(&configured).map_err(|reason| {
                BootstrapError::WeakAdminPassword {
                    var: ADMIN_PASSWORD_VAR,
                    reason,
                }
            })?;
        }

        return Ok(AdminPassword {
            value: configured,
            source: PasswordSource::Configured,
        });
    }

    if environment.is_production() {
        return Ok(AdminPassword {
            value: generate_password(),
            source: PasswordSource::Generated,
        });
    }

    Ok(AdminPassword {
        value: DEFAULT_ADMIN_PASSWORD.to_string(),
        source: PasswordSource::Default,
    })
}

/// Generates a random password that passes the strength rules
///
/// Ambiguous characters (`0`, `O`, `1`, `l`, `I`) are left out.
pub fn generate_password() -> String {
    let mut rng = rand::thread_rng();
    let classes = [UPPER, LOWER, DIGITS, SYMBOLS];

    // one of each class first, then fill and shuffle
    let mut chars: Vec<u8> = classes
        .iter()
        .map(|class| class[rng.gen_range(0..class.len())])
        .collect();

    while chars.len() < GENERATED_PASSWORD_LEN {
        let class = classes[rng.gen_range(0..classes.len())];
        chars.push(class[rng.gen_range(0..class.len())]);
    }

    for i in (1..chars.len()).rev() {
        let j = rng.gen_range(0..=i);
        chars.swap(i, j);
    }

    chars.into_iter().map(char::from).collect()
}
