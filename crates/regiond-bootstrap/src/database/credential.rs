//! Generated database credentials.

use std::fmt;

use rand::Rng;
use rand::distr::Alphanumeric;

use super::DatabaseIdentifier;
use crate::node_config::NodeConfigKey;

/// Number of characters in a generated password.
pub const PASSWORD_LENGTH: usize = 32;

/// Randomly generated role password.
///
/// Characters are drawn from `[A-Za-z0-9]` using the thread-local CSPRNG, so
/// the value needs no quoting in SQL literals or the node configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    /// Draws a fresh password.
    #[must_use]
    pub fn generate() -> Self {
        let value = rand::rng()
            .sample_iter(Alphanumeric)
            .take(PASSWORD_LENGTH)
            .map(char::from)
            .collect();
        Self(value)
    }

    /// Secret value.
    #[must_use]
    pub const fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(<redacted>)")
    }
}

/// Everything the region service needs to reach its database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseCredential {
    /// Host or socket directory.
    pub host: String,
    /// Database name.
    pub name: DatabaseIdentifier,
    /// Role name.
    pub user: DatabaseIdentifier,
    /// Role password.
    pub password: Password,
}

impl DatabaseCredential {
    /// Node configuration entries recording the credential, in write order.
    #[must_use]
    pub fn entries(&self) -> [(NodeConfigKey, &str); 4] {
        [
            (NodeConfigKey::DatabaseHost, self.host.as_str()),
            (NodeConfigKey::DatabaseName, self.name.as_str()),
            (NodeConfigKey::DatabaseUser, self.user.as_str()),
            (NodeConfigKey::DatabasePass, self.password.expose()),
        ]
    }
}
