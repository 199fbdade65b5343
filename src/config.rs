//! Configuration for the invite lifecycle, signup and bearer tokens.
//!
//! ```rust
//! use teamgate::config::{InviteConfig, TeamGateConfig};
//!
//! let config = TeamGateConfig {
//!     invite: InviteConfig {
//!         join_base_url: "https://builder.example.com/join".to_owned(),
//!     },
//!     ..TeamGateConfig::default()
//! };
//! assert!(config.removal.delete_account);
//! ```

use chrono::Duration;
use url::form_urlencoded;

use crate::access::Role;

#[derive(Debug, Clone, Default)]
pub struct TeamGateConfig {
    pub invite: InviteConfig,
    pub signup: SignupConfig,
    pub removal: RemovalConfig,
    pub bearer: BearerConfig,
}

impl TeamGateConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Local settings: links point at localhost and organic signups join team 1.
    pub fn development() -> Self {
        Self {
            invite: InviteConfig {
                join_base_url: "http://localhost:3000/join".to_owned(),
            },
            signup: SignupConfig {
                default_team_id: Some(1),
                default_role: Role::Editor,
            },
            removal: RemovalConfig::default(),
            bearer: BearerConfig {
                token_ttl: Duration::days(30),
            },
        }
    }
}

/// How join links are built.
#[derive(Debug, Clone)]
pub struct InviteConfig {
    /// Page that accepts `inviteToken`. Default: `/join`
    pub join_base_url: String,
}

impl Default for InviteConfig {
    fn default() -> Self {
        Self {
            join_base_url: "/join".to_owned(),
        }
    }
}

impl InviteConfig {
    /// `<base>?inviteToken=<token>[&email=<email>][&appID=<id>]`
    ///
    /// The email is form-encoded so `+` and `&` survive the round trip.
    pub fn join_link(&self, token: &str, email: Option<&str>, app_id: Option<i64>) -> String {
        let mut link = format!("{}?inviteToken={token}", self.join_base_url);
        if let Some(email) = email.filter(|email| !email.is_empty()) {
            link.push_str("&email=");
            link.extend(form_urlencoded::byte_serialize(email.as_bytes()));
        }
        if let Some(app_id) = app_id {
            link.push_str(&format!("&appID={app_id}"));
        }
        link
    }
}

/// Where organic signups land.
#[derive(Debug, Clone)]
pub struct SignupConfig {
    /// Team joined by signups without an invite. `None` creates the account only.
    pub default_team_id: Option<i64>,
    /// Role granted in the default team. Default: Editor
    pub default_role: Role,
}

impl Default for SignupConfig {
    fn default() -> Self {
        Self {
            default_team_id: None,
            default_role: Role::Editor,
        }
    }
}

/// What removing a member does to their account.
#[derive(Debug, Clone)]
pub struct RemovalConfig {
    /// Delete the user account along with the membership, unless the user
    /// still belongs to another team. Default: true
    pub delete_account: bool,
}

impl Default for RemovalConfig {
    fn default() -> Self {
        Self {
            delete_account: true,
        }
    }
}

/// Bearer tokens issued by the SQLite identity provider.
#[derive(Debug, Clone)]
pub struct BearerConfig {
    /// Default: 7 days
    pub token_ttl: Duration,
}

impl Default for BearerConfig {
    fn default() -> Self {
        Self {
            token_ttl: Duration::days(7),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_link_variants() {
        let invite = InviteConfig {
            join_base_url: "https://app.test/join".to_owned(),
        };
        assert_eq!(
            invite.join_link("abc", None, None),
            "https://app.test/join?inviteToken=abc"
        );
        assert_eq!(
            invite.join_link("abc", Some("a@x.com"), Some(12)),
            "https://app.test/join?inviteToken=abc&email=a%40x.com&appID=12"
        );
        assert_eq!(
            invite.join_link("abc", Some(""), None),
            "https://app.test/join?inviteToken=abc"
        );
    }

    #[test]
    fn test_join_link_email_survives_query_parsing() {
        let invite = InviteConfig::default();
        let link = invite.join_link("abc", Some("a+b&c@x.com"), None);
        assert_eq!(link, "/join?inviteToken=abc&email=a%2Bb%26c%40x.com");

        let (_, query) = link.split_once('?').unwrap();
        let email = form_urlencoded::parse(query.as_bytes())
            .find_map(|(key, value)| (key == "email").then(|| value.into_owned()));
        assert_eq!(email.as_deref(), Some("a+b&c@x.com"));
    }

    #[test]
    fn test_development_joins_default_team() {
        let config = TeamGateConfig::development();
        assert_eq!(config.signup.default_team_id, Some(1));
        assert_eq!(config.signup.default_role, Role::Editor);
        assert_eq!(TeamGateConfig::new().signup.default_team_id, None);
    }
}
