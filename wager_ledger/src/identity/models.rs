//! Identity data models.

use super::errors::{IdentityError, IdentityResult};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Back-office privilege granted by the auth provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Credits deposits and bonuses to player accounts
    Cashier,
    /// Registers operators
    OperatorAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Cashier => "cashier",
            Role::OperatorAdmin => "operator_admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cashier" => Ok(Role::Cashier),
            "operator_admin" => Ok(Role::OperatorAdmin),
            _ => Err(format!("Unknown role: {s}")),
        }
    }
}

/// Profile data attached to the auth provider's user
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default)]
    pub full_name: Option<String>,
}

/// Provider-controlled metadata; users cannot edit it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppMetadata {
    #[serde(default)]
    pub roles: Vec<String>,
}

/// JWT claims as issued by the auth provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub aud: Option<String>,
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub user_metadata: Option<UserMetadata>,
    #[serde(default)]
    pub app_metadata: Option<AppMetadata>,
}

/// Authenticated caller, validated before entering the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedIdentity {
    pub auth_id: String,
    pub email: String,
    pub display_name: Option<String>,
    #[serde(default)]
    pub roles: Vec<Role>,
}

impl VerifiedIdentity {
    /// Validate required fields and normalize the email
    pub fn new(
        auth_id: impl Into<String>,
        email: impl Into<String>,
        display_name: Option<String>,
    ) -> IdentityResult<Self> {
        let auth_id = auth_id.into().trim().to_string();
        if auth_id.is_empty() {
            return Err(IdentityError::MissingClaim("sub"));
        }

        let email = email.into().trim().to_lowercase();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
            _ => return Err(IdentityError::InvalidEmail),
        }

        let display_name = display_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());

        Ok(Self {
            auth_id,
            email,
            display_name,
            roles: Vec::new(),
        })
    }

    /// Same identity holding exactly `roles`
    pub fn with_roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.roles = roles.into_iter().collect();
        self.roles.sort_by_key(|role| role.as_str());
        self.roles.dedup();
        self
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

impl TryFrom<IdentityClaims> for VerifiedIdentity {
    type Error = IdentityError;

    fn try_from(claims: IdentityClaims) -> Result<Self, Self::Error> {
        let email = claims.email.ok_or(IdentityError::MissingClaim("email"))?;
        // Display name falls back to the email, as the auth provider's UI does
        let display_name = claims
            .user_metadata
            .and_then(|meta| meta.full_name)
            .or_else(|| Some(email.clone()));
        // Roles this service does not know are ignored
        let roles = claims
            .app_metadata
            .map(|meta| meta.roles)
            .unwrap_or_default()
            .iter()
            .filter_map(|role| role.parse::<Role>().ok())
            .collect::<Vec<_>>();
        Ok(VerifiedIdentity::new(claims.sub, email, display_name)?.with_roles(roles))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(email: Option<&str>, full_name: Option<&str>) -> IdentityClaims {
        IdentityClaims {
            sub: "4f1c0c3e-auth".to_string(),
            email: email.map(str::to_string),
            aud: Some("authenticated".to_string()),
            exp: 0,
            iat: None,
            user_metadata: Some(UserMetadata {
                full_name: full_name.map(str::to_string),
            }),
            app_metadata: None,
        }
    }

    #[test]
    fn test_identity_from_claims_uses_full_name() {
        let identity = VerifiedIdentity::try_from(claims(Some("Ann@Example.com"), Some("Ann Lee")))
            .unwrap();
        assert_eq!(identity.email, "ann@example.com");
        assert_eq!(identity.display_name.as_deref(), Some("Ann Lee"));
    }

    #[test]
    fn test_display_name_falls_back_to_email() {
        let identity = VerifiedIdentity::try_from(claims(Some("bob@example.com"), None)).unwrap();
        assert_eq!(identity.display_name.as_deref(), Some("bob@example.com"));
    }

    #[test]
    fn test_roles_come_from_app_metadata() {
        let mut with_roles = claims(Some("cash@example.com"), None);
        with_roles.app_metadata = Some(AppMetadata {
            roles: vec![
                "cashier".to_string(),
                "superuser".to_string(),
                "cashier".to_string(),
            ],
        });
        let identity = VerifiedIdentity::try_from(with_roles).unwrap();
        assert_eq!(identity.roles, vec![Role::Cashier]);
        assert!(identity.has_role(Role::Cashier));
        assert!(!identity.has_role(Role::OperatorAdmin));

        let player = VerifiedIdentity::try_from(claims(Some("p@example.com"), None)).unwrap();
        assert!(player.roles.is_empty());
    }

    #[test]
    fn test_missing_email_rejected() {
        let err = VerifiedIdentity::try_from(claims(None, None)).unwrap_err();
        assert!(matches!(err, IdentityError::MissingClaim("email")));
    }

    #[test]
    fn test_malformed_email_and_blank_subject_rejected() {
        assert!(matches!(
            VerifiedIdentity::new("abc", "not-an-email", None),
            Err(IdentityError::InvalidEmail)
        ));
        assert!(matches!(
            VerifiedIdentity::new("  ", "a@b.c", None),
            Err(IdentityError::MissingClaim("sub"))
        ));
    }
}
