//! Account Aggregate
//!
//! Customers and administrators share a profile; only administrators carry a
//! credential. The two are separate variants so the credential rule is
//! enforced by construction instead of by a flag.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::domain::value_objects::{CredentialError, CredentialHash, PhoneError, PhoneNumber, Region};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Address {
    pub area: Region,
    #[validate(length(min = 1, message = "settlement is required"))]
    pub settlement: String,
    #[validate(length(min = 1, message = "address details (street, house) are required"))]
    pub details: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Validate)]
pub struct Profile {
    pub id: Uuid,
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    pub phone: PhoneNumber,
    #[validate]
    pub address: Address,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Account {
    Customer(Profile),
    Admin { profile: Profile, credential: CredentialHash },
}

/// Registration input as typed by the user.
#[derive(Clone, Debug, Default)]
pub struct Registration {
    pub name: String,
    pub phone: String,
    pub area: String,
    pub settlement: String,
    pub details: String,
    pub is_admin: bool,
    pub password: Option<String>,
}

impl Account {
    pub fn register(input: Registration, now: DateTime<Utc>) -> Result<Self, AccountError> {
        let profile = Profile {
            id: Uuid::now_v7(),
            name: input.name.trim().to_string(),
            phone: PhoneNumber::parse(&input.phone)?,
            address: Address {
                area: input.area.parse().map_err(|_| AccountError::InvalidRegion(input.area.clone()))?,
                settlement: input.settlement.trim().to_string(),
                details: input.details.trim().to_string(),
            },
            created_at: now,
            updated_at: now,
        };
        profile.validate()?;

        if !input.is_admin {
            // a password sent along with a customer registration is dropped
            return Ok(Account::Customer(profile));
        }
        let password = input.password.ok_or(AccountError::MissingCredential)?;
        let credential = CredentialHash::hash(&password)?;
        Ok(Account::Admin { profile, credential })
    }

    pub fn profile(&self) -> &Profile {
        match self {
            Account::Customer(profile) | Account::Admin { profile, .. } => profile,
        }
    }

    pub fn id(&self) -> Uuid { self.profile().id }
    pub fn is_admin(&self) -> bool { matches!(self, Account::Admin { .. }) }

    pub fn credential(&self) -> Option<&CredentialHash> {
        match self {
            Account::Customer(_) => None,
            Account::Admin { credential, .. } => Some(credential),
        }
    }

    /// The shape returned to clients; never includes the credential.
    pub fn view(&self) -> AccountView {
        let p = self.profile();
        AccountView { id: p.id, name: p.name.clone(), phone: p.phone.clone(), address: p.address.clone(), is_admin: self.is_admin() }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub id: Uuid,
    pub name: String,
    pub phone: PhoneNumber,
    pub address: Address,
    pub is_admin: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error(transparent)]
    Phone(#[from] PhoneError),
    #[error("'{0}' is not a valid region")]
    InvalidRegion(String),
    #[error("an administrator account requires a password")]
    MissingCredential,
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error(transparent)]
    Invalid(#[from] validator::ValidationErrors),
}
