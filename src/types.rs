//! Data carried across the purchase flows.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Product data extracted from the first search result.
///
/// `price` is the raw site-formatted string, not normalized. `url` is
/// absolute, resolved against the site origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemResult {
    pub name: String,
    pub price: String,
    pub url: String,
}

/// An item to add to the cart, typically a previously fetched
/// [`ItemResult`] the caller has filtered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub name: String,
    pub url: String,
}

impl From<ItemResult> for CartItem {
    fn from(item: ItemResult) -> Self {
        Self {
            name: item.name,
            url: item.url,
        }
    }
}

/// Sign-in credentials, passed by value into each flow invocation and
/// never persisted.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

// Keeps the password out of logs and error chains.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}
