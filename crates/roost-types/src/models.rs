use serde::{Deserialize, Serialize};

/// Membership tier. Upgrades arrive through the payment webhook.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    #[default]
    Standard,
    Upgraded,
}

impl Tier {
    pub fn is_upgraded(self) -> bool {
        matches!(self, Tier::Upgraded)
    }
}

/// Public view of a user. Never carries the password digest or tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: u64,
    pub email: String,
    pub tier: Tier,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostResponse {
    pub id: u64,
    pub body: String,
    pub author_id: u64,
}
