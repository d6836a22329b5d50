use serde::{Deserialize, Serialize};

/// Role kinds that can be granted to a principal.
///
/// The owner is not a role: it is a single principal held by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// May deposit value on behalf of any beneficiary.
    Depositor,
    /// May withdraw from its own beneficiary balance.
    Withdrawer,
    /// May withdraw a beneficiary's balance to an arbitrary recipient.
    SurplusExtractor,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Depositor, Role::Withdrawer, Role::SurplusExtractor];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Depositor => "depositor",
            Role::Withdrawer => "withdrawer",
            Role::SurplusExtractor => "surplus_extractor",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
