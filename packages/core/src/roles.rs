use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Roles participating in the sales pipeline
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Sale,
    #[serde(rename = "presale")]
    PreSale,
    #[serde(rename = "techlead")]
    TechLead,
    Pm,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Sale => "sale",
            UserRole::PreSale => "presale",
            UserRole::TechLead => "techlead",
            UserRole::Pm => "pm",
            UserRole::Admin => "admin",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sale" => Ok(UserRole::Sale),
            "presale" => Ok(UserRole::PreSale),
            "techlead" => Ok(UserRole::TechLead),
            "pm" => Ok(UserRole::Pm),
            "admin" => Ok(UserRole::Admin),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

/// Error for role strings that do not name a known role
#[derive(Debug, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_str() {
        for role in [
            UserRole::Sale,
            UserRole::PreSale,
            UserRole::TechLead,
            UserRole::Pm,
            UserRole::Admin,
        ] {
            assert_eq!(role.as_str().parse::<UserRole>().unwrap(), role);
        }
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!("intern".parse::<UserRole>().is_err());
    }
}
