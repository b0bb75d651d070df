use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::database::value::SqlValue;

/// Staff roles, stored and transmitted as their numeric code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Admin = 1,
    Commercial = 2,
    Comptable = 3,
    Rh = 4,
    Technicien = 5,
    Patron = 6,
}

/// Sales documents: clients, quotes, purchase and enterprise orders
pub const SALES: &[Role] = &[Role::Admin, Role::Commercial, Role::Patron];
/// Validation and rejection of submitted documents
pub const APPROVERS: &[Role] = &[Role::Admin, Role::Patron];
pub const FINANCE: &[Role] = &[Role::Admin, Role::Comptable, Role::Patron];
pub const TECHNICAL: &[Role] = &[Role::Admin, Role::Technicien, Role::Patron];
pub const HR: &[Role] = &[Role::Admin, Role::Rh, Role::Patron];
pub const EVERYONE: &[Role] = &[
    Role::Admin,
    Role::Commercial,
    Role::Comptable,
    Role::Rh,
    Role::Technicien,
    Role::Patron,
];

impl Role {
    pub fn code(self) -> i16 {
        self as i16
    }

    pub fn from_code(code: i16) -> Option<Self> {
        EVERYONE.iter().copied().find(|r| r.code() == code)
    }

    pub fn label(self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Commercial => "Commercial",
            Role::Comptable => "Comptable",
            Role::Rh => "RH",
            Role::Technicien => "Technicien",
            Role::Patron => "Patron",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i16(self.code())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = i16::deserialize(deserializer)?;
        Role::from_code(code).ok_or_else(|| serde::de::Error::custom(format!("unknown role {}", code)))
    }
}

impl sqlx::Type<sqlx::Postgres> for Role {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <i16 as sqlx::Type<sqlx::Postgres>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Role {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let code = <i16 as sqlx::Decode<'r, sqlx::Postgres>>::decode(value)?;
        Role::from_code(code).ok_or_else(|| format!("unknown role {}", code).into())
    }
}

impl From<Role> for SqlValue {
    fn from(role: Role) -> Self {
        SqlValue::Int(Some(role.code() as i64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_directory_values() {
        assert_eq!(Role::Admin.code(), 1);
        assert_eq!(Role::Patron.code(), 6);
        assert_eq!(Role::from_code(4), Some(Role::Rh));
        assert_eq!(Role::from_code(7), None);
    }

    #[test]
    fn groups() {
        assert!(SALES.contains(&Role::Commercial));
        assert!(!SALES.contains(&Role::Comptable));
        assert!(APPROVERS.contains(&Role::Patron));
        assert!(!APPROVERS.contains(&Role::Rh));
        assert!(HR.contains(&Role::Rh));
        assert!(TECHNICAL.contains(&Role::Technicien));
        assert!(FINANCE.contains(&Role::Comptable));
    }

    #[test]
    fn serializes_as_number() {
        assert_eq!(serde_json::to_value(Role::Comptable).unwrap(), serde_json::json!(3));
        assert_eq!(serde_json::from_value::<Role>(serde_json::json!(2)).unwrap(), Role::Commercial);
        assert!(serde_json::from_value::<Role>(serde_json::json!(0)).is_err());
    }
}
