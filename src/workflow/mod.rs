//! Status workflows shared by every document type.
//!
//! Each resource declares its status enum with [`status_enum!`] and a static
//! [`Machine`] listing the legal transitions. Services never write a status
//! column directly; they ask the machine for the next status and persist it
//! through `services::transition`.

pub mod machines;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Cannot {action} {entity} in status '{from}'")]
    IllegalTransition {
        entity: &'static str,
        action: Action,
        from: String,
    },

    #[error("Action '{action}' does not apply to {entity}")]
    UnknownAction { entity: &'static str, action: Action },

    #[error("Unknown action '{0}'")]
    UnknownActionName(String),

    #[error("Unknown {entity} status '{value}'")]
    UnknownStatus { entity: &'static str, value: String },

    #[error("Cannot {operation} {entity} in status '{status}'")]
    Locked {
        entity: &'static str,
        status: String,
        operation: &'static str,
    },
}

/// Implemented by every enum declared through [`status_enum!`]
pub trait Status: Copy + Eq + fmt::Debug + fmt::Display + Send + Sync + 'static {
    const ENTITY: &'static str;

    fn as_str(&self) -> &'static str;

    fn all() -> &'static [Self];
}

/// Declares a status enum with its snake-case wire names.
///
/// Text-backed enums map onto `TEXT` columns. Adding `i16` after the entity
/// name stores the enum as a `SMALLINT` code while JSON keeps the wire name.
#[macro_export]
macro_rules! status_enum {
    (@common $(#[$meta:meta])* $name:ident, $entity:literal { $($variant:ident => $wire:literal),+ }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl $crate::workflow::Status for $name {
            const ENTITY: &'static str = $entity;

            fn as_str(&self) -> &'static str {
                $name::as_str(self)
            }

            fn all() -> &'static [Self] {
                $name::ALL
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::workflow::WorkflowError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok($name::$variant),)+
                    other => Err($crate::workflow::WorkflowError::UnknownStatus {
                        entity: $entity,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl ::serde::Serialize for $name {
            fn serialize<S: ::serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D: ::serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = <String as ::serde::Deserialize<'de>>::deserialize(deserializer)?;
                s.parse().map_err(::serde::de::Error::custom)
            }
        }
    };

    ($(#[$meta:meta])* $name:ident, $entity:literal, i16 { $($variant:ident = $code:literal => $wire:literal),+ $(,)? }) => {
        $crate::status_enum!(@common $(#[$meta])* $name, $entity { $($variant => $wire),+ });

        impl $name {
            pub fn code(self) -> i16 {
                match self {
                    $($name::$variant => $code),+
                }
            }

            pub fn from_code(code: i16) -> Result<Self, $crate::workflow::WorkflowError> {
                match code {
                    $($code => Ok($name::$variant),)+
                    other => Err($crate::workflow::WorkflowError::UnknownStatus {
                        entity: $entity,
                        value: other.to_string(),
                    }),
                }
            }

            /// Value to compare against the stored column in a JSON filter
            pub fn to_filter(self) -> ::serde_json::Value {
                ::serde_json::Value::from(self.code())
            }
        }

        impl ::sqlx::Type<::sqlx::Postgres> for $name {
            fn type_info() -> ::sqlx::postgres::PgTypeInfo {
                <i16 as ::sqlx::Type<::sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &::sqlx::postgres::PgTypeInfo) -> bool {
                <i16 as ::sqlx::Type<::sqlx::Postgres>>::compatible(ty)
            }
        }

        impl<'r> ::sqlx::Decode<'r, ::sqlx::Postgres> for $name {
            fn decode(value: ::sqlx::postgres::PgValueRef<'r>) -> Result<Self, ::sqlx::error::BoxDynError> {
                let code = <i16 as ::sqlx::Decode<'r, ::sqlx::Postgres>>::decode(value)?;
                Ok($name::from_code(code)?)
            }
        }

        impl From<$name> for $crate::database::value::SqlValue {
            fn from(status: $name) -> Self {
                $crate::database::value::SqlValue::Int(Some(status.code() as i64))
            }
        }
    };

    ($(#[$meta:meta])* $name:ident, $entity:literal { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $crate::status_enum!(@common $(#[$meta])* $name, $entity { $($variant => $wire),+ });

        impl $name {
            /// Value to compare against the stored column in a JSON filter
            pub fn to_filter(self) -> ::serde_json::Value {
                ::serde_json::Value::from(self.as_str())
            }
        }

        impl ::sqlx::Type<::sqlx::Postgres> for $name {
            fn type_info() -> ::sqlx::postgres::PgTypeInfo {
                <String as ::sqlx::Type<::sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &::sqlx::postgres::PgTypeInfo) -> bool {
                <String as ::sqlx::Type<::sqlx::Postgres>>::compatible(ty)
            }
        }

        impl<'r> ::sqlx::Decode<'r, ::sqlx::Postgres> for $name {
            fn decode(value: ::sqlx::postgres::PgValueRef<'r>) -> Result<Self, ::sqlx::error::BoxDynError> {
                let s = <&'r str as ::sqlx::Decode<'r, ::sqlx::Postgres>>::decode(value)?;
                Ok(s.parse::<$name>()?)
            }
        }

        impl From<$name> for $crate::database::value::SqlValue {
            fn from(status: $name) -> Self {
                $crate::database::value::SqlValue::Text(Some(status.as_str().to_string()))
            }
        }
    };
}

/// Every workflow verb, addressed as `POST /api/<resource>/:id/<action>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Validate,
    Reject,
    Start,
    Deliver,
    Cancel,
    Send,
    Accept,
    Activate,
    Deactivate,
    Submit,
    Approve,
    Terminate,
    Expire,
    Review,
    Pay,
    Complete,
    Publish,
    Close,
    Shortlist,
    Interview,
    Hire,
    SignEmployee,
    Finalize,
    Calculate,
    Leave,
}

impl Action {
    pub const ALL: &'static [Action] = &[
        Action::Validate,
        Action::Reject,
        Action::Start,
        Action::Deliver,
        Action::Cancel,
        Action::Send,
        Action::Accept,
        Action::Activate,
        Action::Deactivate,
        Action::Submit,
        Action::Approve,
        Action::Terminate,
        Action::Expire,
        Action::Review,
        Action::Pay,
        Action::Complete,
        Action::Publish,
        Action::Close,
        Action::Shortlist,
        Action::Interview,
        Action::Hire,
        Action::SignEmployee,
        Action::Finalize,
        Action::Calculate,
        Action::Leave,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Validate => "validate",
            Action::Reject => "reject",
            Action::Start => "start",
            Action::Deliver => "deliver",
            Action::Cancel => "cancel",
            Action::Send => "send",
            Action::Accept => "accept",
            Action::Activate => "activate",
            Action::Deactivate => "deactivate",
            Action::Submit => "submit",
            Action::Approve => "approve",
            Action::Terminate => "terminate",
            Action::Expire => "expire",
            Action::Review => "review",
            Action::Pay => "pay",
            Action::Complete => "complete",
            Action::Publish => "publish",
            Action::Close => "close",
            Action::Shortlist => "shortlist",
            Action::Interview => "interview",
            Action::Hire => "hire",
            Action::SignEmployee => "sign_employee",
            Action::Finalize => "finalize",
            Action::Calculate => "calculate",
            Action::Leave => "leave",
        }
    }

    /// How the outcome of this action is announced
    pub fn outcome(&self) -> Outcome {
        match self {
            Action::Submit | Action::Send => Outcome::Submission,
            Action::Validate | Action::Approve | Action::Accept | Action::Hire | Action::Finalize => Outcome::Approval,
            Action::Reject | Action::Cancel => Outcome::Rejection,
            _ => Outcome::Progress,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .iter()
            .copied()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| WorkflowError::UnknownActionName(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Sent up for approval; the approver role is notified
    Submission,
    Approval,
    Rejection,
    Progress,
}

#[derive(Debug)]
pub struct Transition<S: 'static> {
    pub action: Action,
    pub from: &'static [S],
    pub to: S,
}

/// Static transition table plus edit/delete guards for one entity
#[derive(Debug)]
pub struct Machine<S: 'static> {
    pub initial: S,
    pub transitions: &'static [Transition<S>],
    pub editable: &'static [S],
    pub deletable: &'static [S],
}

impl<S: Status> Machine<S> {
    pub fn apply(&self, current: S, action: Action) -> Result<S, WorkflowError> {
        let mut known = false;
        for transition in self.transitions.iter().filter(|t| t.action == action) {
            known = true;
            if transition.from.contains(&current) {
                return Ok(transition.to);
            }
        }

        if known {
            Err(WorkflowError::IllegalTransition {
                entity: S::ENTITY,
                action,
                from: current.as_str().to_string(),
            })
        } else {
            Err(WorkflowError::UnknownAction {
                entity: S::ENTITY,
                action,
            })
        }
    }

    pub fn can(&self, current: S, action: Action) -> bool {
        self.apply(current, action).is_ok()
    }

    pub fn allowed_actions(&self, current: S) -> Vec<Action> {
        let mut actions: Vec<Action> = Vec::new();
        for transition in self.transitions {
            if transition.from.contains(&current) && !actions.contains(&transition.action) {
                actions.push(transition.action);
            }
        }
        actions
    }

    pub fn ensure_editable(&self, current: S) -> Result<(), WorkflowError> {
        Self::ensure_in(current, self.editable, "update")
    }

    pub fn ensure_deletable(&self, current: S) -> Result<(), WorkflowError> {
        Self::ensure_in(current, self.deletable, "delete")
    }

    pub fn ensure_in(current: S, allowed: &[S], operation: &'static str) -> Result<(), WorkflowError> {
        if allowed.contains(&current) {
            Ok(())
        } else {
            Err(WorkflowError::Locked {
                entity: S::ENTITY,
                status: current.as_str().to_string(),
                operation,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_action_names() {
        assert_eq!("validate".parse::<Action>().unwrap(), Action::Validate);
        assert_eq!("sign_employee".parse::<Action>().unwrap(), Action::SignEmployee);
        assert!(matches!(
            "explode".parse::<Action>(),
            Err(WorkflowError::UnknownActionName(name)) if name == "explode"
        ));
    }

    #[test]
    fn every_action_round_trips_through_its_name() {
        for action in Action::ALL {
            assert_eq!(action.as_str().parse::<Action>().unwrap(), *action);
        }
    }

    #[test]
    fn outcomes_group_actions() {
        assert_eq!(Action::Submit.outcome(), Outcome::Submission);
        assert_eq!(Action::Accept.outcome(), Outcome::Approval);
        assert_eq!(Action::Cancel.outcome(), Outcome::Rejection);
        assert_eq!(Action::Deliver.outcome(), Outcome::Progress);
    }
}
