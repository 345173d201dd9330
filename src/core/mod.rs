//! Core value types shared by the store and the view-model.

pub mod category;
pub mod data;
pub mod search;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use category::{CategoryNode, CategoryTree, eval_path, eval_tree};
pub use data::*;
pub use search::{Search, SearchArea};

/// Identifier of a stored record.
///
/// Non-positive values collapse to [`DataId::VOID`], which stands for
/// "no relation".
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(from = "i64", into = "i64")]
pub struct DataId(i64);

impl DataId {
    pub const VOID: DataId = DataId(0);

    pub const fn new(value: i64) -> Self {
        if value > 0 { DataId(value) } else { DataId::VOID }
    }

    pub fn value(self) -> i64 {
        self.0
    }

    pub fn is_void(self) -> bool {
        self.0 <= 0
    }

    /// Returns `None` for the void id.
    pub fn non_void(self) -> Option<DataId> {
        if self.is_void() { None } else { Some(self) }
    }
}

impl From<i64> for DataId {
    fn from(value: i64) -> Self {
        DataId::new(value)
    }
}

impl From<DataId> for i64 {
    fn from(id: DataId) -> Self {
        id.0
    }
}

impl fmt::Display for DataId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DataId {
    type Err = std::num::ParseIntError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().trim_start_matches('#').parse::<i64>().map(DataId::new)
    }
}

/// Error returned when a name does not match any variant of a closed enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub name: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} '{}'", self.kind, self.name)
    }
}

impl std::error::Error for UnknownVariant {}

/// Declares a closed enum with a display name per variant, `FromStr`
/// (case-insensitive) and serde support through those names.
macro_rules! named_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident : $label:literal {
            $( $variant:ident => $text:literal ),+ $(,)?
        }
        default $default:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        $vis enum $name {
            $( $variant ),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[ $( $name::$variant ),+ ];

            pub fn as_str(self) -> &'static str {
                match self {
                    $( $name::$variant => $text ),+
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.pad(self.as_str())
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::core::UnknownVariant;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.trim();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| {
                        v.as_str().eq_ignore_ascii_case(s)
                            || format!("{:?}", v).eq_ignore_ascii_case(s)
                    })
                    .ok_or_else(|| $crate::core::UnknownVariant {
                        kind: $label,
                        name: s.to_string(),
                    })
            }
        }

        impl ::serde::Serialize for $name {
            fn serialize<S: ::serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D: ::serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(::serde::de::Error::custom)
            }
        }
    };
}

pub(crate) use named_enum;

named_enum! {
    /// Entity kinds known to the engine.
    pub enum Kind: "kind" {
        Currency => "Currency",
        Account => "Account",
        Asset => "Asset",
        Stock => "Stock",
        Category => "Category",
        Payee => "Payee",
        Tag => "Tag",
        Field => "Field",
        Attachment => "Attachment",
        BudgetPeriod => "Budget Period",
        Budget => "Budget",
        Report => "Report",
        Scheduled => "Scheduled",
        Transaction => "Transaction",
    }
    default Account
}

named_enum! {
    /// Owner kind of an attachment.
    pub enum RefType: "reference type" {
        Account => "Account",
        Asset => "Asset",
        Stock => "Stock",
        Payee => "Payee",
        Transaction => "Transaction",
        Scheduled => "Scheduled",
    }
    default Account
}

impl RefType {
    pub fn kind(self) -> Kind {
        match self {
            RefType::Account => Kind::Account,
            RefType::Asset => Kind::Asset,
            RefType::Stock => Kind::Stock,
            RefType::Payee => Kind::Payee,
            RefType::Transaction => Kind::Transaction,
            RefType::Scheduled => Kind::Scheduled,
        }
    }
}

named_enum! {
    /// Keys of the single-row settings table.
    pub enum InfoKey: "info key" {
        BaseCurrencyId => "BASECURRENCYID",
        CategoryDelimiter => "CATEG_DELIMITER",
        DefaultAccountId => "DEFAULTACCOUNTID",
    }
    default BaseCurrencyId
}
