//! Domain model for the training/credentialing record store.
//!
//! # Responsibility
//! - Define read models returned by repositories and drafts accepted by them.
//! - Own the closed status/role vocabularies and their storage spelling.
//!
//! # Invariants
//! - Every record is identified by a stable UUID.
//! - Enum values are persisted upper-case and parsed case-insensitively.

/// Declares a closed, upper-case persisted vocabulary.
///
/// Generated enums serialize as their storage spelling and deserialize
/// case-insensitively, so loosely-typed request bodies (`"faculty"`) and
/// stored rows (`"FACULTY"`) share one representation.
macro_rules! db_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($(#[$variant_meta:meta])* $variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($(#[$variant_meta])* $variant),+
        }

        impl $name {
            /// Storage spelling of every variant, in declaration order.
            pub const VALUES: &'static [&'static str] = &[$($text),+];

            pub fn as_db(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }

            pub fn parse(value: &str) -> Option<Self> {
                let normalized = value.trim().to_ascii_uppercase();
                match normalized.as_str() {
                    $($text => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_db())
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_db())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                Self::parse(&raw).ok_or_else(|| {
                    serde::de::Error::custom(format!(
                        "unknown {} `{raw}`; expected one of {}",
                        stringify!($name),
                        Self::VALUES.join("|")
                    ))
                })
            }
        }

        impl rusqlite::types::ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
                Ok(rusqlite::types::ToSqlOutput::from(self.as_db()))
            }
        }

        impl rusqlite::types::FromSql for $name {
            fn column_result(value: rusqlite::types::ValueRef<'_>) -> rusqlite::types::FromSqlResult<Self> {
                let text = value.as_str()?;
                Self::parse(text).ok_or_else(|| {
                    rusqlite::types::FromSqlError::Other(
                        format!("invalid {} value `{text}`", stringify!($name)).into(),
                    )
                })
            }
        }
    };
}

pub(crate) use db_enum;

pub mod cme;
pub mod course;
pub mod credential;
pub mod meeting;
pub mod note;
pub mod page;
pub mod person;
