//! Macro for implementing Display and FromStr for status enums
//!
//! Wire statuses arrive in mixed case from different backends (`"PROCESSING"`,
//! `"timedOut"`), so parsing is case-insensitive while display always uses the
//! canonical spelling.
//!
//! # Example
//!
//! ```rust
//! use courier_domain::impl_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Connectivity {
//!     Online,
//!     Offline,
//! }
//!
//! impl_status_conversions!(Connectivity {
//!     Online => "online",
//!     Offline => "offline",
//! });
//!
//! assert_eq!("ONLINE".parse::<Connectivity>().unwrap(), Connectivity::Online);
//! ```

/// Implements Display and FromStr traits for status enums
///
/// - Display writes the canonical string given in the mapping
/// - FromStr accepts any ASCII casing of the canonical string
#[macro_export]
macro_rules! impl_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl ::std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($str),)+
                }
            }
        }

        impl ::std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                $(
                    if s.eq_ignore_ascii_case($str) {
                        return Ok(Self::$variant);
                    }
                )+
                Err(format!("Invalid {}: {}", stringify!($enum_name), s))
            }
        }
    };
}
