//! Newtype IDs for type-safe entity references.
//!
//! Every table in the platform uses a serial `i32` key. Wrapping those keys in
//! distinct types keeps a `RestaurantId` from ever being compared against a
//! `UserId` when the evaluator checks tenant or ownership fields.

/// Define a type-safe ID wrapper around `i32`.
///
/// The generated type is `Copy`, ordered, hashable, serializes as a bare
/// number and parses from its decimal representation.
///
/// # Example
///
/// ```rust
/// # use tablewise_core::define_id;
/// define_id!(TicketId);
///
/// let id: TicketId = "42".parse().unwrap();
/// assert_eq!(id.as_i32(), 42);
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            /// Wrap a raw database key.
            #[must_use]
            pub const fn new(id: i32) -> Self {
                Self(id)
            }

            /// The raw database key.
            #[must_use]
            pub const fn as_i32(&self) -> i32 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                ::core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = ::core::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse::<i32>().map(Self)
            }
        }

        impl From<i32> for $name {
            fn from(id: i32) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(UserId);
define_id!(RoleId);
define_id!(PermissionId);
define_id!(RestaurantId);
define_id!(RecordId);
define_id!(TableId);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims_whitespace() {
        let id: RestaurantId = " 7 ".parse().unwrap();
        assert_eq!(id, RestaurantId::new(7));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("seven".parse::<UserId>().is_err());
    }

    #[test]
    fn test_serializes_as_number() {
        let json = serde_json::to_string(&RoleId::new(3)).unwrap();
        assert_eq!(json, "3");
        let back: RoleId = serde_json::from_str(&json).unwrap();
        assert_eq!(back.as_i32(), 3);
    }
}
