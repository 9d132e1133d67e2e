use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// String newtype shared by every identifier in the hub.
///
/// The `opaque` form wraps identifiers minted elsewhere (user ids come from the
/// auth layer, room ids from clients). The prefixed form also mints fresh,
/// time-ordered ids.
macro_rules! branded_id {
    ($name:ident) => {
        #[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn from_raw(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::convert::Infallible;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.to_owned()))
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
    ($name:ident, $prefix:expr) => {
        branded_id!($name);

        impl $name {
            pub fn new() -> Self {
                Self(format!("{}_{}", $prefix, Uuid::now_v7()))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

branded_id!(UserId);
branded_id!(RoomId);
branded_id!(MessageId, "msg");
branded_id!(ConnectionId, "conn");

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn message_id_has_prefix() {
        let id = MessageId::new();
        assert!(id.as_str().starts_with("msg_"), "got: {id}");
    }

    #[test]
    fn connection_id_has_prefix() {
        let id = ConnectionId::new();
        assert!(id.as_str().starts_with("conn_"), "got: {id}");
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn generated_ids_sort_by_creation() {
        let ids: Vec<MessageId> = (0..50).map(|_| MessageId::new()).collect();
        for w in ids.windows(2) {
            assert!(w[0] < w[1], "not monotonic: {} >= {}", w[0], w[1]);
        }
    }

    #[test]
    fn opaque_ids_keep_raw_value() {
        let user = UserId::from_raw("alice-id");
        assert_eq!(user.as_str(), "alice-id");
        assert_eq!(user.to_string(), "alice-id");
        assert_eq!(RoomId::from("general").into_inner(), "general");
    }

    #[test]
    fn serializes_as_plain_string() {
        let user = UserId::from_raw("bob-id");
        assert_eq!(serde_json::to_string(&user).unwrap(), "\"bob-id\"");
        let back: UserId = serde_json::from_str("\"bob-id\"").unwrap();
        assert_eq!(back, user);
    }

    #[test]
    fn borrowed_lookup_in_sets() {
        let mut set = HashSet::new();
        set.insert(UserId::from_raw("carol"));
        assert!(set.contains("carol"));
    }
}
