use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID value.
            #[must_use]
            pub fn from_uuid(value: Uuid) -> Self {
                Self(value)
            }

            /// Returns the underlying UUID value.
            #[must_use]
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(formatter, "{}", self.0)
            }
        }
    };
}

uuid_identifier!(
    /// Unique identifier for an invitation record.
    InvitationId
);

uuid_identifier!(
    /// Opaque identifier of the workspace, space, folder, project, team or task being shared.
    TargetId
);

uuid_identifier!(
    /// Unique identifier for a reusable invitation link policy.
    LinkSettingsId
);

uuid_identifier!(
    /// Unique identifier for a self-service access request.
    AccessRequestId
);

uuid_identifier!(
    /// Unique identifier for one bulk invitation run.
    BulkInvitationId
);

uuid_identifier!(
    /// Unique identifier for one audit trail entry.
    ActivityId
);
