//! Wire enums for job status and priority.
//!
//! Both cross the wire as small integers. Each enum variant's discriminant
//! is its wire code, so the numbering below is part of the client-server
//! contract and must not be reordered.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;
use crate::types::WireCode;

macro_rules! define_wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:expr ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Every variant, in wire-code order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Return the wire code.
            pub fn id(self) -> WireCode {
                self as WireCode
            }

            /// Variant name as used in logs and messages.
            pub fn name(self) -> &'static str {
                match self {
                    $( $name::$variant => stringify!($variant) ),+
                }
            }
        }

        impl From<$name> for WireCode {
            fn from(value: $name) -> Self {
                value as WireCode
            }
        }

        impl TryFrom<WireCode> for $name {
            type Error = CoreError;

            fn try_from(code: WireCode) -> Result<Self, Self::Error> {
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.id() == code)
                    .ok_or_else(|| {
                        CoreError::Validation(format!(
                            "Unknown {} code: {code}",
                            stringify!($name)
                        ))
                    })
            }
        }

        /// Accepts either the wire code (`"3"`) or the variant name,
        /// case-insensitively (`"completed"`).
        impl std::str::FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.trim();
                if let Ok(code) = s.parse::<WireCode>() {
                    return $name::try_from(code);
                }
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.name().eq_ignore_ascii_case(s))
                    .ok_or_else(|| {
                        CoreError::Validation(format!(
                            "Unknown {}: {s}",
                            stringify!($name)
                        ))
                    })
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.name())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_i16(self.id())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let code = WireCode::deserialize(deserializer)?;
                $name::try_from(code).map_err(serde::de::Error::custom)
            }
        }
    };
}

define_wire_enum! {
    /// Job execution status.
    JobStatus {
        #[default]
        Pending = 0,
        InQueue = 1,
        Running = 2,
        Completed = 3,
        Failed = 4,
        Stopped = 5,
    }
}

define_wire_enum! {
    /// Job scheduling priority.
    JobPriority {
        #[default]
        Regular = 0,
        High = 1,
    }
}

impl JobStatus {
    /// Whether a job in this status may carry a `started_at` timestamp.
    pub fn has_started(self) -> bool {
        matches!(
            self,
            JobStatus::Running | JobStatus::Completed | JobStatus::Failed | JobStatus::Stopped
        )
    }

    /// Whether the job is still moving (queued or executing).
    pub fn is_active(self) -> bool {
        matches!(self, JobStatus::InQueue | JobStatus::Running)
    }
}
