/// Shared status and role enums stored as TEXT columns.
///
/// Each enum round-trips through its lowercase string form on the wire
/// (serde) and in the database (sqlx).
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgArgumentBuffer, PgTypeInfo, PgValueRef};
use sqlx::Postgres;

macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("invalid {} value: {}", stringify!($name), other)),
                }
            }
        }

        impl sqlx::Type<Postgres> for $name {
            fn type_info() -> PgTypeInfo {
                <String as sqlx::Type<Postgres>>::type_info()
            }

            fn compatible(ty: &PgTypeInfo) -> bool {
                <String as sqlx::Type<Postgres>>::compatible(ty)
            }
        }

        impl<'r> sqlx::Decode<'r, Postgres> for $name {
            fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
                let text = <&str as sqlx::Decode<Postgres>>::decode(value)?;
                Ok(text.parse::<$name>()?)
            }
        }

        impl<'q> sqlx::Encode<'q, Postgres> for $name {
            fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> sqlx::encode::IsNull {
                <&str as sqlx::Encode<Postgres>>::encode(self.as_str(), buf)
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    Technician,
}

text_enum!(Role { Admin => "admin", Manager => "manager", Technician => "technician" });

impl Role {
    /// Roles that can fill a position on an event
    pub fn can_be_assigned(&self) -> bool {
        matches!(self, Role::Technician | Role::Manager)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Pending,
    Accepted,
    Declined,
    Tentative,
}

text_enum!(AttendanceStatus {
    Pending => "pending",
    Accepted => "accepted",
    Declined => "declined",
    Tentative => "tentative",
});

impl Default for AttendanceStatus {
    fn default() -> Self {
        AttendanceStatus::Pending
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Planned,
    Confirmed,
    Cancelled,
    Completed,
}

text_enum!(EventStatus {
    Planned => "planned",
    Confirmed => "confirmed",
    Cancelled => "cancelled",
    Completed => "completed",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferStatus {
    Draft,
    Sent,
    Accepted,
    Rejected,
    Expired,
    Cancelled,
}

text_enum!(OfferStatus {
    Draft => "draft",
    Sent => "sent",
    Accepted => "accepted",
    Rejected => "rejected",
    Expired => "expired",
    Cancelled => "cancelled",
});

impl OfferStatus {
    /// Whether an offer may move from `self` to `next`. Same-status is allowed.
    pub fn can_transition_to(&self, next: OfferStatus) -> bool {
        use OfferStatus::*;
        if *self == next {
            return true;
        }
        matches!(
            (self, next),
            (Draft, Sent)
                | (Draft, Cancelled)
                | (Sent, Accepted)
                | (Sent, Rejected)
                | (Sent, Expired)
                | (Sent, Cancelled)
                | (Expired, Sent)
        )
    }

    /// Line items are editable only while drafting
    pub fn items_editable(&self) -> bool {
        matches!(self, OfferStatus::Draft)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Reserved,
    Picked,
    Returned,
    Cancelled,
}

text_enum!(ReservationStatus {
    Reserved => "reserved",
    Picked => "picked",
    Returned => "returned",
    Cancelled => "cancelled",
});

impl ReservationStatus {
    /// Reservations that hold stock
    pub fn is_active(&self) -> bool {
        matches!(self, ReservationStatus::Reserved | ReservationStatus::Picked)
    }
}
