pub mod access;
pub mod assignment;
pub mod event;
pub mod offer;
pub mod position;
pub mod user;
pub mod warehouse;

pub use access::{Module, Permission, UserGrants};
pub use assignment::{Assignment, AssignmentPatch, EventAssignee, MyAssignment, NewAssignment};
pub use event::{Event, EventPatch, NewEvent};
pub use offer::{NewOffer, NewOfferItem, Offer, OfferItem, OfferItemPatch, OfferPatch};
pub use position::{NewPosition, Position, PositionPatch};
pub use user::{NewUser, User, UserPatch};
pub use warehouse::{
    KitItem, KitItemInput, NewKit, NewReservation, NewWarehouseItem, PicklistRow, Reservation,
    ReservationPatch, WarehouseItem, WarehouseItemPatch, WarehouseKit, WarehouseKitPatch,
};

use serde::{Deserialize, Deserializer};

/// Distinguishes an absent PATCH field (`None`) from an explicit `null`
/// (`Some(None)`), so nullable columns can be cleared.
pub(crate) fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
