//! Domain operations. Every function takes the connection it runs on, so a
//! handler decides whether it is a user-scoped or a service transaction.

pub mod access;
pub mod assignments;
pub mod calendar_sync;
pub mod events;
pub mod folders;
pub mod offers;
pub mod positions;
pub mod users;
pub mod warehouse;

pub use access::AccessProfile;
