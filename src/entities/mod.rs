//! sea-orm entities for the four record types, with their forms and store operations.

pub mod car;
pub mod case;
pub mod collector_profile;
pub mod series;

pub mod prelude {
    pub use super::car::{CarCondition, Entity as Car, TreasureHunt};
    pub use super::case::{CaseCode, Entity as Case};
    pub use super::collector_profile::Entity as CollectorProfile;
    pub use super::series::Entity as Series;
}
