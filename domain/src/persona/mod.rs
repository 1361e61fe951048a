//! Persona domain
//!
//! A persona is the static character sheet of one participant. Together with
//! the participant's private view of its peers it forms an [`Identity`].

pub mod identity;
pub mod pool;
pub mod profile;
pub mod relationship;

pub use identity::Identity;
pub use pool::PersonaPool;
pub use profile::PersonaProfile;
pub use relationship::{Relationship, RelationshipUpdate};
