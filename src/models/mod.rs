//! Plain data types for the object system.
//!
//! - [`Identifier`]: a `(space, key)` pair parsed from a composite id string.
//! - [`Model`]: the JSON state owned by a domain object, including the
//!   `modified` timestamp that drives cache invalidation.
//! - [`ModelHandle`]: shared storage for one object's model.

mod identifier;
mod model;

pub use identifier::*;
pub use model::*;
