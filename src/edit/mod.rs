//! Edit sessions: private working copies of every object an editor touches.
//!
//! An [`EditableObjectCache`] is one session. Looking an object up through it
//! yields an [`EditableDomainObject`] holding a clone of the model; all
//! mutation during the session lands on those clones. Within one session each
//! id maps to exactly one editable wrapper, and traversal through an editable
//! (composition, context, instantiation) hands back editables from the same
//! session.
//!
//! Saving copies the clones onto the real objects through their mutation
//! capability and persists them. Dropping or closing the session discards
//! every clone.

mod cache;
mod editable;
mod editor;
mod wrappers;

pub use cache::EditableObjectCache;
pub use editable::EditableDomainObject;
pub use editor::EditorCapability;

pub(crate) use cache::WeakCache;
