//! The oriented-triangle half-edge structure and its traversals.

pub mod attributes;
pub mod fan_iterator;
pub mod otriangle;
pub mod tri_data_structure;
pub mod tri_iterator;

pub use attributes::EdgeAttributes;
pub use fan_iterator::{AroundApex, AroundOrigin};
pub use otriangle::OTriangle;
pub use tri_data_structure::{TriDataStructure, Triangle};
pub use tri_iterator::TriIterator;
