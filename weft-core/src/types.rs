//! Type expressions: registry-backed matching and generics resolution.

pub mod generics;
pub mod matching;
pub mod registry;

pub use generics::{apply_generics, extract_generics, find_generics, has_generic};
pub use matching::is_type_match;
pub use registry::{ClassHierarchy, PinDecl, SpecDecl, SpecRegistry};
