//! Schema Binder & Contract Validator (spec.md §4.F, §4.G): row offset
//! detection against discovered schemas, and validation against registered
//! canonical schema contracts.

pub mod offset;
pub mod registry;
pub mod validator;

pub use offset::{detect_offsets, reorder_row, OffsetMap};
pub use registry::CanonicalRegistry;
pub use validator::{validate_row, validate_row_mut, ValidationOutcome};
