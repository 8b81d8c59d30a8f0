//! Schema tables
//!
//! This module holds the pre-validated tables a run is driven by: event
//! definitions keyed by id and the typedef registry used for field access and
//! enum lookups. Both are built once, then only read.

pub mod events;
pub mod typedef;

// Re-export key types for convenience
pub use events::{EventDefinition, EventDefinitionTable};
pub use typedef::{
    ByteOrder, EnumEntry, IntegerType, MemberDefinition, RegistryStats, TypedefEntry,
    TypedefRegistry,
};
