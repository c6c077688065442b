mod database;
mod prototypes;

pub use database::{Prototype, PrototypeDatabase, PrototypeId};
pub use prototypes::{
    load_prototypes, parse_prototypes, ContentError, ContentErrorCode, SourceLocation,
};
