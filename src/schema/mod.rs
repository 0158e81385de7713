pub mod registry;
pub mod types;

pub use registry::{
    ColumnMap, FieldSpec, SchemaRegistry, SourceColumn, BRANCH_CODE_COLUMN, BRANCH_LABEL_MARKER,
    HEADER_ROW,
};
pub use types::{CanonicalField, FieldKind};
