// file: src/models/mod.rs
// description: data models module exports
// reference: internal module structure

pub mod month;
pub mod raw;
pub mod stage;
pub mod table;

pub use month::Month;
pub use raw::{Orientation, RawTable};
pub use stage::{RESERVED_TOTAL, Stage, StageCatalog, StageCatalogBuilder};
pub use table::{CombinedTable, ProgressTable, SiteDataset, SourceIdentity};
