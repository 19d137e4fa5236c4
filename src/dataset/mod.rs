//! Loading the MovieLens-style inputs and the enrichment snapshot.
pub mod join;
pub mod table;

pub use join::{
    join_records, load_or_create_table, read_links, BaseTable, JoinedRecord, TableOrigin,
};
pub use table::{EnrichmentFields, EnrichmentTable};
