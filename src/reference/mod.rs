pub mod alias_set;
pub mod loader;
pub mod table;

pub use alias_set::AliasSetError;
pub use loader::{load_from_path, load_from_reader, load_from_str, LoadOptions, TableError};
pub use table::{EntryError, ReferenceEntry, ReferenceTable};
