pub mod export;
pub mod sheet;
pub mod sqlite;

pub use export::write_output_chunks;
pub use sheet::{Sheet, read_sheet};
pub use sqlite::SqliteStorage;
