pub mod kaspi_parser;

pub use kaspi_parser::{KaspiParser, Parser};
