mod parser;
mod types;

pub use parser::{parse, to_csv};
pub use types::*;
