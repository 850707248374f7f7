pub mod assembler;
pub mod error;
pub mod labels;
pub mod listing;
pub mod operands;
pub mod scanner;

pub use assembler::{assemble, Assembly};
pub use error::{AsmError, AsmErrorKind};
pub use listing::{disassemble, ListingLine};
