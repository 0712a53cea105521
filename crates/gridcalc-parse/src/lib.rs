pub mod expression;
pub mod parser;
pub mod render;
pub mod scanner;
#[cfg(test)]
mod tests;
pub mod types;

pub use expression::{AddressUnit, ExpressionUnit, RangeUnit, UnitKind};
pub use parser::{Parser, parse};
pub use scanner::precedence;
pub use types::{
    ArgumentSeparator, DecimalMark, DependencyList, ParseError, ParseErrorKind, ParseResult,
    ParserConfig, ReferenceUnit, RenderOffset, RenderOptions,
};

// Re-export common types
pub use gridcalc_common::{Address, CellAddress, Value};
