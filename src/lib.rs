//! Humdrum - Humdrum text format library
//!
//! This library reads Humdrum data into lines and tokens, follows spines
//! through split, merge, exchange, add and terminate manipulators, assigns
//! tracks and subtracks, and computes exact rhythmic timing for each line.

pub mod analysis;
pub mod csv;
pub mod error;
pub mod file;
pub mod parser;
pub mod types;
pub mod util;
pub mod xml;

// Re-export commonly used types
pub use analysis::AnalysisOptions;
pub use error::AnalysisError;
pub use error::HumdrumError;
pub use file::HumdrumFile;
pub use file::LineView;
pub use parser::parse_humdrum;
pub use parser::parse_humdrum_csv;
pub use parser::parse_humdrum_with;
pub use types::duration::HumNum;
pub use types::duration::Timing;
pub use types::line::HumdrumLine;
pub use types::line::LineKind;
pub use types::line::LineOwner;
pub use types::parameters::ParameterStore;
pub use types::token::HumdrumToken;
pub use types::token::TokenId;
