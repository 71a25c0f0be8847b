mod executor;
mod fields;
mod tool;

pub use executor::{ExecuteError, ToolExecutor};
pub use fields::{FieldKind, ParamField, ToolParameters, ValidationFailure};
pub use tool::Tool;
