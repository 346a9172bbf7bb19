//! 指令层：数据模型、Extractor、格式说明

pub mod extractor;
pub mod schema;
pub mod types;

pub use extractor::{extract, DirectiveTag, ExtractionError};
pub use schema::{directive_schemas_json, DIRECTIVE_FORMATS};
pub use types::{ActionRequest, ActionResult, ActionStatus, DisplayRequest, Extraction, Plan};
