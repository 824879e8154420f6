pub mod builder;
pub mod derived;
pub mod framework;
pub mod model;
pub mod row;
pub mod schema;
pub mod summary;

pub use builder::{BuildOptions, Ingested, build_questionnaire, build_questionnaire_chunked, build_questionnaire_with};
pub use derived::{Answers, Operation, conditional_visible, evaluate, recompute_derived, visible_fields};
pub use framework::{FrameworkEntry, FrameworkRegistry, WidgetKind};
pub use model::{AnswerCardinality, Card, ParseError, Question, QuestionClass, Questionnaire, Section};
pub use row::{RawRow, ValidatedRow, ValidationFailure, validate_row};
pub use schema::{Calculation, Condition, FieldKind, FieldProps, InputField, InputSchema, parse_schema, try_parse_schema};
pub use summary::{Summary, summarize};
