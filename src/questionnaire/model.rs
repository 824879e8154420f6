/// Domain model for a built questionnaire
/// Sections own cards, cards own questions; nothing points back up the tree

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use super::framework::WidgetKind;
use super::row::RawRow;
use super::schema::InputSchema;

static MARKUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());
static SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Complete questionnaire for one report framework
#[derive(Clone, Debug, PartialEq)]
pub struct Questionnaire {
    pub report_type: String,
    pub sections: Vec<Section>,
}

/// A section contains cards
#[derive(Clone, Debug, PartialEq)]
pub struct Section {
    pub external_id: String,
    pub title: String,
    pub description: Option<String>,
    pub sequence: i64,
    pub cards: Vec<Card>,
}

/// A card groups related questions under one disclosure
#[derive(Clone, Debug, PartialEq)]
pub struct Card {
    pub sequence: i64,
    pub standards: String,
    pub title: String,
    pub is_active: bool,
    /// `Some(false)` hides the card for the facility without dropping it
    pub is_enabled_for_facility: Option<bool>,
    pub questions: Vec<Question>,
}

/// A question with its parsed input schema. Answers are tracked elsewhere,
/// keyed by `external_id`
#[derive(Clone, Debug, PartialEq)]
pub struct Question {
    pub external_id: String,
    pub title: String,
    pub description: Option<String>,
    pub class: QuestionClass,
    pub esg_type: String,
    pub schema: InputSchema,
    pub sequence: i64,
    pub monthly: Option<bool>,
}

/// Layout and answer-cardinality strategy of a question
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum QuestionClass {
    SingleRowSingleInputSingleAnswer,
    SingleRowMultipleInputSingleAnswer,
    MultipleRowSingleInputMultipleAnswer,
    MultipleRowMultipleInputMultipleAnswer,
    Unknown(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnswerCardinality {
    Single,
    Multiple,
}

/// A row that could not be ingested
#[derive(Clone, Debug, PartialEq)]
pub struct ParseError {
    /// Index into the source rows; `None` when no row is attached
    pub row_index: Option<usize>,
    pub question_external_id: Option<String>,
    pub reason: String,
    pub row: Option<RawRow>,
}

impl Questionnaire {
    pub fn empty(report_type: impl Into<String>) -> Self {
        Self {
            report_type: report_type.into(),
            sections: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sections.iter().all(|s| s.cards.is_empty())
    }

    pub fn questions(&self) -> impl Iterator<Item = &Question> {
        self.sections
            .iter()
            .flat_map(|s| s.cards.iter())
            .flat_map(|c| c.questions.iter())
    }

    pub fn find_question(&self, external_id: &str) -> Option<&Question> {
        self.questions().find(|q| q.external_id == external_id)
    }
}

impl Card {
    /// Visible to the current facility. Distinct from `is_active`, which
    /// removes the card at build time
    pub fn is_visible_for_facility(&self) -> bool {
        self.is_enabled_for_facility != Some(false)
    }
}

impl Question {
    /// Description with markup tags removed and whitespace collapsed
    pub fn plain_description(&self) -> Option<String> {
        let description = self.description.as_deref()?;
        let stripped = MARKUP.replace_all(description, " ");
        let collapsed = SPACES.replace_all(stripped.trim(), " ").into_owned();
        if collapsed.is_empty() { None } else { Some(collapsed) }
    }

    pub fn answer_cardinality(&self) -> AnswerCardinality {
        self.class.cardinality()
    }
}

impl QuestionClass {
    pub const KNOWN: &'static [QuestionClass] = &[
        QuestionClass::SingleRowSingleInputSingleAnswer,
        QuestionClass::SingleRowMultipleInputSingleAnswer,
        QuestionClass::MultipleRowSingleInputMultipleAnswer,
        QuestionClass::MultipleRowMultipleInputMultipleAnswer,
    ];

    pub fn from_tag(tag: &str) -> Self {
        Self::KNOWN
            .iter()
            .find(|c| c.as_tag() == tag)
            .cloned()
            .unwrap_or_else(|| QuestionClass::Unknown(tag.to_string()))
    }

    pub fn as_tag(&self) -> &str {
        match self {
            QuestionClass::SingleRowSingleInputSingleAnswer => "single_row_single_input_single_answer",
            QuestionClass::SingleRowMultipleInputSingleAnswer => "single_row_multiple_input_single_answer",
            QuestionClass::MultipleRowSingleInputMultipleAnswer => "multiple_row_single_input_multiple_answer",
            QuestionClass::MultipleRowMultipleInputMultipleAnswer => "multiple_row_multiple_input_multiple_answer",
            QuestionClass::Unknown(tag) => tag,
        }
    }

    pub fn default_widget(&self) -> WidgetKind {
        match self {
            QuestionClass::SingleRowSingleInputSingleAnswer => WidgetKind::SingleInput,
            QuestionClass::SingleRowMultipleInputSingleAnswer => WidgetKind::InputRow,
            QuestionClass::MultipleRowSingleInputMultipleAnswer
            | QuestionClass::MultipleRowMultipleInputMultipleAnswer => WidgetKind::InputGrid,
            QuestionClass::Unknown(_) => WidgetKind::Fallback,
        }
    }

    pub fn cardinality(&self) -> AnswerCardinality {
        match self {
            QuestionClass::MultipleRowSingleInputMultipleAnswer
            | QuestionClass::MultipleRowMultipleInputMultipleAnswer => AnswerCardinality::Multiple,
            _ => AnswerCardinality::Single,
        }
    }
}

impl fmt::Display for QuestionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

impl ParseError {
    /// Index as reported to renderers: -1 when no row is attached
    pub fn display_index(&self) -> i64 {
        self.row_index.map(|i| i as i64).unwrap_or(-1)
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.row_index, &self.question_external_id) {
            (Some(i), Some(q)) => write!(f, "row {} (question '{}'): {}", i, q, self.reason),
            (Some(i), None) => write!(f, "row {}: {}", i, self.reason),
            (None, _) => write!(f, "{}", self.reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(description: Option<&str>) -> Question {
        Question {
            external_id: "Q1".into(),
            title: "Title".into(),
            description: description.map(str::to_string),
            class: QuestionClass::from_tag("multiple_row_single_input_multiple_answer"),
            esg_type: "social".into(),
            schema: InputSchema::fallback(),
            sequence: 1,
            monthly: None,
        }
    }

    #[test]
    fn test_plain_description_strips_markup() {
        let q = question(Some("<p>Report <b>total</b>\n energy</p>"));
        assert_eq!(q.plain_description().as_deref(), Some("Report total energy"));
        assert_eq!(question(Some("<br/>")).plain_description(), None);
        assert_eq!(question(None).plain_description(), None);
    }

    #[test]
    fn test_question_class_tags() {
        let class = QuestionClass::from_tag("single_row_multiple_input_single_answer");
        assert_eq!(class, QuestionClass::SingleRowMultipleInputSingleAnswer);
        assert_eq!(class.default_widget(), WidgetKind::InputRow);
        let unknown = QuestionClass::from_tag("matrix");
        assert_eq!(unknown.as_tag(), "matrix");
        assert_eq!(unknown.default_widget(), WidgetKind::Fallback);
        assert_eq!(question(None).answer_cardinality(), AnswerCardinality::Multiple);
    }

    #[test]
    fn test_parse_error_display_index() {
        let mut error = ParseError {
            row_index: Some(4),
            question_external_id: Some("Q1".into()),
            reason: "missing required field 'card_title'".into(),
            row: None,
        };
        assert_eq!(error.display_index(), 4);
        assert_eq!(error.to_string(), "row 4 (question 'Q1'): missing required field 'card_title'");
        error.row_index = None;
        assert_eq!(error.display_index(), -1);
    }
}
