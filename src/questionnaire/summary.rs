use std::fmt;

use super::model::Questionnaire;

/// Aggregate counts for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub report_type: String,
    pub section_count: usize,
    pub card_count: usize,
    pub question_count: usize,
}

pub fn summarize(questionnaire: &Questionnaire) -> Summary {
    let (card_count, question_count) = questionnaire
        .sections
        .iter()
        .flat_map(|s| s.cards.iter())
        .fold((0, 0), |(cards, questions), card| (cards + 1, questions + card.questions.len()));

    Summary {
        report_type: questionnaire.report_type.clone(),
        section_count: questionnaire.sections.len(),
        card_count,
        question_count,
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Questionnaire Summary ({}):\n\
             • Sections: {}\n\
             • Cards: {}\n\
             • Questions: {}",
            self.report_type, self.section_count, self.card_count, self.question_count
        )
    }
}
