//! Folds validated rows into sections, cards and questions.
//!
//! Every rejected row is collected as a [`ParseError`] next to the
//! questionnaire; the rows that remain are grouped and sorted.

use std::collections::{HashMap, HashSet};

use log::{debug, info, warn};

use super::framework::FrameworkRegistry;
use super::model::{Card, ParseError, Question, QuestionClass, Questionnaire, Section};
use super::row::{RawRow, ValidatedRow, validate_row};
use super::schema::{DEFAULT_MAX_DEPTH, parse_schema_with_depth};

pub const DEFAULT_CHUNK_SIZE: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    /// Rows validated between scheduler yields in the async builder.
    pub chunk_size: usize,
    pub max_schema_depth: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_schema_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// A built questionnaire together with everything that was left out of it.
#[derive(Debug, Clone, PartialEq)]
pub struct Ingested {
    pub questionnaire: Questionnaire,
    pub errors: Vec<ParseError>,
}

/// (section id, card sequence, card title)
type CardKey = (String, i64, String);

/// Build a questionnaire from raw rows with default options.
pub fn build_questionnaire(rows: &[RawRow], registry: &FrameworkRegistry, framework: &str) -> Ingested {
    build_questionnaire_with(rows, registry, framework, BuildOptions::default())
}

pub fn build_questionnaire_with(
    rows: &[RawRow],
    registry: &FrameworkRegistry,
    framework: &str,
    options: BuildOptions,
) -> Ingested {
    let mut validated = Vec::with_capacity(rows.len());
    let mut errors = Vec::new();
    validate_chunk(rows, 0, registry, framework, &mut validated, &mut errors);
    assemble(rows, validated, errors, framework, options)
}

/// Same result as [`build_questionnaire_with`], validating `chunk_size` rows
/// at a time and yielding to the runtime in between.
pub async fn build_questionnaire_chunked(
    rows: &[RawRow],
    registry: &FrameworkRegistry,
    framework: &str,
    options: BuildOptions,
) -> Ingested {
    let chunk_size = options.chunk_size.max(1);
    let mut validated = Vec::with_capacity(rows.len());
    let mut errors = Vec::new();

    for (chunk_index, chunk) in rows.chunks(chunk_size).enumerate() {
        if chunk_index > 0 {
            tokio::task::yield_now().await;
        }
        validate_chunk(chunk, chunk_index * chunk_size, registry, framework, &mut validated, &mut errors);
    }

    assemble(rows, validated, errors, framework, options)
}

fn validate_chunk(
    rows: &[RawRow],
    offset: usize,
    registry: &FrameworkRegistry,
    framework: &str,
    validated: &mut Vec<(usize, ValidatedRow)>,
    errors: &mut Vec<ParseError>,
) {
    for (i, row) in rows.iter().enumerate() {
        let row_index = offset + i;
        match validate_row(row, registry, framework) {
            Ok(v) => validated.push((row_index, v)),
            Err(failure) => {
                debug!("Row {} rejected: {}", row_index, failure);
                errors.push(ParseError {
                    row_index: Some(row_index),
                    question_external_id: failure.question_external_id,
                    reason: failure.reason,
                    row: Some(row.clone()),
                });
            }
        }
    }
}

fn assemble(
    raw: &[RawRow],
    validated: Vec<(usize, ValidatedRow)>,
    mut errors: Vec<ParseError>,
    framework: &str,
    options: BuildOptions,
) -> Ingested {
    let report_type = validated
        .first()
        .map(|(_, r)| r.report_type.clone())
        .unwrap_or_else(|| framework.to_string());

    let rows = reject_duplicates(raw, validated, &mut errors);
    errors.sort_by_key(|e| e.row_index.unwrap_or(usize::MAX));

    let mut sections: Vec<Section> = group_in_order(rows, |r| r.section_external_id.clone())
        .into_iter()
        .map(|(section_id, section_rows)| build_section(&section_id, section_rows, options))
        .collect();
    sections.sort_by_key(|s| s.sequence);

    let questionnaire = Questionnaire { report_type, sections };
    info!(
        "Built questionnaire '{}': {} sections, {} questions, {} errors",
        questionnaire.report_type,
        questionnaire.sections.len(),
        questionnaire.questions().count(),
        errors.len()
    );

    Ingested { questionnaire, errors }
}

/// Keep the first row for each question id across the whole document and
/// reject later repeats. Rows of inactive cards are never output, so they
/// neither claim an id nor get rejected.
fn reject_duplicates(
    raw: &[RawRow],
    rows: Vec<(usize, ValidatedRow)>,
    errors: &mut Vec<ParseError>,
) -> Vec<ValidatedRow> {
    let inactive_cards: HashSet<CardKey> = rows
        .iter()
        .filter(|(_, r)| !r.is_card_active)
        .map(|(_, r)| card_key(r))
        .collect();

    let mut first_seen: HashMap<String, usize> = HashMap::new();
    let mut kept = Vec::with_capacity(rows.len());
    for (index, row) in rows {
        if !inactive_cards.contains(&card_key(&row)) {
            if let Some(&first) = first_seen.get(&row.question_external_id) {
                debug!("Row {} rejected: question '{}' repeats row {}", index, row.question_external_id, first);
                errors.push(ParseError {
                    row_index: Some(index),
                    reason: format!(
                        "duplicate question_external_id '{}' (first used by row {})",
                        row.question_external_id, first
                    ),
                    question_external_id: Some(row.question_external_id),
                    row: raw.get(index).cloned(),
                });
                continue;
            }
            first_seen.insert(row.question_external_id.clone(), index);
        }
        kept.push(row);
    }
    kept
}

fn card_key(row: &ValidatedRow) -> CardKey {
    (row.section_external_id.clone(), row.card_sequence, row.card_title.clone())
}

fn build_section(section_id: &str, rows: Vec<ValidatedRow>, options: BuildOptions) -> Section {
    // First row wins for section metadata; groups are never empty.
    let (title, description, sequence) = rows
        .first()
        .map(|r| (r.section_title.clone(), r.section_description.clone(), r.section_sequence))
        .unwrap_or_default();
    if rows
        .iter()
        .any(|r| r.section_title != title || r.section_sequence != sequence)
    {
        debug!(
            "Section '{}' rows disagree on title or sequence, keeping '{}' / {}",
            section_id, title, sequence
        );
    }

    let mut cards = Vec::new();
    for (_, card_rows) in group_in_order(rows, |r| (r.card_sequence, r.card_title.clone())) {
        let card = build_card(card_rows, options);
        if card.is_active {
            cards.push(card);
        } else {
            debug!("Skipping inactive card '{}' in section '{}'", card.title, section_id);
        }
    }
    cards.sort_by_key(|c| c.sequence);

    Section {
        external_id: section_id.to_string(),
        title,
        description,
        sequence,
        cards,
    }
}

fn build_card(rows: Vec<ValidatedRow>, options: BuildOptions) -> Card {
    let (sequence, standards, title, is_enabled_for_facility) = rows
        .first()
        .map(|r| (r.card_sequence, r.card_standards.clone(), r.card_title.clone(), r.is_enabled_for_facility))
        .unwrap_or_default();
    // Any inactive row takes the whole card out.
    let is_active = rows.iter().all(|r| r.is_card_active);

    let mut questions: Vec<Question> = rows.into_iter().map(|row| build_question(row, options)).collect();
    questions.sort_by_key(|q| q.sequence);

    Card {
        sequence,
        standards,
        title,
        is_active,
        is_enabled_for_facility,
        questions,
    }
}

fn build_question(row: ValidatedRow, options: BuildOptions) -> Question {
    let schema = parse_schema_with_depth(&row.question_schema, options.max_schema_depth);
    let class = QuestionClass::from_tag(&row.question_class);
    if let QuestionClass::Unknown(tag) = &class {
        warn!("Question '{}' has unknown class '{}', using the fallback widget", row.question_external_id, tag);
    }
    Question {
        external_id: row.question_external_id,
        title: row.question_title,
        description: row.question_description,
        class,
        esg_type: row.esg_type,
        schema,
        sequence: row.question_sequence,
        monthly: row.monthly,
    }
}

/// Group items by key, keeping first-encounter order of keys and the input
/// order within each group.
fn group_in_order<T, K, F>(items: Vec<T>, key: F) -> Vec<(K, Vec<T>)>
where
    K: Eq + std::hash::Hash + Clone,
    F: Fn(&T) -> K,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<(K, Vec<T>)> = Vec::new();
    for item in items {
        let k = key(&item);
        match index.get(&k) {
            Some(&i) => groups[i].1.push(item),
            None => {
                index.insert(k.clone(), groups.len());
                groups.push((k, vec![item]));
            }
        }
    }
    groups
}
