//! Document loading tests against the fixtures in `tests/fixtures`

use std::path::PathBuf;

use esg_questionnaire::questionnaire::{BuildOptions, FieldKind, QuestionClass, summarize};
use esg_questionnaire::{FileSource, FrameworkRegistry, SheetSource, load_questionnaire};

fn fixtures() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures")
}

#[tokio::test]
async fn test_json_document_builds_sorted_hierarchy() {
    let source = FileSource::new(fixtures());
    let registry = FrameworkRegistry::builtin();
    let result = load_questionnaire(&source, "GRI202", &registry, "GRI", BuildOptions::default())
        .await
        .unwrap();

    let questionnaire = &result.questionnaire;
    assert_eq!(questionnaire.report_type, "GRI");
    let section_ids: Vec<_> = questionnaire.sections.iter().map(|s| s.external_id.as_str()).collect();
    assert_eq!(section_ids, vec!["S-GOV", "S-ENV"]);

    let env = &questionnaire.sections[1];
    assert_eq!(env.cards.len(), 1);
    assert_eq!(env.cards[0].title, "Energy consumption");
    let ids: Vec<_> = env.cards[0].questions.iter().map(|q| q.external_id.as_str()).collect();
    assert_eq!(ids, vec!["ENV-3", "ENV-1"]);

    let summary = summarize(questionnaire);
    assert_eq!(summary.section_count, 2);
    assert_eq!(summary.card_count, 2);
    assert_eq!(summary.question_count, 3);
}

#[tokio::test]
async fn test_json_document_reports_errors_at_document_index() {
    let source = FileSource::new(fixtures());
    let result = load_questionnaire(&source, "GRI202", &FrameworkRegistry::builtin(), "GRI", BuildOptions::default())
        .await
        .unwrap();

    let indices: Vec<_> = result.errors.iter().map(|e| e.row_index).collect();
    assert_eq!(indices, vec![Some(3), Some(4)]);
    assert!(result.errors[0].reason.contains("question_external_id"));
    assert!(result.errors[0].row.is_some());
    assert!(result.errors[1].reason.contains("not an object"));
}

#[tokio::test]
async fn test_json_document_question_details() {
    let source = FileSource::new(fixtures());
    let result = load_questionnaire(&source, "GRI202", &FrameworkRegistry::builtin(), "GRI", BuildOptions::default())
        .await
        .unwrap();
    let questionnaire = &result.questionnaire;

    let energy = questionnaire.find_question("ENV-1").unwrap();
    assert_eq!(energy.monthly, Some(true));
    assert_eq!(energy.plain_description().as_deref(), Some("Report in gigajoules"));
    assert_eq!(energy.schema.layout.as_deref(), Some("row"));
    assert_eq!(energy.schema.inputs.len(), 3);
    assert_eq!(energy.schema.field("share").unwrap().kind, FieldKind::Derived);

    let intensity = questionnaire.find_question("ENV-3").unwrap();
    assert!(intensity.schema.is_fallback);
    assert_eq!(intensity.class, QuestionClass::Unknown("custom_matrix".into()));

    let governance = questionnaire.find_question("GOV-1").unwrap();
    assert_eq!(governance.sequence, 1);
    assert_eq!(governance.schema.inputs[0].props.rows(), Some(5));
}

#[tokio::test]
async fn test_chunk_size_does_not_change_result() {
    let source = FileSource::new(fixtures());
    let registry = FrameworkRegistry::builtin();
    let whole = load_questionnaire(&source, "GRI202", &registry, "GRI", BuildOptions::default())
        .await
        .unwrap();
    let options = BuildOptions {
        chunk_size: 2,
        ..BuildOptions::default()
    };
    let chunked = load_questionnaire(&source, "GRI202", &registry, "GRI", options).await.unwrap();
    assert_eq!(whole, chunked);
}

#[tokio::test]
async fn test_csv_export_skips_blank_rows() {
    let source = SheetSource::new(fixtures());
    let result = load_questionnaire(&source, "GRI305", &FrameworkRegistry::builtin(), "GRI", BuildOptions::default())
        .await
        .unwrap();

    assert!(result.errors.is_empty());
    let questionnaire = &result.questionnaire;
    assert_eq!(questionnaire.sections.len(), 1);
    assert_eq!(questionnaire.sections[0].cards.len(), 1);
    let question = &questionnaire.sections[0].cards[0].questions[0];
    assert_eq!(question.external_id, "EM-1");
    assert_eq!(question.schema.inputs[0].label, "tCO2e");
    assert!(questionnaire.find_question("EM-2").is_none());
}

#[tokio::test]
async fn test_missing_document_is_fatal() {
    let source = FileSource::new(fixtures());
    let result = load_questionnaire(&source, "GRI999", &FrameworkRegistry::builtin(), "GRI", BuildOptions::default()).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_non_array_document_is_fatal() {
    let dir = std::env::temp_dir().join(format!("esg-questionnaire-loader-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("GRI1.json"), r#"{"rows": []}"#).unwrap();

    let source = FileSource::new(&dir);
    let result = load_questionnaire(&source, "GRI1", &FrameworkRegistry::builtin(), "GRI", BuildOptions::default()).await;
    let _ = std::fs::remove_dir_all(&dir);

    let err = result.unwrap_err();
    assert!(err.to_string().contains("JSON array"));
}
