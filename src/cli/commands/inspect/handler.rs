//! Inspect command: load one document and print what ingestion made of it

use anyhow::{Result, bail};
use colored::*;
use std::time::Instant;

use super::InspectCommands;
use esg_questionnaire::config::IngestConfig;
use esg_questionnaire::questionnaire::{FrameworkRegistry, Ingested, Question, Questionnaire, summarize};
use esg_questionnaire::source::{DocumentSource, SheetSource, load_questionnaire, source_for};

/// Environment variable that overrides the configured source location
pub const SOURCE_ENV: &str = "ESG_QUESTIONNAIRE_SOURCE";

pub async fn handle_inspect_command(args: InspectCommands) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => IngestConfig::load_from(path)?,
        None => IngestConfig::load()?,
    };
    if let Ok(source) = std::env::var(SOURCE_ENV) {
        config.source = source;
    }
    if let Some(source) = args.source {
        config.source = source;
    }
    if let Some(framework) = args.framework {
        config.framework = framework;
    }

    let registry = FrameworkRegistry::shared();
    if registry.get(&config.framework).is_none() {
        println!(
            "{} Unknown framework '{}', rows are ingested without normalization",
            "!".bright_yellow().bold(),
            config.framework.bright_yellow()
        );
    }

    let source: Box<dyn DocumentSource> = if args.sheet {
        if config.source.starts_with("http://") || config.source.starts_with("https://") {
            bail!("--sheet reads local files only, but the source is '{}'", config.source);
        }
        let sheet = SheetSource::new(&config.source);
        Box::new(match args.worksheet {
            Some(name) => sheet.with_sheet(name),
            None => sheet,
        })
    } else {
        source_for(&config)?
    };

    println!("📄 Loading {} from {}", args.stem.cyan(), source.describe().cyan());
    let start = Instant::now();
    let ingested = load_questionnaire(
        source.as_ref(),
        &args.stem,
        registry,
        &config.framework,
        config.build_options(),
    )
    .await?;
    println!("⏱️  Built in {:.2}ms", start.elapsed().as_secs_f64() * 1000.0);
    println!();

    print_report(&ingested, args.tree);
    Ok(())
}

fn print_report(ingested: &Ingested, tree: bool) {
    let summary = summarize(&ingested.questionnaire);
    println!("{}", summary);
    println!();

    if ingested.questionnaire.is_empty() {
        println!("{}", "No active cards or sections in this document".dimmed());
        println!();
    }

    if tree {
        print_tree(&ingested.questionnaire);
        println!();
    }

    if ingested.errors.is_empty() {
        println!("{} No ingestion errors", "✓".bright_green().bold());
        return;
    }

    println!(
        "{} {} rows were left out:",
        "✗".bright_red().bold(),
        ingested.errors.len().to_string().bright_red().bold()
    );
    for error in &ingested.errors {
        println!("  • {}", error.to_string().red());
    }
}

fn print_tree(questionnaire: &Questionnaire) {
    for section in &questionnaire.sections {
        println!("{} {}", format!("[{}]", section.sequence).dimmed(), section.title.bold());
        for card in &section.cards {
            let hidden = if card.is_visible_for_facility() { "" } else { " (hidden for facility)" };
            println!(
                "  {} {} {}{}",
                format!("[{}]", card.sequence).dimmed(),
                card.title,
                card.standards.dimmed(),
                hidden.yellow()
            );
            for question in &card.questions {
                let fallback = if question.schema.is_fallback { " (fallback input)" } else { "" };
                println!(
                    "    {} {} {}{}",
                    question.external_id.cyan(),
                    question.title,
                    format!("<{}>", question.class).dimmed(),
                    fallback.yellow()
                );
                if let Some(description) = description_line(question) {
                    println!("      {}", description.dimmed());
                }
            }
        }
    }
}

/// Plain-text description for the outline, cut to one terminal line.
fn description_line(question: &Question) -> Option<String> {
    const MAX_CHARS: usize = 100;
    let description = question.plain_description()?;
    if description.chars().count() <= MAX_CHARS {
        return Some(description);
    }
    let cut: String = description.chars().take(MAX_CHARS - 3).collect();
    Some(format!("{}...", cut.trim_end()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use esg_questionnaire::questionnaire::{InputSchema, QuestionClass};

    fn question(description: &str) -> Question {
        Question {
            external_id: "ENV-1".into(),
            title: "Energy".into(),
            description: Some(description.into()),
            class: QuestionClass::from_tag("single_row_single_input_single_answer"),
            esg_type: "environmental".into(),
            schema: InputSchema::fallback(),
            sequence: 1,
            monthly: None,
        }
    }

    #[test]
    fn test_description_line_strips_markup() {
        assert_eq!(
            description_line(&question("<b>Report</b> in gigajoules")).as_deref(),
            Some("Report in gigajoules")
        );
        assert_eq!(description_line(&question("<p></p>")), None);
    }

    #[test]
    fn test_description_line_is_truncated() {
        let line = description_line(&question(&"word ".repeat(40))).unwrap();
        assert!(line.ends_with("..."));
        assert!(line.chars().count() <= 100);
    }
}
