//! `frontdesk grade` — Grade answers from a JSON submission file.
//!
//! The file holds either a single submission object or an array of them:
//! `{"question": ..., "standard_answer": ..., "grading_criteria": ...,
//! "student_answer": ...}`.

use frontdesk_config::AppConfig;
use frontdesk_gateway::{OpenAiCompatGateway, RetryGateway};
use frontdesk_grader::{GradeSubmission, GradingAssistant};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

#[derive(Deserialize)]
#[serde(untagged)]
enum SubmissionFile {
    One(GradeSubmission),
    Many(Vec<GradeSubmission>),
}

pub async fn run(file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if !config.has_api_key() {
        return Err("No API key found. Set FRONTDESK_API_KEY or OPENAI_API_KEY.".into());
    }

    let content = std::fs::read_to_string(file)
        .map_err(|e| format!("Failed to read {}: {e}", file.display()))?;
    let submissions = match serde_json::from_str::<SubmissionFile>(&content)
        .map_err(|e| format!("Failed to parse {}: {e}", file.display()))?
    {
        SubmissionFile::One(submission) => vec![submission],
        SubmissionFile::Many(submissions) => submissions,
    };

    if submissions.is_empty() {
        println!("Nothing to grade.");
        return Ok(());
    }

    let gateway = OpenAiCompatGateway::from_config(&config)?;
    let gateway = Arc::new(RetryGateway::new(Arc::new(gateway), config.retry.clone()));
    let grader = GradingAssistant::new(gateway, &config.chat_model)
        .with_max_attempts(config.retry.max_attempts);

    let total = submissions.len();
    let results = grader.grade_batch(&submissions).await;

    let mut failed = 0usize;
    for (i, result) in results.iter().enumerate() {
        println!();
        println!("--- Submission {}/{total} ---", i + 1);
        match result {
            Ok(report) => println!("{}", serde_json::to_string_pretty(report)?),
            Err(e) => {
                failed += 1;
                println!("Grading failed: {e}");
            }
        }
    }

    println!();
    println!("Graded {}/{total} submissions.", total - failed);

    if failed == total {
        return Err("every submission failed to grade".into());
    }
    Ok(())
}
