//! LLM-backed answer grading.
//!
//! A separate collaborator sharing the [`Gateway`] interface: given a
//! question, a standard answer, grading criteria, and a student answer,
//! the model returns a report as a fenced JSON block with a fixed schema.
//! The fenced block is located (falling back to the whole reply), parsed
//! via serde, and re-asked a bounded number of times on parse failure —
//! a parse failure after the budget is a hard error, never silently
//! ignored.

use frontdesk_core::error::Error;
use frontdesk_core::gateway::{Gateway, GatewayRequest};
use frontdesk_core::message::Message;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};
use tracing::warn;

/// The grading role and the exact report schema the model must emit.
const SYSTEM_PROMPT: &str = r#"你是一个专业的阅卷老师。你需要根据标准答案和评分标准，对学生的答案进行评分和点评。
评分时请注意以下几点：
1. 严格按照评分标准进行评分
2. 注意考察学生是否理解了题目的核心概念
3. 关注答案的完整性和准确性
4. 给出具体的得分点分析
5. 提供建设性的改进建议

你需要以JSON格式输出评阅结果，格式如下：
```json
{
    "score": 分数 (number),
    "analysis": {
        "points_earned": "得分点分析 (string)",
        "points_missed": "失分点分析 (string)",
        "suggestions": "改进建议 (string)"
    }
}
```

注意：
1. JSON 结构必须严格遵守，所有字符串值必须用双引号。
2. 分析和建议内容应简洁明了。
3. 分数应为数字类型。
"#;

static JSON_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```json(.*?)```").expect("static regex"));

/// One answer to grade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeSubmission {
    pub question: String,
    pub standard_answer: String,
    pub grading_criteria: String,
    pub student_answer: String,
}

/// The structured grading result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeReport {
    pub score: f64,
    pub analysis: GradeAnalysis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeAnalysis {
    pub points_earned: String,
    pub points_missed: String,
    pub suggestions: String,
}

/// Grades student answers through the completion gateway.
pub struct GradingAssistant {
    gateway: Arc<dyn Gateway>,
    model: String,
    max_attempts: u32,
}

impl GradingAssistant {
    /// Create a grader. Credentials and endpoint live in the gateway,
    /// never here.
    pub fn new(gateway: Arc<dyn Gateway>, model: impl Into<String>) -> Self {
        Self {
            gateway,
            model: model.into(),
            max_attempts: 3,
        }
    }

    /// Set the re-ask budget for unparseable reports.
    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max.max(1);
        self
    }

    /// Grade a single answer.
    ///
    /// Transport failures propagate immediately (the gateway owns its own
    /// retry policy); an unparseable report is re-asked up to the attempt
    /// budget and then surfaced as [`Error::MalformedReport`].
    pub async fn grade(&self, submission: &GradeSubmission) -> frontdesk_core::Result<GradeReport> {
        let request = GatewayRequest {
            model: self.model.clone(),
            messages: vec![
                Message::system(SYSTEM_PROMPT),
                Message::user(submission_prompt(submission)),
            ],
            temperature: 0.3,
            max_tokens: None,
        };

        let mut last_error = String::new();
        for attempt in 1..=self.max_attempts {
            let response = self.gateway.complete(request.clone()).await?;
            let payload = extract_json_block(&response.message.content);

            match serde_json::from_str::<GradeReport>(&payload) {
                Ok(report) => return Ok(report),
                Err(e) => {
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Grading report did not parse, re-asking"
                    );
                    last_error = format!("{e} in: {payload}");
                }
            }
        }

        Err(Error::MalformedReport(last_error))
    }

    /// Grade a batch of answers, collecting per-item results.
    ///
    /// One bad item does not abort the batch; its error is kept in place.
    pub async fn grade_batch(
        &self,
        submissions: &[GradeSubmission],
    ) -> Vec<frontdesk_core::Result<GradeReport>> {
        let mut results = Vec::with_capacity(submissions.len());
        for (i, submission) in submissions.iter().enumerate() {
            let result = self.grade(submission).await;
            if let Err(e) = &result {
                warn!(index = i, error = %e, "Batch item failed to grade");
            }
            results.push(result);
        }
        results
    }
}

/// Assemble the user prompt for one submission.
fn submission_prompt(submission: &GradeSubmission) -> String {
    format!(
        "\n题目：{}\n\n标准答案：{}\n\n评分标准：{}\n\n学生答案：{}\n\n请对这个答案进行评分和点评，并严格按照指定的JSON格式输出结果。\n",
        submission.question,
        submission.standard_answer,
        submission.grading_criteria,
        submission.student_answer
    )
}

/// Pull the contents of a ```json fenced block, or fall back to the whole
/// reply when the model skipped the fence.
fn extract_json_block(text: &str) -> String {
    match JSON_FENCE.captures(text).and_then(|c| c.get(1)) {
        Some(block) => block.as_str().trim().to_string(),
        None => text.trim().to_string(),
    }
}
