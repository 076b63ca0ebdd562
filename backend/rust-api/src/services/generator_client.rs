//! Content generator and evaluator collaborators.
//!
//! `HttpGenerator` talks to the external generation API. `LocalGenerator` and
//! `LocalEvaluator` serve static content when that API is disabled.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;

use crate::models::activity::{
    ActivityType, Evaluation, EvaluationRequest, GeneratedActivity, Quiz, QuizQuestion,
};

#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate_activity(
        &self,
        subject: &str,
        topic: &str,
        activity_type: ActivityType,
    ) -> Result<GeneratedActivity>;

    async fn generate_quiz(&self, subject: &str, topic: &str, count: u32) -> Result<Quiz>;

    async fn generate_challenge(&self, subject: &str, level: u32) -> Result<serde_json::Value>;
}

#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(&self, request: &EvaluationRequest) -> Result<Evaluation>;
}

pub struct HttpGenerator {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGenerator {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build generator HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to call generator API at {}", url))?;

        if !response.status().is_success() {
            anyhow::bail!("Generator API returned status: {}", response.status());
        }

        response
            .json::<T>()
            .await
            .context("Invalid generator API response format")
    }
}

#[async_trait]
impl ContentGenerator for HttpGenerator {
    async fn generate_activity(
        &self,
        subject: &str,
        topic: &str,
        activity_type: ActivityType,
    ) -> Result<GeneratedActivity> {
        let body = json!({
            "subject": subject,
            "topic": topic,
            "type": activity_type.as_str(),
        });
        self.post("/v1/activities", &body).await
    }

    async fn generate_quiz(&self, subject: &str, topic: &str, count: u32) -> Result<Quiz> {
        let body = json!({ "subject": subject, "topic": topic, "count": count });
        self.post("/v1/quizzes", &body).await
    }

    async fn generate_challenge(&self, subject: &str, level: u32) -> Result<serde_json::Value> {
        let body = json!({ "subject": subject, "level": level });
        self.post("/v1/challenges", &body).await
    }
}

#[async_trait]
impl Evaluator for HttpGenerator {
    async fn evaluate(&self, request: &EvaluationRequest) -> Result<Evaluation> {
        let body = serde_json::to_value(request).context("Failed to serialize evaluation")?;
        let mut evaluation: Evaluation = self.post("/v1/evaluations", &body).await?;
        evaluation.score = evaluation.score.clamp(0.0, 1.0);
        Ok(evaluation)
    }
}

/// Static content library used without a generator API.
#[derive(Debug, Default, Clone)]
pub struct LocalGenerator;

#[async_trait]
impl ContentGenerator for LocalGenerator {
    async fn generate_activity(
        &self,
        subject: &str,
        topic: &str,
        activity_type: ActivityType,
    ) -> Result<GeneratedActivity> {
        let (payload, answer_key) = match activity_type {
            ActivityType::Coding => (
                json!({
                    "title": format!("Coding: {}", topic),
                    "description": "Write solve(a, b) returning the sum of two numbers, then submit the output for the test case.",
                    "starter_code": "def solve(a, b):\n    pass",
                    "test_cases": [{ "input": "1, 2" }],
                }),
                json!({ "answer": "3" }),
            ),
            ActivityType::Lab => (
                json!({
                    "title": format!("Virtual Lab: {}", topic),
                    "scenario": "You are mixing Acid A with Base B.",
                    "steps": ["Mix", "Observe", "Record"],
                    "question": "What happens?",
                    "options": ["Explosion", "Neutralization", "Nothing"],
                }),
                json!({ "answer": "Neutralization" }),
            ),
            ActivityType::Crossword => (
                json!({
                    "title": format!("Crossword: {}", topic),
                    "clues": [
                        { "clue": "Snake-like language", "length": 6 },
                        { "clue": "Coffee-like language", "length": 4 },
                    ],
                }),
                json!({ "words": ["PYTHON", "JAVA"] }),
            ),
        };

        tracing::debug!(
            "Local {} activity generated for {}/{}",
            activity_type.as_str(),
            subject,
            topic
        );

        Ok(GeneratedActivity {
            activity_type,
            payload,
            answer_key,
            points: 100,
        })
    }

    async fn generate_quiz(&self, subject: &str, topic: &str, count: u32) -> Result<Quiz> {
        let questions = quiz_library(subject)
            .into_iter()
            .take(count as usize)
            .collect();

        Ok(Quiz {
            subject: subject.to_string(),
            topic: topic.to_string(),
            questions,
        })
    }

    async fn generate_challenge(&self, subject: &str, level: u32) -> Result<serde_json::Value> {
        let (question, answer, hints) = if subject.contains("Math") || subject.contains("Alg") {
            (
                "What comes next in the sequence: 2, 4, 8, 16, ...?",
                "32",
                ["Multiply the previous number by 2", "Powers of 2"],
            )
        } else if subject.contains("CS") || subject.contains("Comp") {
            (
                "How many bits are in a byte?",
                "8",
                ["Think of a power of two", "It is less than 10"],
            )
        } else {
            (
                "Can you unscramble this word related to writing? 'RGMRAAM'",
                "grammar",
                ["Rules of language", "Starts with G"],
            )
        };

        Ok(json!({
            "type": "problem_solving",
            "level": level,
            "question": question,
            "answer": answer,
            "hints": hints,
            "points": 50 * level.max(1),
        }))
    }
}

fn quiz_library(subject: &str) -> Vec<QuizQuestion> {
    let q = |id: u32, question: &str, options: [&str; 4], answer: &str, explanation: &str| {
        QuizQuestion {
            id,
            question: question.to_string(),
            options: options.iter().map(|o| o.to_string()).collect(),
            correct_answer: answer.to_string(),
            explanation: Some(explanation.to_string()),
        }
    };

    if subject.contains("Math") || subject.contains("Alg") {
        vec![
            q(1, "What is the derivative of x^2?", ["x", "2x", "2", "x^2"], "2x", "Power rule: d/dx(x^n) = nx^(n-1)."),
            q(2, "What is 2 + 2 * 3?", ["12", "8", "6", "10"], "8", "Multiply first, then add."),
            q(3, "Solve for x: 2x - 4 = 0", ["2", "4", "0", "-2"], "2", "2x = 4, so x = 2."),
            q(4, "What is the square root of 144?", ["10", "11", "12", "14"], "12", "12 * 12 = 144."),
        ]
    } else if subject.contains("CS") || subject.contains("Comp") {
        vec![
            q(1, "What does CPU stand for?", ["Central Process Unit", "Central Processing Unit", "Computer Personal Unit", "Central Processor Unit"], "Central Processing Unit", "The CPU executes instructions."),
            q(2, "Which is NOT a programming language?", ["Python", "Java", "HTML", "C++"], "HTML", "HTML is a markup language."),
            q(3, "What is the time complexity of binary search?", ["O(n)", "O(n^2)", "O(log n)", "O(1)"], "O(log n)", "Each step halves the search space."),
            q(4, "What is a 'bug'?", ["A feature", "An error in code", "A virus", "A hardware fault"], "An error in code", "A bug is a flaw in software."),
        ]
    } else {
        vec![
            q(1, "Which of the following is a proper noun?", ["city", "London", "country", "man"], "London", "London names a specific place."),
            q(2, "What is the past tense of 'run'?", ["runned", "ran", "running", "runs"], "ran", "'Run' is irregular."),
            q(3, "Which sentence is grammatically correct?", ["She don't like apples.", "She doesn't like apples.", "She no like apples.", "She not like apples."], "She doesn't like apples.", "Third person singular takes 'doesn't'."),
            q(4, "What is an adjective?", ["Action word", "Naming word", "Describing word", "Connecting word"], "Describing word", "Adjectives modify nouns."),
        ]
    }
}

/// Grades by normalized exact match against the answer key.
#[derive(Debug, Clone)]
pub struct LocalEvaluator {
    pass_score: f64,
}

impl Default for LocalEvaluator {
    fn default() -> Self {
        Self { pass_score: 0.6 }
    }
}

impl LocalEvaluator {
    fn score(answer_key: &serde_json::Value, answer: &serde_json::Value) -> Result<f64> {
        if let Some(expected) = answer_key.get("words").and_then(|w| w.as_array()) {
            let given: Vec<String> = answer
                .get("words")
                .unwrap_or(answer)
                .as_array()
                .map(|words| words.iter().filter_map(text).collect())
                .unwrap_or_default();

            if expected.is_empty() {
                return Ok(0.0);
            }
            let hits = expected
                .iter()
                .filter_map(text)
                .filter(|word| given.contains(word))
                .count();
            return Ok(hits as f64 / expected.len() as f64);
        }

        let expected = answer_key
            .get("answer")
            .and_then(text)
            .ok_or_else(|| anyhow::anyhow!("Answer key has no 'answer' or 'words'"))?;
        let given = answer.get("answer").unwrap_or(answer);

        Ok(if text(given).as_deref() == Some(expected.as_str()) {
            1.0
        } else {
            0.0
        })
    }
}

fn text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(normalize(s)),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn normalize(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[async_trait]
impl Evaluator for LocalEvaluator {
    async fn evaluate(&self, request: &EvaluationRequest) -> Result<Evaluation> {
        let score = Self::score(&request.answer_key, &request.answer)?;
        let is_correct = score >= self.pass_score;
        let xp_earned = if is_correct {
            (request.points as f64 * score).round() as u32
        } else {
            0
        };

        Ok(Evaluation {
            is_correct,
            score,
            xp_earned,
            explanation: Some(if is_correct {
                "Correct!".to_string()
            } else {
                "Not quite. Compare your answer with the material and try again.".to_string()
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(answer_key: serde_json::Value, answer: serde_json::Value) -> EvaluationRequest {
        EvaluationRequest {
            challenge_id: "c1".into(),
            activity_type: ActivityType::Lab,
            subject: "Chemistry".into(),
            topic: "Acids".into(),
            payload: json!({}),
            answer_key,
            answer,
            points: 100,
            violation_count: 0,
        }
    }

    #[tokio::test]
    async fn exact_match_is_normalized() {
        let eval = LocalEvaluator::default()
            .evaluate(&request(json!({"answer": "Neutralization"}), json!("  neutralization ")))
            .await
            .unwrap();
        assert!(eval.is_correct);
        assert_eq!(eval.score, 1.0);
        assert_eq!(eval.xp_earned, 100);
    }

    #[tokio::test]
    async fn wrong_answer_earns_nothing() {
        let eval = LocalEvaluator::default()
            .evaluate(&request(json!({"answer": "3"}), json!({"answer": 4})))
            .await
            .unwrap();
        assert!(!eval.is_correct);
        assert_eq!(eval.xp_earned, 0);
    }

    #[tokio::test]
    async fn crossword_scores_partially() {
        let key = json!({"words": ["PYTHON", "JAVA"]});
        let eval = LocalEvaluator::default()
            .evaluate(&request(key, json!({"words": ["python", "rust"]})))
            .await
            .unwrap();
        assert_eq!(eval.score, 0.5);
        assert!(!eval.is_correct);
    }

    #[tokio::test]
    async fn malformed_key_is_an_error() {
        let res = LocalEvaluator::default()
            .evaluate(&request(json!({"nothing": true}), json!("x")))
            .await;
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn local_generator_covers_every_type() {
        let generator = LocalGenerator;
        for activity_type in [ActivityType::Coding, ActivityType::Lab, ActivityType::Crossword] {
            let activity = generator
                .generate_activity("Subject", "Topic", activity_type)
                .await
                .unwrap();
            assert_eq!(activity.activity_type, activity_type);
            assert!(activity.answer_key.is_object());
        }
    }

    #[tokio::test]
    async fn local_quiz_respects_count() {
        let quiz = LocalGenerator.generate_quiz("Math", "Basics", 2).await.unwrap();
        assert_eq!(quiz.questions.len(), 2);
        assert_eq!(quiz.questions[0].correct_answer, "2x");
    }
}
