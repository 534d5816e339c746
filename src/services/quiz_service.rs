//! 测验作答服务
//!
//! 评分规则：逐题比较提交的选项下标与存储的正确下标，
//! 未作答（`null`）或越界的题目不得分；提交数组长于题目数时多余部分忽略。

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::database::StudyDatabase;
use crate::error::{AppError, AppResult};
use crate::models::{Quiz, QuizAttempt, QuizAttemptSummary, QuizQuestion};
use crate::repos::quiz_repo::NewQuizAttempt;
use crate::repos::QuizRepo;

/// 提交答案
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitQuizParams {
    pub answers: Option<Vec<Option<usize>>>,
    #[serde(default)]
    pub time_taken: Option<i64>,
}

/// 评分结果
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizScore {
    pub score: i64,
    pub total_marks: i64,
    pub percentage: f64,
    pub passed: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitQuizResult {
    #[serde(flatten)]
    pub result: QuizScore,
    pub attempt: QuizAttempt,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResults {
    pub attempts: Vec<QuizAttemptSummary>,
    pub total_attempts: usize,
}

/// 逐题计分
pub fn score_answers(questions: &[QuizQuestion], answers: &[Option<usize>]) -> i64 {
    questions
        .iter()
        .zip(answers.iter())
        .filter(|(q, a)| **a == Some(q.correct_answer))
        .count() as i64
}

/// 得分百分比；总分为 0 时返回 0
pub fn percentage(score: i64, total_marks: i64) -> f64 {
    if total_marks <= 0 {
        return 0.0;
    }
    score as f64 / total_marks as f64 * 100.0
}

pub fn grade(quiz: &Quiz, answers: &[Option<usize>]) -> QuizScore {
    let score = score_answers(&quiz.questions, answers);
    QuizScore {
        score,
        total_marks: quiz.total_marks,
        percentage: percentage(score, quiz.total_marks),
        passed: score >= quiz.passing_marks,
    }
}

pub struct QuizService {
    db: Arc<StudyDatabase>,
}

impl QuizService {
    pub fn new(db: Arc<StudyDatabase>) -> Self {
        Self { db }
    }

    /// 开始作答：返回完整测验
    pub fn start(&self, user_id: &str, quiz_id: &str) -> AppResult<Quiz> {
        QuizRepo::find(&self.db, user_id, quiz_id)
    }

    pub fn submit(
        &self,
        user_id: &str,
        quiz_id: &str,
        params: &SubmitQuizParams,
    ) -> AppResult<SubmitQuizResult> {
        let answers = params
            .answers
            .as_ref()
            .ok_or_else(|| AppError::validation("Answers are required"))?;
        if params.time_taken.is_some_and(|t| t < 0) {
            return Err(AppError::validation("timeTaken cannot be negative"));
        }

        let quiz = QuizRepo::find(&self.db, user_id, quiz_id)?;
        let result = grade(&quiz, answers);

        let attempt = QuizRepo::record_attempt(
            &self.db,
            &NewQuizAttempt {
                quiz_id: quiz.id.clone(),
                user_id: user_id.to_string(),
                answers: answers.clone(),
                score: result.score,
                total_marks: result.total_marks,
                percentage: result.percentage,
                passed: result.passed,
                time_taken: params.time_taken,
            },
        )?;
        info!(
            "[QuizService] User {} scored {}/{} on quiz {}",
            user_id, result.score, result.total_marks, quiz.id
        );

        Ok(SubmitQuizResult { result, attempt })
    }

    pub fn results(&self, user_id: &str, quiz_id: &str) -> AppResult<QuizResults> {
        QuizRepo::find(&self.db, user_id, quiz_id)?;
        let attempts = QuizRepo::list_attempts_for_quiz(&self.db, user_id, quiz_id)?;
        Ok(QuizResults {
            total_attempts: attempts.len(),
            attempts,
        })
    }
}
