//! 领域模型
//!
//! 数据库实体、创建/更新参数以及请求中复用的枚举类型。
//! 所有实体序列化为 camelCase，与前端约定一致。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// 每道选择题的选项数量
pub const QUIZ_OPTION_COUNT: usize = 4;

// ============================================================================
// 用户
// ============================================================================

/// 年级
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Grade {
    #[serde(rename = "9")]
    Nine,
    #[default]
    #[serde(rename = "10")]
    Ten,
    #[serde(rename = "11")]
    Eleven,
    #[serde(rename = "12")]
    Twelve,
    #[serde(rename = "UG")]
    Undergraduate,
    #[serde(rename = "PG")]
    Postgraduate,
}

impl Grade {
    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::Nine => "9",
            Grade::Ten => "10",
            Grade::Eleven => "11",
            Grade::Twelve => "12",
            Grade::Undergraduate => "UG",
            Grade::Postgraduate => "PG",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "9" => Some(Grade::Nine),
            "10" => Some(Grade::Ten),
            "11" => Some(Grade::Eleven),
            "12" => Some(Grade::Twelve),
            "UG" => Some(Grade::Undergraduate),
            "PG" => Some(Grade::Postgraduate),
            _ => None,
        }
    }
}

/// 用户（不含凭证字段，可直接返回给客户端）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub bio: String,
    pub grade: Grade,
    pub study_streak: i64,
    pub last_study_date: Option<String>,
    pub is_deleted: bool,
    pub deleted_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// 用户凭证相关字段（仅服务端使用）
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: String,
    pub password_hash: String,
    pub reset_token_hash: Option<String>,
    pub reset_token_expires_at: Option<String>,
    pub restore_otp_hash: Option<String>,
    pub restore_otp_expires_at: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileParams {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub grade: Option<Grade>,
    #[serde(default)]
    pub avatar: Option<String>,
}

// ============================================================================
// 科目
// ============================================================================

pub const DEFAULT_SUBJECT_COLOR: &str = "#3b82f6";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: String,
    pub color: String,
    pub total_study_hours: f64,
    pub is_deleted: bool,
    pub deleted_at: Option<String>,
    pub deleted_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubjectParams {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSubjectParams {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub total_study_hours: Option<f64>,
}

/// 可挂到科目下的资源类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SubjectResourceKind {
    Note,
    Quiz,
    Flashcard,
}

// ============================================================================
// 笔记
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub user_id: String,
    pub subject_id: Option<String>,
    pub title: String,
    pub content: String,
    pub summary: Option<String>,
    pub tags: Vec<String>,
    pub is_pinned: bool,
    pub view_count: i64,
    pub is_deleted: bool,
    pub deleted_at: Option<String>,
    pub deleted_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNoteParams {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, alias = "subject")]
    pub subject_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub is_pinned: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNoteParams {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, alias = "subject")]
    pub subject_id: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub is_pinned: Option<bool>,
}

// ============================================================================
// 闪卡
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flashcard {
    pub id: String,
    pub user_id: String,
    pub subject_id: Option<String>,
    pub note_id: Option<String>,
    pub question: String,
    pub answer: String,
    pub difficulty: Difficulty,
    pub correct_count: i64,
    pub wrong_count: i64,
    pub last_reviewed_at: Option<String>,
    pub next_review_date: Option<String>,
    pub is_deleted: bool,
    pub deleted_at: Option<String>,
    pub deleted_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFlashcardParams {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub answer: String,
    #[serde(default, alias = "subject")]
    pub subject_id: Option<String>,
    #[serde(default, alias = "note")]
    pub note_id: Option<String>,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFlashcardParams {
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default, alias = "subject")]
    pub subject_id: Option<String>,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub next_review_date: Option<String>,
}

// ============================================================================
// 测验
// ============================================================================

/// 测验题目
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: usize,
    #[serde(default)]
    pub explanation: String,
}

impl QuizQuestion {
    /// 题目必须恰好 4 个选项，正确答案下标在 [0, 3] 内
    pub fn validate(&self, position: usize) -> AppResult<()> {
        if self.question.trim().is_empty() {
            return Err(AppError::validation(format!(
                "Question {} has empty text",
                position + 1
            )));
        }
        if self.options.len() != QUIZ_OPTION_COUNT {
            return Err(AppError::validation(format!(
                "Question {} must have exactly {} options, got {}",
                position + 1,
                QUIZ_OPTION_COUNT,
                self.options.len()
            )));
        }
        if self.correct_answer >= QUIZ_OPTION_COUNT {
            return Err(AppError::validation(format!(
                "Question {} has correct answer index {} out of range",
                position + 1,
                self.correct_answer
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub id: String,
    pub user_id: String,
    pub subject_id: Option<String>,
    pub note_id: Option<String>,
    pub title: String,
    pub description: String,
    pub questions: Vec<QuizQuestion>,
    pub duration: Option<i64>,
    pub total_marks: i64,
    pub passing_marks: i64,
    pub is_deleted: bool,
    pub deleted_at: Option<String>,
    pub deleted_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuizParams {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "subject")]
    pub subject_id: Option<String>,
    #[serde(skip)]
    pub note_id: Option<String>,
    #[serde(default)]
    pub questions: Vec<QuizQuestion>,
    #[serde(default)]
    pub duration: Option<i64>,
    /// 缺省为题目数量的一半（向上取整）
    #[serde(default)]
    pub passing_marks: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuizParams {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "subject")]
    pub subject_id: Option<String>,
    #[serde(default)]
    pub questions: Option<Vec<QuizQuestion>>,
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub passing_marks: Option<i64>,
}

/// 测验作答记录（只追加）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttempt {
    pub id: String,
    pub quiz_id: String,
    pub user_id: String,
    pub answers: Vec<Option<usize>>,
    pub score: i64,
    pub total_marks: i64,
    pub percentage: f64,
    pub passed: bool,
    pub time_taken: Option<i64>,
    pub completed_at: String,
}

/// 带测验标题的作答记录（仪表盘 / 结果页）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttemptSummary {
    #[serde(flatten)]
    pub attempt: QuizAttempt,
    pub quiz_title: String,
    pub subject_id: Option<String>,
}

// ============================================================================
// 番茄钟
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum PomodoroKind {
    Work,
    Break,
}

impl PomodoroKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PomodoroKind::Work => "WORK",
            PomodoroKind::Break => "BREAK",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "WORK" => Some(PomodoroKind::Work),
            "BREAK" => Some(PomodoroKind::Break),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PomodoroSession {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: PomodoroKind,
    /// 秒
    pub duration: i64,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub completed: bool,
    pub is_deleted: bool,
    pub deleted_at: Option<String>,
    pub deleted_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartPomodoroParams {
    #[serde(rename = "type")]
    pub kind: PomodoroKind,
    pub duration: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePomodoroParams {
    #[serde(default, rename = "type")]
    pub kind: Option<PomodoroKind>,
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub completed: Option<bool>,
    #[serde(default)]
    pub ended_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PomodoroTodayStats {
    /// 今日已完成 WORK 时长（秒）
    pub focus_time: i64,
    /// 今日已完成会话数（含 BREAK）
    pub sessions: i64,
}

// ============================================================================
// 学习计划
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyPlan {
    pub id: String,
    pub user_id: String,
    pub available_hours: f64,
    pub subjects: Vec<String>,
    pub plan_text: String,
    pub created_at: String,
    pub updated_at: String,
}

// ============================================================================
// 聊天
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatSender {
    User,
    Ai,
}

impl ChatSender {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatSender::User => "user",
            ChatSender::Ai => "ai",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "user" => Some(ChatSender::User),
            "ai" | "assistant" => Some(ChatSender::Ai),
            _ => None,
        }
    }
}

pub const DELETED_MESSAGE_TEXT: &str = "Message is deleted";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub user_id: String,
    pub sender: ChatSender,
    pub text: String,
    pub deleted: bool,
    pub created_at: String,
}

// ============================================================================
// 报告
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    Weekly,
    Monthly,
    Custom,
}

impl ReportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::Weekly => "weekly",
            ReportType::Monthly => "monthly",
            ReportType::Custom => "custom",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "weekly" => Some(ReportType::Weekly),
            "monthly" => Some(ReportType::Monthly),
            "custom" => Some(ReportType::Custom),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    pub user_id: String,
    pub report_type: ReportType,
    pub start_date: String,
    pub end_date: String,
    pub total_study_hours: f64,
    pub topics_covered: i64,
    pub quizzes_taken: i64,
    pub average_score: f64,
    pub subject_performance: BTreeMap<String, i64>,
    pub improvement: i64,
    pub ai_insights: Option<String>,
    pub is_deleted: bool,
    pub deleted_at: Option<String>,
    pub deleted_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}
