//! 生成结果解析
//!
//! 把模型返回的自由文本转换为结构化记录。所有函数都是纯函数，
//! 对每个候选块给出 `ParseOutcome`：接受的记录，或带原因的拒绝。
//! 单个块的拒绝不会让整体解析失败。
//!
//! ## 测验格式
//! ```text
//! 1. Question?
//! A) Option
//! B) Option
//! C) Option
//! D) Option
//! Correct: A
//! Explanation: ...
//! ```
//!
//! ## 闪卡格式
//! `Question: ..` / `Answer: ..` 成对出现，或 `1. ..` 编号行后跟 `Answer: ..`。

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::{QuizQuestion, QUIZ_OPTION_COUNT};

static RE_BLOCK_START: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+\.").unwrap());
static RE_NUMBER_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+\.\s*").unwrap());
static RE_OPTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-D]\)").unwrap());
static RE_OPTION_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-D]\)\s*").unwrap());
static RE_NUMBERED_CARD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+\.\s*(.+)").unwrap());
static RE_QUESTION_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Question:\s*(.+)").unwrap());
static RE_QUESTION_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Question:\s*").unwrap());
static RE_ANSWER_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Answer:\s*(.+)").unwrap());

// ============================================================================
// 通用结果类型
// ============================================================================

/// 块被拒绝的原因
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum RejectReason {
    /// 选项数量不是 4
    WrongOptionCount(usize),
    /// 缺少 `Correct:` 行
    MissingCorrectLine,
    /// `Correct:` 后不是 A-D 中的单个字母
    InvalidCorrectLetter(String),
    /// 题干为空
    EmptyQuestion,
    /// 严格模式下闪卡没有答案
    MissingAnswer,
    /// 笔记条目缺少必填字段
    InvalidNote(String),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::WrongOptionCount(n) => {
                write!(f, "expected {} options, found {}", QUIZ_OPTION_COUNT, n)
            }
            RejectReason::MissingCorrectLine => write!(f, "missing 'Correct:' line"),
            RejectReason::InvalidCorrectLetter(s) => write!(f, "invalid correct letter '{}'", s),
            RejectReason::EmptyQuestion => write!(f, "empty question text"),
            RejectReason::MissingAnswer => write!(f, "missing answer"),
            RejectReason::InvalidNote(e) => write!(f, "invalid note entry: {}", e),
        }
    }
}

/// 单个候选块的解析结果
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome<T> {
    Accepted(T),
    Rejected {
        /// 候选块在输入中的序号（从 0 开始）
        block: usize,
        reason: RejectReason,
    },
}

impl<T> ParseOutcome<T> {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ParseOutcome::Accepted(_))
    }
}

/// 拆分接受与拒绝，保持输入顺序
pub fn partition<T>(outcomes: Vec<ParseOutcome<T>>) -> (Vec<T>, Vec<(usize, RejectReason)>) {
    let mut accepted = Vec::new();
    let mut rejected = Vec::new();
    for outcome in outcomes {
        match outcome {
            ParseOutcome::Accepted(item) => accepted.push(item),
            ParseOutcome::Rejected { block, reason } => rejected.push((block, reason)),
        }
    }
    (accepted, rejected)
}

/// 只保留接受的记录
pub fn accepted<T>(outcomes: Vec<ParseOutcome<T>>) -> Vec<T> {
    partition(outcomes).0
}

// ============================================================================
// 测验
// ============================================================================

/// 解析得到的选择题
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: usize,
    pub explanation: String,
}

impl From<GeneratedQuestion> for QuizQuestion {
    fn from(q: GeneratedQuestion) -> Self {
        QuizQuestion {
            question: q.question,
            options: q.options,
            correct_answer: q.correct_answer,
            explanation: q.explanation,
        }
    }
}

/// 字母到选项下标：`A`→0 … `D`→3，其余为 None
pub fn correct_letter_index(letter: &str) -> Option<usize> {
    match letter {
        "A" => Some(0),
        "B" => Some(1),
        "C" => Some(2),
        "D" => Some(3),
        _ => None,
    }
}

/// 按以 `<整数>.` 开头的行切块；第一个编号行之前的内容丢弃
fn split_numbered_blocks(text: &str) -> Vec<Vec<&str>> {
    let mut blocks: Vec<Vec<&str>> = Vec::new();
    for line in text.lines() {
        if RE_BLOCK_START.is_match(line) {
            blocks.push(vec![line]);
        } else if let Some(current) = blocks.last_mut() {
            current.push(line);
        }
    }
    blocks
}

pub fn parse_quiz(text: &str) -> Vec<ParseOutcome<GeneratedQuestion>> {
    split_numbered_blocks(text)
        .into_iter()
        .enumerate()
        .map(|(index, raw_lines)| parse_quiz_block(index, &raw_lines))
        .collect()
}

fn parse_quiz_block(block: usize, raw_lines: &[&str]) -> ParseOutcome<GeneratedQuestion> {
    let lines: Vec<&str> = raw_lines
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect();

    let reject = |reason| ParseOutcome::Rejected { block, reason };

    let question = lines
        .first()
        .map(|first| RE_NUMBER_PREFIX.replace(first, "").trim().to_string())
        .unwrap_or_default();

    let options: Vec<String> = lines
        .iter()
        .filter(|l| RE_OPTION.is_match(l))
        .map(|l| RE_OPTION_PREFIX.replace(l, "").to_string())
        .collect();

    let correct_text = lines
        .iter()
        .find(|l| l.starts_with("Correct:"))
        .map(|l| l.split(':').nth(1).unwrap_or("").trim().to_string());

    let explanation = lines
        .iter()
        .find(|l| l.starts_with("Explanation:"))
        .map(|l| l.replacen("Explanation:", "", 1).trim().to_string())
        .unwrap_or_default();

    if options.len() != QUIZ_OPTION_COUNT {
        return reject(RejectReason::WrongOptionCount(options.len()));
    }
    let correct_text = match correct_text {
        Some(text) => text,
        None => return reject(RejectReason::MissingCorrectLine),
    };
    let correct_answer = match correct_letter_index(&correct_text) {
        Some(index) => index,
        None => return reject(RejectReason::InvalidCorrectLetter(correct_text)),
    };
    if question.is_empty() {
        return reject(RejectReason::EmptyQuestion);
    }

    ParseOutcome::Accepted(GeneratedQuestion {
        question,
        options,
        correct_answer,
        explanation,
    })
}

// ============================================================================
// 闪卡
// ============================================================================

/// 解析得到的闪卡；宽松模式下答案可能为空
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedFlashcard {
    pub question: String,
    pub answer: String,
}

/// 闪卡解析模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashcardParseMode {
    /// 没有答案的卡片也保留（答案为空字符串）
    #[default]
    Lenient,
    /// 没有答案的卡片被拒绝
    Strict,
}

pub fn parse_flashcards(
    text: &str,
    mode: FlashcardParseMode,
) -> Vec<ParseOutcome<GeneratedFlashcard>> {
    let mut cards: Vec<GeneratedFlashcard> = Vec::new();

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(caps) = RE_NUMBERED_CARD.captures(line) {
            let question = RE_QUESTION_PREFIX.replace(caps[1].trim(), "").trim().to_string();
            cards.push(GeneratedFlashcard {
                question,
                answer: String::new(),
            });
        } else if let Some(caps) = RE_QUESTION_LINE.captures(line) {
            cards.push(GeneratedFlashcard {
                question: caps[1].trim().to_string(),
                answer: String::new(),
            });
        } else if let Some(caps) = RE_ANSWER_LINE.captures(line) {
            if let Some(last) = cards.last_mut() {
                last.answer = caps[1].trim().to_string();
            }
        }
    }

    cards
        .into_iter()
        .enumerate()
        .map(|(block, card)| {
            if card.question.is_empty() {
                ParseOutcome::Rejected {
                    block,
                    reason: RejectReason::EmptyQuestion,
                }
            } else if mode == FlashcardParseMode::Strict && card.answer.is_empty() {
                ParseOutcome::Rejected {
                    block,
                    reason: RejectReason::MissingAnswer,
                }
            } else {
                ParseOutcome::Accepted(card)
            }
        })
        .collect()
}

// ============================================================================
// 笔记（JSON）
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedNote {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// 笔记 JSON 整体不可用
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotesParseError {
    /// 找不到 `{ ... }`
    NoJson,
    /// JSON 语法错误
    InvalidJson(String),
    /// 顶层没有 `notes` 数组
    MissingNotesArray,
}

impl fmt::Display for NotesParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotesParseError::NoJson => write!(f, "No JSON found in generated text"),
            NotesParseError::InvalidJson(e) => write!(f, "Generated JSON is invalid: {}", e),
            NotesParseError::MissingNotesArray => {
                write!(f, "Generated JSON has no 'notes' array")
            }
        }
    }
}

/// 截取第一个 `{` 到最后一个 `}` 之间的内容
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// 去掉 U+0000..U+001F 控制字符
pub fn strip_control_chars(text: &str) -> String {
    text.chars().filter(|c| (*c as u32) > 0x1F).collect()
}

/// 解析笔记 JSON，最多保留 `limit` 条
pub fn parse_generated_notes(
    text: &str,
    limit: usize,
) -> Result<Vec<ParseOutcome<GeneratedNote>>, NotesParseError> {
    let extracted = extract_json_object(text).ok_or(NotesParseError::NoJson)?;
    let sanitized = strip_control_chars(extracted);
    let value: serde_json::Value = serde_json::from_str(&sanitized)
        .map_err(|e| NotesParseError::InvalidJson(e.to_string()))?;
    let notes = value
        .get("notes")
        .and_then(|n| n.as_array())
        .ok_or(NotesParseError::MissingNotesArray)?;

    Ok(notes
        .iter()
        .take(limit)
        .enumerate()
        .map(
            |(block, entry)| match serde_json::from_value::<GeneratedNote>(entry.clone()) {
                Ok(note) if note.title.trim().is_empty() || note.content.trim().is_empty() => {
                    ParseOutcome::Rejected {
                        block,
                        reason: RejectReason::InvalidNote("empty title or content".to_string()),
                    }
                }
                Ok(note) => ParseOutcome::Accepted(note),
                Err(e) => ParseOutcome::Rejected {
                    block,
                    reason: RejectReason::InvalidNote(e.to_string()),
                },
            },
        )
        .collect())
}
