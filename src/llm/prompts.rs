//! 生成指令模板
//!
//! 每种生成任务对应一个纯函数，输出 `InstructionPayload`（system + 消息序列）。
//! 调用方传入的内容与参数原样嵌入，不做截断。

use serde::Serialize;

use super::{ChatRole, ChatTurn};

/// 通用学习助手人设
pub const SYSTEM_PROMPT: &str = "\
You are an AI study assistant.
Rules:
- Be concise and direct
- Do NOT add extra explanations
- Do NOT add introductions or conclusions
- Use bullet points where possible
- Keep the response short and clear
";

/// 答疑人设
pub const SYSTEM_CHAT_PROMPT: &str = "\
You are an AI study assistant.

Behavior:
- Always be polite, calm, and respectful
- If the user's question is unclear or incomplete, respond gently and helpfully
- Never sound strict, robotic, or dismissive
- If you don't understand the question, say so humbly and ask for clarification
- Assume positive intent from the user at all times

Answering rules:
- Answer even if the question is simple or broad
- If a term is asked, give a clear definition
- Use bullet points when helpful
- Keep answers short, clear, and professional
- Do NOT refuse simple questions
- Do NOT blame the user for unclear input
";

/// 笔记生成人设（严格 JSON 输出）
pub const SYSTEM_NOTE_PROMPT: &str = r#"You are an AI study assistant.

STRICT RULES:
- Output ONLY valid JSON
- Do NOT use bullet symbols (•, -, *)
- Use "\n" for line breaks inside strings
- Do NOT add explanations or text outside JSON

JSON format:
{
  "notes": [
    {
      "title": "string",
      "content": "string",
      "summary": "string",
      "tags": ["string"]
    }
  ]
}
"#;

pub const DEFAULT_FLASHCARD_COUNT: u32 = 10;
pub const DEFAULT_QUIZ_COUNT: u32 = 5;
pub const DEFAULT_NOTE_LIMIT: u32 = 5;
pub const DEFAULT_NOTE_DIFFICULTY: &str = "beginner";

/// 助手历史消息至少要多长才作为答疑上下文
const MEANINGFUL_REPLY_MIN_CHARS: usize = 20;
const EMPTY_QUESTION_FALLBACK: &str = "Explain the above";

/// 发给文本生成服务的完整指令
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstructionPayload {
    pub system: String,
    pub turns: Vec<ChatTurn>,
}

impl InstructionPayload {
    fn single(system: &str, user: String) -> Self {
        Self {
            system: system.to_string(),
            turns: vec![ChatTurn::user(user)],
        }
    }

    /// 最后一条用户指令
    pub fn user_instruction(&self) -> &str {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == ChatRole::User)
            .map(|t| t.content.as_str())
            .unwrap_or("")
    }
}

pub fn summary(content: &str) -> InstructionPayload {
    InstructionPayload::single(
        SYSTEM_PROMPT,
        format!("Summarize the content in 5 bullet points max:\n\n{}", content),
    )
}

pub fn flashcards(content: &str, count: u32) -> InstructionPayload {
    InstructionPayload::single(
        SYSTEM_PROMPT,
        format!(
            "Generate around {count} flashcards.\n\
             Rules:\n\
             - Only question and answer\n\
             - Max 2 sentences per answer\n\
             - Format:\n\
             Question: ...\n\
             Answer: ...\n\
             \n\
             Content:\n\
             {content}\n"
        ),
    )
}

pub fn quiz(content: &str, count: u32) -> InstructionPayload {
    InstructionPayload::single(
        SYSTEM_PROMPT,
        format!(
            "Generate around {count} multiple choice questions.\n\
             \n\
             Rules:\n\
             - 4 options per question (A, B, C, D)\n\
             - Only ONE correct answer\n\
             - Short explanation (1 sentence)\n\
             - Follow EXACT format:\n\
             \n\
             1. Question?\n\
             A) Option\n\
             B) Option\n\
             C) Option\n\
             D) Option\n\
             Correct: A\n\
             Explanation: ...\n\
             \n\
             Content:\n\
             {content}\n"
        ),
    )
}

/// 周学习计划；`available_hours` 为整周总时长
pub fn study_plan(available_hours: f64, subjects: &[String]) -> InstructionPayload {
    let hours = available_hours.to_string();
    let subjects = subjects.join(", ");
    InstructionPayload::single(
        SYSTEM_PROMPT,
        format!(
            "Create a WEEKLY study plan.\n\
             \n\
             IMPORTANT:\n\
             - Total study + break time for the ENTIRE WEEK must be exactly {hours} hours\n\
             - Do NOT allocate {hours} hours per day\n\
             - Breaks are conditional (follow system rules strictly)\n\
             \n\
             Subjects:\n\
             {subjects}\n\
             \n\
             FORMAT (follow strictly):\n\
             \n\
             Monday:\n\
             - Subject A: x hours\n\
             - Break: 15 mins in every session >1 hour\n\
             - Subject B: z hours\n\
             \n\
             Tuesday:\n\
             - ...\n\
             \n\
             At the END:\n\
             Total weekly hours: {hours}\n"
        ),
    )
}

pub fn generate_notes(topic: &str, subject: &str, difficulty: &str, limit: u32) -> InstructionPayload {
    InstructionPayload::single(
        SYSTEM_NOTE_PROMPT,
        format!(
            "Subject: {subject}\n\
             Topic: {topic}\n\
             Difficulty: {difficulty}\n\
             Maximum notes: {limit}\n"
        ),
    )
}

/// 答疑：携带最近一条有效的助手回复作为上下文
pub fn solve_doubt(question: &str, history: &[ChatTurn]) -> InstructionPayload {
    let last_reply = history.iter().rev().find(|turn| {
        turn.role == ChatRole::Assistant
            && turn.content.trim().chars().count() > MEANINGFUL_REPLY_MIN_CHARS
    });

    let mut turns = Vec::with_capacity(2);
    if let Some(reply) = last_reply {
        turns.push(ChatTurn::assistant(reply.content.trim()));
    }
    let question = question.trim();
    turns.push(ChatTurn::user(if question.is_empty() {
        EMPTY_QUESTION_FALLBACK
    } else {
        question
    }));

    InstructionPayload {
        system: SYSTEM_CHAT_PROMPT.to_string(),
        turns,
    }
}

/// 周报点评；`stats` 以 JSON 原样附上
pub fn weekly_insights(stats: &serde_json::Value) -> InstructionPayload {
    InstructionPayload::single(
        SYSTEM_PROMPT,
        format!(
            "Generate a weekly report.\n\
             Rules:\n\
             - Max 6 bullet points\n\
             - Short and actionable\n\
             \n\
             Stats: {}",
            stats
        ),
    )
}
