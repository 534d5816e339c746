//! AI 生成服务
//!
//! 组合三步：构造指令（`llm::prompts`）→ 调用文本生成 → 解析并落库。
//!
//! ## 核心方法
//! - `summarize_note`: 生成摘要并写回笔记
//! - `generate_flashcards` / `generate_quiz`: 替换该笔记此前生成的闪卡 / 测验
//! - `generate_study_plan`: 保存（替换）用户的周计划
//! - `generate_notes`: 按主题批量生成笔记
//! - `solve_doubt`: 答疑，并把问答写入聊天记录
//! - `weekly_insights`: 对本周统计给出点评
//!
//! 解析被拒绝的块记 `warn` 日志，数量随结果返回；一条可用记录都没有时
//! 返回 `NoUsableOutput`，不会写库。

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use super::report_service::ReportService;
use crate::database::StudyDatabase;
use crate::error::{AppError, AppResult};
use crate::llm::parser::{self, FlashcardParseMode, ParseOutcome, RejectReason};
use crate::llm::{prompts, ChatRole, ChatTurn, TextGenerator};
use crate::models::{
    ChatMessage, ChatSender, CreateNoteParams, CreateQuizParams, Flashcard, Note, Quiz,
    QuizQuestion, ReportType, StudyPlan,
};
use crate::notifications::{event_types, Notification, NotificationHub};
use crate::repos::quiz_repo::default_passing_marks;
use crate::repos::{ChatRepo, FlashcardRepo, NoteRepo, QuizRepo, StudyPlanRepo, SubjectRepo};

/// 笔记生成数量上限
const MAX_NOTE_LIMIT: u32 = 20;

// ============================================================================
// 请求参数
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateFlashcardsParams {
    #[serde(default)]
    pub count: Option<u32>,
    #[serde(default)]
    pub mode: Option<FlashcardParseMode>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateQuizParams {
    #[serde(default)]
    pub count: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyPlanParams {
    #[serde(default)]
    pub available_hours: Option<f64>,
    #[serde(default)]
    pub subjects: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateNotesParams {
    #[serde(default, alias = "topic")]
    pub prompt: String,
    /// 科目名称（仅用于指令）
    #[serde(default)]
    pub subject: Option<String>,
    /// 生成的笔记挂到该科目下
    #[serde(default)]
    pub subject_id: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
}

/// 客户端携带的聊天上下文
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryMessage {
    pub sender: ChatSender,
    pub text: String,
}

impl From<&HistoryMessage> for ChatTurn {
    fn from(msg: &HistoryMessage) -> Self {
        match msg.sender {
            ChatSender::User => ChatTurn::user(msg.text.clone()),
            ChatSender::Ai => ChatTurn::assistant(msg.text.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatParams {
    #[serde(default)]
    pub message: String,
    /// 缺省时使用已保存的聊天记录
    #[serde(default)]
    pub history: Option<Vec<HistoryMessage>>,
}

// ============================================================================
// 结果
// ============================================================================

/// 被拒绝的候选块
#[derive(Debug, Clone, Serialize)]
pub struct RejectedBlock {
    pub block: usize,
    pub reason: RejectReason,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedFlashcards {
    pub flashcards: Vec<Flashcard>,
    pub replaced: usize,
    pub rejected: Vec<RejectedBlock>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedQuiz {
    pub quiz: Quiz,
    pub replaced: usize,
    pub rejected: Vec<RejectedBlock>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedNotes {
    pub notes: Vec<Note>,
    pub rejected: Vec<RejectedBlock>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub response: String,
    pub user_message: ChatMessage,
    pub ai_message: ChatMessage,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyInsights {
    pub report: String,
    pub stats: serde_json::Value,
}

/// 拆分解析结果并记录被拒绝的块
fn split_outcomes<T>(kind: &str, outcomes: Vec<ParseOutcome<T>>) -> (Vec<T>, Vec<RejectedBlock>) {
    let (accepted, rejected) = parser::partition(outcomes);
    for (block, reason) in &rejected {
        warn!("[AiService] Rejected {} block #{}: {}", kind, block, reason);
    }
    let rejected = rejected
        .into_iter()
        .map(|(block, reason)| RejectedBlock { block, reason })
        .collect();
    (accepted, rejected)
}

pub struct AiService {
    db: Arc<StudyDatabase>,
    generator: Arc<dyn TextGenerator>,
    notifications: Arc<NotificationHub>,
}

impl AiService {
    pub fn new(
        db: Arc<StudyDatabase>,
        generator: Arc<dyn TextGenerator>,
        notifications: Arc<NotificationHub>,
    ) -> Self {
        Self {
            db,
            generator,
            notifications,
        }
    }

    pub async fn summarize_note(&self, user_id: &str, note_id: &str) -> AppResult<Note> {
        let note = NoteRepo::find(&self.db, user_id, note_id)?;
        let summary = self.generator.generate(&prompts::summary(&note.content)).await?;
        let summary = summary.trim();
        if summary.is_empty() {
            return Err(AppError::no_usable_output("Generated summary is empty"));
        }
        info!("[AiService] Summarized note {}", note.id);
        NoteRepo::set_summary(&self.db, user_id, &note.id, summary)
    }

    pub async fn generate_flashcards(
        &self,
        user_id: &str,
        note_id: &str,
        params: &GenerateFlashcardsParams,
    ) -> AppResult<GeneratedFlashcards> {
        let note = NoteRepo::find(&self.db, user_id, note_id)?;
        let count = params.count.unwrap_or(prompts::DEFAULT_FLASHCARD_COUNT).max(1);
        let mode = params.mode.unwrap_or_default();

        let text = self
            .generator
            .generate(&prompts::flashcards(&note.content, count))
            .await?;
        let (cards, rejected) = split_outcomes("flashcard", parser::parse_flashcards(&text, mode));
        if cards.is_empty() {
            return Err(AppError::no_usable_output("No flashcards found in AI response"));
        }

        let mut conn = self.db.get_conn_safe()?;
        let tx = conn.transaction()?;
        let replaced = FlashcardRepo::soft_delete_generated_for_note_with_conn(&tx, user_id, &note.id)?;
        let flashcards = FlashcardRepo::insert_generated_with_conn(
            &tx,
            user_id,
            note.subject_id.as_deref(),
            &note.id,
            &cards,
        )?;
        tx.commit()?;

        info!(
            "[AiService] Generated {} flashcards for note {} ({} rejected, {} replaced)",
            flashcards.len(),
            note.id,
            rejected.len(),
            replaced
        );
        self.notifications.send_to_user(
            user_id,
            &Notification::new(
                event_types::FLASHCARDS_GENERATED,
                "Flashcards ready",
                format!("{} flashcards generated from \"{}\"", flashcards.len(), note.title),
            )
            .with_data(json!({ "noteId": note.id, "count": flashcards.len() })),
        );

        Ok(GeneratedFlashcards {
            flashcards,
            replaced,
            rejected,
        })
    }

    pub async fn generate_quiz(
        &self,
        user_id: &str,
        note_id: &str,
        params: &GenerateQuizParams,
    ) -> AppResult<GeneratedQuiz> {
        let note = NoteRepo::find(&self.db, user_id, note_id)?;
        let count = params.count.unwrap_or(prompts::DEFAULT_QUIZ_COUNT).max(1);

        let text = self
            .generator
            .generate(&prompts::quiz(&note.content, count))
            .await?;
        let (questions, rejected) = split_outcomes("quiz", parser::parse_quiz(&text));
        if questions.is_empty() {
            return Err(AppError::no_usable_output("Failed to generate quiz questions"));
        }
        let questions: Vec<QuizQuestion> = questions.into_iter().map(QuizQuestion::from).collect();

        let title = format!("Quiz: {}", note.title);
        let n = questions.len();
        let mut conn = self.db.get_conn_safe()?;
        let tx = conn.transaction()?;
        let replaced =
            QuizRepo::soft_delete_generated_for_note_with_conn(&tx, user_id, &note.id, &title)?;
        let quiz = QuizRepo::create_with_conn(
            &tx,
            user_id,
            &CreateQuizParams {
                title: title.clone(),
                description: Some(format!("Auto-generated quiz from note \"{}\"", note.title)),
                subject_id: note.subject_id.clone(),
                note_id: Some(note.id.clone()),
                questions,
                duration: Some(n as i64),
                passing_marks: Some(default_passing_marks(n)),
            },
        )?;
        tx.commit()?;

        info!(
            "[AiService] Generated quiz {} with {} questions ({} rejected, {} replaced)",
            quiz.id,
            n,
            rejected.len(),
            replaced
        );
        self.notifications.send_to_user(
            user_id,
            &Notification::new(
                event_types::QUIZ_GENERATED,
                "Quiz ready",
                format!("{} questions generated from \"{}\"", n, note.title),
            )
            .with_data(json!({ "quizId": quiz.id, "noteId": note.id })),
        );

        Ok(GeneratedQuiz {
            quiz,
            replaced,
            rejected,
        })
    }

    pub async fn generate_study_plan(
        &self,
        user_id: &str,
        params: &StudyPlanParams,
    ) -> AppResult<StudyPlan> {
        let (hours, subjects) = match (params.available_hours, params.subjects.as_ref()) {
            (Some(h), Some(s)) if h > 0.0 && !s.is_empty() => (h, s),
            _ => {
                return Err(AppError::validation(
                    "Available hours and subjects are required",
                ))
            }
        };
        let subjects: Vec<String> = subjects
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if subjects.is_empty() {
            return Err(AppError::validation("Available hours and subjects are required"));
        }

        let plan_text = self
            .generator
            .generate(&prompts::study_plan(hours, &subjects))
            .await?;
        let plan = StudyPlanRepo::upsert(&self.db, user_id, hours, &subjects, plan_text.trim())?;

        self.notifications.send_to_user(
            user_id,
            &Notification::new(
                event_types::STUDY_PLAN_READY,
                "Study plan ready",
                format!("Weekly plan for {} subjects", subjects.len()),
            ),
        );
        Ok(plan)
    }

    pub async fn generate_notes(
        &self,
        user_id: &str,
        params: &GenerateNotesParams,
    ) -> AppResult<GeneratedNotes> {
        let topic = params.prompt.trim();
        if topic.is_empty() {
            return Err(AppError::validation("Prompt is required"));
        }
        let subject_id = params.subject_id.as_deref().filter(|s| !s.trim().is_empty());
        let subject_name = match subject_id {
            Some(id) => SubjectRepo::find(&self.db, user_id, id)?.name,
            None => params.subject.clone().unwrap_or_default(),
        };
        let difficulty = params
            .difficulty
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(prompts::DEFAULT_NOTE_DIFFICULTY);
        let limit = params
            .limit
            .unwrap_or(prompts::DEFAULT_NOTE_LIMIT)
            .clamp(1, MAX_NOTE_LIMIT);

        let text = self
            .generator
            .generate(&prompts::generate_notes(topic, &subject_name, difficulty, limit))
            .await?;
        let outcomes = parser::parse_generated_notes(&text, limit as usize).map_err(|e| {
            warn!("[AiService] Unusable notes JSON: {}", e);
            AppError::no_usable_output(format!("Failed to parse AI notes: {}", e))
        })?;
        let (generated, rejected) = split_outcomes("note", outcomes);
        if generated.is_empty() {
            return Err(AppError::no_usable_output("Failed to parse AI notes"));
        }

        let mut conn = self.db.get_conn_safe()?;
        let tx = conn.transaction()?;
        let mut notes = Vec::with_capacity(generated.len());
        for item in generated {
            let summary = Some(item.summary).filter(|s| !s.trim().is_empty());
            notes.push(NoteRepo::create_with_conn(
                &tx,
                user_id,
                &CreateNoteParams {
                    title: item.title,
                    content: item.content,
                    subject_id: subject_id.map(str::to_string),
                    tags: item.tags,
                    summary,
                    is_pinned: false,
                },
            )?);
        }
        tx.commit()?;

        info!(
            "[AiService] Generated {} notes on '{}' ({} rejected)",
            notes.len(),
            topic,
            rejected.len()
        );
        self.notifications.send_to_user(
            user_id,
            &Notification::new(
                event_types::NOTES_GENERATED,
                "Notes ready",
                format!("{} notes generated on \"{}\"", notes.len(), topic),
            ),
        );
        Ok(GeneratedNotes { notes, rejected })
    }

    /// 答疑；问答双方都写入聊天记录
    pub async fn solve_doubt(&self, user_id: &str, params: &ChatParams) -> AppResult<ChatReply> {
        if params.message.trim().is_empty() {
            return Err(AppError::validation("Message is required"));
        }
        let history: Vec<ChatTurn> = match &params.history {
            Some(messages) => messages.iter().map(ChatTurn::from).collect(),
            None => ChatRepo::history(&self.db, user_id)?
                .iter()
                .filter(|m| !m.deleted)
                .map(|m| ChatTurn {
                    role: match m.sender {
                        ChatSender::User => ChatRole::User,
                        ChatSender::Ai => ChatRole::Assistant,
                    },
                    content: m.text.clone(),
                })
                .collect(),
        };

        let response = self
            .generator
            .generate(&prompts::solve_doubt(&params.message, &history))
            .await?;

        let user_message = ChatRepo::append(&self.db, user_id, ChatSender::User, params.message.trim())?;
        let ai_message = ChatRepo::append(&self.db, user_id, ChatSender::Ai, &response)?;
        Ok(ChatReply {
            response,
            user_message,
            ai_message,
        })
    }

    /// 基于本周真实统计生成点评
    pub async fn weekly_insights(&self, user_id: &str) -> AppResult<WeeklyInsights> {
        let snapshot = ReportService::new(self.db.clone()).build_for(user_id, ReportType::Weekly)?;
        let stats = json!({
            "studyHours": snapshot.study_hours,
            "topicsCovered": snapshot.topics_covered,
            "quizzesTaken": snapshot.quizzes_taken,
            "quizAverage": snapshot.quiz_average,
            "subjectPerformance": snapshot.subject_performance,
        });
        let report = self
            .generator
            .generate(&prompts::weekly_insights(&stats))
            .await?;

        self.notifications.send_to_user(
            user_id,
            &Notification::new(
                event_types::REPORT_READY,
                "Weekly report ready",
                "Your weekly insights are available",
            ),
        );
        Ok(WeeklyInsights { report, stats })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::{insert_user, setup_test_db};
    use crate::llm::InstructionPayload;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    /// 按顺序返回预设文本，并记录收到的指令
    struct ScriptedGenerator {
        replies: Mutex<Vec<AppResult<String>>>,
        seen: Mutex<Vec<InstructionPayload>>,
    }

    impl ScriptedGenerator {
        fn new(replies: Vec<AppResult<String>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into_iter().rev().collect()),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, payload: &InstructionPayload) -> AppResult<String> {
            self.seen.lock().unwrap().push(payload.clone());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(AppError::upstream("no scripted reply")))
        }
    }

    const QUIZ_TEXT: &str = "Here you go:\n\
        1. What is H2O?\nA) Water\nB) Salt\nC) Sugar\nD) Air\nCorrect: A\nExplanation: Two hydrogens.\n\
        2. Broken?\nA) x\nB) y\nC) z\nCorrect: B\n\
        3. Largest planet?\nA) Mars\nB) Venus\nC) Jupiter\nD) Earth\nCorrect: C\nExplanation: Gas giant.\n";

    struct Fixture {
        _dir: tempfile::TempDir,
        db: Arc<StudyDatabase>,
        hub: Arc<NotificationHub>,
        user: String,
        note: Note,
    }

    fn fixture() -> Fixture {
        let (dir, db) = setup_test_db();
        let db = Arc::new(db);
        let user = insert_user(&db, "a@example.com");
        let note = NoteRepo::create(
            &db,
            &user,
            &CreateNoteParams {
                title: "Chemistry basics".into(),
                content: "Water is H2O.".into(),
                ..Default::default()
            },
        )
        .expect("note");
        Fixture {
            _dir: dir,
            db,
            hub: Arc::new(NotificationHub::new()),
            user,
            note,
        }
    }

    fn service(f: &Fixture, generator: Arc<ScriptedGenerator>) -> AiService {
        AiService::new(f.db.clone(), generator, f.hub.clone())
    }

    #[tokio::test]
    async fn test_generate_quiz_keeps_valid_blocks_and_replaces_previous() {
        let f = fixture();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = f.hub.connect(tx);
        f.hub.register_user(&f.user, &conn);

        let generator = ScriptedGenerator::new(vec![Ok(QUIZ_TEXT.into()), Ok(QUIZ_TEXT.into())]);
        let ai = service(&f, generator.clone());

        let first = ai
            .generate_quiz(&f.user, &f.note.id, &GenerateQuizParams::default())
            .await
            .expect("quiz");
        assert_eq!(first.quiz.title, "Quiz: Chemistry basics");
        assert_eq!(first.quiz.questions.len(), 2);
        assert_eq!(first.quiz.questions[1].correct_answer, 2);
        assert_eq!(first.quiz.duration, Some(2));
        assert_eq!(first.quiz.passing_marks, 1);
        assert_eq!(first.rejected.len(), 1);
        assert_eq!(first.rejected[0].reason, RejectReason::WrongOptionCount(3));
        assert!(rx.try_recv().is_ok());

        let second = ai
            .generate_quiz(&f.user, &f.note.id, &GenerateQuizParams::default())
            .await
            .expect("quiz again");
        assert_eq!(second.replaced, 1);
        let live = QuizRepo::list(&f.db, &f.user, None).expect("list");
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].id, second.quiz.id);

        let seen = generator.seen.lock().unwrap();
        assert!(seen[0].user_instruction().contains("Generate around 5 multiple choice questions."));
        assert!(seen[0].user_instruction().ends_with("Water is H2O.\n"));
    }

    #[tokio::test]
    async fn test_generate_quiz_with_nothing_usable() {
        let f = fixture();
        let ai = service(&f, ScriptedGenerator::new(vec![Ok("Sorry, I cannot help.".into())]));
        let result = ai
            .generate_quiz(&f.user, &f.note.id, &GenerateQuizParams::default())
            .await;
        assert_matches!(result, Err(AppError::NoUsableOutput(_)));
        assert!(QuizRepo::list(&f.db, &f.user, None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_generate_flashcards_lenient_and_strict() {
        let f = fixture();
        let text = "1. What is X?\nAnswer: Y\n2. What is Z?";
        let ai = service(
            &f,
            ScriptedGenerator::new(vec![Ok(text.into()), Ok(text.into())]),
        );

        let lenient = ai
            .generate_flashcards(&f.user, &f.note.id, &GenerateFlashcardsParams::default())
            .await
            .expect("lenient");
        assert_eq!(lenient.flashcards.len(), 2);
        assert_eq!(lenient.flashcards[1].answer, "");
        assert_eq!(lenient.flashcards[0].note_id.as_deref(), Some(f.note.id.as_str()));

        let strict = ai
            .generate_flashcards(
                &f.user,
                &f.note.id,
                &GenerateFlashcardsParams {
                    count: Some(3),
                    mode: Some(FlashcardParseMode::Strict),
                },
            )
            .await
            .expect("strict");
        assert_eq!(strict.flashcards.len(), 1);
        assert_eq!(strict.replaced, 2);
        assert_eq!(strict.rejected[0].reason, RejectReason::MissingAnswer);
        assert_eq!(FlashcardRepo::list(&f.db, &f.user, None).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upstream_error_propagates() {
        let f = fixture();
        let ai = service(
            &f,
            ScriptedGenerator::new(vec![Err(AppError::upstream("Rate limit reached"))]),
        );
        let err = ai.summarize_note(&f.user, &f.note.id).await.unwrap_err();
        assert_matches!(err, AppError::Upstream(ref m) if m == "Rate limit reached");
    }

    #[tokio::test]
    async fn test_summarize_note_stores_summary() {
        let f = fixture();
        let ai = service(&f, ScriptedGenerator::new(vec![Ok("- water\n".into())]));
        let note = ai.summarize_note(&f.user, &f.note.id).await.expect("summary");
        assert_eq!(note.summary.as_deref(), Some("- water"));
    }

    #[tokio::test]
    async fn test_generate_notes_creates_records() {
        let f = fixture();
        let reply = "```json\n{\"notes\":[{\"title\":\"Cells\",\"content\":\"Basic unit\",\"tags\":[\"bio\"]},{\"title\":\"\",\"content\":\"x\"}]}\n```";
        let ai = service(&f, ScriptedGenerator::new(vec![Ok(reply.into())]));
        let result = ai
            .generate_notes(
                &f.user,
                &GenerateNotesParams {
                    prompt: "Cells".into(),
                    subject: Some("Biology".into()),
                    ..Default::default()
                },
            )
            .await
            .expect("notes");
        assert_eq!(result.notes.len(), 1);
        assert_eq!(result.notes[0].tags, vec!["bio".to_string()]);
        assert_eq!(result.rejected.len(), 1);
    }

    #[tokio::test]
    async fn test_solve_doubt_persists_both_messages() {
        let f = fixture();
        let generator = ScriptedGenerator::new(vec![
            Ok("A mole is 6.022e23 particles of a substance.".into()),
            Ok("Avogadro's number.".into()),
        ]);
        let ai = service(&f, generator.clone());

        ai.solve_doubt(
            &f.user,
            &ChatParams {
                message: "What is a mole?".into(),
                history: None,
            },
        )
        .await
        .expect("first");
        let reply = ai
            .solve_doubt(
                &f.user,
                &ChatParams {
                    message: "Which number?".into(),
                    history: None,
                },
            )
            .await
            .expect("second");
        assert_eq!(reply.response, "Avogadro's number.");
        assert_eq!(ChatRepo::history(&f.db, &f.user).unwrap().len(), 4);

        // 第二次请求携带上一条助手回复作为上下文
        let seen = generator.seen.lock().unwrap();
        assert_eq!(seen[1].turns.len(), 2);
        assert_eq!(seen[1].turns[0].role, ChatRole::Assistant);
    }

    #[tokio::test]
    async fn test_study_plan_requires_inputs() {
        let f = fixture();
        let ai = service(&f, ScriptedGenerator::new(vec![Ok("Monday:\n- Math: 2 hours".into())]));
        assert_matches!(
            ai.generate_study_plan(&f.user, &StudyPlanParams::default()).await,
            Err(AppError::Validation(_))
        );
        let plan = ai
            .generate_study_plan(
                &f.user,
                &StudyPlanParams {
                    available_hours: Some(10.0),
                    subjects: Some(vec!["Math".into()]),
                },
            )
            .await
            .expect("plan");
        assert!(plan.plan_text.starts_with("Monday:"));
    }
}
