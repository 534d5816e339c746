//! 学习报告与仪表盘
//!
//! ## 统计口径
//! - 学习时长：区间内已完成 WORK 番茄钟秒数之和 / 3600，四舍五入
//! - 覆盖科目：当前未删除的科目数
//! - 测验均分：区间内每次作答百分比的平均值，四舍五入
//! - 科目表现：按测验所属科目分组的平均百分比（无科目的作答不计入）
//! - 进步值：`min(floor(均分 / 5), 100)`
//! - 连续学习：近 7 天内有已完成 WORK 会话的不同日期数（上限 7）

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::database::{format_timestamp, StudyDatabase};
use crate::error::{AppError, AppResult};
use crate::models::{PomodoroKind, PomodoroSession, QuizAttemptSummary, Report, ReportType};
use crate::repos::report_repo::NewReport;
use crate::repos::{NoteRepo, PomodoroRepo, QuizRepo, ReportRepo, SubjectRepo, UserRepo};

const RECOMMENDATIONS: [&str; 3] = [
    "Revise weak subjects regularly",
    "Maintain daily Pomodoro sessions",
    "Attempt quizzes after revision",
];

const INSIGHTS: &str =
    "Your consistency is improving. Keep focusing on daily practice and revision.";

const STREAK_WINDOW_DAYS: i64 = 7;
const RECENT_NOTES: u32 = 6;
const RECENT_ATTEMPTS: u32 = 3;

/// 区间统计快照（仪表盘与 PDF 使用，不落库）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSnapshot {
    pub start_date: String,
    pub end_date: String,
    pub study_hours: i64,
    pub topics_covered: i64,
    pub quizzes_taken: i64,
    pub quiz_average: i64,
    pub improvement: i64,
    pub subject_performance: BTreeMap<String, i64>,
    pub recommendations: Vec<String>,
    pub insights: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_subjects: i64,
    /// 形如 `"3 days"`
    pub study_streak: String,
    pub notes_created: i64,
    pub quizzes_completed: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Note,
    Quiz,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityItem {
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub title: String,
    pub time: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardReports {
    pub weekly: ReportSnapshot,
    pub monthly: ReportSnapshot,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub stats: DashboardStats,
    pub recent_activity: Vec<ActivityItem>,
    pub reports: DashboardReports,
}

/// 报告时间区间：周报 7 天，其余 1 个月
pub fn report_range(kind: ReportType, end: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = match kind {
        ReportType::Weekly => end - Duration::days(7),
        ReportType::Monthly | ReportType::Custom => end
            .checked_sub_months(Months::new(1))
            .unwrap_or(end - Duration::days(30)),
    };
    (start, end)
}

/// 已完成 WORK 会话总时长（小时，四舍五入）
pub fn study_hours(sessions: &[PomodoroSession]) -> i64 {
    let seconds: i64 = sessions
        .iter()
        .filter(|s| s.completed && s.kind == PomodoroKind::Work)
        .map(|s| s.duration)
        .sum();
    (seconds as f64 / 3600.0).round() as i64
}

fn attempt_percentage(attempt: &QuizAttemptSummary) -> f64 {
    if attempt.attempt.total_marks <= 0 {
        return 0.0;
    }
    attempt.attempt.score as f64 / attempt.attempt.total_marks as f64 * 100.0
}

/// 测验均分（四舍五入）
pub fn quiz_average(attempts: &[QuizAttemptSummary]) -> i64 {
    if attempts.is_empty() {
        return 0;
    }
    let total: f64 = attempts.iter().map(attempt_percentage).sum();
    (total / attempts.len() as f64).round() as i64
}

/// 按科目名分组的平均百分比
pub fn subject_performance(
    attempts: &[QuizAttemptSummary],
    subject_names: &HashMap<String, String>,
) -> BTreeMap<String, i64> {
    let mut buckets: BTreeMap<String, (f64, u32)> = BTreeMap::new();
    for attempt in attempts {
        let Some(name) = attempt
            .subject_id
            .as_ref()
            .and_then(|id| subject_names.get(id))
        else {
            continue;
        };
        let entry = buckets.entry(name.clone()).or_insert((0.0, 0));
        entry.0 += attempt_percentage(attempt);
        entry.1 += 1;
    }
    buckets
        .into_iter()
        .map(|(name, (sum, n))| (name, (sum / n as f64).round() as i64))
        .collect()
}

pub fn improvement(quiz_average: i64) -> i64 {
    (quiz_average.max(0) / 5).min(100)
}

/// 近 7 天有学习记录的不同日期数
pub fn study_streak(sessions: &[PomodoroSession]) -> i64 {
    let days: BTreeSet<&str> = sessions
        .iter()
        .filter(|s| s.completed && s.kind == PomodoroKind::Work)
        .filter_map(|s| s.started_at.get(..10))
        .collect();
    (days.len() as i64).min(STREAK_WINDOW_DAYS)
}

/// 合并近期笔记与作答，按时间倒序
pub fn merge_activity(mut items: Vec<ActivityItem>) -> Vec<ActivityItem> {
    items.sort_by(|a, b| b.time.cmp(&a.time));
    items
}

pub struct ReportService {
    db: Arc<StudyDatabase>,
}

impl ReportService {
    pub fn new(db: Arc<StudyDatabase>) -> Self {
        Self { db }
    }

    /// 计算区间快照
    pub fn build_report(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<ReportSnapshot> {
        let start_ts = format_timestamp(&start);
        let end_ts = format_timestamp(&end);

        let sessions = PomodoroRepo::completed_between(&self.db, user_id, &start_ts, &end_ts)?;
        let attempts = QuizRepo::list_attempts_between(&self.db, user_id, &start_ts, &end_ts)?;
        let topics_covered = SubjectRepo::count(&self.db, user_id)?;
        let subject_names = self.subject_names(&attempts)?;

        let average = quiz_average(&attempts);
        let snapshot = ReportSnapshot {
            start_date: start_ts,
            end_date: end_ts,
            study_hours: study_hours(&sessions),
            topics_covered,
            quizzes_taken: attempts.len() as i64,
            quiz_average: average,
            improvement: improvement(average),
            subject_performance: subject_performance(&attempts, &subject_names),
            recommendations: RECOMMENDATIONS.iter().map(|s| s.to_string()).collect(),
            insights: INSIGHTS.to_string(),
        };
        debug!(
            "[ReportService] Built snapshot for {}: {}h, {} attempts, avg {}",
            user_id, snapshot.study_hours, snapshot.quizzes_taken, snapshot.quiz_average
        );
        Ok(snapshot)
    }

    pub fn build_for(&self, user_id: &str, kind: ReportType) -> AppResult<ReportSnapshot> {
        let (start, end) = report_range(kind, Utc::now());
        self.build_report(user_id, start, end)
    }

    /// 生成并保存周报 / 月报
    pub fn generate(&self, user_id: &str, kind: ReportType) -> AppResult<Report> {
        if kind == ReportType::Custom {
            return Err(AppError::validation("Only weekly and monthly reports can be generated"));
        }
        let snapshot = self.build_for(user_id, kind)?;
        let report = ReportRepo::insert(
            &self.db,
            &NewReport {
                user_id: user_id.to_string(),
                report_type: kind,
                start_date: snapshot.start_date,
                end_date: snapshot.end_date,
                total_study_hours: snapshot.study_hours as f64,
                topics_covered: snapshot.topics_covered,
                quizzes_taken: snapshot.quizzes_taken,
                average_score: snapshot.quiz_average as f64,
                subject_performance: snapshot.subject_performance,
                improvement: snapshot.improvement,
                ai_insights: Some(snapshot.insights),
            },
        )?;
        info!(
            "[ReportService] Generated {} report {} for user {}",
            kind.as_str(),
            report.id,
            user_id
        );
        Ok(report)
    }

    pub fn dashboard(&self, user_id: &str) -> AppResult<Dashboard> {
        let now = Utc::now();

        let streak_start = format_timestamp(&(now - Duration::days(STREAK_WINDOW_DAYS)));
        let streak_sessions =
            PomodoroRepo::completed_between(&self.db, user_id, &streak_start, &format_timestamp(&now))?;
        let streak = study_streak(&streak_sessions);
        UserRepo::set_study_streak(&self.db, user_id, streak)?;

        let stats = DashboardStats {
            total_subjects: SubjectRepo::count(&self.db, user_id)?,
            study_streak: format!("{} days", streak),
            notes_created: NoteRepo::count(&self.db, user_id)?,
            quizzes_completed: QuizRepo::count_attempts(&self.db, user_id)?,
        };

        let mut activity: Vec<ActivityItem> = NoteRepo::recent(&self.db, user_id, RECENT_NOTES)?
            .into_iter()
            .map(|note| ActivityItem {
                kind: ActivityKind::Note,
                title: format!("Created note: {}", note.title),
                time: note.created_at,
            })
            .collect();
        activity.extend(
            QuizRepo::recent_attempts(&self.db, user_id, RECENT_ATTEMPTS)?
                .into_iter()
                .map(|a| ActivityItem {
                    kind: ActivityKind::Quiz,
                    title: format!("Completed quiz: {}", a.quiz_title),
                    time: a.attempt.completed_at,
                }),
        );

        let (week_start, week_end) = report_range(ReportType::Weekly, now);
        let (month_start, month_end) = report_range(ReportType::Monthly, now);
        Ok(Dashboard {
            stats,
            recent_activity: merge_activity(activity),
            reports: DashboardReports {
                weekly: self.build_report(user_id, week_start, week_end)?,
                monthly: self.build_report(user_id, month_start, month_end)?,
            },
        })
    }

    pub fn find(&self, user_id: &str, id: &str) -> AppResult<Report> {
        ReportRepo::find(&self.db, user_id, id)
    }

    pub fn delete(&self, user_id: &str, id: &str) -> AppResult<()> {
        ReportRepo::soft_delete(&self.db, user_id, id)
    }

    /// 作答涉及的科目 ID → 名称（已删除的科目仍按原名统计）
    fn subject_names(
        &self,
        attempts: &[QuizAttemptSummary],
    ) -> AppResult<HashMap<String, String>> {
        let mut names = HashMap::new();
        for subject_id in attempts.iter().filter_map(|a| a.subject_id.as_ref()) {
            if names.contains_key(subject_id) {
                continue;
            }
            if let Some(subject) = SubjectRepo::find_any(&self.db, subject_id)? {
                names.insert(subject_id.clone(), subject.name);
            }
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::{insert_user, setup_test_db};
    use crate::models::{CreateQuizParams, CreateSubjectParams, QuizAttempt, QuizQuestion};
    use crate::repos::quiz_repo::NewQuizAttempt;

    fn session(kind: PomodoroKind, duration: i64, started_at: &str) -> PomodoroSession {
        PomodoroSession {
            id: "pomo_1".into(),
            user_id: "user_1".into(),
            kind,
            duration,
            started_at: started_at.into(),
            ended_at: None,
            completed: true,
            is_deleted: false,
            deleted_at: None,
            deleted_by: None,
            created_at: started_at.into(),
            updated_at: started_at.into(),
        }
    }

    fn attempt(score: i64, total: i64, subject: Option<&str>) -> QuizAttemptSummary {
        QuizAttemptSummary {
            attempt: QuizAttempt {
                id: "att".into(),
                quiz_id: "quiz".into(),
                user_id: "user_1".into(),
                answers: vec![],
                score,
                total_marks: total,
                percentage: 0.0,
                passed: false,
                time_taken: None,
                completed_at: "2026-10-18T10:00:00.000Z".into(),
            },
            quiz_title: "Quiz".into(),
            subject_id: subject.map(str::to_string),
        }
    }

    #[test]
    fn test_study_hours_counts_work_only() {
        let sessions = vec![
            session(PomodoroKind::Work, 3600, "2026-10-18T08:00:00.000Z"),
            session(PomodoroKind::Work, 2000, "2026-10-18T09:00:00.000Z"),
            session(PomodoroKind::Break, 7200, "2026-10-18T10:00:00.000Z"),
        ];
        // 5600 秒 ≈ 1.56 小时
        assert_eq!(study_hours(&sessions), 2);
    }

    #[test]
    fn test_quiz_average_and_subject_performance() {
        let mut names = HashMap::new();
        names.insert("sub_math".to_string(), "Math".to_string());
        let attempts = vec![
            attempt(2, 3, Some("sub_math")),
            attempt(3, 3, Some("sub_math")),
            attempt(1, 4, None),
        ];
        // (66.67 + 100 + 25) / 3 = 63.89
        assert_eq!(quiz_average(&attempts), 64);
        let perf = subject_performance(&attempts, &names);
        assert_eq!(perf.len(), 1);
        assert_eq!(perf["Math"], 83);
        assert_eq!(improvement(64), 12);
        assert_eq!(quiz_average(&[]), 0);
    }

    #[test]
    fn test_streak_counts_distinct_days() {
        let sessions = vec![
            session(PomodoroKind::Work, 1500, "2026-10-16T08:00:00.000Z"),
            session(PomodoroKind::Work, 1500, "2026-10-16T18:00:00.000Z"),
            session(PomodoroKind::Work, 1500, "2026-10-17T08:00:00.000Z"),
            session(PomodoroKind::Break, 300, "2026-10-18T08:00:00.000Z"),
        ];
        assert_eq!(study_streak(&sessions), 2);
    }

    #[test]
    fn test_activity_sorted_newest_first() {
        let merged = merge_activity(vec![
            ActivityItem {
                kind: ActivityKind::Note,
                title: "a".into(),
                time: "2026-10-16T08:00:00.000Z".into(),
            },
            ActivityItem {
                kind: ActivityKind::Quiz,
                title: "b".into(),
                time: "2026-10-18T08:00:00.000Z".into(),
            },
        ]);
        assert_eq!(merged[0].kind, ActivityKind::Quiz);
    }

    #[test]
    fn test_monthly_range_is_one_calendar_month() {
        let end = DateTime::parse_from_rfc3339("2026-03-31T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let (start, _) = report_range(ReportType::Monthly, end);
        assert_eq!(format_timestamp(&start), "2026-02-28T12:00:00.000Z");
        let (start, _) = report_range(ReportType::Weekly, end);
        assert_eq!(format_timestamp(&start), "2026-03-24T12:00:00.000Z");
    }

    #[test]
    fn test_generate_weekly_report_from_database() {
        let (_dir, db) = setup_test_db();
        let db = Arc::new(db);
        let user = insert_user(&db, "a@example.com");
        let subject = SubjectRepo::create(
            &db,
            &user,
            &CreateSubjectParams {
                name: "Physics".into(),
                ..Default::default()
            },
        )
        .expect("subject");
        let quiz = QuizRepo::create(
            &db,
            &user,
            &CreateQuizParams {
                title: "Kinematics".into(),
                subject_id: Some(subject.id.clone()),
                questions: vec![QuizQuestion {
                    question: "v = ?".into(),
                    options: vec!["d/t".into(), "t/d".into(), "d*t".into(), "0".into()],
                    correct_answer: 0,
                    explanation: String::new(),
                }],
                ..Default::default()
            },
        )
        .expect("quiz");
        QuizRepo::record_attempt(
            &db,
            &NewQuizAttempt {
                quiz_id: quiz.id.clone(),
                user_id: user.clone(),
                answers: vec![Some(0)],
                score: 1,
                total_marks: 1,
                percentage: 100.0,
                passed: true,
                time_taken: None,
            },
        )
        .expect("attempt");

        let service = ReportService::new(db.clone());
        let report = service.generate(&user, ReportType::Weekly).expect("report");
        assert_eq!(report.report_type, ReportType::Weekly);
        assert_eq!(report.quizzes_taken, 1);
        assert_eq!(report.average_score, 100.0);
        assert_eq!(report.improvement, 20);
        assert_eq!(report.subject_performance["Physics"], 100);
        assert_eq!(report.topics_covered, 1);

        let dashboard = service.dashboard(&user).expect("dashboard");
        assert_eq!(dashboard.stats.quizzes_completed, 1);
        assert_eq!(dashboard.stats.study_streak, "0 days");
        assert_eq!(dashboard.recent_activity[0].title, "Completed quiz: Kinematics");
    }
}
