//! 学习计划（每个用户一条）

use rusqlite::{params, OptionalExtension};
use tracing::info;

use super::parse_json_column;
use crate::database::{new_id, now_timestamp, StudyDatabase};
use crate::error::{AppError, AppResult};
use crate::models::StudyPlan;

pub struct StudyPlanRepo;

impl StudyPlanRepo {
    /// 写入或替换用户的学习计划
    pub fn upsert(
        db: &StudyDatabase,
        user_id: &str,
        available_hours: f64,
        subjects: &[String],
        plan_text: &str,
    ) -> AppResult<StudyPlan> {
        let conn = db.get_conn_safe()?;
        let now = now_timestamp();
        conn.execute(
            "INSERT INTO study_plans (id, user_id, available_hours, subjects, plan_text,
                                      created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
             ON CONFLICT(user_id) DO UPDATE SET
                 available_hours = excluded.available_hours,
                 subjects = excluded.subjects,
                 plan_text = excluded.plan_text,
                 updated_at = excluded.updated_at",
            params![
                new_id("plan"),
                user_id,
                available_hours,
                serde_json::to_string(subjects)?,
                plan_text,
                now
            ],
        )?;
        info!("[StudyPlanRepo] Saved study plan for user {}", user_id);
        drop(conn);

        Self::find(db, user_id)?.ok_or_else(|| AppError::internal("Study plan missing after upsert"))
    }

    pub fn find(db: &StudyDatabase, user_id: &str) -> AppResult<Option<StudyPlan>> {
        let conn = db.get_conn_safe()?;
        let plan = conn
            .query_row(
                "SELECT id, user_id, available_hours, subjects, plan_text, created_at, updated_at
                 FROM study_plans WHERE user_id = ?1",
                params![user_id],
                |row| {
                    let id: String = row.get(0)?;
                    let subjects_json: String = row.get(3)?;
                    let subjects: Vec<String> =
                        parse_json_column(&subjects_json, "study_plans", &id);
                    Ok(StudyPlan {
                        id,
                        user_id: row.get(1)?,
                        available_hours: row.get(2)?,
                        subjects,
                        plan_text: row.get(4)?,
                        created_at: row.get(5)?,
                        updated_at: row.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(plan)
    }

    /// 删除学习计划，返回是否存在
    pub fn delete(db: &StudyDatabase, user_id: &str) -> AppResult<bool> {
        let conn = db.get_conn_safe()?;
        let removed = conn.execute(
            "DELETE FROM study_plans WHERE user_id = ?1",
            params![user_id],
        )?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::{insert_user, setup_test_db};

    #[test]
    fn test_upsert_replaces_existing_plan() {
        let (_dir, db) = setup_test_db();
        let user = insert_user(&db, "a@example.com");

        let first = StudyPlanRepo::upsert(&db, &user, 10.0, &["Math".to_string()], "Monday: Math")
            .expect("first");
        let second = StudyPlanRepo::upsert(
            &db,
            &user,
            12.0,
            &["Math".to_string(), "Physics".to_string()],
            "Monday: Physics",
        )
        .expect("second");

        assert_eq!(first.id, second.id);
        assert_eq!(second.available_hours, 12.0);
        assert_eq!(second.subjects.len(), 2);
        assert_eq!(second.plan_text, "Monday: Physics");

        assert!(StudyPlanRepo::delete(&db, &user).expect("delete"));
        assert!(StudyPlanRepo::find(&db, &user).expect("find").is_none());
    }
}
