use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::models::user::User;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MentorAssignment {
    pub id: Uuid,
    pub student_id: Uuid,
    pub mentor_id: Uuid,
    pub assigned_at: DateTime<Utc>,
}

impl MentorAssignment {
    /// Assigns a mentor to a student, replacing any previous assignment
    pub async fn assign(
        pool: &PgPool,
        student_id: Uuid,
        mentor_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let assignment = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO mentor_assignments (student_id, mentor_id)
            VALUES ($1, $2)
            ON CONFLICT (student_id)
            DO UPDATE SET mentor_id = EXCLUDED.mentor_id, assigned_at = NOW()
            RETURNING *
            "#,
        )
        .bind(student_id)
        .bind(mentor_id)
        .fetch_one(pool)
        .await?;

        Ok(assignment)
    }

    /// Finds the assignment for a student
    pub async fn find_by_student(
        pool: &PgPool,
        student_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let assignment = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM mentor_assignments WHERE student_id = $1
            "#,
        )
        .bind(student_id)
        .fetch_optional(pool)
        .await?;

        Ok(assignment)
    }

    /// Checks whether a mentor is assigned to a student
    pub async fn is_assigned(
        pool: &PgPool,
        mentor_id: Uuid,
        student_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM mentor_assignments
                WHERE mentor_id = $1 AND student_id = $2
            )
            "#,
        )
        .bind(mentor_id)
        .bind(student_id)
        .fetch_one(pool)
        .await?;

        Ok(exists)
    }

    /// Lists the students assigned to a mentor
    pub async fn list_students(pool: &PgPool, mentor_id: Uuid) -> Result<Vec<User>, sqlx::Error> {
        let students = sqlx::query_as::<_, User>(
            r#"
            SELECT u.* FROM users u
            JOIN mentor_assignments ma ON ma.student_id = u.id
            WHERE ma.mentor_id = $1
            ORDER BY u.name
            "#,
        )
        .bind(mentor_id)
        .fetch_all(pool)
        .await?;

        Ok(students)
    }
}
