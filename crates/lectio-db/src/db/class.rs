use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres};
use std::sync::Arc;
use uuid::Uuid;

use lectio_core::models::{format_class_code, Class};

use crate::db::traits::ClassStore;

/// Attempts at drawing an unused join code before giving up.
const CODE_ATTEMPTS: usize = 5;

const CLASS_SELECT: &str = r#"
    SELECT
        c.id,
        c.title,
        c.code,
        c.creator_id,
        c.created_at,
        ARRAY(
            SELECT m.user_id FROM class_members m
            WHERE m.class_id = c.id
            ORDER BY m.joined_at
        ) AS members
    FROM classes c
"#;

type CodeGenerator = Arc<dyn Fn() -> String + Send + Sync>;

#[derive(Clone)]
pub struct PgClassRepository {
    pool: PgPool,
    next_code: CodeGenerator,
}

impl PgClassRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            next_code: Arc::new(|| format_class_code(rand::random::<[u8; 4]>())),
        }
    }

    /// Replace the random join-code source. Codes must be 8 characters.
    pub fn with_code_generator(
        mut self,
        generator: impl Fn() -> String + Send + Sync + 'static,
    ) -> Self {
        self.next_code = Arc::new(generator);
        self
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

#[async_trait]
impl ClassStore for PgClassRepository {
    #[tracing::instrument(skip(self))]
    async fn create_class(&self, title: &str, creator_id: Uuid) -> Result<Class> {
        for attempt in 1..=CODE_ATTEMPTS {
            let code = (self.next_code)();

            let mut tx = self
                .pool
                .begin()
                .await
                .context("Failed to begin transaction for class creation")?;

            let inserted = sqlx::query_scalar::<Postgres, Uuid>(
                r#"
                INSERT INTO classes (title, code, creator_id)
                VALUES ($1, $2, $3)
                RETURNING id
                "#,
            )
            .bind(title)
            .bind(&code)
            .bind(creator_id)
            .fetch_one(&mut *tx)
            .await;

            let class_id = match inserted {
                Ok(id) => id,
                Err(e) if is_unique_violation(&e) => {
                    tracing::debug!(attempt = attempt, "Class code collision, drawing another");
                    tx.rollback().await.ok();
                    continue;
                }
                Err(e) => return Err(e).context("Failed to insert class"),
            };

            sqlx::query("INSERT INTO class_members (class_id, user_id) VALUES ($1, $2)")
                .bind(class_id)
                .bind(creator_id)
                .execute(&mut *tx)
                .await
                .context("Failed to add creator as class member")?;

            tx.commit()
                .await
                .context("Failed to commit class creation")?;

            tracing::info!(class_id = %class_id, code = %code, "Class created");

            return self
                .get_class(class_id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("Class {} vanished after creation", class_id));
        }

        Err(anyhow::anyhow!(
            "Failed to generate a unique class code after {} attempts",
            CODE_ATTEMPTS
        ))
    }

    #[tracing::instrument(skip(self))]
    async fn get_class(&self, id: Uuid) -> Result<Option<Class>> {
        let sql = format!("{CLASS_SELECT} WHERE c.id = $1");
        sqlx::query_as::<Postgres, Class>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch class")
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_code(&self, code: &str) -> Result<Option<Class>> {
        let sql = format!("{CLASS_SELECT} WHERE c.code = UPPER($1)");
        sqlx::query_as::<Postgres, Class>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch class by code")
    }

    #[tracing::instrument(skip(self))]
    async fn add_member(&self, class_id: Uuid, user_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO class_members (class_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (class_id, user_id) DO NOTHING
            "#,
        )
        .bind(class_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .context("Failed to add class member")?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn remove_member(&self, class_id: Uuid, user_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM class_members WHERE class_id = $1 AND user_id = $2")
            .bind(class_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .context("Failed to remove class member")?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn list_user_classes(&self, user_id: Uuid) -> Result<Vec<Class>> {
        let sql = format!(
            r#"
            {CLASS_SELECT}
            WHERE EXISTS (
                SELECT 1 FROM class_members m
                WHERE m.class_id = c.id AND m.user_id = $1
            )
            ORDER BY c.created_at DESC
            "#
        );
        sqlx::query_as::<Postgres, Class>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list user classes")
    }

    #[tracing::instrument(skip(self))]
    async fn delete_class(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM classes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete class")?;

        Ok(result.rows_affected() > 0)
    }
}
