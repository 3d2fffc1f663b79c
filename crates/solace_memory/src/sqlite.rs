use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePoolOptions, SqliteRow,
};
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use solace_core::audit::{self, AuditEntry, AuditEvent, ChainedAuditEntry, GENESIS_HASH};
use solace_core::{
    CoachingPlan, ContextFact, EmotionalSnapshot, GoalProgress, GoalStatus, LifeEvent, PlanStatus,
    PlanStep, ProbingState, Relationship, StepStatus, StoredInsight, UserGoal, UserProfile,
};

use crate::aggregator::observed_coping_style;

/// Every table that holds per-user rows, children before parents.
const USER_TABLES: &[&str] = &[
    "plan_steps",
    "coaching_plans",
    "goal_progress",
    "user_goals",
    "context_facts",
    "emotional_snapshots",
    "life_events",
    "relationships",
    "probing_states",
    "user_profiles",
    "message_insights",
    "audit_log",
];

/// Reads go through `pool`. Every write goes through `writer`, a pool of one
/// connection, so a write transaction never has to upgrade past another
/// writer's lock.
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
    writer: Pool<Sqlite>,
}

/// Parse a snake_case tag stored as TEXT back into its enum.
fn parse_tag<T: DeserializeOwned>(value: &str) -> Result<T> {
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .with_context(|| format!("Unknown tag '{}'", value))
}

fn parse_json<T: DeserializeOwned>(row: &SqliteRow, column: &str) -> Result<T> {
    let raw: String = row.get(column);
    serde_json::from_str(&raw).with_context(|| format!("Failed to decode column '{}'", column))
}

impl SqliteStore {
    pub async fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path = db_path.as_ref().display().to_string();

        // Every pooled connection to :memory: would be a separate database
        if path == ":memory:" {
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect("sqlite::memory:")
                .await
                .context("Failed to open in-memory SQLite database")?;
            let store = Self { writer: pool.clone(), pool };
            store.migrate().await?;
            return Ok(store);
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path))
            .context("Invalid SQLite database path")?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let writer = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options.clone())
            .await
            .context("Failed to connect to SQLite database")?;
        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .context("Failed to open SQLite read pool")?;

        let store = Self { pool, writer };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS message_insights (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                message_id TEXT NOT NULL UNIQUE,
                conversation_id TEXT NOT NULL,
                signals_json TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.writer)
        .await
        .context("Failed to create message_insights table")?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_insights_user ON message_insights(user_id, seq)")
            .execute(&self.writer)
            .await
            .context("Failed to create message_insights index")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_profiles (
                user_id TEXT PRIMARY KEY,
                profile_json TEXT NOT NULL,
                confidence INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.writer)
        .await
        .context("Failed to create user_profiles table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS probing_states (
                user_id TEXT PRIMARY KEY,
                state_json TEXT NOT NULL,
                current_depth INTEGER NOT NULL,
                last_asked_at INTEGER
            );
            "#,
        )
        .execute(&self.writer)
        .await
        .context("Failed to create probing_states table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS relationships (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                name TEXT NOT NULL,
                relation TEXT NOT NULL,
                sentiment REAL NOT NULL,
                mention_count INTEGER NOT NULL DEFAULT 1,
                first_mentioned_at INTEGER NOT NULL,
                last_mentioned_at INTEGER NOT NULL,
                UNIQUE(user_id, name, relation)
            );
            "#,
        )
        .execute(&self.writer)
        .await
        .context("Failed to create relationships table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS life_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                event_type TEXT NOT NULL,
                impact TEXT NOT NULL,
                ongoing INTEGER NOT NULL,
                related_people_json TEXT NOT NULL,
                confidence REAL NOT NULL,
                detected_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.writer)
        .await
        .context("Failed to create life_events table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS emotional_snapshots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                message_id TEXT NOT NULL,
                emotion TEXT NOT NULL,
                intensity INTEGER NOT NULL,
                energy TEXT NOT NULL,
                triggers_json TEXT NOT NULL,
                coping_style TEXT NOT NULL,
                recorded_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.writer)
        .await
        .context("Failed to create emotional_snapshots table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_goals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL,
                category TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'active',
                motivators_json TEXT NOT NULL,
                obstacles_json TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.writer)
        .await
        .context("Failed to create user_goals table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS goal_progress (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                goal_id INTEGER NOT NULL,
                user_id TEXT NOT NULL,
                status TEXT NOT NULL,
                note TEXT NOT NULL,
                recorded_at INTEGER NOT NULL,
                FOREIGN KEY(goal_id) REFERENCES user_goals(id)
            );
            "#,
        )
        .execute(&self.writer)
        .await
        .context("Failed to create goal_progress table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS context_facts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                category TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                UNIQUE(user_id, category, content)
            );
            "#,
        )
        .execute(&self.writer)
        .await
        .context("Failed to create context_facts table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS coaching_plans (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                focus_area TEXT NOT NULL,
                root_causes_json TEXT NOT NULL,
                short_term_goals_json TEXT NOT NULL,
                long_term_goals_json TEXT NOT NULL,
                approaches_json TEXT NOT NULL,
                phase TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.writer)
        .await
        .context("Failed to create coaching_plans table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS plan_steps (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                plan_id INTEGER NOT NULL,
                user_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                cadence TEXT NOT NULL,
                status TEXT NOT NULL,
                FOREIGN KEY(plan_id) REFERENCES coaching_plans(id)
            );
            "#,
        )
        .execute(&self.writer)
        .await
        .context("Failed to create plan_steps table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                event TEXT NOT NULL,
                detail_json TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                prev_hash TEXT NOT NULL,
                hash TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.writer)
        .await
        .context("Failed to create audit_log table")?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_audit_user ON audit_log(user_id, id)")
            .execute(&self.writer)
            .await
            .context("Failed to create audit_log index")?;

        Ok(())
    }

    // =========================================================================
    // Insight ledger
    // =========================================================================

    /// Append an insight and its side-table rows in one transaction.
    ///
    /// Returns `false` when the message id is already in the ledger; nothing
    /// is written in that case.
    pub async fn record_insight(&self, insight: &StoredInsight) -> Result<bool> {
        let signals = &insight.signals;
        let signals_json =
            serde_json::to_string(signals).context("Failed to serialize message signals")?;
        let at = insight.created_at;
        let user = insight.user_id.as_str();

        let mut tx = self.writer.begin().await?;

        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO message_insights (user_id, message_id, conversation_id, signals_json, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(user)
        .bind(&insight.message_id)
        .bind(&insight.conversation_id)
        .bind(&signals_json)
        .bind(at)
        .execute(&mut *tx)
        .await
        .context("Failed to append insight")?
        .rows_affected();

        if inserted == 0 {
            tx.rollback().await?;
            tracing::debug!(message_id = %insight.message_id, "Insight already recorded");
            return Ok(false);
        }

        if let Some(emotion) = signals.primary_emotion {
            let triggers: Vec<&str> = signals.concerns.iter().map(|c| c.as_str()).collect();
            sqlx::query(
                "INSERT INTO emotional_snapshots
                 (user_id, message_id, emotion, intensity, energy, triggers_json, coping_style, recorded_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(user)
            .bind(&insight.message_id)
            .bind(emotion.as_str())
            .bind(signals.intensity as i64)
            .bind(signals.energy.as_str())
            .bind(serde_json::to_string(&triggers)?)
            .bind(observed_coping_style(signals).as_str())
            .bind(at)
            .execute(&mut *tx)
            .await
            .context("Failed to record emotional snapshot")?;
        }

        let mut people: Vec<String> = Vec::new();
        for mention in &signals.relationships {
            let name = mention
                .name
                .clone()
                .unwrap_or_else(|| mention.relation.as_str().to_string());
            sqlx::query(
                "INSERT INTO relationships
                 (user_id, name, relation, sentiment, mention_count, first_mentioned_at, last_mentioned_at)
                 VALUES (?, ?, ?, ?, 1, ?, ?)
                 ON CONFLICT(user_id, name, relation) DO UPDATE SET
                    sentiment = (relationships.sentiment * relationships.mention_count + excluded.sentiment)
                                / (relationships.mention_count + 1),
                    mention_count = relationships.mention_count + 1,
                    last_mentioned_at = excluded.last_mentioned_at",
            )
            .bind(user)
            .bind(&name)
            .bind(mention.relation.as_str())
            .bind(signals.sentiment as f64)
            .bind(at)
            .bind(at)
            .execute(&mut *tx)
            .await
            .context("Failed to upsert relationship")?;

            let fact = match &mention.name {
                Some(n) => format!("{} ({})", n, mention.relation),
                None => mention.relation.to_string(),
            };
            insert_fact(&mut tx, user, "relationship", &fact, at).await?;
            if mention.name.is_some() {
                people.push(name);
            }
        }

        for event in &signals.life_events {
            sqlx::query(
                "INSERT INTO life_events
                 (user_id, event_type, impact, ongoing, related_people_json, confidence, detected_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(user)
            .bind(event.event_type.as_str())
            .bind(event.impact.as_str())
            .bind(event.ongoing)
            .bind(serde_json::to_string(&people)?)
            .bind(event.confidence as f64)
            .bind(at)
            .execute(&mut *tx)
            .await
            .context("Failed to record life event")?;
            insert_fact(&mut tx, user, "life_event", event.event_type.as_str(), at).await?;
        }

        for goal in &signals.goals {
            insert_fact(&mut tx, user, "goal", &goal.title.to_lowercase(), at).await?;
        }
        for value in &signals.values {
            insert_fact(&mut tx, user, "value", value.as_str(), at).await?;
        }

        tx.commit().await.context("Failed to commit insight")?;
        Ok(true)
    }

    /// The newest `limit` insights for a user, oldest first.
    pub async fn recent_insights(&self, user_id: &str, limit: u32) -> Result<Vec<StoredInsight>> {
        let rows = sqlx::query(
            "SELECT user_id, message_id, conversation_id, signals_json, created_at FROM (
                SELECT * FROM message_insights WHERE user_id = ? ORDER BY seq DESC LIMIT ?
             ) ORDER BY seq ASC",
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to read insight ledger")?;

        rows.iter()
            .map(|row| {
                Ok(StoredInsight {
                    user_id: row.get("user_id"),
                    message_id: row.get("message_id"),
                    conversation_id: row.get("conversation_id"),
                    signals: parse_json(row, "signals_json")?,
                    created_at: row.get("created_at"),
                })
            })
            .collect()
    }

    pub async fn insight_count(&self, user_id: &str) -> Result<u64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM message_insights WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .context("Failed to count insights")?;
        Ok(n.max(0) as u64)
    }

    pub async fn conversation_count(&self, user_id: &str) -> Result<u64> {
        let n: i64 = sqlx::query_scalar(
            "SELECT COUNT(DISTINCT conversation_id) FROM message_insights WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to count conversations")?;
        Ok(n.max(0) as u64)
    }

    // =========================================================================
    // Ancillary stores
    // =========================================================================

    pub async fn relationships(&self, user_id: &str) -> Result<Vec<Relationship>> {
        let rows = sqlx::query("SELECT * FROM relationships WHERE user_id = ? ORDER BY id")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to read relationships")?;

        rows.iter()
            .map(|row| {
                Ok(Relationship {
                    id: row.get("id"),
                    user_id: row.get("user_id"),
                    name: row.get("name"),
                    relation: parse_tag(row.get("relation"))?,
                    sentiment: row.get::<f64, _>("sentiment") as f32,
                    mention_count: row.get::<i64, _>("mention_count").max(0) as u32,
                    first_mentioned_at: row.get("first_mentioned_at"),
                    last_mentioned_at: row.get("last_mentioned_at"),
                })
            })
            .collect()
    }

    pub async fn life_events(&self, user_id: &str) -> Result<Vec<LifeEvent>> {
        let rows = sqlx::query("SELECT * FROM life_events WHERE user_id = ? ORDER BY id")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to read life events")?;

        rows.iter()
            .map(|row| {
                Ok(LifeEvent {
                    id: row.get("id"),
                    user_id: row.get("user_id"),
                    event_type: parse_tag(row.get("event_type"))?,
                    impact: parse_tag(row.get("impact"))?,
                    ongoing: row.get("ongoing"),
                    related_people: parse_json(row, "related_people_json")?,
                    confidence: row.get::<f64, _>("confidence") as f32,
                    detected_at: row.get("detected_at"),
                })
            })
            .collect()
    }

    /// The newest `limit` snapshots, oldest first.
    pub async fn emotional_snapshots(&self, user_id: &str, limit: u32) -> Result<Vec<EmotionalSnapshot>> {
        let rows = sqlx::query(
            "SELECT * FROM (
                SELECT * FROM emotional_snapshots WHERE user_id = ? ORDER BY id DESC LIMIT ?
             ) ORDER BY id ASC",
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to read emotional snapshots")?;

        rows.iter()
            .map(|row| {
                Ok(EmotionalSnapshot {
                    id: row.get("id"),
                    user_id: row.get("user_id"),
                    message_id: row.get("message_id"),
                    emotion: parse_tag(row.get("emotion"))?,
                    intensity: row.get::<i64, _>("intensity").clamp(0, 10) as u8,
                    energy: parse_tag(row.get("energy"))?,
                    triggers: parse_json(row, "triggers_json")?,
                    coping_style: parse_tag(row.get("coping_style"))?,
                    recorded_at: row.get("recorded_at"),
                })
            })
            .collect()
    }

    pub async fn context_facts(&self, user_id: &str) -> Result<Vec<ContextFact>> {
        let rows = sqlx::query("SELECT * FROM context_facts WHERE user_id = ? ORDER BY id")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to read context facts")?;

        Ok(rows
            .iter()
            .map(|row| ContextFact {
                id: row.get("id"),
                user_id: row.get("user_id"),
                category: row.get("category"),
                content: row.get("content"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    pub async fn context_fact_count(&self, user_id: &str) -> Result<u64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM context_facts WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .context("Failed to count context facts")?;
        Ok(n.max(0) as u64)
    }

    /// Distinct fact categories the user has context for.
    pub async fn context_categories(&self, user_id: &str) -> Result<Vec<String>> {
        let categories: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT category FROM context_facts WHERE user_id = ? ORDER BY category",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to read context categories")?;
        Ok(categories)
    }

    /// Insert a fact directly (imports, tests).
    pub async fn store_context_fact(&self, user_id: &str, category: &str, content: &str, at: i64) -> Result<()> {
        let mut conn = self.writer.acquire().await?;
        insert_fact(&mut conn, user_id, category, content, at).await
    }

    // =========================================================================
    // Goals
    // =========================================================================

    pub async fn create_goal(&self, goal: &UserGoal) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO user_goals (user_id, title, category, status, motivators_json, obstacles_json, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&goal.user_id)
        .bind(&goal.title)
        .bind(goal.category.as_str())
        .bind(goal.status.as_str())
        .bind(serde_json::to_string(&goal.motivators)?)
        .bind(serde_json::to_string(&goal.obstacles)?)
        .bind(goal.created_at)
        .bind(goal.updated_at)
        .execute(&self.writer)
        .await
        .context("Failed to create goal")?;
        Ok(result.last_insert_rowid())
    }

    pub async fn goals(&self, user_id: &str) -> Result<Vec<UserGoal>> {
        let rows = sqlx::query("SELECT * FROM user_goals WHERE user_id = ? ORDER BY id")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to read goals")?;
        rows.iter().map(row_to_goal).collect()
    }

    pub async fn active_goals(&self, user_id: &str) -> Result<Vec<UserGoal>> {
        let rows = sqlx::query(
            "SELECT * FROM user_goals WHERE user_id = ? AND status = 'active' ORDER BY updated_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to read active goals")?;
        rows.iter().map(row_to_goal).collect()
    }

    /// Move a goal to `status` and append the matching progress row.
    pub async fn record_goal_progress(
        &self,
        goal_id: i64,
        status: GoalStatus,
        note: &str,
        at: i64,
    ) -> Result<i64> {
        let mut tx = self.writer.begin().await?;

        let user_id: Option<String> = sqlx::query_scalar("SELECT user_id FROM user_goals WHERE id = ?")
            .bind(goal_id)
            .fetch_optional(&mut *tx)
            .await?;
        let user_id = user_id.with_context(|| format!("Goal {} not found", goal_id))?;

        sqlx::query("UPDATE user_goals SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(at)
            .bind(goal_id)
            .execute(&mut *tx)
            .await
            .context("Failed to update goal status")?;

        let id = sqlx::query(
            "INSERT INTO goal_progress (goal_id, user_id, status, note, recorded_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(goal_id)
        .bind(&user_id)
        .bind(status.as_str())
        .bind(note)
        .bind(at)
        .execute(&mut *tx)
        .await
        .context("Failed to append goal progress")?
        .last_insert_rowid();

        tx.commit().await?;
        Ok(id)
    }

    pub async fn goal_progress(&self, goal_id: i64) -> Result<Vec<GoalProgress>> {
        let rows = sqlx::query("SELECT * FROM goal_progress WHERE goal_id = ? ORDER BY id")
            .bind(goal_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to read goal progress")?;

        Ok(rows
            .iter()
            .map(|row| GoalProgress {
                id: row.get("id"),
                goal_id: row.get("goal_id"),
                status: GoalStatus::parse_str(row.get("status")),
                note: row.get("note"),
                recorded_at: row.get("recorded_at"),
            })
            .collect())
    }

    // =========================================================================
    // Profile & probing state
    // =========================================================================

    pub async fn load_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        let row = sqlx::query("SELECT profile_json FROM user_profiles WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to query user_profiles")?;

        row.map(|r| parse_json(&r, "profile_json")).transpose()
    }

    pub async fn save_profile(&self, profile: &UserProfile) -> Result<()> {
        let mut conn = self.writer.acquire().await?;
        save_profile_in(&mut conn, profile).await
    }

    /// Save the profile and append its audit entry in one transaction.
    pub async fn save_profile_audited(&self, profile: &UserProfile, entry: AuditEntry) -> Result<ChainedAuditEntry> {
        let mut tx = self.writer.begin().await?;
        save_profile_in(&mut tx, profile).await?;
        let row = append_audit_in(&mut tx, entry).await?;
        tx.commit().await.context("Failed to commit profile")?;
        Ok(row)
    }

    pub async fn load_probing_state(&self, user_id: &str) -> Result<Option<ProbingState>> {
        let row = sqlx::query("SELECT state_json FROM probing_states WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to query probing_states")?;

        row.map(|r| parse_json(&r, "state_json")).transpose()
    }

    pub async fn save_probing_state(&self, state: &ProbingState) -> Result<()> {
        let json = serde_json::to_string(state).context("Failed to serialize probing state")?;
        sqlx::query(
            "INSERT INTO probing_states (user_id, state_json, current_depth, last_asked_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET state_json = excluded.state_json,
                current_depth = excluded.current_depth, last_asked_at = excluded.last_asked_at",
        )
        .bind(&state.user_id)
        .bind(&json)
        .bind(state.current_depth.level() as i64)
        .bind(state.last_asked_at)
        .execute(&self.writer)
        .await
        .context("Failed to save probing state")?;
        Ok(())
    }

    // =========================================================================
    // Coaching plans
    // =========================================================================

    /// Insert a plan and its steps; returns the plan with ids filled in.
    pub async fn create_plan(&self, plan: &CoachingPlan) -> Result<CoachingPlan> {
        let mut tx = self.writer.begin().await?;

        let plan_id = sqlx::query(
            "INSERT INTO coaching_plans
             (user_id, focus_area, root_causes_json, short_term_goals_json, long_term_goals_json,
              approaches_json, phase, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&plan.user_id)
        .bind(&plan.focus_area)
        .bind(serde_json::to_string(&plan.root_causes)?)
        .bind(serde_json::to_string(&plan.short_term_goals)?)
        .bind(serde_json::to_string(&plan.long_term_goals)?)
        .bind(serde_json::to_string(&plan.approaches)?)
        .bind(plan.phase.as_str())
        .bind(plan.status.as_str())
        .bind(plan.created_at)
        .bind(plan.updated_at)
        .execute(&mut *tx)
        .await
        .context("Failed to create coaching plan")?
        .last_insert_rowid();

        let mut saved = plan.clone();
        saved.id = plan_id;
        for step in saved.steps.iter_mut() {
            step.id = sqlx::query(
                "INSERT INTO plan_steps (plan_id, user_id, position, title, description, cadence, status)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(plan_id)
            .bind(&plan.user_id)
            .bind(step.position as i64)
            .bind(&step.title)
            .bind(&step.description)
            .bind(step.cadence.as_str())
            .bind(step.status.as_str())
            .execute(&mut *tx)
            .await
            .context("Failed to create plan step")?
            .last_insert_rowid();
        }

        tx.commit().await?;
        Ok(saved)
    }

    pub async fn active_plan(&self, user_id: &str) -> Result<Option<CoachingPlan>> {
        let id: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM coaching_plans WHERE user_id = ? AND status = 'active' ORDER BY id DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to query active plan")?;

        match id {
            Some(id) => self.plan(user_id, id).await,
            None => Ok(None),
        }
    }

    pub async fn plan(&self, user_id: &str, plan_id: i64) -> Result<Option<CoachingPlan>> {
        let row = sqlx::query("SELECT * FROM coaching_plans WHERE id = ? AND user_id = ?")
            .bind(plan_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to query coaching plan")?;
        let Some(row) = row else {
            return Ok(None);
        };

        let step_rows = sqlx::query("SELECT * FROM plan_steps WHERE plan_id = ? ORDER BY position, id")
            .bind(plan_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to read plan steps")?;
        let steps = step_rows
            .iter()
            .map(|r| {
                Ok(PlanStep {
                    id: r.get("id"),
                    position: r.get::<i64, _>("position").max(0) as u32,
                    title: r.get("title"),
                    description: r.get("description"),
                    cadence: parse_tag(r.get("cadence"))?,
                    status: StepStatus::parse_str(r.get("status")),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(CoachingPlan {
            id: row.get("id"),
            user_id: row.get("user_id"),
            focus_area: row.get("focus_area"),
            root_causes: parse_json(&row, "root_causes_json")?,
            short_term_goals: parse_json(&row, "short_term_goals_json")?,
            long_term_goals: parse_json(&row, "long_term_goals_json")?,
            approaches: parse_json(&row, "approaches_json")?,
            phase: parse_tag(row.get("phase"))?,
            status: PlanStatus::parse_str(row.get("status")),
            steps,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }))
    }

    pub async fn update_plan_state(&self, plan: &CoachingPlan) -> Result<()> {
        sqlx::query("UPDATE coaching_plans SET phase = ?, status = ?, updated_at = ? WHERE id = ?")
            .bind(plan.phase.as_str())
            .bind(plan.status.as_str())
            .bind(plan.updated_at)
            .bind(plan.id)
            .execute(&self.writer)
            .await
            .context("Failed to update coaching plan")?;
        Ok(())
    }

    /// Returns the owning plan id, or `None` if the step does not belong to the user.
    pub async fn set_step_status(&self, user_id: &str, step_id: i64, status: StepStatus) -> Result<Option<i64>> {
        let plan_id: Option<i64> =
            sqlx::query_scalar("SELECT plan_id FROM plan_steps WHERE id = ? AND user_id = ?")
                .bind(step_id)
                .bind(user_id)
                .fetch_optional(&self.writer)
                .await
                .context("Failed to query plan step")?;
        if plan_id.is_none() {
            return Ok(None);
        }

        sqlx::query("UPDATE plan_steps SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(step_id)
            .execute(&self.writer)
            .await
            .context("Failed to update plan step")?;
        Ok(plan_id)
    }

    // =========================================================================
    // Audit chain
    // =========================================================================

    /// Append `entry` to the user's chain, linking it to the newest row.
    pub async fn append_audit(&self, entry: AuditEntry) -> Result<ChainedAuditEntry> {
        let mut tx = self.writer.begin().await?;
        let row = append_audit_in(&mut tx, entry).await?;
        tx.commit().await?;
        Ok(row)
    }

    pub async fn audit_log(&self, user_id: &str) -> Result<Vec<ChainedAuditEntry>> {
        let rows = sqlx::query("SELECT * FROM audit_log WHERE user_id = ? ORDER BY id")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to read audit log")?;

        rows.iter()
            .map(|row| {
                Ok(ChainedAuditEntry {
                    entry: AuditEntry {
                        user_id: row.get("user_id"),
                        event: parse_tag::<AuditEvent>(row.get("event"))?,
                        detail: parse_json(row, "detail_json")?,
                        created_at: row.get("created_at"),
                    },
                    prev_hash: row.get("prev_hash"),
                    hash: row.get("hash"),
                })
            })
            .collect()
    }

    // =========================================================================
    // Erasure
    // =========================================================================

    /// Delete every row belonging to the user and start a fresh audit chain
    /// with a single `data_erased` entry. Returns the number of rows deleted.
    pub async fn erase_user_data(&self, user_id: &str, at: i64) -> Result<u64> {
        let mut tx = self.writer.begin().await?;
        let mut deleted = 0u64;
        for table in USER_TABLES {
            deleted += sqlx::query(&format!("DELETE FROM {} WHERE user_id = ?", table))
                .bind(user_id)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to erase rows from {}", table))?
                .rows_affected();
        }

        append_audit_in(
            &mut tx,
            AuditEntry {
                user_id: user_id.to_string(),
                event: AuditEvent::DataErased,
                detail: serde_json::json!({ "rows_deleted": deleted }),
                created_at: at,
            },
        )
        .await?;

        tx.commit().await.context("Failed to commit erasure")?;
        tracing::info!(user = user_id, rows = deleted, "User data erased");
        Ok(deleted)
    }
}

async fn insert_fact(
    conn: &mut SqliteConnection,
    user_id: &str,
    category: &str,
    content: &str,
    at: i64,
) -> Result<()> {
    sqlx::query(
        "INSERT OR IGNORE INTO context_facts (user_id, category, content, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(category)
    .bind(content)
    .bind(at)
    .execute(&mut *conn)
    .await
    .context("Failed to store context fact")?;
    Ok(())
}

async fn save_profile_in(conn: &mut SqliteConnection, profile: &UserProfile) -> Result<()> {
    let json = serde_json::to_string(profile).context("Failed to serialize profile")?;
    sqlx::query(
        "INSERT INTO user_profiles (user_id, profile_json, confidence, updated_at) VALUES (?, ?, ?, ?)
         ON CONFLICT(user_id) DO UPDATE SET profile_json = excluded.profile_json,
            confidence = excluded.confidence, updated_at = excluded.updated_at",
    )
    .bind(&profile.user_id)
    .bind(&json)
    .bind(profile.confidence as i64)
    .bind(profile.as_of)
    .execute(&mut *conn)
    .await
    .context("Failed to save profile")?;

    tracing::debug!(user = %profile.user_id, confidence = profile.confidence, "Profile saved");
    Ok(())
}

async fn append_audit_in(conn: &mut SqliteConnection, entry: AuditEntry) -> Result<ChainedAuditEntry> {
    let prev: Option<String> =
        sqlx::query_scalar("SELECT hash FROM audit_log WHERE user_id = ? ORDER BY id DESC LIMIT 1")
            .bind(&entry.user_id)
            .fetch_optional(&mut *conn)
            .await
            .context("Failed to read audit chain head")?;
    let prev = prev.unwrap_or_else(|| GENESIS_HASH.to_string());

    let row = audit::chain(&prev, entry);
    sqlx::query(
        "INSERT INTO audit_log (user_id, event, detail_json, created_at, prev_hash, hash) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&row.entry.user_id)
    .bind(row.entry.event.as_str())
    .bind(serde_json::to_string(&row.entry.detail)?)
    .bind(row.entry.created_at)
    .bind(&row.prev_hash)
    .bind(&row.hash)
    .execute(&mut *conn)
    .await
    .context("Failed to append audit entry")?;
    Ok(row)
}

fn row_to_goal(row: &SqliteRow) -> Result<UserGoal> {
    Ok(UserGoal {
        id: row.get("id"),
        user_id: row.get("user_id"),
        title: row.get("title"),
        category: parse_tag(row.get("category"))?,
        status: GoalStatus::parse_str(row.get("status")),
        motivators: parse_json(row, "motivators_json")?,
        obstacles: parse_json(row, "obstacles_json")?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
