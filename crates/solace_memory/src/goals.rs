//! Goal tracking.
//!
//! Goals are stated by the user ("I want to run a marathon") and closed by
//! later progress reports ("I finished the marathon", "I gave up on running").
//! Every progress report leaves an append-only `goal_progress` row.

use anyhow::Result;
use std::sync::Arc;

use solace_core::{GoalCategory, GoalProgressSignal, GoalStatus, MessageSignals, UserGoal};

use crate::SqliteStore;

/// Words too short to carry meaning when matching a progress note to a goal.
const MIN_MATCH_WORD_LEN: usize = 4;

pub struct GoalManager {
    db: Arc<SqliteStore>,
}

impl GoalManager {
    pub fn new(db: Arc<SqliteStore>) -> Self {
        Self { db }
    }

    /// Active goals, most recently touched first.
    pub async fn active_goals(&self, user_id: &str) -> Result<Vec<UserGoal>> {
        self.db.active_goals(user_id).await
    }

    /// Create goals and close matching ones from a message's signals.
    /// Returns the number of goals created.
    pub async fn apply_signals(&self, user_id: &str, signals: &MessageSignals, at: i64) -> Result<usize> {
        let mut created = 0;
        for goal in &signals.goals {
            let active = self.db.active_goals(user_id).await?;
            if active.iter().any(|g| g.title.eq_ignore_ascii_case(&goal.title)) {
                continue;
            }
            self.db
                .create_goal(&UserGoal {
                    id: 0,
                    user_id: user_id.to_string(),
                    title: goal.title.clone(),
                    category: goal.category,
                    status: GoalStatus::Active,
                    motivators: goal.motivators.clone(),
                    obstacles: goal.obstacles.clone(),
                    created_at: at,
                    updated_at: at,
                })
                .await?;
            created += 1;
        }

        for progress in &signals.goal_progress {
            let active = self.db.active_goals(user_id).await?;
            let goal_id = match match_goal(&active, progress) {
                Some(id) => id,
                None => {
                    // Progress on a goal we never saw stated: record it anyway
                    created += 1;
                    self.db
                        .create_goal(&UserGoal {
                            id: 0,
                            user_id: user_id.to_string(),
                            title: progress.note.clone(),
                            category: progress.category.unwrap_or(GoalCategory::PersonalGrowth),
                            status: GoalStatus::Active,
                            motivators: Vec::new(),
                            obstacles: Vec::new(),
                            created_at: at,
                            updated_at: at,
                        })
                        .await?
                }
            };
            self.db
                .record_goal_progress(goal_id, progress.status, &progress.note, at)
                .await?;
            tracing::debug!(goal_id, status = %progress.status, "Goal progress recorded");
        }
        Ok(created)
    }
}

fn content_words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= MIN_MATCH_WORD_LEN)
        .map(str::to_string)
        .collect()
}

/// Pick the active goal a progress report refers to: first by a shared
/// content word, then by category. `active` is newest first.
fn match_goal(active: &[UserGoal], progress: &GoalProgressSignal) -> Option<i64> {
    let note_words = content_words(&progress.note);
    active
        .iter()
        .find(|g| content_words(&g.title).iter().any(|w| note_words.contains(w)))
        .or_else(|| {
            progress
                .category
                .and_then(|c| active.iter().find(|g| g.category == c))
        })
        .map(|g| g.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn goal(id: i64, title: &str, category: GoalCategory) -> UserGoal {
        UserGoal {
            id,
            user_id: "u1".into(),
            title: title.into(),
            category,
            status: GoalStatus::Active,
            motivators: vec![],
            obstacles: vec![],
            created_at: 0,
            updated_at: 0,
        }
    }

    fn progress(note: &str, category: Option<GoalCategory>) -> GoalProgressSignal {
        GoalProgressSignal {
            status: GoalStatus::Completed,
            category,
            note: note.into(),
        }
    }

    #[test]
    fn test_match_by_shared_word() {
        let active = vec![
            goal(2, "learn spanish", GoalCategory::Education),
            goal(1, "run a marathon", GoalCategory::Health),
        ];
        assert_eq!(match_goal(&active, &progress("the marathon", None)), Some(1));
    }

    #[test]
    fn test_match_falls_back_to_category() {
        let active = vec![goal(1, "get fit", GoalCategory::Health)];
        assert_eq!(
            match_goal(&active, &progress("my training plan", Some(GoalCategory::Health))),
            Some(1)
        );
        assert_eq!(match_goal(&active, &progress("my training plan", None)), None);
    }

    #[test]
    fn test_short_words_do_not_match() {
        let active = vec![goal(1, "be a dad", GoalCategory::Relationships)];
        assert_eq!(match_goal(&active, &progress("a big day", None)), None);
    }

    #[tokio::test]
    async fn test_apply_signals_creates_then_closes() {
        let db = Arc::new(SqliteStore::new(":memory:").await.unwrap());
        let manager = GoalManager::new(db.clone());

        let mut signals = MessageSignals::default();
        signals.goals.push(solace_core::GoalSignal {
            title: "run a marathon".into(),
            category: GoalCategory::Health,
            motivators: vec![],
            obstacles: vec!["my knee".into()],
        });
        assert_eq!(manager.apply_signals("u1", &signals, 10).await.unwrap(), 1);
        // Same title again is not a new goal
        assert_eq!(manager.apply_signals("u1", &signals, 11).await.unwrap(), 0);

        let mut done = MessageSignals::default();
        done.goal_progress.push(progress("the marathon", Some(GoalCategory::Health)));
        manager.apply_signals("u1", &done, 20).await.unwrap();

        assert!(manager.active_goals("u1").await.unwrap().is_empty());
        let goals = db.goals("u1").await.unwrap();
        assert_eq!(goals.len(), 1);
        assert_eq!(goals[0].status, GoalStatus::Completed);
        assert_eq!(goals[0].obstacles, vec!["my knee".to_string()]);
        let history = db.goal_progress(goals[0].id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].note, "the marathon");
    }
}
