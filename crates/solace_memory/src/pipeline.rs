//! Wellness Pipeline - per-user coordinator for one chat turn
//!
//! Ties the stateless analyzers to the store:
//! - Signal extraction and crisis assessment (concurrently, off the runtime)
//! - Insight ledger + side tables + goals
//! - Periodic profile aggregation
//! - Coaching plans on request
//! - Safety framing of the drafted reply
//! - Probing questions
//!
//! Every mutation of one user's data happens under that user's lock, so two
//! turns for the same user never interleave their writes. Different users
//! proceed in parallel.

use anyhow::Result;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError};
use tokio::sync::{Mutex, OwnedMutexGuard};

use solace_core::audit::{self, AuditEntry, AuditEvent};
use solace_core::sentiment::sentiment_score;
use solace_core::{
    CoachingPlan, CrisisAssessment, CrisisSeverity, DraftContext, MessageSignals, PlanStatus,
    ProbingState, ReplyDrafter, SolaceConfig, SolaceError, SolaceResult, StepStatus,
    StoredInsight, UserProfile,
};
use solace_signals::{select_exercise, CrisisDetector, Exercise, RuleSet, SafetyWrapper, SignalExtractor};

use crate::aggregator::{aggregate, Ancillary};
use crate::coaching::{generate_plan, needs_refresh, phase_for};
use crate::goals::GoalManager;
use crate::probing::{score_engagement, ProbingQuestion, ProbingScheduler};
use crate::SqliteStore;

/// Trigger added to the crisis verdict when analysis did not complete.
pub const ANALYSIS_UNAVAILABLE: &str = "analysis_unavailable";

/// Used when the drafter fails; the safety framing is still applied.
const FALLBACK_DRAFT: &str = "I'm here with you, and I'm listening.";

/// Everything produced for one user message.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub reply: String,
    pub signals: MessageSignals,
    pub assessment: CrisisAssessment,
    /// Latest stored profile after this turn, if any.
    pub profile: Option<UserProfile>,
    /// Id of the exercise included in the reply.
    pub exercise: Option<String>,
    /// Id of the probing question appended to the reply.
    pub probing_question: Option<String>,
    /// Store failures that were logged and skipped during the turn.
    pub persistence_errors: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainStatus {
    Intact { entries: usize },
    Broken { index: usize },
}

/// Ancillary reads degrade to `None` instead of failing aggregation.
fn degrade<T>(source: &str, result: Result<T>) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!("Failed to load {} for aggregation: {}", source, e);
            None
        }
    }
}

type LockMap = std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>;

/// One user's lock. The map entry goes away with the last holder.
struct UserGuard<'a> {
    locks: &'a LockMap,
    user_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for UserGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks.get(&self.user_id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(&self.user_id);
        }
    }
}

pub struct WellnessPipeline {
    store: Arc<SqliteStore>,
    goals: GoalManager,
    extractor: SignalExtractor,
    detector: CrisisDetector,
    wrapper: SafetyWrapper,
    scheduler: ProbingScheduler,
    config: SolaceConfig,

    /// Locks for users with a turn in flight.
    user_locks: LockMap,

    rng: Mutex<StdRng>,
}

impl WellnessPipeline {
    pub fn new(config: SolaceConfig, store: Arc<SqliteStore>) -> Result<Self> {
        let rules = Arc::new(RuleSet::english()?);
        tracing::info!(ruleset = solace_signals::patterns::RULESET_VERSION, "Wellness pipeline ready");
        Ok(Self {
            goals: GoalManager::new(store.clone()),
            extractor: SignalExtractor::new(rules.clone()),
            detector: CrisisDetector::new(rules, config.crisis.sentiment_threshold),
            wrapper: SafetyWrapper::new(),
            scheduler: ProbingScheduler::new(config.probing.clone()),
            store,
            config,
            user_locks: LockMap::default(),
            rng: Mutex::new(StdRng::from_os_rng()),
        })
    }

    /// Open the configured database and build a pipeline on it.
    pub async fn open(config: SolaceConfig) -> Result<Self> {
        let store = Arc::new(SqliteStore::new(&config.storage.db_path).await?);
        Self::new(config, store)
    }

    /// Make probing tie-breaks reproducible.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn store(&self) -> &Arc<SqliteStore> {
        &self.store
    }

    pub fn config(&self) -> &SolaceConfig {
        &self.config
    }

    async fn lock_user(&self, user_id: &str) -> UserGuard<'_> {
        let lock = {
            let mut locks = self.user_locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(user_id.to_string()).or_default().clone()
        };
        UserGuard {
            locks: &self.user_locks,
            user_id: user_id.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }

    async fn audit(&self, user_id: &str, event: AuditEvent, detail: serde_json::Value) -> Result<()> {
        self.store
            .append_audit(AuditEntry {
                user_id: user_id.to_string(),
                event,
                detail,
                created_at: Utc::now().timestamp(),
            })
            .await?;
        Ok(())
    }

    // =========================================================================
    // Analysis
    // =========================================================================

    pub fn extract_signals(&self, text: &str, prior_sentiment: Option<f32>) -> MessageSignals {
        self.extractor.extract(text, prior_sentiment)
    }

    /// Classify `text`; without a sentiment score the keyword score is used.
    pub fn assess_crisis(&self, text: &str, sentiment: Option<f32>) -> CrisisAssessment {
        let sentiment = sentiment.unwrap_or_else(|| sentiment_score(text));
        self.detector.assess(text, sentiment)
    }

    /// Run extraction and crisis assessment on the blocking pool. If either
    /// task dies the verdict is raised to at least `Low`.
    async fn analyze(&self, text: &str) -> (MessageSignals, CrisisAssessment) {
        let extractor = self.extractor.clone();
        let detector = self.detector.clone();
        let for_extract = text.to_string();
        let for_crisis = text.to_string();

        let (signals, assessment) = tokio::join!(
            tokio::task::spawn_blocking(move || extractor.extract(&for_extract, None)),
            tokio::task::spawn_blocking(move || {
                let sentiment = sentiment_score(&for_crisis);
                detector.assess(&for_crisis, sentiment)
            }),
        );

        let (signals, extraction_ok) = match signals {
            Ok(s) => (s, true),
            Err(e) => {
                tracing::warn!("Signal extraction failed: {}", e);
                (MessageSignals::default(), false)
            }
        };
        let assessment = match assessment {
            Ok(a) if extraction_ok => a,
            Ok(a) => a.escalate_unknown(ANALYSIS_UNAVAILABLE),
            Err(e) => {
                tracing::warn!("Crisis assessment failed: {}", e);
                CrisisAssessment::none().escalate_unknown(ANALYSIS_UNAVAILABLE)
            }
        };
        (signals, assessment)
    }

    // =========================================================================
    // Ledger
    // =========================================================================

    /// Append a message's signals to the ledger. Returns `false` when the
    /// message id was already recorded (replays are no-ops).
    pub async fn record_insight(
        &self,
        user_id: &str,
        message_id: &str,
        conversation_id: &str,
        signals: &MessageSignals,
    ) -> Result<bool> {
        let _guard = self.lock_user(user_id).await;
        let now = Utc::now().timestamp();
        let inserted = self
            .record_insight_locked(user_id, message_id, conversation_id, signals, now)
            .await?;
        if inserted {
            if let Err(e) = self.goals.apply_signals(user_id, signals, now).await {
                tracing::warn!("Failed to apply goal signals: {}", e);
            }
        }
        Ok(inserted)
    }

    /// Ledger row and its side tables only. Goals are applied separately so a
    /// goal failure cannot hide a committed insight.
    async fn record_insight_locked(
        &self,
        user_id: &str,
        message_id: &str,
        conversation_id: &str,
        signals: &MessageSignals,
        at: i64,
    ) -> Result<bool> {
        let insight = StoredInsight {
            user_id: user_id.to_string(),
            message_id: message_id.to_string(),
            conversation_id: conversation_id.to_string(),
            signals: signals.clone(),
            created_at: at,
        };
        if !self.store.record_insight(&insight).await? {
            return Ok(false);
        }
        tracing::debug!(user = user_id, message_id, "Insight recorded");
        Ok(true)
    }

    // =========================================================================
    // Profile
    // =========================================================================

    /// Aggregate when the ledger size hits a multiple of the interval.
    pub async fn maybe_aggregate_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        let _guard = self.lock_user(user_id).await;
        self.maybe_aggregate_locked(user_id).await
    }

    async fn maybe_aggregate_locked(&self, user_id: &str) -> Result<Option<UserProfile>> {
        let interval = self.config.aggregation.interval.max(1);
        let count = self.store.insight_count(user_id).await?;
        if count == 0 || count % interval != 0 {
            return Ok(None);
        }
        self.aggregate_locked(user_id).await.map(Some)
    }

    /// Recompute and store the profile now.
    pub async fn aggregate_profile(&self, user_id: &str) -> Result<UserProfile> {
        let _guard = self.lock_user(user_id).await;
        self.aggregate_locked(user_id).await
    }

    async fn aggregate_locked(&self, user_id: &str) -> Result<UserProfile> {
        let window_size = self.config.aggregation.window;
        let window = self.store.recent_insights(user_id, window_size).await?;
        let message_count = self.store.insight_count(user_id).await?;

        let ancillary = Ancillary {
            relationships: degrade("relationships", self.store.relationships(user_id).await),
            life_events: degrade("life_events", self.store.life_events(user_id).await),
            snapshots: degrade(
                "emotional_snapshots",
                self.store.emotional_snapshots(user_id, window_size).await,
            ),
            context_fact_count: degrade("context_facts", self.store.context_fact_count(user_id).await),
        };
        let previous = degrade("previous profile", self.store.load_profile(user_id).await).flatten();

        let profile = aggregate(user_id, message_count, &window, &ancillary);
        self.store
            .save_profile_audited(
                &profile,
                AuditEntry {
                    user_id: user_id.to_string(),
                    event: AuditEvent::ProfileAggregated,
                    detail: serde_json::json!({
                        "message_count": profile.message_count,
                        "confidence": profile.confidence,
                        "degraded_sources": profile.degraded_sources.len(),
                    }),
                    created_at: Utc::now().timestamp(),
                },
            )
            .await?;
        tracing::info!(
            user = user_id,
            messages = profile.message_count,
            confidence = profile.confidence,
            "Profile aggregated"
        );

        if self.config.coaching.auto_refresh {
            if let Some(prev) = previous.as_ref().filter(|p| needs_refresh(p, &profile)) {
                tracing::info!(
                    user = user_id,
                    from = %prev.attachment_style,
                    to = %profile.attachment_style,
                    "Profile shifted, refreshing coaching plan"
                );
                self.refresh_plan_locked(user_id, &profile).await?;
            }
        }
        Ok(profile)
    }

    pub async fn profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        self.store.load_profile(user_id).await
    }

    // =========================================================================
    // Coaching plans
    // =========================================================================

    /// The active plan, or a new one built from the stored profile. A user
    /// with no profile yet gets one aggregation first.
    pub async fn get_or_create_coaching_plan(&self, user_id: &str) -> SolaceResult<CoachingPlan> {
        let _guard = self.lock_user(user_id).await;

        if let Some(plan) = self.store.active_plan(user_id).await? {
            return Ok(plan);
        }

        let profile = match self.store.load_profile(user_id).await? {
            Some(p) => Some(p),
            None => {
                if let Err(e) = self.aggregate_locked(user_id).await {
                    tracing::warn!("Failed to aggregate profile for plan: {}", e);
                }
                self.store.load_profile(user_id).await?
            }
        };
        let profile = profile.ok_or_else(|| SolaceError::ProfileUnavailable {
            user_id: user_id.to_string(),
        })?;

        Ok(self.create_plan_locked(user_id, &profile).await?)
    }

    async fn create_plan_locked(&self, user_id: &str, profile: &UserProfile) -> Result<CoachingPlan> {
        let active_goals = self.goals.active_goals(user_id).await?;
        let plan = generate_plan(profile, &active_goals, Utc::now().timestamp());
        let plan = self.store.create_plan(&plan).await?;
        self.audit(
            user_id,
            AuditEvent::PlanCreated,
            serde_json::json!({
                "plan_id": plan.id,
                "approaches": plan.approaches.iter().map(|a| a.as_str()).collect::<Vec<_>>(),
            }),
        )
        .await?;
        tracing::info!(user = user_id, plan_id = plan.id, "Coaching plan created");
        Ok(plan)
    }

    async fn close_plan_locked(&self, plan: &mut CoachingPlan, status: PlanStatus) -> Result<()> {
        plan.status = status;
        plan.updated_at = Utc::now().timestamp();
        self.store.update_plan_state(plan).await?;
        self.audit(
            &plan.user_id,
            AuditEvent::PlanClosed,
            serde_json::json!({ "plan_id": plan.id, "status": status.as_str() }),
        )
        .await
    }

    async fn refresh_plan_locked(&self, user_id: &str, profile: &UserProfile) -> Result<()> {
        let Some(mut current) = self.store.active_plan(user_id).await? else {
            return Ok(());
        };
        self.close_plan_locked(&mut current, PlanStatus::Replaced).await?;
        self.create_plan_locked(user_id, profile).await?;
        Ok(())
    }

    /// Mark a plan completed. Closing an already closed plan is a no-op.
    pub async fn complete_coaching_plan(&self, user_id: &str, plan_id: i64) -> SolaceResult<CoachingPlan> {
        let _guard = self.lock_user(user_id).await;

        let mut plan = self
            .store
            .plan(user_id, plan_id)
            .await?
            .ok_or_else(|| SolaceError::PlanNotFound {
                user_id: user_id.to_string(),
                plan_id,
            })?;
        if plan.is_active() {
            self.close_plan_locked(&mut plan, PlanStatus::Completed).await?;
        }
        Ok(plan)
    }

    /// Update one step and move the plan's phase to match its progress.
    pub async fn set_plan_step_status(
        &self,
        user_id: &str,
        step_id: i64,
        status: StepStatus,
    ) -> SolaceResult<CoachingPlan> {
        let _guard = self.lock_user(user_id).await;

        let plan_id = self
            .store
            .set_step_status(user_id, step_id, status)
            .await?
            .ok_or(SolaceError::StepNotFound { step_id })?;
        let mut plan = self
            .store
            .plan(user_id, plan_id)
            .await?
            .ok_or_else(|| SolaceError::PlanNotFound {
                user_id: user_id.to_string(),
                plan_id,
            })?;

        let phase = phase_for(&plan);
        if phase != plan.phase {
            tracing::info!(user = user_id, plan_id, from = %plan.phase, to = %phase, "Plan phase changed");
            plan.phase = phase;
            plan.updated_at = Utc::now().timestamp();
            self.store.update_plan_state(&plan).await?;
        }
        Ok(plan)
    }

    // =========================================================================
    // Reply framing
    // =========================================================================

    pub fn wrap_with_safety(
        &self,
        draft: &str,
        assessment: &CrisisAssessment,
        exercise: Option<&Exercise>,
    ) -> String {
        self.wrapper.wrap(draft, assessment, exercise)
    }

    /// Append a probing question to `draft` when the user is due one.
    /// Store failures are logged and leave the draft unchanged.
    pub async fn maybe_append_probing_question(
        &self,
        user_id: &str,
        conversation_count: u64,
        text: &str,
        draft: &str,
    ) -> String {
        match self.run_probing(user_id, conversation_count, text, true).await {
            Ok(Some(q)) => format!("{}\n\n{}", draft, q.text),
            Ok(None) => draft.to_string(),
            Err(e) => {
                tracing::warn!("Failed to run probing scheduler: {}", e);
                draft.to_string()
            }
        }
    }

    /// Score a pending answer, then ask a new question if `may_ask` and the
    /// user is due one.
    async fn run_probing(
        &self,
        user_id: &str,
        conversation_count: u64,
        text: &str,
        may_ask: bool,
    ) -> Result<Option<&'static ProbingQuestion>> {
        let _guard = self.lock_user(user_id).await;

        let mut state = self
            .store
            .load_probing_state(user_id)
            .await?
            .unwrap_or_else(|| ProbingState::new(user_id));
        let mut changed = false;

        if state.pending_question.is_some() {
            let signals = self.extractor.extract(text, None);
            let engagement = score_engagement(text, &signals);
            if self.scheduler.record_answer(&mut state, engagement) {
                tracing::info!(user = user_id, depth = %state.current_depth.level(), "Probing depth advanced");
            }
            changed = true;
        }

        let now = Utc::now().timestamp();
        let mut asked = None;
        if may_ask && self.scheduler.is_eligible(&state, conversation_count, now) {
            let topics = self.store.context_categories(user_id).await?;
            let picked = {
                let mut rng = self.rng.lock().await;
                self.scheduler.select(&state, text, &topics, &mut *rng)
            };
            if let Some(q) = picked {
                self.scheduler.record_asked(&mut state, q, now);
                tracing::debug!(user = user_id, question = q.id, "Probing question asked");
                asked = Some(q);
                changed = true;
            }
        }

        if changed {
            self.store.save_probing_state(&state).await?;
        }
        Ok(asked)
    }

    // =========================================================================
    // Full turn
    // =========================================================================

    /// Process one user message end to end. Persistence failures never stop
    /// the reply; they are reported in `persistence_errors`.
    pub async fn process_turn(
        self: &Arc<Self>,
        user_id: &str,
        message_id: &str,
        conversation_id: &str,
        text: &str,
        drafter: &dyn ReplyDrafter,
    ) -> Result<TurnOutcome> {
        let (signals, assessment) = self.analyze(text).await;
        let mut persistence_errors = Vec::new();

        let profile = {
            let _guard = self.lock_user(user_id).await;
            let now = Utc::now().timestamp();

            let inserted = match self
                .record_insight_locked(user_id, message_id, conversation_id, &signals, now)
                .await
            {
                Ok(inserted) => inserted,
                Err(e) => {
                    tracing::warn!("Failed to record insight: {}", e);
                    persistence_errors.push(format!("record_insight: {}", e));
                    false
                }
            };
            if inserted {
                if let Err(e) = self.goals.apply_signals(user_id, &signals, now).await {
                    tracing::warn!("Failed to apply goal signals: {}", e);
                    persistence_errors.push(format!("goals: {}", e));
                }
            }

            if assessment.severity > CrisisSeverity::None {
                tracing::info!(user = user_id, severity = %assessment.severity, "Crisis assessed");
                let detail = serde_json::json!({
                    "severity": assessment.severity.as_str(),
                    "action": assessment.recommended_action.as_str(),
                    "trigger_count": assessment.triggers.len(),
                });
                if let Err(e) = self.audit(user_id, AuditEvent::CrisisAssessed, detail).await {
                    tracing::warn!("Failed to audit crisis assessment: {}", e);
                    persistence_errors.push(format!("audit: {}", e));
                }
            }

            if inserted {
                if self.config.pipeline.defer_aggregation {
                    let this = Arc::clone(self);
                    let user = user_id.to_string();
                    tokio::spawn(async move {
                        if let Err(e) = this.maybe_aggregate_profile(&user).await {
                            tracing::warn!("Deferred aggregation failed: {}", e);
                        }
                    });
                } else if let Err(e) = self.maybe_aggregate_locked(user_id).await {
                    tracing::warn!("Failed to aggregate profile: {}", e);
                    persistence_errors.push(format!("aggregate: {}", e));
                }
            }

            match self.store.load_profile(user_id).await {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!("Failed to load profile: {}", e);
                    persistence_errors.push(format!("load_profile: {}", e));
                    None
                }
            }
        };

        let draft = match drafter
            .draft(DraftContext {
                user_id,
                message: text,
                signals: &signals,
                assessment: &assessment,
                profile: profile.as_ref(),
            })
            .await
        {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!("Reply drafter failed: {}", e);
                FALLBACK_DRAFT.to_string()
            }
        };

        let exercise = if self.config.pipeline.offer_exercises {
            select_exercise(&signals, &assessment)
        } else {
            None
        };
        let mut reply = self.wrapper.wrap(&draft, &assessment, exercise);

        let mut probing_question = None;
        // In a crisis no new question is asked, but an answer to the pending
        // one is still recorded.
        let may_ask = !(self.config.pipeline.suppress_probing_in_crisis && assessment.is_crisis());
        let probing = match self.store.conversation_count(user_id).await {
            Ok(count) => self.run_probing(user_id, count, text, may_ask).await,
            Err(e) => Err(e),
        };
        match probing {
            Ok(Some(q)) => {
                reply = format!("{}\n\n{}", reply, q.text);
                probing_question = Some(q.id.to_string());
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!("Failed to run probing scheduler: {}", e);
                persistence_errors.push(format!("probing: {}", e));
            }
        }

        Ok(TurnOutcome {
            reply,
            signals,
            assessment,
            profile,
            exercise: exercise.map(|e| e.id.to_string()),
            probing_question,
            persistence_errors,
        })
    }

    // =========================================================================
    // Data rights
    // =========================================================================

    /// Delete everything stored for the user. Returns the number of rows removed.
    pub async fn erase_user_data(&self, user_id: &str) -> Result<u64> {
        let _guard = self.lock_user(user_id).await;
        self.store.erase_user_data(user_id, Utc::now().timestamp()).await
    }

    /// Replay the user's audit chain from genesis.
    pub async fn verify_audit_chain(&self, user_id: &str) -> Result<ChainStatus> {
        let log = self.store.audit_log(user_id).await?;
        Ok(match audit::verify(&log) {
            Ok(()) => ChainStatus::Intact { entries: log.len() },
            Err(index) => {
                tracing::warn!(user = user_id, index, "Audit chain broken");
                ChainStatus::Broken { index }
            }
        })
    }
}
