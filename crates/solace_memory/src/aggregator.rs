//! Profile Aggregator: a pure fold from ledger history to a `UserProfile`.
//!
//! Nothing in here reads the clock or the database. The caller gathers the
//! ledger window and whatever ancillary data it could load; a missing source
//! is passed as `None` and shows up in `degraded_sources`.

use std::collections::BTreeMap;

use solace_core::{
    profile_confidence, AttachmentStyle, CognitiveDistortion, CommunicationStyle, CopingStyle,
    CoreValue, DefenseMechanism, Emotion, EmotionalSnapshot, EmotionalTrend, EventImpact, LifeEvent,
    LifeEventType, Need, Relationship, StoredInsight, UserProfile, WellnessIndicator, MessageSignals,
};

/// Fewer attachment votes than this and the style stays `Developing`.
pub const MIN_ATTACHMENT_VOTES: u32 = 3;
/// Snapshots needed before a trend other than `Stable` is reported.
const MIN_TREND_SNAPSHOTS: usize = 4;
/// Mean valence shift between the older and newer half that counts as a trend.
const TREND_DELTA: f32 = 0.2;

const TOP_EMOTIONS: usize = 3;
const TOP_NEEDS: usize = 3;
const TOP_PATTERNS: usize = 3;
const TOP_VALUES: usize = 5;
const TOP_RELATIONSHIPS: usize = 5;
const MAX_MOTIVATORS: usize = 5;

/// Per-category data that lives next to the ledger.
#[derive(Debug, Clone, Default)]
pub struct Ancillary {
    pub relationships: Option<Vec<Relationship>>,
    pub life_events: Option<Vec<LifeEvent>>,
    /// Oldest first.
    pub snapshots: Option<Vec<EmotionalSnapshot>>,
    pub context_fact_count: Option<u64>,
}

impl Ancillary {
    fn degraded_sources(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.relationships.is_none() {
            out.push("relationships".to_string());
        }
        if self.life_events.is_none() {
            out.push("life_events".to_string());
        }
        if self.snapshots.is_none() {
            out.push("emotional_snapshots".to_string());
        }
        if self.context_fact_count.is_none() {
            out.push("context_facts".to_string());
        }
        out
    }
}

// ============================================================================
// Mapping tables
// ============================================================================

fn distortion_growth_area(d: CognitiveDistortion) -> &'static str {
    match d {
        CognitiveDistortion::Catastrophizing => "Keeping perspective under stress",
        CognitiveDistortion::AllOrNothing => "Seeing shades of gray",
        CognitiveDistortion::Overgeneralization => "Noticing exceptions to the pattern",
        CognitiveDistortion::MindReading => "Checking assumptions with others",
        CognitiveDistortion::FortuneTelling => "Tolerating uncertainty",
        CognitiveDistortion::ShouldStatements => "Relaxing rigid expectations",
        CognitiveDistortion::Personalization => "Separating responsibility from blame",
        CognitiveDistortion::Labeling => "Self-compassion",
        CognitiveDistortion::EmotionalReasoning => "Telling feelings apart from facts",
        CognitiveDistortion::DisqualifyingPositive => "Owning successes",
    }
}

fn defense_growth_area(d: DefenseMechanism) -> Option<&'static str> {
    match d {
        DefenseMechanism::Avoidance => Some("Facing difficult conversations"),
        DefenseMechanism::Denial => Some("Acknowledging difficult feelings"),
        DefenseMechanism::Minimization => Some("Taking own needs seriously"),
        DefenseMechanism::Displacement => Some("Expressing anger directly"),
        DefenseMechanism::Projection => Some("Owning difficult feelings"),
        _ => None,
    }
}

fn life_event_growth_area(e: LifeEventType) -> &'static str {
    match e {
        LifeEventType::JobLoss => "Rebuilding after losing work",
        LifeEventType::Breakup | LifeEventType::Divorce => "Healing after a relationship ended",
        LifeEventType::Bereavement => "Making room for grief",
        LifeEventType::Illness => "Coping with illness",
        LifeEventType::Relocation => "Settling into new surroundings",
        LifeEventType::Retirement => "Finding structure after retirement",
        LifeEventType::NewJob
        | LifeEventType::Marriage
        | LifeEventType::Birth
        | LifeEventType::Graduation => "Adjusting to a big change",
    }
}

const NEW_CHAPTER_STRENGTH: &str = "Open to new chapters";

/// Events still in play: ongoing, or detected since the window began.
/// Newest first.
fn current_life_events<'a>(events: &'a [LifeEvent], window: &[StoredInsight]) -> Vec<&'a LifeEvent> {
    let since = window.first().map(|i| i.created_at);
    let mut current: Vec<&LifeEvent> = events
        .iter()
        .filter(|e| e.ongoing || since.is_some_and(|t| e.detected_at >= t))
        .collect();
    current.sort_by(|a, b| b.detected_at.cmp(&a.detected_at).then_with(|| b.id.cmp(&a.id)));
    current
}

fn defense_strength(d: DefenseMechanism) -> Option<&'static str> {
    match d {
        DefenseMechanism::Humor => Some("Uses humor to stay resilient"),
        DefenseMechanism::Intellectualization => Some("Analytical problem solving"),
        _ => None,
    }
}

fn wellness_strength(w: WellnessIndicator) -> &'static str {
    match w {
        WellnessIndicator::Exercise => "Keeps an active routine",
        WellnessIndicator::Sleep => "Protects rest and sleep",
        WellnessIndicator::Mindfulness => "Mindfulness practice",
        WellnessIndicator::SocialConnection => "Maintains social ties",
        WellnessIndicator::Gratitude => "Practices gratitude",
        WellnessIndicator::Nutrition => "Cares for nutrition",
        WellnessIndicator::Therapy => "Open to professional support",
        WellnessIndicator::Journaling => "Reflective journaling",
    }
}

fn value_motivator(v: CoreValue) -> &'static str {
    match v {
        CoreValue::Family => "Being there for loved ones",
        CoreValue::Achievement => "Accomplishment",
        CoreValue::Honesty => "Living with integrity",
        CoreValue::Freedom => "Independence",
        CoreValue::Security => "Stability",
        CoreValue::Growth => "Personal growth",
        CoreValue::Faith => "Spiritual meaning",
        CoreValue::Health => "Wellbeing",
        CoreValue::Creativity => "Self-expression",
        CoreValue::Connection => "Belonging",
        CoreValue::Service => "Helping others",
    }
}

// ============================================================================
// Per-message votes
// ============================================================================

/// One communication-style vote per message. Predicates are checked in a
/// fixed order so each message votes at most once.
pub fn communication_vote(signals: &MessageSignals) -> Option<CommunicationStyle> {
    let f = &signals.features;
    if f.word_count == 0 {
        None
    } else if f.analytic_count > f.feeling_count {
        Some(CommunicationStyle::Analytical)
    } else if f.hedge_count > 0 {
        Some(CommunicationStyle::Reflective)
    } else if f.exclamation_count > 0 || f.feeling_count > 0 {
        Some(CommunicationStyle::Expressive)
    } else if f.word_count <= 15 {
        Some(CommunicationStyle::Direct)
    } else {
        None
    }
}

/// Attachment signals in one message: (secure, anxious, avoidant).
pub fn attachment_votes(signals: &MessageSignals) -> (bool, bool, bool) {
    let mentions_someone = !signals.relationships.is_empty();
    let anxious = signals
        .needs
        .iter()
        .any(|n| matches!(n, Need::Reassurance | Need::Validation))
        || (mentions_someone
            && signals
                .emotions()
                .any(|e| matches!(e, Emotion::Anxiety | Emotion::Fear)));
    let avoidant = signals.needs.contains(&Need::Autonomy)
        || signals.defenses.iter().any(|d| {
            matches!(
                d,
                DefenseMechanism::Avoidance | DefenseMechanism::Denial | DefenseMechanism::Minimization
            )
        });
    let secure = !anxious
        && !avoidant
        && ((mentions_someone && signals.sentiment > 0.2)
            || (signals.needs.contains(&Need::Connection) && signals.sentiment >= 0.0));
    (secure, anxious, avoidant)
}

/// Coping style visible in a single message.
pub fn observed_coping_style(signals: &MessageSignals) -> CopingStyle {
    if signals
        .defenses
        .iter()
        .any(|d| matches!(d, DefenseMechanism::Avoidance | DefenseMechanism::Denial))
    {
        CopingStyle::Avoidant
    } else if signals.wellness.contains(&WellnessIndicator::Therapy)
        || signals
            .needs
            .iter()
            .any(|n| matches!(n, Need::Connection | Need::Understanding | Need::Reassurance))
    {
        CopingStyle::SupportSeeking
    } else if !signals.goals.is_empty() || signals.features.analytic_count > 0 {
        CopingStyle::ProblemFocused
    } else if signals.wellness.iter().any(|w| {
        matches!(
            w,
            WellnessIndicator::Mindfulness | WellnessIndicator::Journaling | WellnessIndicator::Exercise
        )
    }) || signals.features.feeling_count > 0
    {
        CopingStyle::EmotionFocused
    } else {
        CopingStyle::Unobserved
    }
}

// ============================================================================
// Fold
// ============================================================================

/// Tally of tags; `BTreeMap` keeps iteration in enum order for tie-breaks.
struct Tally<T: Ord>(BTreeMap<T, u32>);

impl<T: Ord + Copy> Tally<T> {
    fn new() -> Self {
        Self(BTreeMap::new())
    }

    fn add_all(&mut self, items: impl IntoIterator<Item = T>) {
        for item in items {
            *self.0.entry(item).or_insert(0) += 1;
        }
    }

    /// Highest counts first, ties in enum order.
    fn top(&self, n: usize) -> Vec<T> {
        let mut entries: Vec<(T, u32)> = self.0.iter().map(|(k, v)| (*k, *v)).collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        entries.into_iter().take(n).map(|(k, _)| k).collect()
    }
}

fn majority_style(votes: &Tally<CommunicationStyle>) -> CommunicationStyle {
    let mut best: Option<(CommunicationStyle, u32)> = None;
    for style in CommunicationStyle::ALL {
        let n = votes.0.get(style).copied().unwrap_or(0);
        if n > 0 && best.map_or(true, |(_, b)| n > b) {
            best = Some((*style, n));
        }
    }
    best.map(|(s, _)| s).unwrap_or(CommunicationStyle::Reflective)
}

fn majority_attachment(secure: u32, anxious: u32, avoidant: u32) -> AttachmentStyle {
    if secure + anxious + avoidant < MIN_ATTACHMENT_VOTES {
        return AttachmentStyle::Developing;
    }
    let top = secure.max(anxious).max(avoidant);
    if anxious == avoidant && anxious == top {
        AttachmentStyle::Disorganized
    } else if secure == top {
        AttachmentStyle::Secure
    } else if anxious == top {
        AttachmentStyle::Anxious
    } else {
        AttachmentStyle::Avoidant
    }
}

fn emotional_trend(snapshots: &[EmotionalSnapshot]) -> EmotionalTrend {
    if snapshots.len() < MIN_TREND_SNAPSHOTS {
        return EmotionalTrend::Stable;
    }
    let mid = snapshots.len() / 2;
    let mean = |s: &[EmotionalSnapshot]| {
        s.iter().map(|x| x.emotion.valence()).sum::<f32>() / s.len() as f32
    };
    let delta = mean(&snapshots[mid..]) - mean(&snapshots[..mid]);
    if delta > TREND_DELTA {
        EmotionalTrend::Improving
    } else if delta < -TREND_DELTA {
        EmotionalTrend::Declining
    } else {
        EmotionalTrend::Stable
    }
}

fn push_unique(out: &mut Vec<String>, item: &str) {
    if !out.iter().any(|s| s == item) {
        out.push(item.to_string());
    }
}

/// Recompute the whole profile from `window` (oldest first) and `ancillary`.
///
/// `message_count` is the user's total ledger size, which may exceed the
/// window.
pub fn aggregate(
    user_id: &str,
    message_count: u64,
    window: &[StoredInsight],
    ancillary: &Ancillary,
) -> UserProfile {
    let mut emotions = Tally::new();
    let mut needs = Tally::new();
    let mut defenses = Tally::new();
    let mut distortions = Tally::new();
    let mut values = Tally::new();
    let mut wellness = Tally::new();
    let mut motivators = Tally::new();
    let mut styles = Tally::new();
    let (mut secure, mut anxious, mut avoidant) = (0u32, 0u32, 0u32);
    let (mut intensity_sum, mut intensity_n) = (0u32, 0u32);

    for insight in window {
        let s = &insight.signals;
        emotions.add_all(s.emotions());
        needs.add_all(s.needs.iter().copied());
        defenses.add_all(s.defenses.iter().copied());
        distortions.add_all(s.distortions.iter().copied());
        values.add_all(s.values.iter().copied());
        wellness.add_all(s.wellness.iter().copied());
        motivators.add_all(s.motivators.iter().copied());
        styles.add_all(communication_vote(s));

        let (se, an, av) = attachment_votes(s);
        secure += se as u32;
        anxious += an as u32;
        avoidant += av as u32;

        if s.intensity > 0 {
            intensity_sum += s.intensity as u32;
            intensity_n += 1;
        }
    }

    let distortion_patterns = distortions.top(TOP_PATTERNS);
    let defense_patterns = defenses.top(TOP_PATTERNS);
    let core_values = values.top(TOP_VALUES);

    let mut growth_areas = Vec::new();
    for d in &distortion_patterns {
        push_unique(&mut growth_areas, distortion_growth_area(*d));
    }
    for d in &defense_patterns {
        if let Some(area) = defense_growth_area(*d) {
            push_unique(&mut growth_areas, area);
        }
    }

    let life_events = current_life_events(ancillary.life_events.as_deref().unwrap_or_default(), window);
    for e in &life_events {
        if e.impact != EventImpact::Positive {
            push_unique(&mut growth_areas, life_event_growth_area(e.event_type));
        }
    }

    let mut strengths = Vec::new();
    for d in &defense_patterns {
        if let Some(s) = defense_strength(*d) {
            push_unique(&mut strengths, s);
        }
    }
    for w in wellness.top(WellnessIndicator::ALL.len()) {
        push_unique(&mut strengths, wellness_strength(w));
    }
    if life_events.iter().any(|e| e.impact == EventImpact::Positive) {
        push_unique(&mut strengths, NEW_CHAPTER_STRENGTH);
    }

    let mut primary_motivators = Vec::new();
    for v in &core_values {
        push_unique(&mut primary_motivators, value_motivator(*v));
    }
    for m in motivators.top(MAX_MOTIVATORS) {
        push_unique(&mut primary_motivators, m.as_str());
    }
    primary_motivators.truncate(MAX_MOTIVATORS);

    let key_relationships = ancillary
        .relationships
        .as_deref()
        .map(|rels| {
            let mut rels: Vec<&Relationship> = rels.iter().collect();
            rels.sort_by(|a, b| {
                b.mention_count
                    .cmp(&a.mention_count)
                    .then_with(|| a.name.cmp(&b.name))
            });
            rels.into_iter()
                .take(TOP_RELATIONSHIPS)
                .map(|r| {
                    if r.name == r.relation.as_str() {
                        r.name.clone()
                    } else {
                        format!("{} ({})", r.name, r.relation)
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    let context_fact_count = ancillary.context_fact_count.unwrap_or(0);
    let average_intensity = if intensity_n == 0 {
        0.0
    } else {
        intensity_sum as f32 / intensity_n as f32
    };

    UserProfile {
        user_id: user_id.to_string(),
        communication_style: majority_style(&styles),
        attachment_style: majority_attachment(secure, anxious, avoidant),
        core_values,
        strengths,
        growth_areas,
        primary_motivators,
        dominant_emotions: emotions.top(TOP_EMOTIONS),
        common_needs: needs.top(TOP_NEEDS),
        defense_patterns,
        distortion_patterns,
        emotional_trend: ancillary
            .snapshots
            .as_deref()
            .map(emotional_trend)
            .unwrap_or(EmotionalTrend::Stable),
        key_relationships,
        average_intensity,
        message_count,
        context_fact_count,
        degraded_sources: ancillary.degraded_sources(),
        confidence: profile_confidence(message_count, context_fact_count),
        as_of: window.last().map(|i| i.created_at).unwrap_or(0),
    }
}
