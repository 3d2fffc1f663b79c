//! English (`en`) pattern libraries. Pure data; compiled into a `RuleSet`.
//!
//! Rule order inside each table is significant: it is the tie-break order for
//! emotion ranking and the order tags appear in `MessageSignals`.

use std::collections::HashSet;

use solace_core::{
    CognitiveDistortion as D, Concern as C, CoreValue as V, CrisisSeverity, DefenseMechanism as M,
    Emotion as E, EventImpact, GoalCategory as G, LifeEventType as L, MotivationTrigger as T,
    Need as N, RelationType as R, RiskFlag as F, WellnessIndicator as W,
};

use crate::rules::{
    GoalMatcher, KeywordMatcher, PatternRule, RelationMatcher, RuleError, RuleSet,
};

pub const RULESET_VERSION: &str = "en-2024.1";

const EMOTIONS: &[(E, &[&str])] = &[
    (E::Joy, &["happy", "glad", "great", "wonderful", "amazing", "awesome", "fantastic", "joy", "joyful", "delighted", "thrilled", "excited", "fun", "cheerful", "good day"]),
    (E::Sadness, &["sad", "down", "unhappy", "heartbroken", "crying", "cried", "tears", "miserable", "depressed", "grief", "grieving", "blue"]),
    (E::Anger, &["angry", "mad", "furious", "pissed", "rage", "livid", "resent", "resentful", "hate"]),
    (E::Fear, &["afraid", "scared", "terrified", "frightened", "fear", "dread"]),
    (E::Anxiety, &["anxious", "worried", "worry", "nervous", "panic", "panicking", "on edge", "uneasy", "stressed"]),
    (E::Shame, &["ashamed", "embarrassed", "humiliated", "shame", "pathetic"]),
    (E::Guilt, &["guilty", "my fault", "regret", "sorry for", "shouldn't have"]),
    (E::Loneliness, &["lonely", "alone", "isolated", "no one to talk to", "left out"]),
    (E::Love, &["love", "adore", "cherish", "in love"]),
    (E::Gratitude, &["grateful", "thankful", "appreciate", "blessed", "thanks"]),
    (E::Hope, &["hopeful", "looking forward", "optimistic", "can't wait", "hope"]),
    (E::Frustration, &["frustrated", "annoyed", "irritated", "fed up", "sick of", "stuck"]),
    (E::Overwhelm, &["overwhelmed", "too much", "drowning", "swamped", "can't keep up"]),
];

const NEEDS: &[(N, &[&str])] = &[
    (N::Validation, &["am i wrong", "is it normal", "does that make sense", "was i right", "am i crazy", "tell me i'm"]),
    (N::Reassurance, &["will it be okay", "is it going to be okay", "what if they leave", "do they still", "need to know"]),
    (N::Connection, &["miss", "want someone", "need someone", "feel disconnected", "want to be close"]),
    (N::Autonomy, &["my own decision", "my choice", "control my life", "need space", "let me decide", "on my own terms"]),
    (N::Safety, &["feel safe", "not safe", "unsafe", "protect", "secure"]),
    (N::Rest, &["need a break", "need rest", "need sleep", "burned out", "burnt out", "exhausted"]),
    (N::Recognition, &["nobody notices", "no one notices", "unappreciated", "taken for granted", "credit"]),
    (N::Understanding, &["nobody understands", "no one understands", "don't get it", "misunderstood", "hear me"]),
    (N::Purpose, &["what's the point", "meaning", "purpose", "why bother", "matters"]),
];

const DEFENSES: &[(M, &[&str])] = &[
    (M::Denial, &["i'm fine", "i am fine", "it's nothing", "not a problem", "doesn't bother me"]),
    (M::Minimization, &["not a big deal", "no big deal", "could be worse", "it's only", "whatever"]),
    (M::Intellectualization, &["objectively", "statistically", "logically speaking", "in theory", "rationally"]),
    (M::Projection, &["they're the one who", "everyone else is", "they always", "it's them"]),
    (M::Rationalization, &["had to", "had no choice", "anyone would have", "it was only because"]),
    (M::Avoidance, &["don't want to talk", "rather not", "change the subject", "avoid", "avoiding", "put it off", "ignore it"]),
    (M::Humor, &["lol", "haha", "joking", "just kidding", "lmao"]),
    (M::Displacement, &["took it out on", "snapped at", "yelled at"]),
];

const DISTORTIONS: &[(D, &[&str])] = &[
    (D::Catastrophizing, &["worst case", "disaster", "ruined", "everything will fall apart", "the end of the world", "catastrophe", "never recover"]),
    (D::AllOrNothing, &["complete failure", "total failure", "perfect or", "either perfect", "all or nothing", "completely useless"]),
    (D::Overgeneralization, &["always", "never", "every time", "nothing ever", "everyone"]),
    (D::MindReading, &["they think i", "he thinks i", "she thinks i", "they must think", "everyone thinks"]),
    (D::FortuneTelling, &["it will never", "going to fail", "won't work out", "bound to", "i just know it"]),
    (D::ShouldStatements, &["should", "shouldn't", "must", "have to be", "ought to"]),
    (D::Personalization, &["my fault", "because of me", "i caused", "blame myself"]),
    (D::Labeling, &["i'm an idiot", "i'm a failure", "i'm stupid", "i'm useless", "i'm a loser", "i'm worthless"]),
    (D::EmotionalReasoning, &["i feel like a failure", "feel stupid so", "i feel it so it", "feels true"]),
    (D::DisqualifyingPositive, &["doesn't count", "just luck", "anyone could have", "only because they"]),
];

const VALUES: &[(V, &[&str])] = &[
    (V::Family, &["family", "my kids", "my children", "my parents", "home"]),
    (V::Achievement, &["succeed", "success", "achieve", "accomplish", "promotion", "career"]),
    (V::Honesty, &["honest", "honesty", "truth", "integrity", "transparent"]),
    (V::Freedom, &["freedom", "independent", "independence", "free to"]),
    (V::Security, &["stability", "stable", "security", "savings", "safe"]),
    (V::Growth, &["grow", "growth", "learn", "improve", "better person"]),
    (V::Faith, &["faith", "god", "pray", "prayer", "church", "spiritual"]),
    (V::Health, &["healthy", "health", "fitness", "wellbeing", "well-being"]),
    (V::Creativity, &["create", "creative", "art", "music", "write", "writing"]),
    (V::Connection, &["friendship", "community", "belong", "together"]),
    (V::Service, &["help others", "volunteer", "give back", "make a difference"]),
];

const CONCERNS: &[(C, &[&str])] = &[
    (C::Work, &["work", "job", "boss", "deadline", "office", "career"]),
    (C::Money, &["money", "bills", "rent", "debt", "afford", "broke"]),
    (C::Health, &["sick", "pain", "doctor", "diagnosis", "illness", "symptoms"]),
    (C::Relationship, &["relationship", "breakup", "argument", "fight", "dating"]),
    (C::Family, &["family", "parents", "kids", "mom", "dad"]),
    (C::Sleep, &["can't sleep", "insomnia", "nightmares", "awake all night", "sleep"]),
    (C::Isolation, &["lonely", "alone", "no friends", "isolated"]),
    (C::Future, &["future", "what's next", "uncertain", "uncertainty"]),
    (C::SelfWorth, &["not good enough", "worthless", "failure", "hate myself", "useless"]),
];

const RISKS: &[(F, &[&str])] = &[
    (F::SuicidalIdeation, &["kill myself", "suicide", "suicidal", "end my life", "want to die", "better off dead", "no reason to live", "take my own life"]),
    (F::SelfHarm, &["cut myself", "cutting", "hurt myself", "self harm", "self-harm", "burn myself"]),
    (F::Hopelessness, &["hopeless", "no way out", "nothing matters", "no future", "pointless"]),
    (F::SubstanceUse, &["drinking too much", "drunk again", "relapse", "relapsed", "using again", "pills"]),
    (F::Abuse, &["hits me", "abused", "abusive", "threatens me", "hurts me"]),
    (F::DisorderedEating, &["binge", "purge", "starving myself", "stopped eating", "throw up after eating"]),
    (F::Isolation, &["no one to talk to", "completely alone", "nobody cares", "no one cares"]),
];

const WELLNESS: &[(W, &[&str])] = &[
    (W::Exercise, &["workout", "worked out", "gym", "run", "ran", "walk", "yoga", "exercise"]),
    (W::Sleep, &["slept well", "good sleep", "rested", "early night"]),
    (W::Mindfulness, &["meditate", "meditated", "meditation", "breathing", "mindful"]),
    (W::SocialConnection, &["hung out", "caught up with", "called my", "saw my friends", "dinner with"]),
    (W::Gratitude, &["grateful", "thankful", "gratitude"]),
    (W::Nutrition, &["ate well", "cooked", "healthy meal", "salad"]),
    (W::Therapy, &["therapist", "therapy", "counselor", "counseling"]),
    (W::Journaling, &["journal", "journaled", "journaling", "wrote down"]),
];

const LIFE_EVENTS: &[(L, EventImpact, &[&str])] = &[
    (L::JobLoss, EventImpact::Negative, &["lost my job", "got fired", "laid off", "was fired", "let go from"]),
    (L::NewJob, EventImpact::Positive, &["new job", "got the job", "got hired", "started working at", "job offer"]),
    (L::Breakup, EventImpact::Negative, &["broke up", "breakup", "dumped me", "ended things"]),
    (L::Divorce, EventImpact::Negative, &["divorce", "divorced", "separated", "separation"]),
    (L::Marriage, EventImpact::Positive, &["got married", "getting married", "engaged", "wedding"]),
    (L::Bereavement, EventImpact::Negative, &["passed away", "died", "funeral", "lost my mom", "lost my dad", "death of"]),
    (L::Birth, EventImpact::Positive, &["had a baby", "pregnant", "newborn", "gave birth"]),
    (L::Relocation, EventImpact::Mixed, &["moving to", "moved to", "relocating", "new city", "moved out"]),
    (L::Graduation, EventImpact::Positive, &["graduated", "graduation", "finished school"]),
    (L::Illness, EventImpact::Negative, &["diagnosed", "diagnosis", "in the hospital", "surgery", "cancer"]),
    (L::Retirement, EventImpact::Mixed, &["retired", "retiring", "retirement"]),
];

const MOTIVATORS: &[(T, &[&str])] = &[
    (T::Recognition, &["recognized", "prove", "respect", "impress"]),
    (T::Autonomy, &["on my own", "be my own boss", "independent", "my own way"]),
    (T::Mastery, &["get better at", "master", "improve", "skill"]),
    (T::Purpose, &["make a difference", "meaningful", "purpose", "matter"]),
    (T::Belonging, &["for my family", "for my kids", "together", "be there for"]),
    (T::Security, &["stable", "save money", "security", "pay off"]),
];

const GOAL_CATEGORIES: &[(G, &[&str])] = &[
    (G::Career, &["job", "career", "promotion", "work", "business", "boss"]),
    (G::Health, &["lose weight", "exercise", "run", "marathon", "gym", "eat", "sleep", "drink less", "quit smoking", "healthy"]),
    (G::Relationships, &["relationship", "partner", "wife", "husband", "friends", "date", "family", "reconnect"]),
    (G::Financial, &["money", "save", "debt", "budget", "pay off", "afford"]),
    (G::Education, &["degree", "study", "school", "college", "learn", "course", "exam", "thesis"]),
    (G::Emotional, &["calm", "less anxious", "stop worrying", "feel better", "happier", "confidence", "self esteem"]),
];

const RELATIONS: &[(R, &[&str])] = &[
    (R::Spouse, &["wife", "husband", "spouse"]),
    (R::Partner, &["partner", "boyfriend", "girlfriend", "fiance", "fiancee"]),
    (R::Parent, &["mom", "mother", "dad", "father", "mum", "stepmom", "stepdad"]),
    (R::Child, &["son", "daughter", "kid", "child", "baby"]),
    (R::Sibling, &["brother", "sister", "sibling"]),
    (R::Friend, &["friend", "best friend", "roommate", "buddy"]),
    (R::Coworker, &["coworker", "colleague", "co-worker", "teammate"]),
    (R::Manager, &["boss", "manager", "supervisor"]),
    (R::Ex, &["ex", "ex-wife", "ex-husband", "ex-boyfriend", "ex-girlfriend"]),
    (R::Therapist, &["therapist", "counselor", "psychiatrist"]),
    (R::Relative, &["aunt", "uncle", "cousin", "grandma", "grandmother", "grandpa", "grandfather", "niece", "nephew"]),
];

const CRISIS_TIERS: &[(CrisisSeverity, &[&str])] = &[
    (CrisisSeverity::Critical, &[
        "kill myself", "killing myself", "suicide", "suicidal", "end my life", "ending my life",
        "take my own life", "want to die", "wanna die", "better off dead", "no reason to live",
        "cut myself", "cutting", "hurt myself", "self harm", "self-harm", "overdose",
        "hang myself", "don't want to be alive",
    ]),
    (CrisisSeverity::High, &[
        "hopeless", "no way out", "can't go on", "cannot go on", "give up on life", "worthless",
        "hate myself", "burden to everyone", "nobody would miss me", "no one would miss me",
        "can't take it anymore", "nothing matters anymore", "trapped",
    ]),
    (CrisisSeverity::Moderate, &[
        "depressed", "depression", "panic attack", "can't cope", "falling apart", "breaking down",
        "can't stop crying", "so alone", "abused", "abusive", "numb", "drinking too much",
    ]),
    (CrisisSeverity::Low, &[
        "stressed", "anxious", "overwhelmed", "sad", "lonely", "exhausted", "upset", "struggling",
        "mad", "down",
    ]),
];

const INTENSITY_MARKERS: &[&str] = &[
    "very", "really", "so", "extremely", "incredibly", "totally", "completely", "absolutely",
    "utterly", "super", "deeply",
];

const HEDGES: &[&str] = &[
    "maybe", "perhaps", "i guess", "i wonder", "i suppose", "kind of", "sort of", "not sure",
    "i've been thinking", "looking back", "reflecting",
];

const ANALYTIC_MARKERS: &[&str] = &[
    "because", "therefore", "logically", "analyze", "the reason", "in theory", "pros and cons",
    "evidence", "it makes sense", "data", "objectively",
];

const FEELING_MARKERS: &[&str] = &["i feel", "i felt", "feeling", "my heart", "emotional", "emotionally"];

const LOW_ENERGY: &[&str] = &[
    "tired", "exhausted", "drained", "no energy", "sluggish", "burned out", "burnt out",
    "can't get out of bed", "wiped out",
];

const HIGH_ENERGY: &[&str] = &["energized", "pumped", "motivated", "buzzing", "full of energy", "excited"];

const ONGOING_MARKERS: &[&str] = &["going through", "still", "dealing with", "ever since", "currently", "these days"];

const GOAL_INTENTS: &[&str] = &[
    "i want to", "i'd like to", "i would like to", "my goal is to", "i'm trying to",
    "i am trying to", "i hope to", "i plan to", "i'm going to start", "i need to start",
];

const GOAL_PROGRESS_VERBS: &[&str] = &[
    "finished", "completed", "achieved", "accomplished", "reached", "gave up on", "quit",
    "stopped trying to", "abandoned",
];

/// Words that can follow a relation word without being a name.
const NAME_STOPLIST: &[&str] = &[
    "a", "about", "after", "again", "all", "also", "always", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "but", "by", "called", "came",
    "can", "can't", "could", "did", "didn't", "does", "doesn't", "doing", "don't", "done",
    "down", "even", "ever", "feels", "finally", "for", "from", "gave", "gets", "got", "had",
    "has", "hasn't", "have", "he", "her", "here", "him", "his", "how", "i", "i'm", "if",
    "in", "into", "is", "isn't", "it", "it's", "just", "keeps", "kind", "knows", "left",
    "likes", "loves", "made", "makes", "may", "me", "might", "more", "my", "never", "no",
    "not", "now", "of", "off", "often", "on", "once", "only", "or", "our", "out", "over",
    "really", "said", "says", "seems", "she", "should", "so", "still", "that", "the", "their",
    "them", "then", "there", "they", "thinks", "this", "to", "today", "told", "tomorrow",
    "tonight", "too", "tired", "up", "us", "used", "very", "wants", "was", "wasn't", "we",
    "went", "were", "what", "when", "where", "which", "who", "why", "will", "with", "won't",
    "would", "yesterday", "you", "angry", "sad", "happy", "upset", "sick", "busy", "home",
    "back", "away", "again", "both", "lately", "recently", "asked", "thought",
];

fn compile<T: Copy + std::fmt::Display>(table: &[(T, &[&str])]) -> Result<Vec<PatternRule<T>>, RuleError> {
    table
        .iter()
        .map(|(tag, keywords)| PatternRule::new(*tag, keywords))
        .collect()
}

fn matcher(name: &str, keywords: &[&str]) -> Result<KeywordMatcher, RuleError> {
    KeywordMatcher::new(keywords).map_err(|source| RuleError::InvalidPattern {
        rule: name.to_string(),
        source,
    })
}

/// Default impact of a life event type.
pub fn life_event_impact(event: L) -> EventImpact {
    LIFE_EVENTS
        .iter()
        .find(|(t, _, _)| *t == event)
        .map(|(_, impact, _)| *impact)
        .unwrap_or(EventImpact::Mixed)
}

impl RuleSet {
    /// The built-in English rule registry.
    pub fn english() -> Result<Self, RuleError> {
        let relations = compile(RELATIONS)?;
        let relation_matcher = RelationMatcher::new(&relations)?;
        let life_events = LIFE_EVENTS
            .iter()
            .map(|(tag, _, keywords)| PatternRule::new(*tag, keywords))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            version: RULESET_VERSION,
            locale: "en",
            emotions: compile(EMOTIONS)?,
            needs: compile(NEEDS)?,
            defenses: compile(DEFENSES)?,
            distortions: compile(DISTORTIONS)?,
            values: compile(VALUES)?,
            concerns: compile(CONCERNS)?,
            risks: compile(RISKS)?,
            wellness: compile(WELLNESS)?,
            life_events,
            motivators: compile(MOTIVATORS)?,
            goal_categories: compile(GOAL_CATEGORIES)?,
            relations,
            crisis_tiers: compile(CRISIS_TIERS)?,
            intensity_markers: matcher("intensity", INTENSITY_MARKERS)?,
            hedges: matcher("hedges", HEDGES)?,
            analytic_markers: matcher("analytic", ANALYTIC_MARKERS)?,
            feeling_markers: matcher("feeling", FEELING_MARKERS)?,
            low_energy: matcher("low_energy", LOW_ENERGY)?,
            high_energy: matcher("high_energy", HIGH_ENERGY)?,
            ongoing_markers: matcher("ongoing", ONGOING_MARKERS)?,
            relation_matcher,
            goal_matcher: GoalMatcher::new(GOAL_INTENTS, GOAL_PROGRESS_VERBS)?,
            name_stoplist: NAME_STOPLIST.iter().map(|w| w.to_string()).collect::<HashSet<_>>(),
        })
    }
}
