//! Built-in fallback content for every feature.
//!
//! Content is declared as static data and assembled into
//! [`FallbackTable`]s on first use.

use std::sync::LazyLock;

use super::{FallbackTable, StateEntry, SubEmotionEntry};
use crate::types::Feature;

struct StateSpec {
    state: &'static str,
    default: &'static str,
    subs: &'static [SubSpec],
}

struct SubSpec {
    sub: &'static str,
    default: &'static str,
    categories: &'static [(&'static str, &'static str)],
}

const fn sub(sub: &'static str, default: &'static str) -> SubSpec {
    SubSpec {
        sub,
        default,
        categories: &[],
    }
}

fn build(default: &str, specs: &[StateSpec]) -> FallbackTable {
    specs.iter().fold(
        FallbackTable::new().default_response(default),
        |table, spec| {
            table.state(spec.state, |_| {
                spec.subs.iter().fold(
                    StateEntry::default().default_response(spec.default),
                    |state, s| {
                        state.sub_emotion(s.sub, |_| {
                            s.categories.iter().fold(
                                SubEmotionEntry::default().default_response(s.default),
                                |entry, (category, response)| entry.category(category, *response),
                            )
                        })
                    },
                )
            })
        },
    )
}

/// Caller-side default used when even a table default is missing.
pub const GENERIC_FALLBACK: &str =
    "Thank you for taking a moment to reflect. Whatever you're feeling right now is valid.";

// ============================================================================
// Reflection analysis
// ============================================================================

const ANALYSIS_DEFAULT: &str = "Taking time to put your thoughts into words is an act of care. \
Notice what stood out most as you wrote, and be gentle with whatever came up.";

const ANALYSIS: &[StateSpec] = &[
    StateSpec {
        state: "drained",
        default: "It sounds like your energy is running low. Feeling drained is often a sign that \
you've been giving more than you've been getting back.",
        subs: &[
            SubSpec {
                sub: "exhausted",
                default: "You sound deeply tired, in body and in spirit. Exhaustion like this is a \
signal, not a failing. Rest is a need, not something you have to earn.",
                categories: &[
                    ("career", "Work seems to be taking more than it gives right now. Your worth \
isn't measured by how much you can push through when you're this tired."),
                    ("relationships", "Caring for the people around you takes energy, and yours \
is running low. It's okay to let others care for you, too."),
                    ("health", "Your body may be asking for a slower pace. Listening to that \
request is part of looking after yourself."),
                ],
            },
            sub("numb", "Feeling numb can be the mind's way of protecting you when things have \
been too much for too long. There's no need to force a feeling before it's ready."),
            sub("burned out", "Burnout builds slowly, from pressure that never gets a chance to \
release. Naming it is the first step to making room for recovery."),
        ],
    },
    StateSpec {
        state: "anxious",
        default: "There's a lot of worry in what you wrote. Anxiety tends to pull us into the \
future; you're here, right now, and this moment is manageable.",
        subs: &[
            sub("worried", "Your mind is trying to protect you by anticipating what might go \
wrong. Some of those worries may deserve attention, and some may be asking to be set down."),
            sub("restless", "Restlessness often means there's energy looking for somewhere to go. \
A small physical action can give it a place to land."),
            sub("overwhelmed", "When everything feels urgent, nothing feels possible. It may help \
to pick the single smallest next step and let the rest wait."),
        ],
    },
    StateSpec {
        state: "sad",
        default: "There's sadness in your words. Letting yourself feel it, rather than pushing it \
away, is a quiet kind of strength.",
        subs: &[
            sub("lonely", "Loneliness is a signal of how much connection matters to you. Even one \
small reach toward someone can begin to ease it."),
            sub("grieving", "Grief is love with nowhere to go. There's no timeline you need to \
follow and no right way to carry it."),
            sub("disappointed", "Disappointment shows how much you hoped for. That hope is still \
yours, even if this outcome wasn't what you wanted."),
        ],
    },
    StateSpec {
        state: "frustrated",
        default: "Frustration often shows up when something you care about feels blocked. It can \
point you toward what matters most.",
        subs: &[
            sub("angry", "Anger can carry important information about a boundary that's been \
crossed. Noticing it without acting on it right away gives you choices."),
            sub("stuck", "Feeling stuck is uncomfortable, but it often comes right before a shift. \
Sometimes a different angle matters more than more effort."),
        ],
    },
    StateSpec {
        state: "hopeful",
        default: "There's a sense of possibility in what you wrote. Hold on to that feeling; it's \
worth building on.",
        subs: &[
            sub("motivated", "Your motivation is showing. Channel it into one concrete step while \
the energy is here."),
            sub("curious", "Curiosity is a wonderful place to grow from. Follow the questions that \
feel most alive to you."),
        ],
    },
    StateSpec {
        state: "calm",
        default: "You sound settled right now. Moments of calm are a good time to notice what \
helped you get here.",
        subs: &[
            sub("content", "Contentment is easy to overlook. Let yourself take it in fully."),
            sub("grateful", "Gratitude widens what we notice. What you appreciate today says a \
lot about what you value."),
        ],
    },
];

// ============================================================================
// Goal suggestion
// ============================================================================

const GOAL_DEFAULT: &str = "Choose one small, kind action you can take for yourself today.";

const GOALS: &[StateSpec] = &[
    StateSpec {
        state: "drained",
        default: "Protect one block of rest today, even if it's only fifteen minutes.",
        subs: &[
            SubSpec {
                sub: "exhausted",
                default: "Go to bed thirty minutes earlier tonight.",
                categories: &[
                    ("career", "Identify one task you can postpone or delegate this week."),
                    ("health", "Drink a glass of water and step outside for five minutes."),
                ],
            },
            sub("numb", "Do one gentle sensory thing today: a warm shower, a walk, a favorite song."),
            sub("burned out", "Say no to one new commitment this week."),
        ],
    },
    StateSpec {
        state: "anxious",
        default: "Take three slow breaths before starting your next task.",
        subs: &[
            sub("worried", "Write your worries down and circle the one you can act on today."),
            sub("overwhelmed", "List everything on your mind, then pick just one item for today."),
        ],
    },
    StateSpec {
        state: "sad",
        default: "Reach out to one person you trust, even with a short message.",
        subs: &[sub("lonely", "Send a message to someone you haven't talked to in a while.")],
    },
    StateSpec {
        state: "frustrated",
        default: "Move your body for ten minutes to release some of the tension.",
        subs: &[sub("stuck", "Try the problem from a completely different starting point.")],
    },
    StateSpec {
        state: "hopeful",
        default: "Write down one goal and the very first step toward it.",
        subs: &[],
    },
    StateSpec {
        state: "calm",
        default: "Note three things that helped you feel this way.",
        subs: &[],
    },
];

// ============================================================================
// Encouragement
// ============================================================================

const ENCOURAGEMENT_DEFAULT: &str = "You showed up for yourself today. That matters.";

const ENCOURAGEMENT: &[StateSpec] = &[
    StateSpec {
        state: "drained",
        default: "Even on low-energy days, you are enough exactly as you are.",
        subs: &[sub("exhausted", "Resting is not giving up. It's how you'll keep going.")],
    },
    StateSpec {
        state: "anxious",
        default: "You've made it through every hard moment so far. This one, too.",
        subs: &[],
    },
    StateSpec {
        state: "sad",
        default: "It's okay to not be okay. Your feelings deserve space.",
        subs: &[],
    },
    StateSpec {
        state: "frustrated",
        default: "Your frustration shows how much you care. That care is a strength.",
        subs: &[],
    },
    StateSpec {
        state: "hopeful",
        default: "Keep going. The momentum you're feeling is real.",
        subs: &[],
    },
    StateSpec {
        state: "calm",
        default: "Enjoy this steadiness. You helped create it.",
        subs: &[],
    },
];

// ============================================================================
// Mantras
// ============================================================================

const MANTRA_DEFAULT: &str = "I am doing the best I can, and that is enough.";

const MANTRAS: &[StateSpec] = &[
    StateSpec {
        state: "drained",
        default: "I give myself permission to rest.",
        subs: &[sub("exhausted", "Rest is productive. I deserve to recover.")],
    },
    StateSpec {
        state: "anxious",
        default: "I am safe in this moment. One breath at a time.",
        subs: &[sub("overwhelmed", "I only need to do the next small thing.")],
    },
    StateSpec {
        state: "sad",
        default: "My feelings are valid, and they will pass.",
        subs: &[],
    },
    StateSpec {
        state: "frustrated",
        default: "I can pause before I respond.",
        subs: &[],
    },
    StateSpec {
        state: "hopeful",
        default: "I am growing, one step at a time.",
        subs: &[],
    },
    StateSpec {
        state: "calm",
        default: "I welcome this peace.",
        subs: &[],
    },
];

// ============================================================================
// Focus lens
// ============================================================================

const FOCUS_LENS_DEFAULT: &str =
    "Focus on what is within your control today, and let the rest be for now.";

const FOCUS_LENSES: &[StateSpec] = &[
    StateSpec {
        state: "drained",
        default: "Look at today through the lens of restoration: what would refill you, even a little?",
        subs: &[],
    },
    StateSpec {
        state: "anxious",
        default: "Look at today through the lens of the present: what is actually in front of you right now?",
        subs: &[],
    },
    StateSpec {
        state: "sad",
        default: "Look at today through the lens of compassion: how would you treat a friend feeling this way?",
        subs: &[],
    },
    StateSpec {
        state: "frustrated",
        default: "Look at today through the lens of curiosity: what is this frustration trying to show you?",
        subs: &[],
    },
    StateSpec {
        state: "hopeful",
        default: "Look at today through the lens of possibility: what could you begin?",
        subs: &[],
    },
    StateSpec {
        state: "calm",
        default: "Look at today through the lens of appreciation: what is quietly going well?",
        subs: &[],
    },
];

// ============================================================================
// Counseling guidance
// ============================================================================

const GUIDANCE_DEFAULT: &str = "I'm here with you. Would you like to tell me more about what's \
on your mind? Sometimes putting it into words helps make it a little lighter.";

const GUIDANCE: &[StateSpec] = &[
    StateSpec {
        state: "drained",
        default: "It sounds like you've been running on empty. What is one thing that usually \
helps you recharge, even a little?",
        subs: &[],
    },
    StateSpec {
        state: "anxious",
        default: "Let's slow down together. Try breathing in for four counts and out for six. \
What feels most pressing right now?",
        subs: &[],
    },
    StateSpec {
        state: "sad",
        default: "I'm sorry you're feeling this way. You don't have to fix it right now. What \
would feel supportive in this moment?",
        subs: &[],
    },
    StateSpec {
        state: "frustrated",
        default: "That sounds really frustrating. What part of this feels most out of your hands?",
        subs: &[],
    },
];

static ANALYSIS_TABLE: LazyLock<FallbackTable> =
    LazyLock::new(|| build(ANALYSIS_DEFAULT, ANALYSIS));
static GOAL_TABLE: LazyLock<FallbackTable> = LazyLock::new(|| build(GOAL_DEFAULT, GOALS));
static ENCOURAGEMENT_TABLE: LazyLock<FallbackTable> =
    LazyLock::new(|| build(ENCOURAGEMENT_DEFAULT, ENCOURAGEMENT));
static MANTRA_TABLE: LazyLock<FallbackTable> = LazyLock::new(|| build(MANTRA_DEFAULT, MANTRAS));
static FOCUS_LENS_TABLE: LazyLock<FallbackTable> =
    LazyLock::new(|| build(FOCUS_LENS_DEFAULT, FOCUS_LENSES));
static GUIDANCE_TABLE: LazyLock<FallbackTable> =
    LazyLock::new(|| build(GUIDANCE_DEFAULT, GUIDANCE));

/// Built-in table for a feature.
pub fn table(feature: Feature) -> &'static FallbackTable {
    match feature {
        Feature::AnalyzeReflection => &*ANALYSIS_TABLE,
        Feature::SuggestGoal => &*GOAL_TABLE,
        Feature::GenerateEncouragement => &*ENCOURAGEMENT_TABLE,
        Feature::GenerateMantra => &*MANTRA_TABLE,
        Feature::GenerateFocusLens => &*FOCUS_LENS_TABLE,
        Feature::CounselingGuidance => &*GUIDANCE_TABLE,
    }
}
