//! The ten Kessler Psychological Distress Scale (K10) items and their question text

/// A single K10 scale item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Item {
    /// Canonical column identifier after name normalization
    pub id: &'static str,
    /// Human-readable question text
    pub question: &'static str,
}

/// Number of items on the scale
pub const N_ITEMS: usize = 10;

/// Lowest ordinal response ("none of the time")
pub const MIN_SCORE: u8 = 1;

/// Highest ordinal response ("all of the time")
pub const MAX_SCORE: u8 = 5;

/// Items in original scale order
pub const ITEMS: [Item; N_ITEMS] = [
    Item {
        id: "k10_1",
        question: "About how often did you feel tired out for no good reason?",
    },
    Item {
        id: "k10_2",
        question: "About how often did you feel nervous?",
    },
    Item {
        id: "k10_3",
        question: "About how often did you feel so nervous that nothing could calm you down?",
    },
    Item {
        id: "k10_4",
        question: "About how often did you feel hopeless?",
    },
    Item {
        id: "k10_5",
        question: "About how often did you feel restless or fidgety?",
    },
    Item {
        id: "k10_6",
        question: "About how often did you feel so restless you could not sit still?",
    },
    Item {
        id: "k10_7",
        question: "About how often did you feel depressed?",
    },
    Item {
        id: "k10_8",
        question: "About how often did you feel that everything was an effort?",
    },
    Item {
        id: "k10_9",
        question: "About how often did you feel so sad that nothing could cheer you up?",
    },
    Item {
        id: "k10_10",
        question: "About how often did you feel worthless?",
    },
];

/// Labels for the five response options, indexed by `score - 1`
pub const SCORE_LABELS: [&str; 5] = [
    "None of the time",
    "A little of the time",
    "Some of the time",
    "Most of the time",
    "All of the time",
];

/// Question text for an identifier, if it names a K10 item
pub fn question_for(id: &str) -> Option<&'static str> {
    ITEMS.iter().find(|item| item.id == id).map(|item| item.question)
}
