//! Word valences used by the scorer.
//!
//! Each entry is `(word, polarity, subjectivity)`.

pub(super) const WORDS: &[(&str, f64, f64)] = &[
    // positive
    ("good", 0.7, 0.6),
    ("great", 0.8, 0.75),
    ("excellent", 1.0, 1.0),
    ("amazing", 0.6, 0.9),
    ("awesome", 1.0, 1.0),
    ("love", 0.5, 0.6),
    ("like", 0.3, 0.4),
    ("excited", 0.4, 0.75),
    ("bullish", 0.8, 0.8),
    ("moon", 0.5, 0.7),
    ("pump", 0.3, 0.6),
    ("secure", 0.4, 0.4),
    ("safe", 0.5, 0.5),
    ("audited", 0.4, 0.2),
    ("improvement", 0.5, 0.4),
    ("improve", 0.4, 0.4),
    ("upgrade", 0.2, 0.2),
    ("efficient", 0.5, 0.5),
    ("solid", 0.4, 0.5),
    ("strong", 0.4, 0.7),
    ("success", 0.6, 0.5),
    ("successful", 0.7, 0.6),
    ("approve", 0.3, 0.3),
    ("support", 0.3, 0.3),
    ("win", 0.7, 0.4),
    ("gain", 0.4, 0.3),
    ("gains", 0.4, 0.3),
    ("profit", 0.4, 0.3),
    ("optimistic", 0.6, 0.8),
    // negative
    ("bad", -0.7, 0.67),
    ("terrible", -1.0, 1.0),
    ("awful", -1.0, 1.0),
    ("hate", -0.8, 0.9),
    ("worried", -0.5, 0.7),
    ("concerned", -0.4, 0.6),
    ("concern", -0.3, 0.5),
    ("fear", -0.6, 0.7),
    ("fud", -0.5, 0.7),
    ("bearish", -0.8, 0.8),
    ("dump", -0.6, 0.6),
    ("crash", -0.8, 0.6),
    ("scam", -1.0, 0.9),
    ("rug", -0.9, 0.8),
    ("rugpull", -1.0, 0.9),
    ("hack", -0.9, 0.5),
    ("hacked", -1.0, 0.5),
    ("exploit", -0.9, 0.5),
    ("exploited", -1.0, 0.5),
    ("vulnerability", -0.7, 0.4),
    ("vulnerable", -0.7, 0.5),
    ("bug", -0.5, 0.4),
    ("risky", -0.5, 0.7),
    ("risk", -0.3, 0.4),
    ("unsafe", -0.7, 0.6),
    ("broken", -0.6, 0.5),
    ("fail", -0.6, 0.4),
    ("failed", -0.6, 0.4),
    ("loss", -0.5, 0.3),
    ("losses", -0.5, 0.3),
    ("reject", -0.4, 0.3),
    ("drain", -0.7, 0.5),
    ("drained", -0.9, 0.5),
    ("panic", -0.7, 0.8),
    ("pessimistic", -0.6, 0.8),
];

/// Scale the next valence word.
pub(super) const INTENSIFIERS: &[(&str, f64)] = &[
    ("very", 1.3),
    ("really", 1.3),
    ("extremely", 1.5),
    ("super", 1.4),
    ("highly", 1.3),
    ("so", 1.2),
    ("slightly", 0.6),
    ("somewhat", 0.7),
];

/// Flip valence words within the next few tokens.
pub(super) const NEGATIONS: &[&str] = &[
    "not", "no", "never", "none", "nothing", "neither", "nor", "without", "dont", "don't",
    "isnt", "isn't", "wasnt", "wasn't", "cant", "can't", "wont", "won't", "aint", "ain't",
];

pub(super) fn valence(word: &str) -> Option<(f64, f64)> {
    WORDS
        .iter()
        .find(|(w, _, _)| *w == word)
        .map(|(_, p, s)| (*p, *s))
}

pub(super) fn intensity(word: &str) -> Option<f64> {
    INTENSIFIERS
        .iter()
        .find(|(w, _)| *w == word)
        .map(|(_, m)| *m)
}

pub(super) fn is_negation(word: &str) -> bool {
    NEGATIONS.contains(&word)
}
