use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOutcome {
    pub filtered_text: String,
    /// Informational only; no blocking policy is applied beyond the
    /// substitution itself.
    pub flagged: bool,
}

/// External profanity-filter collaborator. Total: implementations must hand
/// back best-effort text instead of failing the caller, falling back to the
/// original input on internal error.
#[async_trait]
pub trait TextFilter: Send + Sync {
    async fn filter_text(&self, text: &str) -> FilterOutcome;
}

const DEFAULT_WORD_LIST: &[&str] = &[
    "damn", "hell", "crap", "shit", "fuck", "ass", "bitch", "bastard",
];

/// Word-list filter replacing each profane word with asterisks of the same
/// length. Matching is case-insensitive and whole-word, so "class" stays
/// untouched.
pub struct WordListFilter {
    words: Vec<String>,
}

impl WordListFilter {
    pub fn new() -> Self {
        Self::with_words(DEFAULT_WORD_LIST.iter().map(|word| word.to_string()))
    }

    pub fn with_words(words: impl IntoIterator<Item = String>) -> Self {
        WordListFilter {
            words: words
                .into_iter()
                .map(|word| word.to_lowercase())
                .collect(),
        }
    }

    fn mask(&self, text: &str) -> (String, bool) {
        let mut filtered = String::with_capacity(text.len());
        let mut flagged = false;
        let mut word = String::new();

        let flush = |word: &mut String, filtered: &mut String, flagged: &mut bool, words: &[String]| {
            if !word.is_empty() {
                if words.iter().any(|candidate| *candidate == word.to_lowercase()) {
                    filtered.push_str(&"*".repeat(word.chars().count()));
                    *flagged = true;
                } else {
                    filtered.push_str(word);
                }
                word.clear();
            }
        };

        for character in text.chars() {
            if character.is_alphabetic() {
                word.push(character);
            } else {
                flush(&mut word, &mut filtered, &mut flagged, &self.words);
                filtered.push(character);
            }
        }
        flush(&mut word, &mut filtered, &mut flagged, &self.words);

        (filtered, flagged)
    }
}

impl Default for WordListFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextFilter for WordListFilter {
    async fn filter_text(&self, text: &str) -> FilterOutcome {
        let (filtered_text, flagged) = self.mask(text);
        FilterOutcome {
            filtered_text,
            flagged,
        }
    }
}
