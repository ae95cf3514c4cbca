//! Proper-noun processor
//!
//! Capitalization-run heuristic for character and place names: runs of
//! capitalized words away from sentence starts, honorific-prefixed names,
//! and "the <Name>" place references. No model to load; initialization is
//! a no-op.

use crate::ProcessorAdapter;
use limn_core::{RawEntity, Result, Span};

/// Honorifics that promote the following capitalized word to a name
const HONORIFICS: &[&str] = &[
    "lady", "lord", "sir", "mr", "mrs", "miss", "captain", "doctor", "father", "sister",
];

/// Capitalized words that are never names on their own
const STOPWORDS: &[&str] = &[
    "the", "a", "an", "i", "it", "he", "she", "they", "we", "you", "but", "and", "then", "when",
    "his", "her", "their", "there", "that", "this",
];

/// One tokenized word with character offsets
#[derive(Debug, Clone)]
struct Token {
    start: usize,
    end: usize,
    text: String,
    /// A sentence boundary (. ! ? or start of text) precedes this token
    sentence_start: bool,
}

/// Capitalization-based name extractor
pub struct ProperNounProcessor;

impl ProperNounProcessor {
    pub fn new() -> Self {
        Self
    }

    fn tokenize(text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut current: Option<(usize, String)> = None;
        let mut boundary = true;

        for (idx, c) in text.chars().enumerate() {
            if c.is_alphanumeric() || c == '\'' {
                match current.as_mut() {
                    Some((_, word)) => word.push(c),
                    None => current = Some((idx, String::from(c))),
                }
            } else {
                if let Some((start, word)) = current.take() {
                    let end = start + word.chars().count();
                    tokens.push(Token {
                        start,
                        end,
                        text: word,
                        sentence_start: boundary,
                    });
                    boundary = false;
                }
                if matches!(c, '.' | '!' | '?' | '\n' | '"') {
                    boundary = true;
                }
            }
        }
        if let Some((start, word)) = current.take() {
            let end = start + word.chars().count();
            tokens.push(Token {
                start,
                end,
                text: word,
                sentence_start: boundary,
            });
        }
        tokens
    }

    fn is_capitalized(word: &str) -> bool {
        let mut chars = word.chars();
        match chars.next() {
            Some(first) if first.is_uppercase() => chars.all(|c| c.is_lowercase() || c == '\''),
            _ => false,
        }
    }

    fn is_stopword(word: &str) -> bool {
        STOPWORDS.contains(&word.to_lowercase().as_str())
    }

    fn is_honorific(word: &str) -> bool {
        HONORIFICS.contains(&word.to_lowercase().as_str())
    }
}

impl Default for ProperNounProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ProcessorAdapter for ProperNounProcessor {
    fn id(&self) -> &str {
        "proper_noun"
    }

    async fn extract(&self, text: &str, _language_hint: Option<&str>) -> Result<Vec<RawEntity>> {
        let tokens = Self::tokenize(text);
        let mut entities = Vec::new();
        let mut i = 0;

        while i < tokens.len() {
            let token = &tokens[i];

            // Honorific + capitalized word(s): strongest name signal
            if Self::is_honorific(&token.text)
                && Self::is_capitalized(&token.text)
                && i + 1 < tokens.len()
                && Self::is_capitalized(&tokens[i + 1].text)
                && !Self::is_stopword(&tokens[i + 1].text)
            {
                let mut j = i + 1;
                while j + 1 < tokens.len()
                    && Self::is_capitalized(&tokens[j + 1].text)
                    && !Self::is_stopword(&tokens[j + 1].text)
                {
                    j += 1;
                }
                let span = Span::new(token.start, tokens[j].end);
                entities.push(RawEntity::new(
                    span,
                    &text_slice(text, span),
                    "PERSON_NAME",
                    0.9,
                    self.id(),
                ));
                i = j + 1;
                continue;
            }

            // "the <Name>": a capitalized word after a lowercase article
            // reads as a named place ("the Blackwood")
            if token.text == "the"
                && i + 1 < tokens.len()
                && Self::is_capitalized(&tokens[i + 1].text)
                && !Self::is_stopword(&tokens[i + 1].text)
            {
                let span = Span::new(token.start, tokens[i + 1].end);
                entities.push(RawEntity::new(
                    span,
                    &text_slice(text, span),
                    "PLACE_NAME",
                    0.65,
                    self.id(),
                ));
                i += 2;
                continue;
            }

            if Self::is_capitalized(&token.text) && !Self::is_stopword(&token.text) {
                // Extend over a run of capitalized words
                let mut j = i;
                while j + 1 < tokens.len()
                    && Self::is_capitalized(&tokens[j + 1].text)
                    && !Self::is_stopword(&tokens[j + 1].text)
                {
                    j += 1;
                }

                if j > i {
                    let span = Span::new(token.start, tokens[j].end);
                    entities.push(RawEntity::new(
                        span,
                        &text_slice(text, span),
                        "PERSON_NAME",
                        0.85,
                        self.id(),
                    ));
                    i = j + 1;
                    continue;
                }

                // Lone capitalized word counts only away from sentence
                // starts, where capitalization is informative
                if !token.sentence_start {
                    let span = Span::new(token.start, token.end);
                    entities.push(RawEntity::new(
                        span,
                        &text_slice(text, span),
                        "PERSON_NAME",
                        0.6,
                        self.id(),
                    ));
                }
            }

            i += 1;
        }

        Ok(entities)
    }
}

/// Slice `text` by character offsets
fn text_slice(text: &str, span: Span) -> String {
    text.chars().skip(span.start).take(span.len()).collect()
}
