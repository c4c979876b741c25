use crate::index::CorpusIndex;
use crate::message::MessageRecord;
use crate::normalize::{normalize, surface_forms};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Score bonus per notable reaction symbol. Each distinct symbol present on
/// a message adds its weight to that message's multiplier; unlisted symbols
/// contribute nothing.
const REACTION_WEIGHTS: &[(&str, f64)] = &[
    ("🔥", 1.0),
    ("⭐", 1.0),
    ("💯", 1.0),
    ("👍", 0.5),
    ("❤️", 0.5),
];

fn reaction_multiplier(msg: &MessageRecord) -> f64 {
    let mut multiplier = 1.0;
    for (symbol, weight) in REACTION_WEIGHTS {
        if msg.reactions.get(*symbol).copied().unwrap_or(0) > 0 {
            multiplier += weight;
        }
    }
    multiplier
}

/// TF-IDF scores for one batch of messages, retaining the messages so top
/// words can be re-surfaced into human-readable forms. Ephemeral; never
/// persisted.
#[derive(Debug, Clone, Serialize)]
pub struct TfIdf {
    values: HashMap<String, f64>,
    #[serde(skip)]
    messages: Vec<MessageRecord>,
}

/// Computes TF-IDF scores for `messages` in order. The per-word raw counts
/// accumulate across the batch and every message re-adds the accumulated
/// counts scaled by its own reaction multiplier, so words introduced early
/// and repeated throughout a thread gain extra weight whenever a later
/// message carries strong-signal reactions. The final totals are weighted
/// by corpus IDF.
pub(crate) fn score(index: &CorpusIndex, messages: &[MessageRecord]) -> TfIdf {
    let mut accumulator: HashMap<String, u64> = HashMap::new();
    let mut totals: HashMap<String, f64> = HashMap::new();

    for msg in messages {
        let multiplier = reaction_multiplier(msg);
        for word in normalize(&msg.content) {
            *accumulator.entry(word).or_insert(0) += 1;
        }
        for (word, count) in &accumulator {
            *totals.entry(word.clone()).or_insert(0.0) += *count as f64 * multiplier;
        }
    }

    if index.document_count() == 0 {
        // Degenerate corpus: IDF would be -inf across the board. An all-zero
        // result keeps callers working.
        for value in totals.values_mut() {
            *value = 0.0;
        }
    } else {
        index.with_idf(|view| {
            for (word, total) in totals.iter_mut() {
                *total *= view.idf(word);
            }
        });
    }

    TfIdf {
        values: totals,
        messages: messages.to_vec(),
    }
}

impl TfIdf {
    /// Score per normalized word.
    pub fn values(&self) -> &HashMap<String, f64> {
        &self.values
    }

    pub fn source_messages(&self) -> &[MessageRecord] {
        &self.messages
    }

    /// The top `count` stemmed words with their scores, highest first. Ties
    /// break by word order so the ranking is deterministic.
    pub fn ranked(&self, count: usize) -> Vec<(String, f64)> {
        let mut words: Vec<(String, f64)> = self
            .values
            .iter()
            .map(|(word, value)| (word.clone(), *value))
            .collect();
        words.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        words.truncate(count);
        words
    }

    /// The top `count` words, re-surfaced into the most common unstemmed
    /// form found in the source messages.
    pub fn top_words(&self, count: usize) -> Vec<String> {
        let ranked = self.ranked(count);
        self.resurface(ranked.iter().map(|(word, _)| word.as_str()))
    }

    /// Like [`top_words`](Self::top_words) but returns only a natural-length
    /// prefix: the ranking is cut at the single largest score drop between
    /// adjacent words, so a thread with two standout words yields two words
    /// rather than a fixed-size list. At least one word is returned when any
    /// scored words exist; the first drop wins ties.
    pub fn auto_top_words(&self, max_count: usize) -> Vec<String> {
        let ranked = self.ranked(max_count);
        if ranked.is_empty() {
            return Vec::new();
        }
        let mut cutoff = 1;
        let mut largest_drop = 0.0;
        for i in 1..ranked.len() {
            let drop = ranked[i - 1].1 - ranked[i].1;
            if drop > largest_drop {
                largest_drop = drop;
                cutoff = i;
            }
        }
        self.resurface(ranked[..cutoff].iter().map(|(word, _)| word.as_str()))
    }

    /// Replaces stemmed words with the surface form occurring most often in
    /// the source messages. First-seen order breaks count ties; a stem with
    /// no candidates (it never occurred in the retained messages) falls back
    /// to itself.
    fn resurface<'a>(&self, stems: impl Iterator<Item = &'a str>) -> Vec<String> {
        let mut candidates: HashMap<String, Vec<(String, u32)>> = HashMap::new();
        for msg in &self.messages {
            for (stem, forms) in surface_forms(&msg.content) {
                let merged = candidates.entry(stem).or_default();
                for (form, count) in forms {
                    match merged.iter_mut().find(|(f, _)| *f == form) {
                        Some((_, n)) => *n += count,
                        None => merged.push((form, count)),
                    }
                }
            }
        }
        stems
            .map(|stem| {
                let mut best: Option<(&str, u32)> = None;
                if let Some(forms) = candidates.get(stem) {
                    for (form, count) in forms {
                        if best.map_or(true, |(_, n)| *count > n) {
                            best = Some((form, *count));
                        }
                    }
                }
                match best {
                    Some((form, _)) => form.to_string(),
                    None => stem.to_string(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCS: &[&str] = &[
        "the the the foo bar baz is a procrastinate",
        "procrastination Procrastinate blarg baz the a is diamonds",
        "is is is a a a a is a the the the the the foo bar rare",
    ];

    fn corpus() -> (CorpusIndex, Vec<MessageRecord>) {
        let index = CorpusIndex::new("test_corpus");
        let messages: Vec<MessageRecord> = DOCS
            .iter()
            .enumerate()
            .map(|(i, text)| MessageRecord::user(format!("m{i}"), "chan", *text))
            .collect();
        for msg in &messages {
            index.process_message(msg);
        }
        (index, messages)
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn scores_a_single_message() {
        let (index, messages) = corpus();
        let tfidf = index.score(&messages[1..2]);

        let idf_rare_word = (3.0f64 / 2.0).log10();
        assert!(approx(tfidf.values()["blarg"], idf_rare_word));
        assert!(approx(tfidf.values()["diamond"], idf_rare_word));
        // words present in 2 of 3 documents have idf log10(1) == 0
        assert!(approx(tfidf.values()["baz"], 0.0));
        assert!(approx(tfidf.values()["procrastin"], 0.0));
    }

    #[test]
    fn accumulates_across_a_thread() {
        let (index, messages) = corpus();
        let tfidf = index.score(&messages);

        // blarg enters the accumulator at the second message and is re-added
        // by the third, so its raw total is 2
        let idf_rare_word = (3.0f64 / 2.0).log10();
        assert!(approx(tfidf.values()["blarg"], 2.0 * idf_rare_word));
        assert!(approx(tfidf.values()["diamond"], 2.0 * idf_rare_word));
        // rare only appears in the final message
        assert!(approx(tfidf.values()["rare"], idf_rare_word));
        assert!(approx(tfidf.values()["foo"], 0.0));
    }

    #[test]
    fn reactions_scale_their_message_and_everything_accumulated() {
        let index = CorpusIndex::new("test_corpus");
        index.process_message(&MessageRecord::user("seed1", "chan", "unrelated words"));
        index.process_message(&MessageRecord::user("seed2", "chan", "more filler"));

        let first = MessageRecord::user("m1", "chan", "foo");
        let mut second = MessageRecord::user("m2", "chan", "bar");
        second.reactions.insert("👍".to_string(), 3);

        let tfidf = index.score(&[first, second]);
        // foo and bar are unknown to the 2-document corpus: idf log10(2/1).
        // Raw totals: foo = 1*1.0 + 1*1.5 = 2.5, bar = 1*1.5.
        let idf = 2.0f64.log10();
        assert!(approx(tfidf.values()["foo"], 2.5 * idf));
        assert!(approx(tfidf.values()["bar"], 1.5 * idf));
    }

    #[test]
    fn unknown_reactions_contribute_nothing() {
        let mut msg = MessageRecord::user("m1", "chan", "foo");
        msg.reactions.insert("🤷".to_string(), 40);
        assert!(approx(reaction_multiplier(&msg), 1.0));
        msg.reactions.insert("🔥".to_string(), 1);
        msg.reactions.insert("❤️".to_string(), 2);
        assert!(approx(reaction_multiplier(&msg), 2.5));
    }

    #[test]
    fn top_words_resurfaces_originals() {
        let (index, messages) = corpus();
        let tfidf = index.score(&messages);
        assert_eq!(tfidf.top_words(3), vec!["blarg", "diamonds", "rare"]);
        assert_eq!(tfidf.top_words(2), vec!["blarg", "diamonds"]);
        // never more than the distinct words available
        assert!(tfidf.top_words(100).len() <= tfidf.values().len());
    }

    #[test]
    fn top_words_of_a_single_message() {
        let (index, messages) = corpus();
        let tfidf = index.score(&messages[1..2]);
        assert_eq!(tfidf.top_words(2), vec!["blarg", "diamonds"]);
    }

    #[test]
    fn auto_top_words_cuts_at_the_largest_drop() {
        let (index, messages) = corpus();
        let tfidf = index.score(&messages);
        // scores: blarg = diamond > rare > everything at zero. The first
        // largest drop sits after diamond.
        assert_eq!(tfidf.auto_top_words(6), vec!["blarg", "diamonds"]);
        let auto = tfidf.auto_top_words(3);
        assert!(!auto.is_empty() && auto.len() <= 3);
    }

    #[test]
    fn auto_top_words_defaults_to_one_without_a_drop() {
        let index = CorpusIndex::new("test_corpus");
        index.process_message(&MessageRecord::user("m1", "chan", "alpha beta"));
        index.process_message(&MessageRecord::user("m2", "chan", "gamma delta"));
        // both words in one document each: identical scores, no drop
        let tfidf = index.score(&[MessageRecord::user("q", "chan", "alpha gamma")]);
        assert_eq!(tfidf.auto_top_words(6).len(), 1);
    }

    #[test]
    fn empty_corpus_scores_to_zero() {
        let index = CorpusIndex::new("empty");
        let tfidf = index.score(&[MessageRecord::user("m1", "chan", "foo bar")]);
        assert!(tfidf.values().values().all(|v| *v == 0.0));
        assert!(tfidf.top_words(5).len() <= 2);
    }

    #[test]
    fn empty_input_scores_to_nothing() {
        let (index, _) = corpus();
        let tfidf = index.score(&[]);
        assert!(tfidf.values().is_empty());
        assert!(tfidf.top_words(5).is_empty());
        assert!(tfidf.auto_top_words(5).is_empty());
    }
}
