use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::{HashMap, HashSet};
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref SPACES: Regex = Regex::new(r"\s+").expect("valid regex");
    static ref NON_ALNUM: Regex = Regex::new(r"[^a-z0-9]+").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    // Contraction forms are stored apostrophe-free because membership is
    // tested after punctuation stripping.
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","arent","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","cant","cannot","could","couldnt",
            "did","didnt","do","does","doesnt","doing","dont","down","during",
            "each","few","for","from","further",
            "had","hadnt","has","hasnt","have","havent","having","he","hed","hell","hes","her","here","heres","hers","herself","him","himself","his","how","hows",
            "i","id","ill","im","ive","if","in","into","is","isnt","it","its","itself",
            "lets","me","more","most","mustnt","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","shed","shell","shes","should","shouldnt","so","some","such",
            "than","that","thats","the","their","theirs","them","themselves","then","there","theres","these","they","theyd","theyll","theyre","theyve","this","those","through","to","too",
            "under","until","up","very",
            "was","wasnt","we","wed","well","were","werent","weve","what","whats","when","whens","where","wheres","which","while","who","whos","whom","why","whys","with","wont","would","wouldnt",
            "you","youd","youll","youre","youve","your","yours","yourself","yourselves",
        ];
        words.iter().copied().collect()
    };
}

fn is_stop_word(token: &str) -> bool {
    STOPWORDS.contains(token)
}

/// Lower-cases, NFKC-folds, and strips everything non-alphanumeric from a
/// single token. The result may be empty.
fn strip_token(token: &str) -> String {
    let folded = token.nfkc().collect::<String>().to_lowercase();
    NON_ALNUM.replace_all(&folded, "").into_owned()
}

/// Stems an already stripped token, dropping stop words and empties. The
/// stop-word set is consulted both before and after stemming: stemming can
/// land on a stop word ("being" -> "be") and some list entries would move
/// off the list form if stemmed first ("any" -> "ani").
fn stem_stripped(stripped: &str) -> Option<String> {
    if stripped.is_empty() || is_stop_word(stripped) {
        return None;
    }
    let stem = STEMMER.stem(stripped).to_string();
    if stem.is_empty() || is_stop_word(&stem) {
        return None;
    }
    Some(stem)
}

/// Normalizes a single word: lower-case, strip non-alphanumerics, stem,
/// filter stop words. Returns None for words that should never be indexed.
pub fn normalize_word(word: &str) -> Option<String> {
    stem_stripped(&strip_token(word))
}

/// Walks the raw word candidates of a message in order: whitespace runs
/// collapse, URL and `<...>` mention tokens are dropped whole, `-` and `/`
/// split compounds apart.
fn for_each_candidate(text: &str, mut f: impl FnMut(&str)) {
    let collapsed = SPACES.replace_all(text, " ").to_lowercase();
    for token in collapsed.split(' ') {
        if token.is_empty() {
            continue;
        }
        if token.starts_with("http://") || token.starts_with("https://") {
            continue;
        }
        // Platform mentions look like <@!837476904742289429> or <#837826557477126219>
        if token.starts_with('<') && token.ends_with('>') {
            continue;
        }
        for piece in token.split(['-', '/']) {
            if !piece.is_empty() {
                f(piece);
            }
        }
    }
}

/// Tokenizes and cleans raw message text into normalized words, in the
/// order they occur. Duplicates are preserved. Pure and deterministic.
pub fn normalize(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    for_each_candidate(text, |piece| {
        if let Some(stem) = normalize_word(piece) {
            words.push(stem);
        }
    });
    words
}

/// Maps each stemmed word in `text` to the surface forms it was produced
/// from with occurrence counts, in first-seen order. Surface forms are
/// stripped but unstemmed, so keyword lists can show "diamonds" instead of
/// "diamond".
pub fn surface_forms(text: &str) -> HashMap<String, Vec<(String, u32)>> {
    let mut map: HashMap<String, Vec<(String, u32)>> = HashMap::new();
    for_each_candidate(text, |piece| {
        let stripped = strip_token(piece);
        let Some(stem) = stem_stripped(&stripped) else {
            return;
        };
        let forms = map.entry(stem).or_default();
        match forms.iter_mut().find(|(form, _)| *form == stripped) {
            Some((_, count)) => *count += 1,
            None => forms.push((stripped, 1)),
        }
    });
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stems_and_lowercases() {
        assert_eq!(normalize_word("Procrastination"), Some("procrastin".to_string()));
        assert_eq!(normalize_word("LoWERcase"), Some("lowercas".to_string()));
    }

    #[test]
    fn drops_stop_words_and_empties() {
        assert_eq!(normalize_word("the"), None);
        assert_eq!(normalize_word("!!!"), None);
        // "being" only becomes a stop word after stemming
        assert_eq!(normalize_word("being"), None);
        assert_eq!(normalize_word("aren't"), None);
    }

    #[test]
    fn surface_forms_counts_unstemmed_tokens() {
        let forms = surface_forms("diamonds Diamonds diamond");
        let candidates = &forms["diamond"];
        assert_eq!(candidates[0], ("diamonds".to_string(), 2));
        assert_eq!(candidates[1], ("diamond".to_string(), 1));
    }
}
