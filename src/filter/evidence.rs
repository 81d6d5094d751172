use serde::{Deserialize, Serialize};

use crate::config::SNIPPET_CONTEXT_WORDS;
use crate::filter::normalize;
use crate::types::FilterConfig;

// ---------------------------------------------------------------------------
// Evidence document
// ---------------------------------------------------------------------------

/// Which text field a match was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentPosition {
    Title,
    Merchant,
}

/// A contextual snippet around one matched term, with the matched portion
/// bracketed, e.g. `...Amazing [NB10000] Power Bank...`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedSegment {
    pub position: SegmentPosition,
    pub text: String,
    pub matched_term: String,
}

/// Structured, serializable proof of why a deal's text matched a config.
/// Persisted as a JSON document with exactly these camelCase keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchDetails {
    /// Matched search-term words, original casing, deduplicated.
    pub search_term_matches: Vec<String>,
    /// Matched include keywords, config order.
    pub include_keyword_matches: Vec<String>,
    /// One of three shapes; see `exclude_status`.
    pub exclude_keyword_status: String,
    pub matched_segments: Vec<MatchedSegment>,
    /// Human match-quality description. Distinct from the filter outcome
    /// enum persisted on the deal row.
    pub filter_status: String,
}

// ---------------------------------------------------------------------------
// Computation
// ---------------------------------------------------------------------------

/// Compute match evidence for a deal's text against a config. Pure.
///
/// All containment tests are literal substring tests on the case-normalized
/// title+merchant text — no word boundaries, so a short term can match
/// inside a longer unrelated word. That is the shipped behavior and is
/// relied on by the evaluator; do not tighten it here.
pub fn compute_match_details(title: &str, merchant: &str, config: &FilterConfig) -> MatchDetails {
    let cs = config.case_sensitive;
    let search_text = format!("{} {}", normalize(title, cs), normalize(merchant, cs));

    let mut search_term_matches: Vec<String> = Vec::new();
    for word in config.search_term.split_whitespace() {
        if search_text.contains(normalize(word, cs).as_str())
            && !search_term_matches.iter().any(|w| w == word)
        {
            search_term_matches.push(word.to_string());
        }
    }

    let include_keyword_matches: Vec<String> = config
        .include_keywords
        .iter()
        .filter(|k| search_text.contains(normalize(k, cs).as_str()))
        .cloned()
        .collect();

    let exclude_keyword_status = exclude_status(&search_text, &config.exclude_keywords, cs);

    let mut matched_segments: Vec<MatchedSegment> = Vec::new();
    let mut seen_terms: Vec<String> = Vec::new();
    for term in search_term_matches.iter().chain(include_keyword_matches.iter()) {
        let norm_term = normalize(term, cs);
        if norm_term.is_empty() || seen_terms.contains(&norm_term) {
            continue;
        }
        seen_terms.push(norm_term.clone());
        if let Some(seg) = snippet_for(title, term, &norm_term, cs, SegmentPosition::Title) {
            matched_segments.push(seg);
        }
        if let Some(seg) = snippet_for(merchant, term, &norm_term, cs, SegmentPosition::Merchant) {
            matched_segments.push(seg);
        }
    }

    let filter_status = if search_term_matches.is_empty() {
        "No direct match found for search term".to_string()
    } else {
        format!(
            "Matched search term words: {}",
            search_term_matches.join(", ")
        )
    };

    MatchDetails {
        search_term_matches,
        include_keyword_matches,
        exclude_keyword_status,
        matched_segments,
        filter_status,
    }
}

fn exclude_status(search_text: &str, exclude_keywords: &[String], cs: bool) -> String {
    if exclude_keywords.is_empty() {
        return "No exclude keywords configured".to_string();
    }
    let matched: Vec<String> = exclude_keywords
        .iter()
        .filter(|k| search_text.contains(normalize(k, cs).as_str()))
        .cloned()
        .collect();
    if matched.is_empty() {
        format!(
            "No excluded keywords found (checked: {})",
            exclude_keywords.join(", ")
        )
    } else {
        format!("Contains excluded keywords: {}", matched.join(", "))
    }
}

// ---------------------------------------------------------------------------
// Snippets
// ---------------------------------------------------------------------------

/// Build the bracketed snippet for the first occurrence of `norm_term` in
/// `text`, keeping `SNIPPET_CONTEXT_WORDS` words of context on each side.
/// Returns None when the term does not occur in this field.
fn snippet_for(
    text: &str,
    term: &str,
    norm_term: &str,
    cs: bool,
    position: SegmentPosition,
) -> Option<MatchedSegment> {
    let norm_text = normalize(text, cs);
    let byte_pos = norm_text.find(norm_term)?;

    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return None;
    }

    // Word indices computed on the normalized text transfer to the original:
    // case normalization never touches whitespace.
    let start_word = word_index_at(&norm_text, byte_pos);
    let end_word = word_index_at(&norm_text, byte_pos + norm_term.len()).min(words.len() - 1);

    let window_start = start_word.saturating_sub(SNIPPET_CONTEXT_WORDS);
    let window_end = (end_word + 1 + SNIPPET_CONTEXT_WORDS).min(words.len());

    let mut parts: Vec<String> = Vec::with_capacity(window_end - window_start);
    for (offset, word) in words[window_start..window_end].iter().enumerate() {
        let idx = window_start + offset;
        let part = if idx == start_word && idx == end_word {
            bracket_in_word(word, norm_term, cs)
        } else if idx == start_word {
            format!("[{word}")
        } else if idx == end_word {
            format!("{word}]")
        } else {
            (*word).to_string()
        };
        parts.push(part);
    }

    let mut snippet = parts.join(" ");
    if window_start > 0 {
        snippet = format!("...{snippet}");
    }
    if window_end < words.len() {
        snippet = format!("{snippet}...");
    }

    Some(MatchedSegment {
        position,
        text: snippet,
        matched_term: term.to_string(),
    })
}

/// Index of the word containing byte offset `byte_pos`. For an offset just
/// past the end of a word, returns that word's index.
fn word_index_at(s: &str, byte_pos: usize) -> usize {
    let prefix = &s[..byte_pos.min(s.len())];
    let n = prefix.split_whitespace().count();
    if prefix.is_empty() || prefix.ends_with(char::is_whitespace) {
        n
    } else {
        n.saturating_sub(1)
    }
}

/// Bracket the matched portion inside a single word:
/// `Deckchair` + `deck` → `[Deck]chair`. Byte offsets from the normalized
/// word only transfer when normalization kept lengths stable (true for
/// ASCII); otherwise the whole word is bracketed.
fn bracket_in_word(word: &str, norm_term: &str, cs: bool) -> String {
    let norm_word = normalize(word, cs);
    if let Some(p) = norm_word.find(norm_term) {
        let end = p + norm_term.len();
        if norm_word.len() == word.len()
            && word.is_char_boundary(p)
            && word.is_char_boundary(end)
        {
            return format!("{}[{}]{}", &word[..p], &word[p..end], &word[end..]);
        }
    }
    format!("[{word}]")
}

// ---------------------------------------------------------------------------
// Display summary & serialization
// ---------------------------------------------------------------------------

/// One-line human summary of the evidence for notification display.
/// `search_term` feeds the generic fallback when no direct evidence exists.
pub fn format_match_summary(details: &MatchDetails, search_term: &str) -> String {
    let mut parts: Vec<String> = Vec::new();
    if !details.search_term_matches.is_empty() {
        parts.push(format!(
            "Search term matched: {}",
            details.search_term_matches.join(", ")
        ));
    }
    if !details.include_keyword_matches.is_empty() {
        parts.push(format!(
            "Required keywords found: {}",
            details.include_keyword_matches.join(", ")
        ));
    }
    if parts.is_empty() {
        format!("Returned by HotUKDeals search for \"{search_term}\"")
    } else {
        parts.join(" | ")
    }
}

pub fn serialize_match_details(details: &MatchDetails) -> String {
    serde_json::to_string(details).unwrap_or_default()
}

/// Malformed input yields None, never an error. Callers must treat a
/// missing document as "no evidence available" and degrade the display.
pub fn deserialize_match_details(raw: &str) -> Option<MatchDetails> {
    serde_json::from_str(raw).ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn config(term: &str) -> FilterConfig {
        FilterConfig::for_term(term)
    }

    #[test]
    fn search_term_matches_keep_original_casing() {
        let details = compute_match_details(
            "steam deck oled 512gb gaming console",
            "amazon",
            &config("Steam Deck"),
        );
        assert_eq!(details.search_term_matches, vec!["Steam", "Deck"]);
    }

    #[test]
    fn repeated_search_words_are_deduplicated() {
        let details = compute_match_details("Deck the halls deck", "", &config("deck deck"));
        assert_eq!(details.search_term_matches, vec!["deck"]);
    }

    #[test]
    fn include_matches_preserve_config_order_and_skip_missing() {
        let mut c = config("steam deck");
        c.include_keywords = vec!["512GB".to_string(), "LCD".to_string(), "OLED".to_string()];
        let details =
            compute_match_details("Steam Deck OLED 512GB Gaming Console", "Amazon", &c);
        assert_eq!(details.include_keyword_matches, vec!["512GB", "OLED"]);
    }

    #[test]
    fn exclude_status_when_none_configured() {
        let details = compute_match_details("Steam Deck", "", &config("steam deck"));
        assert_eq!(details.exclude_keyword_status, "No exclude keywords configured");
    }

    #[test]
    fn exclude_status_lists_checked_keywords_when_none_found() {
        let mut c = config("steam deck");
        c.exclude_keywords = vec!["refurb".to_string(), "broken".to_string()];
        let details = compute_match_details("Steam Deck OLED", "", &c);
        assert_eq!(
            details.exclude_keyword_status,
            "No excluded keywords found (checked: refurb, broken)"
        );
    }

    #[test]
    fn exclude_status_names_every_matched_keyword() {
        let mut c = config("steam deck");
        c.exclude_keywords = vec!["OLED".to_string(), "refurb".to_string(), "512GB".to_string()];
        let details = compute_match_details("Steam Deck OLED 512GB", "", &c);
        assert_eq!(
            details.exclude_keyword_status,
            "Contains excluded keywords: OLED, 512GB"
        );
    }

    #[test]
    fn segment_brackets_whole_word_match() {
        let details =
            compute_match_details("Anker Amazing NB10000 Power Bank Deal", "", &config("NB10000"));
        let seg = &details.matched_segments[0];
        assert_eq!(seg.position, SegmentPosition::Title);
        assert_eq!(seg.matched_term, "NB10000");
        assert_eq!(seg.text, "Anker Amazing [NB10000] Power Bank Deal");
    }

    #[test]
    fn segment_window_truncates_with_ellipses() {
        let details = compute_match_details(
            "The all new Anker Amazing NB10000 Power Bank Ultra Compact Charger",
            "",
            &config("NB10000"),
        );
        let seg = &details.matched_segments[0];
        assert_eq!(seg.text, "...new Anker Amazing [NB10000] Power Bank Ultra...");
    }

    #[test]
    fn segment_brackets_partial_word_match() {
        let details = compute_match_details("Folding Deckchair two-pack", "", &config("deck"));
        let seg = &details.matched_segments[0];
        assert_eq!(seg.text, "Folding [Deck]chair two-pack");
    }

    #[test]
    fn segment_reports_merchant_position() {
        let details = compute_match_details("512GB handheld console", "Steam Store", &config("steam"));
        let seg = &details.matched_segments[0];
        assert_eq!(seg.position, SegmentPosition::Merchant);
        assert_eq!(seg.text, "[Steam] Store");
    }

    #[test]
    fn multi_word_include_keyword_brackets_the_span() {
        let mut c = config("anker");
        c.include_keywords = vec!["power bank".to_string()];
        let details = compute_match_details("Anker NB10000 Power Bank Deal", "", &c);
        let seg = details
            .matched_segments
            .iter()
            .find(|s| s.matched_term == "power bank")
            .expect("segment for the include keyword");
        assert_eq!(seg.text, "Anker NB10000 [Power Bank] Deal");
    }

    #[test]
    fn term_matched_in_both_fields_yields_two_segments() {
        let details = compute_match_details("Steam Deck dock", "Steam Store", &config("steam"));
        let positions: Vec<SegmentPosition> =
            details.matched_segments.iter().map(|s| s.position).collect();
        assert_eq!(positions, vec![SegmentPosition::Title, SegmentPosition::Merchant]);
    }

    #[test]
    fn evidence_status_reports_no_direct_match() {
        let details = compute_match_details("Nintendo Switch bundle", "", &config("steam deck"));
        assert!(details.search_term_matches.is_empty());
        assert_eq!(details.filter_status, "No direct match found for search term");
        assert!(details.matched_segments.is_empty());
    }

    #[test]
    fn evidence_status_names_matched_words() {
        let details = compute_match_details("Steam Deck OLED", "", &config("steam deck"));
        assert_eq!(details.filter_status, "Matched search term words: steam, deck");
    }

    #[test]
    fn summary_leads_with_search_matches_and_appends_includes() {
        let mut c = config("steam deck");
        c.include_keywords = vec!["OLED".to_string(), "512GB".to_string()];
        let details = compute_match_details("Steam Deck OLED 512GB", "", &c);
        let summary = format_match_summary(&details, "steam deck");
        assert_eq!(
            summary,
            "Search term matched: steam, deck | Required keywords found: OLED, 512GB"
        );
    }

    #[test]
    fn summary_falls_back_when_no_direct_evidence() {
        let details = compute_match_details("Nintendo Switch bundle", "", &config("steam deck"));
        let summary = format_match_summary(&details, "steam deck");
        assert_eq!(summary, "Returned by HotUKDeals search for \"steam deck\"");
    }

    #[test]
    fn serialized_details_round_trip_losslessly() {
        let mut c = config("steam deck");
        c.include_keywords = vec!["512GB".to_string()];
        c.exclude_keywords = vec!["refurb".to_string()];
        let details = compute_match_details("Steam Deck OLED 512GB Gaming Console", "Amazon", &c);
        let raw = serialize_match_details(&details);
        let restored = deserialize_match_details(&raw).expect("well-formed JSON");
        assert_eq!(details, restored);
    }

    #[test]
    fn serialized_document_uses_camel_case_keys() {
        let details = compute_match_details("Steam Deck", "", &config("steam"));
        let raw = serialize_match_details(&details);
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert!(value.get("searchTermMatches").is_some());
        assert!(value.get("includeKeywordMatches").is_some());
        assert!(value.get("excludeKeywordStatus").is_some());
        assert!(value.get("matchedSegments").is_some());
        assert!(value.get("filterStatus").is_some());
    }

    #[test]
    fn malformed_json_deserializes_to_none() {
        assert!(deserialize_match_details("not valid json").is_none());
        assert!(deserialize_match_details("").is_none());
        assert!(deserialize_match_details("{\"searchTermMatches\": 42}").is_none());
    }

    #[test]
    fn case_sensitive_evidence_respects_casing() {
        let details = compute_match_details("STEAM DECK", "", &{
            let mut c = config("steam");
            c.case_sensitive = true;
            c
        });
        assert!(details.search_term_matches.is_empty());
    }
}
