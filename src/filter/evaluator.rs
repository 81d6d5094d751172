use crate::filter::evidence::compute_match_details;
use crate::filter::normalize;
use crate::types::{FilterConfig, FilterResult, FilterStatus, ScrapedDeal};

/// Evaluate one scraped deal against one channel config.
///
/// Pure and total: checks run in fixed priority order and the first failing
/// one wins. The search-term check is OR across the term's words; the
/// exclude check short-circuits on the first hit; the include check collects
/// every missing keyword. Match evidence is attached only on a pass.
pub fn evaluate(deal: &ScrapedDeal, config: &FilterConfig) -> FilterResult {
    let cs = config.case_sensitive;
    let merchant = deal.merchant.as_deref().unwrap_or("");
    let search_text = format!(
        "{} {}",
        normalize(&deal.title, cs),
        normalize(merchant, cs)
    );

    // 1. Search term: any word matching is enough. An empty term has no
    //    words and can never match anything.
    let words: Vec<String> = config
        .search_term
        .split_whitespace()
        .map(|w| normalize(w, cs))
        .collect();
    if !words.iter().any(|w| search_text.contains(w.as_str())) {
        return rejected(
            FilterStatus::FilteredNoMatch,
            format!("Deal does not match search term \"{}\"", config.search_term),
        );
    }

    // 2. Exclude keywords, in list order, first hit wins. The reason keeps
    //    the keyword's configured casing.
    for keyword in &config.exclude_keywords {
        if search_text.contains(normalize(keyword, cs).as_str()) {
            return rejected(
                FilterStatus::FilteredExclude,
                format!("Contains excluded keyword \"{keyword}\""),
            );
        }
    }

    // 3. Include keywords: all required; report every missing one, in
    //    normalized case.
    let missing: Vec<String> = config
        .include_keywords
        .iter()
        .map(|k| normalize(k, cs))
        .filter(|k| !search_text.contains(k.as_str()))
        .collect();
    if !missing.is_empty() {
        return rejected(
            FilterStatus::FilteredInclude,
            format!("Missing required keywords: {}", missing.join(", ")),
        );
    }

    // 4. Numeric gates, only when both the bound and the parsed value exist.
    if let (Some(max_price), Some(price)) = (config.max_price, deal.price) {
        if price > max_price {
            return rejected(
                FilterStatus::FilteredPriceTooHigh,
                format!("Price £{price:.2} exceeds maximum £{max_price:.2}"),
            );
        }
    }
    if let (Some(min_discount), Some(discount)) = (config.min_discount, deal.discount) {
        if discount < min_discount {
            return rejected(
                FilterStatus::FilteredDiscountTooLow,
                format!("Discount {discount:.0}% below minimum {min_discount:.0}%"),
            );
        }
    }

    FilterResult {
        passed: true,
        filter_status: FilterStatus::Passed,
        filter_reason: None,
        match_details: Some(compute_match_details(&deal.title, merchant, config)),
    }
}

fn rejected(status: FilterStatus, reason: String) -> FilterResult {
    FilterResult {
        passed: false,
        filter_status: status,
        filter_reason: Some(reason),
        match_details: None,
    }
}
