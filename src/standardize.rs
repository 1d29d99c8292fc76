//! Brand and merchant name standardization.
//!
//! Maps well-known brand/merchant aliases to canonical names and falls back
//! to generic suffix-stripping plus title-casing for everything else. Pure
//! string functions, no I/O.

/// Brand aliases: exact full-string matches after trim + lowercase.
const BRAND_ALIASES: &[(&str, &str)] = &[
    ("apple", "Apple"),
    ("apple inc", "Apple"),
    ("apple inc.", "Apple"),
    ("apple computer", "Apple"),
    ("amazon", "Amazon"),
    ("amazon.com", "Amazon"),
    ("amazon basics", "Amazon Basics"),
    ("amazonbasics", "Amazon Basics"),
    ("google", "Google"),
    ("google llc", "Google"),
    ("samsung", "Samsung"),
    ("samsung electronics", "Samsung"),
    ("sony", "Sony"),
    ("sony corporation", "Sony"),
    ("microsoft", "Microsoft"),
    ("microsoft corp", "Microsoft"),
    ("nike", "Nike"),
    ("nike inc", "Nike"),
    ("procter & gamble", "Procter & Gamble"),
    ("p&g", "Procter & Gamble"),
    ("coca-cola", "Coca-Cola"),
    ("coca cola", "Coca-Cola"),
];

/// Merchant aliases: exact match first, then substring containment in
/// declared order.
const MERCHANT_ALIASES: &[(&str, &str)] = &[
    ("amazon", "Amazon"),
    ("amazon.com", "Amazon"),
    ("walmart", "Walmart"),
    ("wal-mart", "Walmart"),
    ("target", "Target"),
    ("costco", "Costco"),
    ("costco wholesale", "Costco"),
    ("best buy", "Best Buy"),
    ("bestbuy", "Best Buy"),
    ("home depot", "Home Depot"),
    ("the home depot", "Home Depot"),
    ("whole foods", "Whole Foods Market"),
    ("whole foods market", "Whole Foods Market"),
    ("cvs", "CVS"),
    ("walgreens", "Walgreens"),
    ("apple store", "Apple Store"),
];

/// Corporate suffixes stripped from the trailing token in the generic
/// fallback path.
const CORPORATE_SUFFIXES: &[&str] = &["inc", "inc.", "llc", "llc.", "corp", "corp.", "corporation"];

/// Standardize a brand name.
///
/// `None` stays `None` and `""` stays `""` — absent and explicitly-empty
/// inputs are distinguished at this layer. Otherwise: trim, exact alias
/// lookup, then the generic suffix-strip/title-case fallback.
pub fn standardize_brand(name: Option<&str>) -> Option<String> {
    let name = name?;
    if name.is_empty() {
        return Some(String::new());
    }

    let trimmed = name.trim();
    let lowered = trimmed.to_lowercase();

    for (alias, canonical) in BRAND_ALIASES {
        if lowered == *alias {
            return Some((*canonical).to_string());
        }
    }

    Some(generic_standardize(trimmed))
}

/// Standardize a merchant name.
///
/// Like [`standardize_brand`], but after exact alias lookup fails the alias
/// table is also matched by substring containment ("Amazon Fulfillment
/// Center" contains "amazon"). The first match in declared table order wins,
/// keeping multi-alias inputs deterministic.
pub fn standardize_merchant(name: Option<&str>) -> Option<String> {
    let name = name?;
    if name.is_empty() {
        return Some(String::new());
    }

    let trimmed = name.trim();
    let lowered = trimmed.to_lowercase();

    for (alias, canonical) in MERCHANT_ALIASES {
        if lowered == *alias {
            return Some((*canonical).to_string());
        }
    }
    for (alias, canonical) in MERCHANT_ALIASES {
        if lowered.contains(alias) {
            return Some((*canonical).to_string());
        }
    }

    Some(generic_standardize(trimmed))
}

/// Generic fallback: strip one trailing `.com`, then one trailing corporate
/// suffix, collapse whitespace, title-case each token.
///
/// The order is sequential by contract: `.com` is evaluated first, so
/// `"amazon inc.com"` exposes `inc` for suffix stripping, while
/// `"amazon.com inc"` has `inc` removed at the true end and the `.com`
/// (no longer trailing) survives.
fn generic_standardize(name: &str) -> String {
    let mut working = name.to_string();

    if working.len() >= 4 {
        if let Some(tail) = working.get(working.len() - 4..) {
            if tail.eq_ignore_ascii_case(".com") {
                working.truncate(working.len() - 4);
            }
        }
    }

    title_case(&strip_corporate_suffix(&working))
}

fn strip_corporate_suffix(name: &str) -> String {
    let mut tokens: Vec<&str> = name.split_whitespace().collect();
    // Suffix must be its own trailing token, not the tail of a word, and
    // must not be the entire name.
    if tokens.len() >= 2 {
        if let Some(last) = tokens.last() {
            if CORPORATE_SUFFIXES.contains(&last.to_lowercase().as_str()) {
                tokens.pop();
            }
        }
    }
    tokens.join(" ")
}

/// Title-case each whitespace-delimited token: first character upper, rest
/// lower. Deliberately does not special-case acronyms or apostrophes
/// ("AT&T" becomes "At&T").
fn title_case(name: &str) -> String {
    name.split_whitespace()
        .map(|token| {
            let mut chars = token.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
