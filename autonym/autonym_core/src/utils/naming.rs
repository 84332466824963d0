//! Naming rules for default routes.
//!
//! A resource without an explicit route is served under its name, kebab
//! cased, with the last word pluralized: `blogPost` becomes `blog-posts`.

const IRREGULAR: &[(&str, &str)] = &[
    ("person", "people"),
    ("man", "men"),
    ("woman", "women"),
    ("child", "children"),
    ("mouse", "mice"),
    ("goose", "geese"),
    ("tooth", "teeth"),
    ("foot", "feet"),
    ("ox", "oxen"),
    ("leaf", "leaves"),
    ("life", "lives"),
    ("knife", "knives"),
    ("wife", "wives"),
    ("half", "halves"),
    ("criterion", "criteria"),
    ("index", "indices"),
];

const UNCOUNTABLE: &[&str] = &[
    "equipment",
    "information",
    "rice",
    "money",
    "species",
    "series",
    "fish",
    "sheep",
    "deer",
    "news",
    "metadata",
];

/// Convert a name to kebab case.
///
/// Word boundaries are spaces, underscores, hyphens and case changes. A run
/// of capitals is kept together as one word: `HTTPRequest` becomes
/// `http-request`.
pub fn kebab_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if c == ' ' || c == '_' || c == '-' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }

        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).map_or(false, |n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower)
            {
                words.push(std::mem::take(&mut current));
            }
        }
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }

    words.join("-")
}

/// Pluralize a single lowercase English word.
pub fn pluralize(word: &str) -> String {
    if word.is_empty() || UNCOUNTABLE.contains(&word) {
        return word.to_string();
    }
    if let Some((_, plural)) = IRREGULAR.iter().find(|(singular, _)| *singular == word) {
        return plural.to_string();
    }
    if IRREGULAR.iter().any(|(_, plural)| *plural == word) {
        return word.to_string();
    }

    if word.ends_with('s')
        || word.ends_with('x')
        || word.ends_with('z')
        || word.ends_with("ch")
        || word.ends_with("sh")
    {
        return format!("{}es", word);
    }

    if let Some(stem) = word.strip_suffix('y') {
        let before = stem.chars().last();
        if before.map_or(false, |c| !"aeiou".contains(c)) {
            return format!("{}ies", stem);
        }
    }

    format!("{}s", word)
}

/// Derive the default route for a resource name.
pub fn default_route(name: &str) -> String {
    let kebab = kebab_case(name);
    match kebab.rsplit_once('-') {
        Some((head, last)) => format!("{}-{}", head, pluralize(last)),
        None => pluralize(&kebab),
    }
}
