//! Table naming: casing, plurality and the conversions between them.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Casing {
    /// `order_items`, and single lowercase words
    SnakeCase,
    CamelCase,
    PascalCase,
    ScreamingSnakeCase,
    Mixed,
}

impl Casing {
    pub fn detect(name: &str) -> Self {
        let letters: Vec<char> = name.chars().filter(|c| c.is_alphabetic()).collect();
        let Some(&first) = letters.first() else {
            return Casing::Mixed;
        };
        let has_upper = letters.iter().any(|c| c.is_uppercase());
        let has_lower = letters.iter().any(|c| c.is_lowercase());
        let has_separator = name.contains('_') || name.contains('-');

        match (has_upper, has_lower, has_separator) {
            (false, true, _) => Casing::SnakeCase,
            (true, false, _) => Casing::ScreamingSnakeCase,
            (true, true, false) if first.is_uppercase() => Casing::PascalCase,
            (true, true, false) => Casing::CamelCase,
            _ => Casing::Mixed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plurality {
    Singular,
    Plural,
    Mixed,
}

/// How a codebase names its tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingConvention {
    pub casing: Casing,
    pub plurality: Plurality,
}

impl Default for NamingConvention {
    fn default() -> Self {
        Self {
            casing: Casing::SnakeCase,
            plurality: Plurality::Plural,
        }
    }
}

impl NamingConvention {
    /// Majority casing and plurality over `names`. Ties fall back to the
    /// default convention.
    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut casings = [0usize; 5];
        let (mut plural, mut singular) = (0usize, 0usize);
        for name in names {
            casings[Casing::detect(name) as usize] += 1;
            if is_plural(name) {
                plural += 1;
            } else {
                singular += 1;
            }
        }

        let order = [
            Casing::SnakeCase,
            Casing::CamelCase,
            Casing::PascalCase,
            Casing::ScreamingSnakeCase,
            Casing::Mixed,
        ];
        let top = casings.iter().copied().max().unwrap_or(0);
        let leaders: Vec<Casing> = order.into_iter().filter(|c| casings[*c as usize] == top).collect();
        let casing = match leaders.as_slice() {
            [only] if top > 0 => *only,
            _ => Self::default().casing,
        };

        let plurality = match plural.cmp(&singular) {
            std::cmp::Ordering::Greater => Plurality::Plural,
            std::cmp::Ordering::Less => Plurality::Singular,
            std::cmp::Ordering::Equal if plural == 0 => Self::default().plurality,
            std::cmp::Ordering::Equal => Plurality::Mixed,
        };

        Self { casing, plurality }
    }

    /// Render a model or identifier name as this convention would name
    /// its table.
    pub fn table_name_for(&self, name: &str) -> String {
        let snake = to_snake_case(name);
        let snake = match self.plurality {
            Plurality::Plural => pluralize_last(&snake),
            Plurality::Singular => singularize_last(&snake),
            Plurality::Mixed => snake,
        };
        match self.casing {
            Casing::SnakeCase | Casing::Mixed => snake,
            Casing::ScreamingSnakeCase => snake.to_uppercase(),
            Casing::CamelCase => camelize(&snake, false),
            Casing::PascalCase => camelize(&snake, true),
        }
    }
}

const IRREGULAR: &[(&str, &str)] = &[
    ("person", "people"),
    ("child", "children"),
    ("man", "men"),
    ("woman", "women"),
    ("mouse", "mice"),
    ("datum", "data"),
];

/// Words whose singular ends in `s`.
const SINGULAR_S: &[&str] = &["status", "address", "bus", "news", "alias", "canvas", "analysis"];

/// `User` -> `users`, `category` -> `categories`, `address` -> `addresses`.
pub fn pluralize(word: &str) -> String {
    let lower = word.to_lowercase();
    if let Some((_, plural)) = IRREGULAR.iter().find(|(s, _)| *s == lower) {
        return with_case_of(word, plural);
    }
    if is_plural(word) {
        return word.to_string();
    }
    let ends_consonant_y = lower.ends_with('y')
        && !lower.ends_with("ay")
        && !lower.ends_with("ey")
        && !lower.ends_with("oy")
        && !lower.ends_with("uy");
    if ends_consonant_y {
        return format!("{}ies", &word[..word.len() - 1]);
    }
    if ["s", "x", "z", "ch", "sh"].iter().any(|end| lower.ends_with(end)) {
        return format!("{}es", word);
    }
    format!("{}s", word)
}

/// `users` -> `user`, `categories` -> `category`, `statuses` -> `status`.
pub fn singularize(word: &str) -> String {
    let lower = word.to_lowercase();
    if let Some((singular, _)) = IRREGULAR.iter().find(|(_, p)| *p == lower) {
        return with_case_of(word, singular);
    }
    if SINGULAR_S.contains(&lower.as_str()) || lower.ends_with("ss") || lower.len() < 3 {
        return word.to_string();
    }
    if lower.ends_with("ies") {
        return format!("{}y", &word[..word.len() - 3]);
    }
    let es_stem = &lower[..lower.len().saturating_sub(2)];
    if lower.ends_with("es")
        && (["s", "x", "z", "ch", "sh"].iter().any(|end| es_stem.ends_with(end))
            || SINGULAR_S.contains(&es_stem))
    {
        return word[..word.len() - 2].to_string();
    }
    if lower.ends_with('s') && !lower.ends_with("us") && !lower.ends_with("is") {
        return word[..word.len() - 1].to_string();
    }
    word.to_string()
}

/// Plurality of the last word of a name (`order_items` is plural).
pub fn is_plural(name: &str) -> bool {
    let last = last_word(name).to_lowercase();
    if IRREGULAR.iter().any(|(_, p)| *p == last) {
        return true;
    }
    singularize(&last) != last
}

fn last_word(name: &str) -> &str {
    let snake_tail = name.rsplit(['_', '-']).next().unwrap_or(name);
    // camelCase / PascalCase tail
    match snake_tail
        .char_indices()
        .filter(|(i, c)| *i > 0 && c.is_uppercase())
        .last()
    {
        Some((i, _)) if snake_tail[i..].chars().any(|c| c.is_lowercase()) => &snake_tail[i..],
        _ => snake_tail,
    }
}

fn pluralize_last(snake: &str) -> String {
    match snake.rsplit_once('_') {
        Some((head, tail)) => format!("{}_{}", head, pluralize(tail)),
        None => pluralize(snake),
    }
}

fn singularize_last(snake: &str) -> String {
    match snake.rsplit_once('_') {
        Some((head, tail)) => format!("{}_{}", head, singularize(tail)),
        None => singularize(snake),
    }
}

fn with_case_of(original: &str, replacement: &str) -> String {
    if original.chars().next().is_some_and(|c| c.is_uppercase()) {
        let mut chars = replacement.chars();
        chars
            .next()
            .map(|first| first.to_uppercase().chain(chars).collect())
            .unwrap_or_default()
    } else {
        replacement.to_string()
    }
}

/// `OrderItem` -> `order_item`, `HTTPServer` -> `http_server`,
/// `order-items` -> `order_items`.
pub fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c == '-' || c == ' ' || c == '_' {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            continue;
        }
        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1);
            let boundary = prev.is_some_and(|p| p.is_lowercase() || p.is_ascii_digit())
                || (prev.is_some_and(|p| p.is_uppercase()) && next.is_some_and(|n| n.is_lowercase()));
            if boundary && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out.trim_end_matches('_').to_string()
}

fn camelize(snake: &str, upper_first: bool) -> String {
    let mut out = String::with_capacity(snake.len());
    for (i, part) in snake.split('_').filter(|p| !p.is_empty()).enumerate() {
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            if i == 0 && !upper_first {
                out.push(first);
            } else {
                out.extend(first.to_uppercase());
            }
            out.push_str(chars.as_str());
        }
    }
    out
}
