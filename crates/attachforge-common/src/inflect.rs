//! English inflection helpers used by path templates.
//!
//! Path templates name directories after entity types and attachment fields in
//! their plural table form (`UserProfile` -> `user_profiles`, `avatar` ->
//! `avatars`). Uploaded file names are slugged before they are stored.

/// Words that are the same in singular and plural.
const UNCOUNTABLE: &[&str] = &[
    "equipment",
    "fish",
    "information",
    "media",
    "money",
    "news",
    "rice",
    "series",
    "sheep",
    "species",
];

/// Irregular singular/plural pairs.
const IRREGULAR: &[(&str, &str)] = &[
    ("child", "children"),
    ("man", "men"),
    ("mouse", "mice"),
    ("person", "people"),
    ("woman", "women"),
];

/// Convert a CamelCase name to snake_case.
///
/// # Examples
///
/// ```
/// use attachforge_common::inflect::underscore;
///
/// assert_eq!(underscore("UserProfile"), "user_profile");
/// assert_eq!(underscore("HTTPRequest"), "http_request");
/// assert_eq!(underscore("already_snake"), "already_snake");
/// ```
pub fn underscore(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev_lower = i > 0 && (chars[i - 1].is_lowercase() || chars[i - 1].is_ascii_digit());
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            let prev_upper = i > 0 && chars[i - 1].is_uppercase();
            if i > 0 && (prev_lower || (prev_upper && next_lower)) && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else if c == '-' || c == ' ' {
            out.push('_');
        } else {
            out.push(c);
        }
    }

    out
}

/// Pluralize the last word of `word`.
///
/// Words already ending in a plain `s` are treated as plural.
///
/// # Examples
///
/// ```
/// use attachforge_common::inflect::pluralize;
///
/// assert_eq!(pluralize("avatar"), "avatars");
/// assert_eq!(pluralize("category"), "categories");
/// assert_eq!(pluralize("box"), "boxes");
/// assert_eq!(pluralize("person"), "people");
/// assert_eq!(pluralize("photos"), "photos");
/// ```
pub fn pluralize(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }

    let (head, last) = match word.rfind('_') {
        Some(pos) => word.split_at(pos + 1),
        None => ("", word),
    };
    let lower = last.to_lowercase();

    if UNCOUNTABLE.contains(&lower.as_str()) {
        return word.to_string();
    }
    if let Some((_, plural)) = IRREGULAR.iter().find(|(singular, _)| *singular == lower) {
        return format!("{}{}", head, plural);
    }
    if IRREGULAR.iter().any(|(_, plural)| *plural == lower) {
        return word.to_string();
    }

    let plural = if lower.ends_with("ss")
        || lower.ends_with("us")
        || lower.ends_with('x')
        || lower.ends_with('z')
        || lower.ends_with("ch")
        || lower.ends_with("sh")
    {
        format!("{}es", last)
    } else if lower.ends_with('s') {
        last.to_string()
    } else if lower.ends_with('y') && !ends_with_vowel_y(&lower) {
        format!("{}ies", &last[..last.len() - 1])
    } else {
        format!("{}s", last)
    };

    format!("{}{}", head, plural)
}

fn ends_with_vowel_y(word: &str) -> bool {
    let mut rev = word.chars().rev();
    rev.next();
    matches!(rev.next(), Some('a' | 'e' | 'i' | 'o' | 'u'))
}

/// Table name of an entity type: snake_case, pluralized.
///
/// # Examples
///
/// ```
/// use attachforge_common::inflect::tableize;
///
/// assert_eq!(tableize("User"), "users");
/// assert_eq!(tableize("BlogCategory"), "blog_categories");
/// ```
pub fn tableize(entity: &str) -> String {
    pluralize(&underscore(entity))
}

/// Make a file stem URL and filesystem friendly.
///
/// Common Latin accents are transliterated, every other run of characters that
/// are not ASCII letters or digits becomes a single `_`, and leading/trailing
/// separators are trimmed. An empty result becomes `file`.
///
/// # Examples
///
/// ```
/// use attachforge_common::inflect::slug;
///
/// assert_eq!(slug("My Holiday Photo!"), "My_Holiday_Photo");
/// assert_eq!(slug("café crème"), "cafe_creme");
/// assert_eq!(slug("???"), "file");
/// ```
pub fn slug(stem: &str) -> String {
    let mut out = String::with_capacity(stem.len());
    let mut pending_sep = false;

    for c in stem.chars() {
        let mapped = transliterate(c);
        match mapped {
            Some(s) => {
                if pending_sep && !out.is_empty() {
                    out.push('_');
                }
                pending_sep = false;
                out.push_str(s);
            }
            None if c.is_ascii_alphanumeric() => {
                if pending_sep && !out.is_empty() {
                    out.push('_');
                }
                pending_sep = false;
                out.push(c);
            }
            None => pending_sep = true,
        }
    }

    if out.is_empty() {
        "file".to_string()
    } else {
        out
    }
}

fn transliterate(c: char) -> Option<&'static str> {
    let s = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => "a",
        'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => "A",
        'æ' => "ae",
        'Æ' => "AE",
        'ç' => "c",
        'Ç' => "C",
        'è' | 'é' | 'ê' | 'ë' => "e",
        'È' | 'É' | 'Ê' | 'Ë' => "E",
        'ì' | 'í' | 'î' | 'ï' => "i",
        'Ì' | 'Í' | 'Î' | 'Ï' => "I",
        'ñ' => "n",
        'Ñ' => "N",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => "o",
        'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø' => "O",
        'ù' | 'ú' | 'û' | 'ü' => "u",
        'Ù' | 'Ú' | 'Û' | 'Ü' => "U",
        'ý' | 'ÿ' => "y",
        'Ý' => "Y",
        'ß' => "ss",
        _ => return None,
    };
    Some(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_underscore() {
        assert_eq!(underscore("User"), "user");
        assert_eq!(underscore("BlogPost"), "blog_post");
        assert_eq!(underscore("Post2Tag"), "post2_tag");
        assert_eq!(underscore("user profile"), "user_profile");
    }

    #[test]
    fn test_pluralize_rules() {
        let cases = [
            ("user", "users"),
            ("attachment", "attachments"),
            ("status", "statuses"),
            ("address", "addresses"),
            ("match", "matches"),
            ("dish", "dishes"),
            ("day", "days"),
            ("company", "companies"),
            ("child", "children"),
            ("people", "people"),
            ("news", "news"),
            ("blog_category", "blog_categories"),
            ("", ""),
        ];
        for (singular, plural) in cases {
            assert_eq!(pluralize(singular), plural, "pluralize({})", singular);
        }
    }

    #[test]
    fn test_tableize() {
        assert_eq!(tableize("Person"), "people");
        assert_eq!(tableize("UserProfile"), "user_profiles");
        assert_eq!(tableize("users"), "users");
    }

    #[test]
    fn test_slug() {
        assert_eq!(slug("pic"), "pic");
        assert_eq!(slug("  spaced  out  "), "spaced_out");
        assert_eq!(slug("a--b..c"), "a_b_c");
        assert_eq!(slug("Übergröße"), "Ubergrosse");
        assert_eq!(slug(""), "file");
    }
}
