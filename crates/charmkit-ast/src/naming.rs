//! Naming utilities for deriving unit names from class names

/// Convert a CamelCase class name to a kebab-case unit name
///
/// - MyCharm -> my-charm
/// - PostgreSQLCharm -> postgre-sql-charm
/// - HTTPProxy -> http-proxy
pub fn camel_to_kebab(class_name: &str) -> String {
    let chars: Vec<char> = class_name.trim_matches('_').chars().collect();
    let mut result = String::with_capacity(chars.len() + 4);

    for (i, &ch) in chars.iter().enumerate() {
        if ch == '_' {
            if !result.ends_with('-') {
                result.push('-');
            }
            continue;
        }
        if ch.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|c| c.is_lowercase());
            // New word after a lowercase letter or digit, or the last capital of
            // an acronym followed by a lowercase word
            let start_new_word = prev.is_lowercase() || prev.is_ascii_digit();
            let end_of_acronym = prev.is_uppercase() && next_lower;
            if (start_new_word || end_of_acronym) && !result.ends_with('-') {
                result.push('-');
            }
        }
        result.extend(ch.to_lowercase());
    }

    result
}
