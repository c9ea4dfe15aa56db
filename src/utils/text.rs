/// Keeps alphanumerics, space, `_` and `-`, then trims.
pub fn safe_filename(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '_' | '-'))
        .collect::<String>()
        .trim()
        .to_string()
}

/// "aDA  lovelace" -> "Ada Lovelace"
pub fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(|c| c.to_lowercase()))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Replaces `{name}` and `{code}` placeholders.
pub fn fill_placeholders(template: &str, name: &str, code: &str) -> String {
    template.replace("{name}", name).replace("{code}", code)
}
