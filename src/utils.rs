/// Hangul syllables and jamo, CJK ideographs, and full-width forms.
pub fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{1100}'..='\u{11FF}'
        | '\u{3130}'..='\u{318F}'
        | '\u{AC00}'..='\u{D7A3}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{4E00}'..='\u{9FFF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{3040}'..='\u{30FF}')
}

/// Characters that render at roughly one em.
pub fn is_wide(c: char) -> bool {
    is_cjk(c) || matches!(c, '\u{3000}'..='\u{303F}' | '\u{FF00}'..='\u{FFEF}')
}

/// Letters of the Latin script, accented and full-width forms included.
pub fn is_latin_letter(c: char) -> bool {
    c.is_alphabetic()
        && matches!(c,
            'A'..='Z'
            | 'a'..='z'
            | '\u{00C0}'..='\u{024F}'
            | '\u{1E00}'..='\u{1EFF}'
            | '\u{FF21}'..='\u{FF3A}'
            | '\u{FF41}'..='\u{FF5A}')
}

/// Truncate to at most `max` characters.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Remove every whitespace character.
pub fn compact(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

pub fn is_number_token(token: &str) -> bool {
    let digits = token.strip_suffix('%').unwrap_or(token);
    !digits.is_empty()
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        && digits.chars().next().is_some_and(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn char_classes() {
        assert!(is_cjk('김'));
        assert!(is_cjk('業'));
        assert!(!is_cjk('A'));
        assert!(is_wide('　'));
        assert!(is_latin_letter('é'));
        assert!(is_latin_letter('Ｂ'));
        assert!(!is_latin_letter('×'));
        assert!(!is_latin_letter('Ω'));
        assert!(!is_latin_letter('7'));
    }

    #[test]
    fn truncation_counts_chars() {
        assert_eq!(truncate_chars("회로설계", 2), "회로");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn number_tokens() {
        assert!(is_number_token("50%"));
        assert!(is_number_token("7.5"));
        assert!(!is_number_token("%"));
        assert!(!is_number_token(".5"));
        assert!(!is_number_token("A1"));
    }
}
