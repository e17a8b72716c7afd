// Text clean-up applied to raw portal text before it reaches the model.

/// Removes a leading `Label :` prefix, whether the colon sits on the same
/// line or after a line break, then trims.
pub fn strip_label(text: &str, label: &str) -> String {
    let trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix(label) {
        let rest = rest.trim_start();
        if let Some(value) = rest.strip_prefix(':') {
            return value.trim().to_string();
        }
    }
    trimmed.to_string()
}

/// Joins multi-line cell text into a single line.
pub fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lower-cases and strips French diacritics.
pub fn fold_diacritics(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| match c {
            'à' | 'â' | 'ä' | 'á' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'î' | 'ï' | 'í' => 'i',
            'ô' | 'ö' | 'ó' => 'o',
            'ù' | 'û' | 'ü' | 'ú' => 'u',
            'ç' => 'c',
            'ÿ' => 'y',
            '’' => '\'',
            other => other,
        })
        .collect()
}

/// Reads the first number in `text`, allowing space, dot and no-break space
/// as thousands separators ("1 234 résultats" -> 1234).
pub fn parse_count(text: &str) -> Option<u32> {
    let chars: Vec<char> = text.chars().collect();
    let start = chars.iter().position(|c| c.is_ascii_digit())?;
    let mut digits = String::new();
    let mut i = start;
    while i < chars.len() {
        let c = chars[i];
        let is_separator = matches!(c, ' ' | '.' | '\u{a0}' | '\u{202f}')
            && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit());
        if c.is_ascii_digit() {
            digits.push(c);
        } else if !is_separator {
            break;
        }
        i += 1;
    }
    digits.parse().ok()
}
