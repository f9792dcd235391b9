/// Inflectional suffix class of a matched word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SuffixClass {
    Bare,
    Ing,
    Ed,
    Ly,
    Er,
    Est,
    Plural,
}

impl SuffixClass {
    /// Classify a raw suffix. `d`, `r` and `st` are the tails of an e-final
    /// base (`hate` + `d`).
    pub fn classify(suffix: &str) -> Option<Self> {
        let class = match suffix.to_ascii_lowercase().as_str() {
            "" => SuffixClass::Bare,
            "ing" => SuffixClass::Ing,
            "ed" | "d" => SuffixClass::Ed,
            "ly" => SuffixClass::Ly,
            "er" | "r" => SuffixClass::Er,
            "est" | "st" => SuffixClass::Est,
            "s" | "es" => SuffixClass::Plural,
            _ => return None,
        };
        Some(class)
    }
}

/// How a dictionary key appears before a suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StemForm {
    /// The key itself.
    Key,
    /// Final `e` dropped: `hat` + `ing`.
    DropE,
    /// Final `y` turned to `i`: `happi` + `er`.
    YToI,
    /// Final consonant doubled: `stopp` + `ing`.
    Doubled,
}

/// Surface stems a key can take, besides the key itself.
pub fn derived_stems(key: &str) -> Vec<(String, StemForm)> {
    let chars: Vec<char> = key.chars().collect();
    let mut stems = Vec::new();
    let n = chars.len();
    if n < 2 || !chars.iter().all(|c| c.is_ascii_alphabetic()) {
        return stems;
    }
    let last = chars[n - 1].to_ascii_lowercase();
    let before = chars[n - 2].to_ascii_lowercase();

    if last == 'e' && n > 2 && before != 'e' {
        stems.push((chars[..n - 1].iter().collect(), StemForm::DropE));
    }
    if last == 'y' && !is_vowel(before) {
        let mut stem: String = chars[..n - 1].iter().collect();
        stem.push('i');
        stems.push((stem, StemForm::YToI));
    }
    if is_short_cvc(&chars) {
        let mut stem: String = chars.iter().collect();
        stem.push(chars[n - 1]);
        stems.push((stem, StemForm::Doubled));
    }
    stems
}

/// Whether `suffix` is a valid ending after a key in stem form `form`.
/// `key_ends_in_e` gates the `d`/`r`/`st` tails.
pub fn accepts(form: StemForm, suffix: &str, key_ends_in_e: bool) -> bool {
    let suffix = suffix.to_ascii_lowercase();
    match form {
        StemForm::Key => match suffix.as_str() {
            "d" | "r" | "st" => key_ends_in_e,
            other => SuffixClass::classify(other).is_some(),
        },
        StemForm::DropE | StemForm::Doubled => {
            matches!(suffix.as_str(), "ing" | "ed" | "er" | "est")
        }
        StemForm::YToI => matches!(suffix.as_str(), "es" | "ed" | "er" | "est" | "ly"),
    }
}

/// Re-inflect `word` for `class`.
pub fn inflect(word: &str, class: SuffixClass) -> String {
    match class {
        SuffixClass::Bare => word.to_string(),
        SuffixClass::Ing => format!("{}ing", drop_silent_e(word)),
        SuffixClass::Ed => {
            if ends_with_ci(word, "e") {
                format!("{word}d")
            } else {
                format!("{word}ed")
            }
        }
        SuffixClass::Ly => {
            if let Some(stem) = consonant_y_stem(word) {
                format!("{stem}ily")
            } else {
                format!("{}ly", drop_silent_e(word))
            }
        }
        SuffixClass::Er => format!("{word}er"),
        SuffixClass::Est => format!("{word}est"),
        SuffixClass::Plural => {
            if ["s", "x", "z", "ch", "sh"].iter().any(|s| ends_with_ci(word, s)) {
                format!("{word}es")
            } else if let Some(stem) = consonant_y_stem(word) {
                format!("{stem}ies")
            } else {
                format!("{word}s")
            }
        }
    }
}

fn is_vowel(c: char) -> bool {
    matches!(c.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u')
}

fn ends_with_ci(word: &str, tail: &str) -> bool {
    word.len() >= tail.len()
        && word.is_char_boundary(word.len() - tail.len())
        && word[word.len() - tail.len()..].eq_ignore_ascii_case(tail)
}

/// `bake` -> `bak`; `see` and short words keep their `e`.
fn drop_silent_e(word: &str) -> &str {
    let mut chars = word.chars().rev();
    match (chars.next(), chars.next()) {
        (Some(e), Some(prev))
            if e.eq_ignore_ascii_case(&'e')
                && !prev.eq_ignore_ascii_case(&'e')
                && prev.is_alphabetic()
                && word.chars().count() > 2 =>
        {
            &word[..word.len() - 1]
        }
        _ => word,
    }
}

/// `happy` -> `happ`; `None` for vowel+`y` or no `y`.
fn consonant_y_stem(word: &str) -> Option<&str> {
    let mut chars = word.chars().rev();
    match (chars.next(), chars.next()) {
        (Some(y), Some(prev))
            if y.eq_ignore_ascii_case(&'y') && prev.is_alphabetic() && !is_vowel(prev) =>
        {
            Some(&word[..word.len() - 1])
        }
        _ => None,
    }
}

/// Three-letter consonant-vowel-consonant keys (`stop` counts: one leading
/// cluster). Final w, x and y never double.
fn is_short_cvc(chars: &[char]) -> bool {
    let n = chars.len();
    if !(3..=4).contains(&n) {
        return false;
    }
    let c = chars[n - 1].to_ascii_lowercase();
    let v = chars[n - 2];
    let c0 = chars[n - 3];
    let leading_ok = n == 3 || !is_vowel(chars[0]);
    !is_vowel(c) && !matches!(c, 'w' | 'x' | 'y') && is_vowel(v) && !is_vowel(c0) && leading_ok
}
