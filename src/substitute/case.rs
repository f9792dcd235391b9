/// Letter-case shape of a matched word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasePattern {
    /// At least two cased letters, all upper.
    Upper,
    /// First cased letter upper.
    Title,
    Lower,
}

impl CasePattern {
    pub fn of(word: &str) -> Self {
        let mut cased = word.chars().filter(|c| c.is_lowercase() || c.is_uppercase());
        let Some(first) = cased.next() else {
            return CasePattern::Lower;
        };
        let mut count = 1;
        let mut all_upper = first.is_uppercase();
        for c in cased {
            count += 1;
            all_upper &= c.is_uppercase();
        }
        if all_upper && count >= 2 {
            CasePattern::Upper
        } else if first.is_uppercase() {
            CasePattern::Title
        } else {
            CasePattern::Lower
        }
    }

    pub fn apply(self, word: &str) -> String {
        match self {
            CasePattern::Upper => word.to_uppercase(),
            CasePattern::Lower => word.to_lowercase(),
            CasePattern::Title => {
                let lower = word.to_lowercase();
                let mut chars = lower.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            }
        }
    }
}
