use std::collections::HashMap;

/// Shannon entropy in bits per character.
///
/// H = -sum(p(c) * log2(p(c))) over the character frequencies of `text`.
/// The empty string has entropy 0.
#[must_use]
pub fn shannon_entropy(text: &str) -> f64 {
    if text.is_empty() {
        return 0.0;
    }

    if text.is_ascii() {
        let mut char_counts = [0u32; 128];
        for byte in text.bytes() {
            char_counts[byte as usize] += 1;
        }
        return entropy_from_counts(char_counts.iter().copied(), text.len());
    }

    let mut char_counts: HashMap<char, u32> = HashMap::new();
    let mut total = 0usize;
    for ch in text.chars() {
        *char_counts.entry(ch).or_insert(0) += 1;
        total += 1;
    }
    entropy_from_counts(char_counts.into_values(), total)
}

fn entropy_from_counts(counts: impl Iterator<Item = u32>, total: usize) -> f64 {
    let total = total as f64;
    let mut entropy = 0.0;
    for count in counts {
        if count > 0 {
            let p = f64::from(count) / total;
            entropy -= p * p.log2();
        }
    }
    entropy
}
