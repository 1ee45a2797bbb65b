use thiserror::Error;

/// Substrings that block a write outright. Checked case-insensitively
/// against the whole text, so bare domains catch full links too.
const BANNED: &[&str] = &[
    "discord.gg/",
    "bit.ly/",
    "t.me/",
    "free nitro",
    "free robux",
    "account generator",
    "onlyfans",
    "viagra",
    "casino bonus",
];

const MAX_LEN: usize = 7000;
const MAX_CHAR_RUN: usize = 21;
const MAX_PUNCT_RUN: usize = 10;
const MAX_EMOJI: usize = 20;

/// Why a piece of text was rejected. The display strings are surfaced to
/// the user verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("empty")]
    Empty,
    #[error("contains a banned word or link")]
    Banned,
    #[error("too many capitals")]
    TooManyCapitals,
    #[error("repeated characters")]
    RepeatedCharacters,
    #[error("too short")]
    TooShort,
    #[error("too long")]
    TooLong,
    #[error("too much punctuation")]
    ExcessivePunctuation,
    #[error("too many emoji")]
    TooManyEmoji,
}

/// Gate free text before any write: post titles and bodies, comments,
/// replies, and chat messages all pass through here. Pure; rules run in
/// order and the first failure wins.
pub fn moderate(text: &str) -> Result<(), Rejection> {
    if text.trim().is_empty() {
        return Err(Rejection::Empty);
    }

    let lower = text.to_lowercase();
    if BANNED.iter().any(|banned| lower.contains(banned)) {
        return Err(Rejection::Banned);
    }

    let len = text.chars().count();

    if len > 50 {
        let letters = text.chars().filter(|c| c.is_alphabetic()).count();
        let uppers = text.chars().filter(|c| c.is_uppercase()).count();
        if letters > 0 && uppers as f64 / letters as f64 > 0.8 {
            return Err(Rejection::TooManyCapitals);
        }
    }

    if longest_same_char_run(text) >= MAX_CHAR_RUN {
        return Err(Rejection::RepeatedCharacters);
    }

    if text.trim().chars().count() < 2 {
        return Err(Rejection::TooShort);
    }

    if len > MAX_LEN {
        return Err(Rejection::TooLong);
    }

    if longest_run_matching(text, |c| c == '!' || c == '?') >= MAX_PUNCT_RUN {
        return Err(Rejection::ExcessivePunctuation);
    }

    // Astral code points: what a UTF-16 surrogate-pair scan would count.
    let emoji = text.chars().filter(|&c| c as u32 > 0xFFFF).count();
    if emoji > MAX_EMOJI {
        return Err(Rejection::TooManyEmoji);
    }

    Ok(())
}

fn longest_same_char_run(text: &str) -> usize {
    let mut best = 0;
    let mut run = 0;
    let mut prev = None;
    for c in text.chars() {
        if Some(c) == prev {
            run += 1;
        } else {
            prev = Some(c);
            run = 1;
        }
        best = best.max(run);
    }
    best
}

fn longest_run_matching(text: &str, pred: impl Fn(char) -> bool) -> usize {
    let mut best = 0;
    let mut run = 0;
    for c in text.chars() {
        if pred(c) {
            run += 1;
            best = best.max(run);
        } else {
            run = 0;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_text_is_empty() {
        assert_eq!(moderate(""), Err(Rejection::Empty));
        assert_eq!(moderate("   \n\t"), Err(Rejection::Empty));
    }

    #[test]
    fn single_character_is_too_short() {
        assert_eq!(moderate("a"), Err(Rejection::TooShort));
        assert_eq!(moderate(" a "), Err(Rejection::TooShort));
    }

    #[test]
    fn repeated_character_run_is_rejected() {
        assert_eq!(moderate(&"x".repeat(21)), Err(Rejection::RepeatedCharacters));
        // 20 in a row is still fine
        assert!(moderate(&"x".repeat(20)).is_ok());
    }

    #[test]
    fn shouting_over_fifty_chars_is_rejected() {
        let text = "HELLO THIS IS SHOUTING OVER FIFTY CHARACTERS LONG TEXT";
        assert!(text.chars().count() > 50);
        assert_eq!(moderate(text), Err(Rejection::TooManyCapitals));
    }

    #[test]
    fn short_shouting_is_allowed() {
        assert!(moderate("OK FINE").is_ok());
    }

    #[test]
    fn banned_substring_is_case_insensitive() {
        assert_eq!(
            moderate("join my server DISCORD.GG/abc123"),
            Err(Rejection::Banned)
        );
    }

    #[test]
    fn overlong_text_is_rejected() {
        let text = "word ".repeat(1500);
        assert!(text.chars().count() > 7000);
        assert_eq!(moderate(&text), Err(Rejection::TooLong));
    }

    #[test]
    fn punctuation_run_is_rejected() {
        assert_eq!(moderate("really?!?!?!?!?!"), Err(Rejection::ExcessivePunctuation));
        assert!(moderate("really?! yes?!").is_ok());
    }

    #[test]
    fn emoji_flood_is_rejected() {
        // Alternate two emoji so the repeated-character rule stays quiet.
        let text = format!("nice {}", "\u{1F600}\u{1F601}".repeat(11));
        assert_eq!(moderate(&text), Err(Rejection::TooManyEmoji));
        let ok = format!("nice {}", "\u{1F600}\u{1F601}".repeat(10));
        assert!(moderate(&ok).is_ok());
    }

    #[test]
    fn ordinary_text_passes() {
        assert!(moderate("What did everyone think of the finale?").is_ok());
    }

    #[test]
    fn first_failing_rule_wins() {
        // Blank beats everything else; banned beats the length rules.
        assert_eq!(moderate(" "), Err(Rejection::Empty));
        let text = format!("bit.ly/{}", "x".repeat(30));
        assert_eq!(moderate(&text), Err(Rejection::Banned));
    }
}
