use rand::{seq::SliceRandom, Rng};

const ADJECTIVES: &[&str] = &["happy", "blue", "swift", "clever", "smart", "quick", "red"];
const NOUNS: &[&str] = &["panda", "tree", "rocket", "coffee", "ninja", "star", "unicorn"];

pub const MIN_USERNAME_LEN: usize = 3;
pub const MAX_USERNAME_LEN: usize = 30;

const MAX_STEM_LEN: usize = 12;
// Attempts before a numeric suffix is added to escape a crowded word space.
const PLAIN_ATTEMPTS: u32 = 16;

/// Candidate of the form `{firstname}{adjective}{noun}`, lowercase ASCII.
/// From attempt `PLAIN_ATTEMPTS` onwards a random number is appended.
pub fn candidate<R: Rng + ?Sized>(rng: &mut R, firstname: &str, attempt: u32) -> String {
    let adjective = ADJECTIVES.choose(rng).copied().unwrap_or("happy");
    let noun = NOUNS.choose(rng).copied().unwrap_or("panda");
    let mut name = format!("{}{}{}", stem(firstname), adjective, noun);
    if attempt >= PLAIN_ATTEMPTS {
        name.push_str(&rng.gen_range(0..10_000u32).to_string());
    }
    name
}

/// Used when the availability probe itself fails.
pub fn with_lastname(candidate: &str, lastname: &str) -> String {
    let mut name = format!("{}.{}", candidate, stem(lastname));
    name.truncate(MAX_USERNAME_LEN);
    name.trim_end_matches('.').to_string()
}

fn stem(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .take(MAX_STEM_LEN)
        .collect()
}
