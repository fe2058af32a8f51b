use rand::Rng;


// Adjusted from https://docs.rs/once_cell/latest/once_cell/#lazily-compiled-regex, but using
// `std::sync::OnceLock` and `regex_lite`.
#[macro_export]
macro_rules! lazy_regex {
    ($re:expr $(,)?) => {{
        static RE: std::sync::OnceLock<regex_lite::Regex> = std::sync::OnceLock::new();
        RE.get_or_init(|| regex_lite::Regex::new($re).unwrap())
    }};
}

// Turns an identifier like "hand_value" into a label like "hand value".
pub fn humanize(key: &str) -> String { key.replace('_', " ") }

pub fn random_alphanumeric(rng: &mut impl Rng, len: usize) -> String {
    rng.sample_iter(rand::distr::Alphanumeric).take(len).map(char::from).collect()
}
