//! Canonical form for free-text tag names.

pub const MAX_TAG_NAME_LENGTH: usize = 50;
pub const MIN_TAG_NAME_LENGTH: usize = 2;
pub const MAX_TAGS_PER_RESOURCE: usize = 10;
pub const RESERVED_CHARS: [char; 6] = ['#', '@', '/', '\\', '<', '>'];

/// Trims, collapses whitespace runs, strips reserved characters, truncates to
/// [`MAX_TAG_NAME_LENGTH`] characters and capitalizes the first character.
/// Degenerate input yields an empty string.
pub fn normalize(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let stripped: String = collapsed
        .chars()
        .filter(|c| !RESERVED_CHARS.contains(c))
        .collect();
    // Removing a reserved character can expose new edge or double spaces.
    let cleaned = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    let truncated: String = cleaned.chars().take(MAX_TAG_NAME_LENGTH).collect();
    let truncated = truncated.trim_end();

    let mut chars = truncated.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Whether a normalized name falls inside the accepted length bounds.
pub fn is_valid_length(name: &str) -> bool {
    let len = name.chars().count();
    (MIN_TAG_NAME_LENGTH..=MAX_TAG_NAME_LENGTH).contains(&len)
}

/// Case-insensitive identity key used for lookups and merges.
pub fn identity_key(name: &str) -> String {
    name.trim().to_lowercase()
}
