//! Name matching helpers.
//!
//! Bone and mesh names are compared without regard to ASCII case throughout
//! the engine.

/// Case-insensitive equality of two names.
pub fn names_match(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Case-insensitive substring test.
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    let needle = needle.to_ascii_lowercase();
    haystack.to_ascii_lowercase().contains(&needle)
}

/// Returns the index of the first name in `names` matching `name`.
pub fn position_by_name<'a, I>(names: I, name: &str) -> Option<usize>
where
    I: IntoIterator<Item = &'a str>,
{
    names.into_iter().position(|candidate| names_match(candidate, name))
}
