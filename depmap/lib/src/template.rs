//! Slot substitution for specifier and command templates.
//!
//! Mapping documents describe specifier syntax with `{name}`, `{version}` and
//! `{ranges}` slots, and command templates with a bare `{}` placeholder. Only
//! those fixed slots are recognised. Any other brace text is copied through
//! unchanged.

/// The placeholder token in command templates that receives specifiers.
pub const PLACEHOLDER: &str = "{}";

/// Substitutes named `{slot}` occurrences in a single left-to-right pass.
///
/// Substituted values are never rescanned, so a value containing braces
/// cannot trigger a second substitution.
///
/// ## Examples
///
/// ```
/// use depmap_lib::template::fill;
///
/// let out = fill("{name}>={version}", &[("name", "llvm"), ("version", "20")]);
/// assert_eq!(out, "llvm>=20");
/// ```
pub fn fill(template: &str, slots: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let key = &after[..close];
            slots
                .iter()
                .find(|(slot, _)| *slot == key)
                .map(|(_, value)| (*value, close))
        });
        match value {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fills_known_slots() {
        assert_eq!(
            fill("{name}{ranges}", &[("name", "llvm"), ("ranges", "<22,>=21")]),
            "llvm<22,>=21"
        );
    }

    #[test]
    fn test_repeated_slots_are_all_filled() {
        assert_eq!(fill("{name}-{name}", &[("name", "x")]), "x-x");
    }

    #[test]
    fn test_unknown_slots_are_left_alone() {
        assert_eq!(fill("{name}@{other}", &[("name", "x")]), "x@{other}");
        assert_eq!(fill("{}", &[("name", "x")]), "{}");
    }

    #[test]
    fn test_unbalanced_braces_are_left_alone() {
        assert_eq!(fill("{name", &[("name", "x")]), "{name");
        assert_eq!(fill("a}{name}", &[("name", "x")]), "a}x");
    }

    #[test]
    fn test_values_are_not_rescanned() {
        assert_eq!(
            fill("{name}{version}", &[("name", "{version}"), ("version", "1")]),
            "{version}1"
        );
    }
}
