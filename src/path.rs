//! Dotted-path arithmetic.
//!
//! A path is a sequence of segments joined by `.`; the single path `"."` is
//! the root. A literal dot inside a segment is escaped as `\.`. Paths that
//! begin with `..` are parent-relative: each leading dot beyond the first
//! pops one ancestor segment.

use once_cell::sync::Lazy;
use regex::Regex;

/// Segments that carry a type tag in typed storage mode.
pub const TYPE_TAGS: [&str; 5] = ["~b~", "~n~", "~s~", "~N~", "~e~"];

/// Grammar: a dot (the root), or dot-separated segments of `$`, word
/// characters and escaped dots.
static VARIABLE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\.|(\$|\w|\\\.)+(\.(\$|\w|\\\.)+)*)$").expect("malformed variable-name pattern")
});

pub fn is_variable_name(name: &str) -> bool {
    VARIABLE_NAME.is_match(name)
}

pub fn is_type_tag(segment: &str) -> bool {
    TYPE_TAGS.contains(&segment)
}

/// Split a path on unescaped dots, unescaping `\.` within segments.
/// `split_field(".") == []`.
pub fn split_field(field: &str) -> Vec<String> {
    if field == "." {
        return vec![];
    }
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = field.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'.') => {
                chars.next();
                current.push('.');
            }
            '.' => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

/// Inverse of [split_field]: escape dots within segments and join.
/// `join_field([]) == "."`.
pub fn join_field<S: AsRef<str>>(segments: &[S]) -> String {
    if segments.is_empty() {
        return ".".to_string();
    }
    segments
        .iter()
        .map(|s| literal_field(s.as_ref()))
        .collect::<Vec<_>>()
        .join(".")
}

/// Escape a field name so it reads as a single segment.
pub fn literal_field(field: &str) -> String {
    field.replace('.', "\\.")
}

/// Join `prefix` and `suffix`, normalizing a parent-relative suffix.
pub fn concat_field(prefix: &str, suffix: &str) -> String {
    if suffix.starts_with('.') && suffix != "." {
        let dots = suffix.chars().take_while(|c| *c == '.').count();
        let mut segments = split_field(prefix);
        for _ in 1..dots {
            segments.pop();
        }
        segments.extend(split_field(&suffix[dots..]));
        join_field(&segments)
    } else {
        let mut segments = split_field(prefix);
        segments.extend(split_field(suffix));
        join_field(&segments)
    }
}

/// The path from `parent` to `field`: a plain remainder when `field` is a
/// descendant, a `..`-prefixed path otherwise.
pub fn relative_field(field: &str, parent: &str) -> String {
    if parent == "." {
        return field.to_string();
    }
    let f = split_field(field);
    let p = split_field(parent);
    let common = f.iter().zip(&p).take_while(|(a, b)| a == b).count();
    if common == p.len() {
        if f.len() == common {
            ".".to_string()
        } else {
            join_field(&f[common..])
        }
    } else {
        let dots = ".".repeat(p.len() - common + 1);
        if f.len() == common {
            dots
        } else {
            format!("{dots}{}", join_field(&f[common..]))
        }
    }
}

/// Does `field` sit at or below `prefix`?
pub fn startswith_field(field: &str, prefix: &str) -> bool {
    if prefix == "." {
        return true;
    }
    let f = split_field(field);
    let p = split_field(prefix);
    f.len() >= p.len() && f.iter().zip(&p).all(|(a, b)| a == b)
}

/// Strip type-tag segments (`~n~`, `~s~`, …), recovering the user-visible
/// path of a typed column.
pub fn untype_path(path: &str) -> String {
    let segments: Vec<String> = split_field(path)
        .into_iter()
        .filter(|s| !is_type_tag(s))
        .collect();
    join_field(&segments)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn split_and_join_escape_dots() {
        assert_eq!(split_field("a.b\\.c"), vec!["a", "b.c"]);
        assert_eq!(join_field(&["a", "b.c"]), "a.b\\.c");
        assert_eq!(split_field("."), Vec::<String>::new());
        assert_eq!(join_field(&Vec::<String>::new()), ".");
    }

    #[test]
    fn concat_normalizes_parent_relative_suffixes() {
        assert_eq!(concat_field("a.b", "c"), "a.b.c");
        assert_eq!(concat_field("a.b", "..c"), "a.c");
        assert_eq!(concat_field("a.b", "...c"), "c");
        assert_eq!(concat_field(".", "c"), "c");
        assert_eq!(concat_field("a.b", "."), "a.b");
    }

    #[test]
    fn relative_paths() {
        assert_eq!(relative_field("a.b.c", "a.b"), "c");
        assert_eq!(relative_field("a.c", "a.b"), "..c");
        assert_eq!(relative_field("c", "a.b"), "...c");
        assert_eq!(relative_field("a.b", "a.b"), ".");
        assert_eq!(relative_field("a", "a.b.c"), "...");
        assert_eq!(relative_field("x.y", "."), "x.y");
    }

    #[test]
    fn typed_paths() {
        assert_eq!(untype_path("a.~n~"), "a");
        assert_eq!(untype_path("a.~N~.b.~s~"), "a.b");
        assert_eq!(untype_path("plain"), "plain");
    }

    #[test]
    fn variable_names() {
        assert!(is_variable_name("."));
        assert!(is_variable_name("a"));
        assert!(is_variable_name("a.b"));
        assert!(is_variable_name("build.date"));
        assert!(is_variable_name("$type"));
        assert!(is_variable_name("a.b\\.c"));
        assert!(!is_variable_name(""));
        assert!(!is_variable_name("a..b"));
        assert!(!is_variable_name("a b"));
    }
}
