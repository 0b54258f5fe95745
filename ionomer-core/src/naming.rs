use serde::{Deserialize, Serialize};

/// How declared member names become encoded field names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamingConvention {
    /// Names are written as declared.
    Identity,
    /// `yearOfManufacture`
    #[default]
    CamelCase,
    /// `YearOfManufacture`
    TitleCase,
    /// `year_of_manufacture`
    SnakeCase,
}

impl NamingConvention {
    /// Converts a declared member name.
    ///
    /// Underscore separated names are joined for the camel and title
    /// conventions; names without underscores only have their first
    /// character changed.
    pub fn apply(self, name: &str) -> String {
        match self {
            NamingConvention::Identity => name.to_string(),
            NamingConvention::CamelCase => join_segments(name, false),
            NamingConvention::TitleCase => join_segments(name, true),
            NamingConvention::SnakeCase => to_snake(name),
        }
    }
}

/// Resolves the encoded name of a member: an explicit override always wins.
pub fn encoded_name(declared: &str, rename: Option<&str>, convention: NamingConvention) -> String {
    match rename {
        Some(explicit) => explicit.to_string(),
        None => convention.apply(declared),
    }
}

fn join_segments(name: &str, upper_first: bool) -> String {
    if !name.contains('_') {
        return recase_first(name, upper_first);
    }
    let mut segments = name.split('_').filter(|s| !s.is_empty());
    let Some(first) = segments.next() else {
        return name.to_string();
    };
    let mut out = recase_first(first, upper_first);
    for segment in segments {
        out.push_str(&recase_first(segment, true));
    }
    out
}

fn recase_first(segment: &str, upper: bool) -> String {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if upper => c.to_uppercase().chain(chars).collect(),
        Some(c) => c.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn to_snake(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
