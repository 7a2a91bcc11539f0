//! Text renderings of clustering results: DOT graphs and Newick trees.

/// Quote a string as a DOT identifier.
pub fn dot_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Newick leaf label, single-quoted when it contains reserved characters.
pub fn newick_label(s: &str) -> String {
    const RESERVED: &[char] = &['(', ')', '[', ']', ':', ';', ',', '\'', ' ', '\t', '\n'];
    if !s.is_empty() && !s.contains(RESERVED) {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', "''"))
}

/// Branch length as printed in Newick output.
pub fn newick_length(length: f64) -> String {
    format!("{:.6}", length.max(0.0))
}
