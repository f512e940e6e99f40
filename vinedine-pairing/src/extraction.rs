//! Structured fields from generated text
//!
//! Everything here is pure and total: a label or pattern that cannot be found
//! yields `None` (or leaves the line untouched), never an error. Callers treat
//! a miss as soft and carry on with the field absent.

use std::collections::BTreeMap;

use crate::models::SectionLabel;

/// Song and artist named in generated text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongHint {
    pub song_name: String,
    pub artist_name: String,
}

/// Recipe name from the first line carrying `Title:`
pub fn extract_title(text: &str) -> Option<String> {
    let token = SectionLabel::Title.token();
    text.lines()
        .find_map(|line| line.find(token).map(|at| &line[at + token.len()..]))
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .map(str::to_string)
}

/// Find `"<song>" by <artist>` in generated text
///
/// The song is the shortest quoted span that lets the rest match; the artist
/// runs up to the first whitespace or period after its first character.
/// Neither may cross a line break.
pub fn extract_song_hint(text: &str) -> Option<SongHint> {
    const JOINER: &str = " by ";

    let quotes: Vec<usize> = text.match_indices('"').map(|(i, _)| i).collect();

    for (n, &open) in quotes.iter().enumerate() {
        for &close in &quotes[n + 1..] {
            let song = &text[open + 1..close];
            if song.contains('\n') {
                break;
            }
            if song.is_empty() {
                continue;
            }

            let after = &text[close + 1..];
            let Some(rest) = after.strip_prefix(JOINER) else {
                continue;
            };
            if let Some(artist) = leading_artist(rest) {
                return Some(SongHint {
                    song_name: song.to_string(),
                    artist_name: artist.to_string(),
                });
            }
        }
    }

    None
}

/// Shortest non-empty prefix followed by whitespace or '.', without a newline
fn leading_artist(rest: &str) -> Option<&str> {
    let mut chars = rest.char_indices();
    let (_, first) = chars.next()?;
    if first == '\n' {
        return None;
    }

    for (at, c) in chars {
        if c.is_whitespace() || c == '.' {
            return Some(&rest[..at]);
        }
    }

    None
}

/// Render section tokens as markup, one substitution per line
///
/// A `Title:` line becomes an `<h3>` heading; any other label token is wrapped
/// in `<b>`. Lines already carrying the bold markup are left alone, so the
/// function is idempotent.
pub fn format_sections(text: &str) -> String {
    text.split('\n')
        .map(format_line)
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_line(line: &str) -> String {
    if line.starts_with("<h3>") && line.ends_with("</h3>") {
        return line.to_string();
    }

    let Some(label) = SectionLabel::find_in(line) else {
        return line.to_string();
    };
    let token = label.token();

    if label == SectionLabel::Title {
        return format!("<h3>{}</h3>", line.replace(token, "").trim());
    }

    let bold = format!("<b>{}</b>", token);
    if line.contains(&bold) {
        return line.to_string();
    }
    line.replace(token, &bold)
}

/// Text following each label up to the next labeled line
///
/// The first occurrence of a label wins; blank lines are dropped from section
/// bodies.
pub fn split_sections(text: &str) -> BTreeMap<SectionLabel, String> {
    let mut sections = BTreeMap::new();
    let mut current: Option<(SectionLabel, Vec<&str>)> = None;

    for line in text.lines() {
        match SectionLabel::find_in(line) {
            Some(label) => {
                flush_section(&mut sections, current.take());
                let token = label.token();
                let at = line.find(token).unwrap_or(0);
                let rest = line[at + token.len()..].trim();
                let mut body = Vec::new();
                if !rest.is_empty() {
                    body.push(rest);
                }
                current = Some((label, body));
            }
            None => {
                if let Some((_, body)) = current.as_mut() {
                    if !line.trim().is_empty() {
                        body.push(line.trim_end());
                    }
                }
            }
        }
    }
    flush_section(&mut sections, current);

    sections
}

fn flush_section(
    sections: &mut BTreeMap<SectionLabel, String>,
    current: Option<(SectionLabel, Vec<&str>)>,
) {
    if let Some((label, body)) = current {
        sections.entry(label).or_insert_with(|| body.join("\n"));
    }
}

/// Ordered items of the first well-formed bracketed list in `text`
///
/// Accepts `['a', "b", c]`: items may be single-quoted, double-quoted (with
/// backslash escapes) or bare. Blank items are dropped. A span holding quoted
/// items wins over an earlier all-bare one, so `see [1]` before the real list
/// is skipped. Returns `None` when no bracketed span closes or the span holds
/// no items.
pub fn parse_genre_list(text: &str) -> Option<Vec<String>> {
    let mut first_bare = None;

    for (open, _) in text.match_indices('[') {
        match parse_list_at(&text[open + 1..]) {
            Some((items, true)) => return Some(items),
            Some((items, false)) if first_bare.is_none() => first_bare = Some(items),
            _ => {}
        }
    }

    first_bare
}

/// Items of the span opening just before `span`, and whether any was quoted
fn parse_list_at(span: &str) -> Option<(Vec<String>, bool)> {
    let mut items = Vec::new();
    let mut quoted = false;
    let mut chars = span.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        let item = match chars.peek().copied()? {
            ']' => {
                chars.next();
                break;
            }
            quote @ ('\'' | '"') => {
                chars.next();
                quoted = true;
                let mut value = String::new();
                loop {
                    match chars.next()? {
                        '\\' => value.push(chars.next()?),
                        c if c == quote => break,
                        c => value.push(c),
                    }
                }
                while chars.next_if(|c| c.is_whitespace()).is_some() {}
                value
            }
            _ => {
                let mut value = String::new();
                while let Some(c) = chars.next_if(|c| *c != ',' && *c != ']') {
                    if c == '[' || c == '\n' {
                        return None;
                    }
                    value.push(c);
                }
                value
            }
        };

        let item = item.trim();
        if !item.is_empty() {
            items.push(item.to_string());
        }

        match chars.next()? {
            ',' => continue,
            ']' => break,
            _ => return None,
        }
    }

    if items.is_empty() {
        None
    } else {
        Some((items, quoted))
    }
}
