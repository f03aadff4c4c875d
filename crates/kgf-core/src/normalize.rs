//! Name normalization shared by both stores.
//!
//! Normalization trims, collapses whitespace, case-folds and removes a fixed
//! allow-list of academic titles. Anything not on the list is kept, so two
//! distinct people never normalize to the same key unless their names only
//! differ by a recognised title.

/// Titles removed when they appear as a bracketed qualifier, a leading prefix
/// or a comma-separated suffix. Longest first.
const LATIN_TITLES: &[&str] = &[
    "associate professor",
    "assistant professor",
    "distinguished professor",
    "emeritus professor",
    "professor emeritus",
    "senior lecturer",
    "professor",
    "lecturer",
    "assoc. prof.",
    "asst. prof.",
    "prof.",
];

/// CJK titles, also removed when directly appended to a name. Longest first.
const CJK_TITLES: &[&str] = &[
    "博士生导师",
    "硕士生导师",
    "副研究员",
    "助理教授",
    "副教授",
    "研究员",
    "教授",
    "讲师",
    "博导",
    "硕导",
];

/// Normalize a raw name into its identity key.
pub fn normalize_name(raw: &str) -> String {
    let base = collapse(&raw.to_lowercase());
    let stripped = strip_titles(&base);
    if stripped.is_empty() {
        base
    } else {
        stripped
    }
}

fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_titles(name: &str) -> String {
    let mut current = strip_bracketed(name);

    loop {
        let before = current.clone();
        current = strip_prefix_title(&current);
        current = strip_suffix_title(&current);
        if current == before {
            break;
        }
    }

    current
}

/// Drop `(...)` / `（...）` groups whose content is only titles.
fn strip_bracketed(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut rest = name;

    while let Some(open) = rest.find(['(', '（']) {
        let open_len = rest[open..].chars().next().map_or(1, char::len_utf8);
        let inner_start = open + open_len;
        let Some(close_rel) = rest[inner_start..].find([')', '）']) else {
            break;
        };
        let close = inner_start + close_rel;
        let close_len = rest[close..].chars().next().map_or(1, char::len_utf8);
        let inner = &rest[inner_start..close];

        out.push_str(&rest[..open]);
        if !is_title_list(inner) {
            out.push_str(&rest[open..close + close_len]);
        }
        out.push(' ');
        rest = &rest[close + close_len..];
    }
    out.push_str(rest);
    collapse(&out)
}

fn is_title_list(inner: &str) -> bool {
    let parts: Vec<&str> = inner
        .split([',', '，', '、', '/', ';'])
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    !parts.is_empty() && parts.iter().all(|p| is_title(p))
}

fn is_title(s: &str) -> bool {
    let s = collapse(s);
    LATIN_TITLES.contains(&s.as_str()) || CJK_TITLES.contains(&s.as_str())
}

fn strip_prefix_title(name: &str) -> String {
    for title in LATIN_TITLES {
        if let Some(rest) = name.strip_prefix(title) {
            if rest.starts_with(' ') && !rest.trim().is_empty() {
                return rest.trim().to_string();
            }
        }
    }
    name.to_string()
}

fn strip_suffix_title(name: &str) -> String {
    for title in LATIN_TITLES {
        if let Some(rest) = name.strip_suffix(title) {
            let rest = rest.trim_end();
            if let Some(rest) = rest.strip_suffix([',', '，']) {
                if !rest.trim().is_empty() {
                    return rest.trim().to_string();
                }
            }
        }
    }
    for title in CJK_TITLES {
        if let Some(rest) = name.strip_suffix(title) {
            let rest = rest.trim_end().trim_end_matches([',', '，', '、']).trim_end();
            if rest.chars().count() >= 2 {
                return rest.to_string();
            }
        }
    }
    name.to_string()
}
