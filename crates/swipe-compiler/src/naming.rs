//! Identifier case conversions used for generated names.

/// Splits an identifier into words at `_`, `-`, `.`, spaces, lower-to-upper
/// transitions, digit-to-upper transitions and the end of an acronym
/// (`HTTPServer` is `HTTP`, `Server`).
pub fn words(s: &str) -> Vec<String> {
    let chars: Vec<char> = s.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();
    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_lower) {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// `fld_int_req` -> `FldIntReq`. Interior capitals are kept.
pub fn to_camel(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut upper_next = true;
    for c in s.chars() {
        if !c.is_alphanumeric() {
            upper_next = true;
            continue;
        }
        if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// `FldIntReq` -> `fldIntReq`, `ID` -> `id`.
pub fn to_lower_camel(s: &str) -> String {
    if s.chars().all(|c| !c.is_lowercase()) {
        return s.to_lowercase();
    }
    lc_first(&to_camel(s))
}

/// `FldIntReq` -> `FLD_INT_REQ`.
pub fn to_screaming_snake(s: &str) -> String {
    words(s).iter().map(|w| w.to_uppercase()).collect::<Vec<_>>().join("_")
}

/// `FldIntReq` -> `fld-int-req`.
pub fn to_kebab(s: &str) -> String {
    words(s).iter().map(|w| w.to_lowercase()).collect::<Vec<_>>().join("-")
}

pub fn uc_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn lc_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Lowercases every capital that follows another capital: `HTTPAddr` ->
/// `HttpAddr`.
pub fn normalize_camel_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    chars
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            if i > 0 && c.is_uppercase() && chars[i - 1].is_uppercase() && chars.get(i + 1).map_or(true, |n| !n.is_lowercase()) {
                c.to_lowercase().next().unwrap_or(c)
            } else {
                c
            }
        })
        .collect()
}
