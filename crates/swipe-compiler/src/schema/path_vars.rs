//! Path variables of REST routes: `/users/{id:[0-9]+}/{name}`.

use indexmap::IndexMap;

/// Byte offsets of each top-level `{...}` group, as start/end pairs (end is
/// exclusive).
pub fn brace_indices(path: &str) -> Result<Vec<(usize, usize)>, String> {
    let mut level = 0i32;
    let mut start = 0;
    let mut groups = Vec::new();
    for (i, b) in path.bytes().enumerate() {
        match b {
            b'{' => {
                level += 1;
                if level == 1 {
                    start = i;
                }
            }
            b'}' => {
                level -= 1;
                if level == 0 {
                    groups.push((start, i + 1));
                } else if level < 0 {
                    return Err(unbalanced(path));
                }
            }
            _ => {}
        }
    }
    if level != 0 {
        return Err(unbalanced(path));
    }
    Ok(groups)
}

fn unbalanced(path: &str) -> String {
    format!("mux: unbalanced braces in {path:?}")
}

/// Variable name to regexp (empty when unconstrained), in path order.
pub fn parse(path: &str) -> Result<IndexMap<String, String>, String> {
    let mut vars = IndexMap::new();
    for (start, end) in brace_indices(path)? {
        let inner = &path[start + 1..end - 1];
        let (name, regexp) = inner.split_once(':').unwrap_or((inner, ""));
        vars.insert(name.to_string(), regexp.to_string());
    }
    Ok(vars)
}

/// Replaces each `{name:regexp}` group with `{name}`.
pub fn strip_regexps(path: &str) -> String {
    let Ok(groups) = brace_indices(path) else {
        return path.to_string();
    };
    let mut out = String::with_capacity(path.len());
    let mut last = 0;
    for (start, end) in groups {
        out.push_str(&path[last..start]);
        let inner = &path[start + 1..end - 1];
        let name = inner.split_once(':').map_or(inner, |(n, _)| n);
        out.push('{');
        out.push_str(name);
        out.push('}');
        last = end;
    }
    out.push_str(&path[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vars() {
        let vars = parse("/users/{id:[0-9]+}/files/{name}").unwrap();
        let pairs: Vec<_> = vars.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        assert_eq!(pairs, [("id", "[0-9]+"), ("name", "")]);
        assert!(parse("/plain").unwrap().is_empty());
    }

    #[test]
    fn test_nested_braces_in_regexp() {
        let vars = parse("/a/{code:[a-z]{2}}").unwrap();
        assert_eq!(vars["code"], "[a-z]{2}");
        assert_eq!(strip_regexps("/a/{code:[a-z]{2}}/b"), "/a/{code}/b");
    }

    #[test]
    fn test_unbalanced() {
        assert_eq!(parse("/a/{id").unwrap_err(), r#"mux: unbalanced braces in "/a/{id""#);
        assert!(parse("/a/id}").is_err());
    }
}
