//! Layout pass over generated Go source.
//!
//! Generators write code without indentation. This pass lays it out the way
//! gofmt does for the code swipe emits:
//!
//! - one tab per open bracket line: a line opening several brackets
//!   (`g(func() {`) indents what follows by a single level;
//! - `case`/`default` labels are outdented;
//! - consecutive struct fields, keyed composite elements and `var`/`const`
//!   specs are aligned into columns, with a blank line or a multi-line
//!   element closing a section;
//! - trailing whitespace is trimmed and runs of blank lines collapse.
//!
//! Raw string literals pass through untouched. Unbalanced brackets are an
//! error.

/// Lexer state carried between lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Code,
    RawString,
    BlockComment,
}

/// What an open bracket encloses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Block,
    Struct,
    Composite,
    /// `var (`, `const (` and `type (` groups.
    Group,
    Paren,
}

#[derive(Debug, Clone, Copy)]
struct Open {
    scope: Scope,
    /// Whether lines inside are indented one more level for this bracket.
    indents: bool,
}

#[derive(Debug)]
struct Line {
    indent: usize,
    text: String,
    /// Copied as is: raw string continuation.
    verbatim: bool,
    /// Innermost bracket around the line, after its leading closers.
    scope: Option<Scope>,
    leads_with_closer: bool,
    /// Leaves a bracket, raw string or comment open.
    opens: bool,
}

pub fn format_go(src: &str) -> Result<String, String> {
    let mut lines = layout(src)?;
    align(&mut lines);

    let mut out = String::with_capacity(src.len() + src.len() / 4);
    for line in &lines {
        if !line.verbatim && !line.text.is_empty() {
            for _ in 0..line.indent {
                out.push('\t');
            }
        }
        out.push_str(&line.text);
        out.push('\n');
    }
    while out.ends_with("\n\n") {
        out.pop();
    }
    Ok(out)
}

fn level(stack: &[Open]) -> usize {
    stack.iter().filter(|o| o.indents).count()
}

/// Indents every line and records the bracket context alignment needs.
fn layout(src: &str) -> Result<Vec<Line>, String> {
    let mut lines: Vec<Line> = Vec::new();
    let mut stack: Vec<Open> = Vec::new();
    let mut mode = Mode::Code;
    let mut blank_run = false;

    for (index, raw_line) in src.lines().enumerate() {
        let lineno = index + 1;
        if mode == Mode::RawString {
            mode = scan(raw_line, &mut stack, mode, lineno)?;
            lines.push(Line {
                indent: 0,
                text: raw_line.to_string(),
                verbatim: true,
                scope: None,
                leads_with_closer: false,
                opens: true,
            });
            continue;
        }

        let text = raw_line.trim();
        if text.is_empty() && mode == Mode::Code {
            if !lines.is_empty() && !blank_run {
                lines.push(Line {
                    indent: 0,
                    text: String::new(),
                    verbatim: false,
                    scope: None,
                    leads_with_closer: false,
                    opens: false,
                });
            }
            blank_run = true;
            continue;
        }
        blank_run = false;

        let start_mode = mode;
        let closers = if mode == Mode::Code {
            text.chars().take_while(|c| matches!(c, '}' | ')' | ']')).count()
        } else {
            0
        };
        let label = mode == Mode::Code && (text.starts_with("case ") || text.starts_with("default:"));
        let scope = stack[..stack.len().saturating_sub(closers)].last().map(|o| o.scope);
        let base = level(&stack);

        let (next_mode, lowest) = scan_line(text, &mut stack, mode, lineno)?;
        mode = next_mode;
        // A line led by closers sits at the outermost level it closes to:
        // `}, x)` lines up with the call it ends.
        let indent = if closers > 0 {
            level(&stack[..lowest])
        } else {
            base.saturating_sub(usize::from(label))
        };
        lines.push(Line {
            indent,
            text: text.to_string(),
            verbatim: false,
            scope: if start_mode == Mode::Code { scope } else { None },
            leads_with_closer: closers > 0,
            opens: stack.len() > lowest || mode != Mode::Code,
        });
    }

    match mode {
        Mode::RawString => return Err("unterminated raw string literal".to_string()),
        Mode::BlockComment => return Err("unterminated block comment".to_string()),
        Mode::Code => {}
    }
    if !stack.is_empty() {
        return Err(format!("unbalanced brackets: {} left open", stack.len()));
    }
    Ok(lines)
}

fn scan(line: &str, stack: &mut Vec<Open>, mode: Mode, lineno: usize) -> Result<Mode, String> {
    scan_line(line, stack, mode, lineno).map(|(mode, _)| mode)
}

/// Updates the bracket stack across one line, skipping literals and
/// comments. Of the brackets this line leaves open, only the outermost
/// indents. Returns the new mode and the lowest stack height seen.
fn scan_line(line: &str, stack: &mut Vec<Open>, mut mode: Mode, lineno: usize) -> Result<(Mode, usize), String> {
    let mut lowest = stack.len();
    let mut chars = line.char_indices().peekable();
    while let Some((at, c)) = chars.next() {
        match mode {
            Mode::RawString => {
                if c == '`' {
                    mode = Mode::Code;
                }
            }
            Mode::BlockComment => {
                if c == '*' && chars.peek().map(|&(_, n)| n) == Some('/') {
                    chars.next();
                    mode = Mode::Code;
                }
            }
            Mode::Code => match c {
                '/' if chars.peek().map(|&(_, n)| n) == Some('/') => break,
                '/' if chars.peek().map(|&(_, n)| n) == Some('*') => {
                    chars.next();
                    mode = Mode::BlockComment;
                }
                '`' => mode = Mode::RawString,
                '"' | '\'' => {
                    let mut escaped = false;
                    let mut closed = false;
                    for (_, q) in chars.by_ref() {
                        if escaped {
                            escaped = false;
                        } else if q == '\\' {
                            escaped = true;
                        } else if q == c {
                            closed = true;
                            break;
                        }
                    }
                    if !closed {
                        return Err(format!("line {lineno}: unterminated literal"));
                    }
                }
                '{' | '(' | '[' => {
                    let enclosing = stack.last().map(|o| o.scope);
                    stack.push(Open {
                        scope: classify(&line[..at], c, enclosing),
                        indents: false,
                    });
                }
                '}' | ')' | ']' => {
                    if stack.pop().is_none() {
                        return Err(format!("line {lineno}: unexpected {c:?}"));
                    }
                    lowest = lowest.min(stack.len());
                }
                _ => {}
            },
        }
    }
    if let Some(first) = stack.get_mut(lowest) {
        first.indents = true;
    }
    Ok((mode, lowest))
}

/// Scope of a bracket from the text before it on its line.
fn classify(prefix: &str, bracket: char, enclosing: Option<Scope>) -> Scope {
    let before = prefix.trim_end();
    match bracket {
        '(' if matches!(before, "var" | "const" | "type") => Scope::Group,
        '(' | '[' => Scope::Paren,
        _ if ends_with_word(before, "struct") => Scope::Struct,
        _ if ends_with_word(before, "interface") => Scope::Block,
        // An element on a line of its own: `{1, 2},` inside a literal.
        _ if before.is_empty() => match enclosing {
            Some(Scope::Composite) => Scope::Composite,
            _ => Scope::Block,
        },
        // Composite literal types touch their brace; blocks are spaced.
        _ if before.len() == prefix.len() => Scope::Composite,
        _ => Scope::Block,
    }
}

fn ends_with_word(s: &str, word: &str) -> bool {
    s.strip_suffix(word)
        .is_some_and(|rest| !rest.ends_with(|c: char| c.is_alphanumeric() || c == '_'))
}

/// Aligns sections of consecutive lines into columns.
fn align(lines: &mut [Line]) {
    let mut section: Vec<(usize, Vec<String>)> = Vec::new();
    let mut key: Option<(usize, Scope)> = None;

    for i in 0..lines.len() {
        let line = &lines[i];
        let alignable = !line.verbatim
            && !line.text.is_empty()
            && !line.leads_with_closer
            && matches!(line.scope, Some(Scope::Struct | Scope::Composite | Scope::Group));
        let this_key = line.scope.map(|scope| (line.indent, scope));

        if alignable && line.text.starts_with("//") {
            continue;
        }
        let cells = if alignable { split_cells(line) } else { None };
        let fits = cells.is_some() && key == this_key;
        if !fits {
            flush(lines, &mut section);
            key = None;
        }
        let Some(cells) = cells else { continue };
        let line = &lines[i];
        // A keyed element spanning lines gets a section of its own.
        if line.opens && line.scope == Some(Scope::Composite) {
            flush(lines, &mut section);
            key = None;
            continue;
        }
        key = this_key;
        let opens = line.opens;
        section.push((i, cells));
        if opens {
            flush(lines, &mut section);
            key = None;
        }
    }
    flush(lines, &mut section);
}

fn flush(lines: &mut [Line], section: &mut Vec<(usize, Vec<String>)>) {
    if section.len() > 1 {
        let rows: Vec<Vec<String>> = section.iter().map(|(_, cells)| cells.clone()).collect();
        for ((index, _), text) in section.iter().zip(tabulate(&rows)) {
            lines[*index].text = text;
        }
    }
    section.clear();
}

/// Column cells of an alignable line; `None` when it has no columns.
fn split_cells(line: &Line) -> Option<Vec<String>> {
    let (code, comment) = split_comment(&line.text);
    let code = code.trim_end();
    let mut cells = match line.scope? {
        Scope::Struct => struct_cells(code)?,
        Scope::Composite => keyed_cells(code)?,
        Scope::Group => spec_cells(code)?,
        Scope::Block | Scope::Paren => return None,
    };
    if let Some(comment) = comment {
        cells.push(comment.to_string());
    }
    (cells.len() > 1).then_some(cells)
}

/// `Name Type` and `Name Type \`tag\``; embedded fields have one cell.
fn struct_cells(code: &str) -> Option<Vec<String>> {
    let Some((name, rest)) = code.split_once(' ') else {
        return Some(vec![code.to_string()]);
    };
    if name.ends_with(',') {
        return None;
    }
    let rest = rest.trim_start();
    let mut cells = vec![name.to_string()];
    match rest.strip_suffix('`').and_then(|r| r.rfind('`')) {
        Some(tag_at) if !rest[..tag_at].trim().is_empty() => {
            cells.push(rest[..tag_at].trim_end().to_string());
            cells.push(rest[tag_at..].to_string());
        }
        _ => cells.push(rest.to_string()),
    }
    Some(cells)
}

/// `Key: value,` in a composite literal.
fn keyed_cells(code: &str) -> Option<Vec<String>> {
    let key_len = if code.starts_with('"') {
        let mut escaped = false;
        let mut end = None;
        for (i, c) in code.char_indices().skip(1) {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                end = Some(i + 1);
                break;
            }
        }
        end?
    } else {
        code.find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '.'))?
    };
    if key_len == 0 {
        return None;
    }
    let value = code[key_len..].strip_prefix(": ")?;
    Some(vec![format!("{}:", &code[..key_len]), value.trim_start().to_string()])
}

/// `name Type`, `name = value` and `name Type = value` specs.
fn spec_cells(code: &str) -> Option<Vec<String>> {
    let Some((name, rest)) = code.split_once(' ') else {
        return Some(vec![code.to_string()]);
    };
    if name.ends_with(',') {
        return None;
    }
    let rest = rest.trim_start();
    if rest.starts_with("= ") {
        return Some(vec![name.to_string(), rest.to_string()]);
    }
    match find_top_level(rest, " = ") {
        Some(at) => Some(vec![
            name.to_string(),
            rest[..at].to_string(),
            rest[at + 1..].to_string(),
        ]),
        None => Some(vec![name.to_string(), rest.to_string()]),
    }
}

/// Splits off a trailing `//` comment outside literals.
fn split_comment(text: &str) -> (&str, Option<&str>) {
    match find_top_level(text, "//") {
        Some(0) | None => (text, None),
        Some(at) => (&text[..at], Some(&text[at..])),
    }
}

/// Byte offset of `pat` outside literals and brackets.
fn find_top_level(s: &str, pat: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' && q != '`' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' | '`' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            _ if depth == 0 && s[i..].starts_with(pat) => return Some(i),
            _ => {}
        }
    }
    None
}

/// Elastic tabstops: a column block is a run of rows that have a cell
/// after the column; the last cell of a row is never padded.
fn tabulate(rows: &[Vec<String>]) -> Vec<String> {
    let mut widths: Vec<Vec<usize>> = rows.iter().map(|r| vec![0; r.len()]).collect();
    column_widths(rows, 0, rows.len(), 0, &mut widths);
    rows.iter()
        .zip(&widths)
        .map(|(cells, widths)| {
            let mut text = String::new();
            for (j, cell) in cells.iter().enumerate() {
                text.push_str(cell);
                if j + 1 < cells.len() {
                    let pad = widths[j].saturating_sub(cell.chars().count()).max(1);
                    text.extend(std::iter::repeat(' ').take(pad));
                }
            }
            text
        })
        .collect()
}

fn column_widths(rows: &[Vec<String>], from: usize, to: usize, column: usize, widths: &mut [Vec<usize>]) {
    let mut i = from;
    while i < to {
        if rows[i].len() <= column + 1 {
            i += 1;
            continue;
        }
        let start = i;
        let mut width = 0;
        while i < to && rows[i].len() > column + 1 {
            width = width.max(rows[i][column].chars().count());
            i += 1;
        }
        for row in &mut widths[start..i] {
            row[column] = width + 1;
        }
        column_widths(rows, start, i, column + 1, widths);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_indents_by_depth() {
        let src = "func f(x int) {\nswitch x {\ncase 1:\nreturn\ndefault:\ng(func() {\nh()\n})\n}\n}\n";
        let want = "func f(x int) {\n\tswitch x {\n\tcase 1:\n\t\treturn\n\tdefault:\n\t\tg(func() {\n\t\t\th()\n\t\t})\n\t}\n}\n";
        assert_eq!(format_go(src).unwrap(), want);
    }

    #[test]
    fn test_one_level_per_line() {
        let src = "func f() {\nr.Methods(\"GET\").Path(\"/\").Handler(kithttp.NewServer(\nep,\ndecode,\n))\n}\n";
        let want = "func f() {\n\tr.Methods(\"GET\").Path(\"/\").Handler(kithttp.NewServer(\n\t\tep,\n\t\tdecode,\n\t))\n}\n";
        assert_eq!(format_go(src).unwrap(), want);

        let src = "func f() {\ng(T{\nA: 1,\n}, x)\n}\n";
        let want = "func f() {\n\tg(T{\n\t\tA: 1,\n\t}, x)\n}\n";
        assert_eq!(format_go(src).unwrap(), want);
    }

    #[test]
    fn test_aligns_struct_fields() {
        let src = "type GetRequest struct {\nFname string `json:\"fname\"`\nId int `json:\"id\"`\n}\n";
        let want = "type GetRequest struct {\n\tFname string `json:\"fname\"`\n\tId    int    `json:\"id\"`\n}\n";
        assert_eq!(format_go(src).unwrap(), want);
    }

    #[test]
    fn test_untagged_field_splits_tag_column() {
        let src = "type T struct {\nA int `json:\"a\"`\nBbbb string\nC int `json:\"c\"`\n}\n";
        let want = "type T struct {\n\tA    int `json:\"a\"`\n\tBbbb string\n\tC    int `json:\"c\"`\n}\n";
        assert_eq!(format_go(src).unwrap(), want);
    }

    #[test]
    fn test_aligns_keyed_elements_and_var_groups() {
        let src = concat!(
            "func f() {\nvar (\nresult User\nerr error\n)\n",
            "o := prometheus.CounterOpts{\nNamespace: ns,\nName: \"request_count\",\n}\n",
            "s := jsonrpc.EndpointCodec{\nEndpoint: ep,\nDecode: func(_ context.Context) error {\nreturn nil\n},\nEncode: enc,\n}\n}\n",
        );
        let want = concat!(
            "func f() {\n\tvar (\n\t\tresult User\n\t\terr    error\n\t)\n",
            "\to := prometheus.CounterOpts{\n\t\tNamespace: ns,\n\t\tName:      \"request_count\",\n\t}\n",
            "\ts := jsonrpc.EndpointCodec{\n\t\tEndpoint: ep,\n\t\tDecode: func(_ context.Context) error {\n\t\t\treturn nil\n\t\t},\n\t\tEncode: enc,\n\t}\n}\n",
        );
        assert_eq!(format_go(src).unwrap(), want);
    }

    #[test]
    fn test_blank_line_and_comments_in_sections() {
        let src = "type T struct {\n// A is a.\nA int\n// Long is long.\nLong string\n\nX bool\n}\n";
        let want = "type T struct {\n\t// A is a.\n\tA    int\n\t// Long is long.\n\tLong string\n\n\tX bool\n}\n";
        assert_eq!(format_go(src).unwrap(), want);
    }

    #[test]
    fn test_blocks_are_not_aligned() {
        let src = "func f() {\nx := 1\nlonger := 2\nif x {\ny := T{A: 1}\n}\n}\n";
        let want = "func f() {\n\tx := 1\n\tlonger := 2\n\tif x {\n\t\ty := T{A: 1}\n\t}\n}\n";
        assert_eq!(format_go(src).unwrap(), want);
    }

    #[test]
    fn test_literals_and_comments_do_not_count() {
        let src = "var s = \"{(\" // }\nvar r = '}'\n/* {\n*/\nvar raw = `\n  {keep}   \n`\n";
        let out = format_go(src).unwrap();
        assert!(out.contains("\n  {keep}   \n"), "{out}");
        assert!(out.starts_with("var s = \"{(\" // }\nvar r = '}'\n"), "{out}");
    }

    #[test]
    fn test_collapses_blank_lines() {
        let src = "\n\npackage a   \n\n\n\nvar x = 1\n\n\n";
        assert_eq!(format_go(src).unwrap(), "package a\n\nvar x = 1\n");
    }

    #[test]
    fn test_unbalanced() {
        assert!(format_go("func f() {\n").unwrap_err().contains("unbalanced"));
        assert!(format_go("}\n").unwrap_err().contains("unexpected"));
        assert!(format_go("var s = `abc\n").is_err());
    }
}
