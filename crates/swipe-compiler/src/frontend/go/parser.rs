//! Go parser using tree-sitter.

use std::path::{Path, PathBuf};
use tree_sitter::{Node, Parser};

use super::ast::*;
use crate::diagnostic::{CompilerError, Span};

/// Go source parser.
pub struct GoParser {
    parser: Parser,
}

impl GoParser {
    pub fn new() -> Result<Self, CompilerError> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_go::LANGUAGE.into())
            .map_err(|_| CompilerError::ParserInitFailed)?;
        Ok(Self { parser })
    }

    /// Parses a Go source file.
    pub fn parse(&mut self, source: &str, path: &Path) -> Result<ParsedFile, CompilerError> {
        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| CompilerError::ParseFailed {
                path: path.to_path_buf(),
            })?;

        let root = tree.root_node();
        let visitor = Visitor::new(source, path, root);

        if root.has_error() {
            if let Some(bad) = first_error(root) {
                let message = if bad.is_missing() {
                    format!("missing {}", bad.kind())
                } else {
                    format!("unexpected {:?}", truncate(visitor.node_text(bad), 32))
                };
                return Err(CompilerError::SyntaxError {
                    message,
                    span: visitor.span(bad),
                });
            }
        }

        visitor.visit_source_file(root)
    }
}

fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    let children: Vec<_> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .filter(|c| c.has_error() || c.is_missing())
        .find_map(first_error)
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Decodes a Go string literal (interpreted or raw) into its value.
pub fn unquote(lit: &str) -> String {
    if let Some(raw) = lit.strip_prefix('`').and_then(|s| s.strip_suffix('`')) {
        return raw.replace('\r', "");
    }
    let inner = lit
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| lit.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))
        .unwrap_or(lit);

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('a') => out.push('\x07'),
            Some('b') => out.push('\x08'),
            Some('f') => out.push('\x0c'),
            Some('v') => out.push('\x0b'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some(kind @ ('x' | 'u' | 'U')) => {
                let len = match kind {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let hex: String = (0..len).filter_map(|_| chars.next()).collect();
                if let Some(ch) = u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    out.push(ch);
                }
            }
            Some(d @ '0'..='7') => {
                let mut oct = String::from(d);
                for _ in 0..2 {
                    if let Some(&n) = chars.peek() {
                        if n.is_digit(8) {
                            oct.push(n);
                            chars.next();
                        }
                    }
                }
                if let Some(ch) = u32::from_str_radix(&oct, 8).ok().and_then(char::from_u32) {
                    out.push(ch);
                }
            }
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

struct CommentNode {
    start_row: usize,
    end_row: usize,
    start_col: usize,
    /// True when nothing but whitespace precedes the comment on its line.
    own_line: bool,
    text: String,
}

struct Visitor<'a> {
    source: &'a str,
    path: PathBuf,
    comments: Vec<CommentNode>,
}

impl<'a> Visitor<'a> {
    fn new(source: &'a str, path: &Path, root: Node) -> Self {
        let mut visitor = Self {
            source,
            path: path.to_path_buf(),
            comments: Vec::new(),
        };
        visitor.collect_comments(root);
        visitor.comments.sort_by_key(|c| (c.start_row, c.start_col));
        visitor
    }

    fn collect_comments(&mut self, node: Node) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "comment" {
                let start = child.start_position();
                let line_start = self.source[..child.start_byte()]
                    .rfind('\n')
                    .map(|i| i + 1)
                    .unwrap_or(0);
                let own_line = self.source[line_start..child.start_byte()].trim().is_empty();
                let text = self.node_text(child).to_string();
                self.comments.push(CommentNode {
                    start_row: start.row,
                    end_row: child.end_position().row,
                    start_col: start.column,
                    own_line,
                    text,
                });
            } else if child.child_count() > 0 {
                self.collect_comments(child);
            }
        }
    }

    /// Comment lines directly above `node`, without blank-line gaps.
    fn doc_for(&self, node: Node) -> Vec<String> {
        let mut expected = node.start_position().row;
        let mut lines = Vec::new();
        for comment in self.comments.iter().rev() {
            if comment.start_row >= node.start_position().row {
                continue;
            }
            if comment.end_row + 1 != expected || !comment.own_line {
                if comment.end_row + 1 < expected {
                    break;
                }
                continue;
            }
            lines.push(clean_comment(&comment.text));
            expected = comment.start_row;
        }
        lines.reverse();
        lines.into_iter().flatten().collect()
    }

    /// Comment on the same line after `node`.
    fn trailing_comment(&self, node: Node) -> Vec<String> {
        let end = node.end_position();
        self.comments
            .iter()
            .filter(|c| c.start_row == end.row && c.start_col >= end.column && !c.own_line)
            .flat_map(|c| clean_comment(&c.text))
            .collect()
    }

    fn span(&self, node: Node) -> Span {
        let start = node.start_position();
        let end = node.end_position();
        Span::new(
            self.path.clone(),
            start.row + 1,
            start.column + 1,
            end.row + 1,
            end.column + 1,
        )
    }

    fn node_text(&self, node: Node) -> &'a str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    fn ident(&self, node: Node) -> Ident {
        Ident::new(self.node_text(node), self.span(node))
    }

    fn named_children<'t>(&self, node: Node<'t>) -> Vec<Node<'t>> {
        let mut cursor = node.walk();
        node.named_children(&mut cursor)
            .filter(|c| c.kind() != "comment")
            .collect()
    }

    fn field_names(&self, node: Node) -> Vec<Ident> {
        let mut cursor = node.walk();
        node.children_by_field_name("name", &mut cursor)
            .map(|n| self.ident(n))
            .collect()
    }

    // =========================================================================
    // Declarations
    // =========================================================================

    fn visit_source_file(&self, root: Node) -> Result<ParsedFile, CompilerError> {
        let mut package = None;
        let mut imports = Vec::new();
        let mut decls = Vec::new();

        for child in self.named_children(root) {
            match child.kind() {
                "package_clause" => {
                    if let Some(name) = self.named_children(child).first() {
                        package = Some(self.ident(*name));
                    }
                }
                "import_declaration" => self.visit_import_decl(child, &mut imports),
                "function_declaration" | "method_declaration" => {
                    decls.push(Decl::Func(self.visit_func_decl(child)));
                }
                "type_declaration" => decls.push(Decl::Type(self.visit_type_decl(child))),
                "const_declaration" => decls.push(Decl::Const(self.visit_const_decl(child))),
                "var_declaration" => decls.push(Decl::Var(self.visit_var_decl(child))),
                _ => {}
            }
        }

        let package = package.ok_or_else(|| CompilerError::SyntaxError {
            message: "missing package clause".to_string(),
            span: Span::new(self.path.clone(), 1, 1, 1, 1),
        })?;

        Ok(ParsedFile {
            path: self.path.clone(),
            build_constraint: self.build_constraint(package.span.start_line),
            package,
            imports,
            decls,
        })
    }

    fn build_constraint(&self, package_line: usize) -> Option<String> {
        let header: Vec<&CommentNode> = self
            .comments
            .iter()
            .filter(|c| c.start_row + 1 < package_line)
            .collect();
        header
            .iter()
            .find_map(|c| c.text.strip_prefix("//go:build ").map(|s| s.trim().to_string()))
            .or_else(|| {
                header
                    .iter()
                    .find_map(|c| c.text.strip_prefix("// +build ").map(|s| s.trim().to_string()))
            })
    }

    fn visit_import_decl(&self, node: Node, imports: &mut Vec<ImportSpec>) {
        for child in self.named_children(node) {
            match child.kind() {
                "import_spec" => imports.push(self.visit_import_spec(child)),
                "import_spec_list" => {
                    for spec in self.named_children(child) {
                        if spec.kind() == "import_spec" {
                            imports.push(self.visit_import_spec(spec));
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn visit_import_spec(&self, node: Node) -> ImportSpec {
        let name = node
            .child_by_field_name("name")
            .map(|n| self.node_text(n).to_string());
        let path = node
            .child_by_field_name("path")
            .map(|n| unquote(self.node_text(n)))
            .unwrap_or_default();
        ImportSpec {
            name,
            path,
            span: self.span(node),
        }
    }

    fn visit_func_decl(&self, node: Node) -> FuncDecl {
        let name = node
            .child_by_field_name("name")
            .map(|n| self.ident(n))
            .unwrap_or_else(|| Ident::new("_", self.span(node)));
        let recv = node
            .child_by_field_name("receiver")
            .and_then(|r| self.visit_parameter_list(r).into_iter().next());
        FuncDecl {
            name,
            recv,
            sig: self.visit_signature(node),
            body: node.child_by_field_name("body").map(|b| self.visit_block(b)),
            doc: self.doc_for(node),
            span: self.span(node),
        }
    }

    fn visit_signature(&self, node: Node) -> FuncType {
        FuncType {
            params: node
                .child_by_field_name("parameters")
                .map(|p| self.visit_parameter_list(p))
                .unwrap_or_default(),
            results: node
                .child_by_field_name("result")
                .map(|r| self.visit_result(r))
                .unwrap_or_default(),
        }
    }

    fn visit_result(&self, node: Node) -> Vec<Field> {
        if node.kind() == "parameter_list" {
            self.visit_parameter_list(node)
        } else {
            vec![Field::new(Vec::new(), self.visit_type(node))]
        }
    }

    fn visit_parameter_list(&self, node: Node) -> Vec<Field> {
        let mut fields = Vec::new();
        for child in self.named_children(node) {
            let variadic = match child.kind() {
                "parameter_declaration" => false,
                "variadic_parameter_declaration" => true,
                _ => continue,
            };
            let Some(ty) = child.child_by_field_name("type") else {
                continue;
            };
            let mut field = Field::new(self.field_names(child), self.visit_type(ty));
            field.variadic = variadic;
            field.span = self.span(child);
            fields.push(field);
        }
        fields
    }

    fn visit_type_decl(&self, node: Node) -> Vec<TypeSpec> {
        let grouped = self.named_children(node).len() > 1
            || self.node_text(node).trim_start_matches("type").trim_start().starts_with('(');
        self.named_children(node)
            .into_iter()
            .filter(|c| matches!(c.kind(), "type_spec" | "type_alias"))
            .filter_map(|spec| {
                let name = self.ident(spec.child_by_field_name("name")?);
                let ty = self.visit_type(spec.child_by_field_name("type")?);
                let mut doc = self.doc_for(spec);
                if doc.is_empty() && !grouped {
                    doc = self.doc_for(node);
                }
                Some(TypeSpec {
                    name,
                    alias: spec.kind() == "type_alias",
                    ty,
                    doc,
                    span: self.span(spec),
                })
            })
            .collect()
    }

    fn visit_const_decl(&self, node: Node) -> Vec<ValueSpec> {
        self.named_children(node)
            .into_iter()
            .filter(|c| c.kind() == "const_spec")
            .enumerate()
            .map(|(iota, spec)| self.visit_value_spec(spec, iota as i64))
            .collect()
    }

    fn visit_var_decl(&self, node: Node) -> Vec<ValueSpec> {
        let mut specs = Vec::new();
        for child in self.named_children(node) {
            match child.kind() {
                "var_spec" => specs.push(self.visit_value_spec(child, 0)),
                "var_spec_list" => specs.extend(
                    self.named_children(child)
                        .into_iter()
                        .filter(|c| c.kind() == "var_spec")
                        .map(|c| self.visit_value_spec(c, 0)),
                ),
                _ => {}
            }
        }
        specs
    }

    fn visit_value_spec(&self, node: Node, iota: i64) -> ValueSpec {
        let mut doc = self.doc_for(node);
        if doc.is_empty() {
            if let Some(parent) = node.parent() {
                if parent.named_child_count() == 1 {
                    doc = self.doc_for(parent);
                }
            }
        }
        ValueSpec {
            names: self.field_names(node),
            ty: node.child_by_field_name("type").map(|t| self.visit_type(t)),
            values: node
                .child_by_field_name("value")
                .map(|v| self.visit_expr_list(v))
                .unwrap_or_default(),
            iota,
            doc,
            span: self.span(node),
        }
    }

    // =========================================================================
    // Types
    // =========================================================================

    fn visit_type(&self, node: Node) -> Expr {
        let span = self.span(node);
        let kind = match node.kind() {
            "type_identifier" | "identifier" | "field_identifier" | "package_identifier" => {
                ExprKind::Ident(self.node_text(node).to_string())
            }
            "qualified_type" => {
                let (Some(pkg), Some(name)) = (
                    node.child_by_field_name("package"),
                    node.child_by_field_name("name"),
                ) else {
                    return self.bad(node);
                };
                ExprKind::Selector {
                    x: Box::new(Expr::new(
                        ExprKind::Ident(self.node_text(pkg).to_string()),
                        self.span(pkg),
                    )),
                    sel: self.ident(name),
                }
            }
            "pointer_type" => match self.named_children(node).first() {
                Some(inner) => ExprKind::Star(Box::new(self.visit_type(*inner))),
                None => return self.bad(node),
            },
            "slice_type" => ExprKind::ArrayType {
                len: None,
                elt: Box::new(self.field_type(node, "element")),
            },
            "array_type" => ExprKind::ArrayType {
                len: node
                    .child_by_field_name("length")
                    .map(|l| Box::new(self.visit_expr(l))),
                elt: Box::new(self.field_type(node, "element")),
            },
            "implicit_length_array_type" => ExprKind::ArrayType {
                len: Some(Box::new(Expr::new(ExprKind::Ellipsis(None), span.clone()))),
                elt: Box::new(self.field_type(node, "element")),
            },
            "map_type" => ExprKind::MapType {
                key: Box::new(self.field_type(node, "key")),
                value: Box::new(self.field_type(node, "value")),
            },
            "channel_type" => {
                let text = self.node_text(node);
                let dir = if text.starts_with("<-") {
                    ChanDir::Recv
                } else if text["chan".len().min(text.len())..].trim_start().starts_with("<-") {
                    ChanDir::Send
                } else {
                    ChanDir::Both
                };
                ExprKind::ChanType {
                    dir,
                    value: Box::new(self.field_type(node, "value")),
                }
            }
            "function_type" => ExprKind::FuncType(self.visit_signature(node)),
            "struct_type" => {
                let fields = self
                    .named_children(node)
                    .into_iter()
                    .find(|c| c.kind() == "field_declaration_list")
                    .map(|list| self.visit_field_decl_list(list))
                    .unwrap_or_default();
                ExprKind::StructType(fields)
            }
            "interface_type" => ExprKind::InterfaceType(self.visit_interface(node)),
            "parenthesized_type" => match self.named_children(node).first() {
                Some(inner) => ExprKind::Paren(Box::new(self.visit_type(*inner))),
                None => return self.bad(node),
            },
            "generic_type" => {
                let index = node
                    .child_by_field_name("type_arguments")
                    .map(|args| {
                        self.named_children(args)
                            .into_iter()
                            .map(|a| self.visit_type(a))
                            .collect()
                    })
                    .unwrap_or_default();
                ExprKind::Index {
                    x: Box::new(self.field_type(node, "type")),
                    index,
                }
            }
            "negated_type" => match self.named_children(node).first() {
                Some(inner) => ExprKind::Unary {
                    op: "~".to_string(),
                    x: Box::new(self.visit_type(*inner)),
                },
                None => return self.bad(node),
            },
            "type_elem" | "constraint_elem" => {
                let mut parts = self.named_children(node).into_iter().map(|t| self.visit_type(t));
                let Some(first) = parts.next() else {
                    return self.bad(node);
                };
                return parts.fold(first, |acc, next| {
                    let span = acc.span.clone();
                    Expr::new(
                        ExprKind::Binary {
                            op: "|".to_string(),
                            x: Box::new(acc),
                            y: Box::new(next),
                        },
                        span,
                    )
                });
            }
            _ => return self.visit_expr(node),
        };
        Expr::new(kind, span)
    }

    fn field_type(&self, node: Node, field: &str) -> Expr {
        match node.child_by_field_name(field) {
            Some(child) => self.visit_type(child),
            None => self.bad(node),
        }
    }

    fn visit_field_decl_list(&self, node: Node) -> Vec<Field> {
        let mut fields = Vec::new();
        for child in self.named_children(node) {
            if child.kind() != "field_declaration" {
                continue;
            }
            let Some(ty_node) = child.child_by_field_name("type") else {
                continue;
            };
            let names = self.field_names(child);
            let mut ty = self.visit_type(ty_node);
            if names.is_empty() && self.node_text(child).starts_with('*') {
                let span = self.span(child);
                ty = Expr::new(ExprKind::Star(Box::new(ty)), span);
            }
            let mut field = Field::new(names, ty);
            field.tag = child
                .child_by_field_name("tag")
                .map(|t| unquote(self.node_text(t)));
            field.doc = self.doc_for(child);
            field.comment = self.trailing_comment(child);
            field.span = self.span(child);
            fields.push(field);
        }
        fields
    }

    fn visit_interface(&self, node: Node) -> Vec<Field> {
        let mut fields = Vec::new();
        for child in self.named_children(node) {
            let mut field = match child.kind() {
                "method_elem" | "method_spec" => {
                    let Some(name) = child.child_by_field_name("name") else {
                        continue;
                    };
                    let sig = self.visit_signature(child);
                    Field::new(
                        vec![self.ident(name)],
                        Expr::new(ExprKind::FuncType(sig), self.span(child)),
                    )
                }
                "type_elem" | "constraint_elem" | "interface_type_name" => {
                    let elems = self.named_children(child);
                    let ty = if elems.len() == 1 {
                        self.visit_type(elems[0])
                    } else {
                        self.visit_type(child)
                    };
                    Field::new(Vec::new(), ty)
                }
                "type_identifier" | "qualified_type" => Field::new(Vec::new(), self.visit_type(child)),
                _ => continue,
            };
            field.doc = self.doc_for(child);
            field.comment = self.trailing_comment(child);
            field.span = self.span(child);
            fields.push(field);
        }
        fields
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn bad(&self, node: Node) -> Expr {
        Expr::new(ExprKind::Bad(self.node_text(node).to_string()), self.span(node))
    }

    fn child_expr(&self, node: Node, field: &str) -> Expr {
        match node.child_by_field_name(field) {
            Some(child) => self.visit_expr(child),
            None => self.bad(node),
        }
    }

    fn opt_expr(&self, node: Node, field: &str) -> Option<Box<Expr>> {
        node.child_by_field_name(field)
            .map(|child| Box::new(self.visit_expr(child)))
    }

    fn visit_expr_list(&self, node: Node) -> Vec<Expr> {
        if node.kind() == "expression_list" {
            self.named_children(node)
                .into_iter()
                .map(|c| self.visit_expr(c))
                .collect()
        } else {
            vec![self.visit_expr(node)]
        }
    }

    fn visit_expr(&self, node: Node) -> Expr {
        let span = self.span(node);
        let lit = |kind| ExprKind::BasicLit {
            kind,
            value: self.node_text(node).to_string(),
        };
        let kind = match node.kind() {
            "identifier" | "field_identifier" | "package_identifier" | "type_identifier"
            | "blank_identifier" | "label_name" | "nil" | "true" | "false" | "iota" => {
                ExprKind::Ident(self.node_text(node).to_string())
            }
            "int_literal" => lit(LitKind::Int),
            "float_literal" => lit(LitKind::Float),
            "imaginary_literal" => lit(LitKind::Imag),
            "rune_literal" => lit(LitKind::Char),
            "interpreted_string_literal" | "raw_string_literal" => lit(LitKind::String),
            "parenthesized_expression" => match self.named_children(node).first() {
                Some(inner) => ExprKind::Paren(Box::new(self.visit_expr(*inner))),
                None => return self.bad(node),
            },
            "selector_expression" => {
                let Some(field) = node.child_by_field_name("field") else {
                    return self.bad(node);
                };
                ExprKind::Selector {
                    x: Box::new(self.child_expr(node, "operand")),
                    sel: self.ident(field),
                }
            }
            "index_expression" => ExprKind::Index {
                x: Box::new(self.child_expr(node, "operand")),
                index: node
                    .child_by_field_name("index")
                    .map(|i| vec![self.visit_type(i)])
                    .unwrap_or_default(),
            },
            "slice_expression" => ExprKind::Slice {
                x: Box::new(self.child_expr(node, "operand")),
                low: self.opt_expr(node, "start"),
                high: self.opt_expr(node, "end"),
                max: self.opt_expr(node, "capacity"),
            },
            "type_assertion_expression" => ExprKind::TypeAssert {
                x: Box::new(self.child_expr(node, "operand")),
                ty: node
                    .child_by_field_name("type")
                    .map(|t| Box::new(self.visit_type(t))),
            },
            "call_expression" => {
                let mut fun = self.child_expr(node, "function");
                if let Some(targs) = node.child_by_field_name("type_arguments") {
                    let fspan = fun.span.clone();
                    fun = Expr::new(
                        ExprKind::Index {
                            x: Box::new(fun),
                            index: self
                                .named_children(targs)
                                .into_iter()
                                .map(|t| self.visit_type(t))
                                .collect(),
                        },
                        fspan,
                    );
                }
                let (args, ellipsis) = node
                    .child_by_field_name("arguments")
                    .map(|a| self.visit_arguments(a))
                    .unwrap_or_default();
                ExprKind::Call {
                    fun: Box::new(fun),
                    args,
                    ellipsis,
                }
            }
            "type_conversion_expression" => ExprKind::Call {
                fun: Box::new(self.field_type(node, "type")),
                args: vec![self.child_expr(node, "operand")],
                ellipsis: false,
            },
            "type_instantiation_expression" => {
                let mut types = self.named_children(node).into_iter().map(|t| self.visit_type(t));
                let Some(x) = types.next() else {
                    return self.bad(node);
                };
                ExprKind::Index {
                    x: Box::new(x),
                    index: types.collect(),
                }
            }
            "unary_expression" => {
                let op = node
                    .child_by_field_name("operator")
                    .map(|o| self.node_text(o))
                    .unwrap_or_default();
                let x = Box::new(self.child_expr(node, "operand"));
                if op == "*" {
                    ExprKind::Star(x)
                } else {
                    ExprKind::Unary { op: op.to_string(), x }
                }
            }
            "binary_expression" => ExprKind::Binary {
                op: node
                    .child_by_field_name("operator")
                    .map(|o| self.node_text(o).to_string())
                    .unwrap_or_default(),
                x: Box::new(self.child_expr(node, "left")),
                y: Box::new(self.child_expr(node, "right")),
            },
            "composite_literal" => ExprKind::CompositeLit {
                ty: node
                    .child_by_field_name("type")
                    .map(|t| Box::new(self.visit_type(t))),
                elts: node
                    .child_by_field_name("body")
                    .map(|b| self.visit_literal_value(b))
                    .unwrap_or_default(),
            },
            "literal_value" => ExprKind::CompositeLit {
                ty: None,
                elts: self.visit_literal_value(node),
            },
            "func_literal" => ExprKind::FuncLit {
                sig: self.visit_signature(node),
                body: node
                    .child_by_field_name("body")
                    .map(|b| self.visit_block(b))
                    .unwrap_or_default(),
            },
            "slice_type" | "array_type" | "implicit_length_array_type" | "map_type"
            | "channel_type" | "function_type" | "struct_type" | "interface_type"
            | "pointer_type" | "qualified_type" | "generic_type" | "parenthesized_type" => {
                return self.visit_type(node);
            }
            _ => ExprKind::Bad(self.node_text(node).to_string()),
        };
        Expr::new(kind, span)
    }

    fn visit_arguments(&self, node: Node) -> (Vec<Expr>, bool) {
        let mut args = Vec::new();
        let mut ellipsis = false;
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "..." => ellipsis = true,
                "variadic_argument" => {
                    ellipsis = true;
                    if let Some(inner) = self.named_children(child).first() {
                        args.push(self.visit_expr(*inner));
                    }
                }
                "comment" => {}
                _ if child.is_named() => args.push(self.visit_type(child)),
                _ => {}
            }
        }
        (args, ellipsis)
    }

    fn visit_literal_value(&self, node: Node) -> Vec<Expr> {
        self.named_children(node)
            .into_iter()
            .map(|child| match child.kind() {
                "keyed_element" => {
                    let parts = self.named_children(child);
                    match parts.as_slice() {
                        [key, value, ..] => {
                            let key = self.visit_literal_element(*key);
                            let value = self.visit_literal_element(*value);
                            Expr::new(
                                ExprKind::KeyValue {
                                    key: Box::new(key),
                                    value: Box::new(value),
                                },
                                self.span(child),
                            )
                        }
                        _ => self.bad(child),
                    }
                }
                _ => self.visit_literal_element(child),
            })
            .collect()
    }

    fn visit_literal_element(&self, node: Node) -> Expr {
        match node.kind() {
            "literal_element" => match self.named_children(node).first() {
                Some(inner) => self.visit_literal_element(*inner),
                None => self.bad(node),
            },
            _ => self.visit_expr(node),
        }
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn visit_block(&self, node: Node) -> Block {
        Block {
            stmts: self.visit_statements(node, &[]),
            span: self.span(node),
        }
    }

    /// Statements among the named children of `node`, skipping the given ids.
    fn visit_statements(&self, node: Node, skip: &[usize]) -> Vec<Stmt> {
        let mut stmts = Vec::new();
        for child in self.named_children(node) {
            if skip.contains(&child.id()) {
                continue;
            }
            if child.kind() == "statement_list" {
                stmts.extend(self.visit_statements(child, &[]));
            } else {
                stmts.push(self.visit_stmt(child));
            }
        }
        stmts
    }

    fn opt_stmt(&self, node: Node, field: &str) -> Option<Box<Stmt>> {
        node.child_by_field_name(field)
            .map(|child| Box::new(self.visit_stmt(child)))
    }

    fn has_token(&self, node: Node, token: &str) -> bool {
        let mut cursor = node.walk();
        let found = node.children(&mut cursor).any(|c| !c.is_named() && c.kind() == token);
        found
    }

    fn visit_stmt(&self, node: Node) -> Stmt {
        let span = self.span(node);
        let kind = match node.kind() {
            "expression_statement" => match self.named_children(node).first() {
                Some(inner) => StmtKind::Expr(self.visit_expr(*inner)),
                None => StmtKind::Empty,
            },
            "return_statement" => StmtKind::Return(
                self.named_children(node)
                    .first()
                    .map(|list| self.visit_expr_list(*list))
                    .unwrap_or_default(),
            ),
            "block" => StmtKind::Block(self.visit_block(node)),
            "if_statement" => StmtKind::If {
                init: self.opt_stmt(node, "initializer"),
                cond: self.child_expr(node, "condition"),
                body: node
                    .child_by_field_name("consequence")
                    .map(|b| self.visit_block(b))
                    .unwrap_or_default(),
                els: self.opt_stmt(node, "alternative"),
            },
            "for_statement" => self.visit_for(node),
            "expression_switch_statement" => {
                let mut clauses = Vec::new();
                for child in self.named_children(node) {
                    match child.kind() {
                        "expression_case" => {
                            let value = child.child_by_field_name("value");
                            clauses.push(CaseClause {
                                list: value.map(|v| self.visit_expr_list(v)).unwrap_or_default(),
                                default: false,
                                body: self.visit_statements(
                                    child,
                                    &value.map(|v| vec![v.id()]).unwrap_or_default(),
                                ),
                            });
                        }
                        "default_case" => clauses.push(CaseClause {
                            list: Vec::new(),
                            default: true,
                            body: self.visit_statements(child, &[]),
                        }),
                        _ => {}
                    }
                }
                StmtKind::Switch {
                    init: self.opt_stmt(node, "initializer"),
                    tag: node.child_by_field_name("value").map(|v| self.visit_expr(v)),
                    clauses,
                }
            }
            "type_switch_statement" => {
                let mut clauses = Vec::new();
                for child in self.named_children(node) {
                    match child.kind() {
                        "type_case" => {
                            let mut cursor = child.walk();
                            let types: Vec<_> = child.children_by_field_name("type", &mut cursor).collect();
                            let ids: Vec<usize> = types.iter().map(|t| t.id()).collect();
                            clauses.push(CaseClause {
                                list: types.iter().map(|t| self.visit_type(*t)).collect(),
                                default: false,
                                body: self.visit_statements(child, &ids),
                            });
                        }
                        "default_case" => clauses.push(CaseClause {
                            list: Vec::new(),
                            default: true,
                            body: self.visit_statements(child, &[]),
                        }),
                        _ => {}
                    }
                }
                StmtKind::TypeSwitch {
                    init: self.opt_stmt(node, "initializer"),
                    bind: node
                        .child_by_field_name("alias")
                        .and_then(|a| self.named_children(a).first().copied().or(Some(a)))
                        .map(|a| self.ident(a)),
                    x: self.child_expr(node, "value"),
                    clauses,
                }
            }
            "select_statement" => {
                let mut clauses = Vec::new();
                for child in self.named_children(node) {
                    match child.kind() {
                        "communication_case" => {
                            let comm = child.child_by_field_name("communication");
                            clauses.push(CommClause {
                                comm: comm.map(|c| Box::new(self.visit_stmt(c))),
                                body: self.visit_statements(
                                    child,
                                    &comm.map(|c| vec![c.id()]).unwrap_or_default(),
                                ),
                            });
                        }
                        "default_case" => clauses.push(CommClause {
                            comm: None,
                            body: self.visit_statements(child, &[]),
                        }),
                        _ => {}
                    }
                }
                StmtKind::Select(clauses)
            }
            "receive_statement" => {
                let rhs = self.child_expr(node, "right");
                match node.child_by_field_name("left") {
                    Some(left) => StmtKind::Assign {
                        lhs: self.visit_expr_list(left),
                        op: if self.has_token(node, ":=") { ":=" } else { "=" }.to_string(),
                        rhs: vec![rhs],
                    },
                    None => StmtKind::Expr(rhs),
                }
            }
            "short_var_declaration" => StmtKind::Assign {
                lhs: node
                    .child_by_field_name("left")
                    .map(|l| self.visit_expr_list(l))
                    .unwrap_or_default(),
                op: ":=".to_string(),
                rhs: node
                    .child_by_field_name("right")
                    .map(|r| self.visit_expr_list(r))
                    .unwrap_or_default(),
            },
            "assignment_statement" => StmtKind::Assign {
                lhs: node
                    .child_by_field_name("left")
                    .map(|l| self.visit_expr_list(l))
                    .unwrap_or_default(),
                op: node
                    .child_by_field_name("operator")
                    .map(|o| self.node_text(o).to_string())
                    .unwrap_or_else(|| "=".to_string()),
                rhs: node
                    .child_by_field_name("right")
                    .map(|r| self.visit_expr_list(r))
                    .unwrap_or_default(),
            },
            "inc_statement" | "dec_statement" => match self.named_children(node).first() {
                Some(x) => StmtKind::IncDec {
                    x: self.visit_expr(*x),
                    inc: node.kind() == "inc_statement",
                },
                None => StmtKind::Empty,
            },
            "go_statement" | "defer_statement" => match self.named_children(node).first() {
                Some(call) => {
                    let call = self.visit_expr(*call);
                    if node.kind() == "go_statement" {
                        StmtKind::Go(call)
                    } else {
                        StmtKind::Defer(call)
                    }
                }
                None => StmtKind::Empty,
            },
            "var_declaration" => StmtKind::Decl(Decl::Var(self.visit_var_decl(node))),
            "const_declaration" => StmtKind::Decl(Decl::Const(self.visit_const_decl(node))),
            "type_declaration" => StmtKind::Decl(Decl::Type(self.visit_type_decl(node))),
            "labeled_statement" => {
                let label = node
                    .child_by_field_name("label")
                    .map(|l| self.ident(l))
                    .unwrap_or_else(|| Ident::new("_", span.clone()));
                let stmt = self
                    .named_children(node)
                    .into_iter()
                    .find(|c| c.kind() != "label_name")
                    .map(|s| self.visit_stmt(s))
                    .unwrap_or_else(|| Stmt::new(StmtKind::Empty, span.clone()));
                StmtKind::Labeled {
                    label,
                    stmt: Box::new(stmt),
                }
            }
            "break_statement" | "continue_statement" | "goto_statement" | "fallthrough_statement" => {
                StmtKind::Branch {
                    tok: node.kind().trim_end_matches("_statement").to_string(),
                    label: self.named_children(node).first().map(|l| self.ident(*l)),
                }
            }
            "send_statement" => StmtKind::Send {
                chan: self.child_expr(node, "channel"),
                value: self.child_expr(node, "value"),
            },
            "empty_statement" => StmtKind::Empty,
            _ => StmtKind::Expr(self.visit_expr(node)),
        };
        Stmt::new(kind, span)
    }

    fn visit_for(&self, node: Node) -> StmtKind {
        let body_node = node.child_by_field_name("body");
        let body = body_node.map(|b| self.visit_block(b)).unwrap_or_default();
        let header = self
            .named_children(node)
            .into_iter()
            .find(|c| Some(c.id()) != body_node.map(|b| b.id()));

        match header {
            Some(clause) if clause.kind() == "for_clause" => StmtKind::For {
                init: self.opt_stmt(clause, "initializer"),
                cond: clause.child_by_field_name("condition").map(|c| self.visit_expr(c)),
                post: self.opt_stmt(clause, "update"),
                body,
            },
            Some(clause) if clause.kind() == "range_clause" => {
                let mut left = clause
                    .child_by_field_name("left")
                    .map(|l| self.visit_expr_list(l))
                    .unwrap_or_default()
                    .into_iter();
                StmtKind::Range {
                    key: left.next(),
                    value: left.next(),
                    define: self.has_token(clause, ":="),
                    x: self.child_expr(clause, "right"),
                    body,
                }
            }
            Some(cond) => StmtKind::For {
                init: None,
                cond: Some(self.visit_expr(cond)),
                post: None,
                body,
            },
            None => StmtKind::For {
                init: None,
                cond: None,
                post: None,
                body,
            },
        }
    }
}

/// Strips comment markers and returns the comment's lines.
fn clean_comment(text: &str) -> Vec<String> {
    if let Some(line) = text.strip_prefix("//") {
        return vec![line.strip_prefix(' ').unwrap_or(line).trim_end().to_string()];
    }
    let body = text
        .strip_prefix("/*")
        .and_then(|s| s.strip_suffix("*/"))
        .unwrap_or(text);
    body.lines()
        .map(|l| l.trim().trim_start_matches('*').trim().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> ParsedFile {
        let mut parser = GoParser::new().unwrap();
        parser.parse(source, Path::new("test.go")).unwrap()
    }

    fn single_type(file: &ParsedFile) -> &TypeSpec {
        file.decls
            .iter()
            .find_map(|d| match d {
                Decl::Type(specs) => specs.first(),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn test_parse_package_and_imports() {
        let file = parse(
            r#"package app

import (
	"context"
	kitlog "github.com/go-kit/kit/log"
)
"#,
        );
        assert_eq!(file.package.name, "app");
        assert_eq!(file.imports.len(), 2);
        assert_eq!(file.imports[0].path, "context");
        assert_eq!(file.imports[1].local_name(), "kitlog");
        assert!(file.import_by_name("context").is_some());
    }

    #[test]
    fn test_parse_build_constraint() {
        let file = parse("//go:build swipe\n// +build swipe\n\npackage app\n");
        assert_eq!(file.build_constraint.as_deref(), Some("swipe"));
    }

    #[test]
    fn test_parse_interface_methods() {
        let file = parse(
            r#"package app

// AppI is the service.
type AppI interface {
	// Get returns a value.
	Get(ctx context.Context, fname string, id int) (data []byte, err error)
	Ping(ctx context.Context) error
}
"#,
        );
        let spec = single_type(&file);
        assert_eq!(spec.name.name, "AppI");
        assert_eq!(spec.doc, vec!["AppI is the service."]);
        let ExprKind::InterfaceType(methods) = &spec.ty.kind else {
            panic!("expected interface");
        };
        assert_eq!(methods.len(), 2);
        assert_eq!(methods[0].names[0].name, "Get");
        assert_eq!(methods[0].doc, vec!["Get returns a value."]);
        let ExprKind::FuncType(sig) = &methods[0].ty.kind else {
            panic!("expected signature");
        };
        assert_eq!(sig.params.len(), 3);
        assert_eq!(sig.results.len(), 2);
        assert_eq!(sig.results[1].names[0].name, "err");
    }

    #[test]
    fn test_parse_struct_tags_and_comments() {
        let file = parse(
            "package app\n\ntype Config struct {\n\tFldIntReq int `env:\",required,desc:d\"`\n\tName string // the name\n\t*Embedded\n}\n",
        );
        let ExprKind::StructType(fields) = &single_type(&file).ty.kind else {
            panic!("expected struct");
        };
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0].tag.as_deref(), Some("env:\",required,desc:d\""));
        assert_eq!(fields[1].comment, vec!["the name"]);
        assert!(fields[2].is_embedded());
        assert!(matches!(fields[2].ty.kind, ExprKind::Star(_)));
    }

    #[test]
    fn test_parse_build_call() {
        let file = parse(
            r#"package app

func Swipe() {
	swipe.Build(
		swipe.Service(
			swipe.Interface((*AppI)(nil), ""),
			swipe.HTTPServer(),
		),
	)
}
"#,
        );
        let Decl::Func(func) = &file.decls[0] else {
            panic!("expected func");
        };
        let body = func.body.as_ref().unwrap();
        assert_eq!(body.stmts.len(), 1);
        let StmtKind::Expr(call) = &body.stmts[0].kind else {
            panic!("expected expression statement");
        };
        let ExprKind::Call { fun, args, .. } = &call.kind else {
            panic!("expected call");
        };
        assert!(matches!(&fun.kind, ExprKind::Selector { sel, .. } if sel.name == "Build"));
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn test_parse_const_group_iota() {
        let file = parse("package app\n\ntype Kind int\n\nconst (\n\tKindA Kind = iota\n\tKindB\n\tKindC\n)\n");
        let consts = file
            .decls
            .iter()
            .find_map(|d| match d {
                Decl::Const(specs) => Some(specs),
                _ => None,
            })
            .unwrap();
        assert_eq!(consts.len(), 3);
        assert_eq!(consts[2].iota, 2);
        assert!(consts[1].values.is_empty());
        assert_eq!(consts[0].values[0].as_ident(), Some("iota"));
    }

    #[test]
    fn test_syntax_error_is_positioned() {
        let mut parser = GoParser::new().unwrap();
        let err = parser
            .parse("package app\n\nfunc (\n", Path::new("bad.go"))
            .unwrap_err();
        assert!(matches!(err, CompilerError::SyntaxError { ref span, .. } if span.file == Path::new("bad.go")));
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote(r#""a\tb\"c""#), "a\tb\"c");
        assert_eq!(unquote("`raw\\n`"), "raw\\n");
        assert_eq!(unquote(r#""é""#), "é");
    }
}
