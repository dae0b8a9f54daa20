//! Prints Go AST nodes back to source.
//!
//! Output is unindented; statements and fields are separated by newlines and
//! the frame's formatter pass re-indents the result.

use super::ast::*;

/// Renders an expression.
pub fn expr(e: &Expr) -> String {
    let mut out = String::new();
    write_expr(&mut out, e);
    out
}

/// Renders a statement.
pub fn stmt(s: &Stmt) -> String {
    let mut out = String::new();
    write_stmt(&mut out, s);
    out
}

/// Renders a braced block.
pub fn block(b: &Block) -> String {
    let mut out = String::new();
    write_block(&mut out, &b.stmts);
    out
}

/// Renders a signature without the `func` keyword: `(a int) (string, error)`.
pub fn signature(sig: &FuncType) -> String {
    let mut out = String::new();
    write_signature(&mut out, sig);
    out
}

/// Renders a comma separated parameter list without parentheses.
pub fn params(fields: &[Field]) -> String {
    let mut out = String::new();
    write_params(&mut out, fields);
    out
}

fn write_exprs(out: &mut String, exprs: &[Expr]) {
    for (i, e) in exprs.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_expr(out, e);
    }
}

fn write_expr(out: &mut String, e: &Expr) {
    match &e.kind {
        ExprKind::Ident(name) => out.push_str(name),
        ExprKind::BasicLit { value, .. } => out.push_str(value),
        ExprKind::Bad(text) => out.push_str(text),
        ExprKind::CompositeLit { ty, elts } => {
            if let Some(ty) = ty {
                write_expr(out, ty);
            }
            // Keeps the source layout: one line stays one line.
            let multiline = e.span.end_line > e.span.start_line
                || elts.iter().any(|e| matches!(e.kind, ExprKind::FuncLit { .. }));
            if elts.is_empty() {
                out.push_str("{}");
            } else if multiline {
                out.push_str("{\n");
                for elt in elts {
                    write_expr(out, elt);
                    out.push_str(",\n");
                }
                out.push('}');
            } else {
                out.push('{');
                write_exprs(out, elts);
                out.push('}');
            }
        }
        ExprKind::KeyValue { key, value } => {
            write_expr(out, key);
            out.push_str(": ");
            write_expr(out, value);
        }
        ExprKind::FuncLit { sig, body } => {
            out.push_str("func");
            write_signature(out, sig);
            out.push(' ');
            write_block(out, &body.stmts);
        }
        ExprKind::Paren(inner) => {
            out.push('(');
            write_expr(out, inner);
            out.push(')');
        }
        ExprKind::Selector { x, sel } => {
            write_expr(out, x);
            out.push('.');
            out.push_str(&sel.name);
        }
        ExprKind::Index { x, index } => {
            write_expr(out, x);
            out.push('[');
            write_exprs(out, index);
            out.push(']');
        }
        ExprKind::Slice { x, low, high, max } => {
            write_expr(out, x);
            out.push('[');
            if let Some(low) = low {
                write_expr(out, low);
            }
            out.push(':');
            if let Some(high) = high {
                write_expr(out, high);
            }
            if let Some(max) = max {
                out.push(':');
                write_expr(out, max);
            }
            out.push(']');
        }
        ExprKind::TypeAssert { x, ty } => {
            write_expr(out, x);
            out.push_str(".(");
            match ty {
                Some(ty) => write_expr(out, ty),
                None => out.push_str("type"),
            }
            out.push(')');
        }
        ExprKind::Call { fun, args, ellipsis } => {
            write_expr(out, fun);
            out.push('(');
            write_exprs(out, args);
            if *ellipsis {
                out.push_str("...");
            }
            out.push(')');
        }
        ExprKind::Star(x) => {
            out.push('*');
            write_expr(out, x);
        }
        ExprKind::Unary { op, x } => {
            out.push_str(op);
            write_expr(out, x);
        }
        ExprKind::Binary { op, x, y } => {
            write_expr(out, x);
            out.push(' ');
            out.push_str(op);
            out.push(' ');
            write_expr(out, y);
        }
        ExprKind::ArrayType { len, elt } => {
            out.push('[');
            if let Some(len) = len {
                write_expr(out, len);
            }
            out.push(']');
            write_expr(out, elt);
        }
        ExprKind::MapType { key, value } => {
            out.push_str("map[");
            write_expr(out, key);
            out.push(']');
            write_expr(out, value);
        }
        ExprKind::ChanType { dir, value } => {
            out.push_str(match dir {
                ChanDir::Both => "chan ",
                ChanDir::Send => "chan<- ",
                ChanDir::Recv => "<-chan ",
            });
            write_expr(out, value);
        }
        ExprKind::FuncType(sig) => {
            out.push_str("func");
            write_signature(out, sig);
        }
        ExprKind::InterfaceType(methods) => {
            if methods.is_empty() {
                out.push_str("interface{}");
                return;
            }
            out.push_str("interface {\n");
            for m in methods {
                match (m.names.first(), &m.ty.kind) {
                    (Some(name), ExprKind::FuncType(sig)) => {
                        out.push_str(&name.name);
                        write_signature(out, sig);
                    }
                    _ => write_expr(out, &m.ty),
                }
                out.push('\n');
            }
            out.push('}');
        }
        ExprKind::StructType(fields) => {
            if fields.is_empty() {
                out.push_str("struct{}");
                return;
            }
            out.push_str("struct {\n");
            for f in fields {
                if !f.names.is_empty() {
                    out.push_str(&names(&f.names));
                    out.push(' ');
                }
                write_expr(out, &f.ty);
                if let Some(tag) = &f.tag {
                    out.push_str(" `");
                    out.push_str(tag);
                    out.push('`');
                }
                out.push('\n');
            }
            out.push('}');
        }
        ExprKind::Ellipsis(elt) => {
            out.push_str("...");
            if let Some(elt) = elt {
                write_expr(out, elt);
            }
        }
    }
}

fn names(idents: &[Ident]) -> String {
    idents
        .iter()
        .map(|i| i.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn write_params(out: &mut String, fields: &[Field]) {
    for (i, f) in fields.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        if !f.names.is_empty() {
            out.push_str(&names(&f.names));
            out.push(' ');
        }
        if f.variadic {
            out.push_str("...");
        }
        write_expr(out, &f.ty);
    }
}

fn write_signature(out: &mut String, sig: &FuncType) {
    out.push('(');
    write_params(out, &sig.params);
    out.push(')');
    match sig.results.as_slice() {
        [] => {}
        [single] if single.names.is_empty() => {
            out.push(' ');
            write_expr(out, &single.ty);
        }
        results => {
            out.push_str(" (");
            write_params(out, results);
            out.push(')');
        }
    }
}

fn write_block(out: &mut String, stmts: &[Stmt]) {
    out.push_str("{\n");
    write_stmt_list(out, stmts);
    out.push('}');
}

fn write_stmt_list(out: &mut String, stmts: &[Stmt]) {
    for s in stmts {
        write_stmt(out, s);
        out.push('\n');
    }
}

fn write_simple(out: &mut String, s: &Option<Box<Stmt>>) {
    if let Some(s) = s {
        write_stmt(out, s);
    }
}

fn write_stmt(out: &mut String, s: &Stmt) {
    match &s.kind {
        StmtKind::Expr(e) => write_expr(out, e),
        StmtKind::Return(results) => {
            out.push_str("return");
            if !results.is_empty() {
                out.push(' ');
                write_exprs(out, results);
            }
        }
        StmtKind::Block(b) => write_block(out, &b.stmts),
        StmtKind::If { init, cond, body, els } => {
            out.push_str("if ");
            if init.is_some() {
                write_simple(out, init);
                out.push_str("; ");
            }
            write_expr(out, cond);
            out.push(' ');
            write_block(out, &body.stmts);
            if let Some(els) = els {
                out.push_str(" else ");
                write_stmt(out, els);
            }
        }
        StmtKind::For { init, cond, post, body } => {
            out.push_str("for ");
            if init.is_some() || post.is_some() {
                write_simple(out, init);
                out.push_str("; ");
                if let Some(cond) = cond {
                    write_expr(out, cond);
                }
                out.push_str("; ");
                write_simple(out, post);
                out.push(' ');
            } else if let Some(cond) = cond {
                write_expr(out, cond);
                out.push(' ');
            }
            write_block(out, &body.stmts);
        }
        StmtKind::Range { key, value, define, x, body } => {
            out.push_str("for ");
            if let Some(key) = key {
                write_expr(out, key);
                if let Some(value) = value {
                    out.push_str(", ");
                    write_expr(out, value);
                }
                out.push_str(if *define { " := " } else { " = " });
            }
            out.push_str("range ");
            write_expr(out, x);
            out.push(' ');
            write_block(out, &body.stmts);
        }
        StmtKind::Switch { init, tag, clauses } => {
            out.push_str("switch ");
            if init.is_some() {
                write_simple(out, init);
                out.push_str("; ");
            }
            if let Some(tag) = tag {
                write_expr(out, tag);
                out.push(' ');
            }
            write_clauses(out, clauses);
        }
        StmtKind::TypeSwitch { init, bind, x, clauses } => {
            out.push_str("switch ");
            if init.is_some() {
                write_simple(out, init);
                out.push_str("; ");
            }
            if let Some(bind) = bind {
                out.push_str(&bind.name);
                out.push_str(" := ");
            }
            write_expr(out, x);
            out.push_str(".(type) ");
            write_clauses(out, clauses);
        }
        StmtKind::Select(clauses) => {
            out.push_str("select {\n");
            for clause in clauses {
                match &clause.comm {
                    Some(comm) => {
                        out.push_str("case ");
                        write_stmt(out, comm);
                        out.push_str(":\n");
                    }
                    None => out.push_str("default:\n"),
                }
                write_stmt_list(out, &clause.body);
            }
            out.push('}');
        }
        StmtKind::Assign { lhs, op, rhs } => {
            write_exprs(out, lhs);
            out.push(' ');
            out.push_str(op);
            out.push(' ');
            write_exprs(out, rhs);
        }
        StmtKind::IncDec { x, inc } => {
            write_expr(out, x);
            out.push_str(if *inc { "++" } else { "--" });
        }
        StmtKind::Go(call) => {
            out.push_str("go ");
            write_expr(out, call);
        }
        StmtKind::Defer(call) => {
            out.push_str("defer ");
            write_expr(out, call);
        }
        StmtKind::Decl(decl) => write_decl(out, decl),
        StmtKind::Labeled { label, stmt } => {
            out.push_str(&label.name);
            out.push_str(":\n");
            write_stmt(out, stmt);
        }
        StmtKind::Branch { tok, label } => {
            out.push_str(tok);
            if let Some(label) = label {
                out.push(' ');
                out.push_str(&label.name);
            }
        }
        StmtKind::Send { chan, value } => {
            write_expr(out, chan);
            out.push_str(" <- ");
            write_expr(out, value);
        }
        StmtKind::Empty => {}
    }
}

fn write_clauses(out: &mut String, clauses: &[CaseClause]) {
    out.push_str("{\n");
    for clause in clauses {
        if clause.default {
            out.push_str("default:\n");
        } else {
            out.push_str("case ");
            write_exprs(out, &clause.list);
            out.push_str(":\n");
        }
        write_stmt_list(out, &clause.body);
    }
    out.push('}');
}

fn write_value_spec(out: &mut String, spec: &ValueSpec) {
    out.push_str(&names(&spec.names));
    if let Some(ty) = &spec.ty {
        out.push(' ');
        write_expr(out, ty);
    }
    if !spec.values.is_empty() {
        out.push_str(" = ");
        write_exprs(out, &spec.values);
    }
}

fn write_decl(out: &mut String, decl: &Decl) {
    let (keyword, specs) = match decl {
        Decl::Func(func) => {
            out.push_str("func ");
            out.push_str(&func.name.name);
            write_signature(out, &func.sig);
            if let Some(body) = &func.body {
                out.push(' ');
                write_block(out, &body.stmts);
            }
            return;
        }
        Decl::Type(specs) => {
            for (i, spec) in specs.iter().enumerate() {
                if i > 0 {
                    out.push('\n');
                }
                out.push_str("type ");
                out.push_str(&spec.name.name);
                out.push_str(if spec.alias { " = " } else { " " });
                write_expr(out, &spec.ty);
            }
            return;
        }
        Decl::Const(specs) => ("const", specs),
        Decl::Var(specs) => ("var", specs),
    };
    match specs.as_slice() {
        [single] => {
            out.push_str(keyword);
            out.push(' ');
            write_value_spec(out, single);
        }
        specs => {
            out.push_str(keyword);
            out.push_str(" (\n");
            for spec in specs {
                write_value_spec(out, spec);
                out.push('\n');
            }
            out.push(')');
        }
    }
}
