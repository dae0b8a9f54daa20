//! Discovery of build configuration functions.

use std::path::PathBuf;

use rayon::prelude::*;
use tracing::debug;

use super::dsl;
use crate::diagnostic::Span;
use crate::frontend::go::ast::{Decl, Expr, ExprKind, FuncDecl, ParsedFile, StmtKind};
use crate::types::{FileRef, Universe};

/// An exported function whose body is a single `Build(...)` call.
#[derive(Debug, Clone)]
pub struct BuildSite {
    pub file: FileRef,
    /// Name of the enclosing function.
    pub func: String,
    /// Arguments of the `Build` call.
    pub args: Vec<Expr>,
    pub span: Span,
    /// Directory of the declaring file.
    pub dir: PathBuf,
    pub pkg_path: String,
    pub pkg_name: String,
}

/// Finds every build site of the module, ordered by file and position.
pub fn find_build_sites(universe: &Universe) -> Vec<BuildSite> {
    let files: Vec<(FileRef, &ParsedFile)> = universe.files().collect();
    let mut sites: Vec<BuildSite> = files
        .par_iter()
        .flat_map_iter(|(file_ref, file)| {
            let pkg = &universe.packages[file_ref.pkg];
            file.decls
                .iter()
                .filter_map(|decl| match decl {
                    Decl::Func(func) => build_call(file, func),
                    _ => None,
                })
                .map(|(func, args, span)| BuildSite {
                    file: *file_ref,
                    func,
                    args,
                    span,
                    dir: pkg.dir.clone(),
                    pkg_path: pkg.path.clone(),
                    pkg_name: pkg.name.clone(),
                })
                .collect::<Vec<_>>()
        })
        .collect();
    sites.sort_by(|a, b| a.span.cmp(&b.span));
    for site in &sites {
        debug!(site = %site.span, func = %site.func, package = %site.pkg_path, "found build site");
    }
    sites
}

fn build_call(file: &ParsedFile, func: &FuncDecl) -> Option<(String, Vec<Expr>, Span)> {
    if func.recv.is_some() || !func.name.is_exported() {
        return None;
    }
    let body = func.body.as_ref()?;
    let [stmt] = body.stmts.as_slice() else {
        return None;
    };
    let StmtKind::Expr(expr) = &stmt.kind else {
        return None;
    };
    let ExprKind::Call { fun, args, .. } = &expr.unparen().kind else {
        return None;
    };
    is_sentinel(file, fun).then(|| (func.name.name.clone(), args.clone(), expr.span.clone()))
}

/// `swipe.Build` through an import of the DSL package, or `Build` through a
/// dot import of it.
fn is_sentinel(file: &ParsedFile, fun: &Expr) -> bool {
    match &fun.unparen().kind {
        ExprKind::Selector { x, sel } if sel.name == dsl::SENTINEL => x
            .as_ident()
            .and_then(|pkg| file.import_by_name(pkg))
            .is_some_and(|import| dsl::is_dsl_path(&import.path)),
        ExprKind::Ident(name) if name == dsl::SENTINEL => file
            .imports
            .iter()
            .any(|i| i.name.as_deref() == Some(".") && dsl::is_dsl_path(&i.path)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::testing;

    #[test]
    fn test_finds_exported_build_functions() {
        let u = testing::load(&[
            (
                "app/swipe.go",
                concat!(
                    "//go:build swipe\n\npackage app\n\n",
                    "import \"github.com/swipe-io/swipe/v2\"\n\n",
                    "func Swipe() {\n\tswipe.Build(swipe.Service())\n}\n\n",
                    "func helper() {\n\tswipe.Build(swipe.Service())\n}\n\n",
                    "func Two() {\n\tswipe.Build(swipe.Service())\n\tprintln()\n}\n",
                ),
            ),
            (
                "cfg/swipe.go",
                concat!(
                    "package cfg\n\n",
                    "import . \"github.com/swipe-io/swipe/v2\"\n\n",
                    "func Config() {\n\tBuild(ConfigEnv(nil))\n}\n",
                ),
            ),
        ]);
        let sites = find_build_sites(&u);
        let found: Vec<_> = sites.iter().map(|s| (s.pkg_name.as_str(), s.func.as_str())).collect();
        assert_eq!(found, [("app", "Swipe"), ("cfg", "Config")]);
        assert_eq!(sites[0].pkg_path, "example.com/m/app");
        assert_eq!(sites[0].args.len(), 1);
        assert_eq!(sites[0].dir, PathBuf::from("/m/app"));
    }

    #[test]
    fn test_ignores_foreign_build_calls() {
        let u = testing::load(&[(
            "app/a.go",
            "package app\n\nimport \"example.com/other/builder\"\n\nfunc Run() {\n\tbuilder.Build(1)\n}\n",
        )]);
        assert!(find_build_sites(&u).is_empty());
    }
}
