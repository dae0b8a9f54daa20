//! In-memory modules for unit tests.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::Universe;
use crate::frontend::go::{GoPackage, GoParser, ModuleInfo};
use crate::frontend::SourceSet;

pub const MODULE: &str = "example.com/m";

/// Loads `(relative path, source)` pairs as module `example.com/m` rooted at `/m`.
pub fn load(files: &[(&str, &str)]) -> Universe {
    let mut parser = GoParser::new().unwrap();
    let mut by_dir: BTreeMap<PathBuf, Vec<_>> = BTreeMap::new();
    for (rel, src) in files {
        let path = Path::new("/m").join(rel);
        let file = parser.parse(src, &path).unwrap();
        by_dir.entry(path.parent().unwrap().to_path_buf()).or_default().push(file);
    }
    let module = ModuleInfo {
        root: PathBuf::from("/m"),
        path: MODULE.to_string(),
    };
    let packages = by_dir
        .into_iter()
        .map(|(dir, files)| GoPackage {
            name: files[0].package.name.clone(),
            path: module.import_path(&dir),
            dir,
            files,
        })
        .collect();
    Universe::load(SourceSet { module, packages }).unwrap()
}
