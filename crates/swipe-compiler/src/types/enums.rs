//! Enum discovery from typed constant groups.

use indexmap::IndexMap;

use super::universe::{FileRef, ObjectKind};
use super::{ConstValue, NamedId, Type, Universe};
use crate::frontend::go::ast::{Decl, Expr};

#[derive(Debug, Clone, PartialEq)]
pub struct EnumMember {
    pub name: String,
    pub value: ConstValue,
}

/// Collects `const ( A T = ...; B; C )` groups whose first spec names an
/// exported integer or string type. Several groups of the same type are
/// concatenated in source order.
pub fn collect(universe: &Universe) -> IndexMap<NamedId, Vec<EnumMember>> {
    let mut enums: IndexMap<NamedId, Vec<EnumMember>> = IndexMap::new();
    for (file_ref, file) in universe.files() {
        for decl in &file.decls {
            let Decl::Const(specs) = decl else {
                continue;
            };
            let Some(id) = group_type(universe, file_ref, specs.first().and_then(|s| s.ty.as_ref())) else {
                continue;
            };
            let scope = &universe.packages[file_ref.pkg].scope;
            let members = specs
                .iter()
                .flat_map(|spec| spec.names.iter())
                .filter(|name| name.name != "_")
                .filter_map(|name| match &scope.get(&name.name)?.kind {
                    ObjectKind::Const { value: Some(value), .. } => Some(EnumMember {
                        name: name.name.clone(),
                        value: value.clone(),
                    }),
                    _ => None,
                });
            enums.entry(id).or_default().extend(members);
        }
    }
    enums.retain(|_, members| !members.is_empty());
    enums
}

fn group_type(universe: &Universe, file: FileRef, ty: Option<&Expr>) -> Option<NamedId> {
    let Type::Named(id) = universe.resolve_type(file, ty?).ok()? else {
        return None;
    };
    let named = universe.named(id);
    if !named.is_exported() || named.external {
        return None;
    }
    let kind = universe.basic(&Type::Named(id))?;
    (kind.is_integer() || kind.is_string()).then_some(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::go::{GoPackage, GoParser, ModuleInfo};
    use crate::frontend::SourceSet;
    use std::path::{Path, PathBuf};

    fn load(src: &str) -> Universe {
        let file = GoParser::new().unwrap().parse(src, Path::new("/m/a.go")).unwrap();
        Universe::load(SourceSet {
            module: ModuleInfo {
                root: PathBuf::from("/m"),
                path: "example.com/m".to_string(),
            },
            packages: vec![GoPackage {
                name: "m".to_string(),
                path: "example.com/m".to_string(),
                dir: PathBuf::from("/m"),
                files: vec![file],
            }],
        })
        .unwrap()
    }

    #[test]
    fn test_integer_and_string_enums() {
        let u = load(concat!(
            "package m\n\n",
            "type Status int\n\n",
            "const (\n\tActive Status = iota\n\tBlocked\n\t_\n\tDeleted\n)\n\n",
            "type Color string\n\n",
            "const (\n\tRed Color = \"red\"\n\tBlue Color = \"blue\"\n)\n",
        ));
        let status = u.lookup_named("example.com/m", "Status").unwrap();
        let members: Vec<_> = u.enums[&status]
            .iter()
            .map(|m| (m.name.as_str(), m.value.clone()))
            .collect();
        assert_eq!(
            members,
            [
                ("Active", ConstValue::Int(0)),
                ("Blocked", ConstValue::Int(1)),
                ("Deleted", ConstValue::Int(3)),
            ]
        );
        let color = u.lookup_named("example.com/m", "Color").unwrap();
        assert_eq!(u.enums[&color][1].value, ConstValue::String("blue".into()));
    }

    #[test]
    fn test_unexported_and_untyped_groups_are_skipped() {
        let u = load(concat!(
            "package m\n\n",
            "type mode int\n\n",
            "const (\n\tA mode = iota\n\tB\n)\n\n",
            "const (\n\tX = 1\n\tY = 2\n)\n",
        ));
        assert!(u.enums.is_empty());
    }
}
