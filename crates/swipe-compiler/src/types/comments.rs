//! Documentation harvested from type declarations and struct fields.

use std::collections::HashMap;

use super::{NamedId, Type, Universe};

/// Doc comments keyed by named type and by `(struct type, field name)`.
/// Comment markers are already stripped by the parser.
#[derive(Debug, Clone, Default)]
pub struct CommentMap {
    types: HashMap<NamedId, Vec<String>>,
    fields: HashMap<(NamedId, String), Vec<String>>,
}

impl CommentMap {
    pub fn collect(universe: &Universe) -> Self {
        let mut map = Self::default();
        for (id, named) in universe.named_types() {
            if named.external {
                continue;
            }
            if !named.doc.is_empty() {
                map.types.insert(id, named.doc.clone());
            }
            let Type::Struct(st) = &named.underlying else {
                continue;
            };
            for field in &st.fields {
                let lines: Vec<String> = field.doc.iter().chain(&field.comment).cloned().collect();
                if !lines.is_empty() {
                    map.fields.insert((id, field.name.clone()), lines);
                }
            }
        }
        map
    }

    pub fn type_doc(&self, id: NamedId) -> &[String] {
        self.types.get(&id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn field_doc(&self, owner: NamedId, field: &str) -> &[String] {
        self.fields
            .get(&(owner, field.to_string()))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Single-line rendering used for descriptions.
    pub fn field_text(&self, owner: NamedId, field: &str) -> String {
        self.field_doc(owner, field).join(" ")
    }
}
