//! Maps dataflow [`Type`]s onto C++ target types ("Type
//! emission").
//!
//! Record shapes are structurally deduplicated: two records with the same
//! sorted field-name -> type map emit as the same generated struct. The
//! registry is built once per emission run and threaded through every call
//! that might encounter a record type.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use indexmap::IndexMap;

use flowir_core::types::{ScalarKind, Type, TypeKind};

/// Accumulates synthesized struct definitions as record types are seen.
#[derive(Debug, Default)]
pub struct StructRegistry {
    /// Canonical field signature -> generated struct name.
    by_signature: IndexMap<String, String>,
    /// Generated struct name -> ordered (field name, C++ type) pairs, for
    /// emitting the struct definitions themselves.
    definitions: IndexMap<String, Vec<(String, String)>>,
}

impl StructRegistry {
    pub fn new() -> Self {
        StructRegistry::default()
    }

    /// The C++ struct name for this record type, synthesizing a new
    /// definition the first time a given field shape is seen.
    pub fn struct_name(&mut self, fields: &IndexMap<String, Type>) -> String {
        let mut sorted: Vec<(&String, &Type)> = fields.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(b.0));

        let signature: String = sorted
            .iter()
            .map(|(name, ty)| format!("{name}:{}", cpp_type_signature(ty)))
            .collect::<Vec<_>>()
            .join(",");

        if let Some(existing) = self.by_signature.get(&signature) {
            return existing.clone();
        }

        let mut hasher = DefaultHasher::new();
        signature.hash(&mut hasher);
        let name = format!("Record_{:x}", hasher.finish());

        let field_types = sorted.iter().map(|(n, ty)| (n.to_string(), self.cpp_type(ty))).collect();
        self.definitions.insert(name.clone(), field_types);
        self.by_signature.insert(signature, name.clone());
        name
    }

    /// C++ source for every struct synthesized so far, in first-seen order.
    pub fn emit_definitions(&self) -> String {
        let mut out = String::new();
        for (name, fields) in &self.definitions {
            out.push_str(&format!("struct {name} {{\n"));
            for (field_name, field_type) in fields {
                out.push_str(&format!("    {field_type} {field_name};\n"));
            }
            out.push_str("};\n\n");
        }
        out
    }

    /// The C++ type for `ty`, synthesizing struct definitions for any
    /// records encountered along the way.
    pub fn cpp_type(&mut self, ty: &Type) -> String {
        match &ty.kind {
            TypeKind::Scalar(ScalarKind::Integer) => "int64_t".to_string(),
            TypeKind::Scalar(ScalarKind::Real) => "double".to_string(),
            TypeKind::Scalar(ScalarKind::Boolean) => "bool".to_string(),
            TypeKind::Scalar(ScalarKind::Any) => "json".to_string(),
            TypeKind::Array { element, .. } | TypeKind::Stream { element, .. } => {
                format!("std::vector<{}>", self.cpp_type(element))
            }
            TypeKind::Record { fields } => self.struct_name(fields),
            TypeKind::Named { name, aliased } => {
                // typedefs are declared once in the module prelude; callers
                // that only need a type to write inline still get the
                // underlying C++ type here.
                let _ = name;
                self.cpp_type(aliased)
            }
        }
    }

    /// `typedef` declarations for every `Named` type the emitter's walk
    /// encountered, keyed by alias name to avoid duplicate typedefs.
    pub fn typedef(&mut self, name: &str, aliased: &Type) -> String {
        format!("typedef {} {name};\n", self.cpp_type(aliased))
    }
}

/// A signature string used only for struct-shape deduplication -- does not
/// need to be a valid C++ type, just injective over distinct shapes.
fn cpp_type_signature(ty: &Type) -> String {
    match &ty.kind {
        TypeKind::Scalar(k) => format!("{k:?}"),
        TypeKind::Array { element, arity } => format!("array{arity}<{}>", cpp_type_signature(element)),
        TypeKind::Stream { element, arity } => format!("stream{arity}<{}>", cpp_type_signature(element)),
        TypeKind::Record { fields } => {
            let mut sorted: Vec<(&String, &Type)> = fields.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            let parts: Vec<String> = sorted.iter().map(|(n, t)| format!("{n}:{}", cpp_type_signature(t))).collect();
            format!("record{{{}}}", parts.join(","))
        }
        TypeKind::Named { aliased, .. } => cpp_type_signature(aliased),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_types_map_to_fixed_width_cpp_types() {
        let mut reg = StructRegistry::new();
        assert_eq!(reg.cpp_type(&Type::integer()), "int64_t");
        assert_eq!(reg.cpp_type(&Type::real()), "double");
        assert_eq!(reg.cpp_type(&Type::boolean()), "bool");
    }

    #[test]
    fn array_of_integer_is_a_vector() {
        let mut reg = StructRegistry::new();
        assert_eq!(reg.cpp_type(&Type::array(Type::integer(), 1)), "std::vector<int64_t>");
    }

    #[test]
    fn identical_record_shapes_reuse_one_struct_name() {
        let mut reg = StructRegistry::new();
        let mut fields_a = IndexMap::new();
        fields_a.insert("x".to_string(), Type::integer());
        fields_a.insert("y".to_string(), Type::real());
        let mut fields_b = IndexMap::new();
        fields_b.insert("y".to_string(), Type::real());
        fields_b.insert("x".to_string(), Type::integer());

        let name_a = reg.struct_name(&fields_a);
        let name_b = reg.struct_name(&fields_b);
        assert_eq!(name_a, name_b, "field order must not affect struct identity");
        assert_eq!(reg.definitions.len(), 1);
    }

    #[test]
    fn differing_record_shapes_get_distinct_names() {
        let mut reg = StructRegistry::new();
        let mut a = IndexMap::new();
        a.insert("x".to_string(), Type::integer());
        let mut b = IndexMap::new();
        b.insert("x".to_string(), Type::real());
        assert_ne!(reg.struct_name(&a), reg.struct_name(&b));
    }
}
