//! Deterministic, prefixed entity identifiers.
//!
//! Every entity id carries a short prefix naming its kind, so two entities of
//! different kinds can never collide and an id alone tells a reader what it
//! refers to:
//!
//! - `pkg:<dotted_path>`
//! - `mod:<dotted_path>`
//! - `cls:<module_id>:<class_name>`
//! - `meth:<class_id>:<method_name>:<line>` / `func:<name>:<line>`
//! - `field:<class_id>:<field_name>`
//! - `rel:<from_id>-><to_id>:<variant>`
//!
//! Ids are pure functions of their inputs; re-running the analyser on the
//! same bytes yields the same ids.

use crate::models::DependencyKind;

pub fn package_id(dotted_path: &str) -> String {
    format!("pkg:{dotted_path}")
}

pub fn module_id(dotted_name: &str) -> String {
    format!("mod:{dotted_name}")
}

pub fn class_id(module_id: &str, class_name: &str) -> String {
    format!("cls:{module_id}:{class_name}")
}

/// Methods owned by a class embed the class id; module-level functions use
/// the shorter `func:` form. The line number disambiguates overloads defined
/// at different places in the same scope.
pub fn method_id(class_id: Option<&str>, name: &str, line: usize) -> String {
    match class_id {
        Some(cls) => format!("meth:{cls}:{name}:{line}"),
        None => format!("func:{name}:{line}"),
    }
}

pub fn field_id(class_id: &str, field_name: &str) -> String {
    format!("field:{class_id}:{field_name}")
}

pub fn relationship_id(from: &str, to: &str, kind: DependencyKind) -> String {
    format!("rel:{from}->{to}:{kind}")
}
