//! Design document generation.
//!
//! Each type gets one design document bundling a listing view, an optional
//! index view and a validation function. The predicates live here as plain
//! Rust values ([`ListingView`], [`IndexView`], [`AccessRule`]) so they can be
//! evaluated in process; [`generate`] renders them into the JavaScript that
//! CouchDB executes. Rendering is deterministic: the same descriptor always
//! produces byte-identical scripts.

use rcdb_model::{
    is_truthy, DesignDocument, DesignDocumentMeta, DesignViews, Document, FieldPath, UserContext,
    ViewFunction,
};
use rcdb_types::{TypeName, ADMIN_ROLE, DESIGN_PREFIX, TYPE_FIELD};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Name of the listing view in every generated design document.
pub const LISTING_VIEW: &str = "all_docs";

/// Name of the index view, present only when index fields are configured.
pub const INDEX_VIEW: &str = "index";

/// What the validation function does for a type with no write roles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyRolesPolicy {
    /// Any authenticated user may write.
    #[default]
    Open,
    /// Only admins may write.
    Closed,
}

/// Everything the generator needs to know about one type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    pub type_name: TypeName,
    pub indexes: Vec<String>,
    pub write_roles: Vec<String>,
    pub empty_roles: EmptyRolesPolicy,
}

impl TypeDescriptor {
    pub fn meta(&self) -> DesignDocumentMeta {
        DesignDocumentMeta {
            indexes: self.indexes.clone(),
            write_roles: self.write_roles.clone(),
        }
    }
}

/// A write rejected by an [`AccessRule`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("forbidden: {reason}")]
pub struct Forbidden {
    pub reason: String,
}

/// Lists every live document of one type, keyed by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingView {
    full_type: String,
}

impl ListingView {
    pub fn new(type_name: &TypeName) -> Self {
        Self {
            full_type: type_name.full().to_string(),
        }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        !doc.is_deleted() && doc.type_tag() == Some(self.full_type.as_str())
    }

    pub fn render(&self) -> String {
        format!(
            r#"function (doc) {{
  if (!doc._deleted && doc[{field}] === {full_type}) {{
    emit(doc._id);
  }}
}}"#,
            field = js(TYPE_FIELD),
            full_type = js(&self.full_type),
        )
    }
}

/// Maps live documents of one type to a composite key built from field paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexView {
    full_type: String,
    fields: Vec<FieldPath>,
}

impl IndexView {
    /// Returns `None` when there are no fields, since no view is emitted then.
    pub fn new(type_name: &TypeName, fields: &[String]) -> Option<Self> {
        if fields.is_empty() {
            return None;
        }
        Some(Self {
            full_type: type_name.full().to_string(),
            fields: fields.iter().map(FieldPath::parse).collect(),
        })
    }

    pub fn fields(&self) -> &[FieldPath] {
        &self.fields
    }

    /// The key this document is indexed under, or `None` if it is excluded.
    ///
    /// A document is excluded when it is deleted, belongs to another type, or
    /// any field resolves to an absent or falsy value.
    pub fn key(&self, doc: &Document) -> Option<Vec<Value>> {
        if doc.is_deleted() || doc.type_tag() != Some(self.full_type.as_str()) {
            return None;
        }
        self.fields
            .iter()
            .map(|path| doc.resolve(path).filter(|v| is_truthy(v)).cloned())
            .collect()
    }

    pub fn render(&self) -> String {
        let fields: Vec<&str> = self.fields.iter().map(FieldPath::as_str).collect();
        format!(
            r#"function (doc) {{
  function by_path(o, s) {{
    s = s.replace(/\[([^\]]+)\]/g, '.$1');
    s = s.replace(/^\./, '');
    var a = s.split('.');
    for (var j = 0, n = a.length; j < n; ++j) {{
      var k = a[j];
      if (o !== null && typeof o === 'object' && k in o) {{
        o = o[k];
      }} else {{
        return;
      }}
    }}
    return o;
  }}
  if (doc._deleted || doc[{field}] !== {full_type}) {{
    return;
  }}
  var fields = {fields};
  var key = [];
  for (var i = 0; i < fields.length; i++) {{
    var value = by_path(doc, fields[i]);
    if (!value) {{
      return;
    }}
    key.push(value);
  }}
  emit(key, doc);
}}"#,
            field = js(TYPE_FIELD),
            full_type = js(&self.full_type),
            fields = js(&fields),
        )
    }
}

/// The validation function guarding writes of one type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRule {
    design_id: String,
    full_type: String,
    write_roles: Vec<String>,
    empty_roles: EmptyRolesPolicy,
}

impl AccessRule {
    pub fn new(
        type_name: &TypeName,
        write_roles: &[String],
        empty_roles: EmptyRolesPolicy,
    ) -> Self {
        Self {
            design_id: type_name.design_id(),
            full_type: type_name.full().to_string(),
            write_roles: write_roles.to_vec(),
            empty_roles,
        }
    }

    /// Decides a write of `new_doc` over `old_doc` by `user`.
    ///
    /// A deletion tombstone carries no type tag of its own; it is judged as
    /// a write of the type of the document it deletes.
    pub fn check(
        &self,
        new_doc: &Document,
        old_doc: Option<&Document>,
        user: &UserContext,
    ) -> Result<(), Forbidden> {
        if user.is_admin() {
            return Ok(());
        }

        let old_type = old_doc.and_then(Document::type_tag);
        let new_type = if new_doc.is_deleted() && old_doc.is_some() {
            old_type
        } else {
            new_doc.type_tag()
        };

        if old_doc.is_some() && old_type != new_type {
            return Err(Forbidden {
                reason: "You do not have permission to change document type".to_string(),
            });
        }

        if new_type != Some(self.full_type.as_str()) {
            return Ok(());
        }

        if self.write_roles.is_empty() && self.empty_roles == EmptyRolesPolicy::Open {
            return Ok(());
        }
        if user.has_any_role(self.write_roles.as_slice()) {
            return Ok(());
        }

        Err(Forbidden {
            reason: format!(
                "You do not have write permissions (dd: {}) (user: {}) (req: {})",
                self.design_id,
                js(&user.roles),
                self.write_roles.join(",")
            ),
        })
    }

    pub fn render(&self) -> String {
        let open_when_empty = match self.empty_roles {
            EmptyRolesPolicy::Open => "\n  if (roles.length === 0) {\n    return;\n  }",
            EmptyRolesPolicy::Closed => "",
        };
        format!(
            r#"function (newDoc, oldDoc, userCtx, secObj) {{
  if (userCtx.roles.indexOf({admin}) !== -1) {{
    return;
  }}
  var newType = newDoc[{field}];
  if (newDoc._deleted && oldDoc) {{
    newType = oldDoc[{field}];
  }}
  if (oldDoc && oldDoc[{field}] !== newType) {{
    throw({{forbidden: 'You do not have permission to change document type'}});
  }}
  if (newType !== {full_type}) {{
    return;
  }}
  var roles = {roles};{open_when_empty}
  for (var i = 0; i < roles.length; i++) {{
    if (userCtx.roles.indexOf(roles[i]) !== -1) {{
      return;
    }}
  }}
  throw({{
    forbidden: 'You do not have write permissions (dd: ' + {design_id} + ') (user: ' +
      JSON.stringify(userCtx.roles) + ') (req: ' + roles + ')'
  }});
}}"#,
            admin = js(ADMIN_ROLE),
            field = js(TYPE_FIELD),
            full_type = js(&self.full_type),
            roles = js(&self.write_roles),
            design_id = js(&self.design_id),
        )
    }
}

/// The host-side predicates of one design document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesignRules {
    pub type_name: TypeName,
    pub listing: ListingView,
    pub index: Option<IndexView>,
    pub access: AccessRule,
}

impl DesignRules {
    pub fn new(descriptor: &TypeDescriptor) -> Self {
        let type_name = &descriptor.type_name;
        Self {
            type_name: type_name.clone(),
            listing: ListingView::new(type_name),
            index: IndexView::new(type_name, &descriptor.indexes),
            access: AccessRule::new(type_name, &descriptor.write_roles, descriptor.empty_roles),
        }
    }

    /// Rebuilds the rules of a design document previously written by [`generate`].
    ///
    /// Returns `None` for design documents that were not generated here.
    pub fn from_stored(doc: &Document, empty_roles: EmptyRolesPolicy) -> Option<Self> {
        let type_name = parse_design_id(doc.id()?)?;
        let meta = DesignDocumentMeta::from_document(doc)?;
        Some(Self::new(&TypeDescriptor {
            type_name,
            indexes: meta.indexes,
            write_roles: meta.write_roles,
            empty_roles,
        }))
    }
}

/// Produces the design document for a type. The revision is left unset.
pub fn generate(descriptor: &TypeDescriptor) -> DesignDocument {
    let rules = DesignRules::new(descriptor);
    DesignDocument {
        id: descriptor.type_name.design_id(),
        rev: None,
        meta: descriptor.meta(),
        views: DesignViews {
            all_docs: ViewFunction {
                map: rules.listing.render(),
            },
            index: rules.index.as_ref().map(|index| ViewFunction {
                map: index.render(),
            }),
        },
        validate_doc_update: rules.access.render(),
    }
}

/// Recovers the type name from a design document id of the form
/// `_design/<schema>.<schema>.<base>`.
pub fn parse_design_id(id: &str) -> Option<TypeName> {
    let name = id.strip_prefix(DESIGN_PREFIX)?;
    name.match_indices('.').find_map(|(dot, _)| {
        let schema = name.get(..dot)?;
        let rest = name.get(dot + 1..)?;
        let base = rest.strip_prefix(schema)?.strip_prefix('.')?;
        TypeName::with_schema(schema, base).ok()
    })
}

/// Encodes a value as a JavaScript literal.
fn js<T: Serialize + ?Sized>(value: &T) -> String {
    // serializing strings and string slices cannot fail
    serde_json::to_string(value).unwrap_or_default()
}
