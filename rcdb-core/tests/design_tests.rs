use pretty_assertions::assert_eq;
use rcdb_core::design::{self, parse_design_id, INDEX_VIEW, LISTING_VIEW};
use rcdb_core::{
    AccessRule, DesignRules, EmptyRolesPolicy, IndexView, ListingView, TypeDescriptor,
};
use rcdb_model::{DesignDocumentMeta, Document, UserContext};
use rcdb_types::TypeName;
use serde_json::{json, Value};

fn doc(value: Value) -> Document {
    Document::try_from(value).unwrap()
}

fn widgets() -> TypeName {
    TypeName::new("widgets").unwrap()
}

fn descriptor(indexes: &[&str], roles: &[&str]) -> TypeDescriptor {
    TypeDescriptor {
        type_name: widgets(),
        indexes: indexes.iter().map(|s| s.to_string()).collect(),
        write_roles: roles.iter().map(|s| s.to_string()).collect(),
        empty_roles: EmptyRolesPolicy::Open,
    }
}

fn user(roles: &[&str]) -> UserContext {
    UserContext::with_roles("bob", roles.iter().copied())
}

// ── Generation ──────────────────────────────────────────────────

#[test]
fn generate_minimal_design_document() {
    let design = design::generate(&descriptor(&[], &[]));

    assert_eq!(design.id, "_design/dbo.dbo.widgets");
    assert_eq!(design.rev, None);
    assert_eq!(design.meta, DesignDocumentMeta::default());
    assert!(design.views.index.is_none());
    assert!(design.views.all_docs.map.contains("\"dbo.widgets\""));
    assert!(design.views.all_docs.map.contains("\"rcdb:type\""));
    assert!(design.validate_doc_update.contains("\"_admin\""));
}

#[test]
fn generate_with_indexes_and_roles() {
    let design = design::generate(&descriptor(&["name", "owner.id"], &["editors"]));

    assert_eq!(design.meta.indexes, vec!["name", "owner.id"]);
    assert_eq!(design.meta.write_roles, vec!["editors"]);
    let index = design.views.index.expect("index view");
    assert!(index.map.contains(r#"["name","owner.id"]"#));
    assert!(design.validate_doc_update.contains(r#"["editors"]"#));
}

#[test]
fn generation_is_deterministic() {
    let d = descriptor(&["a[0].b"], &["x", "y"]);
    assert_eq!(design::generate(&d), design::generate(&d));
}

#[test]
fn custom_schema_in_design_id() {
    let d = TypeDescriptor {
        type_name: TypeName::with_schema("crm", "contacts").unwrap(),
        indexes: vec![],
        write_roles: vec![],
        empty_roles: EmptyRolesPolicy::Open,
    };
    let design = design::generate(&d);
    assert_eq!(design.id, "_design/crm.crm.contacts");
    assert!(design.views.all_docs.map.contains("\"crm.contacts\""));
}

#[test]
fn empty_roles_policy_changes_script() {
    let open = AccessRule::new(&widgets(), &[], EmptyRolesPolicy::Open);
    let closed = AccessRule::new(&widgets(), &[], EmptyRolesPolicy::Closed);
    assert!(open.render().contains("roles.length === 0"));
    assert!(!closed.render().contains("roles.length === 0"));
}

#[test]
fn design_document_round_trips_through_document() {
    let design = design::generate(&descriptor(&["name"], &["editors"]));
    let as_doc = design.to_document().unwrap();
    assert_eq!(as_doc.id(), Some("_design/dbo.dbo.widgets"));
    assert_eq!(
        DesignDocumentMeta::from_document(&as_doc),
        Some(design.meta.clone())
    );
    let back = rcdb_model::DesignDocument::try_from(as_doc).unwrap();
    assert_eq!(back, design);
}

#[test]
fn view_names() {
    assert_eq!(LISTING_VIEW, "all_docs");
    assert_eq!(INDEX_VIEW, "index");
}

// ── Listing view ────────────────────────────────────────────────

#[test]
fn listing_matches_live_docs_of_type() {
    let view = ListingView::new(&widgets());

    assert!(view.matches(&doc(json!({"_id": "a", "rcdb:type": "dbo.widgets"}))));
    assert!(!view.matches(&doc(json!({"_id": "a", "rcdb:type": "dbo.gadgets"}))));
    assert!(!view.matches(&doc(json!({"_id": "a"}))));
    assert!(!view.matches(&doc(
        json!({"_id": "a", "rcdb:type": "dbo.widgets", "_deleted": true})
    )));
}

// ── Index view ──────────────────────────────────────────────────

#[test]
fn index_view_absent_without_fields() {
    assert!(IndexView::new(&widgets(), &[]).is_none());
}

#[test]
fn index_key_follows_field_order() {
    let view = IndexView::new(&widgets(), &["name".into(), "owner.id".into()]).unwrap();
    let d = doc(json!({
        "rcdb:type": "dbo.widgets",
        "name": "bolt",
        "owner": {"id": 7}
    }));
    assert_eq!(view.key(&d), Some(vec![json!("bolt"), json!(7)]));
}

#[test]
fn index_key_supports_bracket_paths() {
    let view = IndexView::new(&widgets(), &["tags[0]".into()]).unwrap();
    let d = doc(json!({"rcdb:type": "dbo.widgets", "tags": ["red", "blue"]}));
    assert_eq!(view.key(&d), Some(vec![json!("red")]));
}

#[test]
fn index_skips_missing_or_falsy_fields() {
    let view = IndexView::new(&widgets(), &["name".into(), "count".into()]).unwrap();

    let missing = doc(json!({"rcdb:type": "dbo.widgets", "name": "bolt"}));
    let zero = doc(json!({"rcdb:type": "dbo.widgets", "name": "bolt", "count": 0}));
    let empty = doc(json!({"rcdb:type": "dbo.widgets", "name": "", "count": 3}));
    assert_eq!(view.key(&missing), None);
    assert_eq!(view.key(&zero), None);
    assert_eq!(view.key(&empty), None);
}

#[test]
fn index_skips_other_types_and_deleted() {
    let view = IndexView::new(&widgets(), &["name".into()]).unwrap();
    let other = doc(json!({"rcdb:type": "dbo.gadgets", "name": "x"}));
    let deleted = doc(json!({"rcdb:type": "dbo.widgets", "name": "x", "_deleted": true}));
    assert_eq!(view.key(&other), None);
    assert_eq!(view.key(&deleted), None);
}

// ── Access rule ─────────────────────────────────────────────────

#[test]
fn admin_may_write_anything() {
    let rule = AccessRule::new(&widgets(), &["editors".into()], EmptyRolesPolicy::Closed);
    let new_doc = doc(json!({"rcdb:type": "dbo.gadgets"}));
    let old_doc = doc(json!({"rcdb:type": "dbo.widgets"}));
    assert!(rule.check(&new_doc, Some(&old_doc), &UserContext::admin()).is_ok());
}

#[test]
fn type_change_is_forbidden() {
    let rule = AccessRule::new(&widgets(), &[], EmptyRolesPolicy::Open);
    let new_doc = doc(json!({"rcdb:type": "dbo.gadgets"}));
    let old_doc = doc(json!({"rcdb:type": "dbo.widgets"}));

    let err = rule.check(&new_doc, Some(&old_doc), &user(&[])).unwrap_err();
    assert_eq!(err.reason, "You do not have permission to change document type");
}

#[test]
fn other_types_are_not_this_rules_concern() {
    let rule = AccessRule::new(&widgets(), &["editors".into()], EmptyRolesPolicy::Closed);
    let new_doc = doc(json!({"rcdb:type": "dbo.gadgets"}));
    assert!(rule.check(&new_doc, None, &user(&[])).is_ok());
}

#[test]
fn role_holder_may_write() {
    let rule = AccessRule::new(&widgets(), &["editors".into()], EmptyRolesPolicy::Open);
    let new_doc = doc(json!({"rcdb:type": "dbo.widgets"}));
    assert!(rule.check(&new_doc, None, &user(&["editors"])).is_ok());
}

#[test]
fn missing_role_is_forbidden_with_details() {
    let rule = AccessRule::new(&widgets(), &["editors".into()], EmptyRolesPolicy::Open);
    let new_doc = doc(json!({"rcdb:type": "dbo.widgets"}));

    let err = rule.check(&new_doc, None, &user(&["viewers"])).unwrap_err();
    assert_eq!(
        err.reason,
        r#"You do not have write permissions (dd: _design/dbo.dbo.widgets) (user: ["viewers"]) (req: editors)"#
    );
}

#[test]
fn empty_roles_open_allows_anyone() {
    let rule = AccessRule::new(&widgets(), &[], EmptyRolesPolicy::Open);
    let new_doc = doc(json!({"rcdb:type": "dbo.widgets"}));
    assert!(rule.check(&new_doc, None, &user(&[])).is_ok());
}

#[test]
fn empty_roles_closed_allows_only_admins() {
    let rule = AccessRule::new(&widgets(), &[], EmptyRolesPolicy::Closed);
    let new_doc = doc(json!({"rcdb:type": "dbo.widgets"}));
    assert!(rule.check(&new_doc, None, &user(&["editors"])).is_err());
    assert!(rule.check(&new_doc, None, &UserContext::admin()).is_ok());
}

#[test]
fn tombstone_is_judged_by_deleted_doc_type() {
    let rule = AccessRule::new(&widgets(), &["editors".into()], EmptyRolesPolicy::Open);
    let old_doc = doc(json!({"_id": "w", "rcdb:type": "dbo.widgets"}));
    let tombstone = doc(json!({"_id": "w", "_deleted": true}));

    assert!(rule.check(&tombstone, Some(&old_doc), &user(&["editors"])).is_ok());
    assert!(rule.check(&tombstone, Some(&old_doc), &user(&[])).is_err());
}

#[test]
fn tombstone_of_other_type_passes() {
    let rule = AccessRule::new(&widgets(), &["editors".into()], EmptyRolesPolicy::Closed);
    let old_doc = doc(json!({"_id": "g", "rcdb:type": "dbo.gadgets"}));
    let tombstone = doc(json!({"_id": "g", "_deleted": true}));
    assert!(rule.check(&tombstone, Some(&old_doc), &user(&[])).is_ok());
}

// ── Stored rules ────────────────────────────────────────────────

#[test]
fn parse_design_id_recovers_type() {
    assert_eq!(parse_design_id("_design/dbo.dbo.widgets"), Some(widgets()));
    assert_eq!(
        parse_design_id("_design/crm.crm.contacts"),
        Some(TypeName::with_schema("crm", "contacts").unwrap())
    );
    assert_eq!(
        parse_design_id("_design/a.b.a.b.c"),
        Some(TypeName::with_schema("a.b", "c").unwrap())
    );
}

#[test]
fn parse_design_id_rejects_foreign_ids() {
    assert_eq!(parse_design_id("dbo.dbo.widgets"), None);
    assert_eq!(parse_design_id("_design/users"), None);
    assert_eq!(parse_design_id("_design/dbo.crm.widgets"), None);
    assert_eq!(parse_design_id("_design/dbo.dbo."), None);
}

#[test]
fn rules_rebuilt_from_stored_design() {
    let d = descriptor(&["name"], &["editors"]);
    let stored = design::generate(&d).to_document().unwrap();

    let rules = DesignRules::from_stored(&stored, EmptyRolesPolicy::Open).unwrap();
    assert_eq!(rules, DesignRules::new(&d));
}

#[test]
fn rules_from_unrelated_design_is_none() {
    let stored = doc(json!({"_id": "_design/app", "views": {}}));
    assert!(DesignRules::from_stored(&stored, EmptyRolesPolicy::Open).is_none());
}
