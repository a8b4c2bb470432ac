use super::*;
use crate::types::Dynamic;
use pretty_assertions::assert_eq;

trait Animal: Dynamic {
    fn sound(&self) -> &'static str;
}
trait Pet: Animal {
    fn name(&self) -> &str;
}

struct Dog {
    name: String,
}
struct Cat;
struct Wolf;

impl Animal for Dog {
    fn sound(&self) -> &'static str {
        "woof"
    }
}
impl Pet for Dog {
    fn name(&self) -> &str {
        &self.name
    }
}
impl Animal for Cat {
    fn sound(&self) -> &'static str {
        "meow"
    }
}
impl Animal for Wolf {
    fn sound(&self) -> &'static str {
        "howl"
    }
}

crate::hierarchy! {
    struct Animals: dyn Animal {
        Dog: [dyn Pet],
        Cat,
    }
}

crate::hierarchy! {
    struct Twice: dyn Animal { Cat, Dog, Cat }
}

fn names(seq: &TypeSeq) -> Vec<String> {
    seq.iter().map(TypeTag::short_name).collect()
}

#[test]
fn test_descriptor_lists_concretes_in_order() {
    let descriptor = Animals::descriptor().unwrap();
    assert_eq!(descriptor.len(), 2);
    assert_eq!(descriptor.base(), TypeTag::of::<dyn Animal>());
    assert_eq!(names(&descriptor.concrete_tags()), ["Dog", "Cat"]);
    assert!(descriptor.concrete_tags().all_unique());
}

#[test]
fn test_descriptor_is_built_once() {
    let first = Animals::descriptor().unwrap();
    let second = Animals::descriptor().unwrap();
    assert!(std::ptr::eq(first, second));
}

#[test]
fn test_lineage_is_self_then_ancestors_then_base() {
    let descriptor = Animals::descriptor().unwrap();
    let dog = descriptor.find(std::any::TypeId::of::<Dog>()).unwrap();
    assert_eq!(names(&dog.lineage()), ["Dog", "dyn Pet", "dyn Animal"]);
    assert_eq!(dog.depth_of(&TypeTag::of::<Dog>()), Some(0));
    assert_eq!(dog.depth_of(&TypeTag::of::<dyn Pet>()), Some(1));
    assert_eq!(dog.depth_of(&TypeTag::of::<dyn Animal>()), Some(2));
    assert_eq!(dog.depth_of(&TypeTag::of::<Cat>()), None);

    let cat = descriptor.find(std::any::TypeId::of::<Cat>()).unwrap();
    assert_eq!(names(&cat.lineage()), ["Cat", "dyn Animal"]);
    assert_eq!(cat.depth_of(&TypeTag::of::<dyn Pet>()), None);
}

#[test]
fn test_find_rejects_undeclared_type() {
    let descriptor = Animals::descriptor().unwrap();
    assert!(descriptor.find(std::any::TypeId::of::<Wolf>()).is_none());
}

#[test]
fn test_narrow_shared_along_lineage() {
    let descriptor = Animals::descriptor().unwrap();
    let dog = descriptor.find(std::any::TypeId::of::<Dog>()).unwrap();
    let rex = Dog {
        name: "Rex".to_string(),
    };
    let any: &dyn std::any::Any = &rex;

    assert_eq!(dog.narrow::<Dog>(any).map(|d| d.name.as_str()), Some("Rex"));
    assert_eq!(dog.narrow::<dyn Pet>(any).map(|p| p.name()), Some("Rex"));
    assert_eq!(dog.narrow::<dyn Animal>(any).map(|a| a.sound()), Some("woof"));
    assert!(dog.narrow::<Cat>(any).is_none());

    // The descriptor entry must match the object's concrete type.
    let cat = descriptor.find(std::any::TypeId::of::<Cat>()).unwrap();
    assert!(cat.narrow::<dyn Animal>(any).is_none());
}

#[test]
fn test_narrow_exclusive_allows_mutation() {
    let descriptor = Animals::descriptor().unwrap();
    let dog = descriptor.find(std::any::TypeId::of::<Dog>()).unwrap();
    let mut rex = Dog {
        name: "Rex".to_string(),
    };

    if let Some(d) = dog.narrow_mut::<Dog>(&mut rex) {
        d.name.push_str(" II");
    }
    assert_eq!(rex.name, "Rex II");
    assert!(dog.narrow_mut::<dyn Pet>(&mut rex).is_some());
}

#[test]
fn test_duplicate_concrete_is_malformed() {
    let err = Twice::descriptor().unwrap_err();
    assert_eq!(
        err,
        DispatchError::MalformedHierarchy {
            base: std::any::type_name::<dyn Animal>(),
            duplicate: std::any::type_name::<Cat>(),
        }
    );
    // Memoized: the same error again.
    assert_eq!(Twice::descriptor().unwrap_err(), err);
}

#[test]
fn test_empty_hierarchy_builds() {
    let descriptor = HierarchyDescriptor::builder::<dyn Animal>().build().unwrap();
    assert!(descriptor.is_empty());
    assert!(descriptor.concrete_tags().is_empty());
}

#[test]
fn test_summary_serializes_short_names() {
    let summary = Animals::descriptor().unwrap().summary();
    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "base": "dyn Animal",
            "concretes": ["Dog", "Cat"],
        })
    );
}
