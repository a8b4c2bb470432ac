//! Single dispatch through visitors, overloads and `matching`.

mod common;

use common::*;
use hierarchy_dispatch::prelude::*;
use hierarchy_dispatch::{Hierarchy, MissingCasePolicy, Registry, RegistryConfig};
use pretty_assertions::assert_eq;

fn shapes() -> Vec<Box<dyn Shape>> {
    vec![Box::new(Square), Box::new(Circle)]
}

struct ShapeNamer;

impl ShapeNamer {
    fn square(&self, _: &Square, _: ()) -> VisitResult<Self> {
        Ok("square".to_string())
    }

    fn circle(&self, _: &Circle, _: ()) -> VisitResult<Self> {
        Ok("circle".to_string())
    }
}

impl Visitor for ShapeNamer {
    type Hierarchy = Shapes;
    type Args<'o> = ();
    type Output<'o> = String;
    type Error = DispatchError;

    fn cases(cases: &mut Cases<Self>) {
        cases.on(Self::square).on(Self::circle);
    }
}

#[test]
fn test_visitor_selects_exact_case() {
    common::init_tracing();
    let names: Vec<String> = shapes()
        .iter()
        .map(|s| ShapeNamer.visit(s.as_ref()).unwrap())
        .collect();
    assert_eq!(names, ["square", "circle"]);
}

#[test]
fn test_overload_set_through_dispatcher() {
    let get_shape_name = Overload::<Shapes, String>::new()
        .case(|_: &Square| "square".to_string())
        .case(|_: &Circle| "circle".to_string());

    let names: Vec<String> = shapes()
        .iter()
        .map(|s| Dispatcher::<Shapes>::visit(&get_shape_name, s.as_ref()).unwrap())
        .collect();
    assert_eq!(names, ["square", "circle"]);
}

#[test]
fn test_matching_agrees_with_visit() {
    for shape in shapes() {
        let matched = Dispatcher::<Shapes>::matching(shape.as_ref()).with(
            Overload::<Shapes, String>::new()
                .case(|_: &Square| "square".to_string())
                .case(|_: &Circle| "circle".to_string()),
        );
        let visited = ShapeNamer.visit(shape.as_ref());
        assert_eq!(matched, visited);
    }
}

#[test]
fn test_undeclared_concrete_is_unhandled() {
    let bad: &dyn Shape = &BadShape;
    let err = ShapeNamer.visit(bad).unwrap_err();
    assert!(err.is_unhandled());
    assert!(matches!(err, DispatchError::UnhandledType { type_name } if type_name.ends_with("BadShape")));

    let any_shape = Overload::<Shapes, u8>::new().otherwise(|_| 1);
    assert!(Dispatcher::<Shapes>::visit(&any_shape, bad)
        .unwrap_err()
        .is_unhandled());
}

#[test]
fn test_base_case_catches_every_declared_concrete() {
    struct Counter;

    impl Counter {
        fn square(&self, _: &Square, _: ()) -> VisitResult<Self> {
            Ok(4)
        }

        fn shape(&self, _: &dyn Shape, _: ()) -> VisitResult<Self> {
            Ok(0)
        }
    }

    impl Visitor for Counter {
        type Hierarchy = Shapes;
        type Args<'o> = ();
        type Output<'o> = u32;
        type Error = DispatchError;

        fn cases(cases: &mut Cases<Self>) {
            cases.otherwise(Self::shape).on(Self::square);
        }
    }

    let corners: Vec<u32> = shapes()
        .iter()
        .map(|s| Counter.visit(s.as_ref()).unwrap())
        .collect();
    assert_eq!(corners, [4, 0]);
}

#[test]
fn test_every_leaf_needs_a_case() {
    struct SquaresOnly;

    impl SquaresOnly {
        fn square(&self, _: &Square, _: ()) -> VisitResult<Self> {
            Ok(())
        }
    }

    impl Visitor for SquaresOnly {
        type Hierarchy = Shapes;
        type Args<'o> = ();
        type Output<'o> = ();
        type Error = DispatchError;

        fn cases(cases: &mut Cases<Self>) {
            cases.on(Self::square);
        }
    }

    let registry = Registry::new();
    let square: &dyn Shape = &Square;
    let err = SquaresOnly.visit_in(&registry, square, ()).unwrap_err();
    match err {
        DispatchError::MissingCase { handler, types } => {
            assert_eq!(handler, "SquaresOnly");
            assert_eq!(types.len(), 1);
            assert!(types[0].ends_with("Circle"));
        }
        other => panic!("expected MissingCase, got {other:?}"),
    }

    // Under the skip policy the table is built without Circle.
    let lenient = Registry::with_config(RegistryConfig::new(MissingCasePolicy::Skip));
    assert_eq!(SquaresOnly.visit_in(&lenient, square, ()), Ok(()));
    let circle: &dyn Shape = &Circle;
    assert!(SquaresOnly
        .visit_in(&lenient, circle, ())
        .unwrap_err()
        .is_unhandled());
}

#[test]
fn test_shared_and_exclusive_tables_are_separate() {
    let registry = Registry::new();
    let label = Overload::<Shapes, &str>::new()
        .case_mut(|_: &mut Square| "mut square")
        .otherwise(|_| "shape");

    let mut square = Square;
    assert_eq!(
        Dispatcher::<Shapes>::visit_in(&registry, &label, &mut square as &mut dyn Shape, ()),
        Ok("mut square")
    );
    assert_eq!(
        Dispatcher::<Shapes>::visit_in(&registry, &label, &square as &dyn Shape, ()),
        Ok("shape")
    );
    assert_eq!(registry.stats().tables, 2);
}

#[test]
fn test_hierarchy_summary() {
    let summary = Shapes::descriptor().unwrap().summary();
    assert_eq!(
        serde_json::to_value(&summary).unwrap()["concretes"],
        serde_json::json!(["Square", "Circle"])
    );
}

// ---------------------------------------------------------------------------
// Results and arguments that borrow

trait Animal: Dynamic {}

struct Dog {
    name: String,
}

struct Cat {
    name: String,
}

impl Animal for Dog {}
impl Animal for Cat {}

hierarchy! { struct Animals: dyn Animal { Dog, Cat } }

/// Returns the animal's name, borrowed from the animal.
struct NameOf;

impl NameOf {
    fn dog<'o>(&self, dog: &'o Dog, _: ()) -> VisitResult<'o, Self> {
        Ok(dog.name.as_str())
    }

    fn cat<'o>(&self, cat: &'o Cat, _: ()) -> VisitResult<'o, Self> {
        Ok(cat.name.as_str())
    }
}

impl Visitor for NameOf {
    type Hierarchy = Animals;
    type Args<'o> = ();
    type Output<'o> = &'o str;
    type Error = DispatchError;

    fn cases(cases: &mut Cases<Self>) {
        cases.on(Self::dog).on(Self::cat);
    }
}

/// Appends the names of dogs to a caller-owned list.
struct DogNames;

impl DogNames {
    fn dog(&self, dog: &Dog, out: &mut Vec<String>) -> VisitResult<Self> {
        out.push(dog.name.clone());
        Ok(())
    }

    fn animal(&self, _: &dyn Animal, _: &mut Vec<String>) -> VisitResult<Self> {
        Ok(())
    }
}

impl Visitor for DogNames {
    type Hierarchy = Animals;
    type Args<'o> = &'o mut Vec<String>;
    type Output<'o> = ();
    type Error = DispatchError;

    fn cases(cases: &mut Cases<Self>) {
        cases.otherwise(Self::animal).on(Self::dog);
    }
}

fn animals() -> Vec<Box<dyn Animal>> {
    vec![
        Box::new(Dog { name: "Rex".into() }),
        Box::new(Cat { name: "Tom".into() }),
        Box::new(Dog { name: "Fido".into() }),
    ]
}

#[test]
fn test_visitor_result_borrows_the_operand() {
    let zoo = animals();
    let names: Vec<&str> = zoo
        .iter()
        .map(|a| NameOf.visit(a.as_ref()).unwrap())
        .collect();
    assert_eq!(names, ["Rex", "Tom", "Fido"]);
}

#[test]
fn test_visitor_arguments_borrow_the_caller() {
    let mut out = Vec::new();
    for animal in animals() {
        DogNames.visit_with(animal.as_ref(), &mut out).unwrap();
    }
    assert_eq!(out, ["Rex", "Fido"]);
}

#[test]
fn test_matching_returns_a_borrow_of_the_operand() {
    let mut dog = Dog { name: "Rex".into() };
    let animal: &dyn Animal = &dog;
    let name = Dispatcher::<Animals>::matching(animal).with(
        OverloadRef::<Animals, str>::new()
            .case(|d: &Dog| d.name.as_str())
            .case(|c: &Cat| c.name.as_str()),
    );
    assert_eq!(name, Ok("Rex"));

    // A kept overload serves operands of any lifetime.
    let names = OverloadRef::<Animals, str>::new()
        .case(|d: &Dog| d.name.as_str())
        .otherwise(|_| "?");
    dog.name.push('y');
    assert_eq!(Dispatcher::<Animals>::visit(&names, &dog as &dyn Animal), Ok("Rexy"));
    let cat = Cat { name: "Tom".into() };
    assert_eq!(Dispatcher::<Animals>::visit(&names, &cat as &dyn Animal), Ok("?"));
}

#[test]
fn test_overload_extra_arguments() {
    let greet = Overload::<Animals, String, &str>::new()
        .case_with(|d: &Dog, greeting| format!("{greeting}, {}", d.name))
        .otherwise_with(|_, greeting| format!("{greeting}, stranger"));

    let dog = Dog { name: "Rex".into() };
    let cat = Cat { name: "Tom".into() };
    assert_eq!(
        Dispatcher::<Animals>::visit_with(&greet, &dog as &dyn Animal, "Hi"),
        Ok("Hi, Rex".to_string())
    );
    assert_eq!(
        Dispatcher::<Animals>::visit_with(&greet, &cat as &dyn Animal, "Hello"),
        Ok("Hello, stranger".to_string())
    );
    assert_eq!(cat.name, "Tom");
}

// ---------------------------------------------------------------------------
// A hierarchy that lists a concrete type twice

hierarchy! { struct Doubled: dyn Shape { Square, Circle, Square } }

struct DoubledNamer;

impl DoubledNamer {
    fn shape(&self, _: &dyn Shape, _: ()) -> VisitResult<Self> {
        Ok("shape")
    }
}

impl Visitor for DoubledNamer {
    type Hierarchy = Doubled;
    type Args<'o> = ();
    type Output<'o> = &'static str;
    type Error = DispatchError;

    fn cases(cases: &mut Cases<Self>) {
        cases.otherwise(Self::shape);
    }
}

fn is_malformed<T>(result: Result<T, DispatchError>) -> bool {
    matches!(
        result,
        Err(DispatchError::MalformedHierarchy { duplicate, .. }) if duplicate.ends_with("Square")
    )
}

#[test]
fn test_malformed_hierarchy_fails_every_dispatch() {
    let square: &dyn Shape = &Square;
    assert!(is_malformed(DoubledNamer.visit(square)));
    assert!(is_malformed(
        Dispatcher::<Doubled>::matching(square).with(Overload::<Doubled, u8>::new().otherwise(|_| 0))
    ));

    let red: &dyn Color = &Red;
    let pair = Overload2::<Colors, Doubled, u8>::new().otherwise(|_, _| 0);
    assert!(is_malformed(Dispatcher2::<Colors, Doubled>::visit(&pair, red, square)));
    assert!(is_malformed(
        Dispatcher2::<Colors, Doubled>::matching(red, square).with(pair)
    ));
}
