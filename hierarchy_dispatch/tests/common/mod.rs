//! Shared hierarchies for integration tests
// Each test target uses a different subset of these fixtures.
#![allow(dead_code)]

use hierarchy_dispatch::{hierarchy, Dynamic};

/// Install a tracing subscriber honouring `RUST_LOG`, once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ---------------------------------------------------------------------------
// Shapes

pub trait Shape: Dynamic {}

#[derive(Debug, Default)]
pub struct Square;
#[derive(Debug, Default)]
pub struct Circle;
/// Implements `Shape` but is left out of `Shapes`.
#[derive(Debug, Default)]
pub struct BadShape;

impl Shape for Square {}
impl Shape for Circle {}
impl Shape for BadShape {}

hierarchy! {
    pub struct Shapes: dyn Shape { Square, Circle }
}

// ---------------------------------------------------------------------------
// Colors

pub trait Color: Dynamic {}

#[derive(Debug, Default)]
pub struct Red;
#[derive(Debug, Default)]
pub struct Blue;

impl Color for Red {}
impl Color for Blue {}

hierarchy! {
    pub struct Colors: dyn Color { Red, Blue }
}

// ---------------------------------------------------------------------------
// Arithmetic AST

pub trait Expr: Dynamic {}

/// Expressions with two operands.
pub trait BinaryOp: Expr {
    fn symbol(&self) -> char;
    fn operands(&self) -> (&dyn Expr, &dyn Expr);
    fn operands_mut(&mut self) -> (&mut dyn Expr, &mut dyn Expr);
}

#[derive(Debug, PartialEq)]
pub struct Value(pub i32);

pub struct Negate(pub Box<dyn Expr>);

pub struct Plus(pub Box<dyn Expr>, pub Box<dyn Expr>);

pub struct Times(pub Box<dyn Expr>, pub Box<dyn Expr>);

/// Implements `Expr` but is left out of `Exprs`.
pub struct Modulo(pub Box<dyn Expr>, pub Box<dyn Expr>);

impl Expr for Value {}
impl Expr for Negate {}
impl Expr for Plus {}
impl Expr for Times {}
impl Expr for Modulo {}

macro_rules! binary_op {
    ($name:ident, $symbol:literal) => {
        impl BinaryOp for $name {
            fn symbol(&self) -> char {
                $symbol
            }

            fn operands(&self) -> (&dyn Expr, &dyn Expr) {
                (self.0.as_ref(), self.1.as_ref())
            }

            fn operands_mut(&mut self) -> (&mut dyn Expr, &mut dyn Expr) {
                (self.0.as_mut(), self.1.as_mut())
            }
        }
    };
}

binary_op!(Plus, '+');
binary_op!(Times, '*');

hierarchy! {
    pub struct Exprs: dyn Expr {
        Value,
        Negate,
        Plus: [dyn BinaryOp],
        Times: [dyn BinaryOp],
    }
}

pub fn value(i: i32) -> Box<dyn Expr> {
    Box::new(Value(i))
}

pub fn negate(expr: Box<dyn Expr>) -> Box<dyn Expr> {
    Box::new(Negate(expr))
}

pub fn plus(lhs: Box<dyn Expr>, rhs: Box<dyn Expr>) -> Box<dyn Expr> {
    Box::new(Plus(lhs, rhs))
}

pub fn times(lhs: Box<dyn Expr>, rhs: Box<dyn Expr>) -> Box<dyn Expr> {
    Box::new(Times(lhs, rhs))
}

/// `-(2 + 3) * 4`
pub fn sample_expr() -> Box<dyn Expr> {
    times(negate(plus(value(2), value(3))), value(4))
}
