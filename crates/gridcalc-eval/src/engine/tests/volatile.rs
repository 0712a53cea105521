use crate::engine::{Engine, EvalConfig};

use super::common::{at, engine, number, sheet};

#[test]
fn test_rand_draws_on_every_pass() {
    let mut engine = sheet(&[("A1", "=RAND()"), ("B1", "=A1*10")]);
    let first = number(&engine, "A1");

    let result = engine.recalculate();
    assert_eq!(result.computed_vertices, 2);
    let second = number(&engine, "A1");
    assert_ne!(first, second);
    assert!((number(&engine, "B1") - second * 10.0).abs() < 1e-12);
}

#[test]
fn test_volatility_ends_with_the_formula() {
    let mut engine = sheet(&[("A1", "=RAND()")]);
    engine.set_formula(at("A1"), "=1").unwrap();
    engine.recalculate();
    assert!(!engine.graph().vertex_at(at("A1")).unwrap().is_volatile());

    let result = engine.recalculate();
    assert_eq!(result.computed_vertices, 0);
}

#[test]
fn test_seeded_engines_agree() {
    let config = EvalConfig::default().with_rng_seed(99);
    let mut a = Engine::new(config.clone());
    let mut b = Engine::new(config);
    for engine in [&mut a, &mut b] {
        engine.set_formula(at("A1"), "=RANDBETWEEN(1, 1000)").unwrap();
        engine.recalculate();
        engine.recalculate();
    }
    assert_eq!(number(&a, "A1"), number(&b, "A1"));

    let mut other = engine();
    other.set_formula(at("A1"), "=RAND()").unwrap();
    other.recalculate();
    assert!((0.0..1.0).contains(&number(&other, "A1")));
}
