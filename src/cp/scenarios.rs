//! End-to-end models solved with the bundled engine.

use super::{Constraint, Domain, IntVar, LinearExpr, Literal, Model, SolveOptions};
use crate::engine::ReferenceEngine;
use crate::error::CpError;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn literals(model: &mut Model, n: usize) -> Vec<Literal> {
    (0..n).map(|i| model.new_literal(&format!("l{i}"))).collect()
}

fn count_solutions(n: usize, constraint: impl FnOnce(&[Literal]) -> Constraint) -> usize {
    let mut model = Model::new("count");
    let lits = literals(&mut model, n);
    model.add_constraint(constraint(&lits));
    model.solve_all().unwrap().len()
}

/// x, y in [0, 100]; x + 2y <= 14; 3x - y >= 0; x - y <= 2; maximize 3x + 4y.
fn small_lp(model: &mut Model) -> (IntVar, IntVar) {
    let x = model.new_int_var(0, 100, "x");
    let y = model.new_int_var(0, 100, "y");
    model.add_constraints([
        Constraint::linear(
            &LinearExpr::new([&x, &y], &[1, 2], 0),
            Domain::new(i64::MIN, 14, &[]),
        ),
        Constraint::linear(
            &LinearExpr::new([&x, &y], &[3, -1], 0),
            Domain::new(0, i64::MAX, &[]),
        ),
        Constraint::linear(&LinearExpr::new([&x, &y], &[1, -1], 0), Domain::new(0, 2, &[])),
    ]);
    model.maximize(&LinearExpr::new([&x, &y], &[3, 4], 0));
    (x, y)
}

#[test]
fn test_all_different() {
    let mut model = Model::new("all-different");
    let vars: Vec<IntVar> = (0..3)
        .map(|i| model.new_int_var(1, 3, &format!("x{i}")))
        .collect();
    model.add_constraint(Constraint::all_different(&vars));

    let solution = model.solve().unwrap();
    assert!(solution.optimal());
    let values: HashSet<i64> = vars.iter().map(|v| solution.value(v)).collect();
    assert_eq!(values.len(), 3);
    assert_eq!(model.solve_all().unwrap().len(), 6);
}

#[test]
fn test_constant_keeps_its_value() {
    let mut model = Model::new("constant");
    let c = model.new_constant(42, "c");
    let solution = model.solve().unwrap();
    assert_eq!(solution.value(&c), 42);
}

#[test]
fn test_allowed_and_forbidden_assignments() {
    let mut model = Model::new("table");
    let x = model.new_int_var(0, 3, "x");
    let y = model.new_int_var(0, 3, "y");
    model.add_constraint(Constraint::allowed_assignments([&x, &y], &[[1, 2], [3, 0]]));
    let pairs: HashSet<(i64, i64)> = model
        .solve_all()
        .unwrap()
        .iter()
        .map(|s| (s.value(&x), s.value(&y)))
        .collect();
    assert_eq!(pairs, HashSet::from([(1, 2), (3, 0)]));

    let mut model = Model::new("forbidden");
    let x = model.new_int_var(0, 3, "x");
    let y = model.new_int_var(0, 3, "y");
    model.add_constraint(Constraint::forbidden_assignments([&x, &y], &[[0, 0], [1, 1]]));
    let solutions = model.solve_all().unwrap();
    assert_eq!(solutions.len(), 14);
    assert!(solutions
        .iter()
        .all(|s| !(s.value(&x) == s.value(&y) && s.value(&x) < 2)));
}

#[test]
fn test_conflicting_assignments_are_infeasible() {
    let mut model = Model::new("conflict");
    let x = model.new_int_var(0, 3, "x");
    let y = model.new_int_var(0, 3, "y");
    model.add_constraints([
        Constraint::allowed_assignments([&x, &y], &[[1, 2]]),
        Constraint::forbidden_assignments([&x, &y], &[[1, 2]]),
    ]);
    let solution = model.solve().unwrap();
    assert!(solution.infeasible());
    assert!(!solution.is_solution_found());
    assert!(matches!(solution.try_value(&x), Err(CpError::NoSolution(_))));
}

#[test]
fn test_literal_assignments() {
    let mut model = Model::new("literal-table");
    let lits = literals(&mut model, 2);
    model.add_constraint(Constraint::allowed_literal_assignments(
        [lits[0].not(), lits[1].clone()],
        &[[true, true]],
    ));
    let solution = model.solve().unwrap();
    assert!(!solution.boolean_value(&lits[0]));
    assert!(solution.boolean_value(&lits[1]));
}

#[test]
fn test_boolean_connectives() {
    let mut model = Model::new("and");
    let lits = literals(&mut model, 2);
    model.add_constraint(Constraint::boolean_and(&lits));
    let solution = model.solve().unwrap();
    assert!(lits.iter().all(|l| solution.boolean_value(l)));

    assert_eq!(count_solutions(3, |l| Constraint::boolean_or(l)), 7);
    assert_eq!(count_solutions(3, |l| Constraint::boolean_xor(l)), 4);
    assert_eq!(count_solutions(3, |l| Constraint::implication(&l[0], &l[1])), 6);
}

#[test]
fn test_negated_literals() {
    let mut model = Model::new("excluded-middle");
    let a = model.new_literal("a");
    model.add_constraint(Constraint::boolean_or([a.clone(), a.not()]));
    let solution = model.solve().unwrap();
    assert!(solution.optimal());
    assert_ne!(solution.boolean_value(&a), solution.boolean_value(&a.not()));

    let mut model = Model::new("contradiction");
    let a = model.new_literal("a");
    model.add_constraint(Constraint::boolean_and([a.clone(), a.not()]));
    assert!(model.solve().unwrap().infeasible());
}

#[test]
fn test_linear_optimization() {
    let mut model = Model::new("lp");
    let (x, y) = small_lp(&mut model);
    let solution = model.solve().unwrap();
    assert!(solution.optimal());
    assert_eq!(solution.value(&x), 6);
    assert_eq!(solution.value(&y), 4);
    assert_eq!(solution.objective_value(), 34.0);
}

#[test]
fn test_minimize_with_offset() {
    let mut model = Model::new("min");
    let x = model.new_int_var(-3, 5, "x");
    let y = model.new_int_var(-3, 5, "y");
    model.add_constraint(Constraint::linear(
        &LinearExpr::sum([&x, &y]),
        Domain::new(2, i64::MAX, &[]),
    ));
    let cost = LinearExpr::new([&x, &y], &[2, 1], 10);
    model.minimize(&cost);
    let solution = model.solve().unwrap();
    assert!(solution.optimal());
    assert_eq!((solution.value(&x), solution.value(&y)), (-3, 5));
    assert_eq!(solution.objective_value(), 9.0);
    assert_eq!(solution.evaluate(&cost).unwrap(), 9);
}

#[test]
fn test_element() {
    let mut model = Model::new("element");
    let table: Vec<IntVar> = (0..5)
        .map(|i| model.new_constant(i * 10, &format!("c{i}")))
        .collect();
    let index = model.new_int_var(0, 4, "index");
    let target = model.new_int_var(0, 100, "target");
    model.add_constraints([
        Constraint::element(&target, &index, &table),
        Constraint::linear(&LinearExpr::from_var(&index), Domain::from_value(3)),
    ]);
    let solution = model.solve().unwrap();
    assert_eq!(solution.value(&target), 30);

    let mut model = Model::new("element-enumerated");
    let table: Vec<IntVar> = (0..5)
        .map(|i| model.new_constant(i * 10, &format!("c{i}")))
        .collect();
    let index = model.new_int_var(-2, 8, "index");
    let target = model.new_int_var(0, 100, "target");
    model.add_constraint(Constraint::element(&target, &index, &table));
    let solutions = model.solve_all().unwrap();
    assert_eq!(solutions.len(), 5);
    assert!(solutions
        .iter()
        .all(|s| s.value(&target) == 10 * s.value(&index)));
}

#[test]
fn test_arithmetic_relations() {
    let mut model = Model::new("arithmetic");
    let a = model.new_int_var(0, 9, "a");
    let b = model.new_constant(4, "b");
    let q = model.new_int_var(0, 9, "q");
    let r = model.new_int_var(0, 9, "r");
    let p = model.new_int_var(0, 50, "p");
    let m = model.new_int_var(0, 9, "m");
    model.add_constraints([
        Constraint::division(&q, &a, &b),
        Constraint::modulo(&r, &a, &b),
        Constraint::product(&p, [&a, &b]),
        Constraint::maximum(&m, [&q, &r]),
        Constraint::linear(&LinearExpr::from_var(&a), Domain::from_value(7)),
    ]);
    let solution = model.solve().unwrap();
    assert_eq!(solution.value(&q), 1);
    assert_eq!(solution.value(&r), 3);
    assert_eq!(solution.value(&p), 28);
    assert_eq!(solution.value(&m), 3);
}

#[test]
fn test_linear_maximum() {
    let mut model = Model::new("lin-max");
    let x = model.new_int_var(0, 5, "x");
    let y = model.new_int_var(0, 5, "y");
    let t = model.new_int_var(0, 20, "t");
    model.add_constraint(Constraint::linear_maximum(
        &LinearExpr::from_var(&t),
        [
            LinearExpr::new([&x], &[2], 1),
            LinearExpr::new([&y], &[3], 0),
        ],
    ));
    model.minimize(&LinearExpr::from_var(&t));
    let solution = model.solve().unwrap();
    assert_eq!(solution.value(&t), 1);
    assert_eq!((solution.value(&x), solution.value(&y)), (0, 0));
}

#[test]
fn test_enumerates_every_value() {
    let mut model = Model::new("enumerate");
    let x = model.new_int_var(1, 3, "x");
    let mut values: Vec<i64> = model
        .solve_all()
        .unwrap()
        .iter()
        .map(|s| s.value(&x))
        .collect();
    values.sort_unstable();
    assert_eq!(values, vec![1, 2, 3]);
}

#[test]
fn test_all_same() {
    let mut model = Model::new("all-same");
    let x = model.new_int_var(0, 5, "x");
    let y = model.new_int_var(2, 4, "y");
    let z = model.new_int_var(3, 9, "z");
    model.add_constraint(Constraint::all_same([&x, &y, &z]));
    let solutions = model.solve_all().unwrap();
    assert_eq!(solutions.len(), 2);
    for s in &solutions {
        assert_eq!(s.value(&x), s.value(&y));
        assert_eq!(s.value(&y), s.value(&z));
    }
}

#[test]
fn test_exactly_two_of_four() {
    let mut model = Model::new("exactly-k");
    let lits = literals(&mut model, 4);
    model.add_constraint(Constraint::exactly_k(2, &lits));
    let solutions = model.solve_all().unwrap();
    assert_eq!(solutions.len(), 6);
    assert!(solutions
        .iter()
        .all(|s| lits.iter().filter(|l| s.boolean_value(l)).count() == 2));
}

/// Assignments of `n` literals with exactly `k` of them true.
fn choose(n: usize, k: usize) -> usize {
    (0..k).fold(1, |acc, i| acc * (n - i) / (i + 1))
}

#[test]
fn test_cardinality_counts() {
    for n in 1..=4 {
        let all = 1 << n;
        assert_eq!(count_solutions(n, |l| Constraint::boolean_or(l)), all - 1, "n={n}");
        for k in 0..=n {
            let exactly = choose(n, k);
            let at_most: usize = (0..=k).map(|j| choose(n, j)).sum();
            let at_least: usize = (k..=n).map(|j| choose(n, j)).sum();
            assert_eq!(count_solutions(n, |l| Constraint::exactly_k(k, l)), exactly, "n={n} k={k}");
            assert_eq!(count_solutions(n, |l| Constraint::at_most_k(k, l)), at_most, "n={n} k={k}");
            assert_eq!(
                count_solutions(n, |l| Constraint::at_least_k(k, l)),
                at_least,
                "n={n} k={k}"
            );
            // at least k false is at most n - k true, which matches by symmetry
            assert_eq!(
                count_solutions(n, |l| Constraint::at_least_k(k, l.iter().map(Literal::not))),
                at_least,
                "n={n} k={k}"
            );
        }
    }
}

#[test]
fn test_non_overlapping_with_optional_interval() {
    let mut model = Model::new("no-overlap");
    let size = model.new_constant(3, "size");
    let task = |model: &mut Model, name: &str| {
        let start = model.new_int_var(0, 3, &format!("{name}.start"));
        let end = model.new_int_var(0, 6, &format!("{name}.end"));
        (start, end)
    };
    let (s1, e1) = task(&mut model, "a");
    let (s2, e2) = task(&mut model, "b");
    let (s3, e3) = task(&mut model, "c");
    let present = model.new_literal("c.present");
    let wants_c = model.new_literal("wants-c");

    let a = model.new_interval(&s1, &e1, &size, "a");
    let b = model.new_interval(&s2, &e2, &size, "b");
    let c = model.new_optional_interval(&s3, &e3, &size, &present, "c");
    model.add_constraints([
        Constraint::non_overlapping([&a, &b, &c]),
        Constraint::boolean_or([&present]).only_enforce_if([&wants_c]),
    ]);

    let solutions = model.solve_all().unwrap();
    assert!(!solutions.is_empty());
    for s in &solutions {
        assert!(!s.boolean_value(&present));
        assert!(!s.boolean_value(&wants_c));
        assert!((s.value(&s1) - s.value(&s2)).abs() >= 3);
        assert_eq!(s.value(&e1), s.value(&s1) + 3);
    }
}

#[test]
fn test_non_overlapping_2d_zero_area() {
    let build = |exempt: bool| {
        let mut model = Model::new("boxes");
        let zero = model.new_constant(0, "zero");
        let two = model.new_constant(2, "two");
        let x = model.new_interval(&zero, &two, &two, "x");
        let y = model.new_interval(&zero, &two, &two, "y");
        let flat_x = model.new_interval(&zero, &two, &two, "flat.x");
        let one = model.new_constant(1, "one");
        let flat_y = model.new_interval(&one, &one, &zero, "flat.y");
        model.add_constraint(Constraint::non_overlapping_2d(
            [&x, &flat_x],
            [&y, &flat_y],
            exempt,
        ));
        model.solve().unwrap()
    };
    assert!(build(true).optimal());
    assert!(build(false).infeasible());
}

#[test]
fn test_cumulative_ignores_zero_size() {
    let build = |second_size: i64| {
        let mut model = Model::new("cumulative");
        let capacity = model.new_constant(1, "capacity");
        let demand = model.new_constant(1, "demand");
        let start = model.new_constant(0, "start");
        let two = model.new_constant(2, "two");
        let size = model.new_constant(second_size, "size");
        let end = model.new_int_var(0, 2, "end");
        let first = model.new_interval(&start, &two, &two, "first");
        let second = model.new_interval(&start, &end, &size, "second");
        model.add_constraint(Constraint::cumulative(
            &capacity,
            [&first, &second],
            [&demand, &demand],
        ));
        model.solve().unwrap()
    };
    assert!(build(0).optimal());
    assert!(build(1).infeasible());
}

#[test]
fn test_solver_options() {
    let mut model = Model::new("options");
    let (x, _) = small_lp(&mut model);
    let buffer = Arc::new(Mutex::new(Vec::<u8>::new()));
    let options = SolveOptions::new()
        .with_logger(Arc::clone(&buffer), "[cp] ")
        .with_parallelism(4)
        .with_timeout(Duration::from_secs(1));

    let solution = model.solve_with(&options).unwrap();
    assert!(solution.optimal());
    assert_eq!(solution.value(&x), 6);
    assert_eq!(solution.objective_value(), 34.0);

    let log = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
    assert!(log.starts_with("[cp] Starting reference search"), "{log}");
    assert!(log.lines().all(|l| l.starts_with("[cp] ")));
    assert!(log.contains("#Done status=OPTIMAL"), "{log}");
}

#[test]
fn test_enumeration_rejects_parallelism() {
    let mut model = Model::new("bad-options");
    model.new_int_var(0, 3, "x");
    let options = SolveOptions::new()
        .with_parallelism(2)
        .with_enumeration(|_| {});
    assert!(matches!(model.solve_with(&options), Err(CpError::Config(_))));
}

#[test]
fn test_sessions_are_released() {
    let engine = Arc::new(ReferenceEngine::new());
    let mut model = Model::with_engine("release", engine.clone());
    let x = model.new_int_var(0, 9, "x");
    model.solve().unwrap();
    assert_eq!(engine.live_sessions(), 0);
    assert_eq!(model.solve_all().unwrap().len(), 10);
    assert_eq!(engine.live_sessions(), 0);

    let options = SolveOptions::new().with_enumeration(move |s| {
        if s.value(&x) == 4 {
            panic!("handler failure");
        }
    });
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| model.solve_with(&options)));
    assert!(outcome.is_err());
    assert_eq!(engine.live_sessions(), 0);
}

#[test]
fn test_invalid_model_status() {
    let mut model = Model::new("invalid");
    model.new_int_var(i64::MIN, 0, "x");
    assert!(matches!(model.validate(), Err(CpError::InvalidModel(_))));
    assert!(model.solve().unwrap().invalid());
    assert!(matches!(model.solve_all(), Err(CpError::InvalidModel(_))));
}

#[test]
fn test_results_are_bound_to_their_model() {
    let mut model = Model::new("a");
    let x = model.new_int_var(0, 1, "x");
    let solution = model.solve().unwrap();

    let late = model.new_int_var(0, 1, "late");
    assert!(matches!(solution.try_value(&late), Err(CpError::ForeignHandle(_))));

    let mut other = Model::new("b");
    let foreign = other.new_int_var(0, 1, "x");
    assert!(matches!(solution.try_value(&foreign), Err(CpError::ForeignHandle(_))));
    assert!(solution.try_value(&x).is_ok());
}

#[test]
fn test_model_accepts_additions_after_solving() {
    let mut model = Model::new("grow");
    let x = model.new_int_var(0, 5, "x");
    model.maximize(&LinearExpr::from_var(&x));
    assert_eq!(model.solve().unwrap().value(&x), 5);

    model.add_constraint(Constraint::linear(
        &LinearExpr::from_var(&x),
        Domain::new(0, 3, &[]),
    ));
    let solution = model.solve().unwrap();
    assert_eq!(solution.value(&x), 3);
    assert_eq!(solution.objective_value(), 3.0);
}
