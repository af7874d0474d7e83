//! Integration tests for step rules driven through gradient descent.
//!
//! Exercises the public API end to end: building costs over shared
//! variables, composing rules, and committing steps batch by batch.

use approx::assert_relative_eq;
use pasos::algorithms::{
    AdaDelta, Adam, BasicMomentum, BasicRMSProp, CompositeRule, GradientDescent, Momentum,
    RMSProp, RemoveNotFinite, Restrict, Scale, StepClipping, StepMap, StepRule,
    TrainingAlgorithm,
};
use pasos::graph::{grad, Batch, Expr, Function, SharedVariable};
use pasos::roles::{add_role, has_roles, roles, ALGORITHM_BUFFER, BIASES, PARAMETER, WEIGHTS};
use pasos::Error;

fn quadratic(values: &[f32]) -> (SharedVariable, StepMap) {
    let a = SharedVariable::from_vec(values.to_vec(), "a");
    let cost = a.expr().square().sum();
    let gradient = grad(&cost, &[a.clone()]).unwrap().remove(0);
    let gradients = [(a.clone(), gradient)].into_iter().collect();
    (a, gradients)
}

fn step_function(rule: &mut dyn StepRule, values: &[f32]) -> (SharedVariable, Function) {
    let (a, gradients) = quadratic(values);
    let (steps, updates) = rule.compute_steps(&gradients).unwrap();
    let function = Function::compile(vec![steps[&a].clone()], updates).unwrap();
    (a, function)
}

fn run(function: &Function) -> Vec<f32> {
    function.call(&Batch::new()).unwrap()[0]
        .iter()
        .copied()
        .collect()
}

fn assert_all_close(actual: &[f32], expected: &[f32]) {
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(expected) {
        assert_relative_eq!(*a, *e, max_relative = 1e-4);
    }
}

#[test]
fn test_basic_momentum_reference_sequence() {
    let mut rule = BasicMomentum::new(0.5).unwrap();
    let (_, f) = step_function(&mut rule, &[3.0, 4.0]);

    assert_all_close(&run(&f), &[6.0, 8.0]);
    assert_all_close(&run(&f), &[9.0, 12.0]);
    assert_all_close(&run(&f), &[10.5, 14.0]);
}

#[test]
fn test_momentum_reference_sequence() {
    let mut rule = Momentum::new(0.1, 0.5).unwrap();
    let (_, f) = step_function(&mut rule, &[3.0, 4.0]);

    assert_all_close(&run(&f), &[0.6, 0.8]);
    assert_all_close(&run(&f), &[0.9, 1.2]);
    assert_all_close(&run(&f), &[1.05, 1.4]);
}

#[test]
fn test_rmsprop_follows_parameter_changes() {
    let mut basic = BasicRMSProp::new(0.5, 1e5).unwrap();
    let mut scaled = RMSProp::new(0.1, 0.5, 1e5).unwrap();
    let (a, f) = step_function(&mut basic, &[3.0, 4.0]);
    let (b, g) = step_function(&mut scaled, &[3.0, 4.0]);

    let expected = [
        [1.414_213_6, 1.414_213_6],
        [0.970_142_5, 1.028_991_5],
        [0.617_213_4, 0.646_996_6],
    ];
    let next = [[2.0, 3.0], [1.0, 1.5]];

    for (i, row) in expected.iter().enumerate() {
        assert_all_close(&run(&f), row);
        let tenth: Vec<f32> = row.iter().map(|x| x * 0.1).collect();
        assert_all_close(&run(&g), &tenth);
        if let Some(values) = next.get(i) {
            a.set_value(ndarray::arr1(values).into_dyn());
            b.set_value(ndarray::arr1(values).into_dyn());
        }
    }
}

#[test]
fn test_adadelta_and_adam_sequences() {
    let mut adadelta = AdaDelta::new(0.5, 1e-7).unwrap();
    let (_, f) = step_function(&mut adadelta, &[3.0]);
    for expected in [0.000_447_21, 0.000_516_4, 0.000_569_04] {
        assert_all_close(&run(&f), &[expected]);
    }

    let mut adam = Adam::default();
    let (_, f) = step_function(&mut adam, &[3.0, 4.0]);
    for expected in [0.002, 0.010_526_21, 0.007_380_05] {
        assert_all_close(&run(&f), &[expected, expected]);
    }
}

#[test]
fn test_remove_not_finite_replaces_bad_gradients() {
    let p1 = SharedVariable::scalar(1.0, "p1");
    let p2 = SharedVariable::scalar(2.0, "p2");
    let gradients: StepMap = [
        (p1.clone(), Expr::scalar(f32::NAN)),
        (p2.clone(), Expr::scalar(f32::INFINITY)),
    ]
    .into_iter()
    .collect();

    let (steps, updates) = RemoveNotFinite::default()
        .compute_steps(&gradients)
        .unwrap();
    assert!(updates.is_empty());
    assert_relative_eq!(steps[&p1].eval().unwrap()[[]], 0.1, max_relative = 1e-6);
    assert_relative_eq!(steps[&p2].eval().unwrap()[[]], 0.2, max_relative = 1e-6);

    let (steps, _) = RemoveNotFinite::new(1.0).compute_steps(&gradients).unwrap();
    assert_relative_eq!(steps[&p1].eval().unwrap()[[]], 1.0);
    assert_relative_eq!(steps[&p2].eval().unwrap()[[]], 2.0);
}

#[test]
fn test_restricted_scale_over_six_parameters() {
    let params: Vec<_> = (0..6)
        .map(|i| SharedVariable::scalar(i as f32, format!("p{}", i)))
        .collect();
    let gradients: StepMap = params
        .iter()
        .map(|p| (p.clone(), p.expr().square()))
        .collect();

    let mut rule = Restrict::new(Scale::new(0.1), [params[1].clone(), params[4].clone()]);
    let (steps, _) = rule.compute_steps(&gradients).unwrap();

    let values: Vec<f32> = params
        .iter()
        .map(|p| steps[p].eval().unwrap()[[]])
        .collect();
    assert_all_close(&values, &[0.0, 0.1, 4.0, 9.0, 1.6, 25.0]);
}

#[test]
fn test_gradient_descent_halves_and_negates_weights() {
    let w = SharedVariable::new(
        ndarray::arr2(&[[1.0, 2.0], [3.0, 4.0]]).into_dyn(),
        "W",
    );
    add_role(&w, WEIGHTS);
    let cost = w.expr().square().sum();

    let mut algorithm = GradientDescent::builder()
        .cost(cost)
        .step_rule(Scale::new(0.75))
        .build()
        .unwrap();
    assert_eq!(algorithm.parameters(), &[w.clone()]);

    algorithm.initialize().unwrap();
    algorithm.process_batch(&Batch::new()).unwrap();

    let value: Vec<f32> = w.get_value().iter().copied().collect();
    assert_all_close(&value, &[-0.5, -1.0, -1.5, -2.0]);
}

#[test]
fn test_state_buffers_are_tagged() {
    let w = SharedVariable::from_vec(vec![1.0, 2.0], "W");
    let b = SharedVariable::from_vec(vec![0.5], "b");
    add_role(&w, WEIGHTS);
    add_role(&b, BIASES);
    let cost = w.expr().square().sum() + b.expr().square().sum();

    let mut algorithm = GradientDescent::builder()
        .cost(cost)
        .step_rule(Adam::default())
        .build()
        .unwrap();
    algorithm.initialize().unwrap();

    let parameters = algorithm.parameters();
    assert_eq!(parameters.len(), 2);
    assert!(parameters
        .iter()
        .all(|p| has_roles(p, &[PARAMETER], false)));
    assert_eq!(roles(&b), vec![BIASES]);
    assert!(!has_roles(&b, &[ALGORITHM_BUFFER], false));
}

#[test]
fn test_full_pipeline_with_guard_clip_and_adaptive_rule() {
    let w = SharedVariable::from_vec(vec![4.0, -3.0], "W");
    let b = SharedVariable::scalar(2.0, "b");
    let cost = w.expr().square().sum() + b.expr().square();

    let rule = CompositeRule::default()
        .with(RemoveNotFinite::default())
        .with(StepClipping::new(Some(2.0)).unwrap())
        .with(Restrict::new(Momentum::new(0.1, 0.5).unwrap(), [w.clone()]))
        .with(Restrict::new(Scale::new(0.2), [b.clone()]));

    let mut algorithm = GradientDescent::builder()
        .cost(cost)
        .parameters([w.clone(), b.clone()])
        .step_rule(rule)
        .build()
        .unwrap();
    algorithm.initialize().unwrap();

    for _ in 0..300 {
        algorithm.process_batch(&Batch::new()).unwrap();
    }

    assert!(w.get_value().iter().all(|x| x.abs() < 1e-3));
    assert!(b.get_value()[[]].abs() < 1e-3);
}

#[test]
fn test_errors_surface_through_public_api() {
    assert!(matches!(
        BasicMomentum::new(1.0),
        Err(Error::InvalidParameter(_))
    ));
    assert!(StepClipping::new(Some(0.0)).is_err());
    assert!(AdaDelta::new(-0.1, 1e-6).is_err());

    let w = SharedVariable::scalar(1.0, "W");
    let mut algorithm = GradientDescent::builder()
        .cost(w.expr().square())
        .parameters([w])
        .build()
        .unwrap();
    assert!(matches!(
        algorithm.process_batch(&Batch::new()),
        Err(Error::NotInitialized)
    ));
}
