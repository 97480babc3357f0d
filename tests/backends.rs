mod common;

use common::{assert_floats_eq, config, Collector};
use gemm_opt::{
    backend::{Backend, GemmLibrary, HostBlas, ReferenceKernel, ResultLocation, TunedKernel},
    cancel::CancelToken,
    config::{BackendKind, Config},
    context::Context,
    problem::Problem,
    verify,
};

/// Column-major `alpha * A * B + beta * C` computed on the host copies.
fn expected(ctx: &Context, problem: Problem) -> Vec<f32> {
    let Problem { m, n, k } = problem;
    let (alpha, beta) = (ctx.config().alpha, ctx.config().beta);
    let host = ctx.host();
    let mut out = vec![0.0f32; m * n];
    for j in 0..n {
        for i in 0..m {
            let mut sum = 0.0f64;
            for p in 0..k {
                sum += f64::from(host.weight[i + p * m]) * f64::from(host.input[p + j * k]);
            }
            let previous = host.result[i + j * m];
            out[i + j * m] = alpha * sum as f32 + beta * previous;
        }
    }
    out
}

fn run_once<B: Backend>(ctx: &Context, problem: Problem) -> Vec<f32> {
    let mut backend = B::initialize(ctx).unwrap();
    backend.bind(ctx).unwrap();
    backend.prepare(ctx, problem).unwrap();
    let ticket = backend.submit(ctx, problem).unwrap();
    backend.wait(ctx, ticket).unwrap();
    backend.synchronize(ctx).unwrap();
    verify::capture(&backend, ctx, problem).unwrap().into_owned()
}

fn context(work_group_size: usize) -> Context {
    Context::new(Config {
        m: 80,
        n: 48,
        k: 72,
        alpha: 1.5,
        beta: 0.5,
        seed: 3,
        work_group_size,
        ..Config::default()
    })
    .unwrap()
}

#[test]
fn every_backend_matches_the_host_result() {
    for work_group_size in [256, 1024] {
        let ctx = context(work_group_size);
        for problem in [
            Problem::new(80, 48, 72),
            Problem::new(40, 48, 36),
            Problem::new(33, 17, 5),
        ] {
            let expected = expected(&ctx, problem);
            assert_floats_eq(&run_once::<ReferenceKernel>(&ctx, problem), &expected, 1e-4);
            assert_floats_eq(&run_once::<TunedKernel>(&ctx, problem), &expected, 1e-4);
            assert_floats_eq(&run_once::<GemmLibrary>(&ctx, problem), &expected, 1e-4);
            assert_floats_eq(&run_once::<HostBlas>(&ctx, problem), &expected, 1e-4);
        }
    }
}

#[test]
fn result_locations() {
    let ctx = context(256);
    assert_eq!(
        ReferenceKernel::initialize(&ctx).unwrap().result_location(),
        ResultLocation::Device
    );
    assert_eq!(
        GemmLibrary::initialize(&ctx).unwrap().result_location(),
        ResultLocation::Device
    );
    let host = HostBlas::initialize(&ctx).unwrap();
    assert_eq!(host.result_location(), ResultLocation::Host);
    assert!(host.host_result().is_some());
}

#[test]
fn oversized_problems_are_rejected() {
    let ctx = context(256);
    let problem = Problem::new(81, 48, 72);

    let mut library = GemmLibrary::initialize(&ctx).unwrap();
    let err = library.submit(&ctx, problem).unwrap_err();
    assert_eq!((err.provider(), err.code()), ("gemm", 1));

    let mut host = HostBlas::initialize(&ctx).unwrap();
    let err = host.submit(&ctx, Problem::new(80, 48, 73)).unwrap_err();
    assert_eq!((err.provider(), err.code()), ("matrixmultiply", 6));

    let mut reference = ReferenceKernel::initialize(&ctx).unwrap();
    reference.submit(&ctx, problem).unwrap();
    let err = reference.synchronize(&ctx).unwrap_err();
    assert_eq!((err.provider(), err.code()), ("reference", -61));
}

#[test]
fn every_candidate_agrees_with_the_baseline() {
    for backend in BackendKind::ALL {
        let config = Config {
            verify: true,
            backend,
            ..config(64, 64, 64)
        };
        let mut reporter = Collector::default();
        let summary = gemm_opt::run(config, &CancelToken::new(), &mut reporter).unwrap();
        assert_eq!(summary.problems, 8);
        for record in &reporter.records {
            let delta = record.delta.unwrap();
            assert!(delta < 1e-6, "{backend} at {}: delta {delta}", record.problem);
        }
    }
}
