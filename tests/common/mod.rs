#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use gemm_opt::{
    backend::{Backend, BackendError, ResultLocation, Ticket},
    cancel::CancelToken,
    config::Config,
    context::Context,
    problem::Problem,
    report::{header, Record, Reporter},
};

pub fn config(m: usize, n: usize, k: usize) -> Config {
    Config {
        m,
        n,
        k,
        step: 2,
        ..Config::default()
    }
}

pub fn assert_floats_eq(lhs: &[f32], rhs: &[f32], tolerance: f32) {
    assert_eq!(lhs.len(), rhs.len());
    for (i, (x, y)) in lhs.iter().zip(rhs).enumerate() {
        assert!((x - y).abs() <= tolerance, "element {i}: {x} != {y}");
    }
}

/// Keeps everything it is given.
#[derive(Debug, Default)]
pub struct Collector {
    pub header: Option<String>,
    pub records: Vec<Record>,
    pub cancel_after: Option<(usize, CancelToken)>,
}

impl Collector {
    pub fn problems(&self) -> Vec<Problem> {
        self.records.iter().map(|record| record.problem).collect()
    }
}

impl Reporter for Collector {
    fn begin(&mut self, config: &Config) {
        self.header = Some(header(config));
    }

    fn report(&mut self, record: &Record) {
        self.records.push(*record);
        if let Some((count, token)) = &self.cancel_after {
            if self.records.len() >= *count {
                token.cancel();
            }
        }
    }
}

/// A host backend that writes nothing and fails every submission for problems with `k == fail_k`.
#[derive(Debug)]
pub struct Faulty {
    pub fail_k: usize,
    pub submissions: usize,
    pub released: Arc<AtomicBool>,
    result: Vec<f32>,
}

impl Faulty {
    pub const CODE: i32 = 42;

    pub fn new(fail_k: usize, released: Arc<AtomicBool>) -> Self {
        Self {
            fail_k,
            submissions: 0,
            released,
            result: Vec::new(),
        }
    }
}

impl Backend for Faulty {
    fn initialize(_ctx: &Context) -> Result<Self, BackendError> {
        Ok(Self::new(0, Arc::default()))
    }

    fn name(&self) -> &'static str {
        "faulty"
    }

    fn result_location(&self) -> ResultLocation {
        ResultLocation::Host
    }

    fn bind(&mut self, ctx: &Context) -> Result<(), BackendError> {
        self.result = ctx.host().result.clone();
        Ok(())
    }

    fn submit(&mut self, _ctx: &Context, problem: Problem) -> Result<Ticket, BackendError> {
        self.submissions += 1;
        if problem.k == self.fail_k {
            return Err(BackendError::submission(
                "faulty",
                Self::CODE,
                format!("rejected {problem}"),
            ));
        }
        Ok(Ticket::Completed)
    }

    fn wait(&mut self, _ctx: &Context, _ticket: Ticket) -> Result<(), BackendError> {
        Ok(())
    }

    fn synchronize(&mut self, _ctx: &Context) -> Result<(), BackendError> {
        Ok(())
    }

    fn host_result(&self) -> Option<&[f32]> {
        Some(&self.result)
    }
}

impl Drop for Faulty {
    fn drop(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

/// A backend whose context can never be created.
#[derive(Debug)]
pub struct Refusing;

impl Refusing {
    pub const CODE: i32 = -2;
}

impl Backend for Refusing {
    fn initialize(_ctx: &Context) -> Result<Self, BackendError> {
        Err(BackendError::initialization(
            "refusing",
            Self::CODE,
            "no device available",
        ))
    }

    fn name(&self) -> &'static str {
        "refusing"
    }

    fn result_location(&self) -> ResultLocation {
        ResultLocation::Host
    }

    fn bind(&mut self, _ctx: &Context) -> Result<(), BackendError> {
        Ok(())
    }

    fn submit(&mut self, _ctx: &Context, _problem: Problem) -> Result<Ticket, BackendError> {
        Ok(Ticket::Completed)
    }

    fn wait(&mut self, _ctx: &Context, _ticket: Ticket) -> Result<(), BackendError> {
        Ok(())
    }

    fn synchronize(&mut self, _ctx: &Context) -> Result<(), BackendError> {
        Ok(())
    }
}
