//! One human-readable line per problem size.

use std::{
    fmt,
    fs::{File, OpenOptions},
    io::{self, Write},
    path::Path,
};

use tracing::{debug, warn};

use crate::{config::Config, problem::Problem, protocol::Measurement};

/// The outcome of one problem of the sweep.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Record {
    /// The sub-problem that was measured.
    pub problem: Problem,
    /// The repetition count shared by both sides.
    pub repetitions: u64,
    /// Timing of the baseline kernel.
    pub baseline: Measurement,
    /// Timing of the candidate backend.
    pub candidate: Measurement,
    /// Sum of squared differences between both results, if verification is enabled.
    pub delta: Option<f64>,
}

impl Record {
    /// Baseline per-call time over candidate per-call time.
    #[must_use]
    pub fn speedup(&self) -> f64 {
        self.baseline.per_call_ms() / self.candidate.per_call_ms()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Problem { m, n, k } = self.problem;
        let ms = |measurement: &Measurement| measurement.elapsed().as_secs_f64() * 1e3;
        write!(
            f,
            "M={m} \tN={n} \tK={k} \ttimes={} \tTime={:.3}/{:.4}, {:.3}/{:.4}ms \tSpeedUp={:.3}",
            self.repetitions,
            ms(&self.baseline),
            self.baseline.per_call_ms(),
            ms(&self.candidate),
            self.candidate.per_call_ms(),
            self.speedup(),
        )?;
        if let Some(delta) = self.delta {
            write!(f, " \tdelta={delta}")?;
        }
        Ok(())
    }
}

/// Receives the results of a sweep. Reporting never fails the sweep.
pub trait Reporter {
    /// Called once before the first problem.
    fn begin(&mut self, config: &Config);

    /// Called once per completed problem.
    fn report(&mut self, record: &Record);
}

/// The line printed before the sweep, describing what is compared.
#[must_use]
pub fn header(config: &Config) -> String {
    let state = |enabled: bool| if enabled { "enabled" } else { "disabled" };
    format!(
        "Compared with {}, Verification {}, Parallel {}",
        config.backend,
        state(config.verify),
        state(config.parallel)
    )
}

/// Join command-line arguments into one line, quoting the ones that contain spaces.
#[must_use]
pub fn invocation<I, S>(args: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    args.into_iter()
        .map(|arg| {
            let arg = arg.as_ref();
            if arg.contains(' ') {
                format!("\"{arg}\"")
            } else {
                arg.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Writes report lines to a set of line sinks.
#[derive(Default)]
pub struct LogReporter {
    sinks: Vec<Box<dyn Write + Send>>,
}

impl fmt::Debug for LogReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogReporter")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl LogReporter {
    /// A reporter without sinks; records are only emitted as tracing events.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Also write to standard output.
    #[must_use]
    pub fn with_console(self) -> Self {
        self.with_sink(io::stdout())
    }

    /// Also append to the file at `path`, creating it if needed.
    ///
    /// The command line that started the benchmark is written first, so that every run in the
    /// file records how it was produced.
    ///
    /// # Errors
    ///
    /// Returns an error if the file can't be opened or the command line can't be written.
    pub fn with_file<I, S>(self, path: impl AsRef<Path>, args: I) -> io::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut file: File = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", invocation(args))?;
        Ok(self.with_sink(file))
    }

    /// Also write to `sink`.
    #[must_use]
    pub fn with_sink(mut self, sink: impl Write + Send + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    fn write_line(&mut self, line: &str) {
        for sink in &mut self.sinks {
            if let Err(err) = writeln!(sink, "{line}").and_then(|()| sink.flush()) {
                warn!(%err, "failed to write report line");
            }
        }
    }
}

impl Reporter for LogReporter {
    fn begin(&mut self, config: &Config) {
        self.write_line(&header(config));
    }

    fn report(&mut self, record: &Record) {
        let Problem { m, n, k } = record.problem;
        debug!(
            m,
            n,
            k,
            repetitions = record.repetitions,
            baseline_ms = record.baseline.per_call_ms(),
            candidate_ms = record.candidate.per_call_ms(),
            speedup = record.speedup(),
            delta = record.delta,
            "problem measured"
        );
        self.write_line(&record.to_string());
    }
}
