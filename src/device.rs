//! An in-process compute device with an in-order command queue.
//!
//! The device owns its memory and executes commands on a dedicated worker thread, so the control
//! thread only blocks at explicit waits. Kernels use the rayon pool to spread work-groups across
//! the CPU cores.

use std::{
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, Ordering},
        mpsc, Arc, Condvar, Mutex, PoisonError,
    },
    thread,
};

use tracing::{debug, trace};

pub mod error;
pub mod memory;

use error::DeviceError;
use memory::{DeviceMemory, Matrix};

type Command = Box<dyn FnOnce(&mut DeviceMemory) -> Result<(), DeviceError> + Send>;

/// A command queued on the device, used to wait for its completion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Event(u64);

/// The global and optional local sizes of a kernel launch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NdRange {
    /// Total number of work items along each axis.
    pub global: [usize; 2],
    /// Work-group size along each axis, or `None` to let the device decide.
    pub local: Option<[usize; 2]>,
}

impl NdRange {
    /// A launch range without an explicit work-group size.
    #[must_use]
    pub fn global(global: [usize; 2]) -> Self {
        Self {
            global,
            local: None,
        }
    }

    /// A launch range with an explicit work-group size.
    #[must_use]
    pub fn tiled(global: [usize; 2], local: [usize; 2]) -> Self {
        Self {
            global,
            local: Some(local),
        }
    }

    fn validate(&self, work_group_size: usize) -> Result<(), DeviceError> {
        let Some(local) = self.local else {
            return Ok(());
        };
        let divides = self
            .global
            .iter()
            .zip(local)
            .all(|(&g, l)| l > 0 && g % l == 0);
        if !divides || local[0] * local[1] > work_group_size {
            return Err(DeviceError::InvalidWorkGroupSize {
                global: self.global,
                local,
            });
        }
        Ok(())
    }
}

/// Static properties of a device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Human-readable name.
    pub name: String,
    /// Number of threads executing work-groups.
    pub compute_units: usize,
    /// Preferred (and maximum) number of work items per work-group.
    pub work_group_size: usize,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} compute units, work-group size {}",
            self.name, self.compute_units, self.work_group_size
        )
    }
}

#[derive(Debug, Default)]
struct QueueState {
    completed: u64,
    failure: Option<DeviceError>,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<QueueState>,
    progress: Condvar,
}

/// A compute device: a command queue plus the memory its commands operate on.
#[derive(Debug)]
pub struct Device {
    info: DeviceInfo,
    sender: Option<mpsc::Sender<(u64, &'static str, Command)>>,
    shared: Arc<Shared>,
    submitted: AtomicU64,
    worker: Option<thread::JoinHandle<()>>,
}

impl Device {
    /// Start a device whose work-groups hold at most `work_group_size` items.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue worker can't be spawned.
    pub fn open(work_group_size: usize) -> Result<Self, DeviceError> {
        let info = DeviceInfo {
            name: format!("cpu ({})", std::env::consts::ARCH),
            compute_units: rayon::current_num_threads(),
            work_group_size,
        };
        let shared = Arc::new(Shared::default());
        let (sender, receiver) = mpsc::channel();
        let worker = thread::Builder::new()
            .name("device-queue".to_string())
            .spawn({
                let shared = Arc::clone(&shared);
                move || execute(&receiver, &shared)
            })
            .map_err(DeviceError::Unavailable)?;
        debug!(
            name = %info.name,
            compute_units = info.compute_units,
            work_group_size,
            "device opened"
        );
        Ok(Self {
            info,
            sender: Some(sender),
            shared,
            submitted: AtomicU64::new(0),
            worker: Some(worker),
        })
    }

    /// Properties of the device.
    #[must_use]
    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Queue a kernel over `range`. The kernel runs after every previously queued command.
    ///
    /// # Errors
    ///
    /// Returns an error if the range is invalid for this device or the queue was lost.
    pub fn enqueue<F>(
        &self,
        label: &'static str,
        range: NdRange,
        kernel: F,
    ) -> Result<Event, DeviceError>
    where
        F: FnOnce(&mut DeviceMemory) -> Result<(), DeviceError> + Send + 'static,
    {
        range.validate(self.info.work_group_size)?;
        self.push(label, Box::new(kernel))
    }

    /// Block until the command behind `event` completed.
    ///
    /// # Errors
    ///
    /// Returns the first failure of any command completed so far.
    pub fn wait(&self, event: Event) -> Result<(), DeviceError> {
        let shared = &*self.shared;
        let mut state = shared.state.lock().unwrap_or_else(PoisonError::into_inner);
        while state.completed < event.0 {
            if self.worker.as_ref().map_or(true, thread::JoinHandle::is_finished) {
                return Err(DeviceError::Lost);
            }
            state = shared
                .progress
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        match state.failure.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Block until every queued command completed.
    ///
    /// # Errors
    ///
    /// Returns the first failure of any command completed so far.
    pub fn wait_all(&self) -> Result<(), DeviceError> {
        self.wait(Event(self.submitted.load(Ordering::Acquire)))
    }

    /// Copy `data` into the buffer backing `matrix`, blocking until the copy is done.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue was lost, or a previously queued command failed.
    pub fn upload(&self, matrix: Matrix, data: &[f32]) -> Result<(), DeviceError> {
        let data = data.to_vec();
        let command: Command = Box::new(move |memory: &mut DeviceMemory| {
            memory.write(matrix, data);
            Ok(())
        });
        let event = self.push("upload", command)?;
        self.wait(event)
    }

    /// Copy the first `len` elements of the buffer backing `matrix` to the host, blocking until
    /// the copy is done.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is too small, the queue was lost, or a previously queued
    /// command failed.
    pub fn download(&self, matrix: Matrix, len: usize) -> Result<Vec<f32>, DeviceError> {
        let (sender, receiver) = mpsc::sync_channel(1);
        let command: Command = Box::new(move |memory: &mut DeviceMemory| {
            let data = memory.read(matrix, len)?;
            // The receiver outlives the command since `wait` blocks on it.
            let _ = sender.send(data);
            Ok(())
        });
        let event = self.push("download", command)?;
        self.wait(event)?;
        receiver.recv().map_err(|_| DeviceError::Lost)
    }

    fn push(&self, label: &'static str, command: Command) -> Result<Event, DeviceError> {
        let sender = self.sender.as_ref().ok_or(DeviceError::Lost)?;
        let id = self.submitted.fetch_add(1, Ordering::AcqRel) + 1;
        trace!(id, label, "command queued");
        sender
            .send((id, label, command))
            .map_err(|_| DeviceError::Lost)?;
        Ok(Event(id))
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain what is still queued before it exits.
        drop(self.sender.take());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        debug!(
            commands = self.submitted.load(Ordering::Acquire),
            "device closed"
        );
    }
}

fn execute(receiver: &mpsc::Receiver<(u64, &'static str, Command)>, shared: &Shared) {
    let mut memory = DeviceMemory::default();
    for (id, label, command) in receiver {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| command(&mut memory)))
            .unwrap_or(Err(DeviceError::CommandAborted(label)));
        let mut state = shared.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(err) = outcome {
            debug!(id, label, %err, "command failed");
            state.failure.get_or_insert(err);
        }
        state.completed = id;
        shared.progress.notify_all();
    }
}
