//! Fixed-capacity job table: state machine and id allocator.
//!
//! Every mutation here must happen with the child-status signal blocked
//! by the caller (see [`crate::signals::SigchldBlockGuard`]) — the table
//! is also written from the `SIGCHLD` handler itself.

/// Upper bound on concurrently tracked pipelines.
pub const MAX_JOBS: usize = 10;

/// Upper bound on stages within a single pipeline.
pub const MAX_STAGES: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Running,
    Stopped,
    Done,
}

#[derive(Debug, Clone)]
pub struct Job {
    /// User-visible id, or 0 for a hidden foreground job.
    pub id: usize,
    /// Process-group id; 0 marks a free slot.
    pub pgid: i32,
    pub pids: [i32; MAX_STAGES],
    pub stage_count: usize,
    pub done_count: usize,
    pub state: JobState,
    pub background: bool,
    pub command_text: String,
}

impl Job {
    fn empty() -> Job {
        Job {
            id: 0,
            pgid: 0,
            pids: [0; MAX_STAGES],
            stage_count: 0,
            done_count: 0,
            state: JobState::Running,
            background: false,
            command_text: String::new(),
        }
    }
}

/// A reference to a job, as accepted by `fg`/`bg`/`stop`.
#[derive(Debug, Clone, Copy)]
pub enum JobRef {
    /// No argument: the current job (largest live id).
    Current,
    /// `%N` form.
    Id(usize),
    /// A bare pgid, as printed in `[id] pgid` notifications.
    Pgid(i32),
}

pub struct JobTable {
    slots: [Job; MAX_JOBS],
    next_id: usize,
}

impl Default for JobTable {
    fn default() -> Self {
        JobTable {
            slots: std::array::from_fn(|_| Job::empty()),
            next_id: 1,
        }
    }
}

impl JobTable {
    pub fn new() -> JobTable {
        JobTable::default()
    }

    /// Register a new job. Returns the assigned id (0 if hidden), or
    /// `None` if the table is full.
    pub fn add(
        &mut self,
        pgid: i32,
        pids: &[i32],
        stage_count: usize,
        state: JobState,
        background: bool,
        command_text: String,
    ) -> Option<usize> {
        let slot = self.slots.iter_mut().find(|job| job.pgid == 0)?;

        let id = if background {
            let id = self.next_id;
            self.next_id += 1;
            id
        } else {
            0
        };

        let mut pid_array = [0i32; MAX_STAGES];
        for (dst, src) in pid_array.iter_mut().zip(pids) {
            *dst = *src;
        }

        *slot = Job {
            id,
            pgid,
            pids: pid_array,
            stage_count,
            done_count: 0,
            state,
            background,
            command_text,
        };

        Some(id)
    }

    pub fn remove(&mut self, pgid: i32) {
        if let Some(slot) = self.slots.iter_mut().find(|job| job.pgid == pgid) {
            *slot = Job::empty();
        }
    }

    pub fn find_by_pgid(&mut self, pgid: i32) -> Option<&mut Job> {
        self.slots.iter_mut().find(|job| job.pgid == pgid)
    }

    pub fn find_by_id(&mut self, id: usize) -> Option<&mut Job> {
        self.slots
            .iter_mut()
            .find(|job| job.pgid != 0 && job.id == id)
    }

    /// The unique job holding the terminal: live, not backgrounded, running.
    pub fn foreground(&mut self) -> Option<&mut Job> {
        self.slots
            .iter_mut()
            .find(|job| job.pgid != 0 && !job.background && job.state == JobState::Running)
    }

    /// Assign the next allocator id to a hidden job that just stopped.
    /// Idempotent: a job already visible keeps its id.
    pub fn assign_id(&mut self, pgid: i32) -> Option<usize> {
        let next = self.next_id;
        let slot = self.slots.iter_mut().find(|job| job.pgid == pgid)?;
        if slot.id != 0 {
            return Some(slot.id);
        }
        slot.id = next;
        self.next_id += 1;
        Some(next)
    }

    pub fn resolve(&mut self, reference: JobRef) -> Option<&mut Job> {
        match reference {
            JobRef::Current => self
                .slots
                .iter_mut()
                .filter(|job| job.pgid != 0)
                .max_by_key(|job| job.id),
            JobRef::Id(id) => self.find_by_id(id),
            JobRef::Pgid(pgid) => self.find_by_pgid(pgid),
        }
    }

    /// Jobs with `id > 0`, in id order, for `jobs` listing.
    pub fn listed(&self) -> Vec<&Job> {
        let mut jobs: Vec<&Job> = self
            .slots
            .iter()
            .filter(|job| job.pgid != 0 && job.id > 0)
            .collect();
        jobs.sort_by_key(|job| job.id);
        jobs
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Job> {
        self.slots.iter_mut().filter(|job| job.pgid != 0)
    }

    pub fn is_full(&self) -> bool {
        self.slots.iter().all(|job| job.pgid != 0)
    }
}

/// Parse a `jobs`/`fg`/`bg`/`stop` argument into a [`JobRef`].
///
/// A missing argument is [`JobRef::Current`]. `%N` is [`JobRef::Id`]. Any
/// other numeric string is treated as a raw pgid.
pub fn parse_job_ref(arg: Option<&str>) -> JobRef {
    let Some(s) = arg else {
        return JobRef::Current;
    };
    if let Some(rest) = s.strip_prefix('%') {
        if let Ok(id) = rest.parse::<usize>() {
            return JobRef::Id(id);
        }
    }
    if let Ok(pgid) = s.parse::<i32>() {
        return JobRef::Pgid(pgid);
    }
    JobRef::Id(0)
}
