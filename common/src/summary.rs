use crate::prepare::Job;

/// Totals over the jobs of one invocation.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct Summary {
    pub jobs_prepared: usize,
    pub jobs_failed: usize,
    pub bytes_planned: u64,
}

impl Summary {
    pub fn of(job: &Job) -> Self {
        match job {
            Ok(job) => Self {
                jobs_prepared: 1,
                jobs_failed: 0,
                bytes_planned: job.source.size,
            },
            Err(_) => Self {
                jobs_prepared: 0,
                jobs_failed: 1,
                bytes_planned: 0,
            },
        }
    }
}

impl std::ops::Add for Summary {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            jobs_prepared: self.jobs_prepared + other.jobs_prepared,
            jobs_failed: self.jobs_failed + other.jobs_failed,
            bytes_planned: self.bytes_planned + other.bytes_planned,
        }
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "jobs prepared: {}\n\
            jobs failed: {}\n\
            bytes to copy: {}",
            self.jobs_prepared,
            self.jobs_failed,
            bytesize::ByteSize(self.bytes_planned),
        )
    }
}
