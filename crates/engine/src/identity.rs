//! # Execution Identity
//!
//! Every template execution is keyed by a ULID: a 48-bit millisecond
//! timestamp followed by 80 random bits, rendered as 26 Crockford base32
//! characters. Identities sort lexicographically in creation order, so a store
//! listing keys in order lists executions chronologically, and the creation
//! time can be read back from the identity alone.
//!
//! Allocation goes through one monotonic generator per process: two
//! identities allocated in the same millisecond still compare in allocation
//! order and never collide.

use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;
use std::thread;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use tracing::trace;
use ulid::{Generator, Ulid};

use runbook_types::TemplateError;

static GENERATOR: Mutex<Generator> = Mutex::new(Generator::new());

/// Time-sortable identity of one template execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExecutionId(Ulid);

impl ExecutionId {
    /// Allocates a fresh identity, strictly greater than every identity this
    /// process allocated before.
    pub fn new() -> Self {
        loop {
            let generated = GENERATOR.lock().expect("identity generator lock poisoned").generate();
            match generated {
                Ok(ulid) => return Self(ulid),
                // Random bits exhausted within this millisecond; wait for the clock.
                Err(_) => {
                    trace!("identity generator overflowed, waiting for next millisecond");
                    thread::yield_now();
                }
            }
        }
    }

    /// Identity carrying the given creation time. Not monotonic.
    pub fn at(date_time: DateTime<Utc>) -> Self {
        Self(Ulid::from_datetime(SystemTime::from(date_time)))
    }

    /// Parses the canonical 26-character form.
    ///
    /// # Example
    /// ```rust
    /// use runbook_engine::identity::ExecutionId;
    ///
    /// let id = ExecutionId::parse("01ARZ3NDEKTSV4RRFFQ69G5FAV").unwrap();
    /// assert_eq!(id.timestamp_ms(), 1_469_922_850_259);
    /// assert!(ExecutionId::parse("not-an-id").is_err());
    /// ```
    pub fn parse(text: &str) -> Result<Self, TemplateError> {
        Ulid::from_string(text)
            .map(Self)
            .map_err(|error| TemplateError::decode(format!("invalid execution id '{text}': {error}")))
    }

    /// Milliseconds since the Unix epoch encoded in the identity.
    pub fn timestamp_ms(&self) -> u64 {
        self.0.timestamp_ms()
    }

    /// Creation time encoded in the identity.
    pub fn date_time(&self) -> Result<DateTime<Utc>, TemplateError> {
        let millis = i64::try_from(self.timestamp_ms())
            .map_err(|_| TemplateError::decode(format!("timestamp of execution id '{self}' is out of range")))?;
        DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| TemplateError::decode(format!("timestamp of execution id '{self}' is out of range")))
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ExecutionId {
    type Err = TemplateError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Self::parse(text)
    }
}

/// Creation time of the execution identified by `id`.
pub fn date_of(id: &str) -> Result<DateTime<Utc>, TemplateError> {
    ExecutionId::parse(id)?.date_time()
}
