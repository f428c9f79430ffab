use std::time::{Duration, Instant};

pub struct ScopedTimer {
    name: String,
    start: Instant,
}

impl ScopedTimer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        log::info!("{} took {:?}", self.name, self.start.elapsed());
    }
}

/// Optional wall-clock limit shared by long-running loops.
#[derive(Clone, Copy, Debug)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    pub fn none() -> Self {
        Self { at: None }
    }

    /// Deadline `secs` from now; zero or negative means no limit.
    pub fn after_secs(secs: f64) -> Self {
        if secs > 0.0 {
            Self {
                at: Some(Instant::now() + Duration::from_secs_f64(secs)),
            }
        } else {
            Self::none()
        }
    }

    pub fn expired(&self) -> bool {
        self.at.is_some_and(|t| Instant::now() >= t)
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline() {
        assert!(!Deadline::none().expired());
        assert!(!Deadline::after_secs(0.0).expired());
        assert!(!Deadline::after_secs(3600.0).expired());
        let short = Deadline::after_secs(1e-6);
        std::thread::sleep(Duration::from_millis(2));
        assert!(short.expired());
    }
}
