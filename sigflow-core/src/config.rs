//! Dispatcher configuration

use embassy_time::Duration;

/// Default wait for task-context posts, in milliseconds
pub const DEFAULT_POST_TIMEOUT_MS: u64 = 100;

/// How long a task-context post waits for room in a full queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PostTimeout {
    /// Fail with `QueueFull` right away
    Immediate,
    /// Wait up to the given duration
    After(Duration),
    /// Wait until a slot frees up
    Forever,
}

impl Default for PostTimeout {
    fn default() -> Self {
        PostTimeout::After(Duration::from_millis(DEFAULT_POST_TIMEOUT_MS))
    }
}

impl PostTimeout {
    /// Build from the plain-number form used in config files
    ///
    /// `None` waits forever, `Some(0)` never waits.
    pub fn from_millis(ms: Option<u64>) -> Self {
        match ms {
            None => PostTimeout::Forever,
            Some(0) => PostTimeout::Immediate,
            Some(ms) => PostTimeout::After(Duration::from_millis(ms)),
        }
    }
}

/// Runtime parameters for a dispatcher instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DispatcherConfig {
    /// Wait applied by [`Poster::post`](crate::Poster::post)
    pub post_timeout: PostTimeout,
}

impl DispatcherConfig {
    pub fn with_post_timeout(mut self, post_timeout: PostTimeout) -> Self {
        self.post_timeout = post_timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeout_is_100ms() {
        let config = DispatcherConfig::default();
        assert_eq!(
            config.post_timeout,
            PostTimeout::After(Duration::from_millis(100))
        );
    }

    #[test]
    fn test_from_millis() {
        assert_eq!(PostTimeout::from_millis(None), PostTimeout::Forever);
        assert_eq!(PostTimeout::from_millis(Some(0)), PostTimeout::Immediate);
        assert_eq!(
            PostTimeout::from_millis(Some(25)),
            PostTimeout::After(Duration::from_millis(25))
        );
    }

    #[test]
    fn test_builder() {
        let config = DispatcherConfig::default().with_post_timeout(PostTimeout::Forever);
        assert_eq!(config.post_timeout, PostTimeout::Forever);
    }
}
