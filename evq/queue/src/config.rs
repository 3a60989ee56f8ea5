//! Queue configuration

/// What a periodic event does when the dispatcher ran late
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Overrun {
    /// Fire once for all missed periods and resynchronise to the next
    /// period boundary strictly after the current tick
    #[default]
    Coalesce,
    /// Re-arm at `deadline + period`; late periods fire back-to-back, one
    /// per dispatcher iteration, until the event is caught up
    CatchUp,
}

/// Runtime configuration of an [`EventQueue`](crate::EventQueue)
#[derive(Debug, Clone, Copy)]
pub struct QueueConfig {
    /// Name used in log messages
    pub name: &'static str,
    /// Re-arm policy for late periodic events
    pub overrun: Overrun,
    /// Called before the dispatcher suspends on the clock
    pub idle_callback: Option<fn()>,
}

impl QueueConfig {
    /// Default configuration, usable in `static` initializers
    pub const DEFAULT: Self = Self {
        name: "evq",
        overrun: Overrun::Coalesce,
        idle_callback: None,
    };

    /// Creates a new queue configuration builder.
    pub fn builder() -> QueueConfigBuilder {
        QueueConfigBuilder::default()
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Builder for ergonomic queue configuration construction.
#[derive(Debug, Clone)]
pub struct QueueConfigBuilder {
    config: QueueConfig,
}

impl Default for QueueConfigBuilder {
    fn default() -> Self {
        Self {
            config: QueueConfig::DEFAULT,
        }
    }
}

impl QueueConfigBuilder {
    /// Sets the queue name.
    pub fn name(mut self, name: &'static str) -> Self {
        self.config.name = name;
        self
    }

    /// Sets the overrun policy for periodic events.
    pub fn overrun(mut self, overrun: Overrun) -> Self {
        self.config.overrun = overrun;
        self
    }

    /// Sets the idle callback function.
    pub fn idle_callback(mut self, callback: fn()) -> Self {
        self.config.idle_callback = Some(callback);
        self
    }

    /// Builds the queue configuration.
    pub fn build(self) -> QueueConfig {
        self.config
    }
}
