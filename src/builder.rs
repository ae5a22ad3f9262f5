//! Fluent builder for [`Core`] construction.
//!
//! Every limit has a default suitable for in-process use; override only what
//! a deployment needs.

use crate::core::Core;

/// Limits enforced by a [`Core`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Maximum number of live handles.
    pub max_handle_table_size: usize,
    /// Maximum payload size of one message.
    pub max_message_num_bytes: usize,
    /// Maximum number of cargo handles in one message.
    pub max_message_num_handles: usize,
    /// Capacity used when a data pipe is created with capacity 0.
    pub default_data_pipe_capacity_bytes: usize,
    /// Largest capacity a data pipe may request.
    pub max_data_pipe_capacity_bytes: usize,
    /// Largest shared buffer that may be created.
    pub max_shared_buffer_num_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_handle_table_size: 1 << 20,
            max_message_num_bytes: 4 * 1024 * 1024,
            max_message_num_handles: 64,
            default_data_pipe_capacity_bytes: 64 * 1024,
            max_data_pipe_capacity_bytes: 256 * 1024 * 1024,
            max_shared_buffer_num_bytes: 1024 * 1024 * 1024,
        }
    }
}

/// Builder for [`Core`] instances with custom limits.
///
/// # Example
/// ```ignore
/// let core = CoreBuilder::new()
///     .max_message_num_handles(8)
///     .default_data_pipe_capacity_bytes(4096)
///     .build();
/// ```
#[derive(Debug, Clone, Default)]
pub struct CoreBuilder {
    config: Config,
}

impl CoreBuilder {
    /// Creates a builder holding the default [`Config`].
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn max_handle_table_size(mut self, size: usize) -> Self {
        self.config.max_handle_table_size = size;
        self
    }

    pub fn max_message_num_bytes(mut self, bytes: usize) -> Self {
        self.config.max_message_num_bytes = bytes;
        self
    }

    pub fn max_message_num_handles(mut self, handles: usize) -> Self {
        self.config.max_message_num_handles = handles;
        self
    }

    /// Sets the capacity used for data pipes created with capacity 0.
    ///
    /// If it exceeds the maximum capacity, the maximum is raised to match at
    /// build time.
    pub fn default_data_pipe_capacity_bytes(mut self, bytes: usize) -> Self {
        self.config.default_data_pipe_capacity_bytes = bytes;
        self
    }

    pub fn max_data_pipe_capacity_bytes(mut self, bytes: usize) -> Self {
        self.config.max_data_pipe_capacity_bytes = bytes;
        self
    }

    pub fn max_shared_buffer_num_bytes(mut self, bytes: usize) -> Self {
        self.config.max_shared_buffer_num_bytes = bytes;
        self
    }

    /// Builds a new, independent [`Core`] with its own handle table.
    ///
    /// # Returns
    /// A core whose limits are the builder's configuration
    pub fn build(mut self) -> Core {
        self.config.max_data_pipe_capacity_bytes = self
            .config
            .max_data_pipe_capacity_bytes
            .max(self.config.default_data_pipe_capacity_bytes);

        Core::with_config(self.config)
    }
}
