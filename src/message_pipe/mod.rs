//! Message pipes: bidirectional channels of discrete messages.
//!
//! Each message is a byte payload plus an ordered list of cargo handles.
//! Sending a handle moves it: the sender's handle is invalidated as part of
//! the write, and the reader receives a new handle to the same resource.
//! Messages arrive in send order per direction.
//!
//! - [`pipe`]: the shared two-ended queue
//! - [`message`]: message types

pub(crate) mod message;
pub(crate) mod pipe;

pub use message::Message;

use crate::core::Core;
use crate::error::{Error, Result};
use crate::handle::Handle;
use crate::handle::resource::Resource;
use crate::message_pipe::message::PendingMessage;
use crate::message_pipe::pipe::{MessagePipe, Side};

use log::debug;
use std::sync::Arc;

/// Options for [`Core::create_message_pipe`]. No options are defined yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct MessagePipeOptions {}

fn message_pipe_of(resource: &Resource) -> Result<(Arc<MessagePipe>, Side)> {
    match resource {
        Resource::MessagePipe(end) => Ok((end.pipe().clone(), end.side())),
        _ => Err(Error::InvalidHandle),
    }
}

impl Core {
    /// Creates a message pipe and returns handles to its two endpoints.
    pub fn create_message_pipe(&self, _options: &MessagePipeOptions) -> Result<(Handle, Handle)> {
        let (a, b) = MessagePipe::new();
        let handles = self.insert(vec![Resource::MessagePipe(a), Resource::MessagePipe(b)])?;

        Ok((handles[0], handles[1]))
    }

    /// Sends a message from `endpoint` to its peer.
    ///
    /// Every handle in `handles` moves into the message: on success they are
    /// no longer valid for the caller. On failure none of them is touched.
    ///
    /// # Errors
    /// - [`Error::InvalidHandle`] if `endpoint` or a cargo handle is not live,
    ///   or `endpoint` is not a message pipe
    /// - [`Error::InvalidArgument`] if the cargo contains either end of this
    ///   pipe or lists a handle twice
    /// - [`Error::Busy`] if a cargo handle has a two-phase operation open
    /// - [`Error::ResourceExhausted`] if the message exceeds the configured
    ///   size or handle limits
    /// - [`Error::PeerClosed`] if the peer endpoint is closed
    pub fn write_message(&self, endpoint: Handle, bytes: &[u8], handles: &[Handle]) -> Result<()> {
        let mut table = self.table();
        let (pipe, side) = message_pipe_of(table.get(endpoint)?)?;

        let config = self.config();
        if bytes.len() > config.max_message_num_bytes
            || handles.len() > config.max_message_num_handles
        {
            return Err(Error::ResourceExhausted);
        }

        for (index, &handle) in handles.iter().enumerate() {
            if handle == endpoint || handles[..index].contains(&handle) {
                return Err(Error::InvalidArgument);
            }

            let resource = table.get(handle)?;
            // Either end of this pipe would be queued on itself.
            if let Resource::MessagePipe(end) = resource {
                if Arc::ptr_eq(end.pipe(), &pipe) {
                    return Err(Error::InvalidArgument);
                }
            }

            if resource.is_busy() {
                return Err(Error::Busy);
            }
        }

        if !pipe.is_peer_open(side) {
            return Err(Error::PeerClosed);
        }

        let cargo = handles
            .iter()
            .map(|&handle| table.remove(handle))
            .collect::<Result<Vec<_>>>()?;
        drop(table);

        for resource in &cargo {
            resource.prepare_transfer();
        }

        let message = PendingMessage {
            bytes: bytes.to_vec(),
            cargo,
        };

        // The peer closed after the check above: the message is lost exactly
        // as if it had been delivered and then discarded by the close.
        if let Some(undelivered) = pipe.enqueue(side, message) {
            debug!("message pipe: peer closed during write, dropping message");
            drop(undelivered);
        }

        Ok(())
    }

    /// Reads the oldest message queued on `endpoint`.
    ///
    /// # Errors
    /// - [`Error::ShouldWait`] if nothing is queued and the peer is open
    /// - [`Error::PeerClosed`] if nothing is queued and the peer is closed;
    ///   no message will ever arrive
    /// - [`Error::ResourceExhausted`] if the handle table cannot hold the
    ///   message's cargo; the message stays queued
    /// - [`Error::InvalidHandle`] if `endpoint` is not a live message pipe
    pub fn read_message(&self, endpoint: Handle) -> Result<Message> {
        let mut table = self.table();
        let (pipe, side) = message_pipe_of(table.get(endpoint)?)?;

        let room = self
            .config()
            .max_handle_table_size
            .saturating_sub(table.len());
        let PendingMessage { bytes, cargo } = pipe.dequeue(side, room)?;

        let handles = table
            .insert_all(cargo)
            .map_err(|_| Error::ResourceExhausted)?;

        Ok(Message { bytes, handles })
    }
}
