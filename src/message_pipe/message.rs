use crate::handle::Handle;
use crate::handle::resource::Resource;

/// A message read from a message pipe.
///
/// `handles` are freshly minted handles for the cargo, in the order the
/// sender listed them. The reader owns them and is responsible for closing
/// them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    pub bytes: Vec<u8>,
    pub handles: Vec<Handle>,
}

impl Message {
    pub fn new(bytes: Vec<u8>, handles: Vec<Handle>) -> Self {
        Self { bytes, handles }
    }
}

/// A message in flight: its cargo is held as owned resources, detached from
/// any handle table slot until the receiver reads it.
pub(crate) struct PendingMessage {
    pub(crate) bytes: Vec<u8>,
    pub(crate) cargo: Vec<Resource>,
}
