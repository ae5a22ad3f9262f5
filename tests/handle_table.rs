use conduit::{
    Core, CoreBuilder, Error, Handle, MessagePipeOptions, ResourceKind, SharedBufferOptions,
    Signals,
};

#[test]
fn test_double_close_is_invalid_handle() {
    let core = Core::new();
    let (a, _b) = core.create_message_pipe(&MessagePipeOptions::default()).unwrap();

    assert_eq!(core.close(a), Ok(()));
    assert_eq!(core.close(a), Err(Error::InvalidHandle));
    assert_eq!(core.query_state(a).err(), Some(Error::InvalidHandle));
}

#[test]
fn test_invalid_handle_value_is_never_live() {
    let core = Core::new();

    assert!(!Handle::INVALID.is_valid_value());
    assert!(!core.is_valid(Handle::INVALID));
    assert_eq!(core.close(Handle::INVALID), Err(Error::InvalidHandle));
}

#[test]
fn test_reused_slot_does_not_alias_stale_handle() {
    let core = Core::new();
    let stale = core.wrap_platform_value(1).unwrap();
    core.close(stale).unwrap();

    let fresh = core.wrap_platform_value(2).unwrap();
    assert_ne!(stale, fresh);
    assert!(!core.is_valid(stale));
    assert_eq!(core.unwrap_platform_value(stale), Err(Error::InvalidHandle));
    assert_eq!(core.unwrap_platform_value(fresh), Ok(2));
}

#[test]
fn test_raw_round_trip() {
    let core = Core::new();
    let handle = core.wrap_platform_value(5).unwrap();
    let copy = Handle::from_raw(handle.raw());

    assert_eq!(copy, handle);
    assert_eq!(core.resource_kind(copy), Ok(ResourceKind::Untyped));
}

#[test]
fn test_untyped_handles_carry_no_signals() {
    let core = Core::new();
    let handle = core.wrap_platform_value(5).unwrap();

    let state = core.query_state(handle).unwrap();
    assert!(!state.can_satisfy(Signals::all()));
}

#[test]
fn test_unwrap_rejects_other_kinds() {
    let core = Core::new();
    let buffer = core
        .create_shared_buffer(&SharedBufferOptions::default(), 8)
        .unwrap();

    assert_eq!(core.unwrap_platform_value(buffer), Err(Error::InvalidHandle));
    assert!(core.is_valid(buffer));
}

#[test]
fn test_table_limit() {
    let core = CoreBuilder::new().max_handle_table_size(3).build();

    let (_a, _b) = core.create_message_pipe(&MessagePipeOptions::default()).unwrap();
    assert_eq!(
        core.create_message_pipe(&MessagePipeOptions::default()).err(),
        Some(Error::ResourceExhausted)
    );
    // A failed pair mints neither handle.
    assert_eq!(core.handle_count(), 2);

    let last = core.wrap_platform_value(0).unwrap();
    assert_eq!(core.wrap_platform_value(1).err(), Some(Error::ResourceExhausted));

    core.close(last).unwrap();
    assert!(core.wrap_platform_value(1).is_ok());
}

#[test]
fn test_cargo_stays_queued_when_table_is_full() {
    let core = CoreBuilder::new().max_handle_table_size(3).build();
    let (a, b) = core.create_message_pipe(&MessagePipeOptions::default()).unwrap();
    let cargo = core.wrap_platform_value(7).unwrap();

    core.write_message(a, b"", &[cargo]).unwrap();
    let filler = core.wrap_platform_value(8).unwrap();

    assert_eq!(core.read_message(b).err(), Some(Error::ResourceExhausted));

    core.close(filler).unwrap();
    let message = core.read_message(b).unwrap();
    assert_eq!(core.unwrap_platform_value(message.handles[0]), Ok(7));
}

#[test]
fn test_private_cores_are_independent() {
    let first = Core::new();
    let second = Core::new();
    let handle = first.wrap_platform_value(1).unwrap();

    assert!(first.is_valid(handle));
    assert_eq!(second.handle_count(), 0);
    assert!(Core::global().config().max_handle_table_size > 0);
}

#[test]
fn test_clones_share_one_table() {
    let core = Core::new();
    let clone = core.clone();
    let (a, b) = core.create_message_pipe(&MessagePipeOptions::default()).unwrap();

    clone.write_message(a, b"via clone", &[]).unwrap();
    assert_eq!(core.read_message(b).unwrap().bytes, b"via clone");

    clone.close(a).unwrap();
    assert_eq!(core.close(a), Err(Error::InvalidHandle));
    assert_eq!(core.handle_count(), 1);
}
