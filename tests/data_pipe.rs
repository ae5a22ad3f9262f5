use conduit::{
    Core, CoreBuilder, DataPipeOptions, Error, MessagePipeOptions, ReadDataFlags, Signals,
    WriteDataFlags,
};

fn pipe(core: &Core, element: usize, capacity: usize) -> (conduit::Handle, conduit::Handle) {
    core.create_data_pipe(&DataPipeOptions {
        element_num_bytes: element,
        capacity_num_bytes: capacity,
    })
    .unwrap()
}

#[test]
fn test_capacity_four_partial_reads() {
    let core = Core::new();
    let (producer, consumer) = pipe(&core, 1, 4);

    assert_eq!(core.write_data(producer, b"AB", WriteDataFlags::empty()), Ok(2));

    let mut buf = [0u8; 1];
    assert_eq!(core.read_data(consumer, &mut buf, ReadDataFlags::empty()), Ok(1));
    assert_eq!(&buf, b"A");
    assert_eq!(core.read_data(consumer, &mut buf, ReadDataFlags::empty()), Ok(1));
    assert_eq!(&buf, b"B");
    assert_eq!(
        core.read_data(consumer, &mut buf, ReadDataFlags::empty()),
        Err(Error::ShouldWait)
    );
}

#[test]
fn test_write_more_than_capacity() {
    let core = Core::new();
    let (producer, consumer) = pipe(&core, 1, 8);

    assert_eq!(core.write_data(producer, &[7u8; 9], WriteDataFlags::empty()), Ok(8));
    assert_eq!(
        core.write_data(producer, &[7u8; 1], WriteDataFlags::empty()),
        Err(Error::ShouldWait)
    );
    assert_eq!(core.query_data(consumer), Ok(8));
}

#[test]
fn test_two_phase_write_round_trip() {
    let core = Core::new();
    let (producer, consumer) = pipe(&core, 1, 16);

    let mut region = core
        .begin_write_data(producer, 0, WriteDataFlags::empty())
        .unwrap();
    assert_eq!(region.len(), 16);
    region.write(0, b"hello world").unwrap();

    // Nothing is visible until the commit.
    assert_eq!(core.query_data(consumer), Ok(0));
    core.end_write_data(producer, 5).unwrap();

    let mut buf = [0u8; 16];
    assert_eq!(core.read_data(consumer, &mut buf, ReadDataFlags::empty()), Ok(5));
    assert_eq!(&buf[..5], b"hello");
}

#[test]
fn test_two_phase_read_round_trip() {
    let core = Core::new();
    let (producer, consumer) = pipe(&core, 1, 16);
    core.write_data(producer, b"abcdef", WriteDataFlags::empty()).unwrap();

    let region = core
        .begin_read_data(consumer, 0, ReadDataFlags::empty())
        .unwrap();
    assert_eq!(region.to_vec().unwrap(), b"abcdef");
    assert!(!core.query_state(consumer).unwrap().satisfies(Signals::READABLE));

    core.end_read_data(consumer, 4).unwrap();
    let mut buf = [0u8; 2];
    assert_eq!(core.read_data(consumer, &mut buf, ReadDataFlags::empty()), Ok(2));
    assert_eq!(&buf, b"ef");
}

#[test]
fn test_second_begin_write_is_busy() {
    let core = Core::new();
    let (producer, _consumer) = pipe(&core, 1, 8);

    let _region = core
        .begin_write_data(producer, 0, WriteDataFlags::empty())
        .unwrap();
    assert_eq!(
        core.begin_write_data(producer, 0, WriteDataFlags::empty()).err(),
        Some(Error::Busy)
    );
    assert_eq!(
        core.write_data(producer, b"x", WriteDataFlags::empty()),
        Err(Error::Busy)
    );
    assert!(!core.query_state(producer).unwrap().satisfies(Signals::WRITABLE));
}

#[test]
fn test_end_without_begin_fails() {
    let core = Core::new();
    let (producer, consumer) = pipe(&core, 1, 8);

    assert_eq!(core.end_write_data(producer, 0), Err(Error::FailedPrecondition));
    assert_eq!(core.end_read_data(consumer, 0), Err(Error::FailedPrecondition));
}

#[test]
fn test_region_is_dead_after_end() {
    let core = Core::new();
    let (producer, _consumer) = pipe(&core, 1, 8);

    let mut region = core
        .begin_write_data(producer, 0, WriteDataFlags::empty())
        .unwrap();
    core.end_write_data(producer, 0).unwrap();

    assert_eq!(region.write(0, b"late"), Err(Error::FailedPrecondition));
}

#[test]
fn test_two_phase_region_stops_at_wrap() {
    let core = Core::new();
    let (producer, consumer) = pipe(&core, 1, 8);

    core.write_data(producer, b"123456", WriteDataFlags::empty()).unwrap();
    core.discard_data(consumer, 4, ReadDataFlags::empty()).unwrap();

    // Free space is [6, 8) and [0, 4); only the first part is contiguous.
    let region = core
        .begin_write_data(producer, 0, WriteDataFlags::empty())
        .unwrap();
    assert_eq!(region.len(), 2);
    core.end_write_data(producer, 0).unwrap();

    assert_eq!(
        core.begin_write_data(producer, 4, WriteDataFlags::ALL_OR_NONE).err(),
        Some(Error::ShouldWait)
    );
}

#[test]
fn test_wrapping_write_reads_back_in_order() {
    let core = Core::new();
    let (producer, consumer) = pipe(&core, 1, 8);
    let mut buf = [0u8; 8];

    core.write_data(producer, b"abcdef", WriteDataFlags::empty()).unwrap();
    core.read_data(consumer, &mut buf[..4], ReadDataFlags::empty()).unwrap();
    assert_eq!(core.write_data(producer, b"ghijkl", WriteDataFlags::empty()), Ok(6));

    assert_eq!(core.read_data(consumer, &mut buf, ReadDataFlags::empty()), Ok(8));
    assert_eq!(&buf, b"efghijkl");
}

#[test]
fn test_element_size_is_enforced() {
    let core = Core::new();
    let (producer, consumer) = pipe(&core, 4, 12);

    assert_eq!(
        core.write_data(producer, b"abcde", WriteDataFlags::empty()),
        Err(Error::InvalidArgument)
    );
    assert_eq!(core.write_data(producer, b"abcdefgh", WriteDataFlags::empty()), Ok(8));

    let mut odd = [0u8; 6];
    assert_eq!(
        core.read_data(consumer, &mut odd, ReadDataFlags::empty()),
        Err(Error::InvalidArgument)
    );
    assert_eq!(
        core.discard_data(consumer, 3, ReadDataFlags::empty()),
        Err(Error::InvalidArgument)
    );

    let region = core
        .begin_write_data(producer, 0, WriteDataFlags::empty())
        .unwrap();
    assert_eq!(region.len(), 4);
    assert_eq!(core.end_write_data(producer, 2), Err(Error::InvalidArgument));
    // The failed end still closed the phase.
    assert!(core.begin_write_data(producer, 0, WriteDataFlags::empty()).is_ok());
}

#[test]
fn test_invalid_options() {
    let core = CoreBuilder::new()
        .default_data_pipe_capacity_bytes(512)
        .max_data_pipe_capacity_bytes(1024)
        .build();

    let zero_element = DataPipeOptions {
        element_num_bytes: 0,
        capacity_num_bytes: 8,
    };
    assert_eq!(core.create_data_pipe(&zero_element).err(), Some(Error::InvalidArgument));

    let misaligned = DataPipeOptions {
        element_num_bytes: 3,
        capacity_num_bytes: 8,
    };
    assert_eq!(core.create_data_pipe(&misaligned).err(), Some(Error::InvalidArgument));

    let too_big = DataPipeOptions::with_capacity(2048);
    assert_eq!(core.create_data_pipe(&too_big).err(), Some(Error::ResourceExhausted));
}

#[test]
fn test_default_capacity_comes_from_config() {
    let core = CoreBuilder::new().default_data_pipe_capacity_bytes(100).build();
    let (producer, _consumer) = core
        .create_data_pipe(&DataPipeOptions {
            element_num_bytes: 8,
            capacity_num_bytes: 0,
        })
        .unwrap();

    assert_eq!(core.data_pipe_geometry(producer), Ok((8, 96)));
}

#[test]
fn test_drain_then_eof() {
    let core = Core::new();
    let (producer, consumer) = pipe(&core, 1, 8);

    core.write_data(producer, b"xyz", WriteDataFlags::empty()).unwrap();
    core.close(producer).unwrap();

    let state = core.query_state(consumer).unwrap();
    assert!(state.satisfied.contains(Signals::READABLE | Signals::PEER_CLOSED));
    assert!(state.can_satisfy(Signals::READABLE));

    let mut buf = [0u8; 8];
    assert_eq!(core.read_data(consumer, &mut buf, ReadDataFlags::empty()), Ok(3));

    let drained = core.query_state(consumer).unwrap();
    assert!(!drained.can_satisfy(Signals::READABLE));
    assert!(drained.satisfies(Signals::PEER_CLOSED));
    assert_eq!(
        core.read_data(consumer, &mut buf, ReadDataFlags::empty()),
        Err(Error::PeerClosed)
    );
}

#[test]
fn test_write_after_consumer_close() {
    let core = Core::new();
    let (producer, consumer) = pipe(&core, 1, 8);
    core.close(consumer).unwrap();

    assert_eq!(
        core.write_data(producer, b"x", WriteDataFlags::empty()),
        Err(Error::PeerClosed)
    );
    assert_eq!(
        core.begin_write_data(producer, 0, WriteDataFlags::empty()).err(),
        Some(Error::PeerClosed)
    );
    let state = core.query_state(producer).unwrap();
    assert_eq!(state.satisfied, Signals::PEER_CLOSED);
}

#[test]
fn test_closing_producer_aborts_two_phase_write() {
    let core = Core::new();
    let (producer, consumer) = pipe(&core, 1, 8);

    let mut region = core
        .begin_write_data(producer, 0, WriteDataFlags::empty())
        .unwrap();
    region.write(0, b"never").unwrap();
    core.close(producer).unwrap();

    assert_eq!(region.write(0, b"x"), Err(Error::FailedPrecondition));
    assert_eq!(core.query_data(consumer), Ok(0));
    let mut buf = [0u8; 1];
    assert_eq!(
        core.read_data(consumer, &mut buf, ReadDataFlags::empty()),
        Err(Error::PeerClosed)
    );
}

#[test]
fn test_peek_and_all_or_none_reads() {
    let core = Core::new();
    let (producer, consumer) = pipe(&core, 1, 8);
    core.write_data(producer, b"abc", WriteDataFlags::empty()).unwrap();

    let mut four = [0u8; 4];
    assert_eq!(
        core.read_data(consumer, &mut four, ReadDataFlags::ALL_OR_NONE),
        Err(Error::ShouldWait)
    );

    let mut two = [0u8; 2];
    assert_eq!(core.read_data(consumer, &mut two, ReadDataFlags::PEEK), Ok(2));
    assert_eq!(&two, b"ab");
    assert_eq!(core.query_data(consumer), Ok(3));
}

#[test]
fn test_discard_clamps() {
    let core = Core::new();
    let (producer, consumer) = pipe(&core, 1, 8);
    core.write_data(producer, b"abc", WriteDataFlags::empty()).unwrap();

    assert_eq!(core.discard_data(consumer, 100, ReadDataFlags::empty()), Ok(3));
    assert_eq!(
        core.discard_data(consumer, 1, ReadDataFlags::empty()),
        Err(Error::ShouldWait)
    );
}

#[test]
fn test_new_data_readable_clears_on_read() {
    let core = Core::new();
    let (producer, consumer) = pipe(&core, 1, 8);
    core.write_data(producer, b"ab", WriteDataFlags::empty()).unwrap();
    assert!(core.query_state(consumer).unwrap().satisfies(Signals::NEW_DATA_READABLE));

    let mut one = [0u8; 1];
    core.read_data(consumer, &mut one, ReadDataFlags::empty()).unwrap();
    let state = core.query_state(consumer).unwrap();
    assert!(state.satisfies(Signals::READABLE));
    assert!(!state.satisfies(Signals::NEW_DATA_READABLE));
}

#[test]
fn test_end_with_open_phase_cannot_be_sent() {
    let core = Core::new();
    let (a, _b) = core.create_message_pipe(&MessagePipeOptions::default()).unwrap();
    let (producer, _consumer) = pipe(&core, 1, 8);

    let _region = core
        .begin_write_data(producer, 0, WriteDataFlags::empty())
        .unwrap();
    assert_eq!(core.write_message(a, b"", &[producer]), Err(Error::Busy));

    core.end_write_data(producer, 0).unwrap();
    assert!(core.write_message(a, b"", &[producer]).is_ok());
}

#[test]
fn test_wrong_end_is_invalid_handle() {
    let core = Core::new();
    let (producer, consumer) = pipe(&core, 1, 8);
    let mut buf = [0u8; 1];

    assert_eq!(
        core.write_data(consumer, b"x", WriteDataFlags::empty()),
        Err(Error::InvalidHandle)
    );
    assert_eq!(
        core.read_data(producer, &mut buf, ReadDataFlags::empty()),
        Err(Error::InvalidHandle)
    );
}
