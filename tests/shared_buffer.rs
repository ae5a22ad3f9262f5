use conduit::{
    BufferInfo, Core, CoreBuilder, DuplicateBufferOptions, Error, MapFlags, ResourceKind,
    SharedBufferOptions, Signals, page_size,
};

fn buffer(core: &Core, size: usize) -> conduit::Handle {
    core.create_shared_buffer(&SharedBufferOptions::default(), size)
        .unwrap()
}

#[test]
fn test_create_and_map() {
    let core = Core::new();
    let handle = buffer(&core, 64);
    assert_eq!(core.resource_kind(handle), Ok(ResourceKind::SharedBuffer));

    let mut mapping = core.map_buffer(handle, 0, 64, MapFlags::empty()).unwrap();
    assert_eq!(mapping.len(), 64);
    assert!(mapping.is_writable());

    let mut out = [0xffu8; 4];
    mapping.read(60, &mut out).unwrap();
    assert_eq!(out, [0; 4]);

    mapping.write(10, b"abc").unwrap();
    let mut back = [0u8; 3];
    mapping.read(10, &mut back).unwrap();
    assert_eq!(&back, b"abc");
}

#[test]
fn test_zero_and_oversized_buffers_fail() {
    let core = CoreBuilder::new().max_shared_buffer_num_bytes(4096).build();

    assert_eq!(
        core.create_shared_buffer(&SharedBufferOptions::default(), 0),
        Err(Error::InvalidArgument)
    );
    assert_eq!(
        core.create_shared_buffer(&SharedBufferOptions::default(), 4097),
        Err(Error::ResourceExhausted)
    );
}

#[test]
fn test_map_range_checks() {
    let core = Core::new();
    let page = page_size();
    let handle = buffer(&core, 2 * page);

    assert_eq!(
        core.map_buffer(handle, 0, 0, MapFlags::empty()).err(),
        Some(Error::InvalidArgument)
    );
    assert_eq!(
        core.map_buffer(handle, 1, 8, MapFlags::empty()).err(),
        Some(Error::InvalidArgument)
    );
    assert_eq!(
        core.map_buffer(handle, page, page + 1, MapFlags::empty()).err(),
        Some(Error::InvalidArgument)
    );
    assert!(core.map_buffer(handle, page, page, MapFlags::empty()).is_ok());
}

#[test]
fn test_mapping_outlives_handle() {
    let core = Core::new();
    let handle = buffer(&core, 32);
    let mut mapping = core.map_buffer(handle, 0, 32, MapFlags::empty()).unwrap();
    core.close(handle).unwrap();

    mapping.write(0, b"still here").unwrap();
    let mut out = [0u8; 10];
    mapping.read(0, &mut out).unwrap();
    assert_eq!(&out, b"still here");
    mapping.unmap();
}

#[test]
fn test_duplicate_shares_memory_and_counts_handles() {
    let core = Core::new();
    let original = buffer(&core, 16);
    let duplicate = core
        .duplicate_buffer(original, &DuplicateBufferOptions::default())
        .unwrap();

    assert_eq!(
        core.buffer_info(original),
        Ok(BufferInfo {
            size: 16,
            handle_count: 2,
            read_only: false,
        })
    );

    let mut a = core.map_buffer(original, 0, 16, MapFlags::empty()).unwrap();
    let b = core.map_buffer(duplicate, 0, 16, MapFlags::empty()).unwrap();
    a.write(3, b"z").unwrap();
    let mut out = [0u8; 1];
    b.read(3, &mut out).unwrap();
    assert_eq!(&out, b"z");

    // Mappings do not count as references.
    assert_eq!(core.buffer_info(duplicate).map(|i| i.handle_count), Ok(2));
    core.close(original).unwrap();
    assert_eq!(core.buffer_info(duplicate).map(|i| i.handle_count), Ok(1));
}

#[test]
fn test_read_only_duplicate() {
    let core = Core::new();
    let writable = buffer(&core, 16);
    let read_only = core
        .duplicate_buffer(writable, &DuplicateBufferOptions { read_only: true })
        .unwrap();

    let mut mapping = core.map_buffer(read_only, 0, 16, MapFlags::empty()).unwrap();
    assert!(!mapping.is_writable());
    assert_eq!(mapping.write(0, b"x"), Err(Error::PermissionDenied));
    assert!(unsafe { mapping.as_mut_slice() }.is_none());

    assert_eq!(
        core.duplicate_buffer(read_only, &DuplicateBufferOptions::default()),
        Err(Error::FailedPrecondition)
    );
    assert_eq!(
        core.duplicate_buffer(writable, &DuplicateBufferOptions::default()),
        Err(Error::FailedPrecondition)
    );
    assert_eq!(core.buffer_info(read_only).map(|i| i.read_only), Ok(true));
}

#[test]
fn test_read_only_map_flag() {
    let core = Core::new();
    let handle = buffer(&core, 16);

    let mut mapping = core.map_buffer(handle, 0, 16, MapFlags::READ_ONLY).unwrap();
    assert_eq!(mapping.write(0, b"x"), Err(Error::PermissionDenied));
}

#[test]
fn test_buffers_never_signal() {
    let core = Core::new();
    let handle = buffer(&core, 16);

    let state = core.query_state(handle).unwrap();
    assert_eq!(state.satisfied, Signals::empty());
    assert_eq!(state.satisfiable, Signals::empty());
}

#[test]
fn test_concurrent_mappings_from_threads() {
    let core = Core::new();
    let page = page_size();
    let handle = buffer(&core, page);
    let other = core
        .duplicate_buffer(handle, &DuplicateBufferOptions::default())
        .unwrap();

    let mut writer = core.map_buffer(handle, 0, page, MapFlags::empty()).unwrap();
    let reader = core.map_buffer(other, 0, page, MapFlags::empty()).unwrap();

    std::thread::scope(|s| {
        s.spawn(|| {
            for round in 1..=50u8 {
                writer.write(0, &vec![round; page]).unwrap();
            }
        });
        s.spawn(|| {
            let mut buf = vec![0u8; page];
            for _ in 0..50 {
                reader.read(0, &mut buf).unwrap();
                assert!(buf.iter().all(|&b| b <= 50));
            }
        });
    });

    let mut last = vec![0u8; page];
    reader.read(0, &mut last).unwrap();
    assert!(last.iter().all(|&b| b == 50));
}
