use chunkfs_core::*;
use chunkfs_hal::sim::{CountingTicker, FixedEntropy, LcgEntropy, SimFlash};
use chunkfs_hal::EntropySource;

type SimFs = FileSystem<SimFlash, CountingTicker>;

const BASE: u32 = 0x2_0000;

/// 6 blocks of 256 bytes: 10 chunks plus the identity block
fn ten_chunk_flash() -> SimFlash {
    SimFlash::new(BASE, 256, 6)
}

fn store_config(flash: &SimFlash, threshold: u8) -> StoreConfig {
    StoreConfig::new(flash.base(), flash.end()).with_sweep_threshold(threshold)
}

fn mount_with<E: EntropySource>(flash: SimFlash, threshold: u8, entropy: &mut E) -> SimFs {
    let config = store_config(&flash, threshold);
    FileSystem::mount(flash, CountingTicker::new(), entropy, config).unwrap()
}

fn ten_chunk_fs(threshold: u8) -> SimFs {
    mount_with(ten_chunk_flash(), threshold, &mut FixedEntropy(0))
}

fn create(fs: &mut SimFs, name: &[u8], data: &[u8]) {
    let mut fd = fs.open(name, true, true).unwrap();
    assert_eq!(fs.write(&mut fd, data).unwrap(), data.len());
    fs.close(&mut fd).unwrap();
}

fn contents(fs: &mut SimFs, name: &[u8]) -> Vec<u8> {
    let mut fd = fs.open(name, false, true).unwrap();
    let mut out = Vec::new();
    let mut buf = [0u8; 64];
    loop {
        let n = fs.read(&mut fd, &mut buf).unwrap();
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    fs.close(&mut fd).unwrap();
    out
}

#[test]
fn test_two_chunk_file_then_overwrite() {
    let mut fs = ten_chunk_fs(8);
    create(&mut fs, b"a.txt", &[b'a'; 140]);

    let stats = fs.stats().unwrap();
    assert_eq!(stats.files, 1);
    assert_eq!(stats.data, 1);
    assert_eq!(fs.size(b"a.txt").unwrap(), 140);
    assert_eq!(contents(&mut fs, b"a.txt"), [b'a'; 140]);

    create(&mut fs, b"a.txt", &[b'b'; 10]);
    let stats = fs.stats().unwrap();
    assert_eq!(stats.files, 1);
    assert_eq!(stats.data, 0);
    assert_eq!(stats.freed, 2);
    assert_eq!(fs.size(b"a.txt").unwrap(), 10);
    assert_eq!(contents(&mut fs, b"a.txt"), [b'b'; 10]);
}

#[test]
fn test_name_length_boundary() {
    let mut fs = ten_chunk_fs(8);
    let long = [b'n'; MAX_FILENAME_LENGTH];
    create(&mut fs, &long, b"0123456789");
    assert_eq!(fs.size(&long).unwrap(), 10);
    assert_eq!(contents(&mut fs, &long), b"0123456789");
    assert_eq!(fs.list().unwrap()[0].as_slice(), &long[..]);

    let before = fs.stats().unwrap();
    let programs = fs.store().persistent().flash().program_count();
    let too_long = [b'n'; MAX_FILENAME_LENGTH + 1];
    assert_eq!(fs.open(&too_long, true, false).err(), Some(Error::IllegalNameLength));
    assert_eq!(fs.open(&too_long, false, false).err(), Some(Error::IllegalNameLength));
    assert_eq!(fs.stats().unwrap(), before);
    assert_eq!(fs.store().persistent().flash().program_count(), programs);
}

#[test]
fn test_remove_twice() {
    let mut fs = ten_chunk_fs(8);
    create(&mut fs, b"gone", &[1; 300]);
    assert_eq!(fs.stats().unwrap().live(), 3);

    fs.remove(b"gone").unwrap();
    assert_eq!(fs.remove(b"gone"), Err(Error::NotFound));
    assert_eq!(fs.size(b"gone"), Err(Error::NotFound));

    let stats = fs.stats().unwrap();
    assert_eq!(stats.live(), 0);
    assert_eq!(stats.freed, 3);
}

#[test]
fn test_full_store_rejects_second_file() {
    let mut fs = ten_chunk_fs(8);
    // 10 chunks, the last one left one byte short of full
    let big: Vec<u8> = (0..121 + 8 * 126 + 125).map(|i| i as u8).collect();
    create(&mut fs, b"big", &big);
    assert_eq!(fs.stats().unwrap().unused, 0);

    assert_eq!(fs.open(b"second", true, false).err(), Some(Error::OutOfSpace));
    assert_eq!(fs.find(b"second"), Err(Error::NotFound));
    assert_eq!(contents(&mut fs, b"big"), big);
}

#[test]
fn test_write_past_capacity_rolls_back_second_file() {
    let mut fs = ten_chunk_fs(8);
    let big: Vec<u8> = (0..121 + 7 * 126 + 125).map(|i| (i * 7) as u8).collect();
    create(&mut fs, b"big", &big);

    let mut fd = fs.open(b"second", true, false).unwrap();
    assert_eq!(fs.write(&mut fd, &[0x42; 200]), Err(Error::OutOfSpace));
    assert!(!fd.is_open());
    assert_eq!(fs.close(&mut fd), Err(Error::ClosedHandleUse));

    assert_eq!(fs.find(b"second"), Err(Error::NotFound));
    assert_eq!(fs.list().unwrap().len(), 1);
    assert_eq!(fs.size(b"big").unwrap(), big.len() as u32);
    assert_eq!(contents(&mut fs, b"big"), big);
}

#[test]
fn test_first_chunk_varies_across_boots() {
    let mut firsts = [0u32; 11];
    for seed in 0..64u16 {
        let mut fs = mount_with(ten_chunk_flash(), 8, &mut LcgEntropy::new(seed));
        let fd = fs.open(b"f", true, false).unwrap();
        firsts[fd.start_chunk() as usize] += 1;
    }

    let used = firsts.iter().filter(|&&n| n > 0).count();
    let most = firsts.iter().copied().max().unwrap_or(0);
    assert!(used >= 5, "first chunks concentrated: {firsts:?}");
    assert!(most < 32, "first chunks concentrated: {firsts:?}");
}

#[test]
fn test_create_delete_cycles_walk_the_store() {
    let mut fs = mount_with(ten_chunk_flash(), 8, &mut FixedEntropy(4));
    let mut seen = [false; 11];
    for _ in 0..30 {
        let mut fd = fs.open(b"tmp", true, false).unwrap();
        seen[fd.start_chunk() as usize] = true;
        fs.write(&mut fd, b"scratch").unwrap();
        fs.close(&mut fd).unwrap();
        fs.remove(b"tmp").unwrap();
    }
    assert!(seen[1..].iter().all(|&s| s));
    assert_eq!(fs.sweep_count().unwrap(), 0);
}

#[test]
fn test_scattered_releases_trigger_sweep() {
    let mut fs = ten_chunk_fs(4);
    let names: Vec<[u8; 2]> = (0..10u8).map(|i| [b'f', b'0' + i]).collect();
    for name in &names {
        create(&mut fs, name, name);
    }
    // Release every other chunk so no block is entirely released
    for name in names.iter().step_by(2) {
        fs.remove(name).unwrap();
    }
    assert_eq!(fs.stats().unwrap().freed, 5);

    create(&mut fs, b"new", b"fresh");

    assert_eq!(fs.sweep_count().unwrap(), 1);
    assert_eq!(fs.store().layout().marker_end(), StoreEnd::Low);
    let stats = fs.stats().unwrap();
    assert_eq!(stats.freed, 0);
    assert_eq!(stats.files, 6);
    assert_eq!(stats.unused, 4);
    for name in names.iter().skip(1).step_by(2) {
        assert_eq!(contents(&mut fs, name), name);
    }
    assert_eq!(contents(&mut fs, b"new"), b"fresh");
}

#[test]
fn test_below_threshold_reports_out_of_space() {
    let mut fs = ten_chunk_fs(8);
    let names: Vec<[u8; 2]> = (0..10u8).map(|i| [b'g', b'0' + i]).collect();
    for name in &names {
        create(&mut fs, name, b"x");
    }
    for name in names.iter().step_by(2) {
        fs.remove(name).unwrap();
    }
    // 5 released chunks do not justify a sweep at threshold 8
    assert_eq!(fs.open(b"new", true, false).err(), Some(Error::OutOfSpace));
    assert_eq!(fs.sweep_count().unwrap(), 0);

    fs.sweep().unwrap();
    create(&mut fs, b"new", b"x");
    assert_eq!(fs.stats().unwrap().files, 6);
}

#[test]
fn test_sweep_preserves_files() {
    let mut fs = ten_chunk_fs(8);
    create(&mut fs, b"keep1", &[1; 200]);
    create(&mut fs, b"drop", &[2; 130]);
    create(&mut fs, b"keep2", &[3; 50]);
    fs.remove(b"drop").unwrap();

    let before = fs.stats().unwrap();
    fs.sweep().unwrap();
    let after = fs.stats().unwrap();

    assert_eq!(after.freed, 0);
    assert_eq!(after.live(), before.live());
    assert_eq!(after.unused, before.unused + before.freed);
    assert_eq!(contents(&mut fs, b"keep1"), [1; 200]);
    assert_eq!(contents(&mut fs, b"keep2"), [3; 50]);
}

#[test]
fn test_open_descriptor_survives_sweep() {
    let mut fs = ten_chunk_fs(8);
    create(&mut fs, b"junk", &[0; 10]);
    let mut fd = fs.open(b"live", true, false).unwrap();
    fs.write(&mut fd, &[9; 100]).unwrap();
    fs.remove(b"junk").unwrap();

    fs.sweep().unwrap();
    fs.write(&mut fd, &[9; 100]).unwrap();
    fs.close(&mut fd).unwrap();

    assert_eq!(contents(&mut fs, b"live"), [9; 200]);
}

#[test]
fn test_files_survive_remount() {
    let mut fs = ten_chunk_fs(2);
    create(&mut fs, b"boot.py", b"print('hi')\n");
    create(&mut fs, b"data", &[0xA5; 300]);
    fs.sweep().unwrap();

    let (flash, _) = fs.unmount();
    let mut fs = mount_with(flash, 2, &mut LcgEntropy::new(99));

    assert_eq!(fs.store().layout().marker_end(), StoreEnd::Low);
    assert_eq!(fs.sweep_count().unwrap(), 1);
    let names = fs.list().unwrap();
    assert_eq!(names.len(), 2);
    assert_eq!(contents(&mut fs, b"boot.py"), b"print('hi')\n");
    assert_eq!(contents(&mut fs, b"data"), [0xA5; 300]);
}

#[test]
fn test_ticker_paused_around_flash_work() {
    let mut fs = ten_chunk_fs(2);
    create(&mut fs, b"a", &[1; 300]);
    fs.remove(b"a").unwrap();
    fs.sweep().unwrap();

    let (_, ticker) = fs.unmount();
    assert!(ticker.stops > 0);
    assert_eq!(ticker.stops, ticker.starts);
    assert!(ticker.is_running());
}

#[test]
fn test_mode_strings() {
    let mut fs = ten_chunk_fs(8);
    let mut fd = fs.open_with_mode(b"m", "wt").unwrap();
    assert!(fd.writable());
    assert!(!fd.binary());
    fs.write(&mut fd, b"text").unwrap();
    fs.close(&mut fd).unwrap();

    let fd = fs.open_with_mode(b"m", "br").unwrap();
    assert!(!fd.writable());
    assert!(fd.binary());
    assert_eq!(fs.open_with_mode(b"m", "rw").err(), Some(Error::IllegalMode));
}

#[test]
fn test_config_errors_reported_at_mount() {
    // A single block leaves no room beside the identity block
    let flash = SimFlash::new(0, 256, 1);
    let config = StoreConfig::new(0, flash.end());
    let result = FileSystem::mount(flash, CountingTicker::new(), &mut FixedEntropy(0), config);
    assert!(matches!(
        result.err(),
        Some(Error::Config(ConfigError::NoSpace))
    ));

    let flash = ten_chunk_flash();
    let config = store_config(&flash, 8).with_max_chunks(253);
    let result = FileSystem::mount(flash, CountingTicker::new(), &mut FixedEntropy(0), config);
    assert!(matches!(
        result.err(),
        Some(Error::Config(ConfigError::TooManyChunks))
    ));
}
