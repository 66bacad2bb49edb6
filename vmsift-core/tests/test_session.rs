//! 合成ダンプ全体に対するデコードのテスト

use vmsift_core::msgbuf::{LOG_RECENTQ, MBLK_SIZE, QUEUE_FIRST_OFFSET};
use vmsift_core::panic::{PANICBUF, PANICBUFSIZE, PANIC_CPU, PANIC_THREAD};
use vmsift_core::summary::{HW_SERIAL, PHYSMEM};
use vmsift_core::tunables::TUNABLES;
use vmsift_core::{DecodeConfig, DumpError, Session};
use vmsift_image::synthetic::DumpBuilder;

const DATA: u64 = 0xffff_ffff_fbc0_0000;
const HEAP: u64 = 0xffff_fe00_0200_0000;

const CPU: u64 = DATA;
const THREAD_PTR: u64 = DATA + 0x10;
const SERIAL: u64 = DATA + 0x20;
const PHYSMEM_ADDR: u64 = DATA + 0x30;
const RECENTQ: u64 = DATA + 0x40;
const PANICBUF_ADDR: u64 = DATA + 0x1000;
const TUNABLE_BASE: u64 = DATA + 0x4000;

const THREAD: u64 = 0xffff_fe00_0123_4000;
const MESSAGES: [&str; 3] = [
    "NOTICE: zfs: pool rpool imported\n",
    "WARNING: /pci@0,0/pci8086,2829@1f,2/disk@0,0 (sd0): Command failed\n",
    "\npanic[cpu1]/thread=fffffe0001234000: forced crash dump initiated at user request\n",
];

fn mblk(next: u64, cont: u64, rptr: u64, wptr: u64) -> Vec<u8> {
    let mut buf = vec![0u8; MBLK_SIZE];
    buf[0..8].copy_from_slice(&next.to_le_bytes());
    buf[16..24].copy_from_slice(&cont.to_le_bytes());
    buf[24..32].copy_from_slice(&rptr.to_le_bytes());
    buf[32..40].copy_from_slice(&wptr.to_le_bytes());
    buf
}

/// パニック情報、メッセージ、チューナブルを含むダンプを作る
fn crash_dump() -> DumpBuilder {
    let mut builder = DumpBuilder::new();

    builder
        .symbol(PANIC_CPU, CPU)
        .symbol(PANIC_THREAD, THREAD_PTR)
        .symbol(PANICBUF, PANICBUF_ADDR)
        .symbol(HW_SERIAL, SERIAL)
        .symbol(PHYSMEM, PHYSMEM_ADDR)
        .symbol(LOG_RECENTQ, RECENTQ)
        .write_i32(CPU, 1)
        .write_u64(THREAD_PTR, THREAD)
        .write(SERIAL, b"12345678\0")
        .write_i32(PHYSMEM_ADDR, 0x20_0000);

    // パニックバッファ: 組2個とメッセージ
    let mut panicbuf = vec![0u8; PANICBUFSIZE];
    let msgoff = 8 + 2 * 24;
    panicbuf[0..4].copy_from_slice(&1i32.to_le_bytes());
    panicbuf[4..8].copy_from_slice(&(msgoff as i32).to_le_bytes());
    for (i, (name, value)) in [("rip", 0xffff_ffff_fb85_5d2au64), ("cr2", 0)].iter().enumerate() {
        let at = 8 + i * 24;
        panicbuf[at..at + name.len()].copy_from_slice(name.as_bytes());
        panicbuf[at + 16..at + 24].copy_from_slice(&value.to_le_bytes());
    }
    let message = b"forced crash dump initiated at user request";
    panicbuf[msgoff..msgoff + message.len()].copy_from_slice(message);
    builder.write(PANICBUF_ADDR, &panicbuf);

    // メッセージキュー: q_first -> b_next -> b_next から3件
    let queue = HEAP;
    let first = HEAP + 0x100;
    let second = HEAP + 0x200;
    let node = |i: usize| HEAP + 0x1000 + i as u64 * 0x200;
    builder
        .write_u64(RECENTQ, queue)
        .write_u64(queue + QUEUE_FIRST_OFFSET, first)
        .write(first, &mblk(second, 0, 0, 0))
        .write(second, &mblk(node(0), 0, 0, 0));
    for (i, text) in MESSAGES.iter().enumerate() {
        let n = node(i);
        let next = if i + 1 < MESSAGES.len() { node(i + 1) } else { 0 };
        let ctl = n + 0x40;
        let cont = n + 0x80;
        let data = n + 0xc0;
        builder
            .write(n, &mblk(next, cont, ctl, ctl + 32))
            .write_u64(ctl + 16, 1_529_999_990 + i as u64)
            .write(cont, &mblk(0, 0, data, data + text.len() as u64))
            .write(data, text.as_bytes());
    }

    for (i, name) in TUNABLES.iter().enumerate() {
        let addr = TUNABLE_BASE + i as u64 * 4;
        builder.symbol(name, addr).write_i32(addr, i as i32 + 1);
    }

    builder
}

#[test]
fn test_full_session() {
    let file = crash_dump().write_temp().expect("Failed to write synthetic dump");
    let session = Session::open(file.path(), DecodeConfig::default())
        .expect("Failed to open synthetic dump");

    let summary = session.summary().expect("Failed to summarize");
    println!("{}", summary);
    assert_eq!(summary.hostid, 12345678);
    assert!(summary.to_string().contains("physmem: 2097152 (8G)\n"));

    let header = session.dump_header().to_string();
    assert!(header.starts_with("magic:"));
    assert!(header.contains("(VALID|COMPLETE|CRASH|KERNEL)"));

    let panic = session.panic_record().expect("Failed to decode panic record");
    println!("{}", panic);
    assert_eq!(panic.cpu_id, 1);
    assert_eq!(panic.thread, THREAD);
    assert_eq!(
        panic.message.as_deref(),
        Some("forced crash dump initiated at user request")
    );
    let names: Vec<&str> = panic.pairs.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["rip", "cr2"]);
    assert_eq!(panic.pairs[0].value, 0xffff_ffff_fb85_5d2a);

    let messages: Vec<String> = session
        .messages()
        .expect("Failed to locate message queue")
        .map(|entry| entry.map(|e| e.to_string()))
        .collect::<Result<_, _>>()
        .expect("Failed to read messages");
    assert_eq!(messages, MESSAGES);

    let tunables = session.tunables().expect("Failed to read tunables");
    assert_eq!(tunables.len(), 40);
    assert_eq!(tunables.get("avefree"), Some(1));
    assert_eq!(tunables.get("zfs_arc_max"), Some(40));
}

#[test]
fn test_verbose_messages() {
    let file = crash_dump().write_temp().expect("Failed to write synthetic dump");
    let config = DecodeConfig {
        verbose: true,
        ..Default::default()
    };
    let session = Session::open(file.path(), config).expect("Failed to open synthetic dump");

    let stamps: Vec<Option<i64>> = session
        .messages()
        .expect("Failed to locate message queue")
        .map(|entry| entry.expect("Failed to read message").timestamp())
        .collect();
    assert_eq!(
        stamps,
        [Some(1_529_999_990), Some(1_529_999_991), Some(1_529_999_992)]
    );
}

#[test]
fn test_panic_version_mismatch() {
    let mut builder = crash_dump();
    builder.write_i32(PANICBUF_ADDR, 2);
    let file = builder.write_temp().expect("Failed to write synthetic dump");
    let session = Session::open(file.path(), DecodeConfig::default())
        .expect("Failed to open synthetic dump");

    let panic = session.panic_record().expect("Version mismatch must not fail");
    assert_eq!(panic.version, 2);
    assert_eq!(panic.cpu_id, 1);
    assert!(panic.pairs.is_empty());
    assert_eq!(panic.to_string().lines().count(), 2);
}

#[test]
fn test_bad_magic() {
    let mut bytes = crash_dump().build().expect("Failed to build synthetic dump");
    bytes[0..4].copy_from_slice(&0x7f45_4c46u32.to_le_bytes());
    let file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    std::fs::write(file.path(), &bytes).expect("Failed to write dump");

    match Session::open(file.path(), DecodeConfig::default()) {
        Err(DumpError::NotACrashImage { magic, .. }) => assert_eq!(magic, 0x7f45_4c46),
        Err(e) => panic!("unexpected error {}", e),
        Ok(_) => panic!("bad magic must not open"),
    }
}
