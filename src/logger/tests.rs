use core::cell::Cell;

use super::*;
use crate::config::{LineEnding, MissingMediumPolicy};
use crate::fs::{CardType, MemStorage};

const FIRST_FILE: &str = "/SET0000/0000001.CSV";

fn config() -> LoggerConfig {
    LoggerConfig::headless()
}

fn ready(storage: MemStorage) -> CsvLogger<MemStorage> {
    let mut logger = CsvLogger::new(storage, config());
    logger.begin(5).unwrap();
    logger
}

fn logging() -> CsvLogger<MemStorage> {
    let mut logger = ready(MemStorage::new());
    logger.start_logging().unwrap();
    logger
}

fn contents<'a, C: Clock>(logger: &'a CsvLogger<MemStorage, C>, path: &str) -> &'a str {
    let bytes = logger.storage().file_contents(path).unwrap();
    core::str::from_utf8(bytes).unwrap()
}

// ==================== begin ====================

#[test]
fn test_begin_on_empty_medium_creates_set0000() {
    let logger = ready(MemStorage::new());

    assert_eq!(logger.state(), LoggerState::Mounted);
    assert_eq!(logger.target_dir(), Some("/SET0000"));
    assert!(logger.storage().is_dir("/SET0000"));
    assert!(!logger.is_logging_enabled());
}

#[test]
fn test_begin_continues_after_highest_directory() {
    let mut storage = MemStorage::new();
    for dir in ["/SET0000", "/SET0003", "/MUSIC", "/SET0001"] {
        storage.add_dir(dir).unwrap();
    }
    storage.add_file("/SET0009", b"").unwrap();

    let logger = ready(storage);
    assert_eq!(logger.target_dir(), Some("/SET0004"));
}

#[test]
fn test_begin_passes_chip_select() {
    let mut logger = CsvLogger::new(MemStorage::new(), config());
    logger.begin(13).unwrap();
    assert_eq!(logger.storage().last_chip_select(), Some(13));
}

#[test]
fn test_begin_without_medium_fails_with_mount() {
    let mut logger = CsvLogger::new(MemStorage::absent(), config());

    assert_eq!(logger.begin(5), Err(LoggerError::Mount));
    assert_eq!(logger.state(), LoggerState::Uninitialized);
    assert_eq!(logger.target_dir(), None);
}

#[test]
fn test_begin_unreadable_root_fails_with_mount() {
    let mut storage = MemStorage::new();
    storage.set_fail_read_root(true);
    let mut logger = CsvLogger::new(storage, config());

    assert_eq!(logger.begin(5), Err(LoggerError::Mount));
}

#[test]
fn test_begin_directory_create_failure() {
    let mut storage = MemStorage::new();
    storage.set_fail_create_dir(true);
    let mut logger = CsvLogger::new(storage, config());

    assert_eq!(logger.begin(5), Err(LoggerError::DirectoryCreate));
    assert_eq!(logger.state(), LoggerState::Uninitialized);
    assert_eq!(logger.start_logging(), Err(LoggerError::InvalidState));
}

#[test]
fn test_begin_twice_creates_next_directory() {
    let mut logger = ready(MemStorage::new());
    logger.begin(5).unwrap();

    assert_eq!(logger.target_dir(), Some("/SET0001"));
    assert!(logger.storage().is_dir("/SET0000"));
    assert!(logger.storage().is_dir("/SET0001"));
}

#[test]
fn test_begin_while_logging_is_rejected() {
    let mut logger = logging();

    assert_eq!(logger.begin(5), Err(LoggerError::InvalidState));
    assert!(logger.is_logging_enabled());
    assert_eq!(logger.target_dir(), Some("/SET0000"));
}

// ==================== 缺卡停机 ====================

#[test]
fn test_missing_medium_with_diagnostics_halts() {
    let storage = MemStorage::new().with_card_type(CardType::None);
    let mut logger = CsvLogger::new(storage, LoggerConfig::new());

    assert_eq!(logger.begin(5), Err(LoggerError::Halted));
    assert_eq!(logger.state(), LoggerState::Halted);
    // 目录在诊断之前已经创建，不回滚
    assert!(logger.storage().is_dir("/SET0000"));

    assert_eq!(logger.start_logging(), Err(LoggerError::Halted));
    assert_eq!(logger.add_text("x"), Err(LoggerError::Halted));
    assert_eq!(logger.end_logging(), Err(LoggerError::Halted));
    assert_eq!(logger.begin(5), Err(LoggerError::Halted));
}

#[test]
fn test_missing_medium_continue_policy() {
    let storage = MemStorage::new().with_card_type(CardType::None);
    let config = LoggerConfig::new().with_missing_medium(MissingMediumPolicy::Continue);
    let mut logger = CsvLogger::new(storage, config);

    assert_eq!(logger.begin(5), Ok(()));
    assert_eq!(logger.state(), LoggerState::Mounted);
}

#[test]
fn test_missing_medium_without_diagnostics_does_not_halt() {
    let storage = MemStorage::new().with_card_type(CardType::None);
    let config = LoggerConfig::new().with_diagnostics(false);
    let mut logger = CsvLogger::new(storage, config);

    assert_eq!(logger.begin(5), Ok(()));
}

#[test]
fn test_diagnostics_report_on_known_medium() {
    let storage = MemStorage::new().with_card_type(CardType::Sdsc);
    let mut logger = CsvLogger::new(storage, LoggerConfig::new().with_timestamps(true));

    assert_eq!(logger.begin(5), Ok(()));
    assert_eq!(logger.target_dir(), Some("/SET0000"));
}

// ==================== 会话 ====================

#[test]
fn test_start_and_end_logging() {
    let mut logger = ready(MemStorage::new());

    logger.start_logging().unwrap();
    assert!(logger.is_logging_enabled());
    assert_eq!(logger.state(), LoggerState::Logging);
    assert_eq!(logger.current_file_path().unwrap().as_str(), FIRST_FILE);
    assert_eq!(logger.storage().open_file_count(), 1);

    logger.end_logging().unwrap();
    assert!(!logger.is_logging_enabled());
    assert_eq!(logger.state(), LoggerState::Mounted);
    assert_eq!(logger.current_file_path(), None);
    assert_eq!(logger.storage().open_file_count(), 0);
    assert_eq!(logger.file_sequence(), 2);
}

#[test]
fn test_start_before_begin_is_invalid() {
    let mut logger = CsvLogger::new(MemStorage::new(), config());

    assert_eq!(logger.start_logging(), Err(LoggerError::InvalidState));
    assert_eq!(logger.storage().file_count(), 0);
}

#[test]
fn test_end_without_start_fails_and_keeps_state() {
    let mut logger = ready(MemStorage::new());

    assert_eq!(logger.end_logging(), Err(LoggerError::InvalidState));
    assert_eq!(logger.state(), LoggerState::Mounted);
    assert_eq!(logger.file_sequence(), 1);
}

#[test]
fn test_start_while_logging_keeps_current_file() {
    let mut logger = logging();
    logger.add_text("first").unwrap();

    assert_eq!(logger.start_logging(), Ok(()));
    logger.add_text("second").unwrap();
    logger.end_logging().unwrap();

    assert_eq!(logger.storage().file_count(), 1);
    assert_eq!(contents(&logger, FIRST_FILE), "first, second");
}

#[test]
fn test_file_open_failure() {
    let mut logger = ready(MemStorage::new());
    logger.storage_mut().set_fail_open(true);

    assert_eq!(logger.start_logging(), Err(LoggerError::FileOpen));
    assert_eq!(logger.state(), LoggerState::Mounted);
    assert_eq!(logger.file_sequence(), 1);

    logger.storage_mut().set_fail_open(false);
    logger.start_logging().unwrap();
    assert_eq!(logger.current_file_path().unwrap().as_str(), FIRST_FILE);
}

#[test]
fn test_file_sequence_advances_once_per_session() {
    let mut logger = ready(MemStorage::new());

    logger.start_logging().unwrap();
    for i in 0..10 {
        logger.add_value(i as f32).unwrap();
    }
    logger.end_logging().unwrap();

    logger.start_logging().unwrap();
    assert_eq!(logger.current_file_path().unwrap().as_str(), "/SET0000/0000002.CSV");
    logger.end_logging().unwrap();

    logger.start_logging().unwrap();
    logger.end_logging().unwrap();

    assert_eq!(logger.file_sequence(), 4);
    assert!(logger.storage().file_contents("/SET0000/0000003.CSV").is_some());
}

// ==================== 追加字段 ====================

#[test]
fn test_appends_before_start_fail_without_output() {
    let mut logger = ready(MemStorage::new());

    assert_eq!(logger.add_line_break(), Err(LoggerError::InvalidState));
    assert_eq!(logger.add_value(1.0), Err(LoggerError::InvalidState));
    assert_eq!(logger.add_value_with_precision(1.0, 2), Err(LoggerError::InvalidState));
    assert_eq!(logger.add_text("a"), Err(LoggerError::InvalidState));
    assert_eq!(logger.add_text_bytes(b"abc", 3), Err(LoggerError::InvalidState));
    assert_eq!(logger.add_display(42), Err(LoggerError::InvalidState));
    assert_eq!(logger.storage().file_count(), 0);
}

#[test]
fn test_appends_before_begin_fail() {
    let mut logger = CsvLogger::new(MemStorage::new(), config());
    assert_eq!(logger.add_text("a"), Err(LoggerError::InvalidState));
}

#[test]
fn test_documented_session_scenario() {
    let mut logger = logging();

    logger.add_value_with_precision(1.23, 2).unwrap();
    logger.add_value(4.0).unwrap();
    logger.add_line_break().unwrap();
    logger.end_logging().unwrap();

    assert_eq!(contents(&logger, FIRST_FILE), "  1.23, 4.00\n");
}

#[test]
fn test_separator_placement_across_lines() {
    let mut logger = logging();

    logger.add_text("time").unwrap();
    logger.add_text("temp").unwrap();
    logger.add_text("rh").unwrap();
    logger.add_line_break().unwrap();
    logger.add_value(1.0).unwrap();
    logger.add_value_with_precision(21.5, 1).unwrap();
    logger.add_value(40.0).unwrap();
    logger.add_line_break().unwrap();
    logger.add_line_break().unwrap();
    logger.add_text("end").unwrap();
    logger.end_logging().unwrap();

    assert_eq!(
        contents(&logger, FIRST_FILE),
        "time, temp, rh\n1.00,  21.5, 40.00\n\nend"
    );
}

#[test]
fn test_every_field_shape_clears_new_line() {
    let mut logger = logging();

    logger.add_value(1.0).unwrap();
    logger.add_value(2.0).unwrap();
    logger.add_line_break().unwrap();
    logger.add_text("a").unwrap();
    logger.add_text_bytes(b"b", 1).unwrap();
    logger.add_display('c').unwrap();
    logger.add_line_break().unwrap();
    logger.end_logging().unwrap();

    assert_eq!(contents(&logger, FIRST_FILE), "1.00, 2.00\na, b, c\n");
}

#[test]
fn test_text_is_written_verbatim() {
    let mut logger = logging();

    logger.add_text("a,\"b\"").unwrap();
    logger.add_text("").unwrap();
    logger.add_text("multi\nline").unwrap();
    logger.end_logging().unwrap();

    assert_eq!(contents(&logger, FIRST_FILE), "a,\"b\", , multi\nline");
}

#[test]
fn test_text_bytes_respects_length() {
    let mut logger = logging();

    logger.add_text_bytes(b"sensor-17", 6).unwrap();
    logger.add_text_bytes(b"ok", 10).unwrap();
    logger.add_text_bytes(b"skipped", 0).unwrap();
    logger.end_logging().unwrap();

    assert_eq!(contents(&logger, FIRST_FILE), "sensor, ok, ");
}

#[test]
fn test_add_display_formats_dynamic_values() {
    let mut logger = logging();

    logger.add_display(format_args!("{}-{:03}", "run", 7)).unwrap();
    logger.add_display(-12i32).unwrap();
    logger.end_logging().unwrap();

    assert_eq!(contents(&logger, FIRST_FILE), "run-007, -12");
}

#[test]
fn test_windows_line_endings() {
    let mut logger = CsvLogger::new(
        MemStorage::new(),
        config().with_line_ending(LineEnding::Windows),
    );
    logger.begin(5).unwrap();
    logger.start_logging().unwrap();

    logger.add_value(1.5).unwrap();
    logger.add_line_break().unwrap();
    logger.add_value(2.5).unwrap();
    logger.add_line_break().unwrap();
    logger.end_logging().unwrap();

    assert_eq!(contents(&logger, FIRST_FILE), "1.50\r\n2.50\r\n");
}

#[test]
fn test_format_overflow_writes_nothing() {
    let mut logger = logging();
    logger.add_text("a").unwrap();

    assert_eq!(logger.add_value_with_precision(1.0, 200), Err(LoggerError::Format));
    logger.add_text("b").unwrap();
    logger.end_logging().unwrap();

    assert_eq!(contents(&logger, FIRST_FILE), "a, b");
}

#[test]
fn test_write_failure_is_reported() {
    let mut logger = ready(MemStorage::new().with_capacity(6));
    logger.start_logging().unwrap();

    logger.add_value(1.0).unwrap();
    assert_eq!(logger.add_value(2.0), Err(LoggerError::Write(FsError::NoSpace)));
    assert!(logger.is_logging_enabled());
    logger.end_logging().unwrap();
}

#[test]
fn test_failed_field_leaves_no_separator_behind() {
    let mut logger = ready(MemStorage::new().with_capacity(6));
    logger.start_logging().unwrap();

    logger.add_value(1.0).unwrap();
    assert_eq!(logger.add_value(2.0), Err(LoggerError::Write(FsError::NoSpace)));
    assert_eq!(contents(&logger, FIRST_FILE), "1.00");

    logger.add_line_break().unwrap();
    assert_eq!(contents(&logger, FIRST_FILE), "1.00\n");
}

#[test]
fn test_failed_first_field_keeps_line_start() {
    let mut logger = ready(MemStorage::new().with_capacity(3));
    logger.start_logging().unwrap();

    assert_eq!(logger.add_value(1.0), Err(LoggerError::Write(FsError::NoSpace)));
    logger.add_text("ab").unwrap();
    assert_eq!(contents(&logger, FIRST_FILE), "ab");
}

#[test]
fn test_long_text_is_streamed() {
    let mut logger = logging();
    let long = [b'x'; RECORD_CAP + 10];

    logger.add_text("a").unwrap();
    logger.add_text_bytes(&long, long.len()).unwrap();
    logger.end_logging().unwrap();

    let written = contents(&logger, FIRST_FILE);
    assert!(written.starts_with("a, xxx"));
    assert_eq!(written.len(), 3 + RECORD_CAP + 10);
}

/// 格式化时总是失败的值
struct Unprintable;

impl fmt::Display for Unprintable {
    fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Err(fmt::Error)
    }
}

/// 输出 `len` 个 `#`
struct Filler(usize);

impl fmt::Display for Filler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for _ in 0..self.0 {
            f.write_str("#")?;
        }
        Ok(())
    }
}

#[test]
fn test_add_display_format_error() {
    let mut logger = logging();

    logger.add_text("a").unwrap();
    assert_eq!(logger.add_display(Unprintable), Err(LoggerError::Format));
    logger.add_text("b").unwrap();
    logger.end_logging().unwrap();

    assert_eq!(contents(&logger, FIRST_FILE), "a, b");
}

#[test]
fn test_add_display_write_error() {
    let mut logger = ready(MemStorage::new().with_capacity(4));
    logger.start_logging().unwrap();

    assert_eq!(logger.add_display(12345u32), Err(LoggerError::Write(FsError::NoSpace)));
    assert_eq!(contents(&logger, FIRST_FILE), "");
}

#[test]
fn test_add_display_streams_long_values() {
    let mut logger = logging();

    logger.add_text("a").unwrap();
    logger.add_display(Filler(RECORD_CAP * 2)).unwrap();
    logger.end_logging().unwrap();

    let written = contents(&logger, FIRST_FILE);
    assert!(written.starts_with("a, ##"));
    assert_eq!(written.len(), 3 + RECORD_CAP * 2);
}

#[test]
fn test_add_display_streaming_write_error() {
    let mut logger = ready(MemStorage::new().with_capacity(RECORD_CAP as u64));
    logger.start_logging().unwrap();

    assert_eq!(
        logger.add_display(Filler(RECORD_CAP * 2)),
        Err(LoggerError::Write(FsError::NoSpace))
    );
    assert!(logger.is_logging_enabled());
}

#[test]
fn test_new_session_starts_on_fresh_line() {
    let mut logger = logging();
    logger.add_text("a").unwrap();
    logger.end_logging().unwrap();

    logger.start_logging().unwrap();
    logger.add_text("b").unwrap();
    logger.end_logging().unwrap();

    assert_eq!(contents(&logger, "/SET0000/0000002.CSV"), "b");
}

// ==================== 时间戳 ====================

#[test]
fn test_timestamps_prefix_each_line() {
    let now = Cell::new(1_000u64);
    let clock = FnClock(|| now.get());
    let mut logger = CsvLogger::with_clock(MemStorage::new(), clock, config().with_timestamps(true));
    logger.begin(5).unwrap();
    logger.start_logging().unwrap();

    now.set(1_250);
    logger.add_value(1.0).unwrap();
    logger.add_value(2.0).unwrap();
    logger.add_line_break().unwrap();
    now.set(2_000);
    logger.add_text("x").unwrap();
    logger.add_line_break().unwrap();
    logger.end_logging().unwrap();

    assert_eq!(contents(&logger, FIRST_FILE), "250, 1.00, 2.00\n1000, x\n");
}

#[test]
fn test_timestamps_restart_per_session() {
    let now = Cell::new(0u64);
    let clock = FnClock(|| now.get());
    let mut logger = CsvLogger::with_clock(MemStorage::new(), clock, config().with_timestamps(true));
    logger.begin(5).unwrap();

    logger.start_logging().unwrap();
    logger.end_logging().unwrap();

    now.set(5_000);
    logger.start_logging().unwrap();
    now.set(5_010);
    logger.add_text("y").unwrap();
    logger.end_logging().unwrap();

    assert_eq!(contents(&logger, "/SET0000/0000002.CSV"), "10, y");
}

// ==================== 其他 ====================

#[test]
fn test_drop_closes_open_file() {
    let mut storage = MemStorage::new();
    {
        let mut logger = CsvLogger::new(&mut storage, config());
        logger.begin(5).unwrap();
        logger.start_logging().unwrap();
        logger.add_text("unfinished").unwrap();
        assert_eq!(logger.storage().open_file_count(), 1);
    }

    assert_eq!(storage.open_file_count(), 0);
    assert_eq!(storage.file_contents(FIRST_FILE), Some(&b"unfinished"[..]));
}

#[test]
fn test_error_display() {
    let mut text = heapless::String::<64>::new();
    write!(text, "{}", LoggerError::Write(FsError::NoSpace)).unwrap();
    assert_eq!(text.as_str(), "Write error: No space");
}
