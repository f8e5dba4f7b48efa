//! End-to-end conversations against a scripted radio module

use grfutils_core::device::DeviceList;
use grfutils_core::protocol::{
    FrameParser, GroupId, Message, MockTransport, Payload, ProtocolError, RadioSession,
    TimeoutSplit, ETX, STX,
};
use pretty_assertions::assert_eq;

/// Module side of the handshake
fn handshake(mock: MockTransport) -> MockTransport {
    mock.ack()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .try_init();
}

/// 2 s fits in one wait unit, so every silent unit is a timeout
fn open(mock: &mut MockTransport) -> RadioSession<&mut MockTransport> {
    init_tracing();
    RadioSession::open(mock, 2).unwrap()
}

#[test]
fn test_protocol_error_display() {
    let err = ProtocolError::Timeout;
    assert!(!err.to_string().is_empty());

    let err = ProtocolError::FramingError {
        state: "inside a frame",
        byte: 0x06,
    };
    assert!(err.to_string().contains("0x06"));
}

#[test]
fn test_scan_devices_frame_roundtrip() {
    let bytes = grfutils_core::protocol::Command::ScanDevices { group: "1234" }
        .encode()
        .unwrap();
    let mut parser = FrameParser::new();
    let mut parsed = None;
    for b in bytes {
        if let Some(m) = parser.feed(b).unwrap() {
            parsed = Some(m);
        }
    }
    assert_eq!(
        parsed,
        Some(Message::Payload(Payload::Data("GD:1234".to_string())))
    );
}

#[test]
fn test_scan_groups_finds_group() {
    let mut mock = handshake(MockTransport::new()).ack().frame("5678");
    let group = open(&mut mock).scan_groups().unwrap();
    assert_eq!(group, Some(GroupId::new("5678")));
    assert_eq!(mock.written_payloads(), vec!["01TESTA1", "GA"]);
}

#[test]
fn test_scan_groups_without_group_is_empty() {
    let mut mock = handshake(MockTransport::new()).ack().silence(4);
    let group = open(&mut mock).scan_groups().unwrap();
    assert_eq!(group, None);
}

#[test]
fn test_scan_groups_handshake_timeout() {
    let mut mock = MockTransport::new();
    assert!(matches!(
        open(&mut mock).scan_groups(),
        Err(ProtocolError::Timeout)
    ));
    // Nothing past the handshake was sent
    assert_eq!(mock.written_payloads(), vec!["01TESTA1"]);
}

#[test]
fn test_scan_devices() {
    let mut mock = handshake(MockTransport::new())
        .ack()
        .frame("REC")
        .frame("ab12")
        .frame("cd34")
        .silence(1);
    let devices = open(&mut mock).scan_devices("1234").unwrap();

    assert_eq!(devices.as_slice(), &["ab12".to_string(), "cd34".to_string()]);
    assert_eq!(mock.written_payloads(), vec!["01TESTA1", "GD:1234"]);
}

#[test]
fn test_scan_devices_requires_rec() {
    let mut mock = handshake(MockTransport::new()).ack().frame("ab12");
    assert!(matches!(
        open(&mut mock).scan_devices("1234"),
        Err(ProtocolError::ProtocolMismatch { .. })
    ));
}

#[test]
fn test_scan_devices_capacity_exceeded() {
    let mut mock = handshake(MockTransport::new()).ack().frame("REC");
    for i in 0..=DeviceList::CAPACITY {
        mock = mock.frame(&format!("{:04x}", i));
    }
    let result = open(&mut mock).scan_devices("1234");
    assert!(matches!(
        result,
        Err(ProtocolError::ResourceExhausted { capacity: 40 })
    ));
}

#[test]
fn test_scan_devices_framing_error_aborts() {
    let mut mock = handshake(MockTransport::new())
        .ack()
        .frame("REC")
        .bytes(&[STX, b'a', 0x06, ETX]);
    assert!(matches!(
        open(&mut mock).scan_devices("1234"),
        Err(ProtocolError::FramingError { .. })
    ));
}

/// Module side of a successful read-out with device in diagnosis mode
fn read_out(mock: MockTransport, registers: &[&str]) -> MockTransport {
    let mut mock = handshake(mock)
        // start
        .ack()
        .frame("Done")
        // send data
        .ack();
    for r in registers {
        mock = mock.frame(r);
    }
    mock.silence(1)
        // stop
        .ack()
        .frame("Done")
}

#[test]
fn test_read_data() {
    let mut mock = read_out(
        MockTransport::new(),
        &["0001:0001e240", "0005:23F05A32", "0020:00000010", "0099:00000001"],
    );
    let record = open(&mut mock).read_data("ab12").unwrap();

    assert_eq!(record.id, "ab12");
    assert_eq!(record.serial_number, 123456);
    assert_eq!(record.temperature1, 25.0);
    assert_eq!(record.temperature2, 5.0);
    assert_eq!(record.unknown_register(0x20), Some(0x10));
    assert_eq!(
        mock.written_payloads(),
        vec!["01TESTA1", "DA:ab12:05", "DA:ab12:01", "DA:ab12:04"]
    );
    assert_eq!(mock.remaining(), 0);
}

#[test]
fn test_read_data_enters_diagnosis_after_timeout() {
    let mock = handshake(MockTransport::new())
        // start: device not in diagnosis mode
        .silence(1)
        // diagnosis
        .ack()
        .frame("REC")
        .frame("Done");
    let mut mock = read_out_after_handshake(mock, &["0001:00000001"]);
    let record = open(&mut mock).read_data("ab12").unwrap();

    assert_eq!(record.serial_number, 1);
    assert_eq!(
        mock.written_payloads(),
        vec![
            "01TESTA1",
            "DA:ab12:05",
            "SD:ab12",
            "DA:ab12:05",
            "DA:ab12:01",
            "DA:ab12:04"
        ]
    );
}

/// Like [`read_out`] for a script that already contains the handshake
fn read_out_after_handshake(mock: MockTransport, registers: &[&str]) -> MockTransport {
    let mut mock = mock.ack().frame("Done").ack();
    for r in registers {
        mock = mock.frame(r);
    }
    mock.silence(1).ack().frame("Done")
}

#[test]
fn test_read_data_second_start_timeout_is_fatal() {
    let mut mock = handshake(MockTransport::new())
        .silence(1)
        .ack()
        .frame("REC")
        .frame("Done")
        .silence(1);
    let result = open(&mut mock).read_data("ab12");

    assert!(matches!(result, Err(ProtocolError::Timeout)));
    // Exactly one diagnosis attempt, no further retries
    assert_eq!(
        mock.written_payloads(),
        vec!["01TESTA1", "DA:ab12:05", "SD:ab12", "DA:ab12:05"]
    );
}

#[test]
fn test_read_data_diagnosis_must_complete() {
    let mut mock = handshake(MockTransport::new())
        .silence(1)
        .ack()
        .frame("Done");
    assert!(matches!(
        open(&mut mock).read_data("ab12"),
        Err(ProtocolError::ProtocolMismatch { .. })
    ));
}

#[test]
fn test_read_data_nak_does_not_trigger_diagnosis() {
    let mut mock = handshake(MockTransport::new()).nak();
    assert!(matches!(
        open(&mut mock).read_data("ab12"),
        Err(ProtocolError::ProtocolMismatch { .. })
    ));
    assert_eq!(mock.written_payloads(), vec!["01TESTA1", "DA:ab12:05"]);
}

#[test]
fn test_read_data_malformed_register() {
    let mut mock = read_out(MockTransport::new(), &["0001:0001e240", "garbage"]);
    assert!(matches!(
        open(&mut mock).read_data("ab12"),
        Err(ProtocolError::DecodeError(_))
    ));
}

#[test]
fn test_switch_signal() {
    for (on, code) in [(true, "DA:ab12:03"), (false, "DA:ab12:06")] {
        let mut mock = handshake(MockTransport::new())
            .ack()
            .frame("Done")
            .ack()
            .frame("Done")
            .ack()
            .frame("Done");
        open(&mut mock).switch_signal("ab12", on).unwrap();
        assert_eq!(
            mock.written_payloads(),
            vec!["01TESTA1", "DA:ab12:05", code, "DA:ab12:04"]
        );
    }
}

#[test]
fn test_switch_signal_with_diagnosis_fallback() {
    let mut mock = handshake(MockTransport::new())
        .silence(1)
        .ack()
        .frame("REC")
        .frame("Done")
        .ack()
        .frame("Done")
        .ack()
        .frame("Done")
        .ack()
        .frame("Done");
    open(&mut mock).switch_signal("ab12", true).unwrap();
    assert_eq!(
        mock.written_payloads(),
        vec!["01TESTA1", "DA:ab12:05", "SD:ab12", "DA:ab12:05", "DA:ab12:03", "DA:ab12:04"]
    );
}

#[test]
fn test_transport_failure_surfaces() {
    let mut mock = MockTransport::new().failing_writes();
    assert!(matches!(
        open(&mut mock).query_version(),
        Err(ProtocolError::TransportError(_))
    ));
}

#[test]
fn test_long_timeout_repeats_reads() {
    // 30 s = 150 * 2: one silent unit is not yet a timeout
    let mut mock = handshake(MockTransport::new()).silence(1).frame("GI_RM_V00.70");
    let mut session = RadioSession::open(&mut mock, 30).unwrap();
    assert_eq!(session.timeout_split(), TimeoutSplit { unit: 150, repeats: 2 });
    assert_eq!(session.query_version().unwrap(), "GI_RM_V00.70");
}

#[test]
fn test_scan_devices_ends_at_timeout_answer() {
    let mut mock = handshake(MockTransport::new())
        .ack()
        .frame("REC")
        .frame("ab12")
        .frame("Timeout")
        .frame("cd34");
    let devices = open(&mut mock).scan_devices("1234").unwrap();

    assert_eq!(devices.as_slice(), &["ab12".to_string()]);
    // The id after the module's timeout answer is never read
    assert_eq!(mock.remaining(), 6);
}

#[test]
fn test_read_data_stream_ends_at_timeout_answer() {
    let mut mock = handshake(MockTransport::new())
        .ack()
        .frame("Done")
        .ack()
        .frame("0001:0000002a")
        .frame("Timeout")
        .ack()
        .frame("Done");
    let record = open(&mut mock).read_data("ab12").unwrap();

    assert_eq!(record.serial_number, 42);
    assert_eq!(
        mock.written_payloads(),
        vec!["01TESTA1", "DA:ab12:05", "DA:ab12:01", "DA:ab12:04"]
    );
    assert_eq!(mock.remaining(), 0);
}

/// Module side of a read-out up to the stop command
fn read_out_before_stop(mock: MockTransport) -> MockTransport {
    handshake(mock)
        .ack()
        .frame("Done")
        .ack()
        .frame("0001:0001e240")
        .silence(1)
}

#[test]
fn test_read_data_stop_timeout_discards_record() {
    let mut mock = read_out_before_stop(MockTransport::new()).silence(1);
    let result = open(&mut mock).read_data("ab12");

    assert!(matches!(result, Err(ProtocolError::Timeout)));
    assert_eq!(mock.written_payloads().last().unwrap(), "DA:ab12:04");
}

#[test]
fn test_read_data_stop_nak_discards_record() {
    let mut mock = read_out_before_stop(MockTransport::new()).nak();
    let result = open(&mut mock).read_data("ab12");

    assert!(matches!(result, Err(ProtocolError::ProtocolMismatch { .. })));
}

#[test]
fn test_read_data_stop_without_done_fails() {
    let mut mock = read_out_before_stop(MockTransport::new()).ack().silence(1);
    assert!(matches!(
        open(&mut mock).read_data("ab12"),
        Err(ProtocolError::Timeout)
    ));
}

/// Module side of a signal switch up to the stop command
fn switch_before_stop(mock: MockTransport) -> MockTransport {
    handshake(mock).ack().frame("Done").ack().frame("Done")
}

#[test]
fn test_switch_signal_stop_timeout_fails() {
    let mut mock = switch_before_stop(MockTransport::new()).silence(1);
    assert!(matches!(
        open(&mut mock).switch_signal("ab12", true),
        Err(ProtocolError::Timeout)
    ));
    assert_eq!(
        mock.written_payloads(),
        vec!["01TESTA1", "DA:ab12:05", "DA:ab12:03", "DA:ab12:04"]
    );
}

#[test]
fn test_switch_signal_stop_nak_fails() {
    let mut mock = switch_before_stop(MockTransport::new()).nak();
    assert!(matches!(
        open(&mut mock).switch_signal("ab12", false),
        Err(ProtocolError::ProtocolMismatch { .. })
    ));
}
