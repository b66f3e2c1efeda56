//! Codec Tests
//!
//! Tests for command, response and event encoding/decoding.

use std::io::Cursor;

use kvwatch::protocol::{
    decode_command, decode_event, decode_response, encode_command, encode_event,
    encode_response, read_command, read_response, write_command, write_response, Command,
    Response, Status,
};
use kvwatch::{marshal, unmarshal, EventKind, KvError, Update, Value, WatchOp};

// =============================================================================
// Command Encoding/Decoding Tests
// =============================================================================

#[test]
fn test_encode_decode_get() {
    let cmd = Command::Get {
        key: "hello".to_string(),
    };
    let decoded = decode_command(&encode_command(&cmd)).unwrap();

    assert_eq!(decoded, cmd);
}

#[test]
fn test_encode_decode_put() {
    let envelope = marshal(&Value::from(vec![1.5f64, 2.5])).unwrap();
    let cmd = Command::Put {
        key: "mykey".to_string(),
        value: envelope,
    };
    let decoded = decode_command(&encode_command(&cmd)).unwrap();

    match decoded {
        Command::Put { key, value } => {
            assert_eq!(key, "mykey");
            assert_eq!(unmarshal(&value).unwrap(), Value::F64Array(vec![1.5, 2.5]));
        }
        _ => panic!("Expected PUT command"),
    }
}

#[test]
fn test_encode_decode_delete() {
    let cmd = Command::Delete {
        key: "todelete".to_string(),
    };
    assert_eq!(decode_command(&encode_command(&cmd)).unwrap(), cmd);
}

#[test]
fn test_encode_decode_ping() {
    let decoded = decode_command(&encode_command(&Command::Ping)).unwrap();
    assert_eq!(decoded, Command::Ping);
}

#[test]
fn test_encode_decode_watch() {
    for op in [WatchOp::All, WatchOp::Put, WatchOp::Delete] {
        let cmd = Command::Watch {
            key: "watched".to_string(),
            op,
        };
        assert_eq!(decode_command(&encode_command(&cmd)).unwrap(), cmd);
    }
}

#[test]
fn test_encode_decode_empty_key() {
    let cmd = Command::Get { key: String::new() };
    assert_eq!(decode_command(&encode_command(&cmd)).unwrap(), cmd);
}

#[test]
fn test_encode_decode_unicode_key() {
    let cmd = Command::Delete {
        key: "clé/ключ/鍵".to_string(),
    };
    assert_eq!(decode_command(&encode_command(&cmd)).unwrap(), cmd);
}

// =============================================================================
// Response Encoding/Decoding Tests
// =============================================================================

#[test]
fn test_encode_decode_response_ok() {
    let resp = Response::ok(Some(b"value".to_vec()));
    let decoded = decode_response(&encode_response(&resp)).unwrap();

    assert_eq!(decoded.status, Status::Ok);
    assert_eq!(decoded.payload, Some(b"value".to_vec()));
}

#[test]
fn test_encode_decode_response_ok_no_payload() {
    let decoded = decode_response(&encode_response(&Response::ok(None))).unwrap();

    assert_eq!(decoded.status, Status::Ok);
    assert_eq!(decoded.payload, None);
}

#[test]
fn test_encode_decode_response_not_found() {
    let decoded = decode_response(&encode_response(&Response::not_found())).unwrap();

    assert_eq!(decoded.status, Status::NotFound);
    assert_eq!(decoded.payload, None);
}

#[test]
fn test_encode_decode_response_error() {
    let resp = Response::error("something went wrong");
    let decoded = decode_response(&encode_response(&resp)).unwrap();

    assert_eq!(decoded.status, Status::Error);
    assert_eq!(decoded.payload, Some(b"something went wrong".to_vec()));
}

#[test]
fn test_response_from_error() {
    let not_found = Response::from_error(&KvError::NotFound("k".to_string()));
    assert_eq!(not_found, Response::not_found());

    let routing = Response::from_error(&KvError::ShardRouting("empty key".to_string()));
    assert_eq!(routing.status, Status::Error);
    assert!(String::from_utf8(routing.payload.unwrap())
        .unwrap()
        .contains("empty key"));
}

// =============================================================================
// Event Tests
// =============================================================================

#[test]
fn test_put_event() {
    let update = Update::put("foo", Value::from("bar"), 7);
    let resp = Response::event(&update).unwrap();
    assert_eq!(resp.status, Status::Event);

    let decoded = decode_response(&encode_response(&resp)).unwrap();
    assert_eq!(decode_event(&decoded.payload.unwrap()).unwrap(), update);
}

#[test]
fn test_delete_event() {
    let update = Update::delete("foo", u64::MAX);
    let payload = encode_event(&update, None);

    // kind (1) + revision (8) + key_len (4) + key
    assert_eq!(payload.len(), 1 + 8 + 4 + 3);
    assert_eq!(payload[0], WatchOp::Delete.code());
    assert_eq!(decode_event(&payload).unwrap(), update);
}

#[test]
fn test_event_wire_format() {
    let update = Update::put("k", Value::from(true), 1);
    let envelope = marshal(update.value.as_ref().unwrap()).unwrap();
    let payload = encode_event(&update, Some(&envelope));

    assert_eq!(payload[0], EventKind::Put.code());
    assert_eq!(&payload[1..9], &1u64.to_be_bytes());
    assert_eq!(&payload[9..13], &[0x00, 0x00, 0x00, 0x01]);
    assert_eq!(payload[13], b'k');
    assert_eq!(&payload[14..], &envelope.encode()[..]);
}

#[test]
fn test_event_rejects_all_kind() {
    let mut payload = encode_event(&Update::delete("k", 1), None);
    payload[0] = WatchOp::All.code();

    assert!(matches!(decode_event(&payload), Err(KvError::Decode(_))));
}

#[test]
fn test_event_too_short() {
    assert!(matches!(
        decode_event(&[0x02, 0x00]),
        Err(KvError::Protocol(_))
    ));
}

#[test]
fn test_delete_event_with_value_bytes_rejected() {
    let mut payload = encode_event(&Update::delete("k", 1), None);
    payload.push(0x01);

    assert!(matches!(decode_event(&payload), Err(KvError::Protocol(_))));
}

// =============================================================================
// Error Handling Tests
// =============================================================================

#[test]
fn test_incomplete_header() {
    let bytes = [0x01, 0x00, 0x00]; // Only 3 bytes, need 5
    let result = decode_command(&bytes);
    assert!(result.unwrap_err().to_string().contains("Incomplete"));
}

#[test]
fn test_incomplete_payload() {
    // Header says 10 bytes payload, but only 5 provided
    let bytes = [0x01, 0x00, 0x00, 0x00, 0x0A, 0x00, 0x00, 0x00, 0x05, 0x68];
    let result = decode_command(&bytes);
    assert!(result.unwrap_err().to_string().contains("Incomplete"));
}

#[test]
fn test_unknown_command_type() {
    let bytes = [0xFF, 0x00, 0x00, 0x00, 0x00]; // Unknown cmd type
    let result = decode_command(&bytes);
    assert!(result.unwrap_err().to_string().contains("Unknown command type"));
}

#[test]
fn test_unknown_response_status() {
    let bytes = [0xFF, 0x00, 0x00, 0x00, 0x00]; // Unknown status
    let result = decode_response(&bytes);
    assert!(result.unwrap_err().to_string().contains("Unknown response status"));
}

#[test]
fn test_unknown_watch_op_is_typed_error() {
    let mut bytes = encode_command(&Command::Watch {
        key: "k".to_string(),
        op: WatchOp::Put,
    });
    let last = bytes.len() - 1;
    bytes[last] = 0x09;

    assert!(matches!(decode_command(&bytes), Err(KvError::Decode(_))));
}

#[test]
fn test_watch_missing_op() {
    // WATCH with key "k" and no op byte
    let bytes = [0x05, 0x00, 0x00, 0x00, 0x05, 0x00, 0x00, 0x00, 0x01, b'k'];
    assert!(matches!(decode_command(&bytes), Err(KvError::Protocol(_))));
}

#[test]
fn test_put_without_envelope() {
    // PUT with key "k" and nothing after it
    let bytes = [0x02, 0x00, 0x00, 0x00, 0x05, 0x00, 0x00, 0x00, 0x01, b'k'];
    assert!(matches!(decode_command(&bytes), Err(KvError::Decode(_))));
}

#[test]
fn test_get_missing_key_length() {
    // GET command with payload too short for key length
    let bytes = [0x01, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00]; // Only 2 bytes payload
    assert!(decode_command(&bytes).is_err());
}

#[test]
fn test_get_trailing_bytes() {
    let bytes = [0x01, 0x00, 0x00, 0x00, 0x06, 0x00, 0x00, 0x00, 0x01, b'k', 0xAA];
    assert!(matches!(decode_command(&bytes), Err(KvError::Protocol(_))));
}

#[test]
fn test_non_utf8_key() {
    let bytes = [0x01, 0x00, 0x00, 0x00, 0x06, 0x00, 0x00, 0x00, 0x02, 0xC3, 0x28];
    let result = decode_command(&bytes);
    assert!(result.unwrap_err().to_string().contains("UTF-8"));
}

#[test]
fn test_ping_with_unexpected_payload() {
    // PING command should have empty payload
    let bytes = [0x04, 0x00, 0x00, 0x00, 0x05, 0x68, 0x65, 0x6C, 0x6C, 0x6F];
    let result = decode_command(&bytes);
    assert!(result.unwrap_err().to_string().contains("unexpected payload"));
}

#[test]
fn test_oversized_frame_rejected_before_reading() {
    let bytes = [0x01, 0xFF, 0xFF, 0xFF, 0xFF];
    let mut cursor = Cursor::new(bytes.to_vec());
    let result = read_command(&mut cursor);
    assert!(result.unwrap_err().to_string().contains("too large"));
}

// =============================================================================
// Stream I/O Tests
// =============================================================================

#[test]
fn test_stream_write_read_command() {
    let cmd = Command::Put {
        key: "key".to_string(),
        value: marshal(&Value::from(5u64)).unwrap(),
    };

    let mut buffer = Vec::new();
    write_command(&mut buffer, &cmd).unwrap();

    let mut cursor = Cursor::new(buffer);
    assert_eq!(read_command(&mut cursor).unwrap(), cmd);
}

#[test]
fn test_stream_multiple_commands() {
    let commands = vec![
        Command::Ping,
        Command::Put {
            key: "k1".to_string(),
            value: marshal(&Value::from("v1")).unwrap(),
        },
        Command::Get {
            key: "k1".to_string(),
        },
        Command::Watch {
            key: "k1".to_string(),
            op: WatchOp::All,
        },
        Command::Delete {
            key: "k1".to_string(),
        },
    ];

    let mut buffer = Vec::new();
    for cmd in &commands {
        write_command(&mut buffer, cmd).unwrap();
    }

    let mut cursor = Cursor::new(buffer);
    for expected in &commands {
        assert_eq!(&read_command(&mut cursor).unwrap(), expected);
    }
}

#[test]
fn test_stream_multiple_responses() {
    let responses = vec![
        Response::ok(Some(b"data".to_vec())),
        Response::not_found(),
        Response::error("oops"),
        Response::event(&Update::delete("gone", 3)).unwrap(),
        Response::ok(None),
    ];

    let mut buffer = Vec::new();
    for resp in &responses {
        write_response(&mut buffer, resp).unwrap();
    }

    let mut cursor = Cursor::new(buffer);
    for expected in &responses {
        assert_eq!(&read_response(&mut cursor).unwrap(), expected);
    }
}

#[test]
fn test_stream_truncated_frame_is_eof() {
    let mut buffer = Vec::new();
    write_response(&mut buffer, &Response::ok(Some(b"payload".to_vec()))).unwrap();
    buffer.truncate(buffer.len() - 2);

    let mut cursor = Cursor::new(buffer);
    match read_response(&mut cursor) {
        Err(KvError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof),
        other => panic!("expected EOF, got {:?}", other),
    }
}

// =============================================================================
// Wire Format Verification Tests
// =============================================================================

#[test]
fn test_wire_format_get() {
    let cmd = Command::Get {
        key: "test".to_string(),
    };
    let encoded = encode_command(&cmd);

    // Expected: [0x01][0x00 0x00 0x00 0x08][0x00 0x00 0x00 0x04][t e s t]
    //           cmd   payload_len(8)       key_len(4)          key
    assert_eq!(encoded[0], 0x01); // GET command
    assert_eq!(&encoded[1..5], &[0x00, 0x00, 0x00, 0x08]); // payload len = 8
    assert_eq!(&encoded[5..9], &[0x00, 0x00, 0x00, 0x04]); // key len = 4
    assert_eq!(&encoded[9..13], b"test");
}

#[test]
fn test_wire_format_watch() {
    let cmd = Command::Watch {
        key: "ab".to_string(),
        op: WatchOp::Delete,
    };
    let encoded = encode_command(&cmd);

    // [0x05][len 7][key_len 2][a b][op 3]
    assert_eq!(
        encoded,
        vec![0x05, 0x00, 0x00, 0x00, 0x07, 0x00, 0x00, 0x00, 0x02, b'a', b'b', 0x03]
    );
}

#[test]
fn test_wire_format_response_ok() {
    let resp = Response::ok(Some(b"hi".to_vec()));
    let encoded = encode_response(&resp);

    // Expected: [0x00][0x00 0x00 0x00 0x02][h i]
    //           status payload_len(2)      payload
    assert_eq!(encoded[0], 0x00); // OK status
    assert_eq!(&encoded[1..5], &[0x00, 0x00, 0x00, 0x02]); // payload len = 2
    assert_eq!(&encoded[5..7], b"hi");
}
