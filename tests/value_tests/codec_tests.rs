//! Value Codec Tests
//!
//! Tests verify:
//! - Every kind survives marshal/unmarshal
//! - Narrow integers widen on the way in and narrow on the way out
//! - Typed decoding rejects other kinds
//! - Unknown tags and malformed payloads are decode errors
//! - Kind names and text parsing

use kvwatch::value::{FromValue, MAX_PAYLOAD_SIZE};
use kvwatch::{marshal, unmarshal, unmarshal_typed, Envelope, KvError, Value, ValueKind};

// =============================================================================
// Helper Functions
// =============================================================================

fn through_envelope(value: &Value) -> Value {
    let envelope = marshal(value).unwrap();
    let decoded = Envelope::decode(&envelope.encode()).unwrap();
    unmarshal(&decoded).unwrap()
}

fn typed<T: FromValue>(value: impl Into<Value>) -> kvwatch::Result<T> {
    unmarshal_typed(&marshal(&value.into()).unwrap())
}

// =============================================================================
// Marshal/Unmarshal Tests
// =============================================================================

#[test]
fn test_int32_envelope() {
    let envelope = marshal(&Value::from(42i32)).unwrap();

    assert_eq!(envelope.tag(), ValueKind::I32.tag());
    assert_eq!(envelope.kind().unwrap(), ValueKind::I32);
    assert_eq!(envelope.payload(), &42i32.to_le_bytes());
    assert_eq!(unmarshal(&envelope).unwrap(), Value::I32(42));
    assert_eq!(unmarshal_typed::<i32>(&envelope).unwrap(), 42);
}

#[test]
fn test_int64_array_envelope() {
    let fib = vec![0i64, 1, 1, 2, 3, 5, 8, 13];
    let envelope = marshal(&Value::from(fib.clone())).unwrap();

    assert_eq!(envelope.kind().unwrap(), ValueKind::I64Array);
    assert_eq!(unmarshal_typed::<Vec<i64>>(&envelope).unwrap(), fib);
}

#[test]
fn test_every_kind_survives_the_envelope() {
    let values = vec![
        Value::from("hello"),
        Value::from(String::new()),
        Value::from(&b"\x00\xffraw"[..]),
        Value::from(true),
        Value::from(i32::MIN),
        Value::from(i64::MAX),
        Value::from(u32::MAX),
        Value::from(u64::MAX),
        Value::from(1.5f32),
        Value::from(-2.25f64),
        Value::from(vec!["a".to_string(), String::new(), "ç".to_string()]),
        Value::from(vec![-1i32, 0, 1]),
        Value::from(Vec::<i64>::new()),
        Value::from(vec![0.5f32, -0.5]),
        Value::from(vec![f64::MAX, f64::MIN_POSITIVE]),
    ];

    for value in &values {
        assert_eq!(&through_envelope(value), value);
    }

    let mut kinds: Vec<_> = values.iter().map(Value::kind).collect();
    kinds.dedup();
    assert_eq!(kinds, ValueKind::ALL.to_vec());
}

// =============================================================================
// Width Canonicalization Tests
// =============================================================================

#[test]
fn test_narrow_integers_widen() {
    assert_eq!(Value::from(-5i8), Value::I32(-5));
    assert_eq!(Value::from(300i16), Value::I32(300));
    assert_eq!(Value::from(-7isize), Value::I64(-7));
    assert_eq!(Value::from(200u8), Value::U32(200));
    assert_eq!(Value::from(60000u16), Value::U32(60000));
    assert_eq!(Value::from(9usize), Value::U64(9));
}

#[test]
fn test_narrow_integers_round_trip() {
    assert_eq!(typed::<i8>(-5i8).unwrap(), -5);
    assert_eq!(typed::<i16>(-300i16).unwrap(), -300);
    assert_eq!(typed::<isize>(isize::MIN).unwrap(), isize::MIN);
    assert_eq!(typed::<u8>(255u8).unwrap(), 255);
    assert_eq!(typed::<u16>(65535u16).unwrap(), 65535);
    assert_eq!(typed::<usize>(12usize).unwrap(), 12);
}

#[test]
fn test_narrowing_truncates() {
    // 300 does not fit in an i8; the low byte survives
    assert_eq!(typed::<i8>(300i32).unwrap(), 300i32 as i8);
    assert_eq!(typed::<u8>(256u32).unwrap(), 0);
}

// =============================================================================
// Type Mismatch Tests
// =============================================================================

#[test]
fn test_typed_decode_rejects_other_kind() {
    let err = typed::<i64>(42i32).unwrap_err();
    assert!(matches!(
        err,
        KvError::TypeMismatch {
            expected: ValueKind::I64,
            found: ValueKind::I32
        }
    ));

    assert!(matches!(
        typed::<String>(vec![1i32]),
        Err(KvError::TypeMismatch { .. })
    ));
    assert!(matches!(
        typed::<u32>(-1i32),
        Err(KvError::TypeMismatch { .. })
    ));
}

#[test]
fn test_mismatch_reported_before_payload_is_read() {
    // The payload is garbage for any kind, but the tag already disagrees
    let envelope = Envelope::new(ValueKind::String.tag(), vec![0xde, 0xad]);

    assert!(matches!(
        unmarshal_typed::<bool>(&envelope),
        Err(KvError::TypeMismatch { .. })
    ));
}

// =============================================================================
// Decode Error Tests
// =============================================================================

#[test]
fn test_unknown_tag_is_decode_error() {
    for tag in [0u8, 15, 0xff] {
        let envelope = Envelope::new(tag, vec![0u8; 4]);
        assert!(matches!(unmarshal(&envelope), Err(KvError::Decode(_))));
        assert!(matches!(
            unmarshal_typed::<i32>(&envelope),
            Err(KvError::Decode(_))
        ));
    }
}

#[test]
fn test_short_payload_is_decode_error() {
    let envelope = Envelope::new(ValueKind::I64.tag(), vec![1, 2, 3]);
    assert!(matches!(unmarshal(&envelope), Err(KvError::Decode(_))));
}

#[test]
fn test_trailing_bytes_are_decode_error() {
    let mut payload = 7i32.to_le_bytes().to_vec();
    payload.push(0);
    let envelope = Envelope::new(ValueKind::I32.tag(), payload);

    assert!(matches!(unmarshal(&envelope), Err(KvError::Decode(_))));
}

#[test]
fn test_invalid_bool_is_decode_error() {
    let envelope = Envelope::new(ValueKind::Bool.tag(), vec![2]);
    assert!(matches!(unmarshal(&envelope), Err(KvError::Decode(_))));
}

#[test]
fn test_invalid_utf8_is_decode_error() {
    let mut payload = 2u64.to_le_bytes().to_vec();
    payload.extend_from_slice(&[0xc3, 0x28]);
    let envelope = Envelope::new(ValueKind::String.tag(), payload);

    assert!(matches!(unmarshal(&envelope), Err(KvError::Decode(_))));
}

#[test]
fn test_oversized_length_prefix_is_decode_error() {
    // Claims more elements than the size limit allows
    let payload = (MAX_PAYLOAD_SIZE * 2).to_le_bytes().to_vec();
    let envelope = Envelope::new(ValueKind::Bytes.tag(), payload);

    assert!(matches!(unmarshal(&envelope), Err(KvError::Decode(_))));
}

#[test]
fn test_empty_envelope_is_decode_error() {
    assert!(matches!(Envelope::decode(&[]), Err(KvError::Decode(_))));
}

// =============================================================================
// Kind Names and Parsing Tests
// =============================================================================

#[test]
fn test_kind_names_round_trip() {
    for kind in ValueKind::ALL {
        assert_eq!(kind.name().parse::<ValueKind>().unwrap(), kind);
        assert_eq!(ValueKind::try_from(kind.tag()).unwrap(), kind);
    }
    assert_eq!("int".parse::<ValueKind>().unwrap(), ValueKind::I64);
    assert_eq!("Double".parse::<ValueKind>().unwrap(), ValueKind::F64);
}

#[test]
fn test_unknown_kind_name_is_unsupported() {
    let err = "complex128".parse::<ValueKind>().unwrap_err();
    assert!(matches!(err, KvError::UnsupportedType(ref name) if name == "complex128"));
}

#[test]
fn test_parse_values() {
    assert_eq!(
        Value::parse(ValueKind::I32, " 42 ").unwrap(),
        Value::I32(42)
    );
    assert_eq!(
        Value::parse(ValueKind::Bool, "true").unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        Value::parse(ValueKind::I64Array, "0,1,1,2,3").unwrap(),
        Value::I64Array(vec![0, 1, 1, 2, 3])
    );
    assert_eq!(
        Value::parse(ValueKind::F64Array, "").unwrap(),
        Value::F64Array(vec![])
    );
    assert_eq!(
        Value::parse(ValueKind::Bytes, "ab").unwrap(),
        Value::Bytes(b"ab".to_vec())
    );
}

#[test]
fn test_parse_rejects_bad_text() {
    assert!(matches!(
        Value::parse(ValueKind::U32, "-1"),
        Err(KvError::Parse(_))
    ));
    assert!(matches!(
        Value::parse(ValueKind::I32Array, "1,x,3"),
        Err(KvError::Parse(_))
    ));
}

#[test]
fn test_display() {
    assert_eq!(Value::from(&[0x0au8, 0xff][..]).to_string(), "0x0aff");
    assert_eq!(Value::from("plain").to_string(), "plain");
    assert_eq!(ValueKind::StringArray.to_string(), "string[]");
}
