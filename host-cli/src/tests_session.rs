use std::time::Duration;

use shared::command::{CALCULATE, GET_NAME_VERSION, LOAD_TOC, PUT};
use shared::error::SharedError;
use shared::oath::{
    EncryptedRecord, NativePacker, OtpKind, RecordPacker, TableOfContents,
    build_calculate_request,
};

use crate::constants::{BLOCKING_READ_TIMEOUT, IDENTIFY_TIMEOUT_SECS};
use crate::test_support::{
    DEMO_KEY, DEMO_NAME, DEMO_SECRET, DEMO_TIME, SimulatedToken, session, totp_request,
};
use crate::transport::memory::MemoryDeviceTransport;

fn seal_demo_record(token: &mut SimulatedToken) -> EncryptedRecord {
    let prepared = totp_request(DEMO_NAME, DEMO_SECRET)
        .prepare(&NativePacker)
        .expect("demo record is valid");
    let layout = *NativePacker.layout();

    let mut session = session(token);
    session
        .load_table_of_contents(&TableOfContents::empty())
        .expect("empty toc loads");
    session.put_record(prepared.packed()).expect("put succeeds");
    let sealed = session
        .get_encrypted_put_result(layout.secure_record_size)
        .expect("sealed record downloads");
    EncryptedRecord::from_bytes(&layout, sealed).expect("sealed record has native size")
}

#[test]
fn identify_reports_oath_app_and_restores_blocking_reads() {
    let mut token = SimulatedToken::new();

    let identity = session(&mut token).identify_app().expect("oath app answers");

    assert!(identity.is_oath_app());
    assert_eq!(identity.name(), "tk1 oath");
    assert_eq!(identity.version, 1);
    assert_eq!(
        token.timeouts,
        vec![Duration::from_secs(IDENTIFY_TIMEOUT_SECS), BLOCKING_READ_TIMEOUT]
    );
}

#[test]
fn identify_honours_configured_timeout() {
    let mut token = SimulatedToken::new();

    session(&mut token)
        .with_identify_timeout(Duration::from_millis(250))
        .identify_app()
        .expect("oath app answers");

    assert_eq!(token.timeouts[0], Duration::from_millis(250));
}

#[test]
fn foreign_app_is_not_ready() {
    let mut token = SimulatedToken::running_app(b"tk1 sign");

    let err = session(&mut token).identify_app().unwrap_err();

    assert!(
        matches!(&err, SharedError::UnexpectedAppIdentity { name } if name == "tk1 sign"),
        "unexpected error: {err:?}"
    );
    assert!(err.is_not_ready());
    assert_eq!(token.timeouts.last(), Some(&BLOCKING_READ_TIMEOUT));
}

#[test]
fn silent_token_is_not_ready_and_timeout_is_restored() {
    let mut token = SimulatedToken::silent();

    let err = session(&mut token).identify_app().unwrap_err();

    assert!(matches!(err, SharedError::Eof(_)), "unexpected error: {err:?}");
    assert!(err.is_not_ready());
    assert_eq!(token.count_of(&GET_NAME_VERSION.request), 1);
    assert_eq!(token.timeouts.len(), 2);
    assert_eq!(token.timeouts[1], BLOCKING_READ_TIMEOUT);
}

#[test]
fn empty_toc_can_be_loaded_repeatedly() {
    let mut token = SimulatedToken::new();
    {
        let mut session = session(&mut token);
        session
            .load_table_of_contents(&TableOfContents::empty())
            .expect("first load");
        session
            .load_table_of_contents(&TableOfContents::empty())
            .expect("second load");
        let list = session.get_record_list().expect("list downloads");
        assert!(list.is_empty());
    }
    assert_eq!(token.count_of(&LOAD_TOC.request), 2);
    assert_eq!(token.descriptor_count(), 0);
}

#[test]
fn device_refuses_calculate_before_toc_is_loaded() {
    let mut token = SimulatedToken::new();
    let request = vec![0u8; NativePacker.layout().calculate_request_size];

    let err = session(&mut token).calculate(&request).unwrap_err();

    assert!(matches!(err, SharedError::StatusNotOk { .. }), "unexpected error: {err:?}");
    assert_eq!(token.count_of(&CALCULATE.request), 1);
}

#[test]
fn calculate_with_wrong_size_sends_nothing() {
    let mut token = SimulatedToken::new();

    let err = session(&mut token).calculate(&[0u8; 120]).unwrap_err();

    assert!(matches!(
        err,
        SharedError::RecordSizeMismatch {
            expected: 121,
            actual: 120
        }
    ));
    assert_eq!(token.frames_received(), 0);
}

#[test]
fn put_with_wrong_size_sends_nothing() {
    let mut token = SimulatedToken::new();

    let err = session(&mut token).put_record(&[0u8; 77]).unwrap_err();

    assert!(matches!(err, SharedError::RecordSizeMismatch { expected: 142, .. }));
    assert_eq!(token.frames_received(), 0);
}

#[test]
fn put_returns_sealed_record_with_clear_metadata() {
    let mut token = SimulatedToken::new();

    let sealed = seal_demo_record(&mut token);

    let metadata = sealed.metadata().expect("native record carries metadata");
    assert_eq!(metadata.kind, OtpKind::Totp);
    assert_eq!(metadata.moving_factor, 30);
    assert_eq!(metadata.digits, 6);
    assert!(!metadata.needs_touch);
    assert_eq!(token.count_of(&PUT.request), 2);
    assert_eq!(token.descriptor_count(), 1);
}

#[test]
fn sealed_toc_reloads_and_lists_new_record() {
    let mut token = SimulatedToken::new();
    let sealed = seal_demo_record(&mut token);

    let mut session = session(&mut token);
    let request = build_calculate_request(&NativePacker, sealed.as_bytes(), DEMO_TIME)
        .expect("calculate request packs");
    let code = session.calculate(&request).expect("code calculated");
    assert_eq!(code, SimulatedToken::expected_code(DEMO_KEY, DEMO_TIME / 30, 6));

    let toc = session
        .get_encrypted_table_of_contents()
        .expect("toc downloads");
    assert_eq!(toc.descriptor_count(), 1);
    assert_eq!(toc.as_bytes().len(), 42 + 65);

    session.load_table_of_contents(&toc).expect("sealed toc loads");
    let list = session.get_record_list().expect("list downloads");
    assert_eq!(list.len(), 1);
    assert_eq!(list.descriptors()[0].display_name(), DEMO_NAME);
}

#[test]
fn tampered_record_fails_to_calculate() {
    let mut token = SimulatedToken::new();
    let sealed = seal_demo_record(&mut token);
    let mut bytes = sealed.as_bytes().to_vec();
    bytes[3] ^= 0x01;

    let request = build_calculate_request(&NativePacker, &bytes, DEMO_TIME)
        .expect("calculate request packs");
    let err = session(&mut token).calculate(&request).unwrap_err();

    assert!(matches!(err, SharedError::CalculateFailed));
}

#[test]
fn timeout_after_identification_is_a_transport_failure() {
    let mut transport = MemoryDeviceTransport::new();
    let mut identity = b"tk1 oath".to_vec();
    identity.extend_from_slice(&1u32.to_le_bytes());
    transport.queue_response(&GET_NAME_VERSION.response, &identity);
    let request = vec![0u8; NativePacker.layout().calculate_request_size];

    let err = {
        let mut session = session(&mut transport);
        session.identify_app().expect("oath app answers");
        session.calculate(&request).unwrap_err()
    };

    assert!(
        matches!(err, SharedError::NoReply { command: "CalculateResponse" }),
        "unexpected error: {err:?}"
    );
    assert!(!err.is_not_ready());
    assert_eq!(err.exit_code(), 3);
    assert_eq!(transport.written_frames().len(), 2);
}
