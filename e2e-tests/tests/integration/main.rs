//! End-to-end tests for `schnorr-host` running the stand-in guest module.

use std::{
    sync::{Arc, Once},
    thread,
};

use assert_matches::assert_matches;
use once_cell::sync::Lazy;
use test_casing::{Product, test_casing};
use tracing::{Level, Subscriber, subscriber::DefaultGuard};
use tracing_capture::{CaptureLayer, SharedStorage};
use tracing_subscriber::{
    FmtSubscriber, fmt::format::FmtSpan, layer::SubscriberExt, registry::LookupSpan,
};

use schnorr_host::{
    ADDRESS_SIZE, Error, GUEST_LOG_TARGET, InputError, PRIVATE_KEY_SIZE, ResultError, Runtime,
    RuntimeConfig, SIGNATURE_SIZE, Session,
};
use schnorr_host_test::{format, hash, keys};

use crate::compile::CompilationProfile;

mod compile;

fn compile_module(profile: CompilationProfile) -> &'static [u8] {
    static WASM_MODULE: Lazy<Vec<u8>> = Lazy::new(|| CompilationProfile::Wasm.compile());
    static DEBUG_MODULE: Lazy<Vec<u8>> = Lazy::new(|| CompilationProfile::Debug.compile());

    match profile {
        CompilationProfile::Wasm => &WASM_MODULE,
        CompilationProfile::Debug => &DEBUG_MODULE,
    }
}

fn create_fmt_subscriber() -> impl Subscriber + for<'a> LookupSpan<'a> {
    FmtSubscriber::builder()
        .pretty()
        .with_span_events(FmtSpan::CLOSE)
        .with_test_writer()
        .with_env_filter("info,schnorr_host=debug")
        .finish()
}

fn enable_tracing() {
    static TRACING: Once = Once::new();

    TRACING.call_once(|| {
        tracing::subscriber::set_global_default(create_fmt_subscriber()).ok();
    });
}

fn enable_tracing_assertions() -> (DefaultGuard, SharedStorage) {
    let storage = SharedStorage::default();
    let subscriber = create_fmt_subscriber().with(CaptureLayer::new(&storage));
    let guard = tracing::subscriber::set_default(subscriber);
    (guard, storage)
}

fn create_runtime(profile: CompilationProfile) -> Runtime {
    let module = compile_module(profile);
    Runtime::new(&RuntimeConfig::new(module)).unwrap()
}

fn create_session(profile: CompilationProfile) -> Session {
    create_runtime(profile).new_session().unwrap()
}

fn assert_balanced(session: &Session) {
    let stats = session.allocation_stats().unwrap();
    assert!(stats.is_balanced(), "{stats:?}");
    assert_eq!(stats.release_failures, 0, "{stats:?}");
}

#[test_casing(2, CompilationProfile::ALL)]
fn key_generation(profile: CompilationProfile) {
    let (_guard, storage) = enable_tracing_assertions();
    let mut session = create_session(profile);

    let key_pair = session.new_private_key().unwrap();
    assert_eq!(key_pair.private_key.len(), PRIVATE_KEY_SIZE);
    assert!(keys::is_private_key(&key_pair.private_key));
    assert_eq!(key_pair.address.len(), ADDRESS_SIZE);
    let expected_address = keys::address(&key_pair.private_key).unwrap();
    assert_eq!(key_pair.address.as_bytes(), expected_address);

    let other_pair = session.new_private_key().unwrap();
    assert_ne!(other_pair.private_key, key_pair.private_key);
    assert_balanced(&session);

    let storage = storage.lock();
    let guest_logs = storage.all_events().filter(|event| {
        let metadata = event.metadata();
        metadata.target() == GUEST_LOG_TARGET && *metadata.level() == Level::INFO
    });
    let guest_messages: Vec<_> = guest_logs
        .filter_map(|event| event.value("guest_message")?.as_str())
        .collect();
    assert_eq!(guest_messages, ["generated private key"; 2]);
}

#[test_casing(2, CompilationProfile::ALL)]
fn signing(profile: CompilationProfile) {
    enable_tracing();
    let mut session = create_session(profile);
    let key_pair = session.new_private_key().unwrap();

    let hash = session.hash_message_to_string(b"hello").unwrap();
    let signature = session.sign(&key_pair.private_key, hash.as_bytes()).unwrap();
    assert_eq!(signature.len(), SIGNATURE_SIZE);
    let expected = keys::sign(&key_pair.private_key, hash.as_bytes()).unwrap();
    assert_eq!(signature.as_bytes(), expected);

    let hash_bytes = session.hash_message(b"hello").unwrap();
    let other_signature = session.sign(&key_pair.private_key, &hash_bytes).unwrap();
    assert_ne!(other_signature, signature);
    assert_balanced(&session);
}

#[test_casing(2, CompilationProfile::ALL)]
fn signing_with_malformed_key(profile: CompilationProfile) {
    enable_tracing();
    let mut session = create_session(profile);

    let key = [b'0'; PRIVATE_KEY_SIZE];
    let err = session.sign(&key, b"hello").unwrap_err();
    assert_matches!(
        err,
        Error::InvalidResult { export: "sign", kind: ResultError::InvalidInput }
    );
    let err = session.sign(&key[1..], b"hello").unwrap_err();
    assert_matches!(err, Error::InvalidInput(InputError::KeyLength { .. }));
    assert_balanced(&session);
}

#[test_casing(2, CompilationProfile::ALL)]
fn hash_representations_agree(profile: CompilationProfile) {
    enable_tracing();
    let mut session = create_session(profile);

    for message in [b"".as_slice(), b"hello", &[0xff_u8; 10_000]] {
        let literal = session.hash_message_to_string(message).unwrap();
        assert_eq!(literal, hash::literal(message));
        let bytes = session.hash_message(message).unwrap();
        assert_eq!(bytes, hash::le_bytes(message));

        let number: u128 = literal.strip_suffix("u128").unwrap().parse().unwrap();
        assert_eq!(number.to_le_bytes().as_slice(), bytes);
    }
    assert_balanced(&session);
}

#[test_casing(6, Product((CompilationProfile::ALL, [1, 4, 32])))]
fn formatting_round_trip(profile: CompilationProfile, chunks: usize) {
    enable_tracing();
    let mut session = create_session(profile);

    let full_message: Vec<u8> = (0..=255).cycle().take(chunks * format::CHUNK_LEN).collect();
    let messages = [&b""[..], b"hello", &full_message[..chunks * 100], full_message.as_slice()];
    for message in messages {
        let formatted = session.format_message(message, chunks).unwrap();
        assert!(!formatted.contains(&b'\n'));
        let expected = format::render(message, chunks).unwrap().replace('\n', "");
        assert_eq!(formatted, expected.as_bytes());

        let recovered = session.recover_message(&formatted).unwrap();
        assert_eq!(recovered, message);
    }
    assert_balanced(&session);
}

#[test]
fn recovering_pretty_printed_message() {
    enable_tracing();
    let mut session = create_session(CompilationProfile::Wasm);

    let formatted = format::render(b"hello", 2).unwrap();
    let recovered = session.recover_message(formatted.as_bytes()).unwrap();
    assert_eq!(recovered, b"hello");

    let err = session.recover_message(b"{ len: 5u32 }").unwrap_err();
    assert_matches!(
        err,
        Error::InvalidResult { export: "formatted_message_to_bytes", kind: ResultError::InvalidInput }
    );
    assert_balanced(&session);
}

#[test]
fn formatting_errors() {
    enable_tracing();
    let mut session = create_session(CompilationProfile::Wasm);

    let err = session.format_message(b"hello", 0).unwrap_err();
    assert_matches!(err, Error::InvalidInput(InputError::ChunkCount(0)));
    let err = session.format_message(&[0; 513], 1).unwrap_err();
    assert_matches!(err, Error::InvalidInput(InputError::MessageTooLong { len: 513, max_len: 512 }));

    let stats = session.allocation_stats().unwrap();
    assert_eq!(stats.allocated, 0);
}

#[test]
fn signing_loop() {
    enable_tracing();
    let mut session = create_session(CompilationProfile::Wasm);
    let key_pair = session.new_private_key().unwrap();

    for i in 0..5_000 {
        let message = format!("message #{i}");
        let formatted = session.format_message(message.as_bytes(), 1).unwrap();
        let hash = session.hash_message(&formatted).unwrap();
        let signature = session.sign(&key_pair.private_key, &hash).unwrap();
        assert_eq!(signature.len(), SIGNATURE_SIZE);

        if i % 10 == 0 {
            let err = session.recover_message(message.as_bytes()).unwrap_err();
            assert_matches!(err, Error::InvalidResult { .. });
        }
    }
    assert_balanced(&session);
}

#[test]
fn concurrent_sessions() {
    enable_tracing();
    let runtime = Arc::new(create_runtime(CompilationProfile::Wasm));

    let handles = (0..4).map(|i| {
        let runtime = Arc::clone(&runtime);
        thread::spawn(move || {
            let mut session = runtime.new_session().unwrap();
            let key_pair = session.new_private_key().unwrap();
            for j in 0..250 {
                let message = format!("thread #{i}, message #{j}");
                let formatted = session.format_message(message.as_bytes(), 2).unwrap();
                let recovered = session.recover_message(&formatted).unwrap();
                assert_eq!(recovered, message.as_bytes());

                let hash = session.hash_message_to_string(&formatted).unwrap();
                let signature = session.sign(&key_pair.private_key, hash.as_bytes()).unwrap();
                let expected = keys::sign(&key_pair.private_key, hash.as_bytes()).unwrap();
                assert_eq!(signature.as_bytes(), expected);
            }
            assert_balanced(&session);
        })
    });
    let handles: Vec<_> = handles.collect();
    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn closing_runtime_and_sessions() {
    enable_tracing();
    let runtime = create_runtime(CompilationProfile::Wasm);
    let mut first_session = runtime.new_session().unwrap();
    let mut second_session = runtime.new_session().unwrap();
    assert_ne!(first_session.id(), second_session.id());

    runtime.close();
    assert_matches!(runtime.new_session().unwrap_err(), Error::RuntimeClosed);
    first_session.hash_message(b"hello").unwrap();

    first_session.close();
    assert_matches!(first_session.hash_message(b"hello").unwrap_err(), Error::SessionClosed);
    let key_pair = second_session.new_private_key().unwrap();
    second_session.sign(&key_pair.private_key, b"hello").unwrap();
}
