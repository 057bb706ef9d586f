//! Conversion of guest faults and host panics into errors.

use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
};

use wasmtime::Trap;

use crate::{Error, Fault};

/// Converts an error returned by a guest call into a fault.
pub(crate) fn trap(export: &'static str, err: &wasmtime::Error) -> Error {
    let code = err.downcast_ref::<Trap>().copied();
    Error::Fault(Fault::Trap {
        export,
        code,
        message: format!("{err:#}"),
    })
}

/// Runs `operation`, converting a panic raised in it into an error.
///
/// Guest memory acquired by the operation is released by the scope guards while unwinding,
/// i.e., before the converted error is returned.
pub(crate) fn shield<T>(
    operation: &'static str,
    action: impl FnOnce() -> Result<T, Error>,
) -> Result<T, Error> {
    match panic::catch_unwind(AssertUnwindSafe(action)) {
        Ok(result) => result,
        Err(payload) => {
            let err = from_panic(payload);
            tracing::error!(operation, %err, "caught panic in guest operation");
            Err(err)
        }
    }
}

fn from_panic(payload: Box<dyn Any + Send>) -> Error {
    let payload = match payload.downcast::<Error>() {
        Ok(err) => return *err,
        Err(payload) => payload,
    };
    let payload = match payload.downcast::<String>() {
        Ok(message) => return Fault::Panic(*message).into(),
        Err(payload) => payload,
    };
    match payload.downcast_ref::<&'static str>() {
        Some(message) => Fault::Panic((*message).to_owned()).into(),
        None => Fault::Unknown.into(),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::InputError;

    #[test]
    fn passing_through_results() {
        let value = shield("test", || Ok(42)).unwrap();
        assert_eq!(value, 42);

        let err = shield::<()>("test", || Err(Error::SessionClosed)).unwrap_err();
        assert_matches!(err, Error::SessionClosed);
    }

    #[test]
    fn converting_textual_panics() {
        let err = shield::<()>("test", || panic!("static message")).unwrap_err();
        assert_matches!(err, Error::Fault(Fault::Panic(message)) if message == "static message");

        let code = 42;
        let err = shield::<()>("test", || panic!("formatted message {code}")).unwrap_err();
        assert_matches!(
            err,
            Error::Fault(Fault::Panic(message)) if message == "formatted message 42"
        );
    }

    #[test]
    fn structured_panics_pass_through() {
        let err = shield::<()>("test", || {
            panic::panic_any(Error::InvalidInput(InputError::ChunkCount(0)))
        })
        .unwrap_err();
        assert_matches!(err, Error::InvalidInput(InputError::ChunkCount(0)));
    }

    #[test]
    fn unknown_panic_payload() {
        let err = shield::<()>("test", || panic::panic_any(42_u64)).unwrap_err();
        assert_matches!(err, Error::Fault(Fault::Unknown));
        assert_eq!(err.to_string(), "unknown internal failure");
    }
}
