//! Integration tests for SASL mechanism selection and credential callbacks.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tessera_sasl::{
    CredentialProvider, Credentials, Error, Qop, SUPPORTED_MECHANISMS, SaslClient, client_for,
};

/// Provider that counts how often each value is requested.
#[derive(Default)]
struct Prompting {
    username_calls: AtomicUsize,
    password_calls: AtomicUsize,
}

impl CredentialProvider for Prompting {
    fn username(&self) -> Option<String> {
        self.username_calls.fetch_add(1, Ordering::SeqCst);
        Some("tim".to_string())
    }

    fn password(&self) -> Option<String> {
        self.password_calls.fetch_add(1, Ordering::SeqCst);
        Some("tanstaaftanstaaf".to_string())
    }
}

#[test]
fn test_credentials_requested_only_when_needed() {
    let provider = Arc::new(Prompting::default());
    let mut login = client_for("LOGIN", provider.clone()).unwrap();
    assert_eq!(provider.username_calls.load(Ordering::SeqCst), 0);

    assert_eq!(login.evaluate_challenge(b"Username:").unwrap(), b"tim");
    assert_eq!(provider.password_calls.load(Ordering::SeqCst), 0);
    assert!(!login.is_complete());

    assert_eq!(
        login.evaluate_challenge(b"Password:").unwrap(),
        b"tanstaaftanstaaf"
    );
    assert!(login.is_complete());
    assert_eq!(provider.username_calls.load(Ordering::SeqCst), 1);
    assert_eq!(provider.password_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_cram_md5_rfc2195_exchange() {
    let mut client = client_for("cram-md5", Arc::new(Prompting::default())).unwrap();
    assert!(!client.has_initial_response());

    let response = client
        .evaluate_challenge(b"<1896.697170952@postoffice.reston.mci.net>")
        .unwrap();
    assert_eq!(response, b"tim b913a602c7eda7a495b4e6e7334d3890");
    assert!(client.is_complete());
}

#[test]
fn test_missing_credentials_reported_by_name() {
    let bare: Arc<dyn CredentialProvider> = Arc::new(Credentials::bearer("alice", "token"));
    let mut plain = client_for("PLAIN", bare).unwrap();

    let err = plain.evaluate_challenge(&[]).unwrap_err();
    assert!(matches!(err, Error::MissingCredentials("password")));
}

#[test]
fn test_oauth_mechanisms_send_initial_response() {
    let creds: Arc<dyn CredentialProvider> = Arc::new(Credentials::bearer("alice", "ya29.x"));

    let mut xoauth2 = client_for("XOAUTH2", Arc::clone(&creds)).unwrap();
    assert!(xoauth2.has_initial_response());
    assert_eq!(
        xoauth2.evaluate_challenge(&[]).unwrap(),
        b"user=alice\x01auth=Bearer ya29.x\x01\x01"
    );

    let mut bearer = client_for("OAUTHBEARER", creds).unwrap();
    assert_eq!(
        bearer.evaluate_challenge(&[]).unwrap(),
        b"n,a=alice,\x01auth=Bearer ya29.x\x01\x01"
    );
}

#[test]
fn test_builtin_mechanisms_have_no_security_layer() {
    let creds: Arc<dyn CredentialProvider> = Arc::new(Credentials::new("u", "p"));
    for name in SUPPORTED_MECHANISMS {
        let mut client: Box<dyn SaslClient> = client_for(name, Arc::clone(&creds)).unwrap();
        assert_eq!(client.qop(), Qop::Auth, "{name}");
        assert!(!client.qop().has_security_layer());
        assert!(matches!(
            client.wrap(b"data"),
            Err(Error::NoSecurityLayer(_))
        ));
    }
}

#[test]
fn test_unknown_mechanism_rejected() {
    let creds: Arc<dyn CredentialProvider> = Arc::new(Credentials::new("u", "p"));
    let Err(err) = client_for("SCRAM-SHA-256", creds) else {
        panic!("SCRAM-SHA-256 is not built in");
    };
    assert_eq!(err.to_string(), "unsupported SASL mechanism: SCRAM-SHA-256");
}
