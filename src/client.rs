// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Transaction factory.
use crate::{
    CallOptions, Credentials, Transaction, Transport, TxnOptions,
    error::Result,
    transport::{ACCESS_TOKEN_KEY, Jwt},
};
use tracing::{debug, instrument};

/// Hands out [`Transaction`]s that share one transport.
///
/// The client holds default [`CallOptions`] which every new transaction starts with. Logging in
/// stores the access token there, so transactions created afterwards are authenticated.
///
/// Transactions borrow the client's transport, so any number of them can be open at once as
/// long as the transport is `Sync`.
#[derive(Debug)]
pub struct Client<T> {
    transport: T,
    call_opts: CallOptions,
    jwt: Option<Jwt>,
}

impl<T> Client<T>
where
    T: Transport,
{
    pub fn new(transport: T) -> Self {
        Self::with_call_options(transport, CallOptions::default())
    }

    pub fn with_call_options(transport: T, call_opts: CallOptions) -> Self {
        Self {
            transport,
            call_opts,
            jwt: None,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn call_options(&self) -> &CallOptions {
        &self.call_opts
    }

    /// Starts a read-write transaction.
    pub fn new_txn(&self) -> Transaction<&T> {
        self.build(TxnOptions::new())
    }

    /// Starts a transaction that rejects mutations.
    pub fn new_read_only_txn(&self) -> Transaction<&T> {
        self.build(TxnOptions::new().read_only())
    }

    /// Starts a read-only transaction whose reads may skip the consensus read path.
    pub fn new_best_effort_txn(&self) -> Transaction<&T> {
        self.build(TxnOptions::new().read_only().best_effort())
    }

    /// Starts a transaction with explicit options, rejecting inconsistent ones.
    pub fn new_txn_with(&self, options: TxnOptions) -> Result<Transaction<&T>> {
        Ok(Transaction::new(&self.transport, options)?.with_call_options(self.call_opts.clone()))
    }

    fn build(&self, options: TxnOptions) -> Transaction<&T> {
        // the presets above are consistent by construction
        debug_assert!(options.validate().is_ok());
        Transaction::from_valid_options(&self.transport, options)
            .with_call_options(self.call_opts.clone())
    }

    /// Logs into the default namespace.
    pub fn login(&mut self, user_id: impl Into<String>, password: impl Into<String>) -> Result<()> {
        self.login_into_namespace(user_id, password, 0)
    }

    /// Logs into `namespace` and attaches the access token to all later transactions.
    #[instrument(level = "debug", skip_all, fields(namespace = namespace))]
    pub fn login_into_namespace(
        &mut self,
        user_id: impl Into<String>,
        password: impl Into<String>,
        namespace: u64,
    ) -> Result<()> {
        let creds = Credentials {
            user_id: user_id.into(),
            password: password.into(),
            namespace,
            refresh_token: None,
        };
        let jwt = self.transport.login(&creds, &self.call_opts)?;
        self.store(jwt);
        Ok(())
    }

    /// Exchanges the refresh token from the last login for a new access token.
    ///
    /// Does nothing if the client never logged in.
    #[instrument(level = "debug", skip_all)]
    pub fn relogin(&mut self) -> Result<()> {
        let Some(refresh_jwt) = self.jwt.as_ref().map(|jwt| jwt.refresh_jwt.clone()) else {
            return Ok(());
        };
        let creds = Credentials {
            refresh_token: Some(refresh_jwt),
            ..Credentials::default()
        };
        let jwt = self.transport.login(&creds, &self.call_opts)?;
        self.store(jwt);
        Ok(())
    }

    fn store(&mut self, jwt: Jwt) {
        debug!("logged in, attaching access token to new transactions");
        self.call_opts
            .metadata
            .insert(ACCESS_TOKEN_KEY.to_string(), jwt.access_jwt.clone());
        self.jwt = Some(jwt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        TransportError, TransportErrorKind, TxnError, TxnState,
        test_util::{Call, MockTransport},
    };

    #[test]
    fn presets() {
        let client = Client::new(MockTransport::default());
        let rw = client.new_txn();
        assert!(!rw.is_read_only());
        let ro = client.new_read_only_txn();
        assert!(ro.is_read_only() && !ro.is_best_effort());
        let be = client.new_best_effort_txn();
        assert!(be.is_read_only() && be.is_best_effort());
        assert_eq!(be.state(), TxnState::Active);
    }

    #[test]
    fn explicit_options_are_validated() {
        let client = Client::new(MockTransport::default());
        assert!(matches!(
            client.new_txn_with(TxnOptions::new().best_effort()),
            Err(TxnError::Configuration(_))
        ));
        assert!(client.new_txn_with(TxnOptions::new().read_only().at_snapshot(3)).is_ok());
    }

    #[test]
    fn login_token_reaches_transactions() {
        let mut client = Client::new(MockTransport::default());
        client.login_into_namespace("groot", "password", 2).unwrap();
        assert_eq!(client.call_options().access_token(), Some("access-groot"));

        let mut txn = client.new_txn();
        txn.query("{ q(func: uid(0x1)) { uid } }").unwrap();
        assert_eq!(
            client.transport().last_call_options().unwrap().access_token(),
            Some("access-groot")
        );

        match &client.transport().calls()[0] {
            Call::Login(creds) => {
                assert_eq!(creds.user_id, "groot");
                assert_eq!(creds.namespace, 2);
            }
            other => panic!("unexpected call {other:?}"),
        }
    }

    #[test]
    fn relogin_uses_refresh_token() {
        let mut client = Client::new(MockTransport::default());
        client.relogin().unwrap();
        assert!(client.transport().calls().is_empty());

        client.login("groot", "password").unwrap();
        client.relogin().unwrap();
        match &client.transport().calls()[1] {
            Call::Login(creds) => {
                assert_eq!(creds.refresh_token.as_deref(), Some("refresh-groot"));
            }
            other => panic!("unexpected call {other:?}"),
        }
    }

    #[test]
    fn failed_login_keeps_previous_token() {
        let mut client = Client::new(MockTransport::default());
        client.login("groot", "password").unwrap();
        client.transport().fail_next(TransportError::new(
            TransportErrorKind::Unauthenticated,
            "bad password",
        ));
        assert!(client.login("groot", "nope").is_err());
        assert_eq!(client.call_options().access_token(), Some("access-groot"));
    }
}
