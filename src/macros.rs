// (c) Copyright 2025 Helsing GmbH. All rights reserved.
/// Convenience macro for creating [`LinRead`](crate::LinRead) values.
///
/// ```rust
/// # use graphtxn::lin_read;
/// let lin_read = lin_read! {1 => 10, 2 => 3};
/// assert_eq!(lin_read.get(1), Some(10));
/// assert_eq!(lin_read.get(3), None);
/// ```
#[macro_export]
macro_rules! lin_read {
    ($($group:expr => $index:expr),* $(,)?) => {
        $crate::LinRead::from_iter([$(($group, $index)),*])
    };
}

/// Convenience macro for creating a [`TxnContext`](crate::TxnContext).
///
/// NOTE! This is mostly useful for tests and for mock transports, since real contexts are only
/// ever produced by the server.
///
/// ```rust
/// # use graphtxn::txn_context;
/// let ctx = txn_context!(
///     start_ts: 10,
///     keys: ["0x1-name"],
///     preds: ["1-name"],
///     lin_read: {1 => 4},
///     hash: "abc"
/// );
/// assert_eq!(ctx.start_ts, 10);
/// assert!(ctx.keys.contains("0x1-name"));
/// assert_eq!(ctx.lin_read.get(1), Some(4));
/// assert_eq!(ctx.hash, "abc");
/// ```
#[macro_export]
macro_rules! txn_context {
    (
        start_ts: $ts:expr,
        keys: [$($key:expr),* $(,)?],
        preds: [$($pred:expr),* $(,)?],
        lin_read: {$($group:expr => $index:expr),* $(,)?}
        $(, hash: $hash:expr)?
        $(,)?
    ) => {{
        let mut ctx = $crate::TxnContext::with_start_ts($ts);
        $( ctx.keys.insert(::std::string::String::from($key)); )*
        $( ctx.preds.insert(::std::string::String::from($pred)); )*
        ctx.lin_read = $crate::lin_read!($($group => $index),*);
        $( ctx.hash = ::std::string::String::from($hash); )?
        ctx
    }};
}
