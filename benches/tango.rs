// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use graphtxn::{
    CallOptions, Client, Credentials, Jwt, Mutation, Request, Response, Transport,
    TransportError, TxnContext,
};
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::hint::black_box;
use tango_bench::{IntoBenchmarks, benchmark_fn, tango_benchmarks, tango_main};

fn random_context(rng: &mut StdRng, start_ts: u64, n_keys: usize) -> TxnContext {
    let mut ctx = TxnContext::with_start_ts(start_ts);
    ctx.keys
        .extend((0..n_keys).map(|_| format!("{:#x}-name", rng.random_range(0..4 * n_keys))));
    ctx.preds
        .extend((0..n_keys / 8 + 1).map(|_| format!("1-p{}", rng.random_range(0..32))));
    for _ in 0..4 {
        ctx.lin_read
            .observe(rng.random_range(1..8), rng.random_range(0..1_000_000));
    }
    ctx
}

fn merge_benchmarks() -> impl IntoBenchmarks {
    graphtxn::enable_determinism();

    let mut rng = StdRng::seed_from_u64(0x5eed);
    let big1 = random_context(&mut rng, 42, 4096);
    let big2 = random_context(&mut rng, 42, 4096);
    let small1 = random_context(&mut rng, 42, 16);
    let small2 = random_context(&mut rng, 42, 16);

    let big1: &'static _ = Box::leak(Box::new(big1));
    let big2: &'static _ = Box::leak(Box::new(big2));
    let small1: &'static _ = Box::leak(Box::new(small1));
    let small2: &'static _ = Box::leak(Box::new(small2));
    [
        benchmark_fn("context::merge::both_small", move |b| {
            b.iter(|| {
                let mut left = black_box(small1.clone());
                left.merge_from(black_box(small2))
            })
        }),
        benchmark_fn("context::merge::left_big", move |b| {
            b.iter(|| {
                let mut left = black_box(big1.clone());
                left.merge_from(black_box(small1))
            })
        }),
        benchmark_fn("context::merge::right_big", move |b| {
            b.iter(|| {
                let mut left = black_box(small1.clone());
                left.merge_from(black_box(big1))
            })
        }),
        benchmark_fn("context::merge::both_big", move |b| {
            b.iter(|| {
                let mut left = black_box(big1.clone());
                left.merge_from(black_box(big2))
            })
        }),
        benchmark_fn("context::merge::both_same_big", move |b| {
            b.iter(|| {
                let mut left = black_box(big1.clone());
                left.merge_from(black_box(big1))
            })
        }),
    ]
}

/// Answers every call instantly so only client-side bookkeeping is measured.
struct Echo;

impl Transport for Echo {
    fn query(&self, req: Request, _opts: &CallOptions) -> Result<Response, TransportError> {
        let mut txn = TxnContext::with_start_ts(7);
        txn.keys.extend(req.mutations.iter().map(|_| "0x1-name".to_string()));
        Ok(Response {
            txn,
            ..Response::default()
        })
    }

    fn commit_or_abort(
        &self,
        ctx: TxnContext,
        _opts: &CallOptions,
    ) -> Result<TxnContext, TransportError> {
        Ok(ctx)
    }

    fn login(&self, _creds: &Credentials, _opts: &CallOptions) -> Result<Jwt, TransportError> {
        Ok(Jwt::default())
    }
}

fn transaction_benchmarks() -> impl IntoBenchmarks {
    graphtxn::enable_determinism();

    let client: &'static _ = Box::leak(Box::new(Client::new(Echo)));
    [
        benchmark_fn("transaction::query-commit", move |b| {
            b.iter(move || {
                let mut txn = black_box(client).new_txn();
                txn.query("{ q(func: uid(0x1)) { uid } }").unwrap();
                txn.commit()
            })
        }),
        benchmark_fn("transaction::mutate-commit", move |b| {
            b.iter(move || {
                let mut txn = black_box(client).new_txn();
                for _ in 0..8 {
                    txn.mutate(Mutation::new().set_nquads(r#"<0x1> <name> "A" ."#))
                        .unwrap();
                }
                txn.commit()
            })
        }),
    ]
}

tango_benchmarks!(merge_benchmarks(), transaction_benchmarks());
tango_main!();
