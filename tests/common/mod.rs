#![allow(dead_code)]

use graphtxn::{
    CallOptions, Credentials, Jwt, MutationPart, Request, Response, Transport, TransportError,
    TransportErrorKind, TxnContext,
};
use std::{
    collections::{HashMap, VecDeque},
    sync::{Mutex, MutexGuard},
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Replays queued responses and records every request.
#[derive(Default)]
pub struct Scripted {
    responses: Mutex<VecDeque<Response>>,
    pub requests: Mutex<Vec<Request>>,
    pub commits: Mutex<Vec<TxnContext>>,
}

impl Scripted {
    pub fn push(&self, txn: TxnContext) {
        self.responses.lock().unwrap().push_back(Response {
            txn,
            ..Response::default()
        });
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    pub fn commits(&self) -> Vec<TxnContext> {
        self.commits.lock().unwrap().clone()
    }
}

impl Transport for Scripted {
    fn query(&self, req: Request, _opts: &CallOptions) -> Result<Response, TransportError> {
        self.requests.lock().unwrap().push(req);
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }

    fn commit_or_abort(
        &self,
        ctx: TxnContext,
        _opts: &CallOptions,
    ) -> Result<TxnContext, TransportError> {
        self.commits.lock().unwrap().push(ctx.clone());
        Ok(ctx)
    }

    fn login(&self, _creds: &Credentials, _opts: &CallOptions) -> Result<Jwt, TransportError> {
        Ok(Jwt::default())
    }
}

#[derive(Default)]
struct OccState {
    last_ts: u64,
    // conflict key -> commit timestamp of its latest writer
    committed: HashMap<String, u64>,
    commit_calls: usize,
    abort_calls: usize,
}

/// A tiny in-memory stand-in for the server's commit oracle.
///
/// Start timestamps come from one counter, conflict keys are `<subject>-<predicate>` of every
/// N-Quad written, and a commit is rejected if any of its keys was committed by another
/// transaction after this one's start timestamp.
#[derive(Default)]
pub struct OccServer {
    state: Mutex<OccState>,
    report_conflicts_as_errors: bool,
}

impl OccServer {
    /// Answers conflicting commits with an `Aborted` error instead of an aborted context.
    pub fn reporting_conflicts_as_errors() -> Self {
        Self {
            report_conflicts_as_errors: true,
            ..Self::default()
        }
    }

    fn state(&self) -> MutexGuard<'_, OccState> {
        self.state.lock().unwrap()
    }

    pub fn commit_calls(&self) -> usize {
        self.state().commit_calls
    }

    pub fn abort_calls(&self) -> usize {
        self.state().abort_calls
    }

    fn tokens(req: &Request) -> (Vec<String>, Vec<String>) {
        let mut keys = Vec::new();
        let mut preds = Vec::new();
        for part in req.mutations.iter().flat_map(|m| m.parts()) {
            let nquads = match part {
                MutationPart::SetNquads(n) | MutationPart::DeleteNquads(n) => n,
                _ => continue,
            };
            for line in nquads.lines() {
                let mut terms = line.split_whitespace();
                let (Some(subject), Some(predicate)) = (terms.next(), terms.next()) else {
                    continue;
                };
                let predicate = predicate.trim_matches(['<', '>']);
                keys.push(format!("{}-{predicate}", subject.trim_matches(['<', '>'])));
                preds.push(format!("1-{predicate}"));
            }
        }
        (keys, preds)
    }
}

impl Transport for OccServer {
    fn query(&self, req: Request, opts: &CallOptions) -> Result<Response, TransportError> {
        let mut state = self.state();
        let start_ts = if req.txn.start_ts == 0 {
            state.last_ts += 1;
            state.last_ts
        } else {
            req.txn.start_ts
        };

        let mut txn = TxnContext::with_start_ts(start_ts);
        let (keys, preds) = Self::tokens(&req);
        txn.keys.extend(keys);
        txn.preds.extend(preds);
        txn.lin_read.observe(1, state.last_ts);

        let mut uids = std::collections::BTreeMap::new();
        for (i, _) in req.mutations.iter().enumerate() {
            uids.insert(format!("m{i}"), format!("{:#x}", start_ts * 100 + i as u64));
        }
        drop(state);

        if req.commit_now {
            let mut all = txn.for_commit();
            all.keys.extend(req.txn.keys.iter().cloned());
            let outcome = self.commit_or_abort(all, opts)?;
            txn.aborted = outcome.aborted;
            txn.commit_ts = outcome.commit_ts;
        }

        Ok(Response {
            txn,
            uids,
            ..Response::default()
        })
    }

    fn commit_or_abort(
        &self,
        mut ctx: TxnContext,
        _opts: &CallOptions,
    ) -> Result<TxnContext, TransportError> {
        let mut state = self.state();
        if ctx.aborted {
            state.abort_calls += 1;
            return Ok(ctx);
        }

        state.commit_calls += 1;
        let conflict = ctx
            .keys
            .iter()
            .any(|key| state.committed.get(key).is_some_and(|&ts| ts > ctx.start_ts));
        if conflict {
            if self.report_conflicts_as_errors {
                return Err(TransportError::new(
                    TransportErrorKind::Aborted,
                    "transaction has been aborted, please retry",
                ));
            }
            ctx.aborted = true;
            return Ok(ctx);
        }

        state.last_ts += 1;
        let commit_ts = state.last_ts;
        for key in &ctx.keys {
            state.committed.insert(key.clone(), commit_ts);
        }
        ctx.commit_ts = commit_ts;
        Ok(ctx)
    }

    fn login(&self, creds: &Credentials, _opts: &CallOptions) -> Result<Jwt, TransportError> {
        Ok(Jwt {
            access_jwt: format!("jwt-{}", creds.user_id),
            refresh_jwt: String::new(),
        })
    }
}
