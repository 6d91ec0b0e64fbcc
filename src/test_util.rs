// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use crate::{LinRead, TxnContext};
use quickcheck::{Arbitrary, Gen};

#[cfg(test)]
pub(crate) use mock::{Call, MockTransport};

// keep the token space small so that generated contexts overlap
fn token(g: &mut Gen, prefix: &str) -> String {
    format!("{prefix}{}", u8::arbitrary(g) % 16)
}

impl Arbitrary for LinRead {
    fn arbitrary(g: &mut Gen) -> Self {
        let pairs: Vec<(u8, u16)> = Arbitrary::arbitrary(g);
        pairs
            .into_iter()
            .map(|(group, index)| (u32::from(group % 8), u64::from(index)))
            .collect()
    }

    fn shrink(&self) -> Box<dyn Iterator<Item = Self>> {
        let pairs: Vec<(u32, u64)> = self.iter().collect();
        Box::new(pairs.shrink().map(LinRead::from_iter))
    }
}

impl Arbitrary for TxnContext {
    fn arbitrary(g: &mut Gen) -> Self {
        let n_keys = usize::arbitrary(g) % 8;
        let n_preds = usize::arbitrary(g) % 4;
        let mut ctx = TxnContext::with_start_ts(*g.choose(&[0, 1, 2]).expect("non-empty"));
        ctx.commit_ts = *g.choose(&[0, 5]).expect("non-empty");
        ctx.aborted = bool::arbitrary(g);
        ctx.keys.extend((0..n_keys).map(|_| token(g, "0x")));
        ctx.preds.extend((0..n_preds).map(|_| token(g, "1-p")));
        ctx.lin_read = LinRead::arbitrary(g);
        ctx.hash = (*g.choose(&["", "h1", "h2"]).expect("non-empty")).to_string();
        ctx
    }
}
