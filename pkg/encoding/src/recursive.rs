//! Self referential and lazily built descriptors.

use std::sync::{Arc, Weak};

use once_cell::sync::OnceCell;

use crate::encoding::{Codec, Encoding};
use crate::error::{ReadResult, WriteResult};
use crate::errors::*;
use crate::kind::Kind;
use crate::reader::ReadState;
use crate::stream::ScanPlan;
use crate::writer::WriteState;

struct MuCodec<T> {
    assumed_kind: Kind,
    body: OnceCell<Encoding<T>>,
    plan: OnceCell<Arc<ScanPlan>>,
}

impl<T: 'static> MuCodec<T> {
    fn body(&self) -> &Encoding<T> {
        // The body is installed before the encoding is handed out, so the
        // interpreters can never observe an empty cell.
        self.body
            .get()
            .unwrap_or_else(|| panic!("Recursive encoding interpreted during construction"))
    }
}

impl<T: 'static> Codec<T> for MuCodec<T> {
    fn kind(&self) -> Kind {
        match self.body.get() {
            Some(body) => body.classify(),
            None => self.assumed_kind,
        }
    }

    fn scan_plan(&self) -> Arc<ScanPlan> {
        self.plan
            .get_or_init(|| self.body().codec.scan_plan())
            .clone()
    }

    fn is_obj(&self) -> bool {
        self.body.get().map(|b| b.codec.is_obj()).unwrap_or(false)
    }

    fn is_tup(&self) -> bool {
        self.body.get().map(|b| b.codec.is_tup()).unwrap_or(false)
    }

    fn encoded_len(&self, value: &T) -> WriteResult<usize> {
        self.body().codec.encoded_len(value)
    }

    fn write_value(&self, value: &T, out: &mut WriteState) -> WriteResult<()> {
        self.body().codec.write_value(value, out)
    }

    fn read_value(&self, input: &mut ReadState) -> ReadResult<T> {
        self.body().codec.read_value(input)
    }
}

/// Back reference from inside a recursive body to its fixed point. Holding
/// the node weakly keeps the descriptor graph acyclic for ownership even
/// though it is cyclic for interpretation.
struct MuRef<T> {
    node: Weak<MuCodec<T>>,
    name: String,
}

impl<T: 'static> MuRef<T> {
    fn node(&self) -> Arc<MuCodec<T>> {
        self.node.upgrade().unwrap_or_else(|| {
            panic!("Recursive encoding {:?} used after being dropped", self.name)
        })
    }
}

impl<T: 'static> Codec<T> for MuRef<T> {
    fn kind(&self) -> Kind {
        self.node().kind()
    }

    fn scan_plan(&self) -> Arc<ScanPlan> {
        let node = self.node.clone();
        let name = self.name.clone();
        Arc::new(ScanPlan::Defer(Arc::new(move || {
            node.upgrade()
                .unwrap_or_else(|| {
                    panic!("Recursive encoding {:?} used after being dropped", name)
                })
                .scan_plan()
        })))
    }

    fn is_obj(&self) -> bool {
        self.node().is_obj()
    }

    fn is_tup(&self) -> bool {
        self.node().is_tup()
    }

    fn encoded_len(&self, value: &T) -> WriteResult<usize> {
        self.node().encoded_len(value)
    }

    fn write_value(&self, value: &T, out: &mut WriteState) -> WriteResult<()> {
        self.node().write_value(value, out)
    }

    fn read_value(&self, input: &mut ReadState) -> ReadResult<T> {
        self.node().read_value(input)
    }
}

fn mu_attempt<T, F>(name: &str, f: &F, assumed_kind: Kind) -> Result<Encoding<T>>
where
    T: 'static,
    F: Fn(Encoding<T>) -> Result<Encoding<T>>,
{
    let node = Arc::new(MuCodec {
        assumed_kind,
        body: OnceCell::new(),
        plan: OnceCell::new(),
    });

    let self_ref = Encoding::from_codec(MuRef {
        node: Arc::downgrade(&node),
        name: name.to_string(),
    });

    let body = f(self_ref).map_err(|e| format_err!("In recursive encoding {:?}: {}", name, e))?;
    let _ = node.body.set(body);

    Ok(Encoding::from_arc(node))
}

/// Fixed point: `f` receives the encoding being defined and returns its
/// body.
///
/// Classification runs twice when needed: the body is first built with the
/// recursion assumed self delimiting, and when that turns out variable the
/// body is rebuilt under the variable assumption.
pub fn mu<T, F>(name: &str, f: F) -> Result<Encoding<T>>
where
    T: 'static,
    F: Fn(Encoding<T>) -> Result<Encoding<T>>,
{
    let encoding = mu_attempt(name, &f, Kind::Dynamic)?;
    if encoding.classify().is_variable() {
        return mu_attempt(name, &f, Kind::Variable);
    }
    Ok(encoding)
}

struct DelayedCodec<T> {
    cell: OnceCell<Encoding<T>>,
    thunk: Box<dyn Fn() -> Encoding<T> + Send + Sync>,
}

impl<T: 'static> DelayedCodec<T> {
    fn force(&self) -> &Encoding<T> {
        self.cell.get_or_init(|| (self.thunk)())
    }
}

impl<T: 'static> Codec<T> for DelayedCodec<T> {
    fn kind(&self) -> Kind {
        self.force().classify()
    }

    fn scan_plan(&self) -> Arc<ScanPlan> {
        self.force().codec.scan_plan()
    }

    fn is_obj(&self) -> bool {
        self.force().codec.is_obj()
    }

    fn is_tup(&self) -> bool {
        self.force().codec.is_tup()
    }

    fn encoded_len(&self, value: &T) -> WriteResult<usize> {
        self.force().codec.encoded_len(value)
    }

    fn write_value(&self, value: &T, out: &mut WriteState) -> WriteResult<()> {
        self.force().codec.write_value(value, out)
    }

    fn read_value(&self, input: &mut ReadState) -> ReadResult<T> {
        self.force().codec.read_value(input)
    }
}

/// Defers building the encoding until its first use. The thunk runs at most
/// once, even under concurrent first use.
pub fn delayed<T, F>(f: F) -> Encoding<T>
where
    T: 'static,
    F: Fn() -> Encoding<T> + Send + Sync + 'static,
{
    Encoding::from_codec(DelayedCodec {
        cell: OnceCell::new(),
        thunk: Box::new(f),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::dynamic_size;
    use crate::primitives::{empty, uint8};
    use crate::size::SizeWidth;
    use crate::union::{case, union, CaseTag, TagSize};

    // A cons list of bytes, each link framed by a size header.
    fn chain_encoding() -> Encoding<Vec<u8>> {
        mu("chain", |chain| {
            union(
                TagSize::Uint8,
                vec![
                    case(
                        CaseTag::Tag(0),
                        "nil",
                        empty(),
                        |v: &Vec<u8>| if v.is_empty() { Some(()) } else { None },
                        |()| vec![],
                    ),
                    case(
                        CaseTag::Tag(1),
                        "cons",
                        crate::product::tup2(
                            uint8(),
                            dynamic_size(SizeWidth::Uint30, chain.clone()),
                        )?,
                        |v: &Vec<u8>| {
                            let (head, tail) = v.split_first()?;
                            Some((*head, tail.to_vec()))
                        },
                        |(head, tail)| {
                            let mut out = vec![head];
                            out.extend_from_slice(&tail);
                            out
                        },
                    ),
                ],
            )
        })
        .unwrap()
    }

    #[test]
    fn mu_roundtrip_test() {
        let enc = chain_encoding();
        assert_eq!(enc.classify(), Kind::Dynamic);

        let data = enc.to_bytes(&vec![5, 6]).unwrap();
        assert_eq!(
            &data,
            &[1, 5, 0, 0, 0, 7, 1, 6, 0, 0, 0, 1, 0]
        );
        assert_eq!(enc.of_bytes(&data).unwrap(), vec![5, 6]);
        assert_eq!(enc.of_bytes(&[0]).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn mu_variable_body_test() {
        // The first classification pass assumes the recursion is self
        // delimiting; a variable body forces the second pass.
        let enc: Encoding<(u8, Vec<u8>)> = mu("framed", |_| {
            crate::product::tup2(uint8(), crate::primitives::variable_bytes())
        })
        .unwrap();

        assert_eq!(enc.classify(), Kind::Variable);
        assert_eq!(enc.of_bytes(&[1, 2, 3]).unwrap(), (1, vec![2, 3]));
    }

    #[test]
    fn mu_stream_test() {
        use crate::stream::{read_stream, StreamStatus};

        let enc = chain_encoding();
        let data = enc.to_bytes(&vec![5, 6]).unwrap();

        let status =
            read_stream(&enc, vec![bytes::Bytes::from(data[..4].to_vec())]).unwrap();
        let reader = status.awaiting().unwrap();

        match reader.push(bytes::Bytes::from(data[4..].to_vec())) {
            StreamStatus::Success { value, consumed, .. } => {
                assert_eq!(value, vec![5, 6]);
                assert_eq!(consumed, data.len());
            }
            _ => panic!("Expected a complete value"),
        }
    }

    #[test]
    fn delayed_test() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        static BUILDS: AtomicUsize = AtomicUsize::new(0);

        let enc = delayed(|| {
            BUILDS.fetch_add(1, Ordering::SeqCst);
            uint8()
        });
        assert_eq!(BUILDS.load(Ordering::SeqCst), 0);

        assert_eq!(enc.to_bytes(&7).unwrap(), vec![7]);
        assert_eq!(enc.of_bytes(&[9]).unwrap(), 9);
        assert_eq!(enc.classify(), Kind::Fixed(1));
        assert_eq!(BUILDS.load(Ordering::SeqCst), 1);
    }
}
