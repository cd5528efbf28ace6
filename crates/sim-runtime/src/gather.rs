use sim_core::{FirmName, RawDecision};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::warn;

/// Collect one decision per firm concurrently, each bounded by `timeout`.
///
/// A source that errors, panics or times out yields an empty
/// [`RawDecision`], which later resolves to the documented safe defaults.
/// Must run inside a tokio runtime.
pub async fn gather_decisions<F, Fut, E>(
    firms: Vec<FirmName>,
    timeout: Duration,
    fetch: F,
) -> BTreeMap<FirmName, RawDecision>
where
    F: Fn(FirmName) -> Fut,
    Fut: Future<Output = Result<RawDecision, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let mut set = JoinSet::new();
    for name in &firms {
        let fut = fetch(name.clone());
        let name = name.clone();
        set.spawn(async move { (name, tokio::time::timeout(timeout, fut).await) });
    }

    let mut out = BTreeMap::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((name, Ok(Ok(decision)))) => {
                out.insert(name, decision);
            }
            Ok((name, Ok(Err(e)))) => {
                warn!(firm = %name, error = %e, "decision source failed; using defaults");
                out.insert(name, RawDecision::default());
            }
            Ok((name, Err(_))) => {
                warn!(firm = %name, ?timeout, "decision timed out; using defaults");
                out.insert(name, RawDecision::default());
            }
            Err(e) => warn!(error = %e, "decision task aborted"),
        }
    }
    for name in firms {
        out.entry(name).or_default();
    }
    out
}
