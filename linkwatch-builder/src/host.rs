//! Sticky-routing hint selection.

use std::time::Duration;

use linkwatch_core::AppId;

use crate::client::BuildService;

/// How many workers to sample before an initial link.
pub const SAMPLED_HOSTS: usize = 3;

/// How long each availability probe may take.
pub const AVAILABILITY_TIMEOUT: Duration = Duration::from_millis(1000);

/// Probe `samples` workers concurrently and return the least busy one.
///
/// Failed or hostless probes are ignored; `None` means no usable answer, in
/// which case the link proceeds without a hint.
pub fn most_available_host(
    service: &dyn BuildService,
    app: &AppId,
    samples: usize,
    timeout: Duration,
) -> Option<String> {
    let answers: Vec<_> = std::thread::scope(|scope| {
        let probes: Vec<_> = (0..samples)
            .map(|_| scope.spawn(|| service.availability(app, timeout)))
            .collect();
        probes
            .into_iter()
            .filter_map(|probe| probe.join().ok())
            .collect()
    });

    answers
        .into_iter()
        .filter_map(|answer| match answer {
            Ok(availability) => Some(availability),
            Err(err) => {
                tracing::debug!(error = %err, "availability probe failed");
                None
            }
        })
        .filter_map(|a| a.hostname.map(|host| (host, a.score)))
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(host, _)| host)
}
