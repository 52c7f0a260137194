//! Single-flight token refresh.
//!
//! Every 401 on an authorized request funnels through `refresh_after`, which
//! either reuses a token another caller already obtained, joins the refresh in
//! flight, or starts one. The refresh itself runs on its own task and publishes
//! its outcome on a watch channel, so a caller that abandons its request does
//! not cancel the refresh other callers are waiting on.

use super::{AuthenticatedClient, error::ApiError};
use crate::session::RefreshTicket;
use secrecy::{ExposeSecret, SecretString};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{Instrument, error, info, info_span, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefreshOutcome {
    Refreshed,
    Failed,
}

type OutcomeReceiver = watch::Receiver<Option<RefreshOutcome>>;

#[derive(Default)]
pub(super) struct RefreshGate {
    state: Mutex<GateState>,
}

#[derive(Default)]
struct GateState {
    /// Refresh in progress, keyed by the session epoch it was started for.
    in_flight: Option<(u64, OutcomeReceiver)>,
    /// Access token whose refresh the server rejected.
    rejected: Option<SecretString>,
}

impl RefreshGate {
    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn in_flight(&self) -> bool {
        self.lock().in_flight.is_some()
    }
}

fn same_token(left: Option<&SecretString>, right: Option<&SecretString>) -> bool {
    match (left, right) {
        (Some(left), Some(right)) => left.expose_secret() == right.expose_secret(),
        (None, None) => true,
        _ => false,
    }
}

impl AuthenticatedClient {
    /// Makes sure the access token that produced a 401 (`stale`) has been
    /// replaced, refreshing at most once for all concurrent callers.
    /// # Errors
    /// Returns `Unauthenticated` if no replacement token could be obtained.
    pub(crate) async fn refresh_after(&self, stale: Option<&SecretString>) -> Result<(), ApiError> {
        let mut outcome = {
            let mut gate = self.inner.refresh.lock();

            let current = self.inner.credentials.access_token();
            if !same_token(current.as_ref(), stale) {
                // Another caller already replaced the token this request used.
                return if current.is_some() {
                    Ok(())
                } else {
                    Err(ApiError::Unauthenticated)
                };
            }

            // A refresh started for an earlier session cannot serve this one.
            let epoch = self.inner.credentials.epoch();
            let joinable = gate
                .in_flight
                .as_ref()
                .filter(|(started, receiver)| {
                    *started == epoch && receiver.has_changed().is_ok()
                })
                .map(|(_, receiver)| receiver.clone());

            match joinable {
                Some(receiver) => receiver,
                None => {
                    if stale.is_some() && same_token(gate.rejected.as_ref(), stale) {
                        return Err(ApiError::Unauthenticated);
                    }

                    let ticket = self
                        .inner
                        .credentials
                        .refresh_ticket()
                        .ok_or(ApiError::Unauthenticated)?;

                    let (sender, receiver) = watch::channel(None);
                    gate.in_flight = Some((ticket.epoch, receiver.clone()));

                    let client = self.clone();
                    let stale = stale.cloned();
                    tokio::spawn(
                        async move { client.run_refresh(ticket, stale, sender).await }
                            .instrument(info_span!("api.refresh")),
                    );

                    receiver
                }
            }
        };

        let result = outcome
            .wait_for(Option::is_some)
            .await
            .map(|value| *value)
            .ok()
            .flatten();

        match result {
            Some(RefreshOutcome::Refreshed) => Ok(()),
            Some(RefreshOutcome::Failed) | None => Err(ApiError::Unauthenticated),
        }
    }

    async fn run_refresh(
        self,
        ticket: RefreshTicket,
        stale: Option<SecretString>,
        sender: watch::Sender<Option<RefreshOutcome>>,
    ) {
        let (outcome, rejected) = match self.request_refresh(&ticket.refresh_token).await {
            Ok(tokens) => {
                let applied = self.inner.credentials.apply_refresh(
                    &ticket,
                    SecretString::from(tokens.access_token),
                    tokens.refresh_token.map(SecretString::from),
                );
                match applied {
                    Ok(true) => {
                        info!("access token refreshed");
                        (RefreshOutcome::Refreshed, false)
                    }
                    Ok(false) => {
                        info!("session ended during refresh, discarding new token");
                        (RefreshOutcome::Failed, false)
                    }
                    Err(err) => {
                        error!("failed to persist refreshed tokens: {err}");
                        (RefreshOutcome::Failed, false)
                    }
                }
            }
            Err(err) => {
                warn!("token refresh failed: {err}");
                let rejected = matches!(
                    err,
                    ApiError::UnexpectedStatus { .. } | ApiError::Decode(_)
                );
                (RefreshOutcome::Failed, rejected)
            }
        };

        {
            let mut gate = self.inner.refresh.lock();
            if gate
                .in_flight
                .as_ref()
                .is_some_and(|(started, _)| *started == ticket.epoch)
            {
                gate.in_flight = None;
            }
            if rejected {
                gate.rejected = stale;
            }
        }

        sender.send_replace(Some(outcome));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_token_compares_exposed_values() {
        let a = SecretString::from("a".to_string());
        let a_again = SecretString::from("a".to_string());
        let b = SecretString::from("b".to_string());

        assert!(same_token(Some(&a), Some(&a_again)));
        assert!(!same_token(Some(&a), Some(&b)));
        assert!(!same_token(Some(&a), None));
        assert!(same_token(None, None));
    }

    #[tokio::test]
    async fn dropped_sender_is_not_joinable() {
        let (sender, receiver) = watch::channel(None::<RefreshOutcome>);
        assert!(receiver.has_changed().is_ok());
        drop(sender);
        assert!(receiver.has_changed().is_err());
    }
}
