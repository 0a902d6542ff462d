//! Lover-linking flow as an explicit state machine.
//!
//! Search a username, send a request, or pull a pending invite and accept or
//! decline it. Network calls happen only on the triggering methods. At most
//! one transition is in flight; a trigger arriving meanwhile is rejected with
//! `InvalidState` and leaves the state untouched.

use std::fmt;

use blinket_types::{LoverInvite, UserProfile};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::api;
use crate::error::{SyncError, SyncErrorKind, SyncResult};
use crate::http::{Auth, HttpClient};
use crate::session::SessionHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LinkState {
    #[default]
    Idle,
    Searching,
    Found,
    RequestSent,
    InviteReceived,
    Accepted,
    Declined,
    Failed,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LinkState::Idle => "idle",
            LinkState::Searching => "searching",
            LinkState::Found => "found",
            LinkState::RequestSent => "request_sent",
            LinkState::InviteReceived => "invite_received",
            LinkState::Accepted => "accepted",
            LinkState::Declined => "declined",
            LinkState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Why the flow ended in [`LinkState::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    NotFound,
    Network,
    Server,
    Rejected,
    SessionExpired,
    BadResponse,
    Storage,
}

impl FailureReason {
    pub fn from_error(err: &SyncError) -> Self {
        match err.kind {
            SyncErrorKind::NetworkFailure => FailureReason::Network,
            SyncErrorKind::ServerError => FailureReason::Server,
            SyncErrorKind::Unauthenticated => FailureReason::SessionExpired,
            SyncErrorKind::DecodeFailure => FailureReason::BadResponse,
            SyncErrorKind::StorageFailure => FailureReason::Storage,
            SyncErrorKind::ClientError if err.is_not_found() => FailureReason::NotFound,
            SyncErrorKind::ClientError
            | SyncErrorKind::InvalidState
            | SyncErrorKind::ValidationError => FailureReason::Rejected,
        }
    }
}

/// Observable state of the flow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RelationshipRequest {
    pub state: LinkState,
    /// Profile found by the last search.
    pub candidate: Option<UserProfile>,
    /// Invite pulled from the backend.
    pub invite: Option<LoverInvite>,
    /// Relationship identifier required to accept `invite`.
    pub couple_id: Option<String>,
    pub error: Option<SyncError>,
    pub reason: Option<FailureReason>,
    /// A network call for the current transition has not resolved yet.
    pub in_flight: bool,
    /// State [`RelationshipWorkflow::retry`] returns to from `Failed`.
    pub retry_to: Option<LinkState>,
    /// Bumped on dismissal; results issued under an older epoch are dropped.
    pub epoch: u64,
}

impl RelationshipRequest {
    fn reset(&mut self) {
        *self = RelationshipRequest {
            epoch: self.epoch,
            ..RelationshipRequest::default()
        };
    }

    fn fail(&mut self, err: SyncError, retry_to: Option<LinkState>) {
        self.state = LinkState::Failed;
        self.reason = Some(FailureReason::from_error(&err));
        self.error = Some(err);
        self.retry_to = retry_to;
    }
}

/// `data` of `GET /couple/LoverInvite`: a single invite or a list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InvitePayload {
    Many(Vec<LoverInvite>),
    One(LoverInvite),
}

impl InvitePayload {
    fn first(self) -> Option<LoverInvite> {
        match self {
            InvitePayload::Many(invites) => invites.into_iter().next(),
            InvitePayload::One(invite) => Some(invite),
        }
    }
}

pub struct RelationshipWorkflow {
    http: HttpClient,
    session: SessionHandle,
    state: watch::Sender<RelationshipRequest>,
}

impl fmt::Debug for RelationshipWorkflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationshipWorkflow")
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl RelationshipWorkflow {
    pub fn new(http: HttpClient, session: SessionHandle) -> Self {
        let (state, _) = watch::channel(RelationshipRequest::default());
        Self {
            http,
            session,
            state,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state.borrow().state
    }

    pub fn snapshot(&self) -> RelationshipRequest {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RelationshipRequest> {
        self.state.subscribe()
    }

    /// Looks up `query` as a username.
    ///
    /// A blank query, or the signed-in user's own name, leaves the flow in
    /// `Idle` with a `ValidationError` and sends nothing.
    ///
    /// # Errors
    /// `InvalidState` outside `Idle`/`Found`/`Failed`/`Declined` or while
    /// another transition is in flight.
    pub async fn search(&self, query: &str) -> SyncResult<LinkState> {
        const FROM: &[LinkState] = &[
            LinkState::Idle,
            LinkState::Found,
            LinkState::Failed,
            LinkState::Declined,
        ];

        let query = query.trim();
        let own_name = self.session.user().map(|user| user.user_name);
        let invalid = if query.is_empty() {
            Some(SyncError::validation("Enter a username to search"))
        } else if own_name.as_deref() == Some(query) {
            Some(SyncError::validation("You cannot link with yourself"))
        } else {
            None
        };
        if let Some(err) = invalid {
            self.transition("search", FROM, |req| {
                req.reset();
                req.error = Some(err);
                Ok(())
            })?;
            return Ok(LinkState::Idle);
        }

        let epoch = self.begin("search", FROM, |req| {
            req.reset();
            req.state = LinkState::Searching;
            Ok(())
        })?;

        let result = self
            .http
            .get_data::<Option<UserProfile>>(&api::find_by_user(query), Auth::Bearer)
            .await;

        Ok(self.finish(epoch, |req| match result {
            Ok(Some(profile)) if !profile.id.is_empty() => {
                req.state = LinkState::Found;
                req.candidate = Some(profile);
            }
            Ok(_) => req.fail(not_found(format!("No user named {query}")), None),
            Err(err) => req.fail(err, None),
        }))
    }

    /// Sends a link request to the found candidate.
    ///
    /// # Errors
    /// `InvalidState` outside `Found` or while another transition is in flight.
    pub async fn send_request(&self) -> SyncResult<LinkState> {
        let (epoch, user_id) = self.begin_with("send request", &[LinkState::Found], |req| {
            match req.candidate.as_ref().map(|candidate| candidate.id.clone()) {
                Some(id) if !id.is_empty() => Ok(id),
                _ => Err(SyncError::invalid_state("No candidate to send a request to")),
            }
        })?;

        let result = self
            .http
            .request(Method::POST, &api::send_request(&user_id), None, Auth::Bearer)
            .await;

        Ok(self.finish(epoch, |req| match result {
            Ok(_) => req.state = LinkState::RequestSent,
            Err(err) => req.fail(err, Some(LinkState::Found)),
        }))
    }

    /// Pulls a pending invite.
    ///
    /// "No invites" (404, null or an empty list) is a valid outcome: the flow
    /// stays `Idle` with no error.
    ///
    /// # Errors
    /// `InvalidState` outside `Idle`/`Declined` or while another transition is
    /// in flight.
    pub async fn pull_invites(&self) -> SyncResult<LinkState> {
        let epoch = self.begin(
            "pull invites",
            &[LinkState::Idle, LinkState::Declined],
            |req| {
                req.reset();
                Ok(())
            },
        )?;

        let result = self
            .http
            .get_data::<Option<InvitePayload>>(api::LOVER_INVITE, Auth::Bearer)
            .await;

        Ok(self.finish(epoch, |req| match result {
            Ok(payload) => match payload.and_then(InvitePayload::first) {
                Some(invite) => {
                    req.state = LinkState::InviteReceived;
                    req.couple_id = invite.couple_id.clone().filter(|id| !id.is_empty());
                    req.invite = Some(invite);
                }
                None => req.state = LinkState::Idle,
            },
            Err(err) if err.is_not_found() => {
                tracing::debug!("no pending invites");
                req.state = LinkState::Idle;
            }
            Err(err) => req.fail(err, None),
        }))
    }

    /// Accepts the pending invite.
    ///
    /// # Errors
    /// `InvalidState`, without a network call, outside `InviteReceived`, when
    /// the invite has no relationship identifier, or while another transition
    /// is in flight.
    pub async fn accept(&self) -> SyncResult<LinkState> {
        let (epoch, couple_id) =
            self.begin_with("accept", &[LinkState::InviteReceived], |req| {
                req.couple_id
                    .clone()
                    .ok_or_else(|| SyncError::invalid_state("Invite has no relationship id"))
            })?;

        let result = self
            .http
            .request(Method::POST, &api::accept_request(&couple_id), None, Auth::Bearer)
            .await;

        Ok(self.finish(epoch, |req| match result {
            Ok(_) => {
                tracing::info!(couple_id, "invite accepted");
                req.state = LinkState::Accepted;
            }
            Err(err) => req.fail(err, Some(LinkState::InviteReceived)),
        }))
    }

    /// Declines the pending invite locally. A later pull may receive a new one.
    ///
    /// # Errors
    /// `InvalidState` outside `InviteReceived`.
    pub fn decline(&self) -> SyncResult<LinkState> {
        self.transition("decline", &[LinkState::InviteReceived], |req| {
            req.state = LinkState::Declined;
            req.invite = None;
            req.couple_id = None;
            Ok(LinkState::Declined)
        })
    }

    /// Leaves `Failed` for the state the failed step started from.
    ///
    /// # Errors
    /// `InvalidState` outside `Failed`.
    pub fn retry(&self) -> SyncResult<LinkState> {
        self.transition("retry", &[LinkState::Failed], |req| {
            req.state = req.retry_to.take().unwrap_or_default();
            req.error = None;
            req.reason = None;
            Ok(req.state)
        })
    }

    /// Resets to `Idle` from any state. A result still in flight is discarded
    /// when it arrives.
    pub fn dismiss(&self) -> LinkState {
        self.state.send_modify(|req| {
            *req = RelationshipRequest {
                epoch: req.epoch + 1,
                ..RelationshipRequest::default()
            };
        });
        LinkState::Idle
    }

    /// Checks the guards and applies `apply` atomically. Nothing changes
    /// when a guard or `apply` fails; `apply` must not mutate before failing.
    fn transition<T>(
        &self,
        action: &str,
        allowed: &[LinkState],
        apply: impl FnOnce(&mut RelationshipRequest) -> SyncResult<T>,
    ) -> SyncResult<T> {
        let mut outcome = None;
        self.state.send_if_modified(|req| {
            if req.in_flight {
                outcome = Some(Err(SyncError::invalid_state(format!(
                    "Cannot {action}: another step is still running"
                ))));
                return false;
            }
            if !allowed.contains(&req.state) {
                outcome = Some(Err(SyncError::invalid_state(format!(
                    "Cannot {action} while {}",
                    req.state
                ))));
                return false;
            }
            let result = apply(req);
            let modified = result.is_ok();
            outcome = Some(result);
            modified
        });
        outcome.unwrap_or_else(|| Err(SyncError::invalid_state(format!("Cannot {action}"))))
    }

    fn begin(
        &self,
        action: &str,
        allowed: &[LinkState],
        enter: impl FnOnce(&mut RelationshipRequest) -> SyncResult<()>,
    ) -> SyncResult<u64> {
        self.begin_with(action, allowed, enter).map(|(epoch, ())| epoch)
    }

    fn begin_with<T>(
        &self,
        action: &str,
        allowed: &[LinkState],
        enter: impl FnOnce(&mut RelationshipRequest) -> SyncResult<T>,
    ) -> SyncResult<(u64, T)> {
        self.transition(action, allowed, |req| {
            let value = enter(req)?;
            req.in_flight = true;
            req.error = None;
            req.reason = None;
            req.retry_to = None;
            Ok((req.epoch, value))
        })
    }

    fn finish(&self, epoch: u64, apply: impl FnOnce(&mut RelationshipRequest)) -> LinkState {
        let mut current = LinkState::Idle;
        self.state.send_if_modified(|req| {
            current = req.state;
            if req.epoch != epoch {
                tracing::debug!(epoch, latest = req.epoch, "discarding result of dismissed step");
                return false;
            }
            req.in_flight = false;
            apply(req);
            current = req.state;
            true
        });
        current
    }
}

fn not_found(message: String) -> SyncError {
    SyncError {
        status: Some(404),
        ..SyncError::new(SyncErrorKind::ClientError, message)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::credentials::MemoryCredentialStore;
    use crate::session::SessionController;

    fn workflow() -> RelationshipWorkflow {
        // Port 9 is never contacted: every test here fails before the network.
        let http = HttpClient::new("http://127.0.0.1:9", Arc::new(MemoryCredentialStore::new()));
        SessionController::new(http).relationship()
    }

    #[tokio::test]
    async fn test_empty_query_stays_idle_with_validation_error() {
        let flow = workflow();
        assert_eq!(flow.search("   ").await.unwrap(), LinkState::Idle);

        let snapshot = flow.snapshot();
        assert_eq!(snapshot.state, LinkState::Idle);
        assert!(!snapshot.in_flight);
        assert_eq!(
            snapshot.error.map(|err| err.kind),
            Some(SyncErrorKind::ValidationError)
        );
    }

    #[test]
    fn test_local_transitions_guarded() {
        let flow = workflow();
        assert_eq!(
            flow.decline().unwrap_err().kind,
            SyncErrorKind::InvalidState
        );
        assert_eq!(flow.retry().unwrap_err().kind, SyncErrorKind::InvalidState);
        assert_eq!(flow.state(), LinkState::Idle);
    }

    #[tokio::test]
    async fn test_accept_outside_invite_received_is_invalid_state() {
        let flow = workflow();
        let err = flow.accept().await.unwrap_err();
        assert_eq!(err.kind, SyncErrorKind::InvalidState);
        assert_eq!(flow.snapshot(), RelationshipRequest::default());
    }

    #[tokio::test]
    async fn test_accept_without_relationship_id_is_invalid_state() {
        let flow = workflow();
        flow.state.send_modify(|req| {
            req.state = LinkState::InviteReceived;
            req.invite = Some(LoverInvite::default());
        });

        let err = flow.accept().await.unwrap_err();
        assert_eq!(err.kind, SyncErrorKind::InvalidState);
        assert_eq!(flow.state(), LinkState::InviteReceived);
        assert!(!flow.snapshot().in_flight);
    }

    #[tokio::test]
    async fn test_trigger_while_in_flight_is_rejected() {
        let flow = workflow();
        flow.state.send_modify(|req| {
            req.state = LinkState::Searching;
            req.in_flight = true;
        });

        let err = flow.search("alice").await.unwrap_err();
        assert_eq!(err.kind, SyncErrorKind::InvalidState);
        assert_eq!(flow.state(), LinkState::Searching);
    }

    #[test]
    fn test_dismiss_discards_late_result() {
        let flow = workflow();
        let epoch = flow
            .begin("pull invites", &[LinkState::Idle], |_| Ok(()))
            .unwrap();

        assert_eq!(flow.dismiss(), LinkState::Idle);
        let state = flow.finish(epoch, |req| req.state = LinkState::InviteReceived);

        assert_eq!(state, LinkState::Idle);
        assert!(!flow.snapshot().in_flight);
        assert_eq!(flow.snapshot().epoch, epoch + 1);
    }

    #[test]
    fn test_retry_returns_to_origin() {
        let flow = workflow();
        flow.state.send_modify(|req| {
            req.state = LinkState::Found;
            req.candidate = Some(UserProfile::default());
            req.fail(SyncError::network("offline"), Some(LinkState::Found));
        });
        assert_eq!(flow.snapshot().reason, Some(FailureReason::Network));

        assert_eq!(flow.retry().unwrap(), LinkState::Found);
        let snapshot = flow.snapshot();
        assert!(snapshot.error.is_none());
        assert!(snapshot.candidate.is_some());
    }

    #[test]
    fn test_failure_reason_mapping() {
        assert_eq!(
            FailureReason::from_error(&not_found("x".to_string())),
            FailureReason::NotFound
        );
        assert_eq!(
            FailureReason::from_error(&SyncError::http_status(500, "")),
            FailureReason::Server
        );
        assert_eq!(
            FailureReason::from_error(&SyncError::http_status(401, "")),
            FailureReason::SessionExpired
        );
        assert_eq!(
            FailureReason::from_error(&SyncError::http_status(409, "")),
            FailureReason::Rejected
        );
    }

    #[test]
    fn test_invite_payload_shapes() {
        let many: InvitePayload = serde_json::from_str(r#"[{"_id":"c1"},{"_id":"c2"}]"#).unwrap();
        assert_eq!(many.first().unwrap().couple_id.as_deref(), Some("c1"));

        let empty: InvitePayload = serde_json::from_str("[]").unwrap();
        assert!(empty.first().is_none());

        let one: InvitePayload = serde_json::from_str(r#"{"coupleId":"c3"}"#).unwrap();
        assert_eq!(one.first().unwrap().couple_id.as_deref(), Some("c3"));
    }
}
