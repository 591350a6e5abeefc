/*
[INPUT]:  Server challenge messages and optional API credentials
[OUTPUT]: Signed auth commands and observable authentication state
[POS]:    WebSocket layer - challenge/answer authentication
[UPDATE]: When the auth command format or state transitions change
*/

use tokio::sync::watch;
use tracing::{info, warn};

use crate::auth::Credentials;

use super::message::Command;

/// Authentication progress of one stream connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    ChallengeReceived,
    AnswerSent,
    Authenticated,
    /// Challenge seen but no credentials configured
    Skipped,
}

#[derive(Debug)]
pub(crate) struct Handshake {
    credentials: Option<Credentials>,
    state: watch::Sender<AuthState>,
}

impl Handshake {
    pub(crate) fn new(credentials: Option<Credentials>) -> Self {
        let (state, _rx) = watch::channel(AuthState::Unauthenticated);
        Self { credentials, state }
    }

    /// Build the answer for a server challenge, if one can be sent
    pub(crate) fn on_challenge(&self, challenge: Option<&str>) -> Option<Command> {
        let Some(credentials) = &self.credentials else {
            info!("ws authentication disabled; no credentials configured");
            self.state.send_replace(AuthState::Skipped);
            return None;
        };

        let Some(challenge) = challenge else {
            warn!("ws challenge message missing msg field");
            return None;
        };

        self.state.send_replace(AuthState::ChallengeReceived);
        let access_key = credentials.access_key();
        let answer = credentials.sign(format!("{access_key}{challenge}").as_bytes());

        Some(Command::Auth {
            access_key: access_key.to_string(),
            answer,
        })
    }

    pub(crate) fn on_answer_sent(&self) {
        self.state.send_if_modified(|state| {
            if *state == AuthState::ChallengeReceived {
                *state = AuthState::AnswerSent;
                true
            } else {
                false
            }
        });
    }

    pub(crate) fn on_authenticated(&self) {
        info!("ws authenticated");
        self.state.send_replace(AuthState::Authenticated);
    }

    pub(crate) fn state(&self) -> AuthState {
        *self.state.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }
}
