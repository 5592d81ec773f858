use std::{sync::Arc, time::Instant};

use {
    tracing::{debug, info, warn},
    voxrelay_backend::{BackendClient, MediaSource, Reply, SubmissionRequest},
    voxrelay_common::UserId,
    voxrelay_sessions::{SessionHandle, SessionStore},
};

use crate::{
    event::InboundEvent,
    language,
    machine::{self, Effect, LANGUAGE_PROMPT, MENU_LABELS},
    outbound::ChatOutbound,
    supervisor::{Supervisor, TaskOutcome},
};

/// Drives conversations: one call to [`Engine::handle`] per inbound event.
#[derive(Clone)]
pub struct Engine {
    sessions: SessionStore,
    outbound: Arc<dyn ChatOutbound>,
    media: Arc<dyn MediaSource>,
    backend: BackendClient,
    supervisor: Supervisor,
}

impl Engine {
    pub fn new(
        sessions: SessionStore,
        outbound: Arc<dyn ChatOutbound>,
        media: Arc<dyn MediaSource>,
        backend: BackendClient,
        supervisor: Supervisor,
    ) -> Self {
        Self {
            sessions,
            outbound,
            media,
            backend,
            supervisor,
        }
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Apply one event: transition under the session lock, then perform the
    /// effects with the lock released.
    pub async fn handle(&self, event: InboundEvent) {
        let user_id = event.user;
        let session = self.sessions.get_or_create(user_id);
        let (from, to, effects) = session.with(|s| {
            let from = s.action;
            let effects = machine::transition(s, &event);
            (from, s.action, effects)
        });
        debug!(
            %user_id,
            event = event.kind_name(),
            %from,
            %to,
            effects = effects.len(),
            "conversation transition"
        );

        for effect in effects {
            self.apply(user_id, &session, effect).await;
        }
    }

    async fn apply(&self, user_id: UserId, session: &SessionHandle, effect: Effect) {
        let result = match effect {
            Effect::SendText(text) => self.outbound.send_text(user_id, &text).await,
            Effect::SendMenu { text } => {
                self.outbound
                    .send_keyboard(user_id, &text, &MENU_LABELS)
                    .await
            },
            Effect::SendLanguageSelection => {
                self.outbound
                    .send_inline_selection(user_id, LANGUAGE_PROMPT, &language::selection_rows())
                    .await
            },
            Effect::AcknowledgeSelection { selection_id, text } => {
                self.outbound
                    .acknowledge_selection(&selection_id, text.as_deref())
                    .await
            },
            Effect::Dispatch { request, cycle } => {
                self.dispatch(session.clone(), request, cycle);
                Ok(())
            },
        };
        if let Err(e) = result {
            warn!(%user_id, error = %e, "failed to deliver outbound message");
        }
    }

    fn dispatch(&self, session: SessionHandle, request: SubmissionRequest, cycle: u64) {
        let label = format!("{}:{}", request.action, request.user_id);
        let job = Submission {
            session,
            outbound: Arc::clone(&self.outbound),
            media: Arc::clone(&self.media),
            backend: self.backend.clone(),
            request,
            cycle,
        };
        self.supervisor.spawn(label, job.run());
    }
}

/// One detached backend submission.
struct Submission {
    session: SessionHandle,
    outbound: Arc<dyn ChatOutbound>,
    media: Arc<dyn MediaSource>,
    backend: BackendClient,
    request: SubmissionRequest,
    cycle: u64,
}

impl Submission {
    async fn run(self) -> TaskOutcome {
        let user_id = self.request.user_id;
        let action = self.request.action;
        let started = Instant::now();

        let outcome = match self.backend.submit(self.media.as_ref(), &self.request).await {
            Ok(Reply::Transcript(text)) => {
                let message = format!("Transcription:\n{text}");
                self.relay(self.outbound.send_text(user_id, &message).await)
            },
            Ok(Reply::Audio { data, filename, .. }) => {
                let size = data.len();
                match self.outbound.send_audio(user_id, data, &filename).await {
                    Ok(()) => {
                        debug!(%user_id, size, "relayed synthesized audio");
                        TaskOutcome::Completed
                    },
                    Err(e) => {
                        let message = format!("Error sending to backend: failed to send audio: {e}");
                        self.notify(&message).await;
                        TaskOutcome::Failed {
                            kind: "relay",
                            message: e.to_string(),
                        }
                    },
                }
            },
            Err(e) => {
                self.notify(&e.user_message()).await;
                TaskOutcome::Failed {
                    kind: e.kind(),
                    message: e.to_string(),
                }
            },
        };

        let reset = self.session.with(|s| s.finish_dispatch(self.cycle));
        info!(
            %user_id,
            %action,
            ok = matches!(outcome, TaskOutcome::Completed),
            reset,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "submission finished"
        );
        outcome
    }

    fn relay(&self, sent: anyhow::Result<()>) -> TaskOutcome {
        match sent {
            Ok(()) => TaskOutcome::Completed,
            Err(e) => {
                warn!(user_id = %self.request.user_id, error = %e, "failed to relay backend reply");
                TaskOutcome::Failed {
                    kind: "relay",
                    message: e.to_string(),
                }
            },
        }
    }

    async fn notify(&self, text: &str) {
        if let Err(e) = self.outbound.send_text(self.request.user_id, text).await {
            warn!(user_id = %self.request.user_id, error = %e, "failed to report submission error");
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{event::EventKind, outbound::SelectionOption},
        async_trait::async_trait,
        bytes::Bytes,
        futures::stream,
        std::{sync::Mutex, time::Duration},
        voxrelay_backend::{MediaLocation, MediaStream},
        voxrelay_common::MediaRef,
        voxrelay_config::BackendConfig,
        voxrelay_sessions::Action,
        wiremock::{
            Mock, MockServer, ResponseTemplate,
            matchers::{body_string_contains, method, path},
        },
    };

    const USER: UserId = UserId(42);

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Sent {
        Text(String),
        Keyboard(String, Vec<String>),
        Inline(String, Vec<Vec<SelectionOption>>),
        Audio(usize, String),
        Ack(String, Option<String>),
    }

    #[derive(Default)]
    struct RecordingOutbound {
        sent: Mutex<Vec<Sent>>,
        fail: bool,
    }

    impl RecordingOutbound {
        fn record(&self, sent: Sent) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(sent);
            if self.fail {
                anyhow::bail!("chat platform unavailable");
            }
            Ok(())
        }

        fn sent(&self) -> Vec<Sent> {
            self.sent.lock().unwrap().clone()
        }

        fn texts(&self) -> Vec<String> {
            self.sent()
                .into_iter()
                .filter_map(|s| match s {
                    Sent::Text(t) => Some(t),
                    _ => None,
                })
                .collect()
        }
    }

    #[async_trait]
    impl ChatOutbound for RecordingOutbound {
        async fn send_text(&self, _to: UserId, text: &str) -> anyhow::Result<()> {
            self.record(Sent::Text(text.into()))
        }

        async fn send_keyboard(&self, _to: UserId, text: &str, labels: &[&str]) -> anyhow::Result<()> {
            self.record(Sent::Keyboard(
                text.into(),
                labels.iter().map(|l| (*l).to_string()).collect(),
            ))
        }

        async fn send_inline_selection(
            &self,
            _to: UserId,
            text: &str,
            rows: &[Vec<SelectionOption>],
        ) -> anyhow::Result<()> {
            self.record(Sent::Inline(text.into(), rows.to_vec()))
        }

        async fn send_audio(&self, _to: UserId, data: Bytes, filename: &str) -> anyhow::Result<()> {
            self.record(Sent::Audio(data.len(), filename.into()))
        }

        async fn acknowledge_selection(
            &self,
            selection_id: &str,
            text: Option<&str>,
        ) -> anyhow::Result<()> {
            self.record(Sent::Ack(selection_id.into(), text.map(str::to_owned)))
        }
    }

    #[derive(Default)]
    struct FakeMedia {
        resolved: Mutex<Vec<MediaRef>>,
    }

    #[async_trait]
    impl MediaSource for FakeMedia {
        async fn resolve(&self, media_ref: &MediaRef) -> anyhow::Result<MediaLocation> {
            self.resolved.lock().unwrap().push(media_ref.clone());
            Ok(MediaLocation {
                path: "voice/file_1.oga".into(),
                size: Some(8),
            })
        }

        async fn fetch_stream(&self, _location: &MediaLocation) -> anyhow::Result<MediaStream> {
            Ok(Box::pin(stream::iter(vec![Ok(Bytes::from_static(b"OggS1234"))])))
        }
    }

    struct Harness {
        engine: Engine,
        outbound: Arc<RecordingOutbound>,
        media: Arc<FakeMedia>,
        supervisor: crate::supervisor::SupervisorHandle,
    }

    impl Harness {
        fn new(server: &MockServer) -> Self {
            Self::with_outbound(server, RecordingOutbound::default())
        }

        fn with_outbound(server: &MockServer, outbound: RecordingOutbound) -> Self {
            let outbound = Arc::new(outbound);
            let media = Arc::new(FakeMedia::default());
            let backend = BackendClient::from_config(&BackendConfig {
                base_url: server.uri(),
                timeout_secs: 5,
                ..Default::default()
            })
            .unwrap();
            let (supervisor, handle) = Supervisor::start();
            let engine = Engine::new(
                SessionStore::new(),
                outbound.clone(),
                media.clone(),
                backend,
                supervisor,
            );
            Self {
                engine,
                outbound,
                media,
                supervisor: handle,
            }
        }

        async fn send(&self, text: &str) {
            self.engine
                .handle(InboundEvent::from_text(USER, Some("alice".into()), text))
                .await;
        }

        async fn attach(&self, id: &str) {
            self.engine
                .handle(InboundEvent {
                    user: USER,
                    sender_name: Some("alice".into()),
                    kind: EventKind::Media {
                        media_ref: MediaRef::new(id),
                    },
                })
                .await;
        }

        async fn select(&self, payload: &str) {
            self.engine
                .handle(InboundEvent {
                    user: USER,
                    sender_name: Some("alice".into()),
                    kind: EventKind::Selection {
                        selection_id: "cb-9".into(),
                        payload: payload.into(),
                    },
                })
                .await;
        }

        fn action(&self) -> Action {
            self.engine
                .sessions()
                .get(USER)
                .map(|s| s.snapshot().action)
                .unwrap_or_default()
        }

        async fn drain(self) -> (Arc<RecordingOutbound>, Arc<FakeMedia>, SessionStore) {
            assert!(self.supervisor.shutdown(Duration::from_secs(10)).await);
            (self.outbound, self.media, self.engine.sessions)
        }
    }

    #[tokio::test]
    async fn transcription_is_relayed_with_prefix() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/transcribe"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "text": "hello" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let harness = Harness::new(&server);
        harness.send("Transcribe").await;
        harness.attach("voice-1").await;
        assert_eq!(harness.action(), Action::None);

        let (outbound, media, sessions) = harness.drain().await;
        assert_eq!(outbound.texts(), vec![
            "Now, send a file (mp4, mp3, ogg, wav).".to_string(),
            "Please wait...".to_string(),
            "Transcription:\nhello".to_string(),
        ]);
        assert_eq!(*media.resolved.lock().unwrap(), vec![MediaRef::new("voice-1")]);
        assert_eq!(sessions.get(USER).unwrap().snapshot().action, Action::None);
    }

    #[tokio::test]
    async fn synthesis_scenario_submits_text_language_and_media() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/synthesize"))
            .and(body_string_contains("Good morning"))
            .and(body_string_contains("name=\"language\""))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 40]))
            .expect(1)
            .mount(&server)
            .await;

        let harness = Harness::new(&server);
        harness.send("Synthesize").await;
        harness.attach("audio-7").await;
        harness.send("Good morning").await;
        assert_eq!(harness.action(), Action::AwaitLanguage);
        harness.select("lang_fr").await;

        let (outbound, media, sessions) = harness.drain().await;
        let sent = outbound.sent();
        assert!(matches!(&sent[2], Sent::Inline(prompt, rows)
            if prompt == LANGUAGE_PROMPT && rows.len() == 3));
        assert_eq!(sent[3], Sent::Ack("cb-9".into(), Some("Language set to: fr".into())));
        assert_eq!(sent[4], Sent::Text("Processing...".into()));
        assert_eq!(sent[5], Sent::Audio(40, "result.wav".into()));
        assert_eq!(*media.resolved.lock().unwrap(), vec![MediaRef::new("audio-7")]);

        let session = sessions.get(USER).unwrap().snapshot();
        assert_eq!(session.action, Action::None);
        assert_eq!(session.language, "fr");
        assert_eq!(session.text_input, "Good morning");

        let requests = server.received_requests().await.unwrap();
        let body = String::from_utf8_lossy(&requests[0].body).into_owned();
        assert!(body.contains("\r\n\r\nfr\r\n"), "language field missing: {body}");
    }

    #[tokio::test]
    async fn backend_error_is_reported_and_action_reset() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let harness = Harness::new(&server);
        harness.send("Transcribe").await;
        harness.attach("voice-1").await;

        let (outbound, _, sessions) = harness.drain().await;
        assert_eq!(
            outbound.texts().last().map(String::as_str),
            Some("Error sending to backend: backend returned error: 500 Internal Server Error")
        );
        assert_eq!(sessions.get(USER).unwrap().snapshot().action, Action::None);
    }

    #[tokio::test]
    async fn unmatched_events_get_menu_keyboard() {
        let server = MockServer::start().await;
        let harness = Harness::new(&server);

        harness.send("hello").await;
        harness.select("lang_de").await;

        let (outbound, ..) = harness.drain().await;
        let menu = Sent::Keyboard("alice, please choose an action:".into(), vec![
            "Transcribe".into(),
            "Synthesize".into(),
        ]);
        assert_eq!(outbound.sent(), vec![
            menu.clone(),
            Sent::Ack("cb-9".into(), None),
            menu,
        ]);
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn outbound_failures_do_not_stop_the_conversation() {
        let server = MockServer::start().await;
        let harness = Harness::with_outbound(&server, RecordingOutbound {
            fail: true,
            ..Default::default()
        });

        harness.send("Synthesize").await;
        harness.attach("a").await;
        harness.send("text").await;

        assert_eq!(harness.action(), Action::AwaitLanguage);
        let (outbound, ..) = harness.drain().await;
        assert_eq!(outbound.sent().len(), 3);
    }

    #[tokio::test]
    async fn slow_submission_does_not_clobber_a_new_cycle() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "text": "late" }))
                    .set_delay(Duration::from_millis(200)),
            )
            .mount(&server)
            .await;

        let harness = Harness::new(&server);
        harness.send("Transcribe").await;
        harness.attach("voice-1").await;
        harness.send("Synthesize").await;

        let (outbound, _, sessions) = harness.drain().await;
        assert_eq!(
            sessions.get(USER).unwrap().snapshot().action,
            Action::Synthesize
        );
        assert_eq!(
            outbound.texts().last().map(String::as_str),
            Some("Transcription:\nlate")
        );
    }
}
