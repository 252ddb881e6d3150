//! The per-session dispatcher: histories, the turn loop, and
//! finalize-and-merge.

use crate::state::{switch_target, DeskState, RETURN_TRIGGER};
use frontdesk_core::error::{Error, StoreError};
use frontdesk_core::gateway::{Gateway, GatewayRequest};
use frontdesk_core::message::{Message, Role};
use frontdesk_store::{NewUser, RecordStore};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What the session does with accumulated history when a turn fails
/// mid-flight (gateway error after retries, or an exhausted transition
/// loop).
#[derive(Debug, Clone, Copy)]
pub struct TurnPolicy {
    /// Restore the pre-turn snapshot so the same user input can be
    /// retried without duplicate entries. The active state is restored
    /// along with the histories.
    pub rollback_history_on_failure: bool,
}

impl Default for TurnPolicy {
    fn default() -> Self {
        Self {
            rollback_history_on_failure: true,
        }
    }
}

/// Pre-turn snapshot: the active state and every history's length.
/// Histories only grow between snapshot and failure (finalize, the one
/// shrinking operation, cannot fail), so truncation restores them.
struct TurnSnapshot {
    active: DeskState,
    lengths: Vec<(DeskState, usize)>,
}

/// A single user's dialogue session.
///
/// Owns one message history per state and the active-state pointer. Turns
/// are strictly sequential: `turn` takes `&mut self` and fully completes
/// (including any internal state-switch re-invocations of the gateway)
/// before the next input is accepted.
pub struct DeskSession {
    gateway: Arc<dyn Gateway>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    store: Arc<RecordStore>,
    histories: HashMap<DeskState, Vec<Message>>,
    active: DeskState,
    policy: TurnPolicy,
}

impl DeskSession {
    /// Create a session in the main state with fresh histories.
    pub fn new(
        gateway: Arc<dyn Gateway>,
        model: impl Into<String>,
        temperature: f32,
        store: Arc<RecordStore>,
    ) -> Self {
        let histories = DeskState::ALL
            .into_iter()
            .map(|state| (state, vec![Message::system(state.instruction())]))
            .collect();

        Self {
            gateway,
            model: model.into(),
            temperature,
            max_tokens: None,
            store,
            histories,
            active: DeskState::Main,
            policy: TurnPolicy::default(),
        }
    }

    /// Set the max tokens per completion.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Set the failure-handling policy.
    pub fn with_policy(mut self, policy: TurnPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The currently active state.
    pub fn active_state(&self) -> DeskState {
        self.active
    }

    /// Read access to one state's history.
    pub fn history(&self, state: DeskState) -> &[Message] {
        self.histories.get(&state).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Force the session back to the main state without touching any
    /// history. Used by drivers that opt into reset-on-error.
    pub fn reset_to_main(&mut self) {
        self.active = DeskState::Main;
    }

    /// Process one user input and return the reply to show.
    ///
    /// On failure the session is restored per [`TurnPolicy`]; the active
    /// state is always rolled back for an exhausted transition loop.
    pub async fn turn(&mut self, user_input: &str) -> frontdesk_core::Result<String> {
        let snapshot = self.snapshot();

        match self.run_turn(user_input).await {
            Ok(reply) => Ok(reply),
            Err(e) => {
                if self.policy.rollback_history_on_failure {
                    self.restore(snapshot);
                } else if matches!(e, Error::ExhaustedTransitions { .. }) {
                    self.active = snapshot.active;
                }
                Err(e)
            }
        }
    }

    /// The turn protocol: append, complete, scan for triggers, branch.
    async fn run_turn(&mut self, user_input: &str) -> frontdesk_core::Result<String> {
        let mut state = self.active;
        self.history_mut(state).push(Message::user(user_input));

        // A well-behaved model emits at most one switch per turn; a cycle
        // through triggers indicates a malfunctioning upstream, so the
        // synchronous re-invocation loop is capped.
        let limit = DeskState::ALL.len() + 1;
        for _ in 0..limit {
            let request = self.request_for(state);
            let response = self.gateway.complete(request).await?;
            let text = response.message.content;

            if let Some(target) = switch_target(&text, state) {
                debug!(from = ?state, to = ?target, "Switch trigger detected");
                self.history_mut(state).push(Message::assistant(&text));

                // Carry the original request into the new state's
                // transcript so the sub-dialogue knows what was asked.
                let target_history = self.history_mut(target);
                if target_history.last().map(|m| m.role) != Some(Role::User) {
                    target_history.push(Message::user(user_input));
                }

                self.active = target;
                state = target;
                continue;
            }

            if text.contains(RETURN_TRIGGER) && state != DeskState::Main {
                return Ok(self.finalize(state, text).await);
            }

            // Plain continuation — including a stray return trigger while
            // already in Main, where there is nothing to finalize.
            self.history_mut(state).push(Message::assistant(&text));
            return Ok(text);
        }

        Err(Error::ExhaustedTransitions { limit })
    }

    /// Finalize a sub-dialogue: extract fields from its terminal reply,
    /// apply the store operation, annotate the reply with the real
    /// outcome, merge the transcript into the main history, and reset the
    /// sub-dialogue for clean reuse.
    async fn finalize(&mut self, state: DeskState, text: String) -> String {
        let suffix = self.apply_store_operation(state, &text).await;
        let reply = format!("{text}{suffix}");

        // The persisted transcript and the user-visible reply are
        // identical: both carry the store outcome, not just the model's
        // unconfirmed claim.
        self.history_mut(state).push(Message::assistant(&reply));

        // Hand the transcript (minus the system instruction) to Main and
        // reseed the sub-dialogue with its original instruction.
        let mut transcript = vec![Message::system(state.instruction())];
        std::mem::swap(self.history_mut(state), &mut transcript);
        self.history_mut(DeskState::Main)
            .extend(transcript.into_iter().skip(1));

        self.active = DeskState::Main;
        info!(state = ?state, "Sub-dialogue finalized, transcript merged into main history");
        reply
    }

    /// Run the store operation for a finished sub-dialogue and compose
    /// the outcome suffix. Extraction and credential failures are
    /// recovered here: the turn still completes, the store is untouched,
    /// and the suffix says what actually happened.
    async fn apply_store_operation(&self, state: DeskState, text: &str) -> String {
        match state {
            DeskState::Registration => match frontdesk_extract::registration(text) {
                Ok(fields) => {
                    let id = self
                        .store
                        .create(NewUser {
                            name: fields.name,
                            gender: fields.gender,
                            age: fields.age,
                            password: fields.password,
                            email: fields.email,
                        })
                        .await;
                    format!(" (您的用户 ID 是: {id})")
                }
                Err(e) => {
                    warn!(error = %e, "Registration extraction failed, record not stored");
                    " (错误：注册信息解析失败，未能存储用户)".to_string()
                }
            },
            DeskState::Lookup => match frontdesk_extract::lookup(text) {
                Ok(fields) => match self.store.read(fields.user_id, &fields.password).await {
                    Ok(profile) => format!(" \n查询成功！您的信息如下： {profile}"),
                    Err(StoreError::NotFound) => " \n查询失败：用户ID或密码错误。".to_string(),
                },
                Err(e) => {
                    warn!(error = %e, "Lookup extraction failed");
                    " (错误：查询信息解析失败)".to_string()
                }
            },
            DeskState::Deletion => match frontdesk_extract::deletion(text) {
                Ok(fields) => match self
                    .store
                    .delete(fields.user_id, &fields.password, &fields.email)
                    .await
                {
                    Ok(()) => " \n用户删除成功！".to_string(),
                    Err(StoreError::NotFound) => " \n删除失败：用户信息不匹配。".to_string(),
                },
                Err(e) => {
                    warn!(error = %e, "Deletion extraction failed");
                    " (错误：删除信息解析失败)".to_string()
                }
            },
            // finalize is only ever invoked for sub-dialogues
            DeskState::Main => String::new(),
        }
    }

    fn request_for(&self, state: DeskState) -> GatewayRequest {
        GatewayRequest {
            model: self.model.clone(),
            messages: self.history(state).to_vec(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    fn history_mut(&mut self, state: DeskState) -> &mut Vec<Message> {
        self.histories
            .entry(state)
            .or_insert_with(|| vec![Message::system(state.instruction())])
    }

    fn snapshot(&self) -> TurnSnapshot {
        TurnSnapshot {
            active: self.active,
            lengths: self
                .histories
                .iter()
                .map(|(state, history)| (*state, history.len()))
                .collect(),
        }
    }

    fn restore(&mut self, snapshot: TurnSnapshot) {
        for (state, length) in snapshot.lengths {
            if let Some(history) = self.histories.get_mut(&state) {
                history.truncate(length);
            }
        }
        self.active = snapshot.active;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::SequentialMockGateway;
    use frontdesk_core::error::GatewayError;

    const REGISTRATION_FINAL: &str = "注册成功！用户信息：[姓名: 张三, 性别: 男, 年龄: 25, \
         密码: pass1, 邮箱: a@b.com] 现在交还给 customer service。";

    fn session_with(gateway: SequentialMockGateway) -> DeskSession {
        DeskSession::new(
            Arc::new(gateway),
            "mock-model",
            0.7,
            Arc::new(RecordStore::new()),
        )
    }

    #[tokio::test]
    async fn plain_turn_grows_active_history_by_two() {
        let mut session =
            session_with(SequentialMockGateway::from_texts(&["您好，请问需要什么帮助？"]));

        let reply = session.turn("你好").await.unwrap();
        assert_eq!(reply, "您好，请问需要什么帮助？");
        assert_eq!(session.active_state(), DeskState::Main);

        let main = session.history(DeskState::Main);
        assert_eq!(main.len(), 3); // system + user + assistant
        assert_eq!(main[1].role, Role::User);
        assert_eq!(main[2].role, Role::Assistant);

        // Sub-dialogue histories untouched
        for state in [DeskState::Registration, DeskState::Lookup, DeskState::Deletion] {
            assert_eq!(session.history(state).len(), 1);
        }
    }

    #[tokio::test]
    async fn triggerless_turns_leave_state_invariant() {
        let mut session = session_with(SequentialMockGateway::from_texts(&[
            "第一轮回复",
            "第二轮回复",
            "第三轮回复",
        ]));

        for (i, input) in ["一", "二", "三"].iter().enumerate() {
            session.turn(input).await.unwrap();
            assert_eq!(session.active_state(), DeskState::Main);
            assert_eq!(session.history(DeskState::Main).len(), 1 + 2 * (i + 1));
        }
    }

    #[tokio::test]
    async fn switch_enters_sub_dialogue_and_carries_user_input() {
        let mut session = session_with(SequentialMockGateway::from_texts(&[
            "好的，我正在为您调用 registered workers。",
            "请提供您的姓名、性别和年龄。",
        ]));

        let reply = session.turn("我想注册一个账号").await.unwrap();
        assert_eq!(reply, "请提供您的姓名、性别和年龄。");
        assert_eq!(session.active_state(), DeskState::Registration);

        let registration = session.history(DeskState::Registration);
        assert_eq!(registration.len(), 3);
        assert_eq!(registration[0].role, Role::System);
        assert_eq!(registration[1].role, Role::User);
        assert_eq!(registration[1].content, "我想注册一个账号");
        assert_eq!(registration[2].role, Role::Assistant);

        // Main kept the routing exchange
        let main = session.history(DeskState::Main);
        assert_eq!(main.len(), 3);
        assert!(main[2].content.contains("registered workers"));
    }

    #[tokio::test]
    async fn finalize_merges_transcript_and_resets_sub_dialogue() {
        let mut session = session_with(SequentialMockGateway::from_texts(&[
            "好的，我正在为您调用 registered workers。",
            REGISTRATION_FINAL,
        ]));

        let reply = session.turn("注册：张三，男，25，密码pass1，邮箱a@b.com").await.unwrap();

        // The reply carries the real store outcome
        assert!(reply.contains("您的用户 ID 是: 10001"), "{reply}");
        assert_eq!(session.active_state(), DeskState::Main);

        // Sub-dialogue reset to a single fresh system entry
        let registration = session.history(DeskState::Registration);
        assert_eq!(registration.len(), 1);
        assert_eq!(registration[0].role, Role::System);

        // Main accumulated: its own exchange plus the merged transcript
        // (user + annotated assistant), in original order
        let main = session.history(DeskState::Main);
        assert_eq!(main.len(), 5);
        assert_eq!(main[3].role, Role::User);
        assert_eq!(main[4].role, Role::Assistant);
        assert!(main[4].content.ends_with("(您的用户 ID 是: 10001)"));
    }

    #[tokio::test]
    async fn finalized_registration_is_readable_from_store() {
        let store = Arc::new(RecordStore::new());
        let gateway = SequentialMockGateway::from_texts(&[
            "调用 registered workers。",
            REGISTRATION_FINAL,
        ]);
        let mut session =
            DeskSession::new(Arc::new(gateway), "mock-model", 0.7, store.clone());

        session.turn("我要注册").await.unwrap();

        let profile = store.read(10001, "pass1").await.unwrap();
        assert_eq!(profile.name, "张三");
        assert_eq!(profile.email, "a@b.com");
    }

    #[tokio::test]
    async fn return_trigger_in_main_is_plain_continuation() {
        let mut session = session_with(SequentialMockGateway::from_texts(&[
            "我是您的 customer service，请问有什么可以帮您？",
        ]));

        let reply = session.turn("你好").await.unwrap();
        assert!(reply.contains("customer service"));
        assert_eq!(session.active_state(), DeskState::Main);
        assert_eq!(session.history(DeskState::Main).len(), 3);
    }

    #[tokio::test]
    async fn own_trigger_plus_return_trigger_finalizes() {
        // Get into the registration state first
        let mut session = session_with(SequentialMockGateway::from_texts(&[
            "调用 registered workers。",
            "请提供信息。",
            // Second turn: the reply repeats the state's own switch token,
            // which must not count as a switch; the return token wins.
            "注册成功！registered workers 完成。用户信息：[姓名: 李四, 性别: 女, 年龄: 30, \
             密码: pw2, 邮箱: c@d.com] 回到 customer service。",
        ]));

        session.turn("我要注册").await.unwrap();
        assert_eq!(session.active_state(), DeskState::Registration);

        let reply = session.turn("李四，女，30，pw2，c@d.com").await.unwrap();
        assert!(reply.contains("您的用户 ID 是: 10001"), "{reply}");
        assert_eq!(session.active_state(), DeskState::Main);
    }

    #[tokio::test]
    async fn extraction_failure_annotates_and_leaves_store_untouched() {
        let store = Arc::new(RecordStore::new());
        let gateway = SequentialMockGateway::from_texts(&[
            "调用 registered workers。",
            // Return trigger present but the data block is malformed
            "注册成功！用户信息：[姓名: 张三] 回到 customer service。",
        ]);
        let mut session =
            DeskSession::new(Arc::new(gateway), "mock-model", 0.7, store.clone());

        let reply = session.turn("我要注册").await.unwrap();
        assert!(reply.ends_with("(错误：注册信息解析失败，未能存储用户)"), "{reply}");
        assert_eq!(store.count().await, 0);
        // The sub-dialogue still finalized: merged and reset
        assert_eq!(session.active_state(), DeskState::Main);
        assert_eq!(session.history(DeskState::Registration).len(), 1);
    }

    #[tokio::test]
    async fn lookup_miss_is_reported_not_raised() {
        let mut session = session_with(SequentialMockGateway::from_texts(&[
            "调用 query workers。",
            "正在查询... 查询条件：[用户ID: 10001, 密码: wrong] 回到 customer service。",
        ]));

        let reply = session.turn("查询我的信息").await.unwrap();
        assert!(reply.contains("查询失败：用户ID或密码错误"), "{reply}");
        assert_eq!(session.active_state(), DeskState::Main);
    }

    #[tokio::test]
    async fn exhausted_transitions_rolls_back() {
        // A malfunctioning upstream that switches on every reply
        let mut session = session_with(SequentialMockGateway::from_texts(&[
            "registered workers",
            "query workers",
            "delete workers",
            "registered workers",
            "query workers",
            "delete workers",
        ]));

        let err = session.turn("你好").await.unwrap_err();
        assert!(matches!(err, Error::ExhaustedTransitions { limit: 5 }));

        // Default policy restores everything to the pre-turn snapshot
        assert_eq!(session.active_state(), DeskState::Main);
        for state in DeskState::ALL {
            assert_eq!(session.history(state).len(), 1, "{state:?}");
        }
    }

    #[tokio::test]
    async fn gateway_failure_rolls_back_and_allows_retry() {
        let mut session = session_with(SequentialMockGateway::new(vec![
            Err(GatewayError::Network("connection reset".into())),
            Ok(SequentialMockGateway::text_response("重试成功。")),
        ]));

        let err = session.turn("你好").await.unwrap_err();
        assert!(matches!(err, Error::Gateway(_)));
        // No partial append: the user entry was rolled back
        assert_eq!(session.history(DeskState::Main).len(), 1);

        // The same input can be retried cleanly
        let reply = session.turn("你好").await.unwrap();
        assert_eq!(reply, "重试成功。");
        assert_eq!(session.history(DeskState::Main).len(), 3);
    }

    #[tokio::test]
    async fn gateway_failure_without_rollback_keeps_user_entry() {
        let gateway = SequentialMockGateway::new(vec![Err(GatewayError::Network(
            "connection reset".into(),
        ))]);
        let mut session = session_with(gateway).with_policy(TurnPolicy {
            rollback_history_on_failure: false,
        });

        session.turn("你好").await.unwrap_err();
        let main = session.history(DeskState::Main);
        assert_eq!(main.len(), 2);
        assert_eq!(main[1].role, Role::User);
    }

    #[tokio::test]
    async fn reset_to_main_leaves_histories_alone() {
        let mut session = session_with(SequentialMockGateway::from_texts(&[
            "调用 registered workers。",
            "请提供信息。",
        ]));

        session.turn("我要注册").await.unwrap();
        assert_eq!(session.active_state(), DeskState::Registration);
        let registration_len = session.history(DeskState::Registration).len();

        session.reset_to_main();
        assert_eq!(session.active_state(), DeskState::Main);
        assert_eq!(session.history(DeskState::Registration).len(), registration_len);
    }
}
