use futures::StreamExt;
use tracing::{debug, instrument, warn};

use super::chat::{ChatApi, Message};
use super::error::ApiError;
use super::history::{Conversation, Role, TruncationPolicy, Turn};

/// System instruction for the advisor persona.
///
/// Four requirements are contractual: answers in Chinese, grounding strictly
/// in official Amazon policy, the explicit not-found phrase instead of
/// fabrication, and the trailing attribution line.
pub const ADVISOR_SYSTEM_INSTRUCTION: &str = "\
你是一位名为\"亚马逊合规专家\" (Amazon Professionalist) 的资深顾问。
你的核心原则是【真实性第一】。
1. 请务必使用【中文】回答所有问题。
2. 你的回答必须严格基于亚马逊官方服务条款 (TOS) 和政策。
3. 如果你不知道答案或找不到官方文件，请直接回答“未找到相关官方文件”，严禁编造政策。
4. 在每个实质性回答的末尾，必须附上：“参考来源：亚马逊卖家后台帮助文档”。
5. 回答格式要求清晰、专业，适当使用分点陈述。";

/// Transcript entry shown when the stream fails terminally.
pub const CHAT_ERROR_TEXT: &str = "抱歉，无法连接到知识库，请稍后重试。";

const DEFAULT_HISTORY_TURNS: usize = 20;

/// Drives a multi-turn advisory chat over a [`ChatApi`] client.
///
/// Owns the transcript and the single mutable in-flight turn. `send` is the
/// one suspension point: it resolves only once the fragment stream is
/// exhausted, invoking the caller's chunk callback for every non-empty
/// fragment on the way.
pub struct ChatSession<C> {
    client: C,
    conversation: Conversation,
    system_instruction: String,
    truncation: TruncationPolicy,
    in_flight: bool,
}

impl<C: ChatApi> ChatSession<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            conversation: Conversation::new(),
            system_instruction: ADVISOR_SYSTEM_INSTRUCTION.to_string(),
            truncation: TruncationPolicy::LastTurns(DEFAULT_HISTORY_TURNS),
            in_flight: false,
        }
    }

    #[must_use]
    pub fn with_truncation(mut self, policy: TruncationPolicy) -> Self {
        self.truncation = policy;
        self
    }

    #[must_use]
    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = instruction.into();
        self
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Whether a send is outstanding. Stays true if a `send` future was
    /// dropped mid-stream; see [`ChatSession::reset`].
    pub fn is_busy(&self) -> bool {
        self.in_flight
    }

    /// Clears an abandoned in-flight send, freezing whatever partial text the
    /// dropped stream had already appended.
    pub fn reset(&mut self) {
        self.in_flight = false;
    }

    /// Sends one user turn and streams the model's reply into the transcript.
    ///
    /// `on_chunk` is invoked synchronously for each non-empty fragment in
    /// arrival order; concatenating the invocations reproduces the final
    /// text of the model turn. On a terminal stream error the partial text
    /// is kept, the transcript gains an error-marked turn, and the error is
    /// returned to the caller. No automatic retry.
    #[instrument(skip(self, message, on_chunk))]
    pub async fn send(
        &mut self,
        message: &str,
        mut on_chunk: impl FnMut(&str),
    ) -> Result<(), ApiError> {
        if self.in_flight {
            return Err(ApiError::InvalidRequest(
                "chat session busy: a send is already in flight".to_string(),
            ));
        }

        let messages = self.build_messages(message);

        self.conversation.push(Turn::user(message));
        self.conversation.push(Turn::model(""));
        self.in_flight = true;

        let result = self.consume_stream(&messages, &mut on_chunk).await;
        self.in_flight = false;

        if let Err(ref e) = result {
            warn!(error = %e, "Chat stream failed; marking transcript entry");
            self.record_failure();
        } else {
            debug!(turns = self.conversation.len(), "Chat turn completed");
        }
        result
    }

    async fn consume_stream(
        &mut self,
        messages: &[Message],
        on_chunk: &mut impl FnMut(&str),
    ) -> Result<(), ApiError> {
        let mut stream = self.client.generate_stream(messages).await?;
        while let Some(item) = stream.next().await {
            let fragment = item?;
            if fragment.is_empty() {
                continue;
            }
            on_chunk(&fragment);
            self.conversation.append_to_last(&fragment);
        }
        Ok(())
    }

    /// Builds the request: system instruction, truncated prior history, then
    /// the new user message. Error-marked turns are transcript artifacts and
    /// are not resent.
    fn build_messages(&self, new_message: &str) -> Vec<Message> {
        let mut messages = vec![Message::system(self.system_instruction.clone())];
        for turn in self.truncation.apply(self.conversation.turns()) {
            if turn.is_error {
                continue;
            }
            messages.push(match turn.role {
                Role::User => Message::user(turn.text.clone()),
                Role::Model => Message::model(turn.text.clone()),
            });
        }
        messages.push(Message::user(new_message));
        messages
    }

    /// Turns the in-flight entry into the visible error entry. If fragments
    /// already arrived they are kept and a separate error turn follows.
    fn record_failure(&mut self) {
        match self.conversation.last_mut() {
            Some(last) if last.role == Role::Model && last.text.is_empty() => {
                last.text = CHAT_ERROR_TEXT.to_string();
                last.is_error = true;
            }
            _ => {
                let mut turn = Turn::model(CHAT_ERROR_TEXT);
                turn.is_error = true;
                self.conversation.push(turn);
            }
        }
    }
}
