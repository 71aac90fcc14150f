//! Turn controller — the per-turn agentic loop.
//!
//! One turn runs: assemble prompt, call the provider, repair and parse the
//! response, review proposals against policy, dispatch the approved ones,
//! fold the results back into the next prompt. The loop repeats until the
//! mode's completion condition holds or the iteration ceiling is reached;
//! at the ceiling the controller returns a best-effort answer rather than
//! an error.
//!
//! Tool failures never abort the turn: they travel as error-carrying
//! `ToolResult`s and get echoed to the model like any other result.
//! Provider failures are retried briefly and then absorbed if any usable
//! text was produced earlier in the turn.

use std::sync::Arc;
use tracing::{debug, warn};

use hearthloop_config::AppConfig;
use hearthloop_core::{
    ChatRequest, ContextProvider, Error, InferenceProvider, Message, PassthroughContext,
    ResearchPhase, Result, Session, SessionMode, ToolKind, ToolRegistry,
};

use crate::compactor::Compactor;
use crate::dispatch::ToolDispatcher;
use crate::parser::{extract_plan, repair_truncated_tags, ParserChain};
use crate::policy::ToolPolicy;
use crate::prompt::{
    build_extra_messages, render_manifest, system_preamble, ManifestStyle, SYNTHESIS_MARKERS,
};
use crate::tracker::ResearchTracker;

/// Tool calls a quick-lookup turn may spend in total.
const QUICK_LOOKUP_TOOL_BUDGET: usize = 2;

/// Consecutive provider failures tolerated before the turn gives up on
/// further model calls.
const PROVIDER_RETRIES: usize = 2;

/// Research correctives (plan nudge, continue nudge, synthesis rewrite)
/// issued before the turn settles for the best available text. Keeps a
/// stubborn model from burning the whole iteration ceiling on rewrites.
const RESEARCH_CORRECTIVE_RETRIES: usize = 3;

/// What a finished turn reports back to the caller.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// The assistant's answer, already appended to the conversation
    pub answer: String,

    /// Loop iterations consumed
    pub iterations: u32,

    /// Tool calls dispatched
    pub tool_calls: usize,

    /// Whether the turn ended at the iteration ceiling (best-effort answer)
    pub ceiling_hit: bool,

    /// Final research state, present for Research-mode turns
    pub research: Option<ResearchTracker>,
}

/// Drives one turn of the agent loop for a session.
pub struct TurnController {
    provider: Arc<dyn InferenceProvider>,
    registry: Arc<ToolRegistry>,
    policy: ToolPolicy,
    context: Arc<dyn ContextProvider>,
    config: AppConfig,
    manifest_style: ManifestStyle,
}

impl TurnController {
    pub fn new(
        provider: Arc<dyn InferenceProvider>,
        registry: Arc<ToolRegistry>,
        config: AppConfig,
    ) -> Self {
        let policy = ToolPolicy::standard(&config.policy);
        Self {
            provider,
            registry,
            policy,
            context: Arc::new(PassthroughContext),
            config,
            manifest_style: ManifestStyle::default(),
        }
    }

    /// Replace the admission policy, builder-style.
    pub fn with_policy(mut self, policy: ToolPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Attach a context/memory provider, builder-style.
    pub fn with_context(mut self, context: Arc<dyn ContextProvider>) -> Self {
        self.context = context;
        self
    }

    pub fn with_manifest_style(mut self, style: ManifestStyle) -> Self {
        self.manifest_style = style;
        self
    }

    /// Run one user turn to completion.
    ///
    /// Takes `&mut Session`: a session processes one turn at a time, and
    /// the borrow checker enforces it for single-threaded callers.
    pub async fn run_turn(&self, session: &mut Session, user_input: &str) -> Result<TurnOutcome> {
        session.begin_turn();
        session.conversation.push(Message::user(user_input));

        let mode = session.mode;
        let mode_cfg = self.config.mode(mode).clone();
        let compactor = Compactor::new(mode_cfg.compaction_threshold, mode_cfg.compaction_tail);
        let parser = ParserChain::new(self.config.parser_order);
        let dispatcher = ToolDispatcher::new(self.config.dispatch_width);
        let kind_of = |name: &str| self.registry.kind_of(name).unwrap_or(ToolKind::Other);

        let mut tracker = (mode == SessionMode::Research).then(ResearchTracker::new);
        let mut rejections = Vec::new();
        let mut corrective: Option<String> = None;
        let mut last_text = String::new();
        let mut tool_calls_made = 0usize;
        let mut corrective_retries = 0usize;
        let mut ingest_write_done = false;
        let mut provider_failures = 0usize;
        let mut aborted_on_provider = false;
        let mut iterations = 0u32;

        debug!(session = %session.id, %mode, ceiling = mode_cfg.max_iterations, "Turn started");

        for iteration in 1..=mode_cfg.max_iterations {
            iterations = iteration;
            let phase = tracker.as_ref().map(|t| t.phase());
            let in_synthesis = phase == Some(ResearchPhase::Synthesis);

            // Assemble the system message: preamble, rendered context, and
            // the tool manifest. No manifest during synthesis; the model is
            // writing, not calling.
            let mut system = system_preamble(mode, phase);
            let rendered = self
                .context
                .render_context(&session.id, user_input, &session.turn_results)
                .await;
            if !rendered.is_empty() {
                system.push_str("\n\n");
                system.push_str(&rendered);
            }
            if !in_synthesis {
                let manifest =
                    render_manifest(&self.registry.definitions_for(mode), self.manifest_style);
                if !manifest.is_empty() {
                    system.push_str("\n\n");
                    system.push_str(&manifest);
                }
            }

            // ExtraMessages are rebuilt from scratch each iteration; the
            // pending rejections and corrective are consumed here, never
            // carried further.
            let pending_rejections = std::mem::take(&mut rejections);
            let pending_corrective = corrective.take();
            let extra = build_extra_messages(
                &compactor,
                &kind_of,
                &session.turn_results,
                &pending_rejections,
                pending_corrective.as_deref(),
            );

            let mut messages = Vec::with_capacity(1 + session.conversation.messages.len() + extra.len());
            messages.push(Message::system(system));
            messages.extend(session.conversation.messages.iter().cloned());
            messages.extend(extra);

            let request = ChatRequest {
                messages,
                temperature: if in_synthesis {
                    mode_cfg.synthesis_temperature
                } else {
                    mode_cfg.tool_temperature
                },
                max_tokens: Some(mode_cfg.max_tokens),
                stop: Vec::new(),
            };

            let response = match self.provider.chat(request).await {
                Ok(response) => {
                    provider_failures = 0;
                    response
                }
                Err(error) => {
                    provider_failures += 1;
                    warn!(
                        provider = self.provider.name(),
                        error = %error,
                        attempt = provider_failures,
                        "Provider call failed"
                    );
                    if provider_failures >= PROVIDER_RETRIES {
                        if last_text.is_empty() {
                            return Err(error.into());
                        }
                        aborted_on_provider = true;
                        break;
                    }
                    continue;
                }
            };

            let (text, repairs) = repair_truncated_tags(&response.text);
            if !repairs.is_empty() {
                debug!(repairs = ?repairs, "Repaired truncated tags in model output");
            }
            last_text = text.clone();

            if let Some(state) = tracker.as_mut() {
                if !state.plan_accepted {
                    if let Some(plan) = extract_plan(&text) {
                        state.accept_plan(&plan);
                    }
                }
            }

            // During synthesis the response is the report; proposals are
            // not parsed.
            if in_synthesis {
                if synthesis_complete(&text) {
                    return Ok(self.finalize(session, text, iterations, tool_calls_made, false, tracker));
                }
                if corrective_retries >= RESEARCH_CORRECTIVE_RETRIES {
                    warn!(retries = corrective_retries, "Corrective retries exhausted, returning best effort");
                    return Ok(self.finalize(session, text, iterations, tool_calls_made, false, tracker));
                }
                corrective_retries += 1;
                corrective = Some(format!(
                    "Your report is incomplete. Rewrite it with all of these sections filled in: {}.",
                    SYNTHESIS_MARKERS.join(" ")
                ));
                continue;
            }

            let proposals = parser.parse(&text);

            if proposals.is_empty() {
                match mode {
                    SessionMode::QuickLookup => {
                        if !states_unexecuted_intent(&text) {
                            return Ok(self.finalize(
                                session,
                                text,
                                iterations,
                                tool_calls_made,
                                false,
                                tracker,
                            ));
                        }
                        corrective = Some(
                            "You announced a tool call without making it. Call the tool now \
                             or answer directly from what you know."
                                .into(),
                        );
                    }
                    SessionMode::Ingest => {
                        if ingest_write_done {
                            return Ok(self.finalize(
                                session,
                                text,
                                iterations,
                                tool_calls_made,
                                false,
                                tracker,
                            ));
                        }
                        corrective = Some(
                            "Nothing has been stored yet. Call memory_write exactly once \
                             with a namespace and the content to remember."
                                .into(),
                        );
                    }
                    SessionMode::Research => {
                        let plan_accepted = tracker.as_ref().is_some_and(|t| t.plan_accepted);
                        let should_trigger =
                            tracker.as_ref().is_some_and(|t| t.should_trigger_synthesis());
                        if should_trigger {
                            if let Some(state) = tracker.as_mut() {
                                state.mark_synthesis_triggered();
                                debug!(
                                    sources = state.distinct_source_ids.len(),
                                    "Synthesis threshold reached"
                                );
                            }
                        } else {
                            if corrective_retries >= RESEARCH_CORRECTIVE_RETRIES {
                                warn!(retries = corrective_retries, "Corrective retries exhausted, returning best effort");
                                return Ok(self.finalize(
                                    session,
                                    text,
                                    iterations,
                                    tool_calls_made,
                                    false,
                                    tracker,
                                ));
                            }
                            corrective_retries += 1;
                            corrective = Some(if !plan_accepted {
                                "Produce a short numbered plan inside <plan>...</plan> \
                                 before calling tools."
                                    .into()
                            } else {
                                "Continue executing your plan. Gather evidence from \
                                 additional distinct sources with tool calls."
                                    .into()
                            });
                        }
                    }
                }
                continue;
            }

            let decision = self.policy.review(proposals, &self.registry);
            if !decision.rejected.is_empty() {
                debug!(rejected = decision.rejected.len(), "Policy rejected proposals");
            }
            rejections = decision.rejected;
            let mut approved = decision.approved;

            if mode == SessionMode::QuickLookup {
                let remaining = QUICK_LOOKUP_TOOL_BUDGET.saturating_sub(tool_calls_made);
                if approved.len() > remaining {
                    debug!(dropped = approved.len() - remaining, "Quick-lookup tool budget reached");
                    approved.truncate(remaining);
                    if approved.is_empty() {
                        corrective = Some(
                            "The tool budget for this question is spent. Answer directly \
                             from what you have."
                                .into(),
                        );
                    }
                }
            }

            if mode == SessionMode::Ingest {
                // At most one memory write per turn; extra write proposals
                // are dropped, other tools pass through.
                let before = approved.len();
                let mut write_seen = ingest_write_done;
                approved.retain(|proposal| {
                    if kind_of(&proposal.tool) == ToolKind::MemoryWrite {
                        if write_seen {
                            return false;
                        }
                        write_seen = true;
                    }
                    true
                });
                if approved.is_empty() && before > 0 && rejections.is_empty() {
                    corrective =
                        Some("The memory is already stored. Confirm briefly to the user.".into());
                }
            }

            if approved.is_empty() {
                continue;
            }

            let results = dispatcher
                .dispatch(&self.registry, mode, &approved, tracker.as_mut())
                .await;
            tool_calls_made += results.len();

            if mode == SessionMode::Ingest && !ingest_write_done {
                ingest_write_done = results.iter().any(|result| {
                    kind_of(&result.tool) == ToolKind::MemoryWrite && !result.is_error()
                });
            }

            session.turn_results.extend(results);

            if let Some(state) = tracker.as_mut() {
                if state.should_trigger_synthesis() {
                    state.mark_synthesis_triggered();
                    debug!(
                        sources = state.distinct_source_ids.len(),
                        "Synthesis threshold reached"
                    );
                }
            }
        }

        if last_text.is_empty() {
            return Err(Error::Session("turn produced no model output".into()));
        }

        let ceiling_hit = !aborted_on_provider;
        if ceiling_hit {
            warn!(session = %session.id, iterations, "Iteration ceiling hit, returning best effort");
        }
        Ok(self.finalize(session, last_text, iterations, tool_calls_made, ceiling_hit, tracker))
    }

    fn finalize(
        &self,
        session: &mut Session,
        answer: String,
        iterations: u32,
        tool_calls: usize,
        ceiling_hit: bool,
        research: Option<ResearchTracker>,
    ) -> TurnOutcome {
        session.conversation.push(Message::assistant(answer.clone()));
        debug!(session = %session.id, iterations, tool_calls, ceiling_hit, "Turn finished");
        TurnOutcome {
            answer,
            iterations,
            tool_calls,
            ceiling_hit,
            research,
        }
    }
}

/// Phrases that announce a tool call. A quick-lookup answer containing one
/// of these with no actual call gets one corrective nudge instead of being
/// returned to the user.
const INTENT_MARKERS: [&str; 8] = [
    "let me search",
    "let me look",
    "let me fetch",
    "let me check",
    "i'll search",
    "i'll look",
    "i will search",
    "i will look",
];

fn states_unexecuted_intent(text: &str) -> bool {
    let lower = text.to_lowercase();
    INTENT_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// A synthesis report is complete when every marker appears with a
/// non-empty body.
fn synthesis_complete(text: &str) -> bool {
    let mut starts = Vec::with_capacity(SYNTHESIS_MARKERS.len());
    for marker in SYNTHESIS_MARKERS {
        match text.find(marker) {
            Some(pos) => starts.push((pos, marker.len())),
            None => return false,
        }
    }

    for &(pos, len) in &starts {
        let body_start = pos + len;
        let body_end = starts
            .iter()
            .map(|&(p, _)| p)
            .filter(|&p| p > pos)
            .min()
            .unwrap_or(text.len())
            .max(body_start);
        if text[body_start..body_end].trim().is_empty() {
            return false;
        }
    }
    true
}
