//! The callback dispatcher: the single entry point the engine calls into.
//!
//! Every engine callback and every client message for one session passes
//! through one `Dispatcher`. Handlers take `&mut self`, so each one runs to
//! completion, or to its suspension point, before the next is accepted.

use std::sync::Arc;

use glyphgate_core::clock::Clock;
use glyphgate_core::protocol::{ClientMessage, ServerMessage};
use glyphgate_core::sink::ClientSink;
use glyphgate_core::value::{EngineValue, RequestKind};
use tracing::{debug, error, info, trace, warn};

use super::callbacks::{EngineCallback, SelectHow};
use super::engine::EngineContext;
use crate::config::SessionConfig;
use crate::domain::heuristics;
use crate::domain::keys;
use crate::domain::menu::{MenuEntry, MenuOutcome, MenuSelection};
use crate::domain::pending::{Awaited, Deferred, ResponseShape};
use crate::domain::state::SessionState;

/// Prompt shown with `askname`.
const ASK_NAME_PROMPT: &str = "Who are you?";

/// What the engine gets back from a callback.
#[derive(Debug)]
pub enum Dispatch {
    /// The value is available now.
    Ready(EngineValue),
    /// The engine must wait for client input.
    Suspended(Deferred),
}

impl Dispatch {
    /// Waits for the value, suspending if necessary.
    pub async fn value(self) -> EngineValue {
        match self {
            Self::Ready(value) => value,
            Self::Suspended(deferred) => deferred.await,
        }
    }

    /// Returns `true` if the engine has to wait.
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        matches!(self, Self::Suspended(_))
    }
}

/// Routes engine callbacks and client messages into the session state.
pub struct Dispatcher {
    config: SessionConfig,
    engine: Box<dyn EngineContext>,
    sink: Box<dyn ClientSink>,
    clock: Arc<dyn Clock>,
    state: SessionState,
}

impl Dispatcher {
    /// Creates a dispatcher that owns the engine context and the client
    /// sink for one session.
    #[must_use]
    pub fn new(
        config: SessionConfig,
        engine: Box<dyn EngineContext>,
        sink: Box<dyn ClientSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let state = SessionState::new(config.inventory_window, config.input_cooldown);
        Self {
            config,
            engine,
            sink,
            clock,
            state,
        }
    }

    /// Read access to the session state.
    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Handles one engine callback by name. Unknown names and malformed
    /// arguments answer 0 so the engine's turn never stalls.
    pub fn dispatch(&mut self, name: &str, args: &[EngineValue]) -> Dispatch {
        match EngineCallback::decode(name, args) {
            Ok(callback) => self.handle(callback),
            Err(e) => {
                warn!(callback = name, error = %e, "malformed callback arguments");
                Dispatch::Ready(EngineValue::ZERO)
            }
        }
    }

    /// Handles one decoded engine callback.
    pub fn handle(&mut self, callback: EngineCallback) -> Dispatch {
        trace!(callback = callback.name(), "dispatching");
        match callback {
            EngineCallback::CreateWindow { kind } => {
                let id = self.state.create_window(kind);
                debug!(window = id, ?kind, "window created");
                Dispatch::Ready(EngineValue::Int(id))
            }
            EngineCallback::Window { op, window } => {
                debug!(window, ?op, "window operation");
                Dispatch::Ready(EngineValue::ZERO)
            }
            EngineCallback::PutStr { window, text } => {
                if self.state.is_message_window(window) {
                    self.state.last_question = Some(text.clone());
                }
                self.sink.send(ServerMessage::Text { text });
                Dispatch::Ready(EngineValue::ZERO)
            }
            EngineCallback::RawPrint { text } => {
                self.sink.send(ServerMessage::Text { text });
                Dispatch::Ready(EngineValue::ZERO)
            }
            EngineCallback::PrintGlyph {
                x,
                y,
                glyph,
                resolved,
                ..
            } => {
                let look = resolved.unwrap_or_else(|| self.engine.map_glyph(glyph, x, y));
                let now = self.clock.now();
                let event = self.state.tiles.write(x, y, glyph, look.ch, look.color, now);
                self.sink.send(event);
                Dispatch::Ready(EngineValue::ZERO)
            }
            EngineCallback::Cliparound { x, y } => {
                self.sink.send(ServerMessage::PlayerPosition { x, y });
                Dispatch::Ready(EngineValue::ZERO)
            }
            EngineCallback::UpdateInventory => {
                debug!("inventory refresh requested");
                Dispatch::Ready(EngineValue::ZERO)
            }
            EngineCallback::GetKey => self.suspend(RequestKind::General, ResponseShape::Key),
            EngineCallback::GetPositionKey => {
                if let Some(prompt) = self
                    .state
                    .last_question
                    .as_deref()
                    .filter(|p| heuristics::wants_position(p))
                {
                    self.sink.send(ServerMessage::PositionRequest {
                        text: prompt.to_owned(),
                    });
                }
                self.suspend(RequestKind::Position, ResponseShape::Key)
            }
            EngineCallback::YesNo {
                question,
                choices,
                default,
            } => {
                let direction = heuristics::is_direction(&question);
                debug!(%question, direction, "yes/no question");
                self.state.last_question = Some(question.clone());
                self.sink.send(ServerMessage::Question {
                    text: question,
                    choices,
                    default,
                    menu_items: Vec::new(),
                });
                let dispatch = self.suspend(RequestKind::General, ResponseShape::Key);
                match &dispatch {
                    Dispatch::Suspended(_) => self.state.direction_prompt = direction,
                    Dispatch::Ready(value) if direction => {
                        if let Some(key) = value.as_int().and_then(keys::key_char) {
                            let now = self.clock.now();
                            self.state.requests.carry_over(
                                &key.to_string(),
                                now,
                                RequestKind::Position,
                            );
                        }
                    }
                    Dispatch::Ready(_) => {}
                }
                dispatch
            }
            EngineCallback::GetLine { prompt } => {
                self.state.last_question = Some(prompt.clone());
                self.sink.send(ServerMessage::NameRequest {
                    text: prompt,
                    max_length: self.config.max_line_length,
                });
                self.suspend(RequestKind::General, ResponseShape::Line)
            }
            EngineCallback::AskName => {
                self.sink.send(ServerMessage::NameRequest {
                    text: ASK_NAME_PROMPT.to_owned(),
                    max_length: self.config.max_name_length,
                });
                self.suspend(RequestKind::General, ResponseShape::Line)
            }
            EngineCallback::StartMenu { window } => {
                self.state.menus.begin(window);
                self.state.multi_select.reset();
                self.state.menu_choice = None;
                Dispatch::Ready(EngineValue::ZERO)
            }
            EngineCallback::AddMenu {
                window,
                glyph,
                identifier,
                selector,
                text,
            } => {
                self.add_menu(window, glyph, identifier, selector, &text);
                Dispatch::Ready(EngineValue::ZERO)
            }
            EngineCallback::EndMenu { window, prompt } => self.end_menu(window, prompt),
            EngineCallback::SelectMenu { window, how } => self.select_menu(window, how),
            EngineCallback::Neutral { name } => {
                trace!(callback = name, "neutral callback");
                Dispatch::Ready(EngineValue::ZERO)
            }
            EngineCallback::Unknown { name } => {
                debug!(callback = %name, "unknown callback answered with 0");
                Dispatch::Ready(EngineValue::ZERO)
            }
        }
    }

    /// Decodes and handles one text frame from the client. Malformed frames
    /// are logged and dropped without touching any request.
    pub fn handle_frame(&mut self, frame: &str) {
        match ClientMessage::parse(frame) {
            Ok(message) => self.handle_message(message),
            Err(e) => warn!(error = %e, "dropping malformed client message"),
        }
    }

    /// Handles one decoded client message.
    pub fn handle_message(&mut self, message: ClientMessage) {
        match message {
            ClientMessage::Input { input } => self.handle_input(&input),
            ClientMessage::RequestTileUpdate { x, y } => {
                let reply = self.state.tiles.refresh(x, y);
                self.sink.send(reply);
            }
            ClientMessage::RequestAreaUpdate {
                center_x,
                center_y,
                radius,
            } => {
                let radius = radius.min(self.config.max_area_radius);
                let replies = self.state.tiles.refresh_area(
                    center_x,
                    center_y,
                    radius,
                    self.config.map_columns,
                    self.config.map_rows,
                );
                debug!(center_x, center_y, radius, cells = replies.len(), "area refresh");
                for reply in replies {
                    self.sink.send(reply);
                }
            }
        }
    }

    /// Routes one keypress or typed line to whatever is waiting for it.
    ///
    /// A multi-pick menu only takes input while its selection is awaited or
    /// nothing else is; a prompt the engine raised afterwards comes first.
    pub fn handle_input(&mut self, raw: &str) {
        let now = self.clock.now();

        let prompt_pending = self.state.requests.is_pending(RequestKind::General)
            || self.state.requests.is_pending(RequestKind::Position);
        if self.state.multi_select.is_collecting()
            && (self.state.requests.is_pending(RequestKind::MenuSelection) || !prompt_pending)
        {
            self.multi_select_input(raw);
            return;
        }

        if self.state.requests.is_pending(RequestKind::MenuSelection) {
            self.single_select_input(raw);
            return;
        }

        if self.state.requests.is_pending(RequestKind::General) {
            if let Some(window) = self.state.awaiting_choice.take() {
                let choice = self.choice_for_key(window, keys::decode_key(raw));
                self.state.menu_choice = Some(choice);
            }
            let direction = std::mem::take(&mut self.state.direction_prompt);
            self.state.requests.resolve(RequestKind::General, raw, now);
            if direction {
                // The engine reads a direction answer again through nh_poskey.
                self.state.requests.carry_over(raw, now, RequestKind::Position);
            }
            return;
        }

        if self.state.requests.is_pending(RequestKind::Position) {
            self.state.requests.resolve(RequestKind::Position, raw, now);
            return;
        }

        debug!(input = raw, "no request pending; input buffered");
        self.state.requests.resolve(RequestKind::General, raw, now);
    }

    /// Resolves requests that outlived the configured timeout with safe
    /// defaults. Does nothing when no timeout is configured.
    pub fn expire_stale(&mut self) {
        let Some(timeout) = self.config.request_timeout else {
            return;
        };
        let now = self.clock.now();
        for kind in self.state.requests.expire(now, timeout) {
            warn!(%kind, "request timed out; answered with safe default");
            match kind {
                RequestKind::General => {
                    self.state.direction_prompt = false;
                    if self.state.awaiting_choice.take().is_some() {
                        self.state.menu_choice = Some(MenuSelection::empty());
                    }
                }
                RequestKind::MenuSelection => {
                    self.state.selecting = None;
                    self.state.multi_select.reset();
                }
                RequestKind::Position => {}
            }
        }
    }

    /// Releases every pending request with a safe default. Called when the
    /// client connection closes.
    pub fn disconnect(&mut self) {
        let released = self.state.requests.release_all();
        self.state.multi_select.reset();
        self.state.awaiting_choice = None;
        self.state.selecting = None;
        self.state.menu_choice = None;
        self.state.direction_prompt = false;
        info!(released, "client disconnected; pending requests released");
    }

    /// Enters a suspension point, unless one of `kind` is already pending.
    fn suspend(&mut self, kind: RequestKind, shape: ResponseShape) -> Dispatch {
        if self.state.requests.is_pending(kind) {
            error!(%kind, "engine re-entered a pending suspension point");
            return Dispatch::Ready(shape.fallback());
        }
        let now = self.clock.now();
        match self.state.requests.await_input(kind, shape, now) {
            Ok(Awaited::Ready(value)) => Dispatch::Ready(value),
            Ok(Awaited::Suspended(deferred)) => Dispatch::Suspended(deferred),
            Err(e) => {
                error!(error = %e, "could not register request");
                Dispatch::Ready(shape.fallback())
            }
        }
    }

    fn add_menu(
        &mut self,
        window: i64,
        glyph: i64,
        identifier: i64,
        selector: Option<i64>,
        text: &str,
    ) {
        let added = self
            .state
            .menus
            .add(window, glyph, identifier, selector, text)
            .map(|e| (e.is_category, e.text.clone(), e.selector));
        match added {
            Ok((false, text, accelerator)) => {
                let menu_items = self
                    .state
                    .menus
                    .entries(window)
                    .iter()
                    .map(MenuEntry::to_payload)
                    .collect();
                self.sink.send(ServerMessage::MenuItem {
                    text,
                    accelerator,
                    menu_items,
                });
            }
            Ok((true, ..)) => {}
            Err(e) => warn!(error = %e, "menu entry dropped"),
        }
    }

    fn end_menu(&mut self, window: i64, prompt: Option<String>) -> Dispatch {
        let question = prompt
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_owned);
        if let Some(q) = &question {
            self.state.last_question = Some(q.clone());
        }

        match self.state.menus.end(window, question.as_deref()) {
            MenuOutcome::Passive { entries } => {
                debug!(window, entries = entries.len(), "passive inventory update");
                self.sink.send(ServerMessage::InventoryUpdate {
                    items: entries.iter().map(MenuEntry::to_payload).collect(),
                });
                Dispatch::Ready(EngineValue::ZERO)
            }
            MenuOutcome::Empty => Dispatch::Ready(EngineValue::ZERO),
            MenuOutcome::Prompt { question, entries } => {
                let choices: String = entries.iter().filter_map(|e| e.selector).collect();
                self.sink.send(ServerMessage::Question {
                    text: question.clone().unwrap_or_default(),
                    choices,
                    default: String::new(),
                    menu_items: entries.iter().map(MenuEntry::to_payload).collect(),
                });

                if question.as_deref().is_some_and(heuristics::is_multi_pick) {
                    info!(window, "multi-pick menu opened");
                    self.state.multi_select.start(window);
                    return Dispatch::Ready(EngineValue::ZERO);
                }

                self.state.awaiting_choice = Some(window);
                let dispatch = self.suspend(RequestKind::General, ResponseShape::Key);
                if let Dispatch::Ready(value) = &dispatch {
                    self.state.awaiting_choice = None;
                    let choice = self.choice_for_key(window, value.as_int().unwrap_or(0));
                    self.state.menu_choice = Some(choice);
                }
                dispatch
            }
        }
    }

    fn select_menu(&mut self, window: i64, how: SelectHow) -> Dispatch {
        if how == SelectHow::None {
            self.state.multi_select.reset();
            self.state.menu_choice = None;
            return Dispatch::Ready(MenuSelection::empty().into_value());
        }

        if self.state.multi_select.owns(window) {
            if let Some(selection) = self.state.multi_select.take_ready() {
                info!(window, count = selection.count(), "multi-select already settled");
                return Dispatch::Ready(selection.into_value());
            }
            return self.suspend(RequestKind::MenuSelection, ResponseShape::Selection);
        }

        if let Some(choice) = self.state.menu_choice.take() {
            return Dispatch::Ready(choice.into_value());
        }

        let has_selectable = self
            .state
            .menus
            .entries(window)
            .iter()
            .any(|e| !e.is_category);
        if !has_selectable {
            return Dispatch::Ready(MenuSelection::empty().into_value());
        }

        if how == SelectHow::Any {
            self.state.multi_select.start(window);
        } else {
            self.state.selecting = Some(window);
        }
        self.suspend(RequestKind::MenuSelection, ResponseShape::Selection)
    }

    fn multi_select_input(&mut self, raw: &str) {
        if keys::is_confirm(raw) {
            let selection = self.state.multi_select.confirm();
            self.settle_multi_select(selection);
            return;
        }
        if keys::is_cancel(raw) {
            let selection = self.state.multi_select.cancel();
            self.settle_multi_select(selection);
            return;
        }

        let Some(window) = self.state.multi_select.window() else {
            return;
        };
        let entry = single_char(raw)
            .and_then(|c| self.state.menus.find_selectable(window, c))
            .cloned();
        match entry {
            Some(entry) => {
                let toggle = self.state.multi_select.toggle(&entry);
                debug!(window, selector = ?entry.selector, ?toggle, "multi-select toggle");
            }
            None => debug!(input = raw, "input ignored during multi-select"),
        }
    }

    fn settle_multi_select(&mut self, selection: MenuSelection) {
        let count = selection.count();
        if self
            .state
            .requests
            .resolve_value(RequestKind::MenuSelection, selection.clone().into_value())
        {
            self.state.multi_select.reset();
            info!(count, "multi-select resolved");
        } else {
            self.state.multi_select.park(selection);
            info!(count, "multi-select settled before the engine asked");
        }
    }

    fn single_select_input(&mut self, raw: &str) {
        let Some(window) = self.state.selecting else {
            self.state
                .requests
                .resolve_value(RequestKind::MenuSelection, MenuSelection::empty().into_value());
            return;
        };
        let choice = self.choice_for_key(window, keys::decode_key(raw));
        if choice.count() == 0 {
            debug!(input = raw, "key matches no menu entry; selecting nothing");
        }
        self.state.selecting = None;
        self.state
            .requests
            .resolve_value(RequestKind::MenuSelection, choice.into_value());
    }

    fn choice_for_key(&self, window: i64, key: i64) -> MenuSelection {
        keys::key_char(key)
            .and_then(|c| self.state.menus.find_selectable(window, c))
            .map_or_else(MenuSelection::empty, MenuSelection::single)
    }
}

/// The input as a single character, if it is exactly one.
fn single_char(raw: &str) -> Option<char> {
    let mut chars = raw.chars();
    let c = chars.next()?;
    chars.next().is_none().then_some(c)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeDelta, TimeZone, Utc};
    use glyphgate_core::value::RequestKind;
    use glyphgate_test_support::{ManualClock, RecordingSink};

    use super::*;
    use crate::application::test_engine::StubGlyphs;

    struct Harness {
        dispatcher: Dispatcher,
        sink: RecordingSink,
        clock: Arc<ManualClock>,
    }

    fn harness_with(config: SessionConfig) -> Harness {
        let sink = RecordingSink::new();
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
        ));
        let dispatcher = Dispatcher::new(
            config,
            Box::new(StubGlyphs),
            Box::new(sink.clone()),
            clock.clone(),
        );
        Harness {
            dispatcher,
            sink,
            clock,
        }
    }

    fn harness() -> Harness {
        harness_with(SessionConfig::default())
    }

    fn ready(dispatch: Dispatch) -> EngineValue {
        match dispatch {
            Dispatch::Ready(value) => value,
            Dispatch::Suspended(deferred) => panic!("expected a value, got {deferred:?}"),
        }
    }

    fn suspended(dispatch: Dispatch) -> Deferred {
        match dispatch {
            Dispatch::Suspended(deferred) => deferred,
            Dispatch::Ready(value) => panic!("expected suspension, got {value:?}"),
        }
    }

    fn add_menu(h: &mut Harness, window: i64, selector: i64, text: &str) {
        let args = vec![
            EngineValue::Int(window),
            EngineValue::Int(0),
            EngineValue::Int(0),
            EngineValue::Int(selector),
            EngineValue::Int(0),
            EngineValue::Int(0),
            EngineValue::Int(0),
            EngineValue::from(text),
        ];
        ready(h.dispatcher.dispatch("add_menu", &args));
    }

    fn end_menu(h: &mut Harness, window: i64, prompt: &str) -> Dispatch {
        h.dispatcher.dispatch(
            "end_menu",
            &[EngineValue::Int(window), EngineValue::from(prompt)],
        )
    }

    fn select_menu(h: &mut Harness, window: i64, how: i64) -> Dispatch {
        h.dispatcher.dispatch(
            "select_menu",
            &[EngineValue::Int(window), EngineValue::Int(how)],
        )
    }

    fn open_pickup_menu(h: &mut Harness) {
        ready(h.dispatcher.dispatch("start_menu", &[EngineValue::Int(3)]));
        add_menu(h, 3, 97, "an apple");
        add_menu(h, 3, 98, "a banana");
        add_menu(h, 3, 99, "a carrot");
        assert_eq!(ready(end_menu(h, 3, "Pick up what?")), EngineValue::ZERO);
    }

    #[test]
    fn test_unknown_callback_answers_zero() {
        // Arrange
        let mut h = harness();

        // Act
        let value = ready(h.dispatcher.dispatch("shim_frobnicate", &[EngineValue::Int(1)]));

        // Assert
        assert_eq!(value, EngineValue::ZERO);
        assert!(h.sink.sent().is_empty());
    }

    #[test]
    fn test_malformed_arguments_answer_zero() {
        // Arrange
        let mut h = harness();

        // Act
        let value = ready(h.dispatcher.dispatch("putstr", &[EngineValue::from("oops")]));

        // Assert
        assert_eq!(value, EngineValue::ZERO);
        assert!(h.sink.sent().is_empty());
    }

    #[test]
    fn test_create_window_returns_sequential_ids() {
        // Arrange
        let mut h = harness();

        // Act
        let first = ready(h.dispatcher.dispatch("create_nhwindow", &[EngineValue::Int(1)]));
        let second = ready(h.dispatcher.dispatch("create_nhwindow", &[EngineValue::Int(3)]));

        // Assert
        assert_eq!(first, EngineValue::Int(1));
        assert_eq!(second, EngineValue::Int(2));
    }

    #[test]
    fn test_add_menu_synthesizes_selector_for_invalid_code() {
        // Arrange
        let mut h = harness();
        ready(h.dispatcher.dispatch("start_menu", &[EngineValue::Int(5)]));

        // Act
        add_menu(&mut h, 5, 97, "a +1 long sword");
        add_menu(&mut h, 5, 1, "an uncursed ring");

        // Assert
        let accelerators: Vec<Option<char>> = h
            .sink
            .sent()
            .into_iter()
            .filter_map(|m| match m {
                ServerMessage::MenuItem { accelerator, .. } => Some(accelerator),
                _ => None,
            })
            .collect();
        assert_eq!(accelerators, vec![Some('a'), Some('b')]);
        let sent = h.sink.sent();
        let Some(ServerMessage::MenuItem { menu_items, .. }) = sent.last() else {
            panic!("expected a menu_item message");
        };
        assert_eq!(menu_items.len(), 2);
    }

    #[tokio::test]
    async fn test_pickup_menu_resolves_with_confirmed_selection() {
        // Arrange
        let mut h = harness();
        open_pickup_menu(&mut h);
        let deferred = suspended(select_menu(&mut h, 3, 2));

        // Act
        h.dispatcher.handle_input("a");
        h.dispatcher.handle_input("b");
        h.dispatcher.handle_input("Enter");

        // Assert
        assert_eq!(
            deferred.await,
            EngineValue::Array(vec![EngineValue::Int(97), EngineValue::Int(98)])
        );
        assert!(!h.dispatcher.state().multi_select.is_collecting());
    }

    #[test]
    fn test_toggles_never_resolve_the_selection() {
        // Arrange
        let mut h = harness();
        open_pickup_menu(&mut h);
        let _deferred = suspended(select_menu(&mut h, 3, 2));

        // Act
        h.dispatcher.handle_input("a");
        h.dispatcher.handle_input("b");
        h.dispatcher.handle_input("a");
        h.dispatcher.handle_input("z");

        // Assert
        let state = h.dispatcher.state();
        assert!(state.requests.is_pending(RequestKind::MenuSelection));
        assert_eq!(state.multi_select.selection().len(), 1);
    }

    #[test]
    fn test_confirm_before_select_menu_is_parked() {
        // Arrange
        let mut h = harness();
        open_pickup_menu(&mut h);
        h.dispatcher.handle_input("c");
        h.dispatcher.handle_input("a");

        // Act
        h.dispatcher.handle_input("Enter");
        let value = ready(select_menu(&mut h, 3, 2));

        // Assert
        assert_eq!(
            value,
            EngineValue::Array(vec![EngineValue::Int(97), EngineValue::Int(99)])
        );
    }

    #[tokio::test]
    async fn test_cancel_resolves_with_empty_selection() {
        // Arrange
        let mut h = harness();
        open_pickup_menu(&mut h);
        let deferred = suspended(select_menu(&mut h, 3, 2));
        h.dispatcher.handle_input("a");

        // Act
        h.dispatcher.handle_input("Escape");

        // Assert
        assert_eq!(deferred.await, EngineValue::Array(vec![]));
    }

    #[tokio::test]
    async fn test_single_pick_menu_records_choice_for_select_menu() {
        // Arrange
        let mut h = harness();
        ready(h.dispatcher.dispatch("start_menu", &[EngineValue::Int(3)]));
        add_menu(&mut h, 3, 97, "a dagger");
        add_menu(&mut h, 3, 98, "a mace");
        let deferred = suspended(end_menu(&mut h, 3, "What do you want to wield?"));

        // Act
        h.dispatcher.handle_input("b");
        let key = deferred.await;
        let selection = ready(select_menu(&mut h, 3, 1));

        // Assert
        assert_eq!(key, EngineValue::Int(98));
        assert_eq!(selection, EngineValue::Array(vec![EngineValue::Int(98)]));
    }

    #[test]
    fn test_inventory_window_without_question_is_passive() {
        // Arrange
        let mut h = harness();
        ready(h.dispatcher.dispatch("start_menu", &[EngineValue::Int(4)]));
        add_menu(&mut h, 4, 97, "a blessed +2 dagger");

        // Act
        let value = ready(h.dispatcher.dispatch("end_menu", &[EngineValue::Int(4)]));

        // Assert
        assert_eq!(value, EngineValue::ZERO);
        let sent = h.sink.sent();
        let Some(ServerMessage::InventoryUpdate { items }) = sent.last() else {
            panic!("expected an inventory update, got {sent:?}");
        };
        assert_eq!(items.len(), 1);
        assert!(!h.dispatcher.state().requests.is_pending(RequestKind::General));
    }

    #[tokio::test]
    async fn test_yes_no_question_resolves_with_key_code() {
        // Arrange
        let mut h = harness();
        let deferred = suspended(h.dispatcher.dispatch(
            "yn_function",
            &[
                EngineValue::from("Really attack the guard?"),
                EngineValue::from("yn"),
                EngineValue::from("n"),
            ],
        ));

        // Act
        h.dispatcher.handle_input("y");

        // Assert
        assert_eq!(deferred.await, EngineValue::Int(121));
        assert!(matches!(
            h.sink.sent().first(),
            Some(ServerMessage::Question { default, .. }) if default == "n"
        ));
    }

    #[test]
    fn test_buffered_input_answers_within_cooldown_only() {
        // Arrange
        let mut h = harness();
        h.dispatcher.handle_input("x");

        // Act
        let fresh = ready(h.dispatcher.dispatch("nhgetch", &[]));
        h.dispatcher.handle_input("y");
        h.clock.advance(TimeDelta::milliseconds(200));
        let stale = h.dispatcher.dispatch("nhgetch", &[]);

        // Assert
        assert_eq!(fresh, EngineValue::Int(120));
        assert!(stale.is_suspended());
    }

    fn yes_no(h: &mut Harness, question: &str, choices: &str) -> Dispatch {
        h.dispatcher.dispatch(
            "yn_function",
            &[
                EngineValue::from(question),
                EngineValue::from(choices),
                EngineValue::from("n"),
            ],
        )
    }

    fn open_inventory_pickup(h: &mut Harness) -> Dispatch {
        ready(h.dispatcher.dispatch("start_menu", &[EngineValue::Int(4)]));
        add_menu(h, 4, 0, "Weapons");
        add_menu(h, 4, 97, "a dagger");
        add_menu(h, 4, 9999, "a long sword");
        end_menu(h, 4, "Pick up what?")
    }

    #[tokio::test]
    async fn test_answer_to_yes_no_is_not_replayed_as_next_command() {
        // Arrange
        let mut h = harness();
        let question = suspended(yes_no(&mut h, "Really attack the guard?", "yn"));
        h.dispatcher.handle_input("y");
        assert_eq!(question.await, EngineValue::Int(121));

        // Act
        let command = h.dispatcher.dispatch("nh_poskey", &[]);

        // Assert
        assert!(command.is_suspended());
        assert!(h.dispatcher.state().requests.is_pending(RequestKind::Position));
    }

    #[tokio::test]
    async fn test_command_key_does_not_answer_following_question() {
        // Arrange
        let mut h = harness();
        let command = suspended(h.dispatcher.dispatch("nh_poskey", &[]));
        h.dispatcher.handle_input("q");
        assert_eq!(command.await, EngineValue::Int(113));

        // Act
        let question = yes_no(&mut h, "What do you want to drink? [fgh or ?*]", "fgh?*");

        // Assert
        assert!(question.is_suspended());
    }

    #[tokio::test]
    async fn test_direction_answer_is_read_again_by_position_query() {
        // Arrange
        let mut h = harness();
        let direction = suspended(yes_no(&mut h, "In what direction?", ""));
        h.dispatcher.handle_input("h");
        assert_eq!(direction.await, EngineValue::Int(104));

        // Act
        let position = ready(h.dispatcher.dispatch("nh_poskey", &[]));
        let next = h.dispatcher.dispatch("nhgetch", &[]);

        // Assert
        assert_eq!(position, EngineValue::Int(104));
        assert!(next.is_suspended());
    }

    #[test]
    fn test_direction_answer_is_not_kept_past_cooldown() {
        // Arrange
        let mut h = harness();
        let _direction = suspended(yes_no(&mut h, "In what direction?", ""));
        h.dispatcher.handle_input("h");

        // Act
        h.clock.advance(TimeDelta::milliseconds(200));
        let position = h.dispatcher.dispatch("nh_poskey", &[]);

        // Assert
        assert!(position.is_suspended());
    }

    #[tokio::test]
    async fn test_input_is_not_reused_after_answering_a_request() {
        // Arrange
        let mut h = harness();
        let first = suspended(h.dispatcher.dispatch("nhgetch", &[]));
        h.dispatcher.handle_input("s");
        assert_eq!(first.await, EngineValue::Int(115));

        // Act
        let second = h.dispatcher.dispatch("nhgetch", &[]);
        let position = h.dispatcher.dispatch("nh_poskey", &[]);

        // Assert
        assert!(second.is_suspended());
        assert!(position.is_suspended());
    }

    #[tokio::test]
    async fn test_declined_multi_pick_does_not_swallow_next_command() {
        // Arrange
        let mut h = harness();
        ready(h.dispatcher.dispatch("start_menu", &[EngineValue::Int(3)]));
        add_menu(&mut h, 3, 97, "a +1 ring mail");
        add_menu(&mut h, 3, 98, "2 uncursed food rations");
        add_menu(&mut h, 3, 99, "a wand of digging");
        assert_eq!(ready(end_menu(&mut h, 3, "Things you could drop:")), EngineValue::ZERO);
        assert_eq!(ready(select_menu(&mut h, 3, 0)), EngineValue::Array(vec![]));
        let command = suspended(h.dispatcher.dispatch("nh_poskey", &[]));

        // Act
        h.dispatcher.handle_input("k");

        // Assert
        assert_eq!(command.await, EngineValue::Int(107));
        assert!(!h.dispatcher.state().multi_select.is_collecting());
    }

    #[tokio::test]
    async fn test_prompt_raised_during_multi_pick_gets_the_input() {
        // Arrange
        let mut h = harness();
        open_pickup_menu(&mut h);
        let question = suspended(yes_no(&mut h, "There is a trap here. Continue?", "yn"));

        // Act
        h.dispatcher.handle_input("a");

        // Assert
        assert_eq!(question.await, EngineValue::Int(97));
        assert!(h.dispatcher.state().multi_select.selection().is_empty());
        assert!(h.dispatcher.state().multi_select.is_collecting());
    }

    #[tokio::test]
    async fn test_inventory_pickup_returns_original_and_synthesized_selectors() {
        // Arrange
        let mut h = harness();
        assert_eq!(ready(open_inventory_pickup(&mut h)), EngineValue::ZERO);
        let sent = h.sink.sent();
        let Some(ServerMessage::Question {
            text,
            choices,
            menu_items,
            ..
        }) = sent.last()
        else {
            panic!("expected a question, got {sent:?}");
        };
        assert_eq!(text, "Pick up what?");
        assert_eq!(choices, "ab");
        assert_eq!(menu_items.iter().filter(|i| !i.is_category).count(), 2);
        let deferred = suspended(select_menu(&mut h, 4, 2));

        // Act
        h.dispatcher.handle_input("a");
        h.dispatcher.handle_input("b");
        h.dispatcher.handle_input("Enter");

        // Assert
        assert_eq!(
            deferred.await,
            EngineValue::Array(vec![EngineValue::Int(97), EngineValue::Int(9999)])
        );
    }

    #[tokio::test]
    async fn test_toggling_twice_then_cancel_selects_nothing() {
        // Arrange
        let mut h = harness();
        ready(open_inventory_pickup(&mut h));
        let deferred = suspended(select_menu(&mut h, 4, 2));

        // Act
        h.dispatcher.handle_input("b");
        h.dispatcher.handle_input("b");
        let untoggled = h.dispatcher.state().multi_select.selection().is_empty();
        h.dispatcher.handle_input("Escape");

        // Assert
        assert!(untoggled);
        assert_eq!(deferred.await, EngineValue::Array(vec![]));
    }

    #[tokio::test]
    async fn test_getlin_resolves_with_typed_line() {
        // Arrange
        let mut h = harness();
        let deferred = suspended(
            h.dispatcher
                .dispatch("getlin", &[EngineValue::from("What do you want to name this?")]),
        );

        // Act
        h.dispatcher.handle_frame(r#"{"type":"input","input":"Sting"}"#);

        // Assert
        assert_eq!(deferred.await, EngineValue::from("Sting"));
        assert!(matches!(
            h.sink.sent().first(),
            Some(ServerMessage::NameRequest { max_length: 255, .. })
        ));
    }

    #[test]
    fn test_position_request_sent_only_for_position_prompts() {
        // Arrange
        let mut h = harness();
        ready(h.dispatcher.dispatch("create_nhwindow", &[EngineValue::Int(1)]));
        ready(h.dispatcher.dispatch(
            "putstr",
            &[
                EngineValue::Int(1),
                EngineValue::Int(0),
                EngineValue::from("Where do you want to travel to?"),
            ],
        ));

        // Act
        let _deferred = suspended(h.dispatcher.dispatch("nh_poskey", &[]));

        // Assert
        assert!(matches!(
            h.sink.sent().last(),
            Some(ServerMessage::PositionRequest { text }) if text.starts_with("Where")
        ));
    }

    #[test]
    fn test_print_glyph_caches_tile_and_answers_refresh() {
        // Arrange
        let mut h = harness();
        ready(h.dispatcher.dispatch(
            "print_glyph",
            &[
                EngineValue::Int(3),
                EngineValue::Int(10),
                EngineValue::Int(5),
                EngineValue::Int(2400),
            ],
        ));
        h.sink.drain();

        // Act
        h.dispatcher
            .handle_frame(r#"{"type":"request_tile_update","x":10,"y":5}"#);
        h.dispatcher
            .handle_frame(r#"{"type":"request_tile_update","x":11,"y":5}"#);

        // Assert
        assert_eq!(
            h.sink.sent(),
            vec![
                ServerMessage::MapGlyph {
                    x: 10,
                    y: 5,
                    glyph: 2400,
                    ch: '@',
                    color: 7,
                },
                ServerMessage::TileNotFound { x: 11, y: 5 },
            ]
        );
    }

    #[test]
    fn test_area_refresh_is_clamped_to_radius_and_map() {
        // Arrange
        let mut h = harness_with(SessionConfig {
            max_area_radius: 1,
            ..SessionConfig::default()
        });

        // Act
        h.dispatcher.handle_frame(
            r#"{"type":"request_area_update","centerX":0,"centerY":0,"radius":50}"#,
        );

        // Assert
        assert_eq!(h.sink.sent().len(), 4);
    }

    #[test]
    fn test_malformed_frame_leaves_requests_untouched() {
        // Arrange
        let mut h = harness();
        let _deferred = suspended(h.dispatcher.dispatch("nhgetch", &[]));

        // Act
        h.dispatcher.handle_frame("{not json");
        h.dispatcher.handle_frame(r#"{"type":"teleport"}"#);

        // Assert
        assert!(h.dispatcher.state().requests.is_pending(RequestKind::General));
        assert!(h.sink.sent().is_empty());
    }

    #[tokio::test]
    async fn test_expired_request_resolves_with_safe_default() {
        // Arrange
        let mut h = harness_with(SessionConfig {
            request_timeout: Some(TimeDelta::seconds(30)),
            ..SessionConfig::default()
        });
        let deferred = suspended(h.dispatcher.dispatch("nhgetch", &[]));

        // Act
        h.clock.advance(TimeDelta::seconds(10));
        h.dispatcher.expire_stale();
        let still_pending = h.dispatcher.state().requests.is_pending(RequestKind::General);
        h.clock.advance(TimeDelta::seconds(25));
        h.dispatcher.expire_stale();

        // Assert
        assert!(still_pending);
        assert_eq!(deferred.await, EngineValue::Int(27));
    }

    #[tokio::test]
    async fn test_disconnect_releases_every_pending_request() {
        // Arrange
        let mut h = harness();
        let line = suspended(h.dispatcher.dispatch("askname", &[]));
        let position = suspended(h.dispatcher.dispatch("nh_poskey", &[]));

        // Act
        h.dispatcher.disconnect();

        // Assert
        assert_eq!(line.await, EngineValue::from("\u{1b}"));
        assert_eq!(position.await, EngineValue::Int(27));
        for kind in RequestKind::ALL {
            assert!(!h.dispatcher.state().requests.is_pending(kind));
        }
    }
}
