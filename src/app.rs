use crate::collaborator::ResourceSpec;
use crate::dispatch::{Confirmation, DispatchOutcome, DispatchRequest, Effect, Operation};
use crate::filter::FilterState;
use crate::input::Action;
use crate::list::{Edge, ListState, PageDirection};
use crate::loader::{AsyncLoad, LoadEvent, LoadStatus, LogEvent, Spinner};
use crate::menu::{
    MenuAction, MenuItem, action_menu, bulk_action_menu, container_menu, main_menu,
};
use crate::message::{Message, MessageLog};
use crate::model::{NamespaceScope, ResourceKind, ResourceRow};
use crate::wizard::{StepData, Wizard, WizardKind, WizardTransition};
use std::collections::BTreeMap;
use tracing::debug;

const MAX_FOLLOW_LINES: usize = 5_000;
const DEFAULT_VIEWPORT_HEIGHT: usize = 20;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum InputMode {
    Browsing,
    Filtering,
    Wizard,
    Confirm,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    None,
    Load {
        epoch: u64,
        kind: ResourceKind,
        scope: NamespaceScope,
    },
    CancelLoad,
    Dispatch {
        request: DispatchRequest,
        confirmation: Confirmation,
    },
    Follow {
        id: u64,
        namespace: String,
        pod: String,
        container: Option<String>,
    },
    StopFollow,
    /// Commands to run in order.
    Batch(Vec<AppCommand>),
}

#[derive(Debug, Clone)]
struct PendingConfirmation {
    prompt: String,
    request: DispatchRequest,
}

#[derive(Debug, Clone)]
pub struct MenuView {
    pub title: String,
    pub list: ListState<MenuItem>,
    /// Rows the menu's operations act on; empty for menus not tied to rows.
    pub targets: Vec<ResourceRow>,
}

impl MenuView {
    fn new(title: String, items: Vec<MenuItem>, height: usize) -> Self {
        Self {
            title,
            list: ListState::new(items, height),
            targets: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResourceView {
    pub kind: ResourceKind,
    pub list: ListState<ResourceRow>,
    pub applied_filter: Option<String>,
    raw: Vec<ResourceRow>,
}

impl ResourceView {
    fn new(kind: ResourceKind, height: usize) -> Self {
        Self {
            kind,
            list: ListState::new(Vec::new(), height).with_multi_select(kind.supports_multi_select()),
            applied_filter: None,
            raw: Vec::new(),
        }
    }

    pub fn total(&self) -> usize {
        self.raw.len()
    }

    fn install(&mut self, rows: Vec<ResourceRow>) {
        self.raw = rows;
        self.applied_filter = None;
        self.show((0..self.raw.len()).collect::<Vec<_>>().as_slice());
    }

    fn show(&mut self, indices: &[usize]) {
        let rows = indices
            .iter()
            .filter_map(|index| self.raw.get(*index).cloned())
            .collect();
        self.list = ListState::new(rows, self.list.height())
            .with_multi_select(self.kind.supports_multi_select());
    }
}

#[derive(Debug, Clone)]
pub struct TextView {
    pub title: String,
    pub lines: Vec<String>,
    pub scroll: usize,
    pub height: usize,
    pub follow_id: Option<u64>,
}

impl TextView {
    fn new(title: String, lines: Vec<String>, height: usize, follow_id: Option<u64>) -> Self {
        Self {
            title,
            lines,
            scroll: 0,
            height: height.max(1),
            follow_id,
        }
    }

    fn max_scroll(&self) -> usize {
        self.lines.len().saturating_sub(self.height)
    }

    fn scroll_by(&mut self, delta: isize) {
        let next = (self.scroll as isize).saturating_add(delta).max(0) as usize;
        self.scroll = next.min(self.max_scroll());
    }

    fn append(&mut self, line: String) {
        let at_bottom = self.scroll >= self.max_scroll();
        self.lines.push(line);
        if self.lines.len() > MAX_FOLLOW_LINES {
            let excess = self.lines.len() - MAX_FOLLOW_LINES;
            self.lines.drain(..excess);
            self.scroll = self.scroll.saturating_sub(excess);
        }
        if at_bottom {
            self.scroll = self.max_scroll();
        }
    }
}

#[derive(Debug, Clone)]
pub enum View {
    Menu(MenuView),
    Resources(ResourceView),
    Text(TextView),
}

impl View {
    pub fn title(&self) -> String {
        match self {
            Self::Menu(menu) => menu.title.clone(),
            Self::Resources(view) => view.kind.title().to_string(),
            Self::Text(text) => text.title.clone(),
        }
    }

    fn set_height(&mut self, height: usize) {
        match self {
            Self::Menu(menu) => menu.list.set_viewport_height(height),
            Self::Resources(view) => view.list.set_viewport_height(height),
            Self::Text(text) => {
                text.height = height.max(1);
                text.scroll = text.scroll.min(text.max_scroll());
            }
        }
    }
}

pub struct App {
    running: bool,
    context: String,
    cluster: String,
    default_namespace: String,
    scope: NamespaceScope,
    views: Vec<View>,
    filter: FilterState,
    load: AsyncLoad<Vec<ResourceRow>>,
    spinner: Spinner,
    wizard: Option<Wizard>,
    pending_confirmation: Option<PendingConfirmation>,
    messages: MessageLog,
    show_help: bool,
    viewport_height: usize,
    next_follow_id: u64,
}

impl App {
    pub fn new(
        context: String,
        cluster: String,
        default_namespace: String,
        scope: NamespaceScope,
    ) -> Self {
        let root = View::Menu(MenuView::new(
            "podnav".to_string(),
            main_menu(),
            DEFAULT_VIEWPORT_HEIGHT,
        ));
        let mut messages = MessageLog::default();
        messages.push(Message::info(format!("Connected to {context} ({scope})")));

        Self {
            running: true,
            context,
            cluster,
            default_namespace,
            scope,
            views: vec![root],
            filter: FilterState::default(),
            load: AsyncLoad::default(),
            spinner: Spinner::default(),
            wizard: None,
            pending_confirmation: None,
            messages,
            show_help: false,
            viewport_height: DEFAULT_VIEWPORT_HEIGHT,
            next_follow_id: 0,
        }
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn mode(&self) -> InputMode {
        if self.pending_confirmation.is_some() {
            InputMode::Confirm
        } else if self.wizard.is_some() {
            InputMode::Wizard
        } else if self.filter.is_active() {
            InputMode::Filtering
        } else {
            InputMode::Browsing
        }
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    pub fn scope(&self) -> &NamespaceScope {
        &self.scope
    }

    pub fn view(&self) -> Option<&View> {
        self.views.last()
    }

    pub fn breadcrumb(&self) -> String {
        self.views
            .iter()
            .map(View::title)
            .collect::<Vec<_>>()
            .join(" › ")
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn is_loading(&self) -> bool {
        self.load.is_loading()
    }

    pub fn load_error(&self) -> Option<&str> {
        match self.load.status() {
            LoadStatus::Failed(error) => Some(error),
            _ => None,
        }
    }

    pub fn spinner_frame(&self) -> &'static str {
        self.spinner.frame()
    }

    pub fn tick_spinner(&mut self) {
        if self.load.is_loading() {
            self.spinner.tick();
        }
    }

    pub fn wizard(&self) -> Option<&Wizard> {
        self.wizard.as_ref()
    }

    pub fn pending_prompt(&self) -> Option<&str> {
        self.pending_confirmation
            .as_ref()
            .map(|pending| pending.prompt.as_str())
    }

    pub fn status(&self) -> Option<&Message> {
        self.messages.latest()
    }

    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn show_help(&self) -> bool {
        self.show_help
    }

    pub fn set_viewport_height(&mut self, height: usize) {
        let height = height.max(1);
        if height == self.viewport_height {
            return;
        }
        self.viewport_height = height;
        for view in &mut self.views {
            view.set_height(height);
        }
    }

    pub fn apply_action(&mut self, action: Action) -> AppCommand {
        if let Some(pending) = self.pending_confirmation.take() {
            let confirmation = match action {
                Action::ConfirmYes => Confirmation::Affirmed,
                _ => Confirmation::Declined,
            };
            debug!(?confirmation, "{}", pending.prompt);
            return AppCommand::Dispatch {
                request: pending.request,
                confirmation,
            };
        }

        if self.show_help && !matches!(action, Action::ToggleHelp) {
            self.show_help = false;
        }

        if action == Action::Quit {
            self.running = false;
            return AppCommand::None;
        }

        if self.load.is_loading() {
            return match action {
                Action::Back => self.cancel_load(),
                _ => AppCommand::None,
            };
        }

        if self.wizard.is_some() {
            return self.apply_wizard_action(action);
        }

        if self.filter.is_active() {
            return self.apply_filter_action(action);
        }

        match action {
            Action::ToggleHelp => {
                self.show_help = !self.show_help;
                AppCommand::None
            }
            Action::Back => self.go_back(),
            Action::Create => self.start_wizard(WizardKind::CreateSecret),
            action => match self.views.last() {
                Some(View::Menu(_)) => self.apply_menu_action(action),
                Some(View::Resources(_)) => self.apply_resource_action(action),
                Some(View::Text(_)) => self.apply_text_action(action),
                None => AppCommand::None,
            },
        }
    }

    pub fn apply_load_event(&mut self, event: LoadEvent) {
        let LoadEvent {
            epoch,
            kind,
            result,
        } = event;
        if let Err(error) = self.load.apply(epoch, result) {
            debug!(kind = kind.title(), "dropping load result: {error}");
            return;
        }

        if let LoadStatus::Failed(error) = self.load.status() {
            let text = format!("Loading {} failed: {error}", kind.title().to_lowercase());
            self.messages.push(Message::error(text));
            return;
        }

        let Some(rows) = self.load.take_loaded() else {
            return;
        };
        let count = rows.len();
        let target = self.views.iter_mut().rev().find_map(|view| match view {
            View::Resources(view) if view.kind == kind => Some(view),
            _ => None,
        });
        if let Some(view) = target {
            view.install(rows);
            let scope = if kind.is_namespaced() {
                self.scope.label()
            } else {
                "cluster".to_string()
            };
            self.messages.push(Message::info(format!(
                "Loaded {count} {} ({scope})",
                kind.title().to_lowercase()
            )));
        }
    }

    pub fn apply_dispatch_outcome(&mut self, outcome: DispatchOutcome) -> AppCommand {
        let DispatchOutcome {
            message,
            effect,
            succeeded,
        } = outcome;

        let submitting = self.wizard.as_ref().is_some_and(Wizard::is_submitting);
        if submitting {
            if succeeded {
                self.wizard = None;
            } else if let Some(wizard) = self.wizard.as_mut() {
                wizard.fail(message.text.clone());
            }
        }
        self.messages.push(message);

        match effect {
            Effect::None => AppCommand::None,
            Effect::Refresh => self.refresh_after_change(),
            Effect::ShowText { title, lines } => {
                self.views.push(View::Text(TextView::new(
                    title,
                    lines,
                    self.viewport_height,
                    None,
                )));
                AppCommand::None
            }
            Effect::FollowLogs {
                namespace,
                pod,
                container,
            } => {
                self.next_follow_id += 1;
                let id = self.next_follow_id;
                self.views.push(View::Text(TextView::new(
                    format!("Follow {namespace}/{pod}"),
                    Vec::new(),
                    self.viewport_height,
                    Some(id),
                )));
                AppCommand::Follow {
                    id,
                    namespace,
                    pod,
                    container,
                }
            }
            Effect::ChooseContainer {
                request,
                containers,
            } => {
                self.views.push(View::Menu(MenuView::new(
                    format!("Containers in {}", request.subject()),
                    container_menu(&request, &containers),
                    self.viewport_height,
                )));
                AppCommand::None
            }
        }
    }

    pub fn apply_log_event(&mut self, event: LogEvent) {
        let Some(View::Text(view)) = self.views.last_mut() else {
            debug!("dropping log event without a log view");
            return;
        };

        match event {
            LogEvent::Line { id, line } if view.follow_id == Some(id) => view.append(line),
            LogEvent::Ended { id, error } if view.follow_id == Some(id) => {
                view.follow_id = None;
                let message = match error {
                    Some(error) => Message::error(format!("Log stream ended: {error}")),
                    None => Message::info("Log stream ended"),
                };
                self.messages.push(message);
            }
            _ => debug!("dropping log event for a closed view"),
        }
    }

    fn apply_menu_action(&mut self, action: Action) -> AppCommand {
        let Some(View::Menu(menu)) = self.views.last_mut() else {
            return AppCommand::None;
        };
        if navigate(&mut menu.list, &action) {
            return AppCommand::None;
        }

        let chosen = match action {
            Action::Select => menu.list.current().cloned(),
            Action::SelectByOrdinal(n) => menu
                .list
                .select_by_ordinal(n)
                .and_then(|_| menu.list.current().cloned()),
            _ => None,
        };
        match chosen {
            Some(item) => self.activate(item.action),
            None => AppCommand::None,
        }
    }

    fn apply_resource_action(&mut self, action: Action) -> AppCommand {
        let Some(View::Resources(view)) = self.views.last_mut() else {
            return AppCommand::None;
        };
        if navigate(&mut view.list, &action) {
            return AppCommand::None;
        }

        match action {
            Action::Select => self.open_action_menu(),
            Action::SelectByOrdinal(n) => {
                if view.list.select_by_ordinal(n).is_some() {
                    self.open_action_menu()
                } else {
                    AppCommand::None
                }
            }
            Action::ToggleSelect => {
                if view.list.toggle_select() {
                    view.list.move_cursor(1);
                } else if !view.kind.supports_multi_select() {
                    self.messages.push(Message::info(format!(
                        "Multi-select is not available for {}",
                        view.kind.title().to_lowercase()
                    )));
                }
                AppCommand::None
            }
            Action::StartFilter => {
                self.filter.open(&view.raw);
                let matched = self.filter.matched().to_vec();
                view.show(&matched);
                view.applied_filter = None;
                AppCommand::None
            }
            Action::Refresh => self.start_load(),
            Action::Describe => self.run_operation(Operation::Describe),
            Action::Logs => self.run_operation(Operation::ViewLogs),
            Action::FollowLogs => self.run_operation(Operation::FollowLogs),
            Action::Shell => self.run_operation(Operation::Shell),
            Action::Delete => self.run_operation(Operation::Delete),
            _ => AppCommand::None,
        }
    }

    fn apply_text_action(&mut self, action: Action) -> AppCommand {
        let Some(View::Text(view)) = self.views.last_mut() else {
            return AppCommand::None;
        };
        let page = view.height as isize;
        match action {
            Action::MoveUp => view.scroll_by(-1),
            Action::MoveDown => view.scroll_by(1),
            Action::PageUp => view.scroll_by(-page),
            Action::PageDown => view.scroll_by(page),
            Action::Top => view.scroll = 0,
            Action::Bottom => view.scroll = view.max_scroll(),
            _ => {}
        }
        AppCommand::None
    }

    fn apply_filter_action(&mut self, action: Action) -> AppCommand {
        let Some(View::Resources(view)) = self.views.last_mut() else {
            self.filter.reset(0);
            return AppCommand::None;
        };

        match action {
            Action::FilterInput(c) => {
                self.filter.push(c, &view.raw);
                let matched = self.filter.matched().to_vec();
                view.show(&matched);
            }
            Action::FilterBackspace => {
                self.filter.pop(&view.raw);
                let matched = self.filter.matched().to_vec();
                view.show(&matched);
            }
            Action::FilterCommit => {
                let committed = self.filter.commit(view.raw.len());
                view.show(&committed.matched);
                view.applied_filter = Some(committed.query).filter(|query| !query.is_empty());
            }
            Action::FilterCancel => {
                self.filter.cancel(view.raw.len());
                let rows = std::mem::take(&mut view.raw);
                view.install(rows);
            }
            _ => {}
        }
        AppCommand::None
    }

    fn apply_wizard_action(&mut self, action: Action) -> AppCommand {
        let Some(wizard) = self.wizard.as_mut() else {
            return AppCommand::None;
        };

        match action {
            Action::InputChar(c) => wizard.input_char(c),
            Action::Backspace => wizard.backspace(),
            Action::NextField => wizard.focus_next(),
            Action::PrevField => wizard.focus_prev(),
            Action::ChoiceNext => wizard.cycle_choice(1),
            Action::ChoicePrev => wizard.cycle_choice(-1),
            Action::WizardBack => {
                wizard.back();
            }
            Action::WizardNext => match wizard.next() {
                WizardTransition::Submit(data) => {
                    let kind = wizard.kind().clone();
                    return submit_wizard(kind, data);
                }
                WizardTransition::Rejected(error) => debug!("wizard step rejected: {error}"),
                _ => {}
            },
            Action::Cancel => {
                let title = wizard.title().to_string();
                self.wizard = None;
                self.messages.push(Message::info(format!("{title}: cancelled")));
            }
            _ => {}
        }
        AppCommand::None
    }

    fn activate(&mut self, action: MenuAction) -> AppCommand {
        match action {
            MenuAction::Open(kind) => {
                self.views
                    .push(View::Resources(ResourceView::new(kind, self.viewport_height)));
                self.start_load()
            }
            MenuAction::Run(operation) => self.run_operation(operation),
            MenuAction::Dispatch(request) => {
                self.views.pop();
                AppCommand::Dispatch {
                    request,
                    confirmation: Confirmation::NotRequired,
                }
            }
            MenuAction::StartWizard(kind) => self.start_wizard(kind),
            MenuAction::UseNamespace(namespace) => self.use_scope(NamespaceScope::Named(namespace)),
            MenuAction::UseNamespaceAll => self.use_scope(NamespaceScope::All),
            MenuAction::Quit => {
                self.running = false;
                AppCommand::None
            }
        }
    }

    fn open_action_menu(&mut self) -> AppCommand {
        let Some(View::Resources(view)) = self.views.last() else {
            return AppCommand::None;
        };
        let kind = view.kind;
        let targets = view.list.marked().into_iter().cloned().collect::<Vec<_>>();
        let (title, items) = match targets.as_slice() {
            [] => {
                self.messages.push(Message::info(format!(
                    "No {} to act on",
                    kind.title().to_lowercase()
                )));
                return AppCommand::None;
            }
            [row] => (
                format!("{} {}", kind.singular(), row.qualified_name()),
                action_menu(kind, row),
            ),
            rows => (
                format!("{} {} selected", rows.len(), kind.title().to_lowercase()),
                bulk_action_menu(kind),
            ),
        };

        let mut menu = MenuView::new(title, items, self.viewport_height);
        menu.targets = targets;
        self.views.push(View::Menu(menu));
        AppCommand::None
    }

    fn run_operation(&mut self, operation: Operation) -> AppCommand {
        let Some(view) = self.views.iter().rev().find_map(|view| match view {
            View::Resources(view) => Some(view),
            _ => None,
        }) else {
            return AppCommand::None;
        };

        let kind = view.kind;
        if !operation.supports(kind) {
            self.messages.push(Message::info(format!(
                "{} is not available for {}",
                operation.label(),
                kind.title().to_lowercase()
            )));
            return AppCommand::None;
        }

        let mut targets = match self.views.last() {
            Some(View::Menu(menu)) if !menu.targets.is_empty() => menu.targets.clone(),
            _ if operation.accepts_many() => view.list.marked().into_iter().cloned().collect(),
            _ => view.list.current().cloned().into_iter().collect(),
        };
        if !operation.accepts_many() {
            targets.truncate(1);
        }
        if targets.is_empty() {
            self.messages.push(Message::info(format!(
                "No {} selected",
                kind.singular()
            )));
            return AppCommand::None;
        }

        let request = DispatchRequest::on_rows(operation, kind, targets);
        if request.operation.requires_confirmation() {
            self.pending_confirmation = Some(PendingConfirmation {
                prompt: format!("{}?", request.prompt()),
                request,
            });
            return AppCommand::None;
        }

        AppCommand::Dispatch {
            request,
            confirmation: Confirmation::NotRequired,
        }
    }

    fn start_wizard(&mut self, kind: WizardKind) -> AppCommand {
        let wizard = match &kind {
            WizardKind::CreateSecret => {
                let namespace = self
                    .scope
                    .namespace()
                    .unwrap_or(&self.default_namespace)
                    .to_string();
                Wizard::create_secret(Some(&namespace))
            }
            WizardKind::SetEnvVar {
                namespace,
                deployment,
            } => Wizard::set_env_var(namespace, deployment),
        };
        self.wizard = Some(wizard);
        AppCommand::None
    }

    fn use_scope(&mut self, scope: NamespaceScope) -> AppCommand {
        self.messages
            .push(Message::success(format!("Namespace scope set to {scope}")));
        self.scope = scope;
        self.truncate_views(1)
    }

    fn go_back(&mut self) -> AppCommand {
        if self.views.len() <= 1 {
            return AppCommand::None;
        }
        self.truncate_views(self.views.len() - 1)
    }

    /// Drops views above `len`, stopping the log follower if one of them
    /// was following.
    fn truncate_views(&mut self, len: usize) -> AppCommand {
        let dropped = self.views.split_off(len.min(self.views.len()));
        let following = dropped
            .iter()
            .any(|view| matches!(view, View::Text(TextView { follow_id: Some(_), .. })));
        if following {
            AppCommand::StopFollow
        } else {
            AppCommand::None
        }
    }

    fn start_load(&mut self) -> AppCommand {
        let Some(View::Resources(view)) = self.views.last() else {
            return AppCommand::None;
        };
        let kind = view.kind;

        self.filter.reset(view.raw.len());
        let epoch = self.load.start();
        self.spinner.reset();
        AppCommand::Load {
            epoch,
            kind,
            scope: self.scope.clone(),
        }
    }

    fn cancel_load(&mut self) -> AppCommand {
        self.load.supersede();
        if let Some(View::Resources(view)) = self.views.last() {
            let kind = view.kind;
            self.views.pop();
            self.messages.push(Message::info(format!(
                "Loading {}: cancelled",
                kind.title().to_lowercase()
            )));
        }
        AppCommand::CancelLoad
    }

    fn refresh_after_change(&mut self) -> AppCommand {
        let Some(position) = self
            .views
            .iter()
            .rposition(|view| matches!(view, View::Resources(_)))
        else {
            return AppCommand::None;
        };
        let stop = self.truncate_views(position + 1);
        match (stop, self.start_load()) {
            (AppCommand::None, load) => load,
            (stop, load) => AppCommand::Batch(vec![stop, load]),
        }
    }
}

fn navigate<T>(list: &mut ListState<T>, action: &Action) -> bool {
    match action {
        Action::MoveUp => list.move_cursor(-1),
        Action::MoveDown => list.move_cursor(1),
        Action::PageUp => list.page_move(PageDirection::Up),
        Action::PageDown => list.page_move(PageDirection::Down),
        Action::Top => list.jump_to_edge(Edge::Start),
        Action::Bottom => list.jump_to_edge(Edge::End),
        _ => return false,
    }
    true
}

fn submit_wizard(kind: WizardKind, data: StepData) -> AppCommand {
    let trimmed = |key: &str| {
        data.get(key)
            .map(|value| value.trim().to_string())
            .unwrap_or_default()
    };
    let raw = |key: &str| data.get(key).cloned().unwrap_or_default();

    let request = match kind {
        WizardKind::CreateSecret => {
            let spec = ResourceSpec::Secret {
                name: trimmed("name"),
                secret_type: trimmed("type"),
                data: BTreeMap::from([(trimmed("key"), raw("value"))]),
            };
            DispatchRequest {
                operation: Operation::CreateSecret(spec),
                kind: ResourceKind::Secrets,
                namespace: Some(trimmed("namespace")),
                targets: Vec::new(),
                container: None,
            }
        }
        WizardKind::SetEnvVar {
            namespace,
            deployment,
        } => DispatchRequest::on_rows(
            Operation::SetEnv {
                container: trimmed("container"),
                name: trimmed("name"),
                value: raw("value"),
            },
            ResourceKind::Deployments,
            vec![ResourceRow::named(
                ResourceKind::Deployments,
                Some(namespace),
                deployment,
            )],
        ),
    };

    AppCommand::Dispatch {
        request,
        confirmation: Confirmation::NotRequired,
    }
}
