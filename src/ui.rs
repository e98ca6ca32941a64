use std::io::{self, Stdout};
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Padding, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use textwrap::wrap;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::feed::{Feed, FilterMode, Post, PostDraft, PostId};
use crate::media::{StagedMedia, Stager};
use crate::nav::{self, Route, NAV_ENTRIES};
use crate::session::{Identity, Store};

const COLOR_BG: Color = Color::Rgb(30, 30, 46);
const COLOR_PANEL_BG: Color = Color::Rgb(24, 24, 36);
const COLOR_PANEL_FOCUSED_BG: Color = Color::Rgb(49, 50, 68);
const COLOR_PANEL_SELECTED_BG: Color = Color::Rgb(69, 71, 90);
const COLOR_BORDER_IDLE: Color = Color::Rgb(49, 50, 68);
const COLOR_BORDER_FOCUSED: Color = Color::Rgb(137, 180, 250);
const COLOR_TEXT_PRIMARY: Color = Color::Rgb(205, 214, 244);
const COLOR_TEXT_SECONDARY: Color = Color::Rgb(166, 173, 200);
const COLOR_ACCENT: Color = Color::Rgb(137, 180, 250);
const COLOR_SUCCESS: Color = Color::Rgb(166, 227, 161);
const COLOR_LIKED: Color = Color::Rgb(243, 139, 168);

const NAV_PANE_WIDTH: u16 = 24;

/// Display density, the terminal stand-in for the three font sizes in the
/// settings popup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Density {
    Compact,
    #[default]
    Default,
    Large,
}

pub const DENSITIES: [Density; 3] = [Density::Compact, Density::Default, Density::Large];

impl Density {
    pub fn from_key(key: &str) -> Self {
        match key {
            "compact" => Density::Compact,
            "large" => Density::Large,
            _ => Density::Default,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Density::Compact => "Compact",
            Density::Default => "Default",
            Density::Large => "Large",
        }
    }

    fn gap(self) -> usize {
        match self {
            Density::Compact => 0,
            Density::Default => 1,
            Density::Large => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pane {
    Navigation,
    Content,
}

impl Pane {
    fn title(self) -> &'static str {
        match self {
            Pane::Navigation => " Navigate ",
            Pane::Content => " FitFeed ",
        }
    }
}

/// Every interaction the app knows. Keys resolve to exactly one of these
/// in `action_for`, and each variant has one handler in `apply`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Quit,
    FocusNavigation,
    FocusContent,
    MoveUp,
    MoveDown,
    Activate,
    ToggleLike,
    FilterAll,
    FilterMine,
    OpenComposer,
    DeletePost,
    OpenSettings,
}

fn action_for(code: KeyCode, focused: Pane) -> Option<Action> {
    match code {
        KeyCode::Char('q') | KeyCode::Esc => Some(Action::Quit),
        KeyCode::Char('h') | KeyCode::Left => Some(Action::FocusNavigation),
        KeyCode::Char('l') | KeyCode::Right => Some(Action::FocusContent),
        KeyCode::Char('k') | KeyCode::Up => Some(Action::MoveUp),
        KeyCode::Char('j') | KeyCode::Down => Some(Action::MoveDown),
        KeyCode::Enter => Some(match focused {
            Pane::Navigation => Action::Activate,
            Pane::Content => Action::ToggleLike,
        }),
        KeyCode::Char('a') => Some(Action::FilterAll),
        KeyCode::Char('m') => Some(Action::FilterMine),
        KeyCode::Char('n') => Some(Action::OpenComposer),
        KeyCode::Char('d') => Some(Action::DeletePost),
        KeyCode::Char('s') => Some(Action::OpenSettings),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ComposerField {
    #[default]
    Title,
    Caption,
    Media,
    Submit,
    Cancel,
}

impl ComposerField {
    fn next(self) -> Self {
        match self {
            ComposerField::Title => ComposerField::Caption,
            ComposerField::Caption => ComposerField::Media,
            ComposerField::Media => ComposerField::Submit,
            ComposerField::Submit => ComposerField::Cancel,
            ComposerField::Cancel => ComposerField::Title,
        }
    }

    fn previous(self) -> Self {
        match self {
            ComposerField::Title => ComposerField::Cancel,
            ComposerField::Caption => ComposerField::Title,
            ComposerField::Media => ComposerField::Caption,
            ComposerField::Submit => ComposerField::Media,
            ComposerField::Cancel => ComposerField::Submit,
        }
    }

    fn title(self) -> &'static str {
        match self {
            ComposerField::Title => "Title",
            ComposerField::Caption => "Caption",
            ComposerField::Media => "Image file",
            ComposerField::Submit => "Post",
            ComposerField::Cancel => "Cancel",
        }
    }
}

#[derive(Default)]
struct ComposerForm {
    active: ComposerField,
    title: String,
    caption: String,
    media_path: String,
    staged: Option<StagedMedia>,
}

impl ComposerForm {
    fn focus(&mut self, field: ComposerField) {
        self.active = field;
    }

    fn next(&mut self) {
        self.active = self.active.next();
    }

    fn previous(&mut self) {
        self.active = self.active.previous();
    }

    fn active_value_mut(&mut self) -> Option<&mut String> {
        match self.active {
            ComposerField::Title => Some(&mut self.title),
            ComposerField::Caption => Some(&mut self.caption),
            ComposerField::Media => Some(&mut self.media_path),
            ComposerField::Submit | ComposerField::Cancel => None,
        }
    }

    fn insert_char(&mut self, ch: char) {
        if let Some(value) = self.active_value_mut() {
            value.push(ch);
        }
    }

    fn backspace(&mut self) {
        if let Some(value) = self.active_value_mut() {
            value.pop();
        }
    }

    fn clear_active(&mut self) {
        if let Some(value) = self.active_value_mut() {
            value.clear();
        }
    }

    fn release_staged(&mut self) {
        if let Some(staged) = self.staged.take() {
            let _ = staged.release();
        }
    }

    fn reset(&mut self) {
        self.title.clear();
        self.caption.clear();
        self.media_path.clear();
        self.release_staged();
        self.active = ComposerField::Title;
    }

    fn display_value(&self, field: ComposerField) -> String {
        let raw = match field {
            ComposerField::Title => &self.title,
            ComposerField::Caption => &self.caption,
            ComposerField::Media => &self.media_path,
            ComposerField::Submit | ComposerField::Cancel => return String::new(),
        };
        if raw.is_empty() {
            "(not set)".to_string()
        } else {
            raw.clone()
        }
    }
}

struct PendingDelete {
    id: PostId,
    title: String,
}

pub struct Options {
    pub status_message: String,
    pub identity: Identity,
    pub feed: Feed,
    pub store: Store,
    pub stager: Option<Stager>,
    pub config_path: String,
    pub density: Density,
    pub route: Route,
    pub open_composer: bool,
}

pub struct Model {
    status_message: String,
    identity: Identity,
    feed: Feed,
    store: Store,
    stager: Option<Stager>,
    config_path: String,
    density: Density,
    route: Route,
    nav_index: usize,
    focused_pane: Pane,
    selected_visible: usize,
    composer_open: bool,
    composer: ComposerForm,
    confirm_delete: Option<PendingDelete>,
    settings_visible: bool,
    settings_index: usize,
    needs_redraw: bool,
}

impl Model {
    pub fn new(options: Options) -> Self {
        let mut model = Self {
            status_message: options.status_message,
            identity: options.identity,
            feed: options.feed,
            store: options.store,
            stager: options.stager,
            config_path: options.config_path,
            density: options.density,
            route: options.route,
            nav_index: NAV_ENTRIES
                .iter()
                .position(|entry| entry.route == options.route && !entry.compose)
                .unwrap_or(0),
            focused_pane: Pane::Content,
            selected_visible: 0,
            composer_open: false,
            composer: ComposerForm::default(),
            confirm_delete: None,
            settings_visible: false,
            settings_index: 0,
            needs_redraw: true,
        };
        if options.open_composer && model.route == Route::Community {
            model.open_composer();
        }
        model
    }

    fn mark_dirty(&mut self) {
        self.needs_redraw = true;
    }

    pub fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode()?;
        stdout.execute(EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        loop {
            if self.needs_redraw {
                terminal.draw(|frame| self.draw(frame))?;
                self.needs_redraw = false;
            }

            if event::poll(Duration::from_millis(120))? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        match self.handle_key(key.code) {
                            Ok(true) => break,
                            Ok(false) => {}
                            Err(err) => {
                                self.status_message = format!("Error: {}", err);
                                self.mark_dirty();
                            }
                        }
                    }
                    Event::Resize(_, _) => self.mark_dirty(),
                    _ => {}
                }
            }
        }

        Ok(())
    }

    fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        // Overlays own the keyboard while they are up; the Escape
        // binding for the composer exists only on this path.
        if self.composer_open {
            return self.handle_composer_key(code);
        }
        if self.confirm_delete.is_some() {
            return self.handle_confirm_key(code);
        }
        if self.settings_visible {
            return self.handle_settings_key(code);
        }

        let Some(action) = action_for(code, self.focused_pane) else {
            return Ok(false);
        };
        self.apply(action)
    }

    fn apply(&mut self, action: Action) -> Result<bool> {
        match action {
            Action::Quit => return Ok(true),
            Action::FocusNavigation => self.focus_pane(Pane::Navigation),
            Action::FocusContent => self.focus_pane(Pane::Content),
            Action::MoveUp => self.move_selection(-1),
            Action::MoveDown => self.move_selection(1),
            Action::Activate => self.commit_navigation_selection()?,
            Action::ToggleLike => self.toggle_like_selected(),
            Action::FilterAll => self.set_filter(FilterMode::All),
            Action::FilterMine => self.set_filter(FilterMode::Mine),
            Action::OpenComposer => self.request_composer(),
            Action::DeletePost => self.request_delete_selected(),
            Action::OpenSettings => {
                self.settings_visible = true;
                self.settings_index = DENSITIES
                    .iter()
                    .position(|density| *density == self.density)
                    .unwrap_or(1);
                self.mark_dirty();
            }
        }
        Ok(false)
    }

    fn focus_pane(&mut self, pane: Pane) {
        if self.focused_pane != pane {
            self.focused_pane = pane;
            self.mark_dirty();
        }
    }

    fn move_selection(&mut self, delta: isize) {
        match self.focused_pane {
            Pane::Navigation => {
                let len = NAV_ENTRIES.len();
                let next = self.nav_index as isize + delta;
                self.nav_index = next.clamp(0, len as isize - 1) as usize;
            }
            Pane::Content => {
                if self.route != Route::Community {
                    return;
                }
                let visible = self.feed.visible_indices();
                if visible.is_empty() {
                    return;
                }
                let next = self.selected_visible as isize + delta;
                self.selected_visible = next.clamp(0, visible.len() as isize - 1) as usize;
            }
        }
        self.mark_dirty();
    }

    pub fn commit_navigation_selection(&mut self) -> Result<()> {
        let Some(entry) = nav::entry(self.nav_index) else {
            return Ok(());
        };
        if entry.compose {
            self.store
                .set_compose_flag()
                .context("arm composer flag")?;
        }
        self.route = entry.route;
        self.focused_pane = Pane::Content;
        self.selected_visible = 0;
        self.status_message = format!("Opened {}.", entry.route.title());

        // The community screen consumes the one-shot flag on arrival,
        // whether this navigation or an earlier one set it.
        if self.route == Route::Community && self.store.take_compose_flag()? {
            self.open_composer();
        }
        self.mark_dirty();
        Ok(())
    }

    fn selected_post_id(&self) -> Option<PostId> {
        let visible = self.feed.visible_indices();
        let index = *visible.get(self.selected_visible)?;
        Some(self.feed.posts()[index].id)
    }

    fn clamp_selection(&mut self) {
        let len = self.feed.visible_indices().len();
        if len == 0 {
            self.selected_visible = 0;
        } else {
            self.selected_visible = self.selected_visible.min(len - 1);
        }
    }

    fn feed_interaction_allowed(&self) -> bool {
        self.route == Route::Community
    }

    fn toggle_like_selected(&mut self) {
        if !self.feed_interaction_allowed() {
            return;
        }
        let Some(id) = self.selected_post_id() else {
            return;
        };
        if let Some(label) = self.feed.toggle_like(id) {
            if let Some(post) = self.feed.get(id) {
                let verb = if post.liked { "Liked" } else { "Unliked" };
                self.status_message = format!("{} \"{}\" ({}).", verb, post.title, label);
            }
        }
        self.mark_dirty();
    }

    fn set_filter(&mut self, mode: FilterMode) {
        if !self.feed_interaction_allowed() {
            return;
        }
        self.feed.set_mode(mode);
        self.clamp_selection();
        self.status_message = format!("Showing {}.", mode.label());
        self.mark_dirty();
    }

    fn request_composer(&mut self) {
        if !self.feed_interaction_allowed() {
            return;
        }
        self.open_composer();
    }

    fn open_composer(&mut self) {
        self.composer_open = true;
        self.composer.focus(ComposerField::Title);
        self.mark_dirty();
    }

    /// Close without resetting: a cancelled draft is still there when the
    /// composer reopens.
    fn close_composer(&mut self) {
        self.composer_open = false;
        self.mark_dirty();
    }

    fn request_delete_selected(&mut self) {
        if !self.feed_interaction_allowed() {
            return;
        }
        let Some(id) = self.selected_post_id() else {
            return;
        };
        let Some(post) = self.feed.get(id) else {
            return;
        };
        // Deletion is only offered on the viewer's own posts.
        if !post.mine {
            return;
        }
        self.confirm_delete = Some(PendingDelete {
            id,
            title: post.title.clone(),
        });
        self.mark_dirty();
    }

    fn handle_confirm_key(&mut self, code: KeyCode) -> Result<bool> {
        match code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                if let Some(pending) = self.confirm_delete.take() {
                    if self.feed.remove(pending.id).is_some() {
                        self.status_message = format!("Deleted \"{}\".", pending.title);
                    }
                    self.clamp_selection();
                }
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc | KeyCode::Char('q') => {
                self.confirm_delete = None;
                self.status_message = "Kept the post.".to_string();
            }
            _ => {}
        }
        self.mark_dirty();
        Ok(false)
    }

    fn handle_settings_key(&mut self, code: KeyCode) -> Result<bool> {
        match code {
            KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('s') => {
                self.settings_visible = false;
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.settings_index = self.settings_index.saturating_sub(1);
            }
            KeyCode::Char('j') | KeyCode::Down => {
                self.settings_index = (self.settings_index + 1).min(DENSITIES.len() - 1);
            }
            KeyCode::Enter => {
                self.density = DENSITIES[self.settings_index];
                self.status_message = format!("Display density set to {}.", self.density.label());
            }
            _ => {}
        }
        self.mark_dirty();
        Ok(false)
    }

    fn handle_composer_key(&mut self, code: KeyCode) -> Result<bool> {
        match code {
            KeyCode::Esc => self.close_composer(),
            KeyCode::Tab | KeyCode::Down => {
                self.composer.next();
                self.mark_dirty();
            }
            KeyCode::BackTab | KeyCode::Up => {
                self.composer.previous();
                self.mark_dirty();
            }
            KeyCode::Backspace => {
                self.composer.backspace();
                self.mark_dirty();
            }
            KeyCode::Delete => {
                self.composer.clear_active();
                self.mark_dirty();
            }
            KeyCode::Enter => match self.composer.active {
                ComposerField::Title | ComposerField::Caption => {
                    self.composer.next();
                    self.mark_dirty();
                }
                ComposerField::Media => {
                    self.stage_media();
                    self.mark_dirty();
                }
                ComposerField::Submit => {
                    self.submit_composer();
                    self.mark_dirty();
                }
                ComposerField::Cancel => self.close_composer(),
            },
            KeyCode::Char(ch) => {
                self.composer.insert_char(ch);
                self.mark_dirty();
            }
            _ => {}
        }
        Ok(false)
    }

    /// Swap the staged attachment for whatever the media field names now.
    /// The previous staged copy is always released first; a path that is
    /// blank or not an image simply leaves no attachment, with no error
    /// surfaced.
    fn stage_media(&mut self) {
        self.composer.release_staged();
        let path = self.composer.media_path.trim().to_string();
        if path.is_empty() {
            return;
        }
        let Some(stager) = self.stager.as_ref() else {
            return;
        };
        if let Ok(staged) = stager.stage(std::path::Path::new(&path)) {
            self.status_message = format!("Attached {}.", staged.name());
            self.composer.staged = Some(staged);
        }
    }

    fn submit_composer(&mut self) {
        let title = self.composer.title.trim().to_string();
        if title.is_empty() {
            // Refused without a message; focus goes back to the title.
            self.composer.focus(ComposerField::Title);
            return;
        }
        let draft = PostDraft {
            title: title.clone(),
            caption: self.composer.caption.clone(),
            media: self.composer.staged.as_ref().map(StagedMedia::as_media_ref),
        };
        if self.feed.submit(draft, &self.identity).is_some() {
            self.composer.reset();
            self.composer_open = false;
            self.selected_visible = 0;
            self.status_message = format!("Posted \"{}\".", title);
        }
    }

    fn footer_text(&self) -> String {
        format!(
            "j/k move · h/l panes · Enter select/like · n new post · a/m filter · d delete · s settings · q quit · {}",
            self.config_path
        )
    }

    fn draw(&mut self, frame: &mut Frame<'_>) {
        let full = frame.size();
        frame.render_widget(Block::default().style(Style::default().bg(COLOR_BG)), full);

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(full);

        let status_line = Paragraph::new(self.status_message.clone()).style(
            Style::default()
                .fg(COLOR_TEXT_PRIMARY)
                .bg(COLOR_PANEL_FOCUSED_BG)
                .add_modifier(Modifier::BOLD),
        );
        frame.render_widget(status_line, layout[0]);

        let main_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(NAV_PANE_WIDTH), Constraint::Min(0)])
            .split(layout[1]);

        self.draw_nav(frame, main_chunks[0]);
        self.draw_content(frame, main_chunks[1]);

        let footer = Paragraph::new(self.footer_text())
            .style(
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .bg(COLOR_PANEL_BG)
                    .add_modifier(Modifier::ITALIC),
            )
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        frame.render_widget(footer, layout[2]);

        if self.composer_open {
            self.draw_composer(frame, layout[1]);
        }
        if self.confirm_delete.is_some() {
            self.draw_confirm(frame, layout[1]);
        }
        if self.settings_visible {
            self.draw_settings(frame, layout[1]);
        }
    }

    fn pane_block(&self, pane: Pane) -> Block<'static> {
        let focused = self.focused_pane == pane;
        let border_style = if focused {
            Style::default().fg(COLOR_BORDER_FOCUSED)
        } else {
            Style::default().fg(COLOR_BORDER_IDLE)
        };
        let title_style = if focused {
            Style::default()
                .fg(COLOR_ACCENT)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(COLOR_TEXT_SECONDARY)
        };
        Block::default()
            .title(Span::styled(pane.title(), title_style))
            .borders(Borders::ALL)
            .border_style(border_style)
            .style(Style::default().bg(COLOR_PANEL_BG))
            .padding(Padding::uniform(1))
    }

    fn draw_nav(&self, frame: &mut Frame<'_>, area: Rect) {
        let block = self.pane_block(Pane::Navigation);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let items: Vec<ListItem> = NAV_ENTRIES
            .iter()
            .map(|entry| {
                let mut spans = vec![Span::styled(
                    entry.label,
                    Style::default().fg(COLOR_TEXT_PRIMARY),
                )];
                if entry.route == self.route && !entry.compose {
                    spans.push(Span::styled(
                        " ●",
                        Style::default().fg(COLOR_SUCCESS),
                    ));
                }
                ListItem::new(Line::from(spans))
            })
            .collect();

        let list = List::new(items)
            .highlight_style(
                Style::default()
                    .bg(COLOR_PANEL_SELECTED_BG)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("▶ ");

        let mut state = ListState::default();
        state.select(Some(self.nav_index));
        frame.render_stateful_widget(list, inner, &mut state);
    }

    fn draw_content(&mut self, frame: &mut Frame<'_>, area: Rect) {
        match self.route {
            Route::Community => self.draw_feed(frame, area),
            route => {
                let block = self.pane_block(Pane::Content);
                let inner = block.inner(area);
                frame.render_widget(block, area);
                let body = Paragraph::new(format!("{}\n\n{}", route.title(), route.placeholder()))
                    .style(Style::default().fg(COLOR_TEXT_SECONDARY))
                    .wrap(Wrap { trim: true });
                frame.render_widget(body, inner);
            }
        }
    }

    fn draw_feed(&mut self, frame: &mut Frame<'_>, area: Rect) {
        let block = self.pane_block(Pane::Content);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(2), Constraint::Min(0)])
            .split(inner);

        frame.render_widget(
            Paragraph::new(self.filter_tabs_line()),
            chunks[0],
        );

        let visible = self.feed.visible_indices();
        if visible.is_empty() {
            let empty = Paragraph::new("No posts to show.").style(
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .add_modifier(Modifier::ITALIC),
            );
            frame.render_widget(empty, chunks[1]);
            return;
        }

        let width = chunks[1].width.max(1) as usize;
        let items: Vec<ListItem> = visible
            .iter()
            .map(|&index| {
                let post = &self.feed.posts()[index];
                ListItem::new(render_post(post, width, self.density))
            })
            .collect();

        let list = List::new(items)
            .highlight_style(Style::default().bg(COLOR_PANEL_SELECTED_BG))
            .highlight_symbol("▶ ");

        let mut state = ListState::default();
        state.select(Some(self.selected_visible.min(visible.len() - 1)));
        frame.render_stateful_widget(list, chunks[1], &mut state);
    }

    /// Exactly two tab controls; the active one renders pressed.
    fn filter_tabs_line(&self) -> Line<'static> {
        let mut spans = Vec::new();
        for (index, mode) in [FilterMode::All, FilterMode::Mine].into_iter().enumerate() {
            if index > 0 {
                spans.push(Span::raw("  "));
            }
            let pressed = self.feed.mode() == mode;
            let style = if pressed {
                Style::default()
                    .fg(COLOR_BG)
                    .bg(COLOR_ACCENT)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(COLOR_TEXT_SECONDARY)
            };
            spans.push(Span::styled(format!(" {} ", mode.label()), style));
        }
        Line::from(spans)
    }

    fn composer_field_line(&self, field: ComposerField) -> Line<'static> {
        let is_active = self.composer.active == field;
        let indicator_style = if is_active {
            Style::default()
                .fg(COLOR_ACCENT)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(COLOR_TEXT_SECONDARY)
        };
        let mut spans = vec![
            Span::styled(if is_active { ">" } else { " " }.to_string(), indicator_style),
            Span::raw(" "),
        ];

        match field {
            ComposerField::Submit | ComposerField::Cancel => {
                let button_style = if is_active {
                    Style::default()
                        .fg(COLOR_BG)
                        .bg(COLOR_ACCENT)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(COLOR_TEXT_PRIMARY)
                };
                spans.push(Span::styled(format!("[ {} ]", field.title()), button_style));
            }
            _ => {
                spans.push(Span::styled(
                    format!("{}: ", field.title()),
                    Style::default().fg(COLOR_TEXT_SECONDARY),
                ));
                spans.push(Span::styled(
                    self.composer.display_value(field),
                    Style::default().fg(COLOR_TEXT_PRIMARY),
                ));
            }
        }
        Line::from(spans)
    }

    fn composer_body(&self) -> Text<'static> {
        let mut lines = vec![
            self.composer_field_line(ComposerField::Title),
            self.composer_field_line(ComposerField::Caption),
            self.composer_field_line(ComposerField::Media),
        ];

        if let Some(staged) = self.composer.staged.as_ref() {
            let (width, height) = staged.dimensions();
            lines.push(Line::from(Span::styled(
                format!("  {} ({}×{} {})", staged.name(), width, height, staged.mime()),
                Style::default().fg(COLOR_SUCCESS),
            )));
        }

        lines.push(Line::default());
        lines.push(self.composer_field_line(ComposerField::Submit));
        lines.push(self.composer_field_line(ComposerField::Cancel));
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            "Tab/↑↓ move · Enter confirm field · Esc close",
            Style::default()
                .fg(COLOR_TEXT_SECONDARY)
                .add_modifier(Modifier::ITALIC),
        )));
        Text::from(lines)
    }

    fn draw_composer(&self, frame: &mut Frame<'_>, area: Rect) {
        let popup_area = centered_rect(60, 60, area);
        frame.render_widget(Clear, popup_area);
        let composer = Paragraph::new(self.composer_body())
            .block(
                Block::default()
                    .title(Span::styled(
                        " New Post ",
                        Style::default()
                            .fg(COLOR_ACCENT)
                            .add_modifier(Modifier::BOLD),
                    ))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(COLOR_ACCENT))
                    .style(Style::default().bg(COLOR_PANEL_BG))
                    .padding(Padding::uniform(1)),
            )
            .wrap(Wrap { trim: false });
        frame.render_widget(composer, popup_area);
    }

    fn draw_confirm(&self, frame: &mut Frame<'_>, area: Rect) {
        let Some(pending) = self.confirm_delete.as_ref() else {
            return;
        };
        let popup_area = centered_rect(50, 30, area);
        frame.render_widget(Clear, popup_area);
        let lines = vec![
            Line::from(Span::styled(
                "Are you sure you want to delete this post?",
                Style::default().fg(COLOR_TEXT_PRIMARY),
            )),
            Line::default(),
            Line::from(Span::styled(
                format!("\"{}\"", pending.title),
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .add_modifier(Modifier::ITALIC),
            )),
            Line::default(),
            Line::from(Span::styled(
                "y delete · n keep",
                Style::default().fg(COLOR_TEXT_SECONDARY),
            )),
        ];
        let confirm = Paragraph::new(Text::from(lines))
            .block(
                Block::default()
                    .title(Span::styled(
                        " Delete Post ",
                        Style::default()
                            .fg(COLOR_LIKED)
                            .add_modifier(Modifier::BOLD),
                    ))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(COLOR_LIKED))
                    .style(Style::default().bg(COLOR_PANEL_BG))
                    .padding(Padding::uniform(1)),
            )
            .wrap(Wrap { trim: true });
        frame.render_widget(confirm, popup_area);
    }

    fn draw_settings(&self, frame: &mut Frame<'_>, area: Rect) {
        let popup_area = centered_rect(40, 40, area);
        frame.render_widget(Clear, popup_area);

        let items: Vec<ListItem> = DENSITIES
            .iter()
            .map(|density| {
                let selected = *density == self.density;
                let mut spans = vec![Span::styled(
                    density.label(),
                    Style::default().fg(COLOR_TEXT_PRIMARY),
                )];
                if selected {
                    spans.push(Span::styled(
                        " (selected)",
                        Style::default().fg(COLOR_SUCCESS),
                    ));
                }
                ListItem::new(Line::from(spans))
            })
            .collect();

        let list = List::new(items)
            .block(
                Block::default()
                    .title(Span::styled(
                        " Settings · Display density ",
                        Style::default()
                            .fg(COLOR_ACCENT)
                            .add_modifier(Modifier::BOLD),
                    ))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(COLOR_ACCENT))
                    .style(Style::default().bg(COLOR_PANEL_BG))
                    .padding(Padding::uniform(1)),
            )
            .highlight_style(
                Style::default()
                    .bg(COLOR_PANEL_SELECTED_BG)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("▶ ");

        let mut state = ListState::default();
        state.select(Some(self.settings_index));
        frame.render_stateful_widget(list, popup_area, &mut state);
    }

    #[cfg(test)]
    fn feed(&self) -> &Feed {
        &self.feed
    }
}

/// Build the view for one post: header with badge, optional media line,
/// title, wrapped caption, counters, and the delete affordance on owned
/// posts.
pub fn render_post(post: &Post, width: usize, density: Density) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    let mut header = vec![Span::styled(
        post.author.clone(),
        Style::default()
            .fg(COLOR_ACCENT)
            .add_modifier(Modifier::BOLD),
    )];
    if post.mine {
        header.push(Span::raw(" "));
        header.push(Span::styled(
            " Admin ",
            Style::default()
                .fg(COLOR_BG)
                .bg(COLOR_SUCCESS)
                .add_modifier(Modifier::BOLD),
        ));
    }
    lines.push(Line::from(header));

    if let Some(media) = post.media.as_ref() {
        lines.push(Line::from(Span::styled(
            format!("🖼 {}", media.label),
            Style::default().fg(COLOR_TEXT_SECONDARY),
        )));
    }

    lines.push(Line::from(Span::styled(
        clip_to_width(&post.title, width.saturating_sub(2).max(8)),
        Style::default()
            .fg(COLOR_TEXT_PRIMARY)
            .add_modifier(Modifier::BOLD),
    )));

    if let Some(caption) = post.caption.as_ref() {
        for wrapped in wrap(caption, width.saturating_sub(2).max(8)) {
            lines.push(Line::from(Span::styled(
                wrapped.into_owned(),
                Style::default().fg(COLOR_TEXT_SECONDARY),
            )));
        }
    }

    let likes_style = if post.liked {
        Style::default().fg(COLOR_LIKED).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(COLOR_TEXT_SECONDARY)
    };
    let mut counters = vec![
        Span::styled(post.likes_label(), likes_style),
        Span::raw("   "),
        Span::styled(
            post.views_label(),
            Style::default().fg(COLOR_TEXT_SECONDARY),
        ),
    ];
    if post.mine {
        counters.push(Span::raw("   "));
        counters.push(Span::styled(
            "d delete",
            Style::default()
                .fg(COLOR_TEXT_SECONDARY)
                .add_modifier(Modifier::ITALIC),
        ));
    }
    lines.push(Line::from(counters));

    for _ in 0..density.gap() {
        lines.push(Line::default());
    }
    lines
}

fn clip_to_width(text: &str, width: usize) -> String {
    if UnicodeWidthStr::width(text) <= width {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let ch_width = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + ch_width + 1 > width {
            break;
        }
        out.push(ch);
        used += ch_width;
    }
    out.push('…');
    out
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::PostSeed;
    use tempfile::tempdir;

    fn line_width(line: &Line<'_>) -> usize {
        line.spans
            .iter()
            .map(|span| UnicodeWidthStr::width(span.content.as_ref()))
            .sum()
    }

    fn identity() -> Identity {
        Identity::from_stored(Some("AdminUser"), "AdminUser")
    }

    fn seeded_feed() -> Feed {
        Feed::seeded(
            vec![
                PostSeed {
                    author: "@AdminUser".into(),
                    title: "Morning run recap".into(),
                    likes: Some("❤ 12".into()),
                    views: Some("👁 48".into()),
                    ..Default::default()
                },
                PostSeed {
                    author: "@trail_mix".into(),
                    title: "Hill repeats".into(),
                    caption: Some("Six rounds, legs gone.".into()),
                    ..Default::default()
                },
            ],
            &identity(),
        )
    }

    fn model_in(dir: &tempfile::TempDir, open_composer: bool) -> Model {
        let store = Store::open(crate::session::Options {
            path: Some(dir.path().join("session.db")),
        })
        .unwrap();
        Model::new(Options {
            status_message: String::new(),
            identity: identity(),
            feed: seeded_feed(),
            store,
            stager: None,
            config_path: "~/.config/fitfeed/config.yaml".into(),
            density: Density::Default,
            route: Route::Community,
            open_composer,
        })
    }

    #[test]
    fn enter_maps_per_pane() {
        assert_eq!(
            action_for(KeyCode::Enter, Pane::Navigation),
            Some(Action::Activate)
        );
        assert_eq!(
            action_for(KeyCode::Enter, Pane::Content),
            Some(Action::ToggleLike)
        );
        assert_eq!(action_for(KeyCode::Char('z'), Pane::Content), None);
    }

    #[test]
    fn composer_fields_cycle_both_ways() {
        let mut field = ComposerField::Title;
        for _ in 0..5 {
            field = field.next();
        }
        assert_eq!(field, ComposerField::Title);
        for _ in 0..5 {
            field = field.previous();
        }
        assert_eq!(field, ComposerField::Title);
    }

    #[test]
    fn auto_open_flag_opens_composer_on_community() {
        let dir = tempdir().unwrap();
        let model = model_in(&dir, true);
        assert!(model.composer_open);
    }

    #[test]
    fn create_post_nav_entry_arms_flag_and_opens_composer() {
        let dir = tempdir().unwrap();
        let mut model = model_in(&dir, false);
        model.nav_index = NAV_ENTRIES
            .iter()
            .position(|entry| entry.compose)
            .unwrap();
        model.commit_navigation_selection().unwrap();
        assert_eq!(model.route, Route::Community);
        assert!(model.composer_open);
        // The flag is one-shot: nothing left behind for the next arrival.
        assert!(!model.store.take_compose_flag().unwrap());
    }

    #[test]
    fn empty_title_submit_keeps_feed_and_refocuses_title() {
        let dir = tempdir().unwrap();
        let mut model = model_in(&dir, true);
        model.composer.focus(ComposerField::Submit);
        model.composer.caption = "caption only".into();
        let before = model.feed().len();
        model.submit_composer();
        assert_eq!(model.feed().len(), before);
        assert!(model.composer_open);
        assert_eq!(model.composer.active, ComposerField::Title);
    }

    #[test]
    fn successful_submit_prepends_resets_and_closes() {
        let dir = tempdir().unwrap();
        let mut model = model_in(&dir, true);
        model.composer.title = "Tempo Tuesday".into();
        model.composer.caption = "5x1k at threshold".into();
        let before = model.feed().len();
        model.submit_composer();
        assert_eq!(model.feed().len(), before + 1);
        assert_eq!(model.feed().posts()[0].title, "Tempo Tuesday");
        assert!(!model.composer_open);
        assert!(model.composer.title.is_empty());
        assert!(model.composer.caption.is_empty());
    }

    #[test]
    fn delete_requires_confirmation() {
        let dir = tempdir().unwrap();
        let mut model = model_in(&dir, false);
        let before = model.feed().len();

        // Selected post 0 is owned; request then decline.
        model.request_delete_selected();
        assert!(model.confirm_delete.is_some());
        model.handle_confirm_key(KeyCode::Char('n')).unwrap();
        assert_eq!(model.feed().len(), before);

        // Request again and confirm.
        model.request_delete_selected();
        model.handle_confirm_key(KeyCode::Char('y')).unwrap();
        assert_eq!(model.feed().len(), before - 1);
    }

    #[test]
    fn delete_is_refused_on_foreign_posts() {
        let dir = tempdir().unwrap();
        let mut model = model_in(&dir, false);
        model.selected_visible = 1;
        model.request_delete_selected();
        assert!(model.confirm_delete.is_none());
    }

    #[test]
    fn filter_clamps_selection() {
        let dir = tempdir().unwrap();
        let mut model = model_in(&dir, false);
        model.selected_visible = 1;
        model.set_filter(FilterMode::Mine);
        assert_eq!(model.selected_visible, 0);
        assert_eq!(model.feed().visible_indices().len(), 1);
    }

    #[test]
    fn feed_keys_are_noops_off_community() {
        let dir = tempdir().unwrap();
        let mut model = model_in(&dir, false);
        model.route = Route::Dashboard;
        let before = model.feed().posts()[0].likes;
        model.toggle_like_selected();
        assert_eq!(model.feed().posts()[0].likes, before);
        model.request_delete_selected();
        assert!(model.confirm_delete.is_none());
    }

    #[test]
    fn escape_closes_composer_without_reset() {
        let dir = tempdir().unwrap();
        let mut model = model_in(&dir, true);
        model.composer.title = "half-finished".into();
        model.handle_composer_key(KeyCode::Esc).unwrap();
        assert!(!model.composer_open);
        assert_eq!(model.composer.title, "half-finished");
    }

    #[test]
    fn render_post_marks_ownership() {
        let feed = seeded_feed();
        let mine = render_post(&feed.posts()[0], 60, Density::Compact);
        let theirs = render_post(&feed.posts()[1], 60, Density::Compact);

        let mine_text: String = mine
            .iter()
            .flat_map(|line| line.spans.iter())
            .map(|span| span.content.as_ref())
            .collect();
        let theirs_text: String = theirs
            .iter()
            .flat_map(|line| line.spans.iter())
            .map(|span| span.content.as_ref())
            .collect();

        assert!(mine_text.contains("Admin"));
        assert!(mine_text.contains("d delete"));
        assert!(mine_text.contains("❤ 12"));
        assert!(!theirs_text.contains("Admin"));
        assert!(!theirs_text.contains("d delete"));
    }

    #[test]
    fn render_post_density_controls_gap() {
        let feed = seeded_feed();
        let compact = render_post(&feed.posts()[0], 60, Density::Compact);
        let large = render_post(&feed.posts()[0], 60, Density::Large);
        assert_eq!(large.len(), compact.len() + 2);
    }

    #[test]
    fn counter_spans_have_width() {
        let feed = seeded_feed();
        let lines = render_post(&feed.posts()[0], 60, Density::Compact);
        assert!(lines.iter().all(|line| line_width(line) < 60));
    }

    #[test]
    fn clip_to_width_keeps_short_text_and_marks_long_text() {
        assert_eq!(clip_to_width("short", 10), "short");
        let clipped = clip_to_width("a very long post title indeed", 10);
        assert!(clipped.ends_with('…'));
        assert!(UnicodeWidthStr::width(clipped.as_str()) <= 10);
    }

    #[test]
    fn density_from_key_falls_back_to_default() {
        assert_eq!(Density::from_key("compact"), Density::Compact);
        assert_eq!(Density::from_key("large"), Density::Large);
        assert_eq!(Density::from_key("anything"), Density::Default);
    }
}
