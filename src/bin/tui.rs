use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::{event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind}, execute, terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen}};
use ratatui::{backend::CrosstermBackend, Terminal, widgets::{Block, Borders, List, ListItem, Paragraph, ListState}, layout::{Layout, Constraint, Direction}, style::{Style, Modifier, Color}};

use todo_pool::{
    application::todo_service::{TodoService, TodoServiceImpl},
    config::AppConfig,
    domain::{
        file_resource::{guess_mime, is_accepted_upload, FileId, FileResource, ACCEPTED_EXTENSIONS},
        repository::KeyValueStore,
        timestamp::format_minute,
        todo::{parse_deadline, CreateTodo, Todo},
    },
    infrastructure::sqlite_kv::{prepare_sqlite_file, SqliteKeyValueStore},
};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let config = AppConfig::from_env()?;
    prepare_sqlite_file(&config.database_url)?;
    let store = SqliteKeyValueStore::connect(&config.database_url).await?;
    store.init().await?;
    let service = TodoServiceImpl::load(store).await;

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, service, &config.database_url).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    res
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode { View, Create, Upload }

#[derive(Clone, Copy, PartialEq, Eq)]
enum Pane { Todos, Files }

#[derive(Clone, Copy, PartialEq, Eq)]
enum ActiveField { Title, Deadline, Files }

impl ActiveField {
    fn next(self) -> Self {
        match self { Self::Title => Self::Deadline, Self::Deadline => Self::Files, Self::Files => Self::Title }
    }

    fn label(self) -> &'static str {
        match self { Self::Title => "Title", Self::Deadline => "Deadline (YYYY-MM-DDTHH:MM)", Self::Files => "File ids (comma separated)" }
    }
}

struct App<K: KeyValueStore> {
    service: TodoServiceImpl<K>,
    todos: Vec<Todo>,
    files: Vec<FileResource>,
    pane: Pane,
    todo_state: ListState,
    file_state: ListState,
    last_tick: Instant,
    mode: Mode,
    field: ActiveField,
    draft_title: String,
    draft_deadline: String,
    draft_files: String,
    draft_path: String,
    status: String,
}

impl<K: KeyValueStore> App<K> {
    async fn load(&mut self) {
        self.todos = self.service.list_sorted().await;
        self.files = self.service.list_files().await;
        clamp(&mut self.todo_state, self.todos.len());
        clamp(&mut self.file_state, self.files.len());
    }

    fn list_state(&mut self) -> &mut ListState {
        match self.pane { Pane::Todos => &mut self.todo_state, Pane::Files => &mut self.file_state }
    }

    fn pane_len(&self) -> usize {
        match self.pane { Pane::Todos => self.todos.len(), Pane::Files => self.files.len() }
    }

    fn draft(&mut self) -> &mut String {
        match (self.mode, self.field) {
            (Mode::Upload, _) => &mut self.draft_path,
            (_, ActiveField::Title) => &mut self.draft_title,
            (_, ActiveField::Deadline) => &mut self.draft_deadline,
            (_, ActiveField::Files) => &mut self.draft_files,
        }
    }

    fn clear_drafts(&mut self) {
        self.mode = Mode::View;
        self.field = ActiveField::Title;
        self.draft_title.clear();
        self.draft_deadline.clear();
        self.draft_files.clear();
        self.draft_path.clear();
    }

    async fn submit_todo(&mut self) -> Result<(), String> {
        let deadline = parse_deadline(&self.draft_deadline).map_err(|e| e.to_string())?;
        let file_ids = parse_file_ids(&self.draft_files)?;
        let todo = self
            .service
            .create(CreateTodo { title: self.draft_title.clone(), deadline, file_ids })
            .await
            .map_err(|e| e.to_string())?;
        self.status = format!("added \"{}\"", todo.title);
        Ok(())
    }

    async fn submit_upload(&mut self) -> Result<(), String> {
        let picked = upload_paths(&self.draft_path)?;
        let mut contents = Vec::with_capacity(picked.len());
        for (path, name) in picked {
            let bytes = tokio::fs::read(path).await.map_err(|e| format!("{name}: {e}"))?;
            contents.push((name, bytes));
        }
        let mut ids = Vec::with_capacity(contents.len());
        for (name, bytes) in contents {
            let mime = guess_mime(&name).to_string();
            let file = self.service.upload_file(name, mime, bytes).await.map_err(|e| e.to_string())?;
            ids.push(format!("#{}", file.id.0));
        }
        self.status = format!("uploaded {}", ids.join(", "));
        Ok(())
    }
}

/// Splits a comma separated list of paths and checks every file name before anything is read.
fn upload_paths(input: &str) -> Result<Vec<(&Path, String)>, String> {
    let picked = input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|raw| {
            let path = Path::new(raw);
            let name = path.file_name().and_then(|n| n.to_str()).ok_or_else(|| format!("`{raw}` is not a file path"))?;
            if !is_accepted_upload(name) {
                return Err(format!("unsupported file type `{name}`; accepted: {}", ACCEPTED_EXTENSIONS.join(", ")));
            }
            Ok((path, name.to_string()))
        })
        .collect::<Result<Vec<_>, String>>()?;
    if picked.is_empty() {
        return Err("no file path given".into());
    }
    Ok(picked)
}

fn clamp(state: &mut ListState, len: usize) {
    match (state.selected(), len) {
        (_, 0) => state.select(None),
        (None, _) => state.select(Some(0)),
        (Some(i), len) if i >= len => state.select(Some(len - 1)),
        _ => {}
    }
}

fn parse_file_ids(input: &str) -> Result<Vec<FileId>, String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.trim_start_matches('#').parse().map(FileId).map_err(|_| format!("invalid file id `{s}`")))
        .collect()
}

fn todo_line(t: &Todo) -> String {
    let mark = if t.completed { "[x]" } else { "[ ]" };
    let mut line = format!("{} {}", mark, t.title);
    if let Some(deadline) = &t.deadline { line.push_str(&format!("  (due {})", format_minute(deadline))); }
    if !t.files.is_empty() { line.push_str(&format!("  📎{}", t.files.len())); }
    line
}

async fn run_app<K: KeyValueStore>(terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>, service: TodoServiceImpl<K>, database_url: &str) -> Result<()> {
    let tick_rate = Duration::from_millis(200);
    let mut app = App {
        service,
        todos: vec![],
        files: vec![],
        pane: Pane::Todos,
        todo_state: ListState::default(),
        file_state: ListState::default(),
        last_tick: Instant::now(),
        mode: Mode::View,
        field: ActiveField::Title,
        draft_title: String::new(),
        draft_deadline: String::new(),
        draft_files: String::new(),
        draft_path: String::new(),
        status: String::new(),
    };
    app.load().await;

    loop {
        terminal.draw(|f| {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(3),
                    Constraint::Min(1),
                    Constraint::Length(3),
                ])
                .split(f.size());

            let header = Paragraph::new("Tab: switch pane, Enter: toggle, n: new todo, u: upload file, d: delete, q: quit")
                .block(Block::default().borders(Borders::ALL).title("todo-pool"));
            f.render_widget(header, chunks[0]);

            let middle = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
                .split(chunks[1]);

            let highlight = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD | Modifier::REVERSED);
            let pane_title = |name: &str, active: bool| if active { format!("{name} *") } else { name.to_string() };

            let todo_items: Vec<ListItem> = app.todos.iter().map(|t| ListItem::new(todo_line(t))).collect();
            let todo_list = List::new(todo_items)
                .block(Block::default().borders(Borders::ALL).title(pane_title("todos (by deadline)", app.pane == Pane::Todos)))
                .highlight_style(highlight)
                .highlight_symbol(">> ");
            f.render_stateful_widget(todo_list, middle[0], &mut app.todo_state);

            let file_items: Vec<ListItem> = app.files.iter().map(|file| {
                ListItem::new(format!("{} #{} {}  {}", file.kind().icon(), file.id.0, file.name, format_minute(&file.uploaded_at)))
            }).collect();
            let file_list = List::new(file_items)
                .block(Block::default().borders(Borders::ALL).title(pane_title("file pool", app.pane == Pane::Files)))
                .highlight_style(highlight)
                .highlight_symbol(">> ");
            f.render_stateful_widget(file_list, middle[1], &mut app.file_state);

            let (footer_title, footer_text) = match app.mode {
                Mode::View => ("info", if app.status.is_empty() { format!("DATABASE_URL={}", database_url) } else { app.status.clone() }),
                Mode::Create => {
                    let value = match app.field { ActiveField::Title => &app.draft_title, ActiveField::Deadline => &app.draft_deadline, ActiveField::Files => &app.draft_files };
                    ("new todo", format!("{}: {}_  |  (Tab to switch, Enter to save, Esc to cancel)", app.field.label(), value))
                }
                Mode::Upload => ("upload", format!("Paths (comma separated): {}_  |  (Enter to upload, Esc to cancel)", app.draft_path)),
            };
            let footer_text = if app.mode != Mode::View && !app.status.is_empty() { format!("{footer_text}  |  {}", app.status) } else { footer_text };
            let footer = Paragraph::new(footer_text)
                .block(Block::default().borders(Borders::ALL).title(footer_title));
            f.render_widget(footer, chunks[2]);
        })?;

        let timeout = tick_rate.saturating_sub(app.last_tick.elapsed());
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                // Only act on key presses; ignore repeats and releases to prevent duplicate input
                if key.kind != KeyEventKind::Press { continue; }
                match app.mode {
                    Mode::View => match key.code {
                        KeyCode::Char('q') => break,
                        KeyCode::Tab => { app.pane = match app.pane { Pane::Todos => Pane::Files, Pane::Files => Pane::Todos }; }
                        KeyCode::Up => {
                            let state = app.list_state();
                            if let Some(i) = state.selected() { state.select(Some(i.saturating_sub(1))); }
                        }
                        KeyCode::Down => {
                            let len = app.pane_len();
                            let state = app.list_state();
                            if let Some(i) = state.selected() { if i + 1 < len { state.select(Some(i + 1)); } }
                        }
                        KeyCode::Enter if app.pane == Pane::Todos => {
                            if let Some(t) = app.todo_state.selected().and_then(|i| app.todos.get(i)) {
                                let (id, completed) = (t.id, !t.completed);
                                app.service.toggle(id, completed).await;
                                app.load().await;
                            }
                        }
                        KeyCode::Char('d') => {
                            match app.pane {
                                Pane::Todos => {
                                    if let Some(t) = app.todo_state.selected().and_then(|i| app.todos.get(i)) {
                                        let id = t.id;
                                        app.service.delete(id).await;
                                        app.status = format!("deleted todo #{}", id.0);
                                    }
                                }
                                Pane::Files => {
                                    if let Some(file) = app.file_state.selected().and_then(|i| app.files.get(i)) {
                                        let id = file.id;
                                        app.service.delete_file(id).await;
                                        app.status = format!("deleted file #{} and detached it from all todos", id.0);
                                    }
                                }
                            }
                            app.load().await;
                        }
                        KeyCode::Char('n') => { app.clear_drafts(); app.status.clear(); app.mode = Mode::Create; }
                        KeyCode::Char('u') => { app.clear_drafts(); app.status.clear(); app.mode = Mode::Upload; }
                        _ => {}
                    },
                    Mode::Create | Mode::Upload => match key.code {
                        KeyCode::Esc => { app.clear_drafts(); }
                        KeyCode::Enter => {
                            let submitted = if app.mode == Mode::Create { app.submit_todo().await } else { app.submit_upload().await };
                            match submitted {
                                Ok(()) => { app.clear_drafts(); app.load().await; }
                                Err(message) => { app.status = message; }
                            }
                        }
                        KeyCode::Tab if app.mode == Mode::Create => { app.field = app.field.next(); }
                        KeyCode::Backspace => { app.draft().pop(); }
                        KeyCode::Char(c) => { app.draft().push(c); }
                        _ => {}
                    },
                }
            }
        }
        if app.last_tick.elapsed() >= tick_rate {
            app.last_tick = Instant::now();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_ids_accept_commas_hashes_and_blanks() {
        assert_eq!(parse_file_ids("").unwrap(), Vec::<FileId>::new());
        assert_eq!(parse_file_ids("1, #3,,2").unwrap(), vec![FileId(1), FileId(3), FileId(2)]);
        assert!(parse_file_ids("1, two").is_err());
    }

    #[test]
    fn upload_accepts_several_paths_and_rejects_the_batch_on_one_bad_name() {
        let picked = upload_paths(" docs/a.pdf, ,/tmp/scan.JPG ").unwrap();
        let names: Vec<_> = picked.iter().map(|(_, name)| name.as_str()).collect();
        assert_eq!(names, ["a.pdf", "scan.JPG"]);
        assert_eq!(picked[0].0, Path::new("docs/a.pdf"));

        assert!(upload_paths("a.pdf, notes.txt").unwrap_err().contains("notes.txt"));
        assert!(upload_paths(" , ").is_err());
    }

    #[test]
    fn clamp_keeps_selection_in_bounds() {
        let mut state = ListState::default();
        clamp(&mut state, 3);
        assert_eq!(state.selected(), Some(0));
        state.select(Some(2));
        clamp(&mut state, 2);
        assert_eq!(state.selected(), Some(1));
        clamp(&mut state, 0);
        assert_eq!(state.selected(), None);
    }
}
