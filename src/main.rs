use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers,
};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::execute;
use indoc::indoc;
use ratatui::backend::CrosstermBackend;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Widget};
use ratatui::{Frame, Terminal};

use term_wm_core::control::FocusFlag;
use term_wm_core::focus::FocusChangeReason;
use term_wm_core::invalidation::InvalidationReason;
use term_wm_core::layout::LayoutRequirements;
use term_wm_core::log_buffer::{self, LogBuffer};
use term_wm_core::window::{Bounds, Window, WindowSpec, WindowState};
use term_wm_core::{
    ControlId, CoreError, WindowId, WindowSystem, WindowSystemConfig, theme, tracing_sub,
};

const HELP: &str = indoc! {"
    n new  m modal  o orphan  w close  x min  r restore  z max  t toast  ^Q quit
"};

#[derive(Parser, Debug)]
#[command(
    name = "term-wm-core-demo",
    version = env!("CARGO_PKG_VERSION"),
    about = "Overlapping terminal windows driven by the coordination core"
)]
struct DemoCli {
    /// Windows to open at start-up.
    #[arg(short = 'w', long = "windows", value_name = "COUNT", default_value_t = 3)]
    windows: usize,

    /// Invalidation coalescing window.
    #[arg(long = "coalesce-ms", value_name = "MS", default_value_t = 5)]
    coalesce_ms: u64,

    /// Length of one attention-flash pulse.
    #[arg(long = "flash-pulse-ms", value_name = "MS", default_value_t = 180)]
    flash_pulse_ms: u64,

    /// Number of attention-flash pulses.
    #[arg(long = "flash-repeats", value_name = "COUNT", default_value_t = 3)]
    flash_repeats: u32,

    /// How long a toast stays up.
    #[arg(long = "notice-secs", value_name = "SECONDS", default_value_t = 3.0)]
    notice_secs: f64,
}

impl DemoCli {
    fn config(&self) -> Result<WindowSystemConfig, String> {
        if self.windows > 9 {
            return Err("at most 9 start-up windows".to_string());
        }
        if !(0.1..=60.0).contains(&self.notice_secs) {
            return Err("notice-secs must be between 0.1 and 60".to_string());
        }
        if self.flash_repeats == 0 {
            return Err("flash-repeats must be at least 1".to_string());
        }
        let defaults = WindowSystemConfig::default();
        Ok(defaults
            .with_coalesce_delay(Duration::from_millis(self.coalesce_ms))
            .with_flash(
                defaults.flash_tick,
                Duration::from_millis(self.flash_pulse_ms),
                self.flash_repeats,
            )
            .with_notice_lifetime(Duration::from_secs_f64(self.notice_secs)))
    }
}

fn main() -> io::Result<()> {
    let args = DemoCli::parse();
    let config = args.config().map_err(io::Error::other)?;

    let log = LogBuffer::default();
    log_buffer::install_global(log.clone());
    tracing_sub::init_default();

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    terminal::enable_raw_mode()?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let size = terminal.size()?;
    let mut demo = Demo::new(config.with_screen(desktop_area(size.width, size.height)), log);
    let result = demo
        .open_initial(args.windows)
        .map_err(io::Error::other)
        .and_then(|_| run(&mut terminal, &mut demo));

    terminal::disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableMouseCapture,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;
    demo.system.dispose();

    result
}

/// Everything but the bottom status row.
fn desktop_area(width: u16, height: u16) -> Rect {
    Rect::new(0, 0, width, height.saturating_sub(1))
}

struct Demo {
    system: WindowSystem,
    log: LogBuffer,
    bodies: HashMap<WindowId, ControlId>,
    opened: usize,
    toasts: usize,
}

impl Demo {
    fn new(config: WindowSystemConfig, log: LogBuffer) -> Self {
        Self {
            system: WindowSystem::new(config),
            log,
            bodies: HashMap::new(),
            opened: 0,
            toasts: 0,
        }
    }

    fn open_initial(&mut self, count: usize) -> Result<(), CoreError> {
        for _ in 0..count {
            self.open(WindowSpec::new(""))?;
        }
        Ok(())
    }

    fn open(&mut self, spec: WindowSpec) -> Result<WindowId, CoreError> {
        let slot = self.opened as i32;
        self.opened += 1;
        let bounds = Bounds::new(2 + (slot * 5) % 40, 1 + (slot * 2) % 10, 32, 9);
        let title = if spec.title.is_empty() {
            format!("Window {}", self.opened)
        } else {
            spec.title.clone()
        };
        let spec = WindowSpec {
            title,
            bounds,
            ..spec
        };
        let id = self.system.open_window(spec, true)?;
        let control = self.system.create_control(
            id,
            None,
            Arc::new(FocusFlag::new()),
            LayoutRequirements::stretch(),
        )?;
        self.bodies.insert(id, control);
        if self.system.registry().active_window()? == Some(id) {
            self.system
                .focus()
                .set_focus(id, Some(control), FocusChangeReason::Programmatic)?;
        }
        Ok(id)
    }

    /// Returns `true` when the demo should exit.
    fn handle_key(&mut self, key: &KeyEvent) -> Result<bool, CoreError> {
        if key.code == KeyCode::Char('q') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return Ok(true);
        }
        let registry = Arc::clone(self.system.registry());
        let active = registry.active_window()?;
        match key.code {
            KeyCode::Char('n') => {
                self.open(WindowSpec::new(""))?;
            }
            KeyCode::Char('m') => {
                if let Some(parent) = active {
                    self.open(WindowSpec::new("Modal").modal(Some(parent)))?;
                }
            }
            KeyCode::Char('o') => {
                self.open(WindowSpec::new("System modal").modal(None).always_on_top())?;
            }
            KeyCode::Char('w') => {
                if let Some(id) = active {
                    if registry.close(id, false)? {
                        let open: HashSet<WindowId> =
                            registry.windows_by_z()?.iter().map(|w| w.id).collect();
                        self.bodies.retain(|window, _| open.contains(window));
                    } else {
                        self.system.notices().show("close was vetoed")?;
                    }
                }
            }
            KeyCode::Char('x') => {
                if let Some(id) = active {
                    registry.minimize(id)?;
                }
            }
            KeyCode::Char('r') => {
                let newest_minimized = registry
                    .windows_by_z()?
                    .into_iter()
                    .rev()
                    .find(Window::is_minimized);
                if let Some(window) = newest_minimized {
                    registry.restore(window.id)?;
                }
            }
            KeyCode::Char('z') => {
                if let Some(id) = active {
                    if registry.window(id)?.state == WindowState::Maximized {
                        registry.restore(id)?;
                    } else {
                        registry.maximize(id)?;
                    }
                }
            }
            KeyCode::Char('t') => {
                self.toasts += 1;
                self.system.notices().show(format!("toast #{}", self.toasts))?;
            }
            _ => {}
        }
        Ok(false)
    }

    fn resize(&self, width: u16, height: u16) -> Result<(), CoreError> {
        self.system.set_screen_area(desktop_area(width, height))
    }

    fn invalidate_windows(&self, windows: impl IntoIterator<Item = WindowId>) {
        for id in windows {
            let Some(control) = self.bodies.get(&id) else {
                continue;
            };
            if let Err(err) =
                self.system
                    .invalidation()
                    .request_invalidation(*control, InvalidationReason::CONTENT, false)
            {
                tracing::warn!(window_id = ?id, error = %err, "could not invalidate body");
            }
        }
    }

    fn paint_body(
        &self,
        buf: &mut Buffer,
        window: &Window,
        control: ControlId,
        inner: Rect,
    ) -> Result<(), CoreError> {
        if inner.is_empty() {
            return Ok(());
        }
        let layout = self.system.layout();
        let invalidation = self.system.invalidation();
        if layout.update_available_space(control, inner.width, inner.height)?
            || layout.needs_rerender(control)?
        {
            invalidation.request_invalidation(control, InvalidationReason::LAYOUT, false)?;
        }
        let (width, height) = layout.effective_size(control)?;
        let lines = body_lines(window);
        let content = invalidation.get_or_render::<CoreError, _>(control, || {
            let mut content = Buffer::empty(Rect::new(0, 0, width, height));
            Paragraph::new(lines).render(content.area, &mut content);
            Ok(content)
        })?;
        layout.record_rendered(control, width, height)?;
        if let Some(content) = content {
            blit(&content, inner, buf);
        }
        Ok(())
    }
}

fn body_lines(window: &Window) -> Vec<Line<'static>> {
    let mut lines = vec![
        Line::from(format!("id {}  z {}", window.id, window.z)),
        Line::from(format!("state {:?}", window.state)),
    ];
    if window.is_modal {
        let owner = window
            .parent
            .map_or_else(|| "everyone".to_string(), |parent| parent.to_string());
        lines.push(Line::from(format!("blocking {owner}")));
    }
    if window.is_active {
        lines.push(Line::from("active").style(Style::default().add_modifier(Modifier::BOLD)));
    }
    lines
}

fn blit(src: &Buffer, dest_area: Rect, dest: &mut Buffer) {
    for y in 0..src.area.height.min(dest_area.height) {
        for x in 0..src.area.width.min(dest_area.width) {
            let target = (dest_area.x.saturating_add(x), dest_area.y.saturating_add(y));
            if let (Some(from), Some(to)) = (src.cell((x, y)), dest.cell_mut(target)) {
                *to = from.clone();
            }
        }
    }
}

fn window_title(window: &Window) -> String {
    let mut title = window.title_or_default();
    if window.is_modal {
        title.push_str(" [modal]");
    }
    if window.is_always_on_top {
        title.push_str(" [pinned]");
    }
    title
}

fn draw(frame: &mut Frame, demo: &Demo) -> Result<(), CoreError> {
    let area = frame.area();
    let desktop = desktop_area(area.width, area.height);
    frame.render_widget(Clear, area);

    for window in demo.system.registry().windows_by_z()? {
        if window.is_minimized() {
            continue;
        }
        let Some(rect) = window.bounds.visible_in(desktop) else {
            continue;
        };
        let border = if window.is_active {
            theme::active_frame_fg()
        } else {
            theme::frame_fg()
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .title(window_title(&window))
            .title_style(Style::default().fg(theme::title_fg()))
            .style(Style::default().bg(theme::window_bg()));
        let inner = block.inner(rect);
        frame.render_widget(Clear, rect);
        frame.render_widget(block, rect);
        if let Some(control) = demo.bodies.get(&window.id) {
            demo.paint_body(frame.buffer_mut(), &window, *control, inner)?;
        }
        demo.system.flash().paint(window.id, rect, frame.buffer_mut());
    }

    for notice in demo.system.notices().notices() {
        let rect = notice.area.intersection(area);
        if rect.is_empty() {
            continue;
        }
        let toast = Paragraph::new(notice.text.clone())
            .block(Block::default().borders(Borders::ALL))
            .style(Style::default().bg(theme::notice_bg()).fg(theme::notice_fg()));
        frame.render_widget(Clear, rect);
        frame.render_widget(toast, rect);
    }

    let status_row = Rect::new(area.x, area.bottom().saturating_sub(1), area.width, 1);
    let last_log = demo.log.tail(1).pop().unwrap_or_default();
    let status = format!("{}  | {}", HELP.trim_end(), last_log);
    frame.render_widget(Paragraph::new(status), status_row);
    Ok(())
}

fn run(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    demo: &mut Demo,
) -> io::Result<()> {
    let mut force_redraw = true;
    loop {
        let dirty = demo.system.dirty().take();
        if force_redraw || !dirty.is_empty() {
            demo.invalidate_windows(dirty.windows.iter().copied());
            let mut failure = None;
            terminal.draw(|frame| failure = draw(frame, demo).err())?;
            if let Some(err) = failure {
                tracing::warn!(error = %err, "frame incomplete");
            }
            force_redraw = false;
        }

        if !event::poll(Duration::from_millis(16))? {
            continue;
        }
        let event = event::read()?;
        match &event {
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                match demo.handle_key(key) {
                    Ok(true) => return Ok(()),
                    Ok(false) => {}
                    Err(err) => tracing::warn!(error = %err, "key action failed"),
                }
            }
            Event::Mouse(_) => {
                if let Err(err) = demo.system.pointer().handle_event(&event) {
                    tracing::warn!(error = %err, "pointer action failed");
                }
            }
            Event::Resize(width, height) => {
                demo.resize(*width, *height).map_err(io::Error::other)?;
                force_redraw = true;
            }
            _ => {}
        }
    }
}
