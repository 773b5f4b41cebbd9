use std::io;
use std::time::{Duration, Instant};

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{
        Block, Borders, List, ListItem, Paragraph,
        canvas::{Canvas, Points, Rectangle},
    },
};

use crate::simulation::{Indicator, Simulation};
use crate::snapshot::{SettlementView, Snapshot};
use crate::types::{Settlement, map};

/// Keys handled by the live view, as listed in `--help`.
pub const WATCH_CONTROLS: &[(&str, &str)] = &[
    ("Space", "Pause/Resume"),
    ("1/2", "Raise wheat/tools demand override"),
    ("3/4", "Lower wheat/tools demand override"),
    ("T/t", "Raise/lower town depletion override"),
    ("V/v", "Raise/lower village depletion override"),
    ("c", "Clear demand and depletion overrides"),
    ("q", "Quit"),
];

const DEMAND_STEP: f64 = 10.0;
const DEPLETION_STEP: f64 = 0.25;

/// State of the live view between frames.
pub struct LiveView {
    snapshot: Snapshot,
    frame_interval: Duration,
    last_instant: Instant,
    paused: bool,
}

impl LiveView {
    pub fn new(simulation: &Simulation, frames_per_second: f64) -> Self {
        Self {
            snapshot: simulation.snapshot(),
            frame_interval: Duration::from_secs_f64(1.0 / frames_per_second.max(1.0)),
            last_instant: Instant::now(),
            paused: false,
        }
    }

    /// Pausing freezes both the model and its timers. On resume the clock
    /// restarts so the paused span is never replayed.
    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
        self.last_instant = Instant::now();
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Advances the model by the wall-clock time since the previous frame.
    pub fn step(&mut self, simulation: &mut Simulation) {
        if self.paused {
            return;
        }
        let now = Instant::now();
        let delta = now.duration_since(self.last_instant);
        self.last_instant = now;
        self.snapshot = simulation.tick(delta.as_secs_f64());
    }
}

/// Runs the simulation in the terminal until the user quits.
pub fn run_live(simulation: &mut Simulation, frames_per_second: f64) -> io::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut view = LiveView::new(simulation, frames_per_second);
    let res = run_app(&mut terminal, simulation, &mut view);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    res
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    simulation: &mut Simulation,
    view: &mut LiveView,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| draw_ui(f, view, simulation))?;

        if event::poll(view.frame_interval)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') => return Ok(()),
                        KeyCode::Char(' ') => view.toggle_pause(),
                        KeyCode::Char('1') => {
                            nudge_demand(simulation, Indicator::WheatDemand, DEMAND_STEP)
                        }
                        KeyCode::Char('2') => {
                            nudge_demand(simulation, Indicator::ToolsDemand, DEMAND_STEP)
                        }
                        KeyCode::Char('3') => {
                            nudge_demand(simulation, Indicator::WheatDemand, -DEMAND_STEP)
                        }
                        KeyCode::Char('4') => {
                            nudge_demand(simulation, Indicator::ToolsDemand, -DEMAND_STEP)
                        }
                        KeyCode::Char('T') => {
                            nudge_depletion(simulation, Settlement::Town, DEPLETION_STEP)
                        }
                        KeyCode::Char('t') => {
                            nudge_depletion(simulation, Settlement::Town, -DEPLETION_STEP)
                        }
                        KeyCode::Char('V') => {
                            nudge_depletion(simulation, Settlement::Village, DEPLETION_STEP)
                        }
                        KeyCode::Char('v') => {
                            nudge_depletion(simulation, Settlement::Village, -DEPLETION_STEP)
                        }
                        KeyCode::Char('c') => clear_overrides(simulation),
                        _ => {}
                    }
                }
            }
        }

        view.step(simulation);
    }
}

fn nudge_demand(simulation: &mut Simulation, indicator: Indicator, step: f64) {
    let current = simulation.indicators();
    let value = match indicator {
        Indicator::WheatDemand => current.wheat_demand,
        Indicator::WheatSupply => current.wheat_supply,
        Indicator::ToolsDemand => current.tools_demand,
        Indicator::ToolsSupply => current.tools_supply,
    };
    simulation.set_indicator_override(indicator, Some((value + step).clamp(0.0, 100.0)));
}

fn nudge_depletion(simulation: &mut Simulation, settlement: Settlement, step: f64) {
    let rate = simulation.ledger(settlement).effective_depletion_rate();
    simulation.set_depletion_override(settlement, Some((rate + step).max(0.0)));
}

fn clear_overrides(simulation: &mut Simulation) {
    simulation.set_indicator_override(Indicator::WheatDemand, None);
    simulation.set_indicator_override(Indicator::ToolsDemand, None);
    simulation.set_depletion_override(Settlement::Town, None);
    simulation.set_depletion_override(Settlement::Village, None);
}

fn draw_ui(f: &mut Frame, view: &LiveView, simulation: &Simulation) {
    let snapshot = &view.snapshot;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(16),   // Main content
            Constraint::Length(8), // Event log
            Constraint::Length(1), // Footer
        ])
        .split(f.area());

    let header = Paragraph::new(format!(
        "Trade Route - {:.1}s (tick {}) - Wheat {:.2} Tools {:.2} - Money {:.2} {}",
        snapshot.sim_time,
        snapshot.tick,
        snapshot.prices.wheat_price,
        snapshot.prices.tools_price,
        snapshot.total_money,
        if view.paused { "[PAUSED]" } else { "" }
    ))
    .style(
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    )
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::BOTTOM));
    f.render_widget(header, chunks[0]);

    let main = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(30),
            Constraint::Percentage(40),
            Constraint::Percentage(30),
        ])
        .split(chunks[1]);

    let settlements = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Ratio(1, 2), Constraint::Ratio(1, 2)])
        .split(main[0]);
    draw_settlement(f, settlements[0], &snapshot.town, "Smithies");
    draw_settlement(f, settlements[1], &snapshot.village, "Farms");

    draw_map(f, main[1], snapshot);
    draw_trade_log(f, main[2], snapshot);

    let events: Vec<ListItem> = simulation
        .events()
        .recent(chunks[2].height.saturating_sub(2) as usize)
        .iter()
        .rev()
        .map(|e| ListItem::new(e.to_string()))
        .collect();
    let events_list = List::new(events)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Recent Events"),
        )
        .style(Style::default().fg(Color::White));
    f.render_widget(events_list, chunks[2]);

    let footer = Paragraph::new(
        "[q] Quit  [Space] Pause  [1/3] Wheat demand  [2/4] Tools demand  [T/t V/v] Depletion  [c] Clear",
    )
    .style(Style::default().fg(Color::DarkGray))
    .alignment(Alignment::Center);
    f.render_widget(footer, chunks[3]);
}

fn stock_color(amount: f64, capacity: f64) -> Color {
    let share = if capacity > 0.0 { amount / capacity } else { 0.0 };
    if share < 0.05 {
        Color::Red
    } else if share < 0.2 {
        Color::Yellow
    } else {
        Color::White
    }
}

fn progress_bar(progress: f64, width: usize) -> String {
    let filled = ((progress.clamp(0.0, 1.0) * width as f64).round() as usize).min(width);
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

fn draw_settlement(f: &mut Frame, area: Rect, view: &SettlementView, producers: &str) {
    let mut lines = vec![
        Line::from(vec![
            Span::raw("Wheat "),
            Span::styled(
                format!("{:6.1}", view.wheat),
                Style::default().fg(stock_color(view.wheat, view.max_storage)),
            ),
            Span::raw("  Tools "),
            Span::styled(
                format!("{:6.1}", view.tools),
                Style::default().fg(stock_color(view.tools, view.max_storage)),
            ),
        ]),
        Line::from(vec![
            Span::raw("Money "),
            Span::styled(
                format!("{:8.2}", view.money),
                Style::default().fg(Color::Yellow),
            ),
        ]),
        Line::from(vec![
            Span::raw("Pop   "),
            Span::styled(
                format!("{:6.1}", view.population),
                Style::default()
                    .fg(if view.population < view.population_base {
                        Color::Yellow
                    } else {
                        Color::Green
                    })
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(format!(" / {:.0}", view.population_base)),
        ]),
        Line::from(format!("Depletion {:.3}/s", view.depletion_rate)),
    ];

    if view.settlement == Settlement::Village {
        lines.push(Line::from(vec![
            Span::raw("Wheat market "),
            if view.wheat_market_open {
                Span::styled("OPEN", Style::default().fg(Color::Green))
            } else {
                Span::styled("CLOSED", Style::default().fg(Color::Red))
            },
            Span::raw(format!(" (reserve {:.0})", view.wheat_reserve)),
        ]));
    }

    lines.push(Line::from(Span::styled(
        producers,
        Style::default().add_modifier(Modifier::UNDERLINED),
    )));
    for progress in &view.production_progress {
        lines.push(Line::from(Span::styled(
            progress_bar(*progress, 16),
            Style::default().fg(Color::Green),
        )));
    }

    let panel = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(" {} ", view.settlement)),
    );
    f.render_widget(panel, area);
}

/// Draws the map with screen coordinates flipped so y grows upwards.
fn draw_map(f: &mut Frame, area: Rect, snapshot: &Snapshot) {
    let flip = |y: f64| map::HEIGHT - y;
    let villagers: Vec<(f64, f64)> = snapshot
        .villagers
        .iter()
        .map(|v| (v.position.x, flip(v.position.y)))
        .collect();
    let trader = [(snapshot.trader.position.x, flip(snapshot.trader.position.y))];
    let town = map::TRADER_TOWN_WAYPOINT;
    let village = map::TRADER_VILLAGE_WAYPOINT;

    let canvas = Canvas::default()
        .block(Block::default().borders(Borders::ALL).title(" Map "))
        .x_bounds([0.0, map::WIDTH])
        .y_bounds([0.0, map::HEIGHT])
        .paint(move |ctx| {
            ctx.draw(&Rectangle {
                x: town.x - 30.0,
                y: flip(town.y) - 30.0,
                width: 60.0,
                height: 60.0,
                color: Color::Blue,
            });
            ctx.draw(&Rectangle {
                x: village.x - 30.0,
                y: flip(village.y) - 30.0,
                width: 60.0,
                height: 60.0,
                color: Color::Green,
            });
            ctx.print(town.x - 20.0, flip(town.y) + 40.0, "Town");
            ctx.print(village.x - 30.0, flip(village.y) - 50.0, "Village");
            ctx.layer();
            ctx.draw(&Points {
                coords: &villagers,
                color: Color::Yellow,
            });
            ctx.draw(&Points {
                coords: &trader,
                color: Color::Magenta,
            });
        });
    f.render_widget(canvas, area);
}

fn draw_trade_log(f: &mut Frame, area: Rect, snapshot: &Snapshot) {
    let trader = &snapshot.trader;
    let mut items = vec![
        ListItem::new(Line::from(vec![
            Span::styled("Trader ", Style::default().fg(Color::Magenta)),
            Span::raw(format!(
                "{:.0} wheat {:.0} tools {:.1} money",
                trader.wheat, trader.tools, trader.money
            )),
        ])),
        ListItem::new(if trader.waiting_for_wheat {
            Line::from(Span::styled(
                "  waiting for wheat",
                Style::default().fg(Color::Yellow),
            ))
        } else {
            Line::from(format!("  {:?}", trader.phase))
        }),
    ];
    items.extend(snapshot.trade_log.iter().map(|record| {
        ListItem::new(format!(
            "{} {:?} {:.0}w {:.0}t",
            record.timestamp.format("%H:%M:%S"),
            record.kind,
            record.wheat_amount,
            record.tools_amount
        ))
    }));

    let list = List::new(items).block(Block::default().borders(Borders::ALL).title(" Trades "));
    f.render_widget(list, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::{PriceQuote, StaticPriceSource};
    use crate::scenario::Scenario;
    use ratatui::backend::TestBackend;

    fn simulation() -> Simulation {
        let mut scenario = Scenario::default();
        scenario.random_seed = Some(3);
        Simulation::new(
            scenario,
            Box::new(StaticPriceSource::new(PriceQuote::new(10.0, 10.0))),
        )
        .unwrap()
    }

    #[test]
    fn test_progress_bar() {
        assert_eq!(progress_bar(0.0, 4), "░░░░");
        assert_eq!(progress_bar(0.5, 4), "██░░");
        assert_eq!(progress_bar(2.0, 4), "████");
    }

    #[test]
    fn test_paused_view_does_not_advance() {
        let mut sim = simulation();
        let mut view = LiveView::new(&sim, 60.0);

        view.toggle_pause();
        assert!(view.is_paused());
        view.step(&mut sim);
        assert_eq!(sim.tick_count(), 0);

        view.toggle_pause();
        view.step(&mut sim);
        assert_eq!(sim.tick_count(), 1);
        // Resuming restarts the clock, so almost no time passes.
        assert!(sim.sim_time() < 0.5);
    }

    #[test]
    fn test_draws_without_panicking() {
        let mut sim = simulation();
        let mut view = LiveView::new(&sim, 60.0);
        for _ in 0..5 {
            view.step(&mut sim);
        }

        let backend = TestBackend::new(140, 40);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|f| draw_ui(f, &view, &sim)).unwrap();
    }

    #[test]
    fn test_demand_nudges_are_bounded() {
        let mut sim = simulation();
        nudge_demand(&mut sim, Indicator::WheatDemand, DEMAND_STEP);
        assert_eq!(sim.indicator_overrides().wheat_demand, Some(100.0));

        nudge_depletion(&mut sim, Settlement::Town, -10.0);
        assert_eq!(sim.ledger(Settlement::Town).depletion_override, Some(0.0));

        clear_overrides(&mut sim);
        assert_eq!(sim.indicator_overrides().wheat_demand, None);
        assert_eq!(sim.ledger(Settlement::Town).depletion_override, None);
    }
}
