// SPDX-License-Identifier: GPL-3.0-only

//! Terminal front end
//!
//! Renders the launcher and scanner screens with ratatui. The camera preview
//! uses Unicode half-block characters, two image rows per terminal row.

use crate::app::frame_processor::types::wifi_ssid;
use crate::app::frame_processor::{FrameRegion, ValueType};
use crate::app::{App, Message, ScannerScreen, ScreenKind};
use crate::backends::camera::types::{CameraFrame, PixelFormat};
use crate::constants::{DETECTION_HIGHLIGHT, UI_POLL_INTERVAL};
use crate::permission::PermissionState;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    buffer::Buffer,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
};
use std::io::{self, stdout};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;

/// Run the UI loop until the app asks to quit
pub fn run(
    app: App,
    receiver: UnboundedReceiver<Message>,
) -> Result<(), Box<dyn std::error::Error>> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, app, receiver);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    mut app: App,
    mut receiver: UnboundedReceiver<Message>,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Terminal UI started");

    while !app.should_quit() {
        // Apply everything that completed since the last frame
        while let Ok(message) = receiver.try_recv() {
            app.update(message);
        }

        terminal.draw(|f| draw(f, &app))?;

        if event::poll(UI_POLL_INTERVAL)?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
            && let Some(message) = key_to_message(app.screen(), &key)
        {
            app.update(message);
        }
    }

    info!("Terminal UI finished");
    Ok(())
}

/// Map a key press to the message it triggers on `screen`
pub fn key_to_message(screen: ScreenKind, key: &KeyEvent) -> Option<Message> {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Some(Message::Quit);
    }

    match (screen, key.code) {
        (_, KeyCode::Char('q')) => Some(Message::Quit),
        (ScreenKind::Launcher, KeyCode::Enter | KeyCode::Char('s')) => Some(Message::ScanPressed),
        (ScreenKind::Scanner, KeyCode::Esc | KeyCode::Char('b')) => Some(Message::Back),
        (ScreenKind::Scanner, KeyCode::Char('r')) => Some(Message::RequestPermissionAgain),
        (ScreenKind::Scanner, KeyCode::Char('o')) => Some(Message::OpenDecodedUrl),
        _ => None,
    }
}

fn draw(f: &mut Frame, app: &App) {
    match (app.screen(), app.scanner()) {
        (ScreenKind::Scanner, Some(scanner)) => draw_scanner(f, scanner),
        _ => draw_launcher(f, app),
    }
}

fn draw_launcher(f: &mut Frame, app: &App) {
    let [_, body, status_area] = Layout::vertical([
        Constraint::Percentage(30),
        Constraint::Min(6),
        Constraint::Length(1),
    ])
    .areas(f.area());

    let mut lines = vec![
        Line::from(Span::styled(
            "Barcode Scanner",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            env!("GIT_VERSION"),
            Style::default().fg(Color::DarkGray),
        )),
        Line::default(),
        Line::from(Span::styled(
            format!("[ {} ]", app.launcher().action_label()),
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )),
    ];
    if let Some(notice) = app.launcher().notice() {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(notice, Style::default().fg(Color::Red))));
    }

    f.render_widget(
        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true }),
        body,
    );
    f.render_widget(
        StatusBar {
            message: "Enter/s scan | q quit",
        },
        status_area,
    );
}

fn draw_scanner(f: &mut Frame, scanner: &ScannerScreen) {
    let [preview_area, result_area, status_area] = Layout::vertical([
        Constraint::Min(4),
        Constraint::Length(5),
        Constraint::Length(1),
    ])
    .areas(f.area());

    let frame = scanner.preview().and_then(|p| p.latest());
    let placeholder = match scanner.permission_state() {
        PermissionState::Denied => "Camera access denied",
        PermissionState::Pending | PermissionState::Unchecked => "Waiting for camera access...",
        PermissionState::Authorized if scanner.is_camera_bound() => "Waiting for camera...",
        PermissionState::Authorized => "No camera feed",
    };
    let highlight = scanner
        .decoded()
        .filter(|d| d.is_recent(DETECTION_HIGHLIGHT))
        .and_then(|d| d.region);
    f.render_widget(
        &FrameWidget {
            frame: frame.as_ref(),
            placeholder,
            highlight,
        },
        preview_area,
    );

    let result_lines = match scanner.decoded() {
        Some(decoded) => {
            let mut lines = vec![Line::from(vec![
                Span::styled(
                    format!("{} ", decoded.value_type),
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                ),
                Span::styled(
                    format!("({}, {})", decoded.format, decoded.decoded_at.format("%H:%M:%S")),
                    Style::default().fg(Color::DarkGray),
                ),
            ])];
            if decoded.value_type == ValueType::Wifi
                && let Some(ssid) = wifi_ssid(&decoded.text)
            {
                lines.push(Line::from(format!("Network: {}", ssid)));
            }
            lines.push(Line::from(decoded.text.as_str()));
            lines
        }
        None => vec![Line::from(Span::styled(
            "Point the camera at a barcode",
            Style::default().fg(Color::DarkGray),
        ))],
    };
    f.render_widget(
        Paragraph::new(result_lines)
            .block(Block::default().borders(Borders::ALL).title(" Result "))
            .wrap(Wrap { trim: false }),
        result_area,
    );

    let mut hints = String::from(scanner.status());
    if !hints.is_empty() {
        hints.push_str(" | ");
    }
    if scanner.permission_state() == PermissionState::Denied {
        hints.push_str("r ask again | ");
    }
    if scanner.decoded().is_some() {
        hints.push_str("o open | ");
    }
    hints.push_str("b back | q quit");
    f.render_widget(StatusBar { message: &hints }, status_area);
}

/// Widget that renders a camera frame using half-block characters
struct FrameWidget<'a> {
    frame: Option<&'a CameraFrame>,
    placeholder: &'a str,
    /// Outlined in the upright picture
    highlight: Option<FrameRegion>,
}

impl Widget for &FrameWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some(frame) = self.frame.filter(|f| f.width > 0 && f.height > 0) else {
            let msg = self.placeholder;
            let x = area.x + (area.width.saturating_sub(msg.len() as u16)) / 2;
            let y = area.y + area.height / 2;
            if y < area.y + area.height && x < area.x + area.width {
                buf.set_string(x, y, msg, Style::default());
            }
            return;
        };
        if area.width == 0 || area.height == 0 {
            return;
        }

        let rotation = frame.rotation.degrees();
        let (upright_width, upright_height) = if frame.rotation.swaps_dimensions() {
            (frame.height, frame.width)
        } else {
            (frame.width, frame.height)
        };

        // Each terminal cell displays 2 vertical pixels using half-block characters
        let frame_aspect = upright_width as f64 / upright_height as f64;
        let term_width = area.width as f64;
        let term_height = (area.height * 2) as f64;

        let (display_width, display_height) = if term_width / term_height > frame_aspect {
            let h = term_height;
            let w = h * frame_aspect;
            (w as u16, (h / 2.0) as u16)
        } else {
            let w = term_width;
            let h = w / frame_aspect;
            (w as u16, (h / 2.0) as u16)
        };
        if display_width == 0 || display_height == 0 {
            return;
        }

        let x_offset = area.x + (area.width.saturating_sub(display_width)) / 2;
        let y_offset = area.y + (area.height.saturating_sub(display_height)) / 2;

        let x_scale = upright_width as f64 / display_width as f64;
        let y_scale = upright_height as f64 / (display_height * 2) as f64;

        for ty in 0..display_height {
            for tx in 0..display_width {
                let term_x = x_offset + tx;
                let term_y = y_offset + ty;

                let ux = (tx as f64 * x_scale) as u32;
                let uy_top = (ty as f64 * 2.0 * y_scale) as u32;
                let uy_bottom = ((ty as f64 * 2.0 + 1.0) * y_scale) as u32;

                let (sx, sy) = source_coords(frame, rotation, ux, uy_top);
                let top_color = sample_pixel(frame, sx, sy);
                let (sx, sy) = source_coords(frame, rotation, ux, uy_bottom);
                let bottom_color = sample_pixel(frame, sx, sy);

                let outlined = self.highlight.is_some_and(|region| {
                    on_outline(&region, tx, ty, display_width, display_height)
                });
                let (top_color, bottom_color) = if outlined {
                    (Color::LightGreen, Color::LightGreen)
                } else {
                    (top_color, bottom_color)
                };

                if let Some(cell) = buf.cell_mut((term_x, term_y)) {
                    cell.set_char('▀');
                    cell.set_fg(top_color);
                    cell.set_bg(bottom_color);
                }
            }
        }
    }
}

/// Whether cell (`tx`, `ty`) of a `cols` x `rows` grid is on the border of
/// `region`
fn on_outline(region: &FrameRegion, tx: u16, ty: u16, cols: u16, rows: u16) -> bool {
    let inside = |x: i32, y: i32| {
        region.contains(
            (x as f32 + 0.5) / cols as f32,
            (y as f32 + 0.5) / rows as f32,
        )
    };
    let (x, y) = (i32::from(tx), i32::from(ty));
    inside(x, y)
        && !(inside(x - 1, y) && inside(x + 1, y) && inside(x, y - 1) && inside(x, y + 1))
}

/// Map a pixel of the upright image back to the captured frame
fn source_coords(frame: &CameraFrame, rotation: u32, ux: u32, uy: u32) -> (u32, u32) {
    let w = frame.width;
    let h = frame.height;
    match rotation {
        90 => (uy, (h - 1).saturating_sub(ux)),
        180 => ((w - 1).saturating_sub(ux), (h - 1).saturating_sub(uy)),
        270 => ((w - 1).saturating_sub(uy), ux),
        _ => (ux, uy),
    }
}

fn sample_pixel(frame: &CameraFrame, x: u32, y: u32) -> Color {
    let (r, g, b) = sample_pixel_rgb(frame, x, y);
    Color::Rgb(r, g, b)
}

fn sample_pixel_rgb(frame: &CameraFrame, x: u32, y: u32) -> (u8, u8, u8) {
    let x = x.min(frame.width - 1) as usize;
    let y = y.min(frame.height - 1) as usize;
    let stride = frame.stride as usize;
    let data = &frame.data;

    match frame.format {
        PixelFormat::Rgba | PixelFormat::Rgb24 => {
            let bpp = frame.format.bytes_per_pixel() as usize;
            let idx = y * stride + x * bpp;
            if idx + 2 < data.len() {
                (data[idx], data[idx + 1], data[idx + 2])
            } else {
                (0, 0, 0)
            }
        }
        PixelFormat::Gray8 => match data.get(y * stride + x) {
            Some(&v) => (v, v, v),
            None => (0, 0, 0),
        },
        PixelFormat::Nv12 => {
            let Some(&luma) = data.get(y * stride + x) else {
                return (0, 0, 0);
            };

            // Interleaved UV plane follows the Y plane at half resolution
            let uv_idx = stride * frame.height as usize + (y / 2) * stride + (x & !1);
            if uv_idx + 1 >= data.len() {
                return (luma, luma, luma);
            }
            yuv_to_rgb(luma, data[uv_idx], data[uv_idx + 1])
        }
        PixelFormat::Yuyv => {
            // Y0 U Y1 V: two pixels share chroma
            let base = y * stride + (x & !1) * 2;
            if base + 3 >= data.len() {
                return (0, 0, 0);
            }
            let luma = if x & 1 == 0 { data[base] } else { data[base + 2] };
            yuv_to_rgb(luma, data[base + 1], data[base + 3])
        }
        // Decoded on the capture thread; never reaches the preview
        PixelFormat::Mjpeg => (0, 0, 0),
    }
}

/// Convert YUV (BT.601) to RGB
fn yuv_to_rgb(y: u8, u: u8, v: u8) -> (u8, u8, u8) {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;

    let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
    let g = (y - 0.344136 * u - 0.714136 * v).clamp(0.0, 255.0) as u8;
    let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;

    (r, g, b)
}

/// Status bar widget
struct StatusBar<'a> {
    message: &'a str,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_char(' ');
                cell.set_bg(Color::DarkGray);
            }
        }

        buf.set_stringn(
            area.x,
            area.y,
            self.message,
            area.width as usize,
            Style::default().fg(Color::White).bg(Color::DarkGray),
        );
    }
}
