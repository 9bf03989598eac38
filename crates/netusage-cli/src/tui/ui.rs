//! Chart screen layout.
//!
//! ┌──────────────────────────────────────────────┐
//! │ netusage  df.json  120 points  10:00 → 10:02 │
//! ├──────────────────────────────────────────────┤
//! │  ╭ Throughput                     combined ─ │
//! │  │   ⣀⡠⠤⠒⠉⠉⠒⠤⣀                     up ─ │
//! │  │ ⠔⠁          ⠑⠢⡀                  down ─ │
//! │  ╰─────────────────────────────────────────── │
//! ├──────────────────────────────────────────────┤
//! │  Devices (with --devices)                    │
//! ├──────────────────────────────────────────────┤
//! │  now 12.50 Mb/s   ↑ 2.50 Mb/s   ↓ 10.00 Mb/s │
//! └──────────────────────────────────────────────┘

use netusage_core::{ChartFrame, DeviceReading};
use ratatui::{prelude::*, widgets::*};

use super::ChartView;
use crate::commands::{format_clock, format_mbps};

/// Device rows shown before the table stops growing.
const MAX_DEVICE_ROWS: usize = 8;

pub fn draw(f: &mut Frame, view: &ChartView) {
    let mut constraints = vec![
        Constraint::Length(3), // title
        Constraint::Min(8),    // chart
    ];
    if !view.devices.is_empty() {
        let rows = view.devices.len().min(MAX_DEVICE_ROWS) as u16;
        constraints.push(Constraint::Length(rows + 3));
    }
    constraints.push(Constraint::Length(1)); // keys

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(f.area());

    draw_title(f, rows[0], view);
    draw_chart(f, rows[1], &view.frame);
    if !view.devices.is_empty() {
        draw_devices(f, rows[2], &view.devices);
    }
    draw_keys(f, rows[rows.len() - 1], view);
}

fn draw_title(f: &mut Frame, area: Rect, view: &ChartView) {
    let frame = &view.frame;
    let span = match (frame.timestamps.first(), frame.timestamps.last()) {
        (Some(&first), Some(&last)) => format!(
            "  {} points  {} → {} ",
            frame.len(),
            format_clock(first),
            format_clock(last)
        ),
        _ => "  0 points ".to_string(),
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(Line::from(vec![
            Span::styled(" netusage ", Style::default().bold().fg(Color::Cyan)),
            Span::styled(view.title.as_str(), Style::default().bold().fg(Color::Yellow)),
            Span::styled(span, Style::default().fg(Color::DarkGray)),
        ]));

    f.render_widget(block, area);
}

fn points(timestamps: &[i64], values: &[f64]) -> Vec<(f64, f64)> {
    timestamps
        .iter()
        .zip(values)
        .map(|(&t, &v)| (t as f64, v))
        .collect()
}

fn draw_chart(f: &mut Frame, area: Rect, frame: &ChartFrame) {
    let block = Block::default().borders(Borders::ALL).title(" Throughput ");
    let (Some(&first), Some(&last)) = (frame.timestamps.first(), frame.timestamps.last()) else {
        let p = Paragraph::new("waiting for data")
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        f.render_widget(p, area);
        return;
    };

    let combined = points(&frame.timestamps, &frame.combined);
    let up = points(&frame.timestamps, &frame.speed_up);
    let down = points(&frame.timestamps, &frame.speed_down);

    let datasets = vec![
        Dataset::default()
            .name("combined")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Cyan))
            .data(&combined),
        Dataset::default()
            .name("up")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Green))
            .data(&up),
        Dataset::default()
            .name("down")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Yellow))
            .data(&down),
    ];

    let x_min = first as f64;
    let x_max = if last > first { last as f64 } else { x_min + 1.0 };
    let peak = frame
        .combined
        .iter()
        .chain(&frame.speed_up)
        .chain(&frame.speed_down)
        .copied()
        .fold(0.0, f64::max);
    let y_max = if peak > 0.0 { peak * 1.1 } else { 1.0 };

    let chart = Chart::new(datasets)
        .block(block)
        .x_axis(Axis::default().bounds([x_min, x_max]).labels(vec![
            Line::from(format_clock(first)),
            Line::from(format_clock(last)),
        ]))
        .y_axis(Axis::default().bounds([0.0, y_max]).labels(vec![
            Line::from("0"),
            Line::from(format_mbps(y_max / 2.0)),
            Line::from(format_mbps(y_max)),
        ]));

    f.render_widget(chart, area);
}

fn draw_devices(f: &mut Frame, area: Rect, devices: &[DeviceReading]) {
    let opt = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{v:.1}"));
    let header = Row::new(vec![
        "Room", "MAC", "No.", "US Pwr", "DS Pwr", "US SNR", "DS SNR", "Used GB",
    ])
    .style(Style::default().bold());
    let rows: Vec<Row> = devices
        .iter()
        .map(|d| {
            Row::new(vec![
                d.room.clone(),
                d.mac.clone(),
                d.number.clone(),
                opt(d.us_power),
                opt(d.ds_power),
                opt(d.us_snr),
                opt(d.ds_snr),
                format!("{:.2}", d.usage_gb),
            ])
        })
        .collect();
    let widths = [
        Constraint::Length(8),
        Constraint::Length(18),
        Constraint::Length(6),
        Constraint::Length(7),
        Constraint::Length(7),
        Constraint::Length(7),
        Constraint::Length(7),
        Constraint::Length(9),
    ];
    let table = Table::new(rows, widths)
        .header(header)
        .block(Block::default().borders(Borders::ALL).title(" Devices "));
    f.render_widget(table, area);
}

fn status_line(frame: &ChartFrame) -> String {
    match (frame.combined.last(), frame.speed_up.last(), frame.speed_down.last()) {
        (Some(&c), Some(&u), Some(&d)) => format!(
            "now {}   ↑ {}   ↓ {}",
            format_mbps(c),
            format_mbps(u),
            format_mbps(d)
        ),
        _ => "no data yet".to_string(),
    }
}

fn draw_keys(f: &mut Frame, area: Rect, view: &ChartView) {
    let status = view
        .notice
        .clone()
        .unwrap_or_else(|| status_line(&view.frame));
    let bar = Paragraph::new(format!(" {status}   q: quit"))
        .style(Style::default().bg(Color::DarkGray).fg(Color::White));
    f.render_widget(bar, area);
}
