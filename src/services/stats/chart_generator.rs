use std::io::Cursor;

use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use crate::bot::error::Error;
use crate::db::models::LogType;
use crate::services::audit::stats::LogStats;

/// Chart dimensions - Higher resolution for crisp text
const CHART_WIDTH: u32 = 1200;
const CHART_HEIGHT: u32 = 600;

// Discord dark theme palette
const BG_COLOR: RGBColor = RGBColor(49, 51, 56);
const CARD_COLOR: RGBColor = RGBColor(43, 45, 49);
const TEXT_COLOR: RGBColor = RGBColor(255, 255, 255);
const TEXT_MUTED: RGBColor = RGBColor(148, 155, 164);
const ACCENT_BLUE: RGBColor = RGBColor(88, 101, 242);
const ACCENT_GREEN: RGBColor = RGBColor(87, 242, 135);
const ACCENT_RED: RGBColor = RGBColor(237, 66, 69);
const ACCENT_PURPLE: RGBColor = RGBColor(155, 89, 182);
const ACCENT_AMBER: RGBColor = RGBColor(250, 166, 26);

const LOG_TYPES: [LogType; 5] = [
    LogType::Info,
    LogType::Success,
    LogType::Warning,
    LogType::Error,
    LogType::Debug,
];

#[derive(Debug, Clone, PartialEq)]
struct StatBar {
    label: &'static str,
    value: usize,
    color: RGBColor,
}

fn color_for(kind: LogType) -> RGBColor {
    match kind {
        LogType::Info => ACCENT_BLUE,
        LogType::Success => ACCENT_GREEN,
        LogType::Warning => ACCENT_AMBER,
        LogType::Error => ACCENT_RED,
        LogType::Debug => ACCENT_PURPLE,
    }
}

/// One bar per entry type, zero for types that never occurred
fn bars_for(stats: &LogStats) -> Vec<StatBar> {
    LOG_TYPES
        .iter()
        .map(|kind| StatBar {
            label: kind.as_str(),
            value: stats.by_type.get(kind.as_str()).copied().unwrap_or(0),
            color: color_for(*kind),
        })
        .collect()
}

fn draw_err<E: std::fmt::Display>(e: E) -> Error {
    Error::custom(e.to_string())
}

/// PNG bar chart of audit entries per type
pub fn generate_log_stats_chart(stats: &LogStats, title: &str) -> Result<Vec<u8>, Error> {
    let mut buffer = vec![0u8; (CHART_WIDTH * CHART_HEIGHT * 3) as usize];

    {
        let root = BitMapBackend::with_buffer(&mut buffer, (CHART_WIDTH, CHART_HEIGHT))
            .into_drawing_area();

        root.fill(&BG_COLOR).map_err(draw_err)?;

        let bars = bars_for(stats);
        let max_value = bars.iter().map(|b| b.value).max().unwrap_or(1).max(1);

        let margin = 60;
        let title_height = 80;
        let bar_area_top = title_height + 20;
        let bar_area_left = margin + 150;
        let bar_area_right = CHART_WIDTH as i32 - margin;
        let bar_area_width = bar_area_right - bar_area_left;
        let bar_height = 50;
        let bar_spacing = 20;

        root.draw(&Text::new(
            title.to_string(),
            (CHART_WIDTH as i32 / 2, 45),
            ("sans-serif", 36).into_font().color(&TEXT_COLOR).pos(Pos::new(HPos::Center, VPos::Center)),
        ))
        .map_err(draw_err)?;

        for (i, bar) in bars.iter().enumerate() {
            let y_center = bar_area_top + (i as i32) * (bar_height + bar_spacing) + bar_height / 2;
            let y_top = y_center - bar_height / 2;
            let y_bottom = y_center + bar_height / 2;

            root.draw(&Text::new(
                bar.label,
                (bar_area_left - 15, y_center),
                ("sans-serif", 22).into_font().color(&TEXT_MUTED).pos(Pos::new(HPos::Right, VPos::Center)),
            ))
            .map_err(draw_err)?;

            root.draw(&Rectangle::new(
                [(bar_area_left, y_top), (bar_area_right, y_bottom)],
                CARD_COLOR.filled(),
            ))
            .map_err(draw_err)?;

            let bar_width = ((bar.value as f64 / max_value as f64) * bar_area_width as f64) as i32;
            if bar_width > 0 {
                root.draw(&Rectangle::new(
                    [(bar_area_left, y_top + 2), (bar_area_left + bar_width, y_bottom - 2)],
                    bar.color.filled(),
                ))
                .map_err(draw_err)?;
            }

            let inside = bar_width > 60;
            let text_x = if inside {
                bar_area_left + bar_width - 10
            } else {
                bar_area_left + bar_width + 15
            };

            root.draw(&Text::new(
                bar.value.to_string(),
                (text_x, y_center),
                ("sans-serif", 24)
                    .into_font()
                    .color(if inside { &TEXT_COLOR } else { &TEXT_MUTED })
                    .pos(Pos::new(if inside { HPos::Right } else { HPos::Left }, VPos::Center)),
            ))
            .map_err(draw_err)?;
        }

        let footer = format!(
            "{} entries  |  {:.2}% successful  |  avg {} ms",
            stats.total, stats.success_rate, stats.average_duration_ms
        );
        root.draw(&Text::new(
            footer,
            (CHART_WIDTH as i32 / 2, CHART_HEIGHT as i32 - margin),
            ("sans-serif", 20).into_font().color(&TEXT_MUTED).pos(Pos::new(HPos::Center, VPos::Center)),
        ))
        .map_err(draw_err)?;

        root.present().map_err(draw_err)?;
    }

    let img = image::RgbImage::from_raw(CHART_WIDTH, CHART_HEIGHT, buffer)
        .ok_or_else(|| Error::custom("Failed to create image buffer"))?;

    let mut png_buffer = Cursor::new(Vec::new());
    img.write_to(&mut png_buffer, image::ImageFormat::Png)
        .map_err(draw_err)?;

    Ok(png_buffer.into_inner())
}
