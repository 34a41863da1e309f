//! PNG bar charts and heatmaps.

use crate::models::RatioMatrix;
use plotters::prelude::*;
use std::error::Error;
use std::path::{Path, PathBuf};
use tracing::info;

/// Image size and output location for a batch of plots.
#[derive(Debug, Clone)]
pub struct PlotSettings {
    pub output_dir: PathBuf,
    pub width: u32,
    pub height: u32,
}

impl PlotSettings {
    /// Path of `total_guesses_<name>.png`.
    pub fn bar_chart_path(&self, name: &str) -> PathBuf {
        self.output_dir
            .join(format!("total_guesses_{}.png", sanitize_file_stem(name)))
    }

    /// Path of `accuracy_<name>.png`.
    pub fn heatmap_path(&self, name: &str) -> PathBuf {
        self.output_dir
            .join(format!("accuracy_{}.png", sanitize_file_stem(name)))
    }
}

/// Replace path separators so a display name is always one file name.
pub fn sanitize_file_stem(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '-',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect()
}

/// Viridis colormap approximation, `t` in [0, 1].
fn viridis_color(t: f64) -> RGBColor {
    let t = t.clamp(0.0, 1.0);
    let r = (0.267 + t * (0.329 - 0.267 + t * (0.984 - 0.329))) * 255.0;
    let g = (0.005 + t * (0.569 - 0.005 + t * (0.906 - 0.569))) * 255.0;
    let b = (0.329 + t * (0.758 - 0.329 - t * (0.758 - 0.121))) * 255.0;

    RGBColor(
        r.clamp(0.0, 255.0) as u8,
        g.clamp(0.0, 255.0) as u8,
        b.clamp(0.0, 255.0) as u8,
    )
}

/// Discrete axis with a segment for each of `n` labels.
fn segment_axis(n: usize) -> std::ops::Range<usize> {
    0..n.max(1)
}

/// Label drawn at the center of segment `i`.
fn axis_label(labels: &[String], value: &SegmentValue<usize>) -> String {
    match value {
        SegmentValue::CenterOf(i) => labels.get(*i).cloned().unwrap_or_default(),
        _ => String::new(),
    }
}

/// Like [`axis_label`], but segment 0 is the last label so the first
/// matrix row sits at the top.
fn flipped_axis_label(labels: &[String], value: &SegmentValue<usize>) -> String {
    match value {
        SegmentValue::CenterOf(i) if *i < labels.len() => labels[labels.len() - 1 - *i].clone(),
        _ => String::new(),
    }
}

/// Corners of the heatmap cell for matrix row `row`, column `col`.
fn heatmap_cell(
    row: usize,
    col: usize,
    n_rows: usize,
) -> [(SegmentValue<usize>, SegmentValue<usize>); 2] {
    let y = n_rows - 1 - row;
    [
        (SegmentValue::Exact(col), SegmentValue::Exact(y)),
        (SegmentValue::Exact(col + 1), SegmentValue::Exact(y + 1)),
    ]
}

/// Bar chart of one value per label, labels in the given order.
pub fn render_bar_chart(
    path: &Path,
    title: &str,
    y_desc: &str,
    bars: &[(String, f64)],
    settings: &PlotSettings,
) -> Result<(), Box<dyn Error>> {
    let root = BitMapBackend::new(path, (settings.width, settings.height)).into_drawing_area();
    root.fill(&WHITE)?;

    let max_value = bars.iter().map(|(_, v)| *v).fold(0.0f64, f64::max).max(1.0);
    let labels: Vec<String> = bars.iter().map(|(label, _)| label.clone()).collect();

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 28).into_font())
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(70)
        .build_cartesian_2d(segment_axis(labels.len()).into_segmented(), 0f64..max_value * 1.05)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(labels.len())
        .x_label_formatter(&|v| axis_label(&labels, v))
        .x_desc("Type")
        .y_desc(y_desc)
        .draw()?;

    chart.draw_series(
        Histogram::vertical(&chart)
            .style(BLUE.mix(0.7).filled())
            .margin(4)
            .data(bars.iter().enumerate().map(|(i, (_, v))| (i, *v))),
    )?;

    root.present()?;
    info!("Bar chart saved to: {}", path.display());
    Ok(())
}

/// Heatmap of a ratio matrix: rows are guesses, columns true categories.
pub fn render_heatmap(
    path: &Path,
    title: &str,
    matrix: &RatioMatrix,
    settings: &PlotSettings,
) -> Result<(), Box<dyn Error>> {
    let root = BitMapBackend::new(path, (settings.width, settings.height)).into_drawing_area();
    root.fill(&WHITE)?;

    let n_cols = matrix.columns.len();
    let n_rows = matrix.rows.len();
    let max_value = matrix.max_value();

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 28).into_font())
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(80)
        .build_cartesian_2d(
            segment_axis(n_cols).into_segmented(),
            segment_axis(n_rows).into_segmented(),
        )?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(n_cols)
        .y_labels(n_rows.max(1))
        .x_label_formatter(&|v| axis_label(&matrix.columns, v))
        .y_label_formatter(&|v| flipped_axis_label(&matrix.rows, v))
        .x_desc("Type")
        .y_desc("Guess")
        .draw()?;

    let cells = matrix.values.iter().enumerate().flat_map(|(r, row)| {
        row.iter().enumerate().map(move |(c, value)| (r, c, *value))
    });

    chart.draw_series(cells.map(|(r, c, value)| {
        let t = if max_value > 1e-12 { value / max_value } else { 0.0 };
        Rectangle::new(heatmap_cell(r, c, n_rows), viridis_color(t).filled())
    }))?;

    root.present()?;
    info!("Heatmap saved to: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plot_paths() {
        let settings = PlotSettings {
            output_dir: PathBuf::from("plots"),
            width: 800,
            height: 600,
        };
        assert_eq!(
            settings.bar_chart_path("gpt-4_brief"),
            PathBuf::from("plots/total_guesses_gpt-4_brief.png")
        );
        assert_eq!(
            settings.heatmap_path("gpt-4_brief"),
            PathBuf::from("plots/accuracy_gpt-4_brief.png")
        );
    }

    #[test]
    fn test_sanitize_file_stem() {
        assert_eq!(sanitize_file_stem("org/model v2"), "org-model_v2");
        assert_eq!(sanitize_file_stem("gpt-3.5-turbo_brief"), "gpt-3.5-turbo_brief");
    }

    #[test]
    fn test_viridis_endpoints() {
        let low = viridis_color(0.0);
        let high = viridis_color(1.0);
        // Dark purple at the bottom, bright yellow at the top
        assert!(low.2 > low.1);
        assert!(high.0 > 200 && high.1 > 200);
        assert_eq!(viridis_color(-1.0), low);
    }

    fn sample_matrix() -> RatioMatrix {
        RatioMatrix {
            rows: vec!["ENTJ".into(), "INTJ".into()],
            columns: vec!["ENTJ".into(), "INFP".into(), "INTJ".into()],
            values: vec![vec![1.0, 0.0, 0.0], vec![0.0, 0.5, 1.5]],
        }
    }

    /// Rendering needs a system font; hosts without one skip the image check.
    fn rendered_or_font_missing(result: Result<(), Box<dyn Error>>, path: &Path) {
        match result {
            Ok(()) => {
                let size = std::fs::metadata(path).unwrap().len();
                assert!(size > 0, "{} is empty", path.display());
            }
            Err(e) if e.to_string().to_lowercase().contains("font") => {
                eprintln!("skipping image check, no usable font: {}", e);
            }
            Err(e) => panic!("render failed: {}", e),
        }
    }

    #[test]
    fn test_heatmap_labels_sit_on_cell_centers() {
        let matrix = sample_matrix();
        let n_rows = matrix.rows.len();

        for (r, row) in matrix.rows.iter().enumerate() {
            for (c, column) in matrix.columns.iter().enumerate() {
                let [(x0, y0), (x1, y1)] = heatmap_cell(r, c, n_rows);
                let (SegmentValue::Exact(x0), SegmentValue::Exact(x1)) = (x0, x1) else {
                    panic!("cell x corners must be exact");
                };
                let (SegmentValue::Exact(y0), SegmentValue::Exact(y1)) = (y0, y1) else {
                    panic!("cell y corners must be exact");
                };
                assert_eq!(x1, x0 + 1);
                assert_eq!(y1, y0 + 1);

                // The label centered in segment x0/y0 names this cell
                assert_eq!(&axis_label(&matrix.columns, &SegmentValue::CenterOf(x0)), column);
                assert_eq!(&flipped_axis_label(&matrix.rows, &SegmentValue::CenterOf(y0)), row);
            }
        }
    }

    #[test]
    fn test_first_row_at_top() {
        let matrix = sample_matrix();
        let [(_, top), _] = heatmap_cell(0, 0, matrix.rows.len());
        assert!(matches!(top, SegmentValue::Exact(1)));
        assert_eq!(flipped_axis_label(&matrix.rows, &SegmentValue::CenterOf(1)), "ENTJ");
        assert_eq!(flipped_axis_label(&matrix.rows, &SegmentValue::CenterOf(0)), "INTJ");
    }

    #[test]
    fn test_labels_outside_range_are_blank() {
        let labels = vec!["A".to_string()];
        assert_eq!(axis_label(&labels, &SegmentValue::CenterOf(1)), "");
        assert_eq!(axis_label(&labels, &SegmentValue::Exact(0)), "");
        assert_eq!(flipped_axis_label(&labels, &SegmentValue::CenterOf(1)), "");
        assert_eq!(flipped_axis_label(&labels, &SegmentValue::Last), "");
    }

    #[test]
    fn test_render_bar_chart_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let settings = PlotSettings {
            output_dir: dir.path().to_path_buf(),
            width: 400,
            height: 300,
        };
        let path = settings.bar_chart_path("demo-model_brief");
        let bars = vec![("ENTJ".to_string(), 1.0), ("INTJ".to_string(), 2.0)];

        let result = render_bar_chart(&path, "Guesses", "Number of guesses", &bars, &settings);
        rendered_or_font_missing(result, &path);
    }

    #[test]
    fn test_render_heatmap_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let settings = PlotSettings {
            output_dir: dir.path().to_path_buf(),
            width: 400,
            height: 300,
        };
        let path = settings.heatmap_path("demo-model_brief");

        let result = render_heatmap(&path, "Accuracy", &sample_matrix(), &settings);
        rendered_or_font_missing(result, &path);
    }
}
