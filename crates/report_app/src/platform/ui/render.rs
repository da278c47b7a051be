//! Plain-text rendering of [`AppViewModel`].

use report_core::{
    AppViewModel, BitUsage, DownloadsView, ErrorBanner, ErrorStage, FocusedPreview, Phase,
    PreviewTabState, PreviewView, ProgressView,
};

use report_engine::{HealthStatus, HistoryEntry, SectionPage};

use super::constants::*;

/// One-line summary of where the workflow stands.
pub fn status_line(view: &AppViewModel) -> String {
    let file = view
        .filename
        .clone()
        .or_else(|| {
            view.upload_path
                .as_ref()
                .map(|path| path.display().to_string())
        })
        .unwrap_or_default();

    let line = match view.phase {
        Phase::Idle => "Idle".to_string(),
        Phase::Uploading => format!("Uploading {file}..."),
        Phase::Ready => format!(
            "Ready: {file} ({} CPUs available, {} selected)",
            view.cpus.len(),
            view.selected_count
        ),
        Phase::Processing => match &view.progress {
            Some(progress) => format_progress(progress),
            None => "Submitting job...".to_string(),
        },
        Phase::Completed => format!("Completed: {file}"),
        Phase::Error => "Failed".to_string(),
    };
    match &view.error {
        Some(error) => format!("{line} | {}", format_error(error)),
        None => line,
    }
}

pub fn format_progress(progress: &ProgressView) -> String {
    let filled = usize::from(progress.percent) * PROGRESS_BAR_WIDTH / 100;
    let mut line = format!(
        "[{}{}] {:>3}% {}/{}",
        "#".repeat(filled),
        "-".repeat(PROGRESS_BAR_WIDTH - filled),
        progress.percent,
        progress.progress,
        progress.total_steps
    );
    if !progress.current_step.is_empty() {
        line.push_str(&format!(" {}", progress.current_step));
    }
    if let Some(eta) = progress.eta_seconds {
        line.push_str(&format!(" (~{eta}s left)"));
    }
    if !progress.completed_cpus.is_empty() {
        line.push_str(&format!(" | done: {}", progress.completed_cpus.join(", ")));
    }
    line
}

pub fn format_error(error: &ErrorBanner) -> String {
    let stage = match error.stage {
        ErrorStage::Upload => "Upload failed",
        ErrorStage::Submission => "Processing could not start",
        ErrorStage::Poll => "Processing failed",
        ErrorStage::Preview => "Preview failed",
        ErrorStage::Download => "Download failed",
    };
    format!("{stage}: {}", error.message)
}

pub fn cpu_list(view: &AppViewModel) -> Vec<String> {
    view.cpus
        .iter()
        .map(|cpu| {
            let mark = if cpu.selected { "x" } else { " " };
            format!("  [{mark}] {}", cpu.cpu)
        })
        .collect()
}

/// Preview tabs plus the focused CPU's bit usage, or why it has none.
pub fn preview_header(preview: &PreviewView) -> Vec<String> {
    let tabs: Vec<String> = preview
        .tabs
        .iter()
        .map(|tab| {
            let marker = if tab.cpu == preview.focus { "*" } else { "" };
            match &tab.state {
                PreviewTabState::Loading => format!("{marker}{} (loading)", tab.cpu),
                PreviewTabState::Loaded => format!("{marker}{}", tab.cpu),
                PreviewTabState::Reloading => format!("{marker}{} (reloading)", tab.cpu),
                PreviewTabState::Failed(_) => format!("{marker}{} (failed)", tab.cpu),
            }
        })
        .collect();

    let mut lines = vec![format!("== Preview: {} ==", tabs.join(" | "))];
    match &preview.focused {
        Some(focused) => {
            lines.push(usage_line("Fault bits", &focused.usage.fault_bits));
            lines.push(usage_line(
                "Manual intervention bits",
                &focused.usage.manual_intervention_bits,
            ));
            lines.push(usage_line("Warning bits", &focused.usage.warning_bits));
        }
        None => {
            let failed = preview.tabs.iter().find_map(|tab| match &tab.state {
                PreviewTabState::Failed(message) if tab.cpu == preview.focus => Some(message),
                _ => None,
            });
            match failed {
                Some(message) => {
                    lines.push(format!("No preview for {}: {message}", preview.focus))
                }
                None => lines.push(format!("Loading preview for {}...", preview.focus)),
            }
        }
    }
    lines
}

/// Section tabs, row counts and the table for the focused section.
pub fn section_table(focused: &FocusedPreview) -> Vec<String> {
    let sections: Vec<String> = focused
        .sections
        .iter()
        .map(|tab| {
            let marker = if tab.section == focused.section { "*" } else { "" };
            format!("{marker}{} ({})", tab.label, tab.total)
        })
        .collect();
    let mut lines = vec![sections.join(" | ")];

    let mut summary = format!("Showing {} of {} rows", focused.showing, focused.total);
    if let Some(unfiltered) = focused.filtered_from {
        summary.push_str(&format!(
            " matching {:?} (filtered from {unfiltered})",
            focused.search
        ));
    }
    lines.push(summary);

    if focused.rows.is_empty() {
        lines.push("(no rows)".to_string());
        return lines;
    }
    let shown = &focused.rows[..focused.rows.len().min(MAX_PREVIEW_ROWS)];
    let table: Vec<Vec<String>> = shown
        .iter()
        .map(|row| row.cells.iter().map(|cell| clip(cell)).collect())
        .collect();
    let header: Vec<String> = focused.columns.iter().map(|column| clip(column)).collect();
    lines.extend(aligned_table(&header, &table));
    if focused.rows.len() > shown.len() {
        lines.push(format!("... {} more", focused.rows.len() - shown.len()));
    }
    lines
}

fn aligned_table(header: &[String], table: &[Vec<String>]) -> Vec<String> {
    let widths: Vec<usize> = header
        .iter()
        .enumerate()
        .map(|(index, column)| {
            table
                .iter()
                .filter_map(|row| row.get(index))
                .map(|cell| cell.chars().count())
                .chain(std::iter::once(column.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut lines = vec![
        table_row(header, &widths),
        widths
            .iter()
            .map(|width| "-".repeat(*width))
            .collect::<Vec<_>>()
            .join("-+-"),
    ];
    lines.extend(table.iter().map(|row| table_row(row, &widths)));
    lines
}

fn usage_line(label: &str, usage: &BitUsage) -> String {
    format!(
        "{label}: {} used / {} total, {} spare ({:.1}%)",
        usage.used, usage.total, usage.spare, usage.spare_percentage
    )
}

fn table_row(cells: &[String], widths: &[usize]) -> String {
    widths
        .iter()
        .enumerate()
        .map(|(index, &width)| {
            let cell = cells.get(index).map(String::as_str).unwrap_or("");
            format!("{cell:<width$}")
        })
        .collect::<Vec<_>>()
        .join(" | ")
        .trim_end()
        .to_string()
}

fn clip(text: &str) -> String {
    let single_line = text.replace(['\n', '\r'], " ");
    if single_line.chars().count() <= MAX_CELL_WIDTH {
        return single_line;
    }
    let mut clipped: String = single_line.chars().take(MAX_CELL_WIDTH - 3).collect();
    clipped.push_str("...");
    clipped
}

pub fn downloads(downloads: &DownloadsView) -> Vec<String> {
    let mut lines: Vec<String> = downloads
        .files
        .iter()
        .map(|file| format!("  {}: {}", file.cpu, file.filename))
        .collect();
    if let Some(zip) = &downloads.zip_file {
        lines.push(format!("  all: {zip}"));
    }
    lines
}

pub fn history(entries: &[HistoryEntry]) -> Vec<String> {
    if entries.is_empty() {
        return vec!["No processing history".to_string()];
    }
    entries
        .iter()
        .map(|entry| {
            format!(
                "{}  {}  CPUs: {}",
                entry.date,
                entry.filename,
                entry.selected_cpus.join(", ")
            )
        })
        .collect()
}

pub fn section_page(page: &SectionPage) -> Vec<String> {
    let mut header: Vec<String> = Vec::new();
    for row in &page.rows {
        for column in row.keys() {
            if !header.contains(column) {
                header.push(column.clone());
            }
        }
    }
    let table: Vec<Vec<String>> = page
        .rows
        .iter()
        .map(|row| {
            header
                .iter()
                .map(|column| clip(row.get(column).map(String::as_str).unwrap_or("")))
                .collect()
        })
        .collect();
    let header: Vec<String> = header.iter().map(|column| clip(column)).collect();

    let mut lines = vec![format!(
        "Page {} ({} rows per page, {} rows total{})",
        page.page,
        page.page_size,
        page.total_rows,
        if page.has_more { ", more available" } else { "" }
    )];
    if table.is_empty() {
        lines.push("(no rows)".to_string());
    } else {
        lines.extend(aligned_table(&header, &table));
    }
    lines
}

pub fn health(health: &HealthStatus) -> String {
    match &health.timestamp {
        Some(timestamp) => format!("Backend is {} ({timestamp})", health.status),
        None => format!("Backend is {}", health.status),
    }
}
